use aigov_authz::config::ConfigArgs;
use aigov_authz::store::seed::GovernanceData;
use anyhow::Result;
use async_trait::async_trait;
use clap::Args;

use super::{display_json, open_database, read_json, RunCommand};

/// Import applications, policies, vector dbs and user groups from a JSON
/// document. The import is all or nothing.
#[derive(Args)]
pub struct ImportArgs {
    /// JSON file with the governance data, `-` reads stdin.
    pub file: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait]
impl RunCommand for ImportArgs {
    async fn run(&self) -> Result<()> {
        let data: GovernanceData = read_json(&self.file)?;
        let db = open_database(&self.config)?;

        let summary = db.import(&data)?;
        display_json(summary)
    }
}
