use aigov_authz::config::ConfigArgs;
use anyhow::Result;
use async_trait::async_trait;
use clap::Args;

use super::{display_json, RunCommand};

/// Display the configuration in use, in JSON format.
#[derive(Args)]
pub struct ShowConfigArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait]
impl RunCommand for ShowConfigArgs {
    async fn run(&self) -> Result<()> {
        let cfg = self.config.load()?;
        display_json(cfg)
    }
}
