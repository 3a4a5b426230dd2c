use aigov_authz::authz::AuthzService;
use aigov_authz::config::ConfigArgs;
use aigov_authz::types::request::AuthzRequest;
use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::Args;

use super::{display_json, open_database, read_json, RunCommand};

/// Authorize a prompt, reply or enriched prompt and print the decision.
#[derive(Args)]
pub struct AuthorizeArgs {
    /// JSON file holding the authorization request, `-` reads stdin.
    #[arg(default_value = "-")]
    pub request: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait]
impl RunCommand for AuthorizeArgs {
    async fn run(&self) -> Result<()> {
        let req: AuthzRequest = read_json(&self.request)?;
        let db = open_database(&self.config)?;

        let service = AuthzService::new(db);
        match service.authorize(&req).await {
            Ok(resp) => display_json(resp),
            Err(e) if e.is_client_error() => bail!("bad request: {e}"),
            Err(e) => Err(e.into()),
        }
    }
}
