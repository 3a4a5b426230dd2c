use aigov_authz::authz::AuthzService;
use aigov_authz::config::ConfigArgs;
use aigov_authz::types::request::VectorDbAuthzRequest;
use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::Args;

use super::{display_json, open_database, read_json, RunCommand};

/// Build the metadata filter a user's vector db queries must carry.
#[derive(Args)]
pub struct VectorDbArgs {
    /// The user to build the filter for. Requires `--app`, replaces the
    /// request file.
    #[arg(short, long, requires = "app")]
    pub user: Option<String>,

    /// Application key, used together with `--user`.
    #[arg(short, long, requires = "user")]
    pub app: Option<String>,

    /// JSON file holding the request, `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub request: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait]
impl RunCommand for VectorDbArgs {
    async fn run(&self) -> Result<()> {
        let req = match (&self.user, &self.app) {
            (Some(user), Some(app)) => VectorDbAuthzRequest {
                user_id: user.clone(),
                application_key: app.clone(),
            },
            _ => read_json(&self.request)?,
        };
        let db = open_database(&self.config)?;

        let service = AuthzService::new(db);
        match service.authorize_vector_db(&req).await {
            Ok(resp) => display_json(resp),
            Err(e) if e.is_client_error() => bail!("bad request: {e}"),
            Err(e) => Err(e.into()),
        }
    }
}
