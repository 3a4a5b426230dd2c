use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::types::policy::{
    AiApplication, AiApplicationConfig, AiApplicationPolicy, Permission, VectorDb, VectorDbPolicy,
    VectorDbType,
};

use super::Database;

/// Governance data in its authoring form: records carry no ids, the store
/// assigns them on import.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceData {
    #[serde(default)]
    pub applications: Vec<ApplicationSeed>,

    /// User id -> group names.
    #[serde(default)]
    pub user_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSeed {
    pub name: String,
    pub application_key: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    #[serde(default)]
    pub denied_users: Vec<String>,
    #[serde(default)]
    pub denied_groups: Vec<String>,

    #[serde(default)]
    pub policies: Vec<PolicySeed>,

    pub vector_db: Option<VectorDbSeed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySeed {
    pub tags: Vec<String>,

    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,

    pub prompt: Permission,
    pub reply: Permission,
    pub enriched_prompt: Permission,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbSeed {
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: VectorDbType,

    #[serde(default)]
    pub user_enforcement: bool,
    #[serde(default)]
    pub group_enforcement: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub policies: Vec<VectorDbPolicySeed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDbPolicySeed {
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub denied_users: Vec<String>,
    #[serde(default)]
    pub denied_groups: Vec<String>,
    #[serde(default)]
    pub denied_roles: Vec<String>,

    pub metadata_key: String,
    pub metadata_value: String,
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub applications: usize,
    pub policies: usize,
    pub vector_dbs: usize,
    pub vector_db_policies: usize,
    pub user_groups: usize,
}

fn default_enabled() -> bool {
    true
}

impl Database {
    /// Writes `data` in a single transaction and drops the cache afterwards.
    /// Nothing is written when any record fails.
    pub fn import(&self, data: &GovernanceData) -> Result<ImportSummary> {
        let summary = self.with_transaction(|tx, _cache| {
            let mut summary = ImportSummary::default();

            for seed in data.applications.iter() {
                let vector_db = match seed.vector_db {
                    Some(ref db_seed) => {
                        let db = tx
                            .create_vector_db(VectorDb {
                                id: 0,
                                name: db_seed.name.clone(),
                                db_type: db_seed.db_type,
                                user_enforcement: db_seed.user_enforcement,
                                group_enforcement: db_seed.group_enforcement,
                                enabled: db_seed.enabled,
                            })
                            .with_context(|| format!("create vector db '{}'", db_seed.name))?;
                        summary.vector_dbs += 1;

                        for p in db_seed.policies.iter() {
                            tx.create_vector_db_policy(VectorDbPolicy {
                                id: 0,
                                version: p.version,
                                vector_db_id: db.id,
                                allowed_users: p.allowed_users.clone(),
                                allowed_groups: p.allowed_groups.clone(),
                                allowed_roles: p.allowed_roles.clone(),
                                denied_users: p.denied_users.clone(),
                                denied_groups: p.denied_groups.clone(),
                                denied_roles: p.denied_roles.clone(),
                                metadata_key: p.metadata_key.clone(),
                                metadata_value: p.metadata_value.clone(),
                                operator: p.operator.clone(),
                            })
                            .with_context(|| format!("create policy for vector db '{}'", db.name))?;
                            summary.vector_db_policies += 1;
                        }
                        Some(db)
                    }
                    None => None,
                };

                let app = tx
                    .create_application(
                        AiApplication {
                            id: 0,
                            name: seed.name.clone(),
                            application_key: seed.application_key.clone(),
                            enabled: seed.enabled,
                        },
                        vector_db.map(|db| db.id),
                    )
                    .with_context(|| format!("create application '{}'", seed.name))?;
                summary.applications += 1;

                tx.put_application_config(&AiApplicationConfig {
                    application_id: app.id,
                    allowed_users: seed.allowed_users.clone(),
                    allowed_groups: seed.allowed_groups.clone(),
                    denied_users: seed.denied_users.clone(),
                    denied_groups: seed.denied_groups.clone(),
                })?;

                for p in seed.policies.iter() {
                    tx.create_policy(AiApplicationPolicy {
                        id: 0,
                        application_id: app.id,
                        tags: p.tags.clone(),
                        users: p.users.clone(),
                        groups: p.groups.clone(),
                        roles: p.roles.clone(),
                        prompt: p.prompt,
                        reply: p.reply,
                        enriched_prompt: p.enriched_prompt,
                    })
                    .with_context(|| format!("create policy for application '{}'", app.name))?;
                    summary.policies += 1;
                }
            }

            for (user_id, groups) in data.user_groups.iter() {
                for group in groups {
                    tx.add_user_group(user_id, group)?;
                    summary.user_groups += 1;
                }
            }

            Ok(summary)
        })?;

        self.invalidate()?;
        info!("Imported governance data: {summary:?}");
        Ok(summary)
    }
}
