use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};

use crate::filter::{build_metadata_filters, FilterExpressionSynthesizer, UnionSynthesizer};
use crate::store::PolicyStore;
use crate::types::request::{AuthzRequest, VectorDbAuthzRequest};
use crate::types::response::{AuthzResponse, VectorDbAuthzResponse, VectorDbPolicyInfo};

use super::engine::DecisionEngine;
use super::error::AuthzError;
use super::AuthzContext;

pub const APPLICATION_NOT_FOUND: &str = "application not found";
pub const APPLICATION_DISABLED: &str = "Application is disabled";
pub const VECTOR_DB_NOT_FOUND: &str = "Vector DB not found";
pub const VECTOR_DB_DISABLED: &str = "Vector DB is disabled";

/// Validates requests, loads governance data from the store and runs the
/// decision engine or the vector db filter synthesis.
///
/// Missing or disabled applications and vector dbs are answered with a
/// denial, never with an error.
pub struct AuthzService<S: PolicyStore> {
    store: Arc<S>,
    engine: DecisionEngine,
}

impl<S: PolicyStore> AuthzService<S> {
    /// Creates a service over a shared governance store.
    ///
    /// # Arguments
    /// * `store` - Arc wrapped store, usually the cached `Database`
    ///
    /// # Returns
    /// * A service with the default decision engine
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            engine: DecisionEngine::new(),
        }
    }

    /// Decides whether content may flow through an application.
    ///
    /// # Arguments
    /// * `req` - The content request, validated before any lookup
    ///
    /// # Returns
    /// * A response echoing the request with the decision, masked traits and
    ///   the ids of the deciding policies
    /// * `AuthzError::Validation` for malformed requests, `AuthzError::Store`
    ///   when governance data cannot be read
    pub async fn authorize(&self, req: &AuthzRequest) -> Result<AuthzResponse, AuthzError> {
        let request_type = req.validate()?;

        let Some(app) = self
            .store
            .get_application(&req.application_key)
            .await
            .context("get application")?
        else {
            info!(
                "Deny request {}: unknown application key '{}'",
                req.request_id, req.application_key
            );
            return Ok(AuthzResponse::denied(
                req,
                "",
                String::from(APPLICATION_NOT_FOUND),
                Default::default(),
            ));
        };
        if !app.enabled {
            info!(
                "Deny request {}: application '{}' is disabled",
                req.request_id, app.name
            );
            return Ok(AuthzResponse::denied(
                req,
                &app.name,
                String::from(APPLICATION_DISABLED),
                Default::default(),
            ));
        }

        let groups = self.user_groups(&req.user_id).await;
        let config = self
            .store
            .get_application_config(app.id)
            .await
            .context("get application config")?;
        let policies = self
            .store
            .get_policies(app.id, request_type, &req.traits)
            .await
            .context("get policies")?;

        let ctx = AuthzContext {
            request_type,
            user: &req.user_id,
            groups: &groups,
            traits: &req.traits,
            config: config.as_ref(),
            policies: &policies,
        };
        let decision = self.engine.decide(&ctx);
        debug!(
            "Request {} for user '{}' on '{}': authorized={}, reason='{}', policies={:?}",
            req.request_id,
            req.user_id,
            app.name,
            decision.authorized,
            decision.reason,
            decision.policy_ids
        );

        let resp = if decision.authorized {
            AuthzResponse::allowed(
                req,
                &app.name,
                decision.reason,
                decision.masked_traits,
                decision.policy_ids,
            )
        } else {
            AuthzResponse::denied(req, &app.name, decision.reason, decision.policy_ids)
        };
        Ok(resp)
    }

    /// Builds the retrieval filter for the vector db linked to an application.
    ///
    /// # Arguments
    /// * `req` - The requester and application key
    ///
    /// # Returns
    /// * A response carrying the dialect specific filter expression
    /// * `AuthzError::Filter` when a stored policy cannot be expressed
    pub async fn authorize_vector_db(
        &self,
        req: &VectorDbAuthzRequest,
    ) -> Result<VectorDbAuthzResponse, AuthzError> {
        req.validate()?;
        let rejected =
            |reason: &str| VectorDbAuthzResponse::rejected(&req.user_id, &req.application_key, reason);

        let Some(app) = self
            .store
            .get_application(&req.application_key)
            .await
            .context("get application")?
        else {
            return Ok(rejected(APPLICATION_NOT_FOUND));
        };
        if !app.enabled {
            return Ok(rejected(APPLICATION_DISABLED));
        }

        let Some(vector_db) = self
            .store
            .get_vector_db(app.id)
            .await
            .context("get vector db")?
        else {
            return Ok(rejected(VECTOR_DB_NOT_FOUND));
        };
        if !vector_db.enabled {
            return Ok(rejected(VECTOR_DB_DISABLED));
        }

        let groups = self.user_groups(&req.user_id).await;
        let policies = self
            .store
            .get_vector_db_policies(vector_db.id, &req.user_id, &groups)
            .await
            .context("get vector db policies")?;

        let filters = build_metadata_filters(&policies, &req.user_id, &groups)?;
        let synthesizer = UnionSynthesizer::from(vector_db.db_type);
        let filter_expression =
            synthesizer.create_filter_expression(&vector_db, &req.user_id, &groups, &filters)?;
        debug!(
            "Vector db filter for user '{}' on '{}': {filter_expression}",
            req.user_id, vector_db.name
        );

        Ok(VectorDbAuthzResponse {
            authorized: true,
            user_id: req.user_id.clone(),
            application_key: req.application_key.clone(),
            vector_db_id: Some(vector_db.id),
            vector_db_name: Some(vector_db.name.clone()),
            vector_db_type: Some(vector_db.db_type),
            user_enforcement: vector_db.user_enforcement,
            group_enforcement: vector_db.group_enforcement,
            filter_expression,
            vector_db_policy_info: policies.iter().map(VectorDbPolicyInfo::from).collect(),
            reason: String::from("allowed"),
        })
    }

    /// Group lookup failures are tolerated, the access lists and policies
    /// then only see the user id.
    async fn user_groups(&self, user_id: &str) -> Vec<String> {
        match self.store.get_user_groups(user_id).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Failed to get groups for user '{user_id}', continue without groups: {e:#}");
                vec![]
            }
        }
    }
}
