use crate::domain::model::ModelId;
use crate::domain::ports::EntitlementStore;
use crate::utils::error::{ForgeError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Paywall check against persisted entitlements.
///
/// A live subscription covers every model; otherwise a one-off purchase scoped to the exact
/// model is required. Store failures are returned as `EntitlementLookup`, never as `Ok(false)`.
#[derive(Clone)]
pub struct EntitlementGate {
    store: Arc<dyn EntitlementStore>,
}

impl EntitlementGate {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self { store }
    }

    pub async fn is_authorized(&self, identity: &str, model: &ModelId) -> Result<bool> {
        self.is_authorized_at(identity, model, Utc::now()).await
    }

    pub async fn is_authorized_at(
        &self,
        identity: &str,
        model: &ModelId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let subscribed = self
            .store
            .has_active_subscription(identity, now)
            .await
            .map_err(lookup_error)?;
        if subscribed {
            tracing::debug!("Subscription grants access to {}", model);
            return Ok(true);
        }

        let purchased = self
            .store
            .has_model_purchase(identity, model, now)
            .await
            .map_err(lookup_error)?;
        if purchased {
            tracing::debug!("One-off purchase grants access to {}", model);
        }
        Ok(purchased)
    }
}

fn lookup_error(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::EntitlementLookup { .. } => err,
        other => ForgeError::EntitlementLookup {
            message: other.to_string(),
        },
    }
}
