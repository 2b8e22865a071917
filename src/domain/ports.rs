use crate::domain::model::{GenerationJob, GeneratorReply, ModelId};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only view of persisted entitlements.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Any active `maker`/`commercial` record for `identity` not yet expired at `now`.
    async fn has_active_subscription(&self, identity: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Any active `oneoff` record for `identity` scoped to `model`.
    async fn has_model_purchase(
        &self,
        identity: &str,
        model: &ModelId,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

/// External solid-modeling service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, job: &GenerationJob) -> Result<GeneratorReply>;
}

/// Exchanges an object key for a time-limited download URL.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, object_key: &str, ttl_secs: u64) -> Result<String>;
}
