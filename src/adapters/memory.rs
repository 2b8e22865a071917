use crate::domain::model::{EntitlementRecord, ModelId};
use crate::domain::ports::EntitlementStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Process-local entitlement store for demos and tests.
#[derive(Debug, Default)]
pub struct InMemoryEntitlements {
    records: RwLock<Vec<EntitlementRecord>>,
}

impl InMemoryEntitlements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<EntitlementRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn insert(&self, record: EntitlementRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlements {
    async fn has_active_subscription(&self, identity: &str, now: DateTime<Utc>) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .any(|r| r.email == identity && r.grants_subscription(now)))
    }

    async fn has_model_purchase(
        &self,
        identity: &str,
        model: &ModelId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .any(|r| r.email == identity && r.grants_model(model, now)))
    }
}
