use crate::config::SupabaseConfig;
use crate::domain::model::ModelId;
use crate::domain::ports::{EntitlementStore, UrlSigner};
use crate::utils::error::{ForgeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ForgeError::ConfigError {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

fn parse_base(url: &str) -> Result<Url> {
    Url::parse(url.trim_end_matches('/')).map_err(|e| ForgeError::InvalidConfigValueError {
        field: "supabase.url".to_string(),
        value: url.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })
}

/// Entitlement rows read through PostgREST (`/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct SupabaseEntitlements {
    client: Client,
    base_url: Url,
    service_key: String,
    table: String,
}

impl SupabaseEntitlements {
    pub fn new(base_url: &str, service_key: &str, table: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base(base_url)?,
            service_key: service_key.to_string(),
            table: table.to_string(),
        })
    }

    pub fn from_config(config: &SupabaseConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.service_key,
            config.entitlements_table(),
            config.lookup_timeout_seconds(),
        )
    }

    fn table_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ForgeError::ConfigError {
                message: "supabase.url cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);
        Ok(url)
    }

    /// Runs one filtered `select` and reports whether any row matched.
    async fn any_row(&self, filters: Vec<(&'static str, String)>) -> Result<bool> {
        let mut query: Vec<(&str, String)> =
            vec![("select", "id".to_string()), ("limit", "1".to_string())];
        query.extend(filters);

        let url = self.table_url()?;
        tracing::debug!("Querying entitlements at {}", url);

        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| ForgeError::EntitlementLookup {
                message: format!("entitlement store unreachable: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::EntitlementLookup {
                message: format!("entitlement query returned {}: {}", status, body),
            });
        }

        let rows: Vec<serde_json::Value> =
            response
                .json()
                .await
                .map_err(|e| ForgeError::EntitlementLookup {
                    message: format!("unexpected entitlement response: {}", e),
                })?;
        Ok(!rows.is_empty())
    }
}

fn not_expired(now: DateTime<Utc>) -> String {
    format!(
        "(expires_at.is.null,expires_at.gt.{})",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[async_trait]
impl EntitlementStore for SupabaseEntitlements {
    async fn has_active_subscription(&self, identity: &str, now: DateTime<Utc>) -> Result<bool> {
        self.any_row(vec![
            ("email", format!("eq.{}", identity)),
            ("status", "eq.active".to_string()),
            ("plan", "in.(maker,commercial)".to_string()),
            ("or", not_expired(now)),
        ])
        .await
    }

    async fn has_model_purchase(
        &self,
        identity: &str,
        model: &ModelId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.any_row(vec![
            ("email", format!("eq.{}", identity)),
            ("status", "eq.active".to_string()),
            ("plan", "eq.oneoff".to_string()),
            ("model", format!("eq.{}", model)),
            ("or", not_expired(now)),
        ])
        .await
    }
}

/// Signed download links from Supabase Storage.
#[derive(Debug, Clone)]
pub struct SupabaseSigner {
    client: Client,
    base_url: Url,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignReply {
    #[serde(rename = "signedURL")]
    signed_url: Option<String>,
    #[serde(rename = "signedUrl")]
    signed_url_camel: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl SignReply {
    fn signed(&self) -> Option<&str> {
        self.signed_url
            .as_deref()
            .or(self.signed_url_camel.as_deref())
            .filter(|signed| !signed.is_empty())
    }
}

impl SupabaseSigner {
    pub fn new(base_url: &str, service_key: &str, bucket: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base(base_url)?,
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    pub fn from_config(config: &SupabaseConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.service_key,
            config.bucket(),
            config.sign_timeout_seconds(),
        )
    }

    fn sign_url(&self, object_key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ForgeError::ConfigError {
                message: "supabase.url cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "object", "sign", self.bucket.as_str()])
            .extend(object_key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Storage answers with a path relative to `/storage/v1`.
    fn absolute(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = signed.trim_start_matches('/');
        format!("{}/storage/v1/{}", base, path)
    }
}

#[async_trait]
impl UrlSigner for SupabaseSigner {
    async fn sign(&self, object_key: &str, ttl_secs: u64) -> Result<String> {
        let url = self.sign_url(object_key)?;
        tracing::debug!("Signing {} for {}s", object_key, ttl_secs);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(|e| ForgeError::SigningFailed {
                message: format!("storage unreachable: {}", e),
            })?;

        let status = response.status();
        let reply: Option<SignReply> = response.json().await.ok();

        match reply {
            Some(reply) => {
                if let Some(signed) = reply.signed().filter(|_| status.is_success()) {
                    return Ok(self.absolute(signed));
                }
                Err(ForgeError::SigningFailed {
                    message: reply.error.or(reply.message).unwrap_or_else(|| {
                        format!("storage returned {} without a signed URL", status)
                    }),
                })
            }
            None => Err(ForgeError::SigningFailed {
                message: format!("storage returned {} with an unreadable body", status),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_url_keeps_key_segments() {
        let signer = SupabaseSigner::new("https://project.supabase.co/", "k", "stl", 10).unwrap();
        let url = signer.sign_url("abc/out file.stl").unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/storage/v1/object/sign/stl/abc/out%20file.stl"
        );
    }

    #[test]
    fn test_relative_signed_path_is_resolved() {
        let signer = SupabaseSigner::new("https://project.supabase.co", "k", "stl", 10).unwrap();
        assert_eq!(
            signer.absolute("/object/sign/stl/abc/out.stl?token=t"),
            "https://project.supabase.co/storage/v1/object/sign/stl/abc/out.stl?token=t"
        );
        assert_eq!(
            signer.absolute("https://cdn.example.com/x.stl"),
            "https://cdn.example.com/x.stl"
        );
    }

    #[test]
    fn test_table_url() {
        let store =
            SupabaseEntitlements::new("https://project.supabase.co", "k", "entitlements", 5).unwrap();
        assert_eq!(
            store.table_url().unwrap().as_str(),
            "https://project.supabase.co/rest/v1/entitlements"
        );
    }
}
