use crate::core::entitlement::EntitlementGate;
use crate::core::normalizer;
use crate::domain::model::{GenerateOutput, GenerateRequest, GenerationJob};
use crate::domain::ports::{EntitlementStore, GenerationBackend, UrlSigner};
use crate::utils::error::{ForgeError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForgeOptions {
    pub paywall_enabled: bool,
    pub signed_url_ttl_secs: u64,
}

impl Default for ForgeOptions {
    fn default() -> Self {
        Self {
            paywall_enabled: true,
            signed_url_ttl_secs: 600,
        }
    }
}

/// One generation request: paywall, normalize, generate, sign.
#[derive(Clone)]
pub struct ForgeEngine {
    gate: EntitlementGate,
    backend: Arc<dyn GenerationBackend>,
    signer: Arc<dyn UrlSigner>,
    options: ForgeOptions,
}

impl ForgeEngine {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        backend: Arc<dyn GenerationBackend>,
        signer: Arc<dyn UrlSigner>,
        options: ForgeOptions,
    ) -> Self {
        Self {
            gate: EntitlementGate::new(store),
            backend,
            signer,
            options,
        }
    }

    pub fn options(&self) -> ForgeOptions {
        self.options
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput> {
        let GenerateRequest {
            model,
            params,
            holes,
            identity,
        } = request;

        // Paywall
        if self.options.paywall_enabled {
            let identity = identity.as_deref().ok_or(ForgeError::IdentityRequired)?;
            if !self.gate.is_authorized(identity, &model).await? {
                tracing::info!("🔒 {} is not entitled to {}", identity, model);
                return Err(ForgeError::NotEntitled {
                    model: model.to_string(),
                });
            }
        }

        for hole in &holes {
            hole.check()?;
        }

        // Normalize
        let params = normalizer::normalize(&model, &params);
        tracing::debug!("Normalized params for {}: {:?}", model, params);

        // Generate
        let job = GenerationJob {
            model,
            params,
            holes,
        };
        let reply = self.backend.generate(&job).await?;
        let object_key = match reply.object_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                return Err(ForgeError::GeneratorMalformed {
                    message: reply
                        .error
                        .unwrap_or_else(|| "reply is missing object_key".to_string()),
                })
            }
        };
        tracing::info!("🧱 Generated {} -> {}", job.model, object_key);

        // Sign
        let url = self
            .signer
            .sign(&object_key, self.options.signed_url_ttl_secs)
            .await
            .map_err(signing_error)?;

        let thumb_url = match reply.thumb_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(thumb_key) => match self
                .signer
                .sign(thumb_key, self.options.signed_url_ttl_secs)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Thumbnail {} could not be signed: {}", thumb_key, e);
                    None
                }
            },
            None => None,
        };

        Ok(GenerateOutput {
            url,
            object_key,
            thumb_url,
        })
    }
}

fn signing_error(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::SigningFailed { .. } => err,
        other => ForgeError::SigningFailed {
            message: other.to_string(),
        },
    }
}
