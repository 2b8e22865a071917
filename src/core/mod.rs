pub mod entitlement;
pub mod forge;
pub mod normalizer;

pub use crate::domain::model::{CanonicalParams, GenerateOutput, GenerateRequest, ModelId};
pub use crate::domain::ports::{EntitlementStore, GenerationBackend, UrlSigner};
pub use crate::utils::error::Result;
