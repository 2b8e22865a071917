pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::ServerArgs;

pub use crate::config::ForgeConfig;
pub use crate::core::forge::{ForgeEngine, ForgeOptions};
pub use crate::core::normalizer::normalize;
pub use crate::utils::error::{ForgeError, Result};
