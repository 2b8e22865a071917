#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::ServerArgs;
pub use toml_config::{BackendConfig, ForgeConfig, PaywallConfig, ServerConfig, SupabaseConfig};
