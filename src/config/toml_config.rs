use crate::core::forge::ForgeOptions;
use crate::utils::error::{ForgeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

const DEFAULT_BIND: &str = "127.0.0.1:8787";
const DEFAULT_BUCKET: &str = "stl";
const DEFAULT_ENTITLEMENTS_TABLE: &str = "entitlements";
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 600;
const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SIGN_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paywall: PaywallConfig,
    pub backend: BackendConfig,
    pub supabase: SupabaseConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaywallConfig {
    /// Turning this off authorizes every request. Preview and demo deployments only.
    pub enabled: bool,
}

impl Default for PaywallConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: Option<String>,
    pub entitlements_table: Option<String>,
    pub signed_url_ttl_secs: Option<u64>,
    pub lookup_timeout_seconds: Option<u64>,
    pub sign_timeout_seconds: Option<u64>,
}

impl BackendConfig {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_GENERATE_TIMEOUT_SECS)
    }
}

impl SupabaseConfig {
    pub fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    pub fn entitlements_table(&self) -> &str {
        self.entitlements_table
            .as_deref()
            .unwrap_or(DEFAULT_ENTITLEMENTS_TABLE)
    }

    pub fn signed_url_ttl_secs(&self) -> u64 {
        self.signed_url_ttl_secs
            .unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS)
    }

    pub fn lookup_timeout_seconds(&self) -> u64 {
        self.lookup_timeout_seconds
            .unwrap_or(DEFAULT_LOOKUP_TIMEOUT_SECS)
    }

    pub fn sign_timeout_seconds(&self) -> u64 {
        self.sign_timeout_seconds.unwrap_or(DEFAULT_SIGN_TIMEOUT_SECS)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ForgeError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "expected a whole number".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl ForgeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ForgeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ForgeError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUPABASE_SERVICE_ROLE_KEY})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// 從環境變數建立配置
    pub fn from_env() -> Result<Self> {
        let backend_endpoint = env::var("FORGE_BACKEND_URL").ok();
        let supabase_url = env::var("SUPABASE_URL").ok();
        let service_key = env::var("SUPABASE_SERVICE_ROLE_KEY").ok();

        let paywall_enabled = match env::var("FORGE_PAYWALL_ENABLED") {
            Ok(raw) => parse_flag(&raw).ok_or_else(|| ForgeError::InvalidConfigValueError {
                field: "FORGE_PAYWALL_ENABLED".to_string(),
                value: raw.clone(),
                reason: "expected true/false".to_string(),
            })?,
            Err(_) => true,
        };

        Ok(Self {
            server: ServerConfig {
                bind: env::var("FORGE_BIND").ok(),
                cors_origins: env::var("FORGE_CORS_ORIGINS").ok().map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                }),
            },
            paywall: PaywallConfig {
                enabled: paywall_enabled,
            },
            backend: BackendConfig {
                endpoint: validation::validate_required_field("FORGE_BACKEND_URL", &backend_endpoint)?
                    .clone(),
                timeout_seconds: env_u64("FORGE_BACKEND_TIMEOUT_SECS")?,
            },
            supabase: SupabaseConfig {
                url: validation::validate_required_field("SUPABASE_URL", &supabase_url)?.clone(),
                service_key: validation::validate_required_field(
                    "SUPABASE_SERVICE_ROLE_KEY",
                    &service_key,
                )?
                .clone(),
                bucket: env::var("SUPABASE_BUCKET").ok(),
                entitlements_table: env::var("FORGE_ENTITLEMENTS_TABLE").ok(),
                signed_url_ttl_secs: env_u64("FORGE_SIGNED_URL_TTL_SECS")?,
                lookup_timeout_seconds: env_u64("FORGE_LOOKUP_TIMEOUT_SECS")?,
                sign_timeout_seconds: env_u64("FORGE_SIGN_TIMEOUT_SECS")?,
            },
        })
    }

    pub fn bind(&self) -> &str {
        self.server.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn forge_options(&self) -> ForgeOptions {
        ForgeOptions {
            paywall_enabled: self.paywall.enabled,
            signed_url_ttl_secs: self.supabase.signed_url_ttl_secs(),
        }
    }
}

impl Validate for ForgeConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_socket_addr("server.bind", self.bind())?;
        validation::validate_url("backend.endpoint", &self.backend.endpoint)?;
        validation::validate_range("backend.timeout_seconds", self.backend.timeout_seconds(), 1, 600)?;

        validation::validate_url("supabase.url", &self.supabase.url)?;
        validation::validate_non_empty_string("supabase.service_key", &self.supabase.service_key)?;
        validation::validate_non_empty_string("supabase.bucket", self.supabase.bucket())?;
        validation::validate_non_empty_string(
            "supabase.entitlements_table",
            self.supabase.entitlements_table(),
        )?;
        validation::validate_range(
            "supabase.signed_url_ttl_secs",
            self.supabase.signed_url_ttl_secs(),
            1,
            86_400,
        )?;
        validation::validate_range(
            "supabase.lookup_timeout_seconds",
            self.supabase.lookup_timeout_seconds(),
            1,
            60,
        )?;
        validation::validate_range(
            "supabase.sign_timeout_seconds",
            self.supabase.sign_timeout_seconds(),
            1,
            60,
        )?;

        if !self.paywall.enabled {
            tracing::warn!("⚠️ Paywall disabled: every generation request will be authorized");
        }
        Ok(())
    }
}
