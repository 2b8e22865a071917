use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "stl-forge")]
#[command(about = "Entitlement-gated proxy in front of the parametric STL generator")]
pub struct ServerArgs {
    /// Path to a TOML configuration file. Environment variables are used when omitted.
    #[arg(short, long, env = "FORGE_CONFIG")]
    pub config: Option<String>,

    /// Override the listen address from the configuration
    #[arg(long)]
    pub bind: Option<String>,

    /// Authorize every request (preview/demo deployments only)
    #[arg(long)]
    pub no_paywall: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "FORGE_JSON_LOGS")]
    pub json_logs: bool,
}
