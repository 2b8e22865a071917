use clap::Parser;
use stl_forge::adapters::{HttpGenerationBackend, SupabaseEntitlements, SupabaseSigner};
use stl_forge::core::normalizer::validate_override_table;
use stl_forge::utils::{logger, validation::Validate};
use stl_forge::{server, ForgeConfig, ForgeEngine, ServerArgs};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.json_logs);

    tracing::info!("🚀 Starting stl-forge");

    // 載入配置
    let loaded = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            ForgeConfig::from_file(path)
        }
        None => ForgeConfig::from_env(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(bind) = &args.bind {
        config.server.bind = Some(bind.clone());
    }
    if args.no_paywall {
        config.paywall.enabled = false;
    }

    // 驗證配置
    if let Err(e) = config.validate().and_then(|_| validate_override_table()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let store = SupabaseEntitlements::from_config(&config.supabase)?;
    let signer = SupabaseSigner::from_config(&config.supabase)?;
    let backend = HttpGenerationBackend::from_config(&config.backend)?;
    let engine = ForgeEngine::new(
        Arc::new(store),
        Arc::new(backend),
        Arc::new(signer),
        config.forge_options(),
    );
    let options = engine.options();
    tracing::debug!("Forge options: {:?}", options);

    let router = server::app(
        engine,
        server::cors_layer(config.server.cors_origins.as_deref()),
    );

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;
    tracing::info!(
        "✅ Listening on {} (paywall {})",
        config.bind(),
        if options.paywall_enabled { "on" } else { "off" }
    );
    axum::serve(listener, router).await?;

    Ok(())
}
