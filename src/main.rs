use anyhow::Context;
use clap::Parser;
use shop_config_import::adapters::local::scan_modules;
use shop_config_import::domain::model::ImportReport;
use shop_config_import::utils::error::ErrorSeverity;
use shop_config_import::utils::{logger, validation::Validate};
use shop_config_import::{CliArgs, ImportConfig, ImportEngine, ImportError, LocalShopStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose, args.no_debug);
    } else {
        logger::init_cli_logger(args.verbose, args.no_debug);
    }

    tracing::debug!("CLI args: {:?}", args);
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match ImportConfig::from_file(&args.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    if !config.excluded_fields().is_empty() {
        tracing::debug!("Excluded fields: {}", config.excluded_fields().join(", "));
    }

    let result = if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be persisted");
        let store = MemoryStore::new();
        let modules = match scan_modules(&config.modules_dir()) {
            Ok(modules) => modules,
            Err(e) => exit_with(&e),
        };
        for module in modules {
            store.install(module);
        }
        let result = ImportEngine::new(&config, &store, &store)
            .with_environment(args.environment())
            .with_shop_filter(args.shop.as_deref())
            .run()
            .await;
        if result.is_ok() {
            for event in store.events() {
                println!(
                    "{}",
                    serde_json::to_string(&event).context("serializing planned write")?
                );
            }
        }
        result
    } else {
        let store = LocalShopStore::new(config.store_dir(), config.modules_dir());
        ImportEngine::new(&config, &store, &store)
            .with_environment(args.environment())
            .with_shop_filter(args.shop.as_deref())
            .run()
            .await
    };

    match result {
        Ok(report) => print_summary(&report),
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn print_summary(report: &ImportReport) {
    tracing::info!(
        "✅ Imported {} shop(s), {} writes, {} warning(s)",
        report.shops.len(),
        report.total_writes(),
        report.warnings.len()
    );
    if let Ok(json) = serde_json::to_string(report) {
        tracing::debug!("Import report: {}", json);
    }
}

fn exit_with(e: &ImportError) -> ! {
    tracing::error!(
        "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
