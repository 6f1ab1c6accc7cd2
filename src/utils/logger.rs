use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter(verbose: bool, quiet: bool) -> EnvFilter {
    let directives = if quiet {
        "shop_config_import=warn,warn"
    } else if verbose {
        "shop_config_import=debug,info"
    } else {
        "shop_config_import=info"
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// `quiet` 對應 `--no-debug`：只保留警告與錯誤
pub fn init_cli_logger(verbose: bool, quiet: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, quiet))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_json_logger(verbose: bool, quiet: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose, quiet))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(), // machine-readable output for CI logs
        )
        .init();
}
