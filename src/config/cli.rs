use crate::config::import_config::DEFAULT_CONFIG_FILE;
use clap::Parser;

pub const DEFAULT_ENVIRONMENT: &str = "develop";

#[derive(Debug, Clone, Parser)]
#[command(name = "config-import")]
#[command(about = "Import shop, module and theme configuration into the shop store")]
pub struct CliArgs {
    /// Path to the importer configuration (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Environment whose override directory is applied after the base files
    #[arg(short, long, default_value = DEFAULT_ENVIRONMENT)]
    pub env: String,

    /// Skip the environment layer entirely
    #[arg(long, conflicts_with = "env")]
    pub no_env: bool,

    /// Import only this shop from the manifest
    #[arg(short, long)]
    pub shop: Option<String>,

    /// No progress output, warnings and errors only
    #[arg(short = 'n', long)]
    pub no_debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Run against an in-memory store and print the writes instead of persisting them
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn environment(&self) -> Option<&str> {
        if self.no_env {
            None
        } else {
            Some(self.env.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["config-import"]);
        assert_eq!(args.config, DEFAULT_CONFIG_FILE);
        assert_eq!(args.environment(), Some(DEFAULT_ENVIRONMENT));
        assert!(args.shop.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_no_env_and_shop() {
        let args = CliArgs::parse_from(["config-import", "--no-env", "-s", "2", "-n"]);
        assert_eq!(args.environment(), None);
        assert_eq!(args.shop.as_deref(), Some("2"));
        assert!(args.no_debug);
    }

    #[test]
    fn test_explicit_env() {
        let args = CliArgs::parse_from(["config-import", "--env", "production"]);
        assert_eq!(args.environment(), Some("production"));
    }
}
