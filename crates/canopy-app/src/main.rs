mod cli;
mod commands;
mod tools;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use canopy_common::{CanopyError, ConfigError};
use canopy_config::CanopyConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "canopy=info";

fn init_logging(directives: &str) {
    let mut filter = EnvFilter::from_default_env();
    for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
        match directive.trim().parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("ignoring invalid log directive {directive:?}: {e}"),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<CanopyConfig, ConfigError> {
    match path {
        Some(path) => canopy_config::load_config_from(Path::new(path)),
        None => canopy_config::load_config(),
    }
}

/// `--log-level` wins, then the config's `[logging] level`.
fn log_directive(flag: Option<&str>, config: Option<&CanopyConfig>) -> String {
    match (flag, config) {
        (Some(level), _) => format!("canopy={level},canopy_ai={level}"),
        (None, Some(config)) => config.logging.level.directive().to_string(),
        (None, None) => DEFAULT_LOG_DIRECTIVE.to_string(),
    }
}

async fn run(args: cli::Args, config: CanopyConfig) -> Result<String, CanopyError> {
    let data_dir = match &args.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => config.store.resolved_data_dir().ok_or_else(|| {
            CanopyError::Other("no data directory available, pass --data-dir".into())
        })?,
    };
    let ctx = commands::Context::open(config, data_dir, &args.user, args.admin)?;
    ctx.run(args.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Config is loaded before logging so its level can apply; a load
    // failure is reported once the subscriber is up.
    let loaded = load_config(args.config.as_deref());
    init_logging(&log_directive(args.log_level.as_deref(), loaded.as_ref().ok()));

    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_some() => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!("Config load failed, using defaults: {e}");
            CanopyConfig::default()
        }
    };
    tracing::debug!("canopy v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args, config).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_config::LogLevel;

    #[test]
    fn flag_overrides_config_level() {
        let mut config = CanopyConfig::default();
        config.logging.level = LogLevel::Warn;
        assert_eq!(
            log_directive(Some("debug"), Some(&config)),
            "canopy=debug,canopy_ai=debug"
        );
        assert_eq!(
            log_directive(None, Some(&config)),
            "canopy=warn,canopy_ai=warn"
        );
        assert_eq!(log_directive(None, None), "canopy=info");
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load_config(Some("/tmp/canopy-missing-config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
