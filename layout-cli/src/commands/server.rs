use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use layout_service::{
    build_info, config::Config, observability::init_tracing, service_builder::ServiceBuilder,
};

pub async fn execute(conf: PathBuf) -> Result<()> {
    let config = Config::load_from(&conf)
        .with_context(|| format!("Failed to load config from {}", conf.display()))?;

    // Held until the server exits so buffered log lines are flushed
    let _log_guard =
        init_tracing(&config.log, &config.service.name).context("Failed to initialize logging")?;
    build_info::show_info();
    log_config_source(&conf);

    let service = ServiceBuilder::new()
        .with_config(config)
        .build()
        .context("Failed to build service")?;

    service.serve().await.context("Server exited with an error")?;

    Ok(())
}

/// Config loading runs before logging exists, so its source is reported here
fn log_config_source(conf: &Path) {
    match config_source(conf) {
        Ok(message) => tracing::info!("{}", message),
        Err(message) => tracing::warn!("{}", message),
    }
}

fn config_source(conf: &Path) -> std::result::Result<String, String> {
    if conf.is_file() {
        Ok(format!("Loaded config from {}", conf.display()))
    } else {
        Err(format!(
            "Config file {} not found, using defaults and environment",
            conf.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_existing_file() {
        let conf = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let message = config_source(conf).unwrap();
        assert!(message.starts_with("Loaded config from "), "{}", message);
    }

    #[test]
    fn test_config_source_missing_file() {
        let conf = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/no-such-config.toml"));
        let message = config_source(conf).unwrap_err();
        assert!(message.contains("not found"), "{}", message);
    }
}
