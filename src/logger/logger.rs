use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const BOOTSTRAP_DIRECTIVES: &str = "info";

pub struct LogConfig {
    pub filter: String,
}

/// Global subscriber whose filter can be swapped once settings are loaded.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
    env_directives: Option<String>,
}

impl Logger {
    /// Installs the subscriber, filtering by `RUST_LOG` or `info` until
    /// [`Logger::reload_from_config`] is called.
    pub fn new_bootstrap() -> Self {
        let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = parse_filter(effective_directives(
            env_directives.as_deref(),
            BOOTSTRAP_DIRECTIVES,
        ))
        .unwrap_or_else(|_| EnvFilter::new(BOOTSTRAP_DIRECTIVES));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();

        Self {
            reload_handle,
            env_directives,
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        let filter = parse_filter(effective_directives(
            self.env_directives.as_deref(),
            &config.filter,
        ))?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

/// A non-blank `RUST_LOG` wins over the configured directives.
fn effective_directives<'a>(env: Option<&'a str>, configured: &'a str) -> &'a str {
    match env {
        Some(env) if !env.trim().is_empty() => env,
        _ => configured,
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| anyhow!("invalid log filter {directives:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_directives_take_precedence() {
        assert_eq!(
            effective_directives(Some("refreshgate=trace"), "info"),
            "refreshgate=trace"
        );
        assert_eq!(effective_directives(Some("  "), "info"), "info");
        assert_eq!(effective_directives(None, "refreshgate=debug,info"), "refreshgate=debug,info");
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("refreshgate=debug,info").is_ok());
        assert!(parse_filter("refreshgate=loud").is_err());
    }
}
