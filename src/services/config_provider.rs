//! Configuration provider.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{validate_config, AppConfig, ConfigError};

/// Holds the merged configuration and checks it before anything starts.
#[derive(Debug)]
pub struct ConfigProvider {
    config: Arc<AppConfig>,
}

impl ConfigProvider {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Validate required sections. Fails with [`ConfigError::Invalid`].
    pub async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Invalid)?;
        tracing::debug!(app = %self.config.app.name, "Configuration validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.logging.level = "chatty".into();
        let provider = ConfigProvider::new(Arc::new(config));

        let err = provider.initialize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("logging.level"));
    }

    #[tokio::test]
    async fn test_accepts_defaults() {
        let provider = ConfigProvider::new(Arc::new(AppConfig::default()));
        assert!(provider.initialize(&CancellationToken::new()).await.is_ok());
    }
}
