use anyhow::{Context, Result};
use patlimer_core::{
    backend::{LocalBackend, SnapshotStore},
    config::{AppConfig, BackendMode},
    gateway::{CommandGateway, CommandName, GatewayError, HttpGateway},
};
use serde_json::Value;
use tracing::info;

/// Backend binding chosen from configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    Local(LocalBackend),
    Remote(HttpGateway),
}

impl Backend {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.backend {
            BackendMode::Local => {
                let backend = LocalBackend::spawn(SnapshotStore::new(&config.data_dir))
                    .context("failed to start local backend")?;
                Ok(Self::Local(backend))
            }
            BackendMode::Remote => {
                let url = config
                    .backend_url
                    .as_deref()
                    .context("remote backend requires backend_url")?;
                let gateway = HttpGateway::new(url, config.request_timeout())?;
                info!(url = gateway.base_url(), "using remote backend");
                Ok(Self::Remote(gateway))
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Local(_) => "local".to_string(),
            Self::Remote(gateway) => gateway.base_url().to_string(),
        }
    }
}

impl CommandGateway for Backend {
    async fn invoke(&self, command: CommandName, payload: Value) -> Result<Value, GatewayError> {
        match self {
            Self::Local(backend) => backend.invoke(command, payload).await,
            Self::Remote(gateway) => gateway.invoke(command, payload).await,
        }
    }
}
