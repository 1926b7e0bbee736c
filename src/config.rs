use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionConfig;
use crate::signing::{BusinessParams, Credentials};

/// Environment variables override file values, e.g. `VISIT_ASR__ASR__ACCESS_SECRET`
pub const ENV_PREFIX: &str = "VISIT_ASR";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub asr: AsrConfig,
    #[serde(default)]
    pub audio: BusinessParams,
    #[serde(default)]
    pub streaming: SessionConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AsrConfig {
    /// WebSocket endpoint, e.g. `wss://office-api-ast-dx.iflyaisol.com/ast/communicate/v1`
    pub endpoint: String,
    pub app_id: String,
    pub access_key_id: String,
    #[serde(default)]
    pub access_secret: String,
}

impl std::fmt::Debug for AsrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsrConfig")
            .field("endpoint", &self.endpoint)
            .field("app_id", &self.app_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

impl AsrConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            app_id: self.app_id.clone(),
            access_key_id: self.access_key_id.clone(),
            access_secret: self.access_secret.clone(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
