use std::path::PathBuf;

use anyhow::Context;

use crate::analyst::GeminiConfig;
use crate::auth::AdminCredentials;

pub const DEFAULT_SESSION_FILE: &str = ".council-session.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub session_file: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub admin: Option<AdminCredentials>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin = match (get("COUNCIL_ADMIN_PHONE"), get("COUNCIL_ADMIN_PASSWORD")) {
            (Some(phone), Some(password)) => Some(AdminCredentials { phone, password }),
            _ => None,
        };

        Self {
            database_url: get("DATABASE_URL"),
            session_file: get("COUNCIL_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL"),
            admin,
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }

    pub fn gemini(&self) -> anyhow::Result<GeminiConfig> {
        let key = self
            .gemini_api_key
            .as_deref()
            .context("GEMINI_API_KEY must be set to use the analysis assistant")?;
        let config = GeminiConfig::new(key);
        Ok(match &self.gemini_model {
            Some(model) => config.with_model(model.clone()),
            None => config,
        })
    }
}
