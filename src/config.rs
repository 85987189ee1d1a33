//! Embedding provider settings: command-line flag, then environment
//! variable, then the model recorded in the store, then built-in defaults.

use std::time::Duration;

use tracing::warn;

use crate::{
    embedding::EmbedderConfig,
    error::{Error, Result},
};

pub const OLLAMA_URL_ENV: &str = "RAGRANK_OLLAMA_URL";
pub const EMBED_MODEL_ENV: &str = "RAGRANK_EMBED_MODEL";
pub const EMBED_TIMEOUT_ENV: &str = "RAGRANK_EMBED_TIMEOUT";

/// Provider settings from one source. Unset fields defer to the next source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedderSettings {
    pub ollama_url: Option<String>,
    pub embed_model: Option<String>,
    /// Seconds.
    pub embed_timeout: Option<u64>,
}

impl EmbedderSettings {
    /// Read the `RAGRANK_*` provider variables. Empty values count as unset.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        };
        let embed_timeout = var(EMBED_TIMEOUT_ENV)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    Error::InvalidConfiguration(format!(
                        "{EMBED_TIMEOUT_ENV} must be a whole number of \
                         seconds, got {raw:?}"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            ollama_url: var(OLLAMA_URL_ENV),
            embed_model: var(EMBED_MODEL_ENV),
            embed_timeout,
        })
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            ollama_url: self.ollama_url.or(fallback.ollama_url),
            embed_model: self.embed_model.or(fallback.embed_model),
            embed_timeout: self.embed_timeout.or(fallback.embed_timeout),
        }
    }

    /// Build the final config.
    ///
    /// `recorded_model` is the model a store was built with. It is used when
    /// no model is set explicitly; an explicit model that differs from it is
    /// used with a warning.
    pub fn resolve(
        self,
        recorded_model: Option<&str>,
    ) -> Result<EmbedderConfig> {
        let defaults = EmbedderConfig::default();

        let model = match (self.embed_model, recorded_model) {
            (Some(explicit), Some(recorded)) if explicit != recorded => {
                warn!(
                    requested = %explicit,
                    recorded = %recorded,
                    "embedding model differs from the store's model"
                );
                explicit
            }
            (Some(explicit), _) => explicit,
            (None, Some(recorded)) => recorded.to_string(),
            (None, None) => defaults.model,
        };

        let timeout = match self.embed_timeout {
            Some(0) => {
                return Err(Error::InvalidConfiguration(
                    "embedding timeout must be at least 1 second".into(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        Ok(EmbedderConfig {
            base_url: self.ollama_url.unwrap_or(defaults.base_url),
            model,
            timeout,
        })
    }
}
