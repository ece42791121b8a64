use crate::models::error::{ForwardError, Result};
use log::info;
use serde::Deserialize;

pub const TABLE_NAME_VAR: &str = "LOGS_TABLE_NAME";
pub const OPT_IN_KEY_VAR: &str = "LOGS_OPT_IN_KEY";
pub const DELIVERY_THREADS_VAR: &str = "LOGS_DELIVERY_THREADS";

pub const DEFAULT_OPT_IN_KEY: &str = "supabase";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub logs_table_name: String,
    #[serde(default = "default_opt_in_key")]
    pub opt_in_key: String,
    #[serde(default = "default_delivery_threads")]
    pub delivery_threads: usize,
}

fn default_opt_in_key() -> String {
    DEFAULT_OPT_IN_KEY.to_string()
}

fn default_delivery_threads() -> usize {
    num_cpus::get_physical()
}

impl TransportConfig {
    pub fn new(logs_table_name: impl Into<String>) -> Self {
        Self {
            logs_table_name: logs_table_name.into(),
            opt_in_key: default_opt_in_key(),
            delivery_threads: default_delivery_threads(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from any key/value source and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let logs_table_name = lookup(TABLE_NAME_VAR).ok_or(ForwardError::MissingTableName)?;

        let opt_in_key = lookup(OPT_IN_KEY_VAR).unwrap_or_else(default_opt_in_key);

        let delivery_threads = match lookup(DELIVERY_THREADS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|cause| ForwardError::InvalidSetting {
                    key: DELIVERY_THREADS_VAR.to_string(),
                    value: raw.clone(),
                    reason: cause.to_string(),
                })?,
            None => default_delivery_threads(),
        };

        let config = Self {
            logs_table_name,
            opt_in_key,
            delivery_threads,
        };
        config.validate()?;

        info!(
            "Loaded log forwarding config: table={}, opt_in_key={}",
            config.logs_table_name, config.opt_in_key
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.logs_table_name.trim().is_empty() {
            return Err(ForwardError::MissingTableName);
        }

        if self.opt_in_key.trim().is_empty() {
            return Err(ForwardError::InvalidSetting {
                key: OPT_IN_KEY_VAR.to_string(),
                value: self.opt_in_key.clone(),
                reason: "opt-in key cannot be empty".to_string(),
            });
        }

        if self.opt_in_key == "level" || self.opt_in_key == "message" {
            return Err(ForwardError::InvalidSetting {
                key: OPT_IN_KEY_VAR.to_string(),
                value: self.opt_in_key.clone(),
                reason: "opt-in key cannot shadow a named record field".to_string(),
            });
        }

        if self.delivery_threads == 0 {
            return Err(ForwardError::InvalidSetting {
                key: DELIVERY_THREADS_VAR.to_string(),
                value: "0".to_string(),
                reason: "delivery_threads must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
