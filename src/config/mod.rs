use log::info;
use std::collections::{ BTreeSet, HashMap };
use thiserror::Error;

use crate::cli::Args;

pub const PLACEHOLDER_KEY: &str = "your_api_key_here";
const MODEL_KEY_PREFIX: &str = "AI_API_KEY_";
const GROUP_KEY_SUFFIX: &str = "GPT_OPUS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayConfigError {
    #[error("AI_API_KEY must be set")]
    MissingApiKey,
    #[error("AI_BASE_URL must be set")]
    MissingBaseUrl,
}

/// Upstream settings for the relay server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    pub default_key: String,
    /// `AI_API_KEY_<SUFFIX>` values keyed by suffix.
    pub model_keys: HashMap<String, String>,
    pub default_models: Vec<String>,
    pub fallback_model: String,
}

impl RelayConfig {
    /// Builds the config from parsed args plus the per-model key variables
    /// found in `vars` (normally `std::env::vars()`).
    pub fn from_args<I>(args: &Args, vars: I) -> Result<Self, RelayConfigError>
        where I: IntoIterator<Item = (String, String)>
    {
        let default_key = args.ai_api_key
            .clone()
            .filter(|k| is_usable_key(k))
            .ok_or(RelayConfigError::MissingApiKey)?;
        let base_url = args.ai_base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or(RelayConfigError::MissingBaseUrl)?;

        let model_keys: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let suffix = name.strip_prefix(MODEL_KEY_PREFIX)?;
                if suffix.is_empty() || !is_usable_key(&value) {
                    return None;
                }
                Some((suffix.to_string(), value))
            })
            .collect();

        let default_models = args.default_models
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();

        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_key,
            model_keys,
            default_models,
            fallback_model: args.fallback_model.clone(),
        };
        info!(
            "Relay upstream: {} ({} model-specific key(s))",
            config.base_url,
            config.model_keys.len()
        );
        Ok(config)
    }

    /// Picks the API key used for `model`.
    pub fn key_for_model(&self, model: &str) -> &str {
        let suffix = model.replace(['-', '.'], "_").to_uppercase();
        let mut specific = self.model_keys.get(&suffix);

        let lower = model.to_lowercase();
        if lower.contains("gpt") || lower.contains("opus") {
            if let Some(group_key) = self.model_keys.get(GROUP_KEY_SUFFIX) {
                specific = Some(group_key);
            }
        }

        specific.map(String::as_str).unwrap_or(&self.default_key)
    }

    /// Distinct keys to query when listing models.
    pub fn all_keys(&self) -> BTreeSet<&str> {
        std::iter::once(self.default_key.as_str())
            .chain(self.model_keys.values().map(String::as_str))
            .collect()
    }
}

fn is_usable_key(key: &str) -> bool {
    !key.trim().is_empty() && key != PLACEHOLDER_KEY
}
