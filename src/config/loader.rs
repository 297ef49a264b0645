use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(&content)?;

    Ok(config)
}

/// Apply GEMINI_* environment variables on top of file configuration.
///
/// `lookup` is usually `std::env::var`; tests pass a map instead of touching
/// the process environment.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
        config.gemini.api_key = Some(key);
    }
    if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
        config.gemini.model = model;
    }
    if let Some(url) = lookup("GEMINI_BASE_URL").filter(|u| !u.trim().is_empty()) {
        config.gemini.base_url = url;
    }
}
