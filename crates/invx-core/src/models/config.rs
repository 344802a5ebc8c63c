//! Configuration resolved from the process environment.

use std::fmt;

use invx_vision::Backend;
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable bounding the input size.
pub const MAX_FILE_SIZE_VAR: &str = "MAX_FILE_SIZE_MB";

/// Default input size limit in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

/// Input formats accepted by default.
pub const SUPPORTED_FORMATS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Settings for one backend family.
#[derive(Clone)]
pub struct BackendSettings {
    pub backend: Backend,
    /// API credential, `None` when unset or blank.
    pub credential: Option<String>,
    pub model: String,
    /// Endpoint override.
    pub base_url: Option<String>,
}

impl BackendSettings {
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("backend", &self.backend)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// The backend picked by the preference policy.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendSelection {
    pub backend: Backend,
    pub model: String,
    pub credential: String,
    pub base_url: Option<String>,
}

impl fmt::Debug for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSelection")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Extractor configuration.
///
/// Built once at program start and passed to the extractor by reference.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Backends in preference order.
    backends: Vec<BackendSettings>,
    max_file_size_mb: u64,
    supported_formats: Vec<String>,
}

impl ExtractorConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backends = Backend::ALL
            .iter()
            .map(|&backend| BackendSettings {
                backend,
                credential: non_blank(backend.credential_var()),
                model: non_blank(backend.model_var())
                    .unwrap_or_else(|| backend.default_model().to_string()),
                base_url: non_blank(backend.base_url_var()),
            })
            .collect();

        let max_file_size_mb = match non_blank(MAX_FILE_SIZE_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: MAX_FILE_SIZE_VAR.to_string(),
                value,
            })?,
            None => DEFAULT_MAX_FILE_SIZE_MB,
        };

        let config = Self {
            backends,
            max_file_size_mb,
            supported_formats: SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
        };
        debug!(
            "Resolved configuration: backends={:?}, max_file_size_mb={}",
            config.configured_backends(),
            config.max_file_size_mb
        );
        Ok(config)
    }

    /// Replace the accepted format set.
    pub fn with_supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_file_size_mb(mut self, limit: u64) -> Self {
        self.max_file_size_mb = limit;
        self
    }

    /// True when at least one backend credential is set.
    pub fn has_backend(&self) -> bool {
        self.backends.iter().any(BackendSettings::is_configured)
    }

    /// Pick the backend to use: OpenAI, then Gemini, then Anthropic.
    pub fn preferred_backend(&self) -> Result<BackendSelection, ConfigError> {
        self.backends
            .iter()
            .find_map(|settings| {
                settings.credential.as_ref().map(|credential| BackendSelection {
                    backend: settings.backend,
                    model: settings.model.clone(),
                    credential: credential.clone(),
                    base_url: settings.base_url.clone(),
                })
            })
            .ok_or(ConfigError::NoBackendConfigured)
    }

    /// Settings for one backend family.
    pub fn backend(&self, backend: Backend) -> Option<&BackendSettings> {
        self.backends.iter().find(|s| s.backend == backend)
    }

    pub fn configured_backends(&self) -> Vec<Backend> {
        self.backends
            .iter()
            .filter(|s| s.is_configured())
            .map(|s| s.backend)
            .collect()
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    /// Size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn supported_formats(&self) -> &[String] {
        &self.supported_formats
    }

    pub fn accepts_format(&self, format: &str) -> bool {
        self.supported_formats.iter().any(|f| f == format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ExtractorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExtractorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert!(!config.has_backend());
        assert_eq!(config.max_file_size_mb(), 10);
        assert_eq!(config.max_file_size_bytes(), 10_485_760);
        assert_eq!(config.supported_formats(), ["pdf", "png", "jpg", "jpeg"]);
        assert_eq!(
            config.backend(Backend::Gemini).unwrap().model,
            "gemini-2.0-flash-exp"
        );
        assert_eq!(
            config.preferred_backend(),
            Err(ConfigError::NoBackendConfigured)
        );
    }

    #[test]
    fn test_preference_order() {
        let all = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "gm-key"),
            ("ANTHROPIC_API_KEY", "ant-key"),
        ];

        let selection = config(&all).unwrap().preferred_backend().unwrap();
        assert_eq!(selection.backend, Backend::OpenAi);
        assert_eq!(selection.model, "gpt-4o");
        assert_eq!(selection.credential, "sk-openai");

        let selection = config(&all[1..]).unwrap().preferred_backend().unwrap();
        assert_eq!(selection.backend, Backend::Gemini);

        let selection = config(&all[2..]).unwrap().preferred_backend().unwrap();
        assert_eq!(selection.backend, Backend::Anthropic);
        assert_eq!(selection.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_blank_credentials_are_unset() {
        let config = config(&[("OPENAI_API_KEY", "  "), ("GEMINI_API_KEY", "gm")]).unwrap();
        assert_eq!(config.configured_backends(), vec![Backend::Gemini]);
        assert_eq!(
            config.preferred_backend().unwrap().backend,
            Backend::Gemini
        );
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OPENAI_API_KEY", "sk"),
            ("OPENAI_MODEL", "gpt-4.1-mini"),
            ("OPENAI_BASE_URL", "http://127.0.0.1:9999/v1"),
            ("MAX_FILE_SIZE_MB", "1"),
        ])
        .unwrap();

        let selection = config.preferred_backend().unwrap();
        assert_eq!(selection.model, "gpt-4.1-mini");
        assert_eq!(selection.base_url.as_deref(), Some("http://127.0.0.1:9999/v1"));
        assert_eq!(config.max_file_size_bytes(), 1_048_576);
    }

    #[test]
    fn test_invalid_size_limit() {
        let err = config(&[("MAX_FILE_SIZE_MB", "ten")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "MAX_FILE_SIZE_MB".to_string(),
                value: "ten".to_string(),
            }
        );
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = config(&[("ANTHROPIC_API_KEY", "secret-value")]).unwrap();
        let rendered = format!("{:?} {:?}", config, config.preferred_backend().unwrap());
        assert!(!rendered.contains("secret-value"));
    }
}
