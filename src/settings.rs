use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::sync::LazyLock;

/// Registry host used as the key of the Docker config `auths` map
pub const DEFAULT_REGISTRY_HOST: &str = "registry.digitalocean.com";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    /// Base URL of the DigitalOcean API
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,

    /// Personal access token used for registry calls.
    /// Overridden by DIGITALOCEAN_TOKEN / DIGITALOCEAN_ACCESS_TOKEN
    #[serde(default)]
    pub token: String,

    /// Base URL of the OAuth service that revokes registry tokens
    #[serde(default = "default_oauth_endpoint")]
    pub oauth_endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            token: String::new(),
            oauth_endpoint: default_oauth_endpoint(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrySettings {
    /// Registry hostname the issued Docker config is keyed by
    #[serde(default = "default_registry_host")]
    pub host: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            host: default_registry_host(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpSettings {
    /// Request timeout in seconds. Unset means the HTTP client's default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_api_endpoint() -> String {
    "https://api.digitalocean.com".to_string()
}

fn default_oauth_endpoint() -> String {
    "https://cloud.digitalocean.com".to_string()
}

fn default_user_agent() -> String {
    format!("regcred/{}", env!("CARGO_PKG_VERSION"))
}

fn default_registry_host() -> String {
    DEFAULT_REGISTRY_HOST.to_string()
}

/// `${VAR}` or `${VAR:-default}` inside string config values
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env reference pattern is a valid regex")
});

const CONFIG_EXTENSIONS: [&str; 3] = ["toml", "yaml", "yml"];

/// How a config file layer is treated when no file exists for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Required,
    Optional,
}

impl Settings {
    /// Expand `${VAR}` references; unset variables fall back to their
    /// `:-default` or to an empty string
    fn expand_env_references(raw: &str) -> String {
        ENV_REFERENCE
            .replace_all(raw, |caps: &regex::Captures| {
                env::var(&caps[1])
                    .ok()
                    .or_else(|| caps.get(2).map(|default| default.as_str().to_string()))
                    .unwrap_or_default()
            })
            .into_owned()
    }

    /// Turn the merged config tree into JSON, expanding env references in
    /// every string leaf
    fn into_json(value: config::Value) -> serde_json::Value {
        use config::ValueKind;
        use serde_json::Value as Json;

        match value.kind {
            ValueKind::Nil => Json::Null,
            ValueKind::Boolean(flag) => Json::Bool(flag),
            ValueKind::I64(n) => Json::from(n),
            ValueKind::I128(n) => i64::try_from(n).map(Json::from).unwrap_or(Json::Null),
            ValueKind::U64(n) => Json::from(n),
            ValueKind::U128(n) => u64::try_from(n).map(Json::from).unwrap_or(Json::Null),
            ValueKind::Float(n) => serde_json::Number::from_f64(n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            ValueKind::String(text) => Json::String(Self::expand_env_references(&text)),
            ValueKind::Table(table) => Json::Object(
                table
                    .into_iter()
                    .map(|(key, value)| (key, Self::into_json(value)))
                    .collect(),
            ),
            ValueKind::Array(items) => {
                Json::Array(items.into_iter().map(Self::into_json).collect())
            }
        }
    }

    /// Add `<dir>/<name>.{toml,yaml,yml}` to the builder, the first extension found wins
    fn add_file_layer(
        builder: ConfigBuilder<DefaultState>,
        config_dir: &Path,
        name: &str,
        layer: Layer,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let found = CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file());

        match (found, layer) {
            (Some(path), _) => {
                tracing::info!("Loading config file: {}", path.display());
                Ok(builder.add_source(File::from(path)))
            }
            (None, Layer::Required) => Err(ConfigError::Message(format!(
                "Required config file not found: {}/{}.{{toml,yaml,yml}}",
                config_dir.display(),
                name
            ))),
            (None, Layer::Optional) => {
                tracing::debug!(
                    "Optional config file not found: {}/{}.{{toml,yaml,yml}}",
                    config_dir.display(),
                    name
                );
                Ok(builder)
            }
        }
    }

    /// Load settings from `REGCRED_CONFIG_DIR` (default `config`)
    ///
    /// Files are layered default → run mode → local, then `REGCRED__*`
    /// environment variables (`REGCRED__API__ENDPOINT`,
    /// `REGCRED__HTTP__TIMEOUT_SECS`, ...). A missing config directory is not
    /// an error; built-in defaults apply. When the directory exists,
    /// `default.*` must be present in it.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode =
            env::var("REGCRED_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("REGCRED_CONFIG_DIR").unwrap_or_else(|_| "config".into());

        Self::load(&config_dir, &run_mode)
    }

    pub fn load(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(config_dir);
        let mut builder = Config::builder();

        if dir.is_dir() {
            builder = Self::add_file_layer(builder, dir, "default", Layer::Required)?;
            builder = Self::add_file_layer(builder, dir, run_mode, Layer::Optional)?;
            // Not checked into git
            builder = Self::add_file_layer(builder, dir, "local", Layer::Optional)?;
        } else {
            tracing::debug!(
                "Config directory {} not found, using built-in defaults",
                config_dir
            );
        }

        // Parse values so numeric and boolean settings can come from the environment
        builder = builder.add_source(
            Environment::with_prefix("REGCRED")
                .separator("__")
                .try_parsing(true),
        );

        let root = builder
            .build()?
            .cache
            .into_table()
            .map_err(|e| ConfigError::Message(format!("Failed to get config table: {}", e)))?;

        let json_value = serde_json::Value::Object(
            root.into_iter()
                .map(|(key, value)| (key, Self::into_json(value)))
                .collect(),
        );

        let mut unused_fields = Vec::new();
        let mut settings: Settings = serde_ignored::deserialize(json_value, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field in config: {}", field);
        }

        // The conventional DigitalOcean variables take precedence over files
        // and REGCRED__API__TOKEN
        if let Some(token) = ["DIGITALOCEAN_TOKEN", "DIGITALOCEAN_ACCESS_TOKEN"]
            .into_iter()
            .filter_map(|var| env::var(var).ok())
            .find(|token| !token.is_empty())
        {
            settings.api.token = token;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_url(&self.api.endpoint, "api.endpoint")?;
        Self::validate_url(&self.api.oauth_endpoint, "api.oauth_endpoint")?;

        if self.registry.host.is_empty() || self.registry.host.contains('/') {
            return Err(ConfigError::Message(format!(
                "registry.host must be a bare hostname. Got: '{}'",
                self.registry.host
            )));
        }

        if self.http.timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "http.timeout_secs must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_url(value: &str, field_name: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(value).map_err(|e| {
            ConfigError::Message(format!(
                "'{}' is not a valid URL ({}). Got: '{}'",
                field_name, e, value
            ))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "'{}' must use http or https. Got: '{}'",
                field_name, value
            )));
        }
        Ok(())
    }
}
