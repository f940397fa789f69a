use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Environment keys whose values are typed (address, flag, number).
const TYPED_ENV_KEYS: &[&str] = &["LISTEN_ADDR", "INSECURE_COOKIE", "REQUEST_TIMEOUT_SECS"];

/// Environment keys taken verbatim. Figment would otherwise read `123456` as a
/// number and `007` as `7`.
const TEXT_ENV_KEYS: &[&str] = &[
    "LOGLEVEL",
    "DATABASE_PATH",
    "STATIC_DIR",
    "SESSION_FILE_DIR",
    "SECRET_KEY",
    "OPENAI_API_KEY",
    "OPENAI_API_ENDPOINT",
    "OPENAI_MODELS",
    "QUALITY_MODELS",
    "ADMIN_PASSWORD",
];

/// Session cookie lifetime.
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Immutable runtime configuration, built once at start-up and shared through
/// the router state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub loglevel: String,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Content root served under `/static`.
    pub static_dir: PathBuf,
    /// Scratch directory for exported history documents.
    pub session_file_dir: PathBuf,
    /// Cookie encryption secret, at least 32 bytes.
    pub secret_key: Option<String>,
    pub insecure_cookie: bool,
    pub openai_api_key: String,
    pub openai_api_endpoint: Url,
    #[serde(deserialize_with = "comma_list")]
    pub openai_models: Vec<String>,
    /// Models that accept the `quality` parameter.
    #[serde(deserialize_with = "comma_list")]
    pub quality_models: Vec<String>,
    pub admin_password: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            loglevel: "info".to_string(),
            database_path: PathBuf::from("images.db"),
            static_dir: PathBuf::from("static"),
            session_file_dir: PathBuf::from("sessions"),
            secret_key: None,
            insecure_cookie: false,
            openai_api_key: String::new(),
            openai_api_endpoint: Url::parse("https://api.openai.com/v1/images/generations")
                .expect("default provider endpoint is a valid URL"),
            openai_models: vec!["dall-e-2".to_string(), "dall-e-3".to_string()],
            quality_models: vec!["dall-e-3".to_string()],
            admin_password: None,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml` if present, then the process environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::raw().only(TYPED_ENV_KEYS))
            .merge(Serialized::defaults(text_env()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> Option<&str> {
        self.openai_models.first().map(String::as_str)
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.openai_models.iter().any(|m| m == model)
    }

    pub fn takes_quality(&self, model: &str) -> bool {
        self.quality_models.iter().any(|m| m == model)
    }
}

fn text_env() -> BTreeMap<String, String> {
    Env::raw()
        .only(TEXT_ENV_KEYS)
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v))
        .collect()
}

/// Accepts either a comma-separated string or a list of strings.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::One(s) => s.split(',').map(str::to_string).collect(),
        Raw::Many(v) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
