use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub api_retry_attempts: usize,
    pub redis_uri: Option<String>,
    pub drafts: DraftSettings,
    pub editor: EditorSettings,
    pub learner: LearnerSettings,
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftSettings {
    pub key_prefix: String,
    /// 0 keeps drafts until publish or explicit discard.
    pub ttl_seconds: u64,
    pub autosave_debounce_ms: u64,
}

impl DraftSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            key_prefix: "assignment-drafts".to_string(),
            ttl_seconds: 0,
            autosave_debounce_ms: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorSettings {
    pub keyboard_step: f64,
    pub keyboard_coarse_step: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            keyboard_step: 0.01,
            keyboard_coarse_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearnerSettings {
    pub id: String,
    pub classes: Vec<String>,
}

impl Default for LearnerSettings {
    fn default() -> Self {
        Self {
            id: "local-learner".to_string(),
            classes: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Local .env first, then the workspace root one
        if dotenvy::dotenv().is_err() {
            dotenvy::from_path("../../.env").ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("ASSIGNMENTS_API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000/api".to_string());

        let api_timeout_ms = settings
            .get_int("api.timeout_ms")
            .ok()
            .map(|v| v as u64)
            .or_else(|| parse_env("ASSIGNMENTS_API_TIMEOUT_MS"))
            .unwrap_or(5000);

        let api_retry_attempts = settings
            .get_int("api.retry_attempts")
            .ok()
            .map(|v| v.max(1) as usize)
            .or_else(|| parse_env("ASSIGNMENTS_API_RETRY_ATTEMPTS"))
            .unwrap_or(3);

        let redis_uri = settings
            .get_string("redis.uri")
            .ok()
            .or_else(|| env::var("REDIS_URI").ok())
            .filter(|uri| !uri.trim().is_empty());

        let defaults = DraftSettings::default();
        let drafts = DraftSettings {
            key_prefix: settings
                .get_string("drafts.key_prefix")
                .or_else(|_| env::var("DRAFT_KEY_PREFIX"))
                .unwrap_or(defaults.key_prefix),
            ttl_seconds: settings
                .get_int("drafts.ttl_seconds")
                .ok()
                .map(|v| v.max(0) as u64)
                .or_else(|| parse_env("DRAFT_TTL_SECONDS"))
                .unwrap_or(defaults.ttl_seconds),
            autosave_debounce_ms: settings
                .get_int("drafts.autosave_debounce_ms")
                .ok()
                .map(|v| v.max(0) as u64)
                .or_else(|| parse_env("AUTOSAVE_DEBOUNCE_MS"))
                .unwrap_or(defaults.autosave_debounce_ms),
        };

        let editor_defaults = EditorSettings::default();
        let editor = EditorSettings {
            keyboard_step: settings
                .get_float("editor.keyboard_step")
                .ok()
                .or_else(|| parse_env("EDITOR_KEYBOARD_STEP"))
                .filter(|step: &f64| *step > 0.0 && *step < 1.0)
                .unwrap_or(editor_defaults.keyboard_step),
            keyboard_coarse_step: settings
                .get_float("editor.keyboard_coarse_step")
                .ok()
                .or_else(|| parse_env("EDITOR_KEYBOARD_COARSE_STEP"))
                .filter(|step: &f64| *step > 0.0 && *step < 1.0)
                .unwrap_or(editor_defaults.keyboard_coarse_step),
        };

        let learner = LearnerSettings {
            id: settings
                .get_string("learner.id")
                .or_else(|_| env::var("LEARNER_ID"))
                .unwrap_or_else(|_| LearnerSettings::default().id),
            classes: settings
                .get_string("learner.classes")
                .or_else(|_| env::var("LEARNER_CLASSES"))
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "127.0.0.1:8090".to_string());

        if redis_uri.is_none() {
            tracing::warn!("REDIS_URI not set, drafts are kept in memory only");
        }

        Ok(Config {
            api_base_url,
            api_timeout_ms,
            api_retry_attempts,
            redis_uri,
            drafts,
            editor,
            learner,
            bind_addr,
        })
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    /// Settings for tests and embedded hosts that skip the environment.
    pub fn for_api(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_timeout_ms: 5000,
            api_retry_attempts: 3,
            redis_uri: None,
            drafts: DraftSettings::default(),
            editor: EditorSettings::default(),
            learner: LearnerSettings::default(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
