use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};

/// Full application configuration.
/// Secrets (API keys, SMTP password) come from env/.env only and are never logged.
#[derive(Clone)]
pub struct Config {
    // LLM
    pub groq_api_key: String,
    pub model: String,
    pub llm_base_url: String,
    pub llm_timeout_s: u64,
    pub chunk_max_tokens: usize,

    // Email
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: String,

    // Regulatory updates
    pub recitals_url: String,
    pub feed_url: String,
    pub updates_limit: usize,
    /// Service-account JSON used for the spreadsheet API.
    pub google_credentials_path: String,
    pub sheet_id: String,

    // Web
    pub web_bind: String,
    pub web_port: u16,
    pub static_dir: String,
    pub max_upload_mb: usize,
}

/// SMTP settings, present only when both sender credentials are configured.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub sender_email: String,
    pub sender_password: String,
}

/// Spreadsheet settings, present only when a credential file and sheet id are configured.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub credentials_path: String,
    pub sheet_id: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_timeout_s", &self.llm_timeout_s)
            .field("chunk_max_tokens", &self.chunk_max_tokens)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender_email", &self.sender_email)
            .field("recitals_url", &self.recitals_url)
            .field("feed_url", &self.feed_url)
            .field("updates_limit", &self.updates_limit)
            .field("google_credentials_path", &self.google_credentials_path)
            .field("sheet_id", &self.sheet_id)
            .field("web_bind", &self.web_bind)
            .field("web_port", &self.web_port)
            .field("static_dir", &self.static_dir)
            .field("max_upload_mb", &self.max_upload_mb)
            .finish_non_exhaustive()
    }
}

pub fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_dotenv_str(&contents),
        Err(_) => HashMap::new(),
    }
}

/// Settings source: the process environment (when enabled) wins over the dotenv map.
/// Empty values count as unset.
struct Vars<'a> {
    dotenv: &'a HashMap<String, String>,
    process_env: bool,
}

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.process_env
            .then(|| std::env::var(key).ok())
            .flatten()
            .or_else(|| self.dotenv.get(key).cloned())
            .filter(|v| !v.is_empty())
    }

    fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

fn resolve_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, path.strip_prefix("~/").unwrap_or(path));
        }
    }
    path.to_string()
}

impl Config {
    /// Load from the environment, falling back to `.env` in the working directory.
    pub fn from_env() -> Result<Self> {
        Self::from_env_file(Path::new(".env"))
    }

    /// Load from the environment, falling back to the given dotenv file.
    /// Fails fast when the LLM credential is missing.
    pub fn from_env_file(dotenv_path: &Path) -> Result<Self> {
        let dotenv = parse_dotenv(dotenv_path);
        Self::from_map(&dotenv)
    }

    /// Load from the environment, falling back to the given key/value map.
    pub fn from_map(dotenv: &HashMap<String, String>) -> Result<Self> {
        Self::build(&Vars {
            dotenv,
            process_env: true,
        })
    }

    /// Load from the given key/value map only; the process environment is ignored.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        Self::build(&Vars {
            dotenv: vars,
            process_env: false,
        })
    }

    fn build(vars: &Vars<'_>) -> Result<Self> {
        let Some(groq_api_key) = vars.get("GROQ_API_KEY") else {
            bail!("GROQ_API_KEY is not set (export it or add it to .env)");
        };

        let chunk_max_tokens = vars.get_parsed("CHUNK_MAX_TOKENS", 2000usize);
        if chunk_max_tokens == 0 {
            bail!("CHUNK_MAX_TOKENS must be greater than zero");
        }

        Ok(Config {
            groq_api_key,
            model: vars.get_str("GROQ_MODEL", "llama-3.1-8b-instant"),
            llm_base_url: vars.get_str("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            llm_timeout_s: vars.get_parsed("LLM_TIMEOUT_S", 120u64),
            chunk_max_tokens,
            smtp_host: vars.get_str("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: vars.get_parsed("SMTP_PORT", 587u16),
            sender_email: vars.get_str("SENDER_EMAIL", ""),
            sender_password: vars.get_str("SENDER_PASSWORD", ""),
            recitals_url: vars.get_str("RECITALS_URL", "https://gdpr-info.eu/recitals/"),
            feed_url: vars.get_str("FEED_URL", "https://gdpr-info.eu/feed/"),
            updates_limit: vars.get_parsed("UPDATES_LIMIT", 3usize),
            google_credentials_path: resolve_tilde(&vars.get_str("GOOGLE_CREDENTIALS_PATH", "")),
            sheet_id: vars.get_str("SHEET_ID", ""),
            web_bind: vars.get_str("WEB_BIND", "127.0.0.1"),
            web_port: vars.get_parsed("WEB_PORT", 8501u16),
            static_dir: vars.get_str("STATIC_DIR", "static"),
            max_upload_mb: vars.get_parsed("MAX_UPLOAD_MB", 25usize),
        })
    }

    pub fn mail(&self) -> Option<MailConfig> {
        if self.sender_email.is_empty() || self.sender_password.is_empty() {
            return None;
        }
        Some(MailConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            sender_email: self.sender_email.clone(),
            sender_password: self.sender_password.clone(),
        })
    }

    pub fn sheets(&self) -> Option<SheetsConfig> {
        if self.google_credentials_path.is_empty() || self.sheet_id.is_empty() {
            return None;
        }
        Some(SheetsConfig {
            credentials_path: self.google_credentials_path.clone(),
            sheet_id: self.sheet_id.clone(),
        })
    }
}
