use crate::credentials;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "settings.toml";
pub const API_KEY_ENV: &str = "MAILDESK_API_KEY";

// Development key; only reached when nothing else is configured.
const FALLBACK_API_KEY: &str = "maildesk-dev-key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub keybindings: Keybindings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub tags: TagSettings,
    #[serde(default)]
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Mock,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub data_source: DataSource,
    pub directory_host: String,
    pub api_key: Option<String>,
    /// Where process requests are POSTed. Defaults to `{company_base_url}/`.
    pub process_endpoint: Option<String>,
    /// Simulated latency of the mock backend
    pub list_delay_ms: u64,
    pub detail_delay_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            data_source: DataSource::Mock,
            directory_host: "http://localhost:8000".to_string(),
            api_key: None,
            process_endpoint: None,
            list_delay_ms: 1200,
            detail_delay_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    pub predefined: Vec<String>,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            predefined: ["Work", "Personal", "Urgent", "Follow Up", "Portland", "Biking"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateEncoding {
    /// MM DD M YY M, what the existing process endpoint expects
    #[default]
    Legacy,
    /// YYYYMMDD
    Iso,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Behavior {
    pub keep_results_on_company_clear: bool,
    pub process_date_encoding: DateEncoding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Keybindings {
    pub next_panel: Vec<String>,
    pub prev_panel: Vec<String>,
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub open: Vec<String>,
    pub search: Vec<String>,
    pub pick_company: Vec<String>,
    pub clear_company: Vec<String>,
    pub manage_tags: Vec<String>,
    pub process: Vec<String>,
    pub quit: Vec<String>,
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            next_panel: vec!["l".to_string(), "Right".to_string(), "Tab".to_string()],
            prev_panel: vec!["h".to_string(), "Left".to_string(), "BackTab".to_string()],
            move_up: vec!["k".to_string(), "Up".to_string()],
            move_down: vec!["j".to_string(), "Down".to_string()],
            open: vec!["Enter".to_string()],
            search: vec!["/".to_string()],
            pick_company: vec!["c".to_string()],
            clear_company: vec!["x".to_string()],
            manage_tags: vec!["t".to_string()],
            process: vec!["p".to_string()],
            quit: vec!["q".to_string()],
        }
    }
}

pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    // A lone "-" is the minus key, not a separator
    if key_str == "-" {
        return (KeyCode::Char('-'), KeyModifiers::empty());
    }

    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            "cmd" | "command" | "super" => modifiers.insert(KeyModifiers::SUPER),
            "meta" => modifiers.insert(KeyModifiers::META),
            _ => {}
        }
    }

    let mut chars = base_key_str.chars();
    let code = match base_key_str {
        "Backspace" => KeyCode::Backspace,
        "Enter" => KeyCode::Enter,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Esc" => KeyCode::Esc,
        _ => match (chars.next(), chars.next()) {
            (Some(c), None) => KeyCode::Char(c),
            _ => KeyCode::Null,
        },
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

/// Where the API key was resolved from, for the startup log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeySource {
    Environment,
    SettingsFile,
    Keyring,
    BuildTime,
    Fallback,
}

impl Config {
    pub fn load() -> Self {
        match std::fs::read_to_string(SETTINGS_FILE) {
            Ok(content) => Self::parse(&content),
            Err(_) => {
                debug!("No {} found, using defaults", SETTINGS_FILE);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid {}: {}", SETTINGS_FILE, e);
                Self::default()
            }
        }
    }

    /// Resolve the API key: environment, settings file, keyring, build-time value, fallback.
    pub fn resolve_api_key(&self) -> (String, ApiKeySource) {
        let env_key = std::env::var(API_KEY_ENV).ok();
        let keyring_key = || credentials::load_api_key().ok().flatten();
        resolve_api_key_from(env_key, self.api.api_key.clone(), keyring_key)
    }
}

fn resolve_api_key_from(
    env_key: Option<String>,
    file_key: Option<String>,
    keyring_key: impl FnOnce() -> Option<String>,
) -> (String, ApiKeySource) {
    let usable = |k: &String| !k.trim().is_empty();

    if let Some(key) = env_key.filter(usable) {
        return (key, ApiKeySource::Environment);
    }
    if let Some(key) = file_key.filter(usable) {
        return (key, ApiKeySource::SettingsFile);
    }
    if let Some(key) = keyring_key().filter(usable) {
        return (key, ApiKeySource::Keyring);
    }
    if let Some(key) = option_env!("MAILDESK_API_KEY").filter(|k| !k.trim().is_empty()) {
        return (key.to_string(), ApiKeySource::BuildTime);
    }
    warn!("No API key configured, falling back to the development key");
    (FALLBACK_API_KEY.to_string(), ApiKeySource::Fallback)
}
