//! Configuration file – reads/writes `~/.reflex/config.toml`.
//!
//! Every section maps onto the typed config struct of the component it
//! configures, so a missing key falls back to that component's default.
//!
//! ```toml
//! engine = "rule_based"
//!
//! [loop]
//! frequency_hz = 2.0
//! recovery_pause = 0.5
//!
//! [safety]
//! emergency_stop_distance = 12.0
//!
//! [reasoner]
//! provider = "ollama"
//! model = "llama3"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reflex_hal::sim::{SimRobotConfig, SimVisionConfig};
use reflex_kernel::SafetyConfig;
use reflex_perception::ContextConfig;
use reflex_runtime::{LogSettings, LoopConfig, ReasonerConfig, ReasonerProvider};
use serde::{Deserialize, Serialize};

/// Which [`DecisionEngine`][reflex_runtime::DecisionEngine] drives the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    #[value(name = "rule_based")]
    RuleBased,
    Reasoner,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::RuleBased => "rule_based",
            EngineKind::Reasoner => "reasoner",
        })
    }
}

/// The `[audio]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Phrases logged when heard.
    pub wake_words: Vec<String>,
    /// Longest a listener poll blocks.
    #[serde(with = "reflex_types::serde_secs")]
    pub poll_interval: Duration,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            wake_words: vec!["hey robot".to_string(), "robot".to_string()],
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Persisted configuration stored in `~/.reflex/config.toml`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineKind,
    #[serde(rename = "loop")]
    pub control: LoopConfig,
    pub context: ContextConfig,
    pub safety: SafetyConfig,
    pub reasoner: ReasonerConfig,
    pub robot: SimRobotConfig,
    pub vision: SimVisionConfig,
    pub audio: AudioSettings,
    pub log: LogSettings,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `ReasonerConfig`'s own Debug redacts the API key.
        f.debug_struct("Config")
            .field("engine", &self.engine)
            .field("loop", &self.control)
            .field("context", &self.context)
            .field("safety", &self.safety)
            .field("reasoner", &self.reasoner)
            .field("robot", &self.robot)
            .field("vision", &self.vision)
            .field("audio", &self.audio)
            .field("log", &self.log)
            .finish()
    }
}

/// Return the path to `~/.reflex/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".reflex").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config, falling back to defaults (plus env overrides) when the
/// file is absent.
pub fn load_or_default() -> Result<Config, String> {
    Ok(load()?.unwrap_or_else(|| {
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

/// Apply `REFLEX_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `REFLEX_FREQUENCY` | `loop.frequency_hz` |
/// | `REFLEX_ENGINE` | `engine` |
/// | `REFLEX_REASONER_URL` | `reasoner.base_url` |
/// | `REFLEX_REASONER_MODEL` | `reasoner.model` |
/// | `REFLEX_OPENAI_API_KEY` | `reasoner.api_key` when the provider is OpenAI |
/// | `REFLEX_ANTHROPIC_API_KEY` | `reasoner.api_key` when the provider is Anthropic |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("REFLEX_FREQUENCY")
        && let Ok(hz) = v.parse::<f64>()
    {
        cfg.control.frequency_hz = hz;
    }
    if let Ok(v) = std::env::var("REFLEX_ENGINE") {
        match v.trim() {
            "rule_based" => cfg.engine = EngineKind::RuleBased,
            "reasoner" => cfg.engine = EngineKind::Reasoner,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("REFLEX_REASONER_URL") {
        cfg.reasoner.base_url = Some(v);
    }
    if let Ok(v) = std::env::var("REFLEX_REASONER_MODEL") {
        cfg.reasoner.model = v;
    }
    let key_var = match cfg.reasoner.provider {
        ReasonerProvider::OpenAi => Some("REFLEX_OPENAI_API_KEY"),
        ReasonerProvider::Anthropic => Some("REFLEX_ANTHROPIC_API_KEY"),
        ReasonerProvider::Ollama => None,
    };
    if let Some(key) = key_var.and_then(|name| std::env::var(name).ok()) {
        cfg.reasoner.api_key = Some(key);
    }
}

/// Save the config to disk, creating `~/.reflex/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // The file may hold API keys: owner read/write only.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
