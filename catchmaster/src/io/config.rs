//! Game configuration stored under `.catchmaster/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::moves::ReplenishOdds;
use crate::io::atomic::write_atomic;

/// Game configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values the game was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// The game ends once this stage's door is resolved.
    pub final_stage: u32,

    /// Per-stage increase of the manipulation intensity (percent).
    pub intensity_step: f64,

    /// Trust dial at session start and after a reset (0-100).
    pub initial_doubt_level: u8,

    /// Delay before a won stage advances on its own.
    pub auto_advance_ms: u64,

    /// Delay between resolving the last door and raising game over.
    pub game_over_delay_ms: u64,

    /// How long a peek preview stays visible.
    pub peek_window_ms: u64,

    pub moves: MovesConfig,
    pub lives: LivesConfig,
    pub generator: GeneratorConfig,
    pub retry: RetryConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovesConfig {
    /// Chance Peek becomes available at a new stage.
    pub peek_chance: f64,
    /// Chance Beg becomes available at a new stage.
    pub beg_chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivesConfig {
    pub enabled: bool,
    pub max: u32,
    /// Chance a win restores one life.
    pub replenish_chance: f64,
}

/// Which text generator backs the narrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// No generation; always use fallback lines.
    None,
    /// Spawn `command` with the prompt on stdin.
    Command,
    /// OpenAI-compatible chat completions endpoint.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    /// Command to execute for `kind = "command"` (e.g. `["llm","-s","-"]`).
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Truncate generator stdout beyond this many bytes.
    pub output_limit_bytes: usize,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay (also caps `Retry-After`).
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_sessions: usize,
    pub max_turns: usize,
    pub ttl_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            final_stage: 15,
            intensity_step: 5.3,
            initial_doubt_level: 50,
            auto_advance_ms: 3_000,
            game_over_delay_ms: 1_500,
            peek_window_ms: 1_000,
            moves: MovesConfig::default(),
            lives: LivesConfig::default(),
            generator: GeneratorConfig::default(),
            retry: RetryConfig::default(),
            conversation: ConversationConfig::default(),
        }
    }
}

impl Default for MovesConfig {
    fn default() -> Self {
        let odds = ReplenishOdds::default();
        Self {
            peek_chance: odds.peek,
            beg_chance: odds.beg,
        }
    }
}

impl Default for LivesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max: 3,
            replenish_chance: 0.2,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::None,
            command: Vec::new(),
            timeout_secs: 30,
            output_limit_bytes: 16_000,
            base_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            max_tokens: 80,
            temperature: 0.7,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            max_turns: 10,
            ttl_secs: 30 * 60,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.final_stage == 0 {
            return Err(anyhow!("final_stage must be > 0"));
        }
        if !(self.intensity_step.is_finite() && self.intensity_step >= 0.0) {
            return Err(anyhow!("intensity_step must be a non-negative number"));
        }
        if self.initial_doubt_level > 100 {
            return Err(anyhow!("initial_doubt_level must be within 0..=100"));
        }
        for (name, value) in [
            ("moves.peek_chance", self.moves.peek_chance),
            ("moves.beg_chance", self.moves.beg_chance),
            ("lives.replenish_chance", self.lives.replenish_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{name} must be within 0.0..=1.0"));
            }
        }
        if self.lives.enabled && self.lives.max == 0 {
            return Err(anyhow!("lives.max must be > 0 when lives are enabled"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if self.conversation.max_sessions == 0 || self.conversation.max_turns == 0 {
            return Err(anyhow!("conversation limits must be > 0"));
        }
        match self.generator.kind {
            GeneratorKind::None => {}
            GeneratorKind::Command => {
                if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty()
                {
                    return Err(anyhow!("generator.command must be a non-empty array"));
                }
            }
            GeneratorKind::Http => {
                if self.generator.base_url.trim().is_empty() {
                    return Err(anyhow!("generator.base_url must be set"));
                }
                if self.generator.model.trim().is_empty() {
                    return Err(anyhow!("generator.model must be set"));
                }
            }
        }
        if self.generator.kind != GeneratorKind::None && self.generator.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn replenish_odds(&self) -> ReplenishOdds {
        ReplenishOdds {
            peek: self.moves.peek_chance,
            beg: self.moves.beg_chance,
        }
    }

    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }

    pub fn game_over_delay(&self) -> Duration {
        Duration::from_millis(self.game_over_delay_ms)
    }

    pub fn peek_window(&self) -> Duration {
        Duration::from_millis(self.peek_window_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GameConfig::default()`.
pub fn load_config(path: &Path) -> Result<GameConfig> {
    if !path.exists() {
        let cfg = GameConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GameConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GameConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write the default config unless one exists. Returns `true` if written.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if !force && path.exists() {
        return Ok(false);
    }
    write_config(path, &GameConfig::default())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, GameConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let mut cfg = GameConfig::default();
        cfg.lives.enabled = true;
        cfg.generator.kind = GeneratorKind::Command;
        cfg.generator.command = vec!["llm".to_string(), "-".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "final_stage = 9\n[moves]\npeek_chance = 1.0\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.final_stage, 9);
        assert_eq!(cfg.moves.peek_chance, 1.0);
        assert_eq!(cfg.moves.beg_chance, 0.2);
        assert_eq!(cfg.retry, RetryConfig::default());
    }

    #[test]
    fn init_keeps_existing_config_unless_forced() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".catchmaster").join("config.toml");
        assert!(init_config(&path, false).expect("init"));
        fs::write(&path, "final_stage = 4\n").expect("write");
        assert!(!init_config(&path, false).expect("init"));
        assert_eq!(load_config(&path).expect("load").final_stage, 4);
        assert!(init_config(&path, true).expect("init"));
        assert_eq!(load_config(&path).expect("load"), GameConfig::default());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut cfg = GameConfig::default();
        cfg.moves.beg_chance = 1.5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("moves.beg_chance"));
    }

    #[test]
    fn command_generator_requires_command() {
        let mut cfg = GameConfig::default();
        cfg.generator.kind = GeneratorKind::Command;
        assert!(cfg.validate().is_err());
    }
}
