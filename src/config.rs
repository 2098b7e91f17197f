//! Runtime configuration, read from an optional JSON file. Every field has a
//! default so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ExtractResult};
use crate::path::ROOT_PREFIX;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s.max(0.0))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub executable: PathBuf,
    /// Extra arguments passed to the executable.
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub sentinel: String,
    /// Pause after launch before the first command, in seconds.
    pub settle_secs: f64,
    /// Pause between sending `exit` and killing the process, in seconds.
    pub shutdown_grace_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            executable: PathBuf::from("./PioSOLVER3-edge.exe"),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            sentinel: "PIO_END".to_string(),
            settle_secs: 2.0,
            shutdown_grace_secs: 1.0,
        }
    }
}

impl SessionConfig {
    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        secs(self.shutdown_grace_secs)
    }
}

/// Per-command deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub sentinel: f64,
    pub ready: f64,
    pub node: f64,
    pub strategy: f64,
    pub ev: f64,
    pub hand_order: f64,
    pub effective_stack: f64,
    pub load_tree: f64,
    pub script: f64,
    pub accuracy: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            sentinel: 5.0,
            ready: 5.0,
            node: 10.0,
            strategy: 10.0,
            ev: 10.0,
            hand_order: 10.0,
            effective_stack: 10.0,
            load_tree: 30.0,
            script: 30.0,
            accuracy: 5.0,
        }
    }
}

impl Timeouts {
    pub fn sentinel(&self) -> Duration {
        secs(self.sentinel)
    }
    pub fn ready(&self) -> Duration {
        secs(self.ready)
    }
    pub fn node(&self) -> Duration {
        secs(self.node)
    }
    pub fn strategy(&self) -> Duration {
        secs(self.strategy)
    }
    pub fn ev(&self) -> Duration {
        secs(self.ev)
    }
    pub fn hand_order(&self) -> Duration {
        secs(self.hand_order)
    }
    pub fn effective_stack(&self) -> Duration {
        secs(self.effective_stack)
    }
    pub fn load_tree(&self) -> Duration {
        secs(self.load_tree)
    }
    pub fn script(&self) -> Duration {
        secs(self.script)
    }
    pub fn accuracy(&self) -> Duration {
        secs(self.accuracy)
    }
}

/// When a streamed compute counts as finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionPolicy {
    pub hard_ceiling_secs: f64,
    pub idle_ceiling_secs: f64,
    pub tick_secs: f64,
    pub threshold: f64,
    pub start_ack: String,
    pub stop_phrases: Vec<String>,
    pub stop_exclusion: String,
    pub metric_prefix: String,
    /// How many post-acknowledgement lines the watcher keeps.
    pub window: usize,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        CompletionPolicy {
            hard_ceiling_secs: 30.0 * 60.0,
            idle_ceiling_secs: 30.0,
            tick_secs: 1.0,
            threshold: 0.12,
            start_ack: "go ok!".to_string(),
            stop_phrases: vec![
                "SOLVER: stopped (required accuracy reached)".to_string(),
                "SOLVER: stopped".to_string(),
            ],
            stop_exclusion: "started".to_string(),
            metric_prefix: "Exploitable for:".to_string(),
            window: 8,
        }
    }
}

impl CompletionPolicy {
    pub fn hard_ceiling(&self) -> Duration {
        secs(self.hard_ceiling_secs)
    }
    pub fn idle_ceiling(&self) -> Duration {
        secs(self.idle_ceiling_secs)
    }
    pub fn tick(&self) -> Duration {
        secs(self.tick_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub session: SessionConfig,
    pub timeouts: Timeouts,
    pub completion: CompletionPolicy,
    pub root: String,
    pub fallback_effective_stack: f64,
    pub output_dir: PathBuf,
    pub save_dir: PathBuf,
    pub accuracy: f64,
    pub log_file: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            session: SessionConfig::default(),
            timeouts: Timeouts::default(),
            completion: CompletionPolicy::default(),
            root: ROOT_PREFIX.to_string(),
            fallback_effective_stack: 60.0,
            output_dir: PathBuf::from("data"),
            save_dir: PathBuf::from("saves"),
            accuracy: 0.12,
            log_file: None,
        }
    }
}

impl ExtractConfig {
    pub fn load(path: &Path) -> ExtractResult<ExtractConfig> {
        let json = std::fs::read_to_string(path)?;
        let config: ExtractConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExtractResult<()> {
        if self.session.sentinel.trim().is_empty() {
            return Err(ExtractError::Config("sentinel must not be empty".to_string()));
        }
        if self.session.sentinel.contains(char::is_whitespace) {
            return Err(ExtractError::Config(format!(
                "sentinel '{}' must be a single token",
                self.session.sentinel
            )));
        }
        if self.completion.threshold < 0.0 {
            return Err(ExtractError::Config("threshold must be non-negative".to_string()));
        }
        if self.completion.window == 0 {
            return Err(ExtractError::Config("completion window must be at least 1".to_string()));
        }
        Ok(())
    }
}
