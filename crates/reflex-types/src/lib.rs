//! `reflex-types` – shared vocabulary for the Reflex control stack.
//!
//! Every other crate in the workspace speaks in these types: the per-cycle
//! fact table ([`Context`]), the closed action vocabulary ([`ActionToken`]),
//! perception snapshots, the loop's operating [`LoopMode`], its
//! [`LoopMetrics`], and the workspace-wide [`ReflexError`].
//!
//! [`serde_secs`] lets config structs carry a `Duration` that is written as
//! fractional seconds.

pub mod action;
pub mod fact;
pub mod perception;
pub mod serde_secs;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use action::{ActionToken, Sound, VoiceCommand};
pub use fact::{Context, FactValue};
pub use perception::{Detection, DetectionKind, MovementState, RobotState, VisionSnapshot};

/// Operating intent of a running control loop.
///
/// Pure metadata: the executor reads it to gate mode-specific behaviour, but
/// it never restricts which rules may fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Autonomous,
    VoiceControl,
    Tracking,
    Exploration,
}

impl LoopMode {
    pub const ALL: [LoopMode; 4] = [
        LoopMode::Autonomous,
        LoopMode::VoiceControl,
        LoopMode::Tracking,
        LoopMode::Exploration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Autonomous => "autonomous",
            LoopMode::VoiceControl => "voice_control",
            LoopMode::Tracking => "tracking",
            LoopMode::Exploration => "exploration",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoopMode {
    type Err = ReflexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoopMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| ReflexError::Config(format!("unknown loop mode '{s}'")))
    }
}

/// Cumulative statistics for one control-loop instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopMetrics {
    /// Identifier of the loop instance these metrics belong to.
    pub run_id: Uuid,
    /// Wall-clock time the loop entered `Running`.
    pub started_at: Option<DateTime<Utc>>,
    /// Number of cycles that completed every phase.
    pub cycle_count: u64,
    /// Running average of completed cycle durations, in seconds.
    pub average_cycle_duration: f64,
    /// Cycles abandoned after a phase failure.
    pub failed_cycles: u64,
    /// Completed cycles that took longer than the loop period.
    pub overruns: u64,
    pub running: bool,
    pub mode: LoopMode,
}

impl LoopMetrics {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: None,
            cycle_count: 0,
            average_cycle_duration: 0.0,
            failed_cycles: 0,
            overruns: 0,
            running: false,
            mode: LoopMode::default(),
        }
    }

    /// Fold one completed cycle into the count and the running average.
    pub fn record_cycle(&mut self, seconds: f64) {
        self.cycle_count += 1;
        let n = self.cycle_count as f64;
        self.average_cycle_duration = (self.average_cycle_duration * (n - 1.0) + seconds) / n;
    }
}

/// Workspace-wide error type spanning collaborator faults, decision failures,
/// and configuration problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflexError {
    #[error("Initialization failed for {component}: {details}")]
    Initialization { component: String, details: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Perception Error: {0}")]
    Perception(String),

    #[error("Reasoner Error: {0}")]
    ReasonerFailed(String),

    #[error("Unknown action token: {0}")]
    UnknownAction(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl ReflexError {
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        ReflexError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }

    pub fn init(component: impl Into<String>, details: impl Into<String>) -> Self {
        ReflexError::Initialization {
            component: component.into(),
            details: details.into(),
        }
    }
}
