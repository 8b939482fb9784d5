//! Per-cycle fact table construction.
//!
//! [`ContextBuilder`] converts one cycle's perception snapshot into a flat
//! [`Context`]. Every fact below is present in every context it builds, so
//! rules only ever see a missing fact when they name one the builder does
//! not produce.
//!
//! | Fact | Kind | Source |
//! |---|---|---|
//! | `face_detected`, `color_detected`, `qr_detected`, `gesture_detected`, `traffic_sign_detected` | bool | non-empty detection list |
//! | `color_size` | number | area of the first colour blob, `0` if none |
//! | `voice_detected` | bool | a non-empty utterance arrived this cycle |
//! | `voice_text` | text | the utterance, `""` if none |
//! | `obstacle_distance` | number | range finder, cm |
//! | `has_obstacle` | bool | `0 < distance < obstacle_distance_threshold` |
//! | `idle_time` | number | seconds since a face, colour or voice was last seen |
//! | `is_moving` | bool | drive speed above zero |
//!
//! # Example
//!
//! ```rust
//! use reflex_perception::context::{ContextBuilder, ContextConfig};
//! use reflex_types::{Detection, RobotState, VisionSnapshot};
//!
//! let mut builder = ContextBuilder::new(ContextConfig::default());
//! let frame = VisionSnapshot {
//!     faces: vec![Detection::new(320, 240, 50, 50)],
//!     ..Default::default()
//! };
//!
//! let ctx = builder.build(&frame, None, &RobotState::default(), 15.0);
//! assert!(ctx.flag("face_detected"));
//! assert!(ctx.flag("has_obstacle"));
//! assert_eq!(ctx.number("idle_time"), Some(0.0));
//! ```

use std::time::Instant;

use reflex_types::{Context, DetectionKind, RobotState, VisionSnapshot};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Names of the facts produced by [`ContextBuilder`].
pub mod facts {
    pub const FACE_DETECTED: &str = "face_detected";
    pub const COLOR_DETECTED: &str = "color_detected";
    pub const QR_DETECTED: &str = "qr_detected";
    pub const GESTURE_DETECTED: &str = "gesture_detected";
    pub const TRAFFIC_SIGN_DETECTED: &str = "traffic_sign_detected";
    pub const COLOR_SIZE: &str = "color_size";
    pub const VOICE_DETECTED: &str = "voice_detected";
    pub const VOICE_TEXT: &str = "voice_text";
    pub const OBSTACLE_DISTANCE: &str = "obstacle_distance";
    pub const HAS_OBSTACLE: &str = "has_obstacle";
    pub const IDLE_TIME: &str = "idle_time";
    pub const IS_MOVING: &str = "is_moving";
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tunables for [`ContextBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Readings strictly below this distance (cm) set `has_obstacle`.
    pub obstacle_distance_threshold: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            obstacle_distance_threshold: 20.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ContextBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Builds a fresh [`Context`] every cycle.
///
/// The builder is stateful only in `last_activity`: the instant a face, a
/// colour blob or a voice command was last present. `idle_time` is measured
/// from there and is `0` until the first activity is seen.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    last_activity: Option<Instant>,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            last_activity: None,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Build the context for a cycle observed now.
    pub fn build(
        &mut self,
        vision: &VisionSnapshot,
        utterance: Option<&str>,
        robot: &RobotState,
        distance_cm: f64,
    ) -> Context {
        self.build_at(vision, utterance, robot, distance_cm, Instant::now())
    }

    /// Build the context for a cycle observed at `now`.
    pub fn build_at(
        &mut self,
        vision: &VisionSnapshot,
        utterance: Option<&str>,
        robot: &RobotState,
        distance_cm: f64,
        now: Instant,
    ) -> Context {
        let face = !vision.faces.is_empty();
        let color = !vision.colors.is_empty();
        let color_size = vision.colors.first().map_or(0, |d| d.area());

        let voice_text = utterance.map(str::trim).unwrap_or_default();
        let voice = !voice_text.is_empty();

        let has_obstacle =
            distance_cm > 0.0 && distance_cm < self.config.obstacle_distance_threshold;

        if face || color || voice {
            self.last_activity = Some(now);
        }
        let idle_time = self
            .last_activity
            .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f64());

        let detected = |kind| !vision.detections(kind).is_empty();

        let ctx = Context::new()
            .with(facts::FACE_DETECTED, face)
            .with(facts::COLOR_DETECTED, color)
            .with(facts::QR_DETECTED, detected(DetectionKind::Qr))
            .with(facts::GESTURE_DETECTED, detected(DetectionKind::Gesture))
            .with(
                facts::TRAFFIC_SIGN_DETECTED,
                detected(DetectionKind::TrafficSign),
            )
            .with(facts::COLOR_SIZE, color_size as f64)
            .with(facts::VOICE_DETECTED, voice)
            .with(facts::VOICE_TEXT, voice_text)
            .with(facts::OBSTACLE_DISTANCE, distance_cm)
            .with(facts::HAS_OBSTACLE, has_obstacle)
            .with(facts::IDLE_TIME, idle_time)
            .with(facts::IS_MOVING, robot.is_moving());

        trace!(facts = ctx.len(), idle_time, has_obstacle, "context built");
        ctx
    }

    /// Forget the last activity so `idle_time` starts from zero again.
    pub fn reset(&mut self) {
        self.last_activity = None;
    }
}
