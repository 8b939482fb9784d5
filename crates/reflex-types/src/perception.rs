//! Raw perception snapshots handed from collaborators to the context builder.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One detected object in a camera frame, in pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Optional classifier label (colour name, QR payload, gesture type, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Detection {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// The detection families a vision collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Face,
    Color,
    Qr,
    Gesture,
    TrafficSign,
}

/// Everything the vision collaborator saw in a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionSnapshot {
    #[serde(default)]
    pub faces: Vec<Detection>,
    #[serde(default)]
    pub colors: Vec<Detection>,
    #[serde(default)]
    pub qr_codes: Vec<Detection>,
    #[serde(default)]
    pub gestures: Vec<Detection>,
    #[serde(default)]
    pub traffic_signs: Vec<Detection>,
}

impl VisionSnapshot {
    pub fn detections(&self, kind: DetectionKind) -> &[Detection] {
        match kind {
            DetectionKind::Face => &self.faces,
            DetectionKind::Color => &self.colors,
            DetectionKind::Qr => &self.qr_codes,
            DetectionKind::Gesture => &self.gestures,
            DetectionKind::TrafficSign => &self.traffic_signs,
        }
    }

    pub fn detections_mut(&mut self, kind: DetectionKind) -> &mut Vec<Detection> {
        match kind {
            DetectionKind::Face => &mut self.faces,
            DetectionKind::Color => &mut self.colors,
            DetectionKind::Qr => &mut self.qr_codes,
            DetectionKind::Gesture => &mut self.gestures,
            DetectionKind::TrafficSign => &mut self.traffic_signs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
            && self.colors.is_empty()
            && self.qr_codes.is_empty()
            && self.gestures.is_empty()
            && self.traffic_signs.is_empty()
    }
}

/// Coarse movement state of the drive base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementState {
    #[default]
    Stopped,
    Forward,
    Backward,
    TurningLeft,
    TurningRight,
}

impl fmt::Display for MovementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementState::Stopped => "stopped",
            MovementState::Forward => "forward",
            MovementState::Backward => "backward",
            MovementState::TurningLeft => "turning_left",
            MovementState::TurningRight => "turning_right",
        };
        f.write_str(s)
    }
}

/// Kinematic state reported by the actuator collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotState {
    /// Current drive speed, 0–100.
    pub speed: u8,
    pub movement: MovementState,
    /// Steering servo angle in degrees.
    pub steering: i16,
    /// When the current continuous movement began; `None` while stopped.
    pub movement_started: Option<Instant>,
}

impl RobotState {
    pub fn is_moving(&self) -> bool {
        self.speed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_area() {
        assert_eq!(Detection::new(0, 0, 20, 30).area(), 600);
    }

    #[test]
    fn snapshot_lookup_by_kind() {
        let mut snap = VisionSnapshot::default();
        assert!(snap.is_empty());
        snap.detections_mut(DetectionKind::Qr)
            .push(Detection::new(1, 2, 3, 4).labelled("hello"));
        assert_eq!(snap.detections(DetectionKind::Qr).len(), 1);
        assert!(snap.detections(DetectionKind::Face).is_empty());
        assert!(!snap.is_empty());
    }

    #[test]
    fn snapshot_deserializes_with_missing_lists() {
        let snap: VisionSnapshot =
            serde_json::from_str(r#"{"faces":[{"x":1,"y":2,"width":3,"height":4}]}"#).unwrap();
        assert_eq!(snap.faces.len(), 1);
        assert!(snap.colors.is_empty());
    }
}
