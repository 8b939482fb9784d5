//! Generic `Vision` trait for camera-plus-detector collaborators.

use std::path::PathBuf;

use reflex_types::{DetectionKind, ReflexError, VisionSnapshot};

/// A camera paired with whatever detectors the platform provides.
///
/// Drivers keep the most recent frame so that [`Vision::object_center`] can
/// answer without another capture.
pub trait Vision: Send {
    /// Open the camera and enable detectors.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Initialization`] if the device is unavailable.
    fn start(&mut self) -> Result<(), ReflexError>;

    fn stop(&mut self);

    /// Capture a frame and return every detection in it.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Perception`] if the frame cannot be read.
    fn capture_frame(&mut self) -> Result<VisionSnapshot, ReflexError>;

    /// Centre of the first detection of `kind` in the last captured frame.
    fn object_center(&self, kind: DetectionKind) -> Option<(i32, i32)>;

    /// Persist the current frame and return where it was written.
    fn take_screenshot(&mut self) -> Result<PathBuf, ReflexError>;

    /// Switch colour detection to `color`; `"close"` turns it off.
    fn set_color_detection(&mut self, color: &str) -> Result<(), ReflexError>;

    /// One-line human readable summary of the last frame.
    fn summary(&self) -> String;
}

/// Centre of the first detection of `kind` in `snapshot`.
pub fn first_center(snapshot: &VisionSnapshot, kind: DetectionKind) -> Option<(i32, i32)> {
    snapshot.detections(kind).first().map(|d| (d.x, d.y))
}

/// Render a snapshot the way drivers report it in status lines.
pub fn describe_snapshot(snapshot: &VisionSnapshot) -> String {
    let parts: Vec<String> = [
        (DetectionKind::Face, "face"),
        (DetectionKind::Color, "color object"),
        (DetectionKind::Qr, "QR code"),
        (DetectionKind::Gesture, "gesture"),
        (DetectionKind::TrafficSign, "traffic sign"),
    ]
    .into_iter()
    .filter_map(|(kind, label)| {
        let n = snapshot.detections(kind).len();
        (n > 0).then(|| format!("{n} {label}(s)"))
    })
    .collect();

    if parts.is_empty() {
        "no objects detected".to_string()
    } else {
        parts.join(", ")
    }
}
