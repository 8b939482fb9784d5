//! In-process simulated collaborators for headless runs and tests.
//!
//! Every simulated driver keeps its state behind an `Arc<Mutex<_>>` and
//! hands out a cloneable *handle* to it. The driver itself is boxed and
//! moved into the control loop; the handle stays with the caller so a test
//! can script sensor readings before a cycle and assert on the recorded
//! commands after it.
//!
//! # Example
//!
//! ```rust
//! use reflex_hal::actuator::Actuator;
//! use reflex_hal::sim::{ActuatorCommand, SimActuator, SimRobotConfig};
//!
//! let mut robot = SimActuator::new(SimRobotConfig::default());
//! let log = robot.handle();
//!
//! robot.initialize().unwrap();
//! robot.move_forward(None, None).unwrap();
//! robot.stop().unwrap();
//!
//! assert_eq!(
//!     log.commands(),
//!     vec![
//!         ActuatorCommand::Initialize,
//!         ActuatorCommand::MoveForward { speed: 30, duration: None },
//!         ActuatorCommand::Stop,
//!     ]
//! );
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use reflex_types::{DetectionKind, MovementState, ReflexError, RobotState, Sound, VisionSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::actuator::Actuator;
use crate::audio::Transcriber;
use crate::vision::{Vision, describe_snapshot, first_center};

/// Frame size assumed when converting pixel offsets to servo corrections.
const FRAME_WIDTH: i32 = 640;
const FRAME_HEIGHT: i32 = 480;

/// Distance reported when no reading has been scripted.
const OPEN_FLOOR_CM: f64 = 100.0;

// ────────────────────────────────────────────────────────────────────────────
// SimRobotConfig
// ────────────────────────────────────────────────────────────────────────────

/// Mechanical limits and defaults of the simulated chassis (PiCar-X values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimRobotConfig {
    pub default_speed: u8,
    pub slow_speed: u8,
    pub steering_angle: i16,
    pub max_steering: i16,
    pub pan_range: (i16, i16),
    pub tilt_range: (i16, i16),
    pub tilt_center: i16,
    /// Fraction of the pixel error applied per tracking step.
    pub track_smoothness: f64,
    /// Commands kept in the log; the oldest are dropped first. `0` disables
    /// recording.
    pub max_recorded_commands: usize,
}

impl Default for SimRobotConfig {
    fn default() -> Self {
        Self {
            default_speed: 30,
            slow_speed: 15,
            steering_angle: 30,
            max_steering: 30,
            pan_range: (-90, 90),
            tilt_range: (-30, 30),
            tilt_center: -10,
            track_smoothness: 0.3,
            max_recorded_commands: 1024,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimActuator
// ────────────────────────────────────────────────────────────────────────────

/// One command received by [`SimActuator`], in the order it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    Initialize,
    Shutdown,
    MoveForward { speed: u8, duration: Option<Duration> },
    MoveBackward { speed: u8, duration: Option<Duration> },
    TurnLeft { angle: i16, duration: Option<Duration> },
    TurnRight { angle: i16, duration: Option<Duration> },
    Stop,
    TrackObject { x: i32, y: i32 },
    ScanEnvironment,
    AvoidObstacle,
    SetPan(i16),
    SetTilt(i16),
    PlaySound(Sound),
    Speak(String),
}

#[derive(Debug)]
struct ActuatorState {
    commands: VecDeque<ActuatorCommand>,
    command_limit: usize,
    robot: RobotState,
    pan: i16,
    tilt: i16,
    distances: VecDeque<f64>,
    resting_distance: f64,
    fail_initialize: bool,
    fail_distance: bool,
    initialized: bool,
}

impl ActuatorState {
    fn record(&mut self, command: ActuatorCommand) {
        if self.command_limit == 0 {
            return;
        }
        while self.commands.len() >= self.command_limit {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }
}

/// Cloneable view into a [`SimActuator`]'s recorded commands and sensors.
#[derive(Debug, Clone)]
pub struct SimActuatorHandle {
    inner: Arc<Mutex<ActuatorState>>,
}

impl SimActuatorHandle {
    /// The most recent commands, oldest first.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.inner.lock().commands.iter().cloned().collect()
    }

    pub fn clear_commands(&self) {
        self.inner.lock().commands.clear();
    }

    /// Number of recorded [`ActuatorCommand::Stop`] commands.
    pub fn stop_count(&self) -> usize {
        self.inner
            .lock()
            .commands
            .iter()
            .filter(|c| matches!(c, ActuatorCommand::Stop))
            .count()
    }

    /// Queue a range reading; queued readings are consumed one per call.
    pub fn push_distance(&self, cm: f64) {
        self.inner.lock().distances.push_back(cm);
    }

    /// Reading returned once the queue is empty.
    pub fn set_resting_distance(&self, cm: f64) {
        self.inner.lock().resting_distance = cm;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.inner.lock().fail_initialize = fail;
    }

    pub fn fail_distance(&self, fail: bool) {
        self.inner.lock().fail_distance = fail;
    }

    pub fn robot_state(&self) -> RobotState {
        self.inner.lock().robot.clone()
    }

    /// Pretend the current movement began at `started`.
    pub fn set_movement_started(&self, started: Instant) {
        let mut s = self.inner.lock();
        if s.robot.speed == 0 {
            s.robot.speed = 30;
            s.robot.movement = MovementState::Forward;
        }
        s.robot.movement_started = Some(started);
    }

    pub fn camera_angles(&self) -> (i16, i16) {
        let s = self.inner.lock();
        (s.pan, s.tilt)
    }
}

/// Simulated chassis. Timed movements complete instantly.
pub struct SimActuator {
    config: SimRobotConfig,
    inner: Arc<Mutex<ActuatorState>>,
}

impl SimActuator {
    pub fn new(config: SimRobotConfig) -> Self {
        let tilt = config.tilt_center;
        let command_limit = config.max_recorded_commands;
        Self {
            config,
            inner: Arc::new(Mutex::new(ActuatorState {
                commands: VecDeque::new(),
                command_limit,
                robot: RobotState::default(),
                pan: 0,
                tilt,
                distances: VecDeque::new(),
                resting_distance: OPEN_FLOOR_CM,
                fail_initialize: false,
                fail_distance: false,
                initialized: false,
            })),
        }
    }

    pub fn handle(&self) -> SimActuatorHandle {
        SimActuatorHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    fn require_initialized(&self, s: &ActuatorState) -> Result<(), ReflexError> {
        if s.initialized {
            Ok(())
        } else {
            Err(ReflexError::hardware("sim_actuator", "not initialized"))
        }
    }

    fn drive(
        &self,
        speed: Option<u8>,
        duration: Option<Duration>,
        movement: MovementState,
    ) -> Result<(), ReflexError> {
        let speed = speed.unwrap_or(self.config.default_speed).min(100);
        let mut s = self.inner.lock();
        self.require_initialized(&s)?;
        s.record(match movement {
            MovementState::Backward => ActuatorCommand::MoveBackward { speed, duration },
            _ => ActuatorCommand::MoveForward { speed, duration },
        });
        if duration.is_some() {
            halt(&mut s.robot);
        } else {
            let started = s.robot.movement_started.unwrap_or_else(Instant::now);
            s.robot.speed = speed;
            s.robot.movement = movement;
            s.robot.movement_started = Some(started);
        }
        Ok(())
    }

    fn steer(
        &self,
        angle: Option<i16>,
        duration: Option<Duration>,
        left: bool,
    ) -> Result<(), ReflexError> {
        let max = self.config.max_steering;
        let angle = angle.unwrap_or(self.config.steering_angle).clamp(0, max);
        let mut s = self.inner.lock();
        self.require_initialized(&s)?;
        if left {
            s.record(ActuatorCommand::TurnLeft { angle, duration });
            s.robot.steering = -angle;
            s.robot.movement = MovementState::TurningLeft;
        } else {
            s.record(ActuatorCommand::TurnRight { angle, duration });
            s.robot.steering = angle;
            s.robot.movement = MovementState::TurningRight;
        }
        if duration.is_some() {
            s.robot.steering = 0;
            s.robot.movement = if s.robot.speed > 0 {
                MovementState::Forward
            } else {
                MovementState::Stopped
            };
        }
        Ok(())
    }

    fn clamp_pan(&self, angle: i16) -> i16 {
        angle.clamp(self.config.pan_range.0, self.config.pan_range.1)
    }

    fn clamp_tilt(&self, angle: i16) -> i16 {
        angle.clamp(self.config.tilt_range.0, self.config.tilt_range.1)
    }
}

fn halt(robot: &mut RobotState) {
    robot.speed = 0;
    robot.movement = MovementState::Stopped;
    robot.steering = 0;
    robot.movement_started = None;
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        "sim"
    }

    fn initialize(&mut self) -> Result<(), ReflexError> {
        let mut s = self.inner.lock();
        if s.fail_initialize {
            return Err(ReflexError::init("sim_actuator", "injected failure"));
        }
        s.record(ActuatorCommand::Initialize);
        halt(&mut s.robot);
        s.pan = 0;
        s.tilt = self.config.tilt_center;
        s.initialized = true;
        info!("simulated actuator initialized");
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut s = self.inner.lock();
        s.record(ActuatorCommand::Shutdown);
        halt(&mut s.robot);
        s.initialized = false;
    }

    fn move_forward(&mut self, speed: Option<u8>, duration: Option<Duration>) -> Result<(), ReflexError> {
        self.drive(speed, duration, MovementState::Forward)
    }

    fn move_backward(&mut self, speed: Option<u8>, duration: Option<Duration>) -> Result<(), ReflexError> {
        self.drive(speed, duration, MovementState::Backward)
    }

    fn turn_left(&mut self, angle: Option<i16>, duration: Option<Duration>) -> Result<(), ReflexError> {
        self.steer(angle, duration, true)
    }

    fn turn_right(&mut self, angle: Option<i16>, duration: Option<Duration>) -> Result<(), ReflexError> {
        self.steer(angle, duration, false)
    }

    fn stop(&mut self) -> Result<(), ReflexError> {
        let mut s = self.inner.lock();
        s.record(ActuatorCommand::Stop);
        halt(&mut s.robot);
        Ok(())
    }

    fn distance_cm(&mut self) -> Result<f64, ReflexError> {
        let mut s = self.inner.lock();
        if s.fail_distance {
            return Err(ReflexError::hardware("ultrasonic", "no response"));
        }
        Ok(match s.distances.pop_front() {
            Some(cm) => cm,
            None => s.resting_distance,
        })
    }

    fn state(&self) -> RobotState {
        self.inner.lock().robot.clone()
    }

    fn track_object(&mut self, x: i32, y: i32) -> Result<(), ReflexError> {
        let gain = self.config.track_smoothness * 0.1;
        let error_x = f64::from(x - FRAME_WIDTH / 2);
        let error_y = f64::from(y - FRAME_HEIGHT / 2);
        let mut s = self.inner.lock();
        self.require_initialized(&s)?;
        s.record(ActuatorCommand::TrackObject { x, y });
        let pan = s.pan.saturating_add((error_x * gain) as i16);
        let tilt = s.tilt.saturating_sub((error_y * gain) as i16);
        s.pan = self.clamp_pan(pan);
        s.tilt = self.clamp_tilt(tilt);
        debug!(pan = s.pan, tilt = s.tilt, "tracking");
        Ok(())
    }

    fn scan_environment(&mut self) -> Result<(), ReflexError> {
        let mut s = self.inner.lock();
        self.require_initialized(&s)?;
        s.record(ActuatorCommand::ScanEnvironment);
        for angle in (-60..=60).step_by(20) {
            s.pan = self.clamp_pan(angle);
        }
        s.pan = 0;
        s.tilt = self.config.tilt_center;
        Ok(())
    }

    fn avoid_obstacle(&mut self) -> Result<(), ReflexError> {
        {
            let mut s = self.inner.lock();
            self.require_initialized(&s)?;
            s.record(ActuatorCommand::AvoidObstacle);
        }
        self.stop()?;
        self.move_backward(None, Some(Duration::from_millis(500)))?;
        if rand::thread_rng().gen_bool(0.5) {
            self.turn_left(None, None)?;
        } else {
            self.turn_right(None, None)?;
        }
        self.move_forward(None, Some(Duration::from_millis(800)))?;
        let mut s = self.inner.lock();
        s.robot.steering = 0;
        Ok(())
    }

    fn set_camera_pan(&mut self, angle: i16) -> Result<(), ReflexError> {
        let angle = self.clamp_pan(angle);
        let mut s = self.inner.lock();
        s.record(ActuatorCommand::SetPan(angle));
        s.pan = angle;
        Ok(())
    }

    fn set_camera_tilt(&mut self, angle: i16) -> Result<(), ReflexError> {
        let angle = self.clamp_tilt(angle);
        let mut s = self.inner.lock();
        s.record(ActuatorCommand::SetTilt(angle));
        s.tilt = angle;
        Ok(())
    }

    fn camera_angles(&self) -> (i16, i16) {
        let s = self.inner.lock();
        (s.pan, s.tilt)
    }

    fn play_sound(&mut self, sound: Sound) -> Result<(), ReflexError> {
        self.inner.lock().record(ActuatorCommand::PlaySound(sound));
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), ReflexError> {
        info!(text, "sim speak");
        self.inner
            .lock()
            .record(ActuatorCommand::Speak(text.to_string()));
        Ok(())
    }

    fn summary(&self) -> String {
        let s = self.inner.lock();
        format!(
            "{} at speed {}, steering {}°, camera pan {}° tilt {}°",
            s.robot.movement, s.robot.speed, s.robot.steering, s.pan, s.tilt
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimVision
// ────────────────────────────────────────────────────────────────────────────

/// Settings for [`SimVision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimVisionConfig {
    /// Directory screenshot paths are generated under.
    pub screenshot_dir: PathBuf,
    /// Colour detection target at start-up.
    pub color: String,
}

impl Default for SimVisionConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("photos"),
            color: "red".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct VisionState {
    frames: VecDeque<VisionSnapshot>,
    resting: VisionSnapshot,
    last: VisionSnapshot,
    color: Option<String>,
    screenshots: Vec<PathBuf>,
    fail_start: bool,
    fail_capture: bool,
    started: bool,
}

/// Cloneable view into a [`SimVision`]'s scripted frames.
#[derive(Debug, Clone)]
pub struct SimVisionHandle {
    inner: Arc<Mutex<VisionState>>,
}

impl SimVisionHandle {
    /// Queue a frame; queued frames are returned one per capture.
    pub fn push_frame(&self, frame: VisionSnapshot) {
        self.inner.lock().frames.push_back(frame);
    }

    /// Frame returned once the queue is empty.
    pub fn set_resting_frame(&self, frame: VisionSnapshot) {
        self.inner.lock().resting = frame;
    }

    pub fn fail_start(&self, fail: bool) {
        self.inner.lock().fail_start = fail;
    }

    pub fn fail_capture(&self, fail: bool) {
        self.inner.lock().fail_capture = fail;
    }

    pub fn color_target(&self) -> Option<String> {
        self.inner.lock().color.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.inner.lock().screenshots.clone()
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }
}

/// Simulated camera that replays scripted [`VisionSnapshot`]s.
pub struct SimVision {
    config: SimVisionConfig,
    inner: Arc<Mutex<VisionState>>,
}

impl SimVision {
    pub fn new(config: SimVisionConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(VisionState::default())),
        }
    }

    pub fn handle(&self) -> SimVisionHandle {
        SimVisionHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Vision for SimVision {
    fn start(&mut self) -> Result<(), ReflexError> {
        let mut s = self.inner.lock();
        if s.fail_start {
            return Err(ReflexError::init("sim_vision", "camera unavailable"));
        }
        s.started = true;
        s.color = Some(self.config.color.clone());
        info!(color = %self.config.color, "simulated vision started");
        Ok(())
    }

    fn stop(&mut self) {
        self.inner.lock().started = false;
    }

    fn capture_frame(&mut self) -> Result<VisionSnapshot, ReflexError> {
        let mut s = self.inner.lock();
        if s.fail_capture {
            return Err(ReflexError::Perception("frame capture failed".to_string()));
        }
        let frame = match s.frames.pop_front() {
            Some(frame) => frame,
            None => s.resting.clone(),
        };
        s.last = frame.clone();
        Ok(frame)
    }

    fn object_center(&self, kind: DetectionKind) -> Option<(i32, i32)> {
        first_center(&self.inner.lock().last, kind)
    }

    fn take_screenshot(&mut self) -> Result<PathBuf, ReflexError> {
        let name = format!("photo_{}.jpg", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.config.screenshot_dir.join(name);
        info!(path = %path.display(), "screenshot");
        self.inner.lock().screenshots.push(path.clone());
        Ok(path)
    }

    fn set_color_detection(&mut self, color: &str) -> Result<(), ReflexError> {
        let mut s = self.inner.lock();
        s.color = match color {
            "close" => None,
            other => Some(other.to_string()),
        };
        Ok(())
    }

    fn summary(&self) -> String {
        describe_snapshot(&self.inner.lock().last)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedTranscriber
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ScriptState {
    utterances: VecDeque<String>,
    fail_open: bool,
}

/// Cloneable handle used to feed a [`ScriptedTranscriber`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    pub fn push(&self, utterance: impl Into<String>) {
        self.inner.lock().utterances.push_back(utterance.into());
    }

    pub fn fail_open(&self, fail: bool) {
        self.inner.lock().fail_open = fail;
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().utterances.len()
    }
}

/// [`Transcriber`] that returns queued utterances.
#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Transcriber for ScriptedTranscriber {
    fn open(&mut self) -> Result<(), ReflexError> {
        if self.inner.lock().fail_open {
            return Err(ReflexError::init("transcriber", "microphone unavailable"));
        }
        Ok(())
    }

    fn next_utterance(&mut self, timeout: Duration) -> Result<Option<String>, ReflexError> {
        if let Some(text) = self.inner.lock().utterances.pop_front() {
            return Ok(Some(text));
        }
        std::thread::sleep(timeout.min(Duration::from_millis(20)));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_types::Detection;

    fn ready_actuator() -> (SimActuator, SimActuatorHandle) {
        let mut act = SimActuator::new(SimRobotConfig::default());
        let handle = act.handle();
        act.initialize().unwrap();
        handle.clear_commands();
        (act, handle)
    }

    #[test]
    fn continuous_move_sets_movement_start() {
        let (mut act, handle) = ready_actuator();
        act.move_forward(Some(40), None).unwrap();
        let state = handle.robot_state();
        assert_eq!(state.speed, 40);
        assert_eq!(state.movement, MovementState::Forward);
        assert!(state.movement_started.is_some());

        act.stop().unwrap();
        assert_eq!(handle.robot_state(), RobotState::default());
    }

    #[test]
    fn timed_move_ends_stopped() {
        let (mut act, handle) = ready_actuator();
        act.move_backward(None, Some(Duration::from_secs(1))).unwrap();
        assert!(!handle.robot_state().is_moving());
        assert_eq!(
            handle.commands(),
            vec![ActuatorCommand::MoveBackward {
                speed: 30,
                duration: Some(Duration::from_secs(1))
            }]
        );
    }

    #[test]
    fn command_log_keeps_only_the_newest() {
        let mut act = SimActuator::new(SimRobotConfig {
            max_recorded_commands: 3,
            ..Default::default()
        });
        let handle = act.handle();
        act.initialize().unwrap();
        for pan in 1..=10 {
            act.set_camera_pan(pan).unwrap();
        }
        assert_eq!(
            handle.commands(),
            vec![
                ActuatorCommand::SetPan(8),
                ActuatorCommand::SetPan(9),
                ActuatorCommand::SetPan(10),
            ]
        );
    }

    #[test]
    fn zero_limit_records_nothing() {
        let mut act = SimActuator::new(SimRobotConfig {
            max_recorded_commands: 0,
            ..Default::default()
        });
        let handle = act.handle();
        act.initialize().unwrap();
        act.stop().unwrap();
        assert!(handle.commands().is_empty());
        assert_eq!(handle.stop_count(), 0);
    }

    #[test]
    fn motion_before_initialize_is_a_hardware_fault() {
        let mut act = SimActuator::new(SimRobotConfig::default());
        assert!(matches!(
            act.move_forward(None, None),
            Err(ReflexError::HardwareFault { .. })
        ));
    }

    #[test]
    fn camera_servos_are_clamped() {
        let (mut act, _) = ready_actuator();
        act.set_camera_pan(120).unwrap();
        act.set_camera_tilt(-50).unwrap();
        assert_eq!(act.camera_angles(), (90, -30));
    }

    #[test]
    fn tracking_moves_camera_toward_target() {
        let (mut act, handle) = ready_actuator();
        act.track_object(620, 240).unwrap();
        let (pan, tilt) = handle.camera_angles();
        assert_eq!(pan, 9);
        assert_eq!(tilt, -10);
    }

    #[test]
    fn scripted_distances_then_resting_value() {
        let (mut act, handle) = ready_actuator();
        handle.push_distance(5.0);
        handle.set_resting_distance(42.0);
        assert_eq!(act.distance_cm().unwrap(), 5.0);
        assert_eq!(act.distance_cm().unwrap(), 42.0);
        handle.fail_distance(true);
        assert!(act.distance_cm().is_err());
    }

    #[test]
    fn avoid_obstacle_backs_off_and_turns() {
        let (mut act, handle) = ready_actuator();
        act.avoid_obstacle().unwrap();
        let cmds = handle.commands();
        assert_eq!(cmds[0], ActuatorCommand::AvoidObstacle);
        assert_eq!(cmds[1], ActuatorCommand::Stop);
        assert!(matches!(cmds[2], ActuatorCommand::MoveBackward { .. }));
        assert!(matches!(
            cmds[3],
            ActuatorCommand::TurnLeft { .. } | ActuatorCommand::TurnRight { .. }
        ));
        assert!(!handle.robot_state().is_moving());
    }

    #[test]
    fn vision_replays_frames_and_remembers_last() {
        let mut vision = SimVision::new(SimVisionConfig::default());
        let handle = vision.handle();
        vision.start().unwrap();
        handle.push_frame(VisionSnapshot {
            faces: vec![Detection::new(100, 120, 40, 40)],
            ..Default::default()
        });

        let frame = vision.capture_frame().unwrap();
        assert_eq!(frame.faces.len(), 1);
        assert_eq!(vision.object_center(DetectionKind::Face), Some((100, 120)));
        assert_eq!(vision.summary(), "1 face(s)");

        let frame = vision.capture_frame().unwrap();
        assert!(frame.is_empty());
        assert_eq!(vision.object_center(DetectionKind::Face), None);
    }

    #[test]
    fn vision_color_target_and_screenshots() {
        let mut vision = SimVision::new(SimVisionConfig::default());
        let handle = vision.handle();
        vision.start().unwrap();
        assert_eq!(handle.color_target().as_deref(), Some("red"));
        vision.set_color_detection("blue").unwrap();
        assert_eq!(handle.color_target().as_deref(), Some("blue"));
        vision.set_color_detection("close").unwrap();
        assert_eq!(handle.color_target(), None);

        let path = vision.take_screenshot().unwrap();
        assert!(path.starts_with("photos"));
        assert_eq!(handle.screenshots(), vec![path]);
    }

    #[test]
    fn vision_start_failure_is_initialization_error() {
        let mut vision = SimVision::new(SimVisionConfig::default());
        vision.handle().fail_start(true);
        assert!(matches!(
            vision.start(),
            Err(ReflexError::Initialization { .. })
        ));
    }

    #[test]
    fn scripted_transcriber_drains_queue() {
        let mut t = ScriptedTranscriber::new();
        let script = t.handle();
        script.push("hello");
        assert_eq!(
            t.next_utterance(Duration::from_millis(1)).unwrap().as_deref(),
            Some("hello")
        );
        assert_eq!(t.next_utterance(Duration::from_millis(1)).unwrap(), None);
        assert_eq!(script.pending(), 0);
    }
}
