//! [`ControlLoop`] – the fixed-frequency sense → decide → act cycle.
//!
//! Each cycle:
//!
//! 1. **Perceive** – capture a vision frame, take the pending transcription
//!    (only while listening), read the range finder and the robot state, and
//!    fold them into a [`Context`] via the [`ContextBuilder`].
//! 2. **Decide** – hand the context to the [`DecisionEngine`].
//! 3. **Act** – run every returned [`ActionToken`] through the
//!    [`ActionExecutor`]. A failing action is logged and the rest still run.
//! 4. **Evaluate** – re-read the range finder and let the [`SafetyMonitor`]
//!    veto the result. An unsafe verdict stops the actuator; it is not an
//!    error.
//!
//! A phase that fails abandons the cycle with a [`PhaseError`]; the loop
//! logs it, counts it, waits `recovery_pause` and carries on. Completed
//! cycles are paced to `frequency_hz`; an overrun is logged and counted but
//! never caught up.
//!
//! # Example
//!
//! ```rust,no_run
//! use reflex_hal::AudioListener;
//! use reflex_hal::sim::{ScriptedTranscriber, SimActuator, SimRobotConfig, SimVision, SimVisionConfig};
//! use reflex_kernel::RuleEngine;
//! use reflex_runtime::control_loop::{Collaborators, ControlLoop, LoopConfig};
//! use reflex_types::LoopMode;
//!
//! let collaborators = Collaborators {
//!     vision: Box::new(SimVision::new(SimVisionConfig::default())),
//!     audio: Box::new(AudioListener::new(ScriptedTranscriber::new())),
//!     actuator: Box::new(SimActuator::new(SimRobotConfig::default())),
//! };
//! let mut control = ControlLoop::new(
//!     LoopConfig::default(),
//!     collaborators,
//!     Box::new(RuleEngine::with_default_rules()),
//! );
//!
//! // Runs until Ctrl-C or `control.stop_handle().stop()`.
//! let metrics = control.run(LoopMode::Autonomous).expect("initialisation failed");
//! println!("{} cycles", metrics.cycle_count);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use reflex_hal::{Actuator, Audio, Vision};
use reflex_kernel::{DecisionEngine, SafetyConfig, SafetyMonitor, SafetyVerdict};
use reflex_perception::{ContextBuilder, ContextConfig};
use reflex_types::{ActionToken, Context, LoopMetrics, LoopMode, ReflexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::executor::{ActionExecutor, ActionOutcome, CycleInput, Effectors};
use crate::signals::SignalRoute;
use crate::voice::VoiceLexicon;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and behaviour settings for [`ControlLoop`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Target cycles per second.
    pub frequency_hz: f64,
    /// Pause after a failed cycle.
    #[serde(with = "reflex_types::serde_secs")]
    pub recovery_pause: Duration,
    /// Emit a progress line every this many completed cycles (`0` disables).
    pub log_every_cycles: u64,
    /// Listen for voice commands regardless of mode.
    pub voice_control: bool,
    /// Speed used by `move_forward_slow`.
    pub slow_speed: u8,
    /// Degrees per `look_*` voice command.
    pub camera_step: i16,
    /// Route Ctrl-C to this loop while it runs.
    pub handle_signals: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            recovery_pause: Duration::from_millis(500),
            log_every_cycles: 50,
            voice_control: false,
            slow_speed: 15,
            camera_step: 10,
            handle_signals: true,
        }
    }
}

impl LoopConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), ReflexError> {
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(ReflexError::Config(format!(
                "frequency_hz must be a positive number, got {}",
                self.frequency_hz
            )));
        }
        Ok(())
    }

    /// Target duration of one cycle.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency_hz).unwrap_or(Duration::from_secs(1))
    }
}

/// The hardware-facing collaborators a loop owns for its lifetime.
pub struct Collaborators {
    pub vision: Box<dyn Vision>,
    pub audio: Box<dyn Audio>,
    pub actuator: Box<dyn Actuator>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Perceive,
    Decide,
    Act,
    Evaluate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Perceive => "perceive",
            Phase::Decide => "decide",
            Phase::Act => "act",
            Phase::Evaluate => "evaluate",
        })
    }
}

/// A cycle abandoned in `phase`.
#[derive(Debug, Clone, Error)]
#[error("{phase} phase failed: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: ReflexError,
}

impl PhaseError {
    fn at(phase: Phase) -> impl FnOnce(ReflexError) -> PhaseError {
        move |source| PhaseError { phase, source }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StopHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable, thread-safe request to end a running loop.
///
/// The request is observed at the next cycle boundary. A request made before
/// [`ControlLoop::run`] starts stays pending and ends that run immediately;
/// `run` consumes it on return so the next run starts fresh.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clear a pending request, returning whether there was one.
    pub(crate) fn take_request(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

struct Perception {
    context: Context,
    utterance: Option<String>,
}

pub struct ControlLoop {
    config: LoopConfig,
    vision: Box<dyn Vision>,
    audio: Box<dyn Audio>,
    actuator: Box<dyn Actuator>,
    engine: Box<dyn DecisionEngine>,
    context: ContextBuilder,
    safety: SafetyMonitor,
    executor: ActionExecutor,
    stop: StopHandle,
    metrics: LoopMetrics,
    mode: LoopMode,
    initialized: bool,
}

impl ControlLoop {
    pub fn new(
        config: LoopConfig,
        collaborators: Collaborators,
        engine: Box<dyn DecisionEngine>,
    ) -> Self {
        let executor =
            ActionExecutor::new(config.slow_speed, config.camera_step, VoiceLexicon::default());
        Self {
            config,
            vision: collaborators.vision,
            audio: collaborators.audio,
            actuator: collaborators.actuator,
            engine,
            context: ContextBuilder::default(),
            safety: SafetyMonitor::default(),
            executor,
            stop: StopHandle::new(),
            metrics: LoopMetrics::new(Uuid::new_v4()),
            mode: LoopMode::default(),
            initialized: false,
        }
    }

    pub fn with_context_config(mut self, config: ContextConfig) -> Self {
        self.context = ContextBuilder::new(config);
        self
    }

    pub fn with_safety_config(mut self, config: SafetyConfig) -> Self {
        self.safety = SafetyMonitor::new(config);
        self
    }

    pub fn with_lexicon(mut self, lexicon: VoiceLexicon) -> Self {
        self.executor =
            ActionExecutor::new(self.config.slow_speed, self.config.camera_step, lexicon);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn DecisionEngine {
        self.engine.as_ref()
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Snapshot of the loop's statistics.
    pub fn metrics(&self) -> LoopMetrics {
        self.metrics.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Switch the operating mode. Entering [`LoopMode::VoiceControl`] starts
    /// listening.
    pub fn set_mode(&mut self, mode: LoopMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "mode changed");
        }
        self.mode = mode;
        self.metrics.mode = mode;
        if mode == LoopMode::VoiceControl && self.initialized && !self.audio.is_listening() {
            self.audio.start_listening();
        }
    }

    /// Bring the collaborators up.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Initialization`] if the actuator or vision
    /// cannot start. An audio failure only disables voice input.
    pub fn initialize(&mut self) -> Result<(), ReflexError> {
        if self.initialized {
            return Ok(());
        }
        self.actuator.initialize().map_err(|e| {
            error!(error = %e, "actuator initialization failed");
            as_init_error("actuator", e)
        })?;
        if let Err(e) = self.vision.start() {
            error!(error = %e, "vision initialization failed");
            self.actuator.shutdown();
            return Err(as_init_error("vision", e));
        }

        match self.audio.start() {
            Ok(()) => {
                if self.config.voice_control || self.mode == LoopMode::VoiceControl {
                    self.audio.start_listening();
                }
            }
            Err(e) => warn!(error = %e, "audio unavailable; continuing without voice input"),
        }

        self.context.reset();
        self.initialized = true;
        info!(actuator = self.actuator.id(), engine = self.engine.name(), "control loop initialized");
        Ok(())
    }

    /// Initialize, then cycle until stopped, then shut down.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Config`] for unusable settings and
    /// [`ReflexError::Initialization`] if a collaborator fails to start; the
    /// loop never runs in either case. Per-cycle failures are absorbed.
    pub fn run(&mut self, mode: LoopMode) -> Result<LoopMetrics, ReflexError> {
        self.config.validate()?;
        if self.stop.take_request() {
            info!("stop requested before start, control loop not started");
            return Ok(self.metrics());
        }
        self.set_mode(mode);
        self.initialize()?;

        let route = self
            .config
            .handle_signals
            .then(|| SignalRoute::global().register(self.stop.clone()));

        self.metrics.running = true;
        self.metrics.started_at = Some(Utc::now());
        let period = self.config.period();
        info!(
            run_id = %self.metrics.run_id,
            mode = %self.mode,
            engine = self.engine.name(),
            frequency_hz = self.config.frequency_hz,
            "control loop running"
        );

        while !self.stop.is_stop_requested() {
            let started = Instant::now();
            match self.run_cycle() {
                Ok(_) => self.pace(started, period),
                Err(_) => thread::sleep(self.config.recovery_pause),
            }
        }

        drop(route);
        self.stop.take_request();
        self.shutdown();
        Ok(self.metrics())
    }

    /// Run one perceive → decide → act → evaluate cycle and return the
    /// actions that were decided.
    ///
    /// Completed cycles update the count and average duration; a failed
    /// cycle only increments `failed_cycles`.
    pub fn run_cycle(&mut self) -> Result<Vec<ActionToken>, PhaseError> {
        let started = Instant::now();
        let result = self.cycle_phases();
        match &result {
            Ok(_) => {
                self.metrics.record_cycle(started.elapsed().as_secs_f64());
                let every = self.config.log_every_cycles;
                if every > 0 && self.metrics.cycle_count % every == 0 {
                    info!(
                        cycles = self.metrics.cycle_count,
                        average_cycle_secs = self.metrics.average_cycle_duration,
                        failed_cycles = self.metrics.failed_cycles,
                        mode = %self.mode,
                        "control loop progress"
                    );
                }
            }
            Err(e) => {
                self.metrics.failed_cycles += 1;
                error!(phase = %e.phase, error = %e.source, "cycle failed");
            }
        }
        result
    }

    fn cycle_phases(&mut self) -> Result<Vec<ActionToken>, PhaseError> {
        let perception = self.perceive()?;
        let actions = self.decide(&perception.context)?;
        self.act(&actions, perception.utterance.as_deref())?;
        self.evaluate()?;
        Ok(actions)
    }

    #[instrument(level = "debug", skip(self))]
    fn perceive(&mut self) -> Result<Perception, PhaseError> {
        let snapshot = self
            .vision
            .capture_frame()
            .map_err(PhaseError::at(Phase::Perceive))?;
        let utterance = if self.audio.is_listening() {
            self.audio.take_transcription()
        } else {
            None
        };
        let distance = self
            .actuator
            .distance_cm()
            .map_err(PhaseError::at(Phase::Perceive))?;
        let state = self.actuator.state();

        let context = self
            .context
            .build(&snapshot, utterance.as_deref(), &state, distance);
        Ok(Perception { context, utterance })
    }

    #[instrument(level = "debug", skip_all, fields(engine = self.engine.name()))]
    fn decide(&self, context: &Context) -> Result<Vec<ActionToken>, PhaseError> {
        let actions = self
            .engine
            .evaluate(context)
            .map_err(PhaseError::at(Phase::Decide))?;
        if !actions.is_empty() {
            debug!(actions = ?actions, "decided");
        }
        Ok(actions)
    }

    #[instrument(level = "debug", skip_all, fields(count = actions.len()))]
    fn act(&mut self, actions: &[ActionToken], utterance: Option<&str>) -> Result<(), PhaseError> {
        let mut fx = Effectors {
            actuator: self.actuator.as_mut(),
            vision: self.vision.as_mut(),
        };
        let input = CycleInput {
            utterance,
            mode: self.mode,
        };

        let mut requested = None;
        for token in actions {
            match self.executor.execute(token, &mut fx, input) {
                Ok(ActionOutcome::ModeChange(mode)) => requested = Some(mode),
                Ok(ActionOutcome::Done | ActionOutcome::Skipped) => {}
                Err(e) => warn!(action = %token, error = %e, "action failed"),
            }
        }

        if let Some(mode) = requested {
            self.set_mode(mode);
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn evaluate(&mut self) -> Result<SafetyVerdict, PhaseError> {
        let distance = self
            .actuator
            .distance_cm()
            .map_err(PhaseError::at(Phase::Evaluate))?;
        let state = self.actuator.state();
        Ok(self.safety.check(distance, &state, self.actuator.as_mut()))
    }

    /// Sleep out the rest of the period, or record an overrun.
    fn pace(&mut self, started: Instant, period: Duration) {
        let elapsed = started.elapsed();
        match period.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => thread::sleep(remaining),
            _ => {
                self.metrics.overruns += 1;
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = period.as_millis() as u64,
                    "cycle overran its period"
                );
            }
        }
    }

    /// Stop the robot and release every collaborator.
    pub fn shutdown(&mut self) {
        self.stop.stop();
        self.metrics.running = false;
        if self.initialized {
            if let Err(e) = self.actuator.stop() {
                warn!(error = %e, "stop during shutdown failed");
            }
        }
        self.actuator.shutdown();
        self.vision.stop();
        self.audio.stop_listening();
        self.audio.stop();
        self.initialized = false;
        info!(
            cycles = self.metrics.cycle_count,
            failed_cycles = self.metrics.failed_cycles,
            average_cycle_secs = self.metrics.average_cycle_duration,
            "control loop stopped"
        );
    }
}

fn as_init_error(component: &str, e: ReflexError) -> ReflexError {
    match e {
        ReflexError::Initialization { .. } => e,
        other => ReflexError::init(component, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;
    use reflex_hal::sim::{
        ActuatorCommand, SimActuator, SimActuatorHandle, SimRobotConfig, SimVision,
        SimVisionConfig, SimVisionHandle,
    };
    use reflex_kernel::RuleEngine;
    use reflex_types::{Detection, Sound, VisionSnapshot};

    // ── fakes ────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct AudioState {
        started: bool,
        listening: bool,
        queue: Vec<String>,
        last: Option<String>,
        fail_start: bool,
    }

    #[derive(Clone, Default)]
    struct FakeAudio(Arc<Mutex<AudioState>>);

    impl FakeAudio {
        fn say(&self, text: &str) {
            self.0.lock().queue.push(text.to_string());
        }
    }

    impl Audio for FakeAudio {
        fn start(&mut self) -> Result<(), ReflexError> {
            let mut s = self.0.lock();
            if s.fail_start {
                return Err(ReflexError::init("audio", "no microphone"));
            }
            s.started = true;
            Ok(())
        }
        fn stop(&mut self) {
            let mut s = self.0.lock();
            s.started = false;
            s.listening = false;
        }
        fn is_listening(&self) -> bool {
            self.0.lock().listening
        }
        fn start_listening(&mut self) {
            let mut s = self.0.lock();
            s.listening = s.started;
        }
        fn stop_listening(&mut self) {
            self.0.lock().listening = false;
        }
        fn take_transcription(&mut self) -> Option<String> {
            let mut s = self.0.lock();
            let next = if s.queue.is_empty() {
                None
            } else {
                Some(s.queue.remove(0))
            };
            if next.is_some() {
                s.last = next.clone();
            }
            next
        }
        fn last_transcription(&self) -> Option<String> {
            self.0.lock().last.clone()
        }
    }

    /// Fails its first `failures` evaluations, then returns `actions`.
    #[derive(Clone)]
    struct ScriptedEngine {
        failures: usize,
        calls: Arc<AtomicUsize>,
        actions: Vec<ActionToken>,
        stop_after: Arc<Mutex<Option<(usize, StopHandle)>>>,
    }

    impl ScriptedEngine {
        fn returning(actions: Vec<ActionToken>) -> Self {
            Self {
                failures: 0,
                calls: Arc::new(AtomicUsize::new(0)),
                actions,
                stop_after: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl DecisionEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }
        fn evaluate(&self, _: &Context) -> Result<Vec<ActionToken>, ReflexError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, handle)) = &*self.stop_after.lock() {
                if n >= *limit {
                    handle.stop();
                }
            }
            if n <= self.failures {
                return Err(ReflexError::ReasonerFailed("scripted failure".into()));
            }
            Ok(self.actions.clone())
        }
        fn explain(&self, _: &Context) -> String {
            "scripted".into()
        }
    }

    struct Rig {
        control: ControlLoop,
        robot: SimActuatorHandle,
        camera: SimVisionHandle,
        audio: FakeAudio,
    }

    fn rig_with(engine: Box<dyn DecisionEngine>, config: LoopConfig) -> Rig {
        let actuator = SimActuator::new(SimRobotConfig::default());
        let vision = SimVision::new(SimVisionConfig::default());
        let audio = FakeAudio::default();
        let robot = actuator.handle();
        let camera = vision.handle();
        let control = ControlLoop::new(
            config,
            Collaborators {
                vision: Box::new(vision),
                audio: Box::new(audio.clone()),
                actuator: Box::new(actuator),
            },
            engine,
        );
        Rig {
            control,
            robot,
            camera,
            audio,
        }
    }

    fn test_config() -> LoopConfig {
        LoopConfig {
            frequency_hz: 200.0,
            recovery_pause: Duration::from_millis(1),
            handle_signals: false,
            ..Default::default()
        }
    }

    fn rules_rig() -> Rig {
        rig_with(Box::new(RuleEngine::with_default_rules()), test_config())
    }

    // ── tests ────────────────────────────────────────────────────────────────

    #[test]
    fn quiet_cycle_does_nothing_but_counts() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        rig.robot.clear_commands();

        assert_eq!(rig.control.run_cycle().unwrap(), vec![]);
        let metrics = rig.control.metrics();
        assert_eq!(metrics.cycle_count, 1);
        assert_eq!(metrics.failed_cycles, 0);
        assert!(metrics.average_cycle_duration >= 0.0);
        assert!(rig.robot.commands().is_empty());
    }

    #[test]
    fn face_in_frame_is_followed() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        let mut frame = VisionSnapshot::default();
        frame.faces.push(Detection::new(320, 240, 60, 60));
        rig.camera.push_frame(frame);

        assert_eq!(
            rig.control.run_cycle().unwrap(),
            vec![ActionToken::TrackFace, ActionToken::MoveForwardSlow]
        );
        assert_eq!(rig.robot.robot_state().speed, 15);
    }

    #[test]
    fn decide_failure_skips_count_and_next_cycle_runs() {
        let engine = ScriptedEngine {
            failures: 1,
            ..ScriptedEngine::returning(vec![ActionToken::Stop])
        };
        let mut rig = rig_with(Box::new(engine), test_config());
        rig.control.initialize().unwrap();

        let err = rig.control.run_cycle().unwrap_err();
        assert_eq!(err.phase, Phase::Decide);
        assert_eq!(rig.control.metrics().cycle_count, 0);
        assert_eq!(rig.control.metrics().failed_cycles, 1);

        assert_eq!(rig.control.run_cycle().unwrap(), vec![ActionToken::Stop]);
        assert_eq!(rig.control.metrics().cycle_count, 1);
    }

    #[test]
    fn perceive_failure_is_reported_with_its_phase() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        rig.camera.fail_capture(true);

        let err = rig.control.run_cycle().unwrap_err();
        assert_eq!(err.phase, Phase::Perceive);
        assert!(err.to_string().starts_with("perceive phase failed"));
    }

    #[test]
    fn close_obstacle_triggers_safety_stop() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        rig.robot.set_resting_distance(5.0);
        rig.robot.clear_commands();

        assert_eq!(
            rig.control.run_cycle().unwrap(),
            vec![ActionToken::Stop, ActionToken::TurnRandom, ActionToken::MoveForward]
        );
        let commands = rig.robot.commands();
        assert_eq!(commands.last(), Some(&ActuatorCommand::Stop));
        assert_eq!(rig.robot.stop_count(), 2);
        assert!(!rig.robot.robot_state().is_moving());
    }

    #[test]
    fn watchdog_stops_long_movement() {
        let engine = ScriptedEngine::returning(vec![]);
        let mut rig = rig_with(Box::new(engine), test_config());
        rig.control.initialize().unwrap();
        let long_ago = Instant::now()
            .checked_sub(Duration::from_secs(6))
            .unwrap();
        rig.robot.set_movement_started(long_ago);
        rig.robot.clear_commands();

        rig.control.run_cycle().unwrap();
        assert_eq!(rig.robot.commands(), vec![ActuatorCommand::Stop]);
    }

    #[test]
    fn follow_me_switches_to_tracking() {
        let config = LoopConfig {
            voice_control: true,
            ..test_config()
        };
        let mut rig = rig_with(Box::new(RuleEngine::with_default_rules()), config);
        rig.control.initialize().unwrap();
        assert!(rig.audio.is_listening());
        rig.audio.say("please follow me");

        assert_eq!(
            rig.control.run_cycle().unwrap(),
            vec![ActionToken::ParseCommand, ActionToken::ExecuteCommand]
        );
        assert_eq!(rig.control.mode(), LoopMode::Tracking);
        assert_eq!(rig.control.metrics().mode, LoopMode::Tracking);
        assert!(
            rig.robot
                .commands()
                .contains(&ActuatorCommand::PlaySound(Sound::Success))
        );

        // The utterance was consumed by the first cycle.
        assert_eq!(rig.control.run_cycle().unwrap(), vec![]);
    }

    #[test]
    fn transcriptions_ignored_when_not_listening() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        rig.audio.say("stop");
        assert!(!rig.audio.is_listening());
        assert_eq!(rig.control.run_cycle().unwrap(), vec![]);
    }

    #[test]
    fn voice_control_mode_starts_listening() {
        let mut rig = rules_rig();
        rig.control.initialize().unwrap();
        rig.control.set_mode(LoopMode::VoiceControl);
        assert!(rig.audio.is_listening());
    }

    #[test]
    fn actuator_init_failure_prevents_running() {
        let mut rig = rules_rig();
        rig.robot.fail_initialize(true);

        let err = rig.control.run(LoopMode::Autonomous).unwrap_err();
        assert!(matches!(err, ReflexError::Initialization { .. }));
        assert!(!rig.control.metrics().running);
        assert_eq!(rig.control.metrics().cycle_count, 0);
    }

    #[test]
    fn vision_init_failure_releases_actuator() {
        let mut rig = rules_rig();
        rig.camera.fail_start(true);

        assert!(rig.control.initialize().is_err());
        assert_eq!(
            rig.robot.commands(),
            vec![ActuatorCommand::Initialize, ActuatorCommand::Shutdown]
        );
    }

    #[test]
    fn audio_failure_is_not_fatal() {
        let mut rig = rules_rig();
        rig.audio.0.lock().fail_start = true;
        rig.control.initialize().unwrap();
        assert_eq!(rig.control.run_cycle().unwrap(), vec![]);
    }

    #[test]
    fn invalid_frequency_is_rejected() {
        let config = LoopConfig {
            frequency_hz: 0.0,
            ..test_config()
        };
        let mut rig = rig_with(Box::new(RuleEngine::with_default_rules()), config);
        assert!(matches!(
            rig.control.run(LoopMode::Autonomous),
            Err(ReflexError::Config(_))
        ));
    }

    #[test]
    fn stop_handle_ends_run_and_shuts_down() {
        let engine = ScriptedEngine::returning(vec![]);
        let config = LoopConfig {
            handle_signals: true,
            ..test_config()
        };
        let mut rig = rig_with(Box::new(engine.clone()), config);
        *engine.stop_after.lock() = Some((3, rig.control.stop_handle()));

        let metrics = rig.control.run(LoopMode::Exploration).unwrap();
        assert_eq!(metrics.cycle_count, 3);
        assert_eq!(metrics.mode, LoopMode::Exploration);
        assert!(!metrics.running);
        assert!(metrics.started_at.is_some());
        assert_eq!(rig.robot.commands().last(), Some(&ActuatorCommand::Shutdown));
        assert!(!rig.camera.is_started());
    }

    #[test]
    fn long_runs_keep_the_command_log_bounded() {
        let mut rig = rules_rig();
        rig.robot.set_resting_distance(5.0);
        rig.control.initialize().unwrap();
        for _ in 0..600 {
            rig.control.run_cycle().unwrap();
        }
        assert_eq!(rig.control.metrics().cycle_count, 600);
        let limit = SimRobotConfig::default().max_recorded_commands;
        assert_eq!(rig.robot.commands().len(), limit);
    }

    #[test]
    fn stop_before_run_ends_it_immediately() {
        let rig = rules_rig();
        let mut control = rig.control;
        let handle = control.stop_handle();
        handle.stop();

        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(control.run(LoopMode::Autonomous));
        });
        let metrics = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("run ignored an earlier stop")
            .unwrap();
        assert_eq!(metrics.cycle_count, 0);
        assert!(rig.robot.commands().is_empty());
        assert!(!handle.is_stop_requested());
    }

    #[test]
    fn stop_request_is_consumed_by_the_run_it_ends() {
        let engine = ScriptedEngine::returning(vec![]);
        let mut rig = rig_with(Box::new(engine.clone()), test_config());
        let handle = rig.control.stop_handle();
        handle.stop();
        assert_eq!(rig.control.run(LoopMode::Autonomous).unwrap().cycle_count, 0);

        *engine.stop_after.lock() = Some((2, handle.clone()));
        assert_eq!(rig.control.run(LoopMode::Autonomous).unwrap().cycle_count, 2);
        assert!(!handle.is_stop_requested());
    }

    #[test]
    fn overrun_is_counted_not_slept() {
        let mut rig = rules_rig();
        let period = Duration::from_millis(5);
        let started = Instant::now().checked_sub(period * 2).unwrap();
        let before = Instant::now();
        rig.control.pace(started, period);
        assert!(before.elapsed() < period);
        assert_eq!(rig.control.metrics().overruns, 1);
    }

    #[test]
    fn period_follows_frequency() {
        let config = LoopConfig {
            frequency_hz: 4.0,
            ..Default::default()
        };
        assert_eq!(config.period(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loop_config_parses_fractional_pause() {
        let config: LoopConfig =
            serde_json::from_str(r#"{"frequency_hz": 10.0, "recovery_pause": 0.25}"#).unwrap();
        assert_eq!(config.recovery_pause, Duration::from_millis(250));
        assert_eq!(config.log_every_cycles, 50);
    }
}
