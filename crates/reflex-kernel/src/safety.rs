//! [`SafetyMonitor`] – out-of-band veto on whatever the decision produced.
//!
//! Evaluated once per cycle after the act phase. Two checks run in a fixed
//! order:
//!
//! 1. **Emergency stop distance** – a range reading in
//!    `(0, emergency_stop_distance)` means something is about to be hit.
//! 2. **Continuous-movement watchdog** – the drive base has been moving
//!    without a stop for longer than `max_continuous_movement`.
//!
//! Either violation stops the actuator. A violation is a verdict, not an
//! error: the cycle still completes.

use std::fmt;
use std::time::{Duration, Instant};

use reflex_hal::Actuator;
use reflex_types::RobotState;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds enforced by [`SafetyMonitor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Readings strictly below this distance (cm) force a stop.
    pub emergency_stop_distance: f64,
    /// Longest uninterrupted movement before the watchdog forces a stop.
    #[serde(with = "reflex_types::serde_secs")]
    pub max_continuous_movement: Duration,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            emergency_stop_distance: 10.0,
            max_continuous_movement: Duration::from_secs(5),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Verdicts
// ────────────────────────────────────────────────────────────────────────────

/// Why a cycle was judged unsafe.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyViolation {
    ObstacleTooClose { distance: f64 },
    MovementTimeout { elapsed: Duration },
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyViolation::ObstacleTooClose { distance } => {
                write!(f, "obstacle too close ({distance:.1} cm)")
            }
            SafetyViolation::MovementTimeout { elapsed } => {
                write!(f, "continuous movement for {:.1} s", elapsed.as_secs_f64())
            }
        }
    }
}

/// Outcome of one safety evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe(SafetyViolation),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SafetyMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Emergency-stop and watchdog checks over the actuator's reported state.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use reflex_kernel::safety::{SafetyConfig, SafetyMonitor, SafetyVerdict, SafetyViolation};
/// use reflex_types::RobotState;
///
/// let monitor = SafetyMonitor::new(SafetyConfig::default());
/// let idle = RobotState::default();
///
/// assert_eq!(monitor.assess(50.0, &idle, Instant::now()), SafetyVerdict::Safe);
/// assert_eq!(
///     monitor.assess(4.0, &idle, Instant::now()),
///     SafetyVerdict::Unsafe(SafetyViolation::ObstacleTooClose { distance: 4.0 })
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct SafetyMonitor {
    config: SafetyConfig,
}

impl SafetyMonitor {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Judge `distance_cm` and `state` as of `now` without side effects.
    pub fn assess(&self, distance_cm: f64, state: &RobotState, now: Instant) -> SafetyVerdict {
        if distance_cm > 0.0 && distance_cm < self.config.emergency_stop_distance {
            return SafetyVerdict::Unsafe(SafetyViolation::ObstacleTooClose {
                distance: distance_cm,
            });
        }

        if state.is_moving() {
            if let Some(started) = state.movement_started {
                let elapsed = now.saturating_duration_since(started);
                if elapsed > self.config.max_continuous_movement {
                    return SafetyVerdict::Unsafe(SafetyViolation::MovementTimeout { elapsed });
                }
            }
        }

        SafetyVerdict::Safe
    }

    /// Judge the current reading and stop `actuator` on a violation.
    ///
    /// A failing stop command is logged; the verdict is still returned.
    pub fn check(
        &self,
        distance_cm: f64,
        state: &RobotState,
        actuator: &mut dyn Actuator,
    ) -> SafetyVerdict {
        let verdict = self.assess(distance_cm, state, Instant::now());
        if let SafetyVerdict::Unsafe(violation) = &verdict {
            warn!(reason = %violation, "safety violation, stopping");
            if let Err(e) = actuator.stop() {
                error!(error = %e, "emergency stop failed");
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_hal::sim::{SimActuator, SimRobotConfig};
    use reflex_types::MovementState;

    fn moving_since(started: Instant) -> RobotState {
        RobotState {
            speed: 30,
            movement: MovementState::Forward,
            steering: 0,
            movement_started: Some(started),
        }
    }

    fn ready_robot() -> SimActuator {
        let mut robot = SimActuator::new(SimRobotConfig::default());
        robot.initialize().unwrap();
        robot
    }

    #[test]
    fn distances_inside_open_interval_are_unsafe() {
        let monitor = SafetyMonitor::default();
        let idle = RobotState::default();
        let now = Instant::now();
        for d in [0.1, 5.0, 9.99] {
            assert!(!monitor.assess(d, &idle, now).is_safe(), "distance {d}");
        }
        for d in [-1.0, 0.0, 10.0, 250.0] {
            assert!(monitor.assess(d, &idle, now).is_safe(), "distance {d}");
        }
    }

    #[test]
    fn watchdog_fires_after_max_movement() {
        let monitor = SafetyMonitor::default();
        let t0 = Instant::now();
        let state = moving_since(t0);

        assert!(monitor.assess(80.0, &state, t0 + Duration::from_secs(4)).is_safe());
        assert_eq!(
            monitor.assess(80.0, &state, t0 + Duration::from_secs(6)),
            SafetyVerdict::Unsafe(SafetyViolation::MovementTimeout {
                elapsed: Duration::from_secs(6)
            })
        );
    }

    #[test]
    fn stopped_robot_never_times_out() {
        let monitor = SafetyMonitor::default();
        let t0 = Instant::now();
        let state = RobotState {
            movement_started: Some(t0),
            ..Default::default()
        };
        assert!(monitor.assess(80.0, &state, t0 + Duration::from_secs(60)).is_safe());
    }

    #[test]
    fn obstacle_is_reported_before_timeout() {
        let monitor = SafetyMonitor::default();
        let t0 = Instant::now();
        let verdict = monitor.assess(3.0, &moving_since(t0), t0 + Duration::from_secs(60));
        assert!(matches!(
            verdict,
            SafetyVerdict::Unsafe(SafetyViolation::ObstacleTooClose { .. })
        ));
    }

    #[test]
    fn check_stops_the_actuator_on_violation() {
        let monitor = SafetyMonitor::default();
        let mut robot = ready_robot();
        let log = robot.handle();
        robot.move_forward(None, None).unwrap();

        let verdict = monitor.check(5.0, &robot.state(), &mut robot);
        assert!(!verdict.is_safe());
        assert_eq!(log.stop_count(), 1);
        assert!(!robot.state().is_moving());
    }

    #[test]
    fn check_leaves_a_safe_robot_alone() {
        let monitor = SafetyMonitor::default();
        let mut robot = ready_robot();
        let log = robot.handle();
        robot.move_forward(None, None).unwrap();

        assert!(monitor.check(60.0, &robot.state(), &mut robot).is_safe());
        assert_eq!(log.stop_count(), 0);
        assert!(robot.state().is_moving());
    }

    #[test]
    fn config_reads_seconds_from_toml_shaped_json() {
        let cfg: SafetyConfig =
            serde_json::from_str(r#"{"max_continuous_movement": 2.5}"#).unwrap();
        assert_eq!(cfg.max_continuous_movement, Duration::from_millis(2500));
        assert_eq!(cfg.emergency_stop_distance, 10.0);
    }
}
