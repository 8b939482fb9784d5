//! Generic `Actuator` trait for the robot's physical outputs.
//!
//! One driver covers the whole chassis: drive motors, steering servo,
//! camera pan/tilt servos, the ultrasonic range finder and the speaker. The
//! control loop and the safety monitor only ever talk to this trait.

use std::time::Duration;

use reflex_types::{ReflexError, RobotState, Sound};

/// The robot's motion, sensing and sound outputs.
///
/// `speed` is a 0–100 duty value and `angle` a servo angle in degrees;
/// `None` selects the driver's configured default. When a `duration` is
/// given the driver moves for that long and then stops (or re-centres the
/// steering for turns); without one the movement continues until the next
/// command.
pub trait Actuator: Send {
    /// Stable identifier for this driver, e.g. `"picarx"` or `"sim"`.
    fn id(&self) -> &str;

    /// Bring the hardware up and park it in a safe state.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Initialization`] when the hardware cannot be
    /// reached.
    fn initialize(&mut self) -> Result<(), ReflexError>;

    /// Stop all motion and release the hardware. Never fails.
    fn shutdown(&mut self);

    fn move_forward(
        &mut self,
        speed: Option<u8>,
        duration: Option<Duration>,
    ) -> Result<(), ReflexError>;

    fn move_backward(
        &mut self,
        speed: Option<u8>,
        duration: Option<Duration>,
    ) -> Result<(), ReflexError>;

    fn turn_left(&mut self, angle: Option<i16>, duration: Option<Duration>)
    -> Result<(), ReflexError>;

    fn turn_right(
        &mut self,
        angle: Option<i16>,
        duration: Option<Duration>,
    ) -> Result<(), ReflexError>;

    /// Cut drive power immediately.
    fn stop(&mut self) -> Result<(), ReflexError>;

    /// Read the ultrasonic range finder in centimetres. Non-positive values
    /// mean "no echo".
    fn distance_cm(&mut self) -> Result<f64, ReflexError>;

    /// Snapshot of the current kinematic state.
    fn state(&self) -> RobotState;

    /// Nudge the camera servos so that pixel `(x, y)` moves toward the
    /// centre of the frame.
    fn track_object(&mut self, x: i32, y: i32) -> Result<(), ReflexError>;

    /// Sweep the camera across the field of view and re-centre it.
    fn scan_environment(&mut self) -> Result<(), ReflexError>;

    /// Stop, back off and steer around whatever is in front.
    fn avoid_obstacle(&mut self) -> Result<(), ReflexError>;

    /// Set the camera pan servo, clamped to its mechanical range.
    fn set_camera_pan(&mut self, angle: i16) -> Result<(), ReflexError>;

    /// Set the camera tilt servo, clamped to its mechanical range.
    fn set_camera_tilt(&mut self, angle: i16) -> Result<(), ReflexError>;

    /// Current `(pan, tilt)` in degrees.
    fn camera_angles(&self) -> (i16, i16);

    fn play_sound(&mut self, sound: Sound) -> Result<(), ReflexError>;

    fn speak(&mut self, text: &str) -> Result<(), ReflexError>;

    /// One-line human readable status.
    fn summary(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal actuator that only tracks speed.
    struct MockActuator {
        state: RobotState,
    }

    impl Actuator for MockActuator {
        fn id(&self) -> &str {
            "mock"
        }
        fn initialize(&mut self) -> Result<(), ReflexError> {
            Ok(())
        }
        fn shutdown(&mut self) {
            self.state = RobotState::default();
        }
        fn move_forward(&mut self, speed: Option<u8>, _: Option<Duration>) -> Result<(), ReflexError> {
            self.state.speed = speed.unwrap_or(30);
            Ok(())
        }
        fn move_backward(&mut self, speed: Option<u8>, _: Option<Duration>) -> Result<(), ReflexError> {
            self.state.speed = speed.unwrap_or(30);
            Ok(())
        }
        fn turn_left(&mut self, _: Option<i16>, _: Option<Duration>) -> Result<(), ReflexError> {
            Ok(())
        }
        fn turn_right(&mut self, _: Option<i16>, _: Option<Duration>) -> Result<(), ReflexError> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), ReflexError> {
            self.state.speed = 0;
            Ok(())
        }
        fn distance_cm(&mut self) -> Result<f64, ReflexError> {
            Ok(100.0)
        }
        fn state(&self) -> RobotState {
            self.state.clone()
        }
        fn track_object(&mut self, _: i32, _: i32) -> Result<(), ReflexError> {
            Ok(())
        }
        fn scan_environment(&mut self) -> Result<(), ReflexError> {
            Ok(())
        }
        fn avoid_obstacle(&mut self) -> Result<(), ReflexError> {
            Ok(())
        }
        fn set_camera_pan(&mut self, _: i16) -> Result<(), ReflexError> {
            Ok(())
        }
        fn set_camera_tilt(&mut self, _: i16) -> Result<(), ReflexError> {
            Ok(())
        }
        fn camera_angles(&self) -> (i16, i16) {
            (0, 0)
        }
        fn play_sound(&mut self, _: Sound) -> Result<(), ReflexError> {
            Ok(())
        }
        fn speak(&mut self, _: &str) -> Result<(), ReflexError> {
            Ok(())
        }
        fn summary(&self) -> String {
            format!("speed {}", self.state.speed)
        }
    }

    #[test]
    fn trait_object_moves_and_stops() {
        let mut act: Box<dyn Actuator> = Box::new(MockActuator {
            state: RobotState::default(),
        });
        act.move_forward(Some(40), None).unwrap();
        assert!(act.state().is_moving());
        act.stop().unwrap();
        assert!(!act.state().is_moving());
        assert_eq!(act.summary(), "speed 0");
    }
}
