//! [`ActionExecutor`] – turns decided [`ActionToken`]s into collaborator
//! calls.
//!
//! The `match` over [`ActionToken`] is exhaustive, so adding a token to the
//! vocabulary does not compile until it is executed somewhere. Voice tokens
//! consult the [`VoiceLexicon`] against the cycle's utterance. Mode changes
//! requested by a voice command are returned to the loop as
//! [`ActionOutcome::ModeChange`] instead of being applied here.

use std::time::Duration;

use rand::Rng;
use reflex_hal::{Actuator, Vision};
use reflex_types::{ActionToken, DetectionKind, LoopMode, ReflexError, Sound, VoiceCommand};
use tracing::{debug, info};

use crate::voice::VoiceLexicon;

const TURN_RANDOM_DURATION: Duration = Duration::from_millis(500);
const VOICE_MOVE_DURATION: Duration = Duration::from_secs(1);
const VOICE_TURN_DURATION: Duration = Duration::from_millis(500);

/// What executing one token did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    /// Nothing to act on (no face in frame, no recognised command, …).
    Skipped,
    ModeChange(LoopMode),
}

/// Per-cycle inputs some tokens need.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    pub utterance: Option<&'a str>,
    pub mode: LoopMode,
}

/// The collaborators an action can drive.
pub struct Effectors<'a> {
    pub actuator: &'a mut dyn Actuator,
    pub vision: &'a mut dyn Vision,
}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    slow_speed: u8,
    camera_step: i16,
    lexicon: VoiceLexicon,
}

impl ActionExecutor {
    pub fn new(slow_speed: u8, camera_step: i16, lexicon: VoiceLexicon) -> Self {
        Self {
            slow_speed,
            camera_step,
            lexicon,
        }
    }

    pub fn lexicon(&self) -> &VoiceLexicon {
        &self.lexicon
    }

    pub fn execute(
        &self,
        token: &ActionToken,
        fx: &mut Effectors<'_>,
        input: CycleInput<'_>,
    ) -> Result<ActionOutcome, ReflexError> {
        debug!(action = %token, "executing");
        match token {
            ActionToken::Stop => fx.actuator.stop()?,
            ActionToken::MoveForward => fx.actuator.move_forward(None, None)?,
            ActionToken::MoveForwardSlow => fx.actuator.move_forward(Some(self.slow_speed), None)?,
            ActionToken::MoveBackward => fx.actuator.move_backward(None, None)?,
            ActionToken::TurnLeft => fx.actuator.turn_left(None, None)?,
            ActionToken::TurnRight => fx.actuator.turn_right(None, None)?,
            ActionToken::TurnRandom => {
                if rand::thread_rng().gen_bool(0.5) {
                    fx.actuator.turn_left(None, Some(TURN_RANDOM_DURATION))?;
                } else {
                    fx.actuator.turn_right(None, Some(TURN_RANDOM_DURATION))?;
                }
            }
            ActionToken::TrackFace => return track(fx, DetectionKind::Face),
            ActionToken::TrackColor => return track(fx, DetectionKind::Color),
            ActionToken::ScanEnvironment => fx.actuator.scan_environment()?,
            ActionToken::AvoidObstacle => fx.actuator.avoid_obstacle()?,
            ActionToken::TakePhoto => {
                let path = fx.vision.take_screenshot()?;
                info!(path = %path.display(), "photo taken");
            }
            ActionToken::PlaySound => fx.actuator.play_sound(Sound::Beep)?,
            ActionToken::Speak(text) => fx.actuator.speak(text)?,
            ActionToken::ParseCommand => {
                return Ok(match self.recognise(input.utterance) {
                    Some(command) => {
                        info!(command = %command, "voice command recognised");
                        ActionOutcome::Done
                    }
                    None => ActionOutcome::Skipped,
                });
            }
            ActionToken::ExecuteCommand => {
                return match self.recognise(input.utterance) {
                    Some(command) => self.run_command(command, fx, input),
                    None => Ok(ActionOutcome::Skipped),
                };
            }
        }
        Ok(ActionOutcome::Done)
    }

    fn recognise(&self, utterance: Option<&str>) -> Option<VoiceCommand> {
        let text = utterance?;
        let command = self.lexicon.parse(text);
        if command.is_none() {
            debug!(utterance = text, "no voice command recognised");
        }
        command
    }

    /// Carry out a recognised voice command.
    pub fn run_command(
        &self,
        command: VoiceCommand,
        fx: &mut Effectors<'_>,
        input: CycleInput<'_>,
    ) -> Result<ActionOutcome, ReflexError> {
        info!(command = %command, "executing voice command");
        let step = self.camera_step;
        match command {
            VoiceCommand::Forward => fx.actuator.move_forward(None, Some(VOICE_MOVE_DURATION))?,
            VoiceCommand::Backward => fx.actuator.move_backward(None, Some(VOICE_MOVE_DURATION))?,
            VoiceCommand::Left => {
                fx.actuator.turn_left(None, None)?;
                fx.actuator.move_forward(None, Some(VOICE_TURN_DURATION))?;
            }
            VoiceCommand::Right => {
                fx.actuator.turn_right(None, None)?;
                fx.actuator.move_forward(None, Some(VOICE_TURN_DURATION))?;
            }
            VoiceCommand::Stop => fx.actuator.stop()?,
            VoiceCommand::FollowMe => return change_mode(fx, LoopMode::Tracking),
            VoiceCommand::Explore => return change_mode(fx, LoopMode::Exploration),
            VoiceCommand::TrackRed => fx.vision.set_color_detection("red")?,
            VoiceCommand::TrackBlue => fx.vision.set_color_detection("blue")?,
            VoiceCommand::LookUp => {
                let (_, tilt) = fx.actuator.camera_angles();
                fx.actuator.set_camera_tilt(tilt.saturating_add(step))?;
            }
            VoiceCommand::LookDown => {
                let (_, tilt) = fx.actuator.camera_angles();
                fx.actuator.set_camera_tilt(tilt.saturating_sub(step))?;
            }
            VoiceCommand::LookLeft => {
                let (pan, _) = fx.actuator.camera_angles();
                fx.actuator.set_camera_pan(pan.saturating_sub(step))?;
            }
            VoiceCommand::LookRight => {
                let (pan, _) = fx.actuator.camera_angles();
                fx.actuator.set_camera_pan(pan.saturating_add(step))?;
            }
            VoiceCommand::TakePhoto => {
                let path = fx.vision.take_screenshot()?;
                info!(path = %path.display(), "photo taken");
            }
            VoiceCommand::Status => {
                let status = format!(
                    "Mode {}. {}. {}",
                    input.mode,
                    fx.vision.summary(),
                    fx.actuator.summary()
                );
                info!(%status, "status report");
                fx.actuator.speak(&status)?;
            }
        }
        Ok(ActionOutcome::Done)
    }
}

fn track(fx: &mut Effectors<'_>, kind: DetectionKind) -> Result<ActionOutcome, ReflexError> {
    match fx.vision.object_center(kind) {
        Some((x, y)) => {
            fx.actuator.track_object(x, y)?;
            Ok(ActionOutcome::Done)
        }
        None => {
            debug!(?kind, "nothing to track");
            Ok(ActionOutcome::Skipped)
        }
    }
}

fn change_mode(fx: &mut Effectors<'_>, mode: LoopMode) -> Result<ActionOutcome, ReflexError> {
    fx.actuator.play_sound(Sound::Success)?;
    Ok(ActionOutcome::ModeChange(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_hal::sim::{
        ActuatorCommand, SimActuator, SimActuatorHandle, SimRobotConfig, SimVision,
        SimVisionConfig, SimVisionHandle,
    };
    use reflex_types::{Detection, VisionSnapshot};

    struct Rig {
        actuator: SimActuator,
        vision: SimVision,
        act_log: SimActuatorHandle,
        cam: SimVisionHandle,
        exec: ActionExecutor,
    }

    impl Rig {
        fn new() -> Self {
            let mut actuator = SimActuator::new(SimRobotConfig::default());
            let mut vision = SimVision::new(SimVisionConfig::default());
            actuator.initialize().unwrap();
            vision.start().unwrap();
            let act_log = actuator.handle();
            act_log.clear_commands();
            let cam = vision.handle();
            Self {
                actuator,
                vision,
                act_log,
                cam,
                exec: ActionExecutor::new(15, 10, VoiceLexicon::default()),
            }
        }

        fn run(&mut self, token: ActionToken, utterance: Option<&str>) -> ActionOutcome {
            let mut fx = Effectors {
                actuator: &mut self.actuator,
                vision: &mut self.vision,
            };
            let input = CycleInput {
                utterance,
                mode: LoopMode::Autonomous,
            };
            self.exec.execute(&token, &mut fx, input).unwrap()
        }
    }

    #[test]
    fn slow_forward_uses_slow_speed() {
        let mut rig = Rig::new();
        assert_eq!(rig.run(ActionToken::MoveForwardSlow, None), ActionOutcome::Done);
        assert_eq!(
            rig.act_log.commands(),
            vec![ActuatorCommand::MoveForward {
                speed: 15,
                duration: None
            }]
        );
    }

    #[test]
    fn turn_random_is_a_timed_turn() {
        let mut rig = Rig::new();
        rig.run(ActionToken::TurnRandom, None);
        match rig.act_log.commands().as_slice() {
            [ActuatorCommand::TurnLeft { duration, .. }]
            | [ActuatorCommand::TurnRight { duration, .. }] => {
                assert_eq!(*duration, Some(Duration::from_millis(500)));
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn track_face_follows_last_frame() {
        let mut rig = Rig::new();
        rig.cam.push_frame(VisionSnapshot {
            faces: vec![Detection::new(400, 200, 30, 30)],
            ..Default::default()
        });
        rig.vision.capture_frame().unwrap();
        assert_eq!(rig.run(ActionToken::TrackFace, None), ActionOutcome::Done);
        assert_eq!(
            rig.act_log.commands(),
            vec![ActuatorCommand::TrackObject { x: 400, y: 200 }]
        );
        assert_eq!(rig.run(ActionToken::TrackColor, None), ActionOutcome::Skipped);
    }

    #[test]
    fn speak_and_sound() {
        let mut rig = Rig::new();
        rig.run(ActionToken::Speak("hello there".into()), None);
        rig.run(ActionToken::PlaySound, None);
        assert_eq!(
            rig.act_log.commands(),
            vec![
                ActuatorCommand::Speak("hello there".into()),
                ActuatorCommand::PlaySound(Sound::Beep)
            ]
        );
    }

    #[test]
    fn parse_command_only_recognises() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.run(ActionToken::ParseCommand, Some("go forward")),
            ActionOutcome::Done
        );
        assert!(rig.act_log.commands().is_empty());
        assert_eq!(rig.run(ActionToken::ParseCommand, None), ActionOutcome::Skipped);
    }

    #[test]
    fn execute_forward_moves_for_one_second() {
        let mut rig = Rig::new();
        rig.run(ActionToken::ExecuteCommand, Some("go forward"));
        assert_eq!(
            rig.act_log.commands(),
            vec![ActuatorCommand::MoveForward {
                speed: 30,
                duration: Some(Duration::from_secs(1))
            }]
        );
    }

    #[test]
    fn execute_left_turns_then_moves() {
        let mut rig = Rig::new();
        rig.run(ActionToken::ExecuteCommand, Some("turn left"));
        let cmds = rig.act_log.commands();
        assert!(matches!(cmds[0], ActuatorCommand::TurnLeft { duration: None, .. }));
        assert_eq!(
            cmds[1],
            ActuatorCommand::MoveForward {
                speed: 30,
                duration: Some(Duration::from_millis(500))
            }
        );
    }

    #[test]
    fn follow_me_requests_tracking_mode() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.run(ActionToken::ExecuteCommand, Some("follow me please")),
            ActionOutcome::ModeChange(LoopMode::Tracking)
        );
        assert_eq!(
            rig.act_log.commands(),
            vec![ActuatorCommand::PlaySound(Sound::Success)]
        );
        assert_eq!(
            rig.run(ActionToken::ExecuteCommand, Some("explore")),
            ActionOutcome::ModeChange(LoopMode::Exploration)
        );
    }

    #[test]
    fn look_commands_step_the_camera() {
        let mut rig = Rig::new();
        rig.run(ActionToken::ExecuteCommand, Some("look up"));
        rig.run(ActionToken::ExecuteCommand, Some("look right"));
        assert_eq!(rig.act_log.camera_angles(), (10, 0));
        rig.run(ActionToken::ExecuteCommand, Some("look left"));
        rig.run(ActionToken::ExecuteCommand, Some("look left"));
        assert_eq!(rig.act_log.camera_angles(), (-10, 0));
    }

    #[test]
    fn track_colour_commands_switch_detection() {
        let mut rig = Rig::new();
        rig.run(ActionToken::ExecuteCommand, Some("track blue"));
        assert_eq!(rig.cam.color_target().as_deref(), Some("blue"));
    }

    #[test]
    fn status_is_spoken() {
        let mut rig = Rig::new();
        rig.run(ActionToken::ExecuteCommand, Some("status report"));
        match rig.act_log.commands().as_slice() {
            [ActuatorCommand::Speak(text)] => {
                assert!(text.starts_with("Mode autonomous. no objects detected."));
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn take_photo_records_a_screenshot() {
        let mut rig = Rig::new();
        rig.run(ActionToken::TakePhoto, None);
        assert_eq!(rig.cam.screenshots().len(), 1);
    }

    #[test]
    fn unrecognised_command_is_skipped() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.run(ActionToken::ExecuteCommand, Some("sing a song")),
            ActionOutcome::Skipped
        );
        assert!(rig.act_log.commands().is_empty());
    }
}
