//! Closed action vocabulary shared by decision engines and the executor.
//!
//! Tokens are decoded from strings only at the edges (rule tables typed in
//! by hand, reasoner replies, the CLI). Internally everything is an
//! [`ActionToken`] so the executor's dispatch is checked for exhaustiveness.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ReflexError;

/// A single side-effecting step the executor knows how to perform.
///
/// Wire form is snake_case; [`ActionToken::Speak`] carries its utterance
/// after a `:` delimiter (`speak:hello there`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionToken {
    Stop,
    MoveForward,
    MoveForwardSlow,
    MoveBackward,
    TurnLeft,
    TurnRight,
    TurnRandom,
    TrackFace,
    TrackColor,
    ScanEnvironment,
    AvoidObstacle,
    TakePhoto,
    PlaySound,
    Speak(String),
    ParseCommand,
    ExecuteCommand,
}

impl ActionToken {
    /// Every token name with a one-line description, in the order presented
    /// to an external reasoner.
    pub const VOCABULARY: &'static [(&'static str, &'static str)] = &[
        ("stop", "stop the robot"),
        ("move_forward", "drive forward"),
        ("move_forward_slow", "drive forward slowly"),
        ("move_backward", "drive backward"),
        ("turn_left", "steer left"),
        ("turn_right", "steer right"),
        ("turn_random", "steer briefly in a random direction"),
        ("track_face", "follow a detected face with the camera"),
        ("track_color", "follow a detected color blob with the camera"),
        ("scan_environment", "sweep the camera across the surroundings"),
        ("avoid_obstacle", "back off and steer around an obstacle"),
        ("take_photo", "save a screenshot"),
        ("speak:<text>", "say <text> out loud"),
        ("play_sound", "play a short beep"),
        ("parse_command", "recognise the current voice command"),
        ("execute_command", "carry out the current voice command"),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActionToken::Stop => "stop",
            ActionToken::MoveForward => "move_forward",
            ActionToken::MoveForwardSlow => "move_forward_slow",
            ActionToken::MoveBackward => "move_backward",
            ActionToken::TurnLeft => "turn_left",
            ActionToken::TurnRight => "turn_right",
            ActionToken::TurnRandom => "turn_random",
            ActionToken::TrackFace => "track_face",
            ActionToken::TrackColor => "track_color",
            ActionToken::ScanEnvironment => "scan_environment",
            ActionToken::AvoidObstacle => "avoid_obstacle",
            ActionToken::TakePhoto => "take_photo",
            ActionToken::PlaySound => "play_sound",
            ActionToken::Speak(_) => "speak",
            ActionToken::ParseCommand => "parse_command",
            ActionToken::ExecuteCommand => "execute_command",
        }
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionToken::Speak(text) => write!(f, "speak:{text}"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ActionToken {
    type Err = ReflexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((head, payload)) = s.split_once(':') {
            return match head {
                "speak" => Ok(ActionToken::Speak(payload.to_string())),
                _ => Err(ReflexError::UnknownAction(s.to_string())),
            };
        }
        let token = match s {
            "stop" => ActionToken::Stop,
            "move_forward" => ActionToken::MoveForward,
            "move_forward_slow" => ActionToken::MoveForwardSlow,
            "move_backward" => ActionToken::MoveBackward,
            "turn_left" => ActionToken::TurnLeft,
            "turn_right" => ActionToken::TurnRight,
            "turn_random" => ActionToken::TurnRandom,
            "track_face" => ActionToken::TrackFace,
            "track_color" => ActionToken::TrackColor,
            "scan_environment" => ActionToken::ScanEnvironment,
            "avoid_obstacle" => ActionToken::AvoidObstacle,
            "take_photo" => ActionToken::TakePhoto,
            "play_sound" => ActionToken::PlaySound,
            "parse_command" => ActionToken::ParseCommand,
            "execute_command" => ActionToken::ExecuteCommand,
            other => return Err(ReflexError::UnknownAction(other.to_string())),
        };
        Ok(token)
    }
}

impl TryFrom<String> for ActionToken {
    type Error = ReflexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActionToken> for String {
    fn from(token: ActionToken) -> Self {
        token.to_string()
    }
}

/// Canonical voice commands recognised from a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    FollowMe,
    Explore,
    TrackRed,
    TrackBlue,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    TakePhoto,
    Status,
}

impl VoiceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            VoiceCommand::Forward => "forward",
            VoiceCommand::Backward => "backward",
            VoiceCommand::Left => "left",
            VoiceCommand::Right => "right",
            VoiceCommand::Stop => "stop",
            VoiceCommand::FollowMe => "follow_me",
            VoiceCommand::Explore => "explore",
            VoiceCommand::TrackRed => "track_red",
            VoiceCommand::TrackBlue => "track_blue",
            VoiceCommand::LookUp => "look_up",
            VoiceCommand::LookDown => "look_down",
            VoiceCommand::LookLeft => "look_left",
            VoiceCommand::LookRight => "look_right",
            VoiceCommand::TakePhoto => "take_photo",
            VoiceCommand::Status => "status",
        }
    }
}

impl fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Short canned sounds an actuator can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
    Beep,
    Alert,
    Success,
    Error,
}

impl Sound {
    /// MIDI note and duration in seconds.
    pub fn note(&self) -> (u8, f32) {
        match self {
            Sound::Beep => (60, 0.1),
            Sound::Alert => (80, 0.2),
            Sound::Success => (72, 0.15),
            Sound::Error => (48, 0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_vocabulary_entry() {
        for (name, _) in ActionToken::VOCABULARY {
            let wire = name.replace("<text>", "hi");
            let token: ActionToken = wire.parse().unwrap();
            assert_eq!(token.to_string(), wire);
        }
    }

    #[test]
    fn speak_keeps_payload_after_first_colon() {
        let token: ActionToken = "speak:time is 10:30".parse().unwrap();
        assert_eq!(token, ActionToken::Speak("time is 10:30".into()));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        assert!(matches!(
            "fly".parse::<ActionToken>(),
            Err(ReflexError::UnknownAction(t)) if t == "fly"
        ));
        assert!("dance:salsa".parse::<ActionToken>().is_err());
    }

    #[test]
    fn token_serde_uses_wire_string() {
        let json = serde_json::to_string(&vec![ActionToken::Stop, ActionToken::Speak("ok".into())])
            .unwrap();
        assert_eq!(json, r#"["stop","speak:ok"]"#);
        let back: Vec<ActionToken> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[1], ActionToken::Speak("ok".into()));
    }
}
