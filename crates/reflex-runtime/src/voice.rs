//! [`VoiceLexicon`] – maps free-form transcriptions to [`VoiceCommand`]s.
//!
//! Matching is a case-insensitive substring search over an ordered keyword
//! table; the first command with a keyword contained in the utterance wins.
//! Camera `look_*` entries come before the bare `left`/`right` entries so
//! "look left" moves the camera rather than the chassis.

use reflex_types::VoiceCommand;

/// Ordered command → keyword table.
#[derive(Debug, Clone)]
pub struct VoiceLexicon {
    entries: Vec<(VoiceCommand, Vec<String>)>,
}

impl Default for VoiceLexicon {
    fn default() -> Self {
        let table: [(VoiceCommand, &[&str]); 15] = [
            (VoiceCommand::LookUp, &["look up", "mira arriba"]),
            (VoiceCommand::LookDown, &["look down", "mira abajo"]),
            (VoiceCommand::LookLeft, &["look left", "mira izquierda"]),
            (VoiceCommand::LookRight, &["look right", "mira derecha"]),
            (VoiceCommand::Forward, &["forward", "go forward", "move forward", "adelante"]),
            (VoiceCommand::Backward, &["backward", "go back", "move back", "atrás"]),
            (VoiceCommand::Left, &["left", "turn left", "go left", "izquierda"]),
            (VoiceCommand::Right, &["right", "turn right", "go right", "derecha"]),
            (VoiceCommand::Stop, &["stop", "halt", "freeze", "detente"]),
            (VoiceCommand::FollowMe, &["follow me", "follow", "sígueme"]),
            (VoiceCommand::Explore, &["explore", "look around", "explora"]),
            (VoiceCommand::TrackRed, &["track red", "find red", "busca rojo"]),
            (VoiceCommand::TrackBlue, &["track blue", "find blue", "busca azul"]),
            (VoiceCommand::TakePhoto, &["take photo", "take picture", "toma foto"]),
            (VoiceCommand::Status, &["status", "report", "estado"]),
        ];
        Self {
            entries: table
                .into_iter()
                .map(|(cmd, words)| (cmd, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }
}

impl VoiceLexicon {
    pub fn new(entries: Vec<(VoiceCommand, Vec<String>)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(cmd, words)| (cmd, words.into_iter().map(|w| w.to_lowercase()).collect()))
                .collect(),
        }
    }

    /// First command with a keyword contained in `utterance`.
    pub fn parse(&self, utterance: &str) -> Option<VoiceCommand> {
        let lower = utterance.to_lowercase();
        if lower.trim().is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(cmd, _)| *cmd)
    }

    pub fn keywords(&self, command: VoiceCommand) -> &[String] {
        self.entries
            .iter()
            .find(|(cmd, _)| *cmd == command)
            .map_or(&[][..], |(_, words)| words.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitive_substrings() {
        let lex = VoiceLexicon::default();
        assert_eq!(lex.parse("Please GO FORWARD now"), Some(VoiceCommand::Forward));
        assert_eq!(lex.parse("halt!"), Some(VoiceCommand::Stop));
        assert_eq!(lex.parse("can you follow me"), Some(VoiceCommand::FollowMe));
        assert_eq!(lex.parse("track blue things"), Some(VoiceCommand::TrackBlue));
    }

    #[test]
    fn camera_commands_win_over_turns() {
        let lex = VoiceLexicon::default();
        assert_eq!(lex.parse("look left"), Some(VoiceCommand::LookLeft));
        assert_eq!(lex.parse("look right"), Some(VoiceCommand::LookRight));
        assert_eq!(lex.parse("turn left"), Some(VoiceCommand::Left));
    }

    #[test]
    fn unknown_or_blank_is_none() {
        let lex = VoiceLexicon::default();
        assert_eq!(lex.parse("sing a song"), None);
        assert_eq!(lex.parse("   "), None);
    }

    #[test]
    fn custom_table_order_decides_ties() {
        let lex = VoiceLexicon::new(vec![
            (VoiceCommand::Status, vec!["GO".into()]),
            (VoiceCommand::Forward, vec!["go".into()]),
        ]);
        assert_eq!(lex.parse("go"), Some(VoiceCommand::Status));
        assert_eq!(lex.keywords(VoiceCommand::Status), ["go"]);
        assert!(lex.keywords(VoiceCommand::Explore).is_empty());
    }
}
