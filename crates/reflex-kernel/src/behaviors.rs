//! The stock behaviour table loaded by
//! [`RuleEngine::with_default_rules`][crate::rule_engine::RuleEngine::with_default_rules].

use reflex_types::ActionToken;

use crate::rule_engine::{Predicate, Rule};

/// Rule names in the default table.
pub const AVOID_OBSTACLE: &str = "avoid_obstacle";
pub const VOICE_COMMAND: &str = "voice_command";
pub const FOLLOW_FACE: &str = "follow_face";
pub const APPROACH_COLOR: &str = "approach_color";
pub const EXPLORE: &str = "explore";

/// Default behaviours, highest priority first.
///
/// | Rule | Priority | When | Then |
/// |---|---|---|---|
/// | `avoid_obstacle` | 1.0 | `obstacle_distance < 20` | stop, turn_random, move_forward |
/// | `voice_command` | 0.95 | `voice_detected` | parse_command, execute_command |
/// | `follow_face` | 0.9 | `face_detected` | track_face, move_forward_slow |
/// | `approach_color` | 0.8 | `color_detected`, `color_size > 100` | track_color, move_forward |
/// | `explore` | 0.3 | `idle_time > 5` | scan_environment, move_forward, turn_random |
///
/// `obstacle_distance < 20` also holds for non-positive "no echo" readings.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(AVOID_OBSTACLE, 1.0)
            .when("obstacle_distance", Predicate::lt(20.0))
            .then(ActionToken::Stop)
            .then(ActionToken::TurnRandom)
            .then(ActionToken::MoveForward),
        Rule::new(VOICE_COMMAND, 0.95)
            .when("voice_detected", Predicate::equals(true))
            .then(ActionToken::ParseCommand)
            .then(ActionToken::ExecuteCommand),
        Rule::new(FOLLOW_FACE, 0.9)
            .when("face_detected", Predicate::equals(true))
            .then(ActionToken::TrackFace)
            .then(ActionToken::MoveForwardSlow),
        Rule::new(APPROACH_COLOR, 0.8)
            .when("color_detected", Predicate::equals(true))
            .when("color_size", Predicate::gt(100.0))
            .then(ActionToken::TrackColor)
            .then(ActionToken::MoveForward),
        Rule::new(EXPLORE, 0.3)
            .when("idle_time", Predicate::gt(5.0))
            .then(ActionToken::ScanEnvironment)
            .then(ActionToken::MoveForward)
            .then(ActionToken::TurnRandom),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_engine::RuleEngine;
    use reflex_types::Context;

    /// A quiet cycle: nothing seen, nothing heard, clear floor.
    fn quiet() -> Context {
        Context::new()
            .with("face_detected", false)
            .with("color_detected", false)
            .with("color_size", 0.0)
            .with("voice_detected", false)
            .with("obstacle_distance", 80.0)
            .with("idle_time", 0.0)
    }

    #[test]
    fn table_is_sorted_and_unique() {
        let rules = default_rules();
        assert!(rules.windows(2).all(|w| w[0].priority >= w[1].priority));
        let mut names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn obstacle_beats_idle_exploration() {
        let engine = RuleEngine::with_default_rules();
        let ctx = quiet().with("obstacle_distance", 15.0).with("idle_time", 10.0);
        assert_eq!(
            engine.evaluate(&ctx),
            vec![ActionToken::Stop, ActionToken::TurnRandom, ActionToken::MoveForward]
        );
    }

    #[test]
    fn exploration_when_obstacle_rule_disabled() {
        let engine = RuleEngine::with_default_rules();
        assert!(engine.enable_rule(AVOID_OBSTACLE, false));
        let ctx = quiet().with("obstacle_distance", 15.0).with("idle_time", 10.0);
        assert_eq!(
            engine.evaluate(&ctx),
            vec![
                ActionToken::ScanEnvironment,
                ActionToken::MoveForward,
                ActionToken::TurnRandom
            ]
        );
    }

    #[test]
    fn small_color_blob_is_ignored() {
        let engine = RuleEngine::with_default_rules();
        let ctx = quiet().with("color_detected", true).with("color_size", 80.0);
        assert!(engine.evaluate(&ctx).is_empty());

        let ctx = quiet().with("color_detected", true).with("color_size", 400.0);
        assert_eq!(
            engine.evaluate(&ctx),
            vec![ActionToken::TrackColor, ActionToken::MoveForward]
        );
    }

    #[test]
    fn voice_outranks_face() {
        let engine = RuleEngine::with_default_rules();
        let ctx = quiet().with("voice_detected", true).with("face_detected", true);
        assert_eq!(
            engine.evaluate(&ctx),
            vec![ActionToken::ParseCommand, ActionToken::ExecuteCommand]
        );
    }

    #[test]
    fn quiet_cycle_does_nothing() {
        let engine = RuleEngine::with_default_rules();
        assert!(engine.evaluate(&quiet()).is_empty());
        assert_eq!(
            engine.active_rules(),
            [AVOID_OBSTACLE, VOICE_COMMAND, FOLLOW_FACE, APPROACH_COLOR, EXPLORE]
        );
    }
}
