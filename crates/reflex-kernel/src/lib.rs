//! `reflex-kernel` – Arbitration & Safety
//!
//! Decides what the robot does next and vetoes it when it is unsafe. It
//! never touches perception or timing; the control loop feeds it a
//! [`Context`][reflex_types::Context] and acts on what comes back.
//!
//! # Modules
//!
//! - [`decision`] – [`DecisionEngine`][decision::DecisionEngine]: the one
//!   contract every decision strategy satisfies, context in, ordered
//!   [`ActionToken`][reflex_types::ActionToken] list out.
//! - [`rule_engine`] – [`RuleEngine`][rule_engine::RuleEngine]: prioritized,
//!   enable-able condition→action rules with winner-take-all arbitration and
//!   copy-on-write runtime edits.
//! - [`behaviors`] – [`default_rules`][behaviors::default_rules]: the stock
//!   behaviour table (avoid obstacles, obey voice, follow faces, approach
//!   colours, explore when idle).
//! - [`safety`] – [`SafetyMonitor`][safety::SafetyMonitor]: emergency-stop
//!   distance check and continuous-movement watchdog, evaluated after every
//!   act phase.

pub mod behaviors;
pub mod decision;
pub mod rule_engine;
pub mod safety;

pub use behaviors::default_rules;
pub use decision::DecisionEngine;
pub use rule_engine::{Comparator, Explanation, Predicate, Rule, RuleEngine, RuleSetHandle};
pub use safety::{SafetyConfig, SafetyMonitor, SafetyVerdict, SafetyViolation};
