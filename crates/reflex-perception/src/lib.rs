//! `reflex-perception` – turns raw collaborator output into decision facts.
//!
//! The decision layer never sees detections, utterances or range readings
//! directly. Once per cycle they are flattened into a
//! [`Context`][reflex_types::Context] of named, typed facts that rules and
//! reasoners can test against.
//!
//! # Modules
//!
//! - [`context`] – [`ContextBuilder`][context::ContextBuilder]: builds the
//!   per-cycle fact table and tracks the one quantity that survives between
//!   cycles, the time since anything interesting was last seen.

pub mod context;

pub use context::{ContextBuilder, ContextConfig, facts};
