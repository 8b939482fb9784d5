//! `reflex-hal` – collaborator contracts for the control loop.
//!
//! The control loop never talks to hardware directly. It sees three narrow
//! traits and nothing else, so drivers can be swapped without touching the
//! decision or safety logic.
//!
//! # Modules
//!
//! - [`actuator`] – [`Actuator`][actuator::Actuator]: drive base, steering,
//!   camera servos, ultrasonic range finder, speaker.
//! - [`vision`] – [`Vision`][vision::Vision]: frame capture with detection
//!   lists, object centres, screenshots.
//! - [`audio`] – [`Audio`][audio::Audio] and the background
//!   [`AudioListener`][audio::AudioListener] that publishes transcriptions
//!   produced by a [`Transcriber`][audio::Transcriber] into a single-slot
//!   [`TranscriptionSlot`][audio::TranscriptionSlot].
//! - [`sim`] – in-process stand-ins for every collaborator that record the
//!   commands they receive, for headless runs and tests.

pub mod actuator;
pub mod audio;
pub mod sim;
pub mod vision;

pub use actuator::Actuator;
pub use audio::{Audio, AudioListener, Transcriber, TranscriptionSlot};
pub use vision::Vision;
