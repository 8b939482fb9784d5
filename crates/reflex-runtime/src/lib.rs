//! `reflex-runtime` – The Control Loop
//!
//! Owns the collaborators and drives the perceive → decide → act → evaluate
//! cycle at a fixed frequency.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: the
//!   cycle itself, its [`LoopConfig`][control_loop::LoopConfig], per-phase
//!   [`PhaseError`][control_loop::PhaseError]s and a cooperative
//!   [`StopHandle`][control_loop::StopHandle].
//! - [`executor`] – [`ActionExecutor`][executor::ActionExecutor]: maps each
//!   decided [`ActionToken`][reflex_types::ActionToken] onto actuator and
//!   vision calls, including voice-command dispatch.
//! - [`voice`] – [`VoiceLexicon`][voice::VoiceLexicon]: ordered keyword
//!   table from transcriptions to
//!   [`VoiceCommand`][reflex_types::VoiceCommand]s.
//! - [`reasoner`] – [`ReasonerEngine`][reasoner::ReasonerEngine]: a
//!   [`DecisionEngine`] that asks a remote language model (OpenAI, Anthropic
//!   or Ollama) for the next actions. The
//!   [`ReasonerReply`][reasoner::ReasonerReply] JSON Schema is sent via
//!   `response_format` to force typed output.
//! - [`signals`] – [`SignalRoute`][signals::SignalRoute]: routes Ctrl-C to
//!   whichever loop is currently running.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.
//!
//! The [`DecisionEngine`] seam is re-exported so callers can hand any engine
//! to [`ControlLoop::new`][control_loop::ControlLoop::new] without a direct
//! dependency on `reflex-kernel`.

pub mod control_loop;
pub mod executor;
pub mod reasoner;
pub mod signals;
pub mod telemetry;
pub mod voice;

pub use control_loop::{Collaborators, ControlLoop, LoopConfig, Phase, PhaseError, StopHandle};
pub use executor::{ActionExecutor, ActionOutcome};
pub use reasoner::{ReasonerConfig, ReasonerEngine, ReasonerProvider, ReasonerReply};
pub use signals::SignalRoute;
pub use telemetry::{LogFormat, LogSettings, TracerProviderGuard, init_tracing};
pub use voice::VoiceLexicon;

pub use reflex_kernel::DecisionEngine;
