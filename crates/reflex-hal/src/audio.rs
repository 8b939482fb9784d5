//! Audio collaborator: continuous speech capture on a background thread.
//!
//! A [`Transcriber`] turns microphone audio into text one utterance at a
//! time. [`AudioListener`] drives it from a dedicated thread and publishes
//! every utterance into a [`TranscriptionSlot`]; the control loop polls the
//! slot once per cycle through the [`Audio`] trait. The slot and two
//! `AtomicBool` flags are the only state shared between the threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use reflex_types::ReflexError;
use tracing::{debug, error, info, warn};

/// How long the listener waits for one utterance before re-checking its
/// flags.
const DEFAULT_POLL: Duration = Duration::from_millis(500);

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Speech-to-text engine used by the listener thread.
pub trait Transcriber: Send + 'static {
    /// Load models and open the input stream.
    fn open(&mut self) -> Result<(), ReflexError>;

    /// Block for up to `timeout` and return the next complete utterance, or
    /// `None` if nothing was recognised in that window.
    fn next_utterance(&mut self, timeout: Duration) -> Result<Option<String>, ReflexError>;

    /// Release the input stream.
    fn close(&mut self) {}
}

/// The audio collaborator as seen by the control loop.
pub trait Audio: Send {
    /// Bring the audio pipeline up without listening yet.
    fn start(&mut self) -> Result<(), ReflexError>;

    fn stop(&mut self);

    fn is_listening(&self) -> bool;

    fn start_listening(&mut self);

    fn stop_listening(&mut self);

    /// Consume the newest utterance not yet seen by the loop.
    fn take_transcription(&mut self) -> Option<String>;

    /// The most recent utterance, consumed or not.
    fn last_transcription(&self) -> Option<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// TranscriptionSlot
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SlotInner {
    pending: Option<String>,
    last: Option<String>,
}

/// Single-slot, last-write-wins cell shared between the listener thread and
/// the control loop.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl TranscriptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with `text`, dropping any unread utterance.
    pub fn publish(&self, text: impl Into<String>) {
        let text = text.into();
        let mut inner = self.inner.lock();
        inner.last = Some(text.clone());
        inner.pending = Some(text);
    }

    pub fn take(&self) -> Option<String> {
        self.inner.lock().pending.take()
    }

    pub fn last(&self) -> Option<String> {
        self.inner.lock().last.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.pending = None;
        inner.last = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AudioListener
// ─────────────────────────────────────────────────────────────────────────────

/// [`Audio`] implementation that runs a [`Transcriber`] on its own thread.
///
/// # Example
///
/// ```rust
/// use reflex_hal::audio::{Audio, AudioListener};
/// use reflex_hal::sim::ScriptedTranscriber;
///
/// let transcriber = ScriptedTranscriber::new();
/// let script = transcriber.handle();
/// let mut audio = AudioListener::new(transcriber);
///
/// audio.start().unwrap();
/// audio.start_listening();
/// script.push("go forward");
/// // The listener thread publishes the utterance shortly afterwards.
/// audio.stop();
/// ```
pub struct AudioListener<T: Transcriber> {
    transcriber: Option<T>,
    slot: TranscriptionSlot,
    running: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
    wake_words: Arc<Vec<String>>,
    poll: Duration,
    worker: Option<JoinHandle<T>>,
}

impl<T: Transcriber> AudioListener<T> {
    pub fn new(transcriber: T) -> Self {
        Self {
            transcriber: Some(transcriber),
            slot: TranscriptionSlot::new(),
            running: Arc::new(AtomicBool::new(false)),
            listening: Arc::new(AtomicBool::new(false)),
            wake_words: Arc::new(Vec::new()),
            poll: DEFAULT_POLL,
            worker: None,
        }
    }

    /// Phrases that are logged as wake words when heard.
    pub fn with_wake_words(mut self, words: Vec<String>) -> Self {
        self.wake_words = Arc::new(words.into_iter().map(|w| w.to_lowercase()).collect());
        self
    }

    /// Upper bound on how long the worker blocks in one transcriber call.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// A clone of the slot the worker publishes into.
    pub fn slot(&self) -> TranscriptionSlot {
        self.slot.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn spawn_worker(&mut self, mut transcriber: T) -> Result<(), ReflexError> {
        let running = Arc::clone(&self.running);
        let listening = Arc::clone(&self.listening);
        let wake_words = Arc::clone(&self.wake_words);
        let slot = self.slot.clone();
        let poll = self.poll;

        let handle = thread::Builder::new()
            .name("reflex-audio".to_string())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    if !listening.load(Ordering::Acquire) {
                        thread::sleep(poll.min(Duration::from_millis(100)));
                        continue;
                    }
                    match transcriber.next_utterance(poll) {
                        Ok(Some(text)) => {
                            let text = text.trim().to_string();
                            if text.is_empty() {
                                continue;
                            }
                            info!(transcription = %text, "utterance recognised");
                            let lower = text.to_lowercase();
                            if let Some(word) = wake_words.iter().find(|w| lower.contains(w.as_str())) {
                                info!(wake_word = %word, "wake word detected");
                            }
                            slot.publish(text);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "transcriber failed; retrying");
                            thread::sleep(poll);
                        }
                    }
                }
                transcriber.close();
                debug!("audio listener thread exiting");
                transcriber
            })
            .map_err(|e| ReflexError::init("audio", format!("failed to spawn listener: {e}")))?;

        self.worker = Some(handle);
        Ok(())
    }
}

impl<T: Transcriber> Audio for AudioListener<T> {
    fn start(&mut self) -> Result<(), ReflexError> {
        if self.is_running() {
            return Ok(());
        }
        let mut transcriber = self
            .transcriber
            .take()
            .ok_or_else(|| ReflexError::init("audio", "transcriber unavailable"))?;
        if let Err(e) = transcriber.open() {
            self.transcriber = Some(transcriber);
            return Err(e);
        }
        self.running.store(true, Ordering::Release);
        if let Err(e) = self.spawn_worker(transcriber) {
            self.running.store(false, Ordering::Release);
            return Err(e);
        }
        info!("audio listener started");
        Ok(())
    }

    fn stop(&mut self) {
        self.listening.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(transcriber) => self.transcriber = Some(transcriber),
                Err(_) => error!("audio listener thread panicked"),
            }
            info!("audio listener stopped");
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    fn start_listening(&mut self) {
        if !self.is_running() {
            warn!("start_listening called before the audio listener was started");
            return;
        }
        self.listening.store(true, Ordering::Release);
        info!("listening for voice commands");
    }

    fn stop_listening(&mut self) {
        self.listening.store(false, Ordering::Release);
        info!("stopped listening for voice commands");
    }

    fn take_transcription(&mut self) -> Option<String> {
        self.slot.take()
    }

    fn last_transcription(&self) -> Option<String> {
        self.slot.last()
    }
}

impl<T: Transcriber> Drop for AudioListener<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
