//! Typed "voice" input: every line read from a terminal is treated as one
//! recognised utterance.

use std::io::{BufRead, BufReader};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use reflex_hal::Transcriber;
use reflex_types::ReflexError;
use tracing::debug;

/// [`Transcriber`] fed by lines of text.
pub struct LineTranscriber<R> {
    source: Option<R>,
    lines: Option<Receiver<String>>,
}

impl LineTranscriber<BufReader<std::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> LineTranscriber<R> {
    pub fn new(source: R) -> Self {
        Self {
            source: Some(source),
            lines: None,
        }
    }
}

impl<R: BufRead + Send + 'static> Transcriber for LineTranscriber<R> {
    fn open(&mut self) -> Result<(), ReflexError> {
        let Some(source) = self.source.take() else {
            return Ok(());
        };
        let (tx, rx) = mpsc::channel();
        // Blocking reads cannot be interrupted, so this reader is detached.
        thread::Builder::new()
            .name("reflex-stdin".to_string())
            .spawn(move || {
                for line in source.lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("typed voice input closed");
            })
            .map_err(|e| ReflexError::init("typed_voice", format!("failed to spawn reader: {e}")))?;
        self.lines = Some(rx);
        Ok(())
    }

    fn next_utterance(&mut self, timeout: Duration) -> Result<Option<String>, ReflexError> {
        let Some(lines) = &self.lines else {
            thread::sleep(timeout);
            return Ok(None);
        };
        match lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.lines = None;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn lines_become_utterances_then_input_ends() {
        let mut t = LineTranscriber::new(Cursor::new("go forward\nstop\n"));
        t.open().unwrap();
        let wait = Duration::from_secs(1);
        assert_eq!(t.next_utterance(wait).unwrap().as_deref(), Some("go forward"));
        assert_eq!(t.next_utterance(wait).unwrap().as_deref(), Some("stop"));
        assert_eq!(t.next_utterance(wait).unwrap(), None);
        assert_eq!(t.next_utterance(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn unopened_transcriber_hears_nothing() {
        let mut t = LineTranscriber::new(Cursor::new("hello\n"));
        assert_eq!(t.next_utterance(Duration::from_millis(1)).unwrap(), None);
    }
}
