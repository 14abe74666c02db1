#[cfg(feature = "sound")]
pub mod chime;

use std::sync::mpsc::Sender;
#[cfg(feature = "sound")]
use std::{
    sync::{mpsc, Arc, Mutex},
    thread,
};

/// Audible markers for the three pipeline events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    Complete,
    Error,
}

/// Plays cues on a dedicated thread that owns the (non-`Send`) audio output.
///
/// The thread is spawned lazily on the first cue. When audio cannot be
/// opened, cues are dropped with a warning and the pipeline carries on.
#[derive(Clone)]
pub struct FeedbackHandle {
    enabled: bool,
    #[cfg(feature = "sound")]
    tx: Arc<Mutex<Option<Sender<Cue>>>>,
}

impl FeedbackHandle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            #[cfg(feature = "sound")]
            tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn cue(&self, cue: Cue) {
        if !self.enabled {
            log::trace!("cue {cue:?} skipped (sound disabled)");
            return;
        }

        match self.ensure_thread() {
            Ok(tx) => {
                if tx.send(cue).is_err() {
                    log::warn!("audio thread gone; cue {cue:?} dropped");
                }
            }
            Err(e) => log::warn!("cannot play cue {cue:?}: {e}"),
        }
    }

    #[cfg(feature = "sound")]
    fn ensure_thread(&self) -> Result<Sender<Cue>, String> {
        use rodio::{OutputStream, Sink};

        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Cue>();

        thread::Builder::new()
            .name("avr-feedback".to_string())
            .spawn(move || {
                let (_stream, sink) = match OutputStream::try_default()
                    .map_err(|e| format!("Failed to create audio output stream: {}", e))
                    .and_then(|(stream, handle)| {
                        Sink::try_new(&handle)
                            .map(|sink| (stream, sink))
                            .map_err(|e| format!("Failed to create audio sink: {}", e))
                    }) {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("{e}; audible cues disabled");
                        // Keep receiving so later cues are discarded quietly.
                        while rx.recv().is_ok() {}
                        return;
                    }
                };

                while let Ok(cue) = rx.recv() {
                    for chime in tones(cue) {
                        sink.append(chime);
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    #[cfg(not(feature = "sound"))]
    fn ensure_thread(&self) -> Result<Sender<Cue>, String> {
        Err("built without the `sound` feature".to_string())
    }
}

#[cfg(feature = "sound")]
fn tones(cue: Cue) -> Vec<chime::Chime> {
    use std::time::Duration;

    match cue {
        Cue::Start => vec![chime::Chime::new(880.0, Duration::from_millis(120))],
        Cue::Complete => vec![
            chime::Chime::new(660.0, Duration::from_millis(110)),
            chime::Chime::new(990.0, Duration::from_millis(180)),
        ],
        Cue::Error => vec![chime::Chime::new(196.0, Duration::from_millis(350))],
    }
}
