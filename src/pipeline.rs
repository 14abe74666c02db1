use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

use crate::capture::ScreenCapturer;
use crate::error::PipelineError;
use crate::feedback::{Cue, FeedbackHandle};
use crate::knowledge::KnowledgeWriter;
use crate::ocr::{ExtractedText, OcrEngine};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Upper bound for the capture and recognition stages of one run.
pub const PIPELINE_TIMEOUT_SECS: u64 = 60;

/// Source of the local wall-clock time stamped on each capture.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// One detected shortcut press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub seq: u64,
    pub captured_at: NaiveDateTime,
    pub text: ExtractedText,
    pub path: PathBuf,
}

/// Capture, recognize and append for a single trigger.
///
/// Each stage's failure ends the run before the next stage starts, so a
/// failed capture or OCR never touches the knowledge file.
pub struct Pipeline {
    capturer: Arc<dyn ScreenCapturer>,
    ocr: Arc<dyn OcrEngine>,
    writer: Arc<KnowledgeWriter>,
    feedback: FeedbackHandle,
    clock: Clock,
    timeout: Duration,
    echo: bool,
}

impl Pipeline {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        ocr: Arc<dyn OcrEngine>,
        writer: Arc<KnowledgeWriter>,
    ) -> Self {
        Self {
            capturer,
            ocr,
            writer,
            feedback: FeedbackHandle::disabled(),
            clock: local_clock(),
            timeout: Duration::from_secs(PIPELINE_TIMEOUT_SECS),
            echo: false,
        }
    }

    pub fn with_feedback(mut self, feedback: FeedbackHandle) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Print progress and the recognized text to stdout.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn writer(&self) -> &KnowledgeWriter {
        &self.writer
    }

    pub async fn run(&self, trigger: TriggerEvent) -> Result<PipelineOutcome, PipelineError> {
        self.feedback.cue(Cue::Start);
        log_info!(
            "capture #{} started ({} -> {})",
            trigger.seq,
            self.capturer.name(),
            self.ocr.name()
        );
        let start = Instant::now();

        let result = self.execute(trigger).await;

        match &result {
            Ok(outcome) => {
                log_info!(
                    "capture #{} completed in {}ms: {} words -> {}",
                    outcome.seq,
                    start.elapsed().as_millis(),
                    outcome.text.word_count,
                    outcome.path.display()
                );
                self.feedback.cue(Cue::Complete);
                if self.echo {
                    let rule = "=".repeat(50);
                    println!("\n{rule}\n");
                    if outcome.text.is_empty() {
                        println!("(no recognizable text)");
                    } else {
                        println!("{}", outcome.text.text);
                    }
                    println!("\n{rule}");
                    println!("📝 Text appended to {}", outcome.path.display());
                }
            }
            Err(err) => {
                log_error!("capture #{} failed at {} stage: {err}", trigger.seq, err.stage());
                self.feedback.cue(Cue::Error);
                if self.echo {
                    println!("❌ {} failed: {err}", err.stage());
                }
            }
        }

        result
    }

    async fn execute(&self, trigger: TriggerEvent) -> Result<PipelineOutcome, PipelineError> {
        let captured_at = (self.clock)();

        // Only capture and recognition run under the deadline. An append that
        // has started is always awaited and its own result reported.
        let text = tokio::time::timeout(self.timeout, self.recognize_screen())
            .await
            .map_err(|_| PipelineError::Timeout {
                after: self.timeout,
            })??;

        let writer = Arc::clone(&self.writer);
        let body = text.text.clone();
        let path = tokio::task::spawn_blocking(move || writer.append(&body, captured_at))
            .await
            .map_err(|e| PipelineError::Worker(format!("knowledge writer join failed: {e}")))??;

        Ok(PipelineOutcome {
            seq: trigger.seq,
            captured_at,
            text,
            path,
        })
    }

    async fn recognize_screen(&self) -> Result<ExtractedText, PipelineError> {
        let artifact = self.capturer.capture().await?;
        if self.echo {
            let (width, height) = artifact.dimensions();
            println!("📸 Screenshot captured ({width}x{height})! Recognizing text...");
        }

        Ok(self.ocr.recognize(artifact).await?)
    }
}
