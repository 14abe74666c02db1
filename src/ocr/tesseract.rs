use std::io::{ErrorKind, Write};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;

use super::{ensure_readable, normalize_output, ExtractedText, OcrEngine};
use crate::capture::CaptureArtifact;
use crate::error::OcrError;

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const OCR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Runs the `tesseract` CLI on a temporary PNG and reads the text from stdout.
pub struct TesseractOcr {
    program: String,
    leading_args: Vec<String>,
    language: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            program: "tesseract".to_string(),
            leading_args: Vec::new(),
            language: language.into(),
            timeout: Duration::from_secs(OCR_TIMEOUT_SECS),
        }
    }

    /// Use a different binary, e.g. an absolute path outside `PATH`.
    pub fn with_program(self, program: impl Into<String>) -> Self {
        self.with_command(program, Vec::<String>::new())
    }

    /// Run `program leading_args.. <png> stdout -l <lang>`, for wrappers
    /// such as `flatpak run` or a shell.
    pub fn with_command(
        mut self,
        program: impl Into<String>,
        leading_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.program = program.into();
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, artifact: CaptureArtifact) -> Result<ExtractedText, OcrError> {
        let (width, height) = ensure_readable(&artifact)?;

        // Held until the end of this call; the file is removed on drop.
        let mut input = tempfile::Builder::new()
            .prefix("avr-ocr-")
            .suffix(".png")
            .tempfile()?;
        input.write_all(artifact.png_bytes())?;
        input.flush()?;
        let artifact_id = artifact.id();
        drop(artifact);

        let ocr_start = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
                return Err(OcrError::EngineUnavailable {
                    engine: self.program.clone(),
                });
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(OcrError::Timeout {
                    after: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = ExtractedText::new(normalize_output(&String::from_utf8_lossy(&output.stdout)));
        log_info!(
            "OCR completed for {artifact_id} ({width}x{height}): {} words, ocr_time={}ms",
            text.word_count,
            ocr_start.elapsed().as_millis()
        );
        Ok(text)
    }
}
