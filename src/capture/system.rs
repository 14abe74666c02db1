use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;

use super::{CaptureArtifact, CaptureRegion, ScreenCapturer};
use crate::error::CaptureError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const CAPTURE_TIMEOUT_SECS: u64 = 10;

/// External screenshot tools, tried in the order `candidates` returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    /// macOS `screencapture`
    ScreenCapture,
    /// Wayland (wlroots) `grim`
    Grim,
    /// ImageMagick `import`
    Import,
    Scrot,
}

impl CaptureBackend {
    pub fn program(&self) -> &'static str {
        match self {
            CaptureBackend::ScreenCapture => "screencapture",
            CaptureBackend::Grim => "grim",
            CaptureBackend::Import => "import",
            CaptureBackend::Scrot => "scrot",
        }
    }

    fn leading_args(&self) -> &'static [&'static str] {
        match self {
            CaptureBackend::ScreenCapture => &["-x", "-t", "png"],
            CaptureBackend::Grim => &[],
            CaptureBackend::Import => &["-window", "root"],
            CaptureBackend::Scrot => &["--overwrite"],
        }
    }

    /// Backends usable for this OS and session.
    pub fn candidates(os: &str, wayland: bool, x11: bool) -> Result<Vec<Self>, CaptureError> {
        match os {
            "macos" => Ok(vec![CaptureBackend::ScreenCapture]),
            "linux" | "freebsd" | "openbsd" | "netbsd" => {
                let mut backends = Vec::new();
                if wayland {
                    backends.push(CaptureBackend::Grim);
                }
                if x11 {
                    backends.push(CaptureBackend::Import);
                    backends.push(CaptureBackend::Scrot);
                }
                if backends.is_empty() {
                    return Err(CaptureError::NoDisplay);
                }
                Ok(backends)
            }
            _ => Err(CaptureError::NoDisplay),
        }
    }

    /// Candidates for the running process.
    pub fn detect() -> Result<Vec<Self>, CaptureError> {
        let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty());
        let x11 = std::env::var_os("DISPLAY").is_some_and(|v| !v.is_empty());
        Self::candidates(std::env::consts::OS, wayland, x11)
    }
}

/// A screenshot command: `program leading_args.. <output.png>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTool {
    program: String,
    leading_args: Vec<String>,
}

impl CaptureTool {
    pub fn new(
        program: impl Into<String>,
        leading_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args(&self, out: &Path) -> Vec<OsString> {
        self.leading_args
            .iter()
            .map(OsString::from)
            .chain(std::iter::once(out.as_os_str().to_owned()))
            .collect()
    }
}

impl From<CaptureBackend> for CaptureTool {
    fn from(backend: CaptureBackend) -> Self {
        CaptureTool::new(backend.program(), backend.leading_args().iter().copied())
    }
}

/// Captures the whole screen through the platform's screenshot tool.
pub struct SystemCapturer {
    region: Option<CaptureRegion>,
    timeout: Duration,
    tools: Option<Vec<CaptureTool>>,
}

impl SystemCapturer {
    pub fn new(region: Option<CaptureRegion>) -> Self {
        Self {
            region,
            timeout: Duration::from_secs(CAPTURE_TIMEOUT_SECS),
            tools: None,
        }
    }

    /// Try exactly these tools, in order, instead of detecting the session.
    pub fn with_tools(mut self, tools: Vec<CaptureTool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn tools(&self) -> Result<Vec<CaptureTool>, CaptureError> {
        match &self.tools {
            Some(tools) => Ok(tools.clone()),
            None => Ok(CaptureBackend::detect()?
                .into_iter()
                .map(CaptureTool::from)
                .collect()),
        }
    }

    async fn run_tool(&self, tool: &CaptureTool, out: &Path) -> Result<Vec<u8>, CaptureError> {
        let mut command = Command::new(tool.program());
        command.args(tool.args(out)).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
                return Err(CaptureError::BackendUnavailable {
                    tool: tool.program().to_string(),
                });
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                return Err(CaptureError::Timeout {
                    after: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(CaptureError::PermissionDenied {
                reason: format!(
                    "{} exited with {}: {}",
                    tool.program(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        match tokio::fs::read(out).await {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(CaptureError::PermissionDenied {
                reason: format!("{} produced an empty image", tool.program()),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(CaptureError::PermissionDenied {
                reason: format!("{} produced no image", tool.program()),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ScreenCapturer for SystemCapturer {
    fn name(&self) -> &str {
        "system"
    }

    async fn capture(&self) -> Result<CaptureArtifact, CaptureError> {
        let tools = self.tools()?;
        let scratch = tempfile::Builder::new().prefix("avr-capture-").tempdir()?;
        let out = scratch.path().join("screen.png");

        let start = Instant::now();
        let mut last_err = None;
        for tool in &tools {
            match self.run_tool(tool, &out).await {
                Ok(png) => {
                    log_info!(
                        "Screenshot: {} bytes via {}, took {}ms",
                        png.len(),
                        tool.program(),
                        start.elapsed().as_millis()
                    );
                    let region = self.region;
                    return tokio::task::spawn_blocking(move || {
                        CaptureArtifact::from_png(png, region.as_ref())
                    })
                    .await
                    .map_err(|e| CaptureError::InvalidImage {
                        reason: format!("image worker join failed: {e}"),
                    })?;
                }
                Err(err @ CaptureError::BackendUnavailable { .. }) => {
                    log_warn!("{err}; trying next capture backend");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(CaptureError::NoDisplay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macos_uses_screencapture() {
        let backends = CaptureBackend::candidates("macos", false, false).unwrap();
        assert_eq!(backends, vec![CaptureBackend::ScreenCapture]);
    }

    #[test]
    fn linux_prefers_wayland_then_x11() {
        let backends = CaptureBackend::candidates("linux", true, true).unwrap();
        assert_eq!(
            backends,
            vec![
                CaptureBackend::Grim,
                CaptureBackend::Import,
                CaptureBackend::Scrot
            ]
        );

        let backends = CaptureBackend::candidates("linux", false, true).unwrap();
        assert_eq!(backends, vec![CaptureBackend::Import, CaptureBackend::Scrot]);
    }

    #[test]
    fn headless_has_no_display() {
        assert!(matches!(
            CaptureBackend::candidates("linux", false, false),
            Err(CaptureError::NoDisplay)
        ));
        assert!(matches!(
            CaptureBackend::candidates("windows", false, false),
            Err(CaptureError::NoDisplay)
        ));
    }

    #[test]
    fn backend_args_end_with_output_path() {
        let out = Path::new("/tmp/avr/screen.png");
        for backend in [
            CaptureBackend::ScreenCapture,
            CaptureBackend::Grim,
            CaptureBackend::Import,
            CaptureBackend::Scrot,
        ] {
            let args = CaptureTool::from(backend).args(out);
            assert_eq!(args.last().map(|a| a.as_os_str()), Some(out.as_os_str()));
        }

        let args = CaptureTool::from(CaptureBackend::ScreenCapture).args(out);
        let leading: Vec<_> = args[..3].iter().filter_map(|a| a.to_str()).collect();
        assert_eq!(leading, ["-x", "-t", "png"]);
    }

    /// A tool that runs `body` through `sh`; the output path is `$1`.
    fn scripted_tool(dir: &Path, name: &str, body: &str) -> CaptureTool {
        let script = dir.join(name);
        std::fs::write(&script, body).unwrap();
        CaptureTool::new("sh", [script.to_string_lossy().into_owned()])
    }

    fn capturer_with(tools: Vec<CaptureTool>) -> SystemCapturer {
        SystemCapturer::new(None).with_tools(tools)
    }

    #[tokio::test]
    async fn nonzero_exit_is_permission_denied() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = scripted_tool(
            tmp.path(),
            "deny.sh",
            "echo 'could not create image from display' >&2\nexit 1",
        );

        let err = capturer_with(vec![tool]).capture().await.unwrap_err();
        match err {
            CaptureError::PermissionDenied { reason } => {
                assert!(reason.contains("could not create image from display"), "{reason}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_or_empty_output_is_permission_denied() {
        let tmp = tempfile::tempdir().unwrap();
        let silent = scripted_tool(tmp.path(), "silent.sh", "exit 0");
        let empty = scripted_tool(tmp.path(), "empty.sh", r#": > "$1""#);

        let err = capturer_with(vec![silent]).capture().await.unwrap_err();
        assert!(
            matches!(&err, CaptureError::PermissionDenied { reason } if reason.ends_with("produced no image")),
            "{err:?}"
        );

        let err = capturer_with(vec![empty]).capture().await.unwrap_err();
        assert!(
            matches!(&err, CaptureError::PermissionDenied { reason } if reason.ends_with("produced an empty image")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn hung_tool_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = scripted_tool(tmp.path(), "hang.sh", "sleep 5");

        let err = capturer_with(vec![tool])
            .with_timeout(Duration::from_millis(200))
            .capture()
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Timeout { .. }), "{err:?}");
        assert_eq!(err.to_string(), "screen capture timed out after 200ms");
    }

    #[tokio::test]
    async fn falls_back_past_missing_tools() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("fixture.png");
        std::fs::write(&fixture, crate::capture::tests::png_of(12, 7)).unwrap();
        let copy = scripted_tool(
            tmp.path(),
            "copy.sh",
            &format!(r#"cp '{}' "$1""#, fixture.display()),
        );

        let artifact = capturer_with(vec![
            CaptureTool::new("/nonexistent/avr-screenshot", Vec::<String>::new()),
            copy,
        ])
        .capture()
        .await
        .unwrap();
        assert_eq!(artifact.dimensions(), (12, 7));
    }

    #[tokio::test]
    async fn only_missing_tools_reports_unavailable() {
        let err = capturer_with(vec![CaptureTool::new(
            "/nonexistent/avr-screenshot",
            Vec::<String>::new(),
        )])
        .capture()
        .await
        .unwrap_err();
        assert!(
            matches!(&err, CaptureError::BackendUnavailable { tool } if tool == "/nonexistent/avr-screenshot"),
            "{err:?}"
        );
    }
}
