use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::CaptureBackend;

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    fn push(&mut self, name: &str, ok: bool, detail: impl Into<String>) {
        self.checks.push(Check {
            name: name.to_string(),
            ok,
            detail: detail.into(),
        });
    }

    pub fn render(&self) -> String {
        self.checks
            .iter()
            .map(|c| {
                let mark = if c.ok { "✅" } else { "❌" };
                format!("{mark} {:<16} {}", c.name, c.detail)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Finds `program` in `PATH` (or checks it directly when it contains a slash).
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{program}.exe"));
            [plain, exe]
        })
        .find(|path| path.is_file())
}

/// Creates `dir` if needed and proves a file can be written inside it.
pub fn probe_writable(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("cannot create: {e}"))?;
    tempfile::tempfile_in(dir)
        .map(|_| ())
        .map_err(|e| format!("not writable: {e}"))
}

/// Readiness of every external capability the pipeline relies on.
pub fn run_checks(knowledge_dir: &Path, ocr_program: &str, listener_available: bool) -> DoctorReport {
    let mut report = DoctorReport::default();

    match CaptureBackend::detect() {
        Ok(backends) => {
            let found: Vec<_> = backends
                .iter()
                .filter_map(|b| find_program(b.program()).map(|p| format!("{} ({})", b.program(), p.display())))
                .collect();
            if found.is_empty() {
                let wanted: Vec<_> = backends.iter().map(|b| b.program()).collect();
                report.push("screen capture", false, format!("install one of: {}", wanted.join(", ")));
            } else {
                report.push("screen capture", true, found.join(", "));
            }
        }
        Err(err) => report.push("screen capture", false, err.to_string()),
    }

    match find_program(ocr_program) {
        Some(path) => report.push("ocr engine", true, path.display().to_string()),
        None => report.push("ocr engine", false, format!("'{ocr_program}' not found in PATH")),
    }

    match probe_writable(knowledge_dir) {
        Ok(()) => report.push("knowledge dir", true, knowledge_dir.display().to_string()),
        Err(reason) => report.push(
            "knowledge dir",
            false,
            format!("{}: {reason}", knowledge_dir.display()),
        ),
    }

    if listener_available {
        report.push(
            "key listener",
            true,
            "compiled in (macOS: grant Accessibility and Screen Recording access)",
        );
    } else {
        report.push("key listener", false, "built without the `listener` feature");
    }

    report
}
