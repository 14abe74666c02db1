pub mod format;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::WriteError;

pub use format::{file_name_for, format_block, parse_blocks, KnowledgeEntry};

/// Appends capture blocks to `running_knowledge_<date>.md` files.
///
/// Every append happens under `lock` with one `write_all` on an append-mode
/// handle, so blocks from this process never interleave. Files are only ever
/// opened for append.
pub struct KnowledgeWriter {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl KnowledgeWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(file_name_for(date))
    }

    /// Appends one block for `at` and returns the file written.
    pub fn append(&self, text: &str, at: NaiveDateTime) -> Result<PathBuf, WriteError> {
        let path = self.path_for(at.date());
        let block = format_block(text, at.time());

        let _guard = self.lock.lock().map_err(|_| WriteError::Poisoned)?;

        fs::create_dir_all(&self.dir).map_err(|source| WriteError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let append_err = |source| WriteError::Append {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(append_err)?;
        file.write_all(block.as_bytes()).map_err(append_err)?;
        file.flush().map_err(append_err)?;

        Ok(path)
    }

    /// Blocks recorded for `date`; empty when the file does not exist yet.
    pub fn read_day(&self, date: NaiveDate) -> std::io::Result<Vec<KnowledgeEntry>> {
        match fs::read_to_string(self.path_for(date)) {
            Ok(contents) => Ok(parse_blocks(&contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, time.2)
            .unwrap()
    }

    #[test]
    fn creates_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = KnowledgeWriter::new(tmp.path().join("nested").join("notes"));

        let path = writer.append("hello", at((2024, 5, 1), (12, 0, 0))).unwrap();

        assert!(path.ends_with("nested/notes/running_knowledge_20240501.md"));
        assert!(path.exists());
    }

    #[test]
    fn appends_never_truncate() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = KnowledgeWriter::new(tmp.path());
        let path = writer.path_for(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        fs::write(&path, "# handwritten preamble\n").unwrap();

        writer.append("one", at((2024, 5, 1), (9, 0, 0))).unwrap();
        writer.append("two", at((2024, 5, 1), (9, 0, 1))).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# handwritten preamble\n"));
        let texts: Vec<_> = parse_blocks(&contents).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn date_boundary_splits_files() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = KnowledgeWriter::new(tmp.path());

        let late = writer.append("late", at((2024, 12, 31), (23, 59, 59))).unwrap();
        let early = writer.append("early", at((2025, 1, 1), (0, 0, 1))).unwrap();

        assert_ne!(late, early);
        assert!(late.ends_with("running_knowledge_20241231.md"));
        assert!(early.ends_with("running_knowledge_20250101.md"));

        let day1 = writer.read_day(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()).unwrap();
        let day2 = writer.read_day(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).unwrap();
        assert_eq!(day1.len(), 1);
        assert_eq!(day1[0].text, "late");
        assert_eq!(day2.len(), 1);
        assert_eq!(day2[0].text, "early");
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = Arc::new(KnowledgeWriter::new(tmp.path()));
        let stamp = at((2024, 6, 1), (8, 30, 0));
        let body = "line\n".repeat(200);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let writer = Arc::clone(&writer);
                let text = format!("worker {i}\n{body}end {i}");
                thread::spawn(move || {
                    for _ in 0..5 {
                        writer.append(&text, stamp).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = writer.read_day(stamp.date()).unwrap();
        assert_eq!(entries.len(), 40);
        for entry in entries {
            let first = entry.text.lines().next().unwrap().to_string();
            let id = first.strip_prefix("worker ").unwrap();
            assert!(entry.text.ends_with(&format!("end {id}")));
            assert_eq!(entry.text.lines().count(), 202);
        }
    }

    #[test]
    fn missing_day_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = KnowledgeWriter::new(tmp.path());
        let entries = writer.read_day(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).unwrap();
        assert!(entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_directory_is_a_write_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "").unwrap();
        let writer = KnowledgeWriter::new(blocker.join("sub"));

        let err = writer.append("x", at((2024, 1, 1), (0, 0, 0))).unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }
}
