use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ShellError;

/// The log of previously entered lines, numbered from 1.
pub trait History {
    /// Record a line. Failing to persist it is reported, not fatal.
    fn append(&mut self, line: &str) -> Result<(), ShellError>;

    fn entries(&self) -> &[String];

    /// Line `n`, counting from 1.
    fn get(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|idx| self.entries().get(idx))
            .map(String::as_str)
    }
}

/// History kept only for the lifetime of the shell.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    lines: Vec<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl History for MemoryHistory {
    fn append(&mut self, line: &str) -> Result<(), ShellError> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn entries(&self) -> &[String] {
        &self.lines
    }
}

/// History persisted one line per entry, continuing the numbering of
/// earlier sessions.
#[derive(Debug)]
pub struct FileHistory {
    path: PathBuf,
    lines: Vec<String>,
}

impl FileHistory {
    /// Load `path` if it exists. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ShellError> {
        let path = path.into();
        let lines = match std::fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(ShellError::HistoryIo { path, source }),
        };
        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl History for FileHistory {
    fn append(&mut self, line: &str) -> Result<(), ShellError> {
        // The in-memory copy is what `!N` reads, so keep it even if the
        // write below fails.
        self.lines.push(line.to_string());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"))
            .map_err(|source| ShellError::HistoryIo {
                path: self.path.clone(),
                source,
            })
    }

    fn entries(&self) -> &[String] {
        &self.lines
    }
}
