// File I/O operations

use std::fmt;

pub mod duplicates;
pub mod records;
pub mod report;
pub mod topology_csv;

pub use records::ParseOutcome;

/// IO-layer failures. Per-line data problems inside record streams are not
/// errors; they travel through [`records::ParseOutcome`] so one bad line
/// never sinks a file.
#[derive(Debug)]
pub enum IoError {
    /// File-level read/write failure.
    Io { path: String, message: String },
    /// CSV-level decode failure.
    Csv { path: String, message: String },
    /// A line or field that does not follow the declared format.
    Format {
        path: String,
        line: usize,
        message: String,
    },
}

impl IoError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{path}: {message}"),
            Self::Csv { path, message } => write!(f, "{path}: csv error: {message}"),
            Self::Format { path, line, message } => {
                write!(f, "{path}:{line}: {message}")
            }
        }
    }
}

impl std::error::Error for IoError {}
