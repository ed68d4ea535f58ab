use crate::error::{EchoMetaError, Result};
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};

/// One acquisition selected for processing.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

impl RawFile {
    pub fn new(path: PathBuf, size: u64) -> Self {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        Self {
            path,
            filename,
            size,
        }
    }

    pub fn format_size(&self) -> String {
        format_bytes(self.size)
    }
}

pub struct RawFileScanner {
    pattern: String,
}

impl RawFileScanner {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Files in `root` (not below it) matching the pattern, sorted by name.
    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<Vec<RawFile>> {
        let root_path = root.as_ref();

        if !root_path.exists() {
            return Err(EchoMetaError::InvalidPath {
                path: root_path.display().to_string(),
            });
        }

        if !root_path.is_dir() {
            return Err(EchoMetaError::InvalidPath {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        // the pattern applies to file names only; escape the directory part
        let root_text = Pattern::escape(&root_path.to_string_lossy());
        let full_pattern = format!("{}/{}", root_text.trim_end_matches('/'), self.pattern);

        let mut files = Vec::new();
        for entry in glob(&full_pattern)? {
            let path = entry.map_err(|e| EchoMetaError::Io(e.into_error()))?;
            let metadata = path.metadata()?;
            if metadata.is_file() {
                files.push(RawFile::new(path, metadata.len()));
            }
        }

        if files.is_empty() {
            return Err(EchoMetaError::NoInputFiles {
                directory: root_path.display().to_string(),
                pattern: self.pattern.clone(),
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }

    pub fn get_statistics(&self, files: &[RawFile]) -> ScanStatistics {
        let (largest_file_size, largest_file) = files
            .iter()
            .max_by_key(|f| f.size)
            .map(|f| (f.size, f.filename.clone()))
            .unwrap_or_default();

        ScanStatistics {
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            largest_file_size,
            largest_file,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub total_size: u64,
    pub largest_file_size: u64,
    pub largest_file: String,
}

impl ScanStatistics {
    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "Scan Results:\n  Total files: {}\n  Total size: {}\n",
            self.total_files,
            format_bytes(self.total_size)
        );

        if self.largest_file_size > 0 {
            summary.push_str(&format!(
                "  Largest file: {} ({})\n",
                self.largest_file,
                format_bytes(self.largest_file_size)
            ));
        }

        summary
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
