//! Directory batches
//!
//! Every file is attempted; failures are collected and raised once at the end
//! as [`Error::Batch`], naming each failing file.

use crate::config::TemplateSpec;
use crate::format::Format;
use crate::gateway::Gateway;
use crate::{Error, Result};
use repspec_validation::ValidationReport;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One file a batch operation could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: PathBuf, message: impl ToString) -> Self {
        Self {
            path,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Documents below `dir` in a supported format, sorted by path.
///
/// Lock files are skipped; unreadable entries are recorded in `failures`.
fn documents(gateway: &Gateway, dir: &Path, failures: &mut Vec<FileFailure>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        let error = std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory");
        return Err(Error::io("read directory", dir, &error));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                failures.push(FileFailure::new(path, e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if gateway.config().is_lock_file(path) {
            debug!("Skipping lock file {}", path.display());
            continue;
        }
        if Format::from_path(path).is_err() {
            debug!("Skipping {} (unsupported format)", path.display());
            continue;
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn finish<T>(operation: &str, done: T, failures: Vec<FileFailure>) -> Result<T> {
    if failures.is_empty() {
        Ok(done)
    } else {
        Err(Error::Batch {
            operation: operation.to_string(),
            failures,
        })
    }
}

/// Translate every document below `source` into `format` under `output`,
/// keeping relative sub-directories. Returns the files written.
pub fn translate_directory(
    gateway: &Gateway,
    source: &Path,
    output: &Path,
    format: Format,
) -> Result<Vec<PathBuf>> {
    let mut failures = Vec::new();
    let mut written = Vec::new();
    for input in documents(gateway, source, &mut failures)? {
        let relative = input.strip_prefix(source).unwrap_or(&input);
        let target = output.join(relative).with_extension(format.extension());
        match gateway.translate(&input, &target) {
            Ok(()) => written.push(target),
            Err(e) => {
                warn!("Failed to translate {}: {}", input.display(), e);
                failures.push(FileFailure::new(input, e));
            }
        }
    }
    info!("Translated {} files from {}", written.len(), source.display());
    finish("translate", written, failures)
}

/// Validate every document below `dir`.
pub fn validate_directory(gateway: &Gateway, dir: &Path) -> Result<Vec<ValidationReport>> {
    let mut failures = Vec::new();
    let mut reports = Vec::new();
    for path in documents(gateway, dir, &mut failures)? {
        match gateway.validate(&path) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("{} is not valid", path.display());
                failures.push(FileFailure::new(path, e));
            }
        }
    }
    info!("{} documents valid below {}", reports.len(), dir.display());
    finish("validate", reports, failures)
}

/// Write `<RS>[-<suffix>]-template.xlsx` into `output_dir` for every spec.
pub fn generate_templates(gateway: &Gateway, output_dir: &Path, specs: &[TemplateSpec]) -> Result<Vec<PathBuf>> {
    let mut failures = Vec::new();
    let mut written = Vec::new();
    for spec in specs {
        let path = output_dir.join(spec.file_name());
        match gateway.template(&spec.template_config(), &path) {
            Ok(()) => written.push(path),
            Err(e) => {
                warn!("Failed to generate {}: {}", path.display(), e);
                failures.push(FileFailure::new(path, e));
            }
        }
    }
    finish("generate templates", written, failures)
}
