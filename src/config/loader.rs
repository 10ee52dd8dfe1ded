//! Job file loading.

use crate::config::schema::JobDefinition;
use crate::error::{Result, WorkerError};
use std::fs;
use std::path::Path;

/// Load a job definition from a YAML file.
///
/// # Errors
///
/// Returns `JobNotFound` if the file does not exist, `Io` for other read
/// failures and `JobParseError` if the YAML does not match the schema.
pub fn load_job_file(path: &Path) -> Result<JobDefinition> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WorkerError::JobNotFound {
                path: path.to_path_buf(),
            }
        } else {
            WorkerError::Io(e)
        }
    })?;

    parse_job(&content, path)
}

/// Parse YAML content into a [`JobDefinition`].
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_job(content: &str, source_path: &Path) -> Result<JobDefinition> {
    serde_yaml::from_str(content).map_err(|e| WorkerError::JobParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}
