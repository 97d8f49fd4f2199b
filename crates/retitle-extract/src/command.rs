//! Time-bounded execution of external converters.
//!
//! Every child process is spawned with `kill_on_drop`, so a timeout or a
//! cancelled task never leaves a converter running. Inputs are staged in
//! temp files that are removed when the handle drops.

use std::io::Write;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tokio::process::Command;

use retitle_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use retitle_core::ExtractionError;

/// Per-command timeout from the adapter config (`timeout_secs`), else the
/// default.
pub fn timeout_secs(config: &JsonValue) -> u64 {
    config
        .get("timeout_secs")
        .and_then(|v| v.as_u64())
        .filter(|&s| s > 0)
        .unwrap_or(EXTRACTION_CMD_TIMEOUT_SECS)
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

async fn run(cmd: &mut Command, timeout_secs: u64) -> Result<std::process::Output, ExtractionError> {
    let program = program_name(cmd);
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            ExtractionError::ConversionFailed(format!(
                "{} timed out after {}s",
                program, timeout_secs
            ))
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::ConversionFailed(format!("{} is not installed", program))
            } else {
                ExtractionError::ConversionFailed(format!("Failed to execute {}: {}", program, e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractionError::ConversionFailed(format!(
            "{} failed ({}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

/// Run a command with a timeout, returning stdout as a string.
pub async fn run_cmd_with_timeout(
    cmd: &mut Command,
    timeout_secs: u64,
) -> Result<String, ExtractionError> {
    let output = run(cmd, timeout_secs).await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command that writes its results to files rather than stdout.
pub async fn run_cmd_status(cmd: &mut Command, timeout_secs: u64) -> Result<(), ExtractionError> {
    run(cmd, timeout_secs).await.map(|_| ())
}

/// Whether `program` can be executed. `accepted_codes` lists non-zero exit
/// codes that still prove the binary exists (some tools exit 99 on `-v`).
pub async fn command_available(program: &str, arg: &str, accepted_codes: &[i32]) -> bool {
    match Command::new(program)
        .arg(arg)
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => {
            output.status.success()
                || output
                    .status
                    .code()
                    .is_some_and(|c| accepted_codes.contains(&c))
        }
        Err(_) => false,
    }
}

/// Stage input bytes in a temp file with the given suffix (e.g. `.docx`).
pub fn write_temp_file(data: &[u8], suffix: &str) -> Result<NamedTempFile, ExtractionError> {
    let mut tmpfile = tempfile::Builder::new()
        .prefix("retitle-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .and_then(|_| tmpfile.flush())
        .map_err(|e| ExtractionError::ConversionFailed(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Lowercase extension of a file name, without the dot.
pub fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
