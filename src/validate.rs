//! Shader validation after writing. Failures are reported, never fatal.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use naga::valid::{Capabilities, ValidationFlags, Validator};

/// A kernel file a validator rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub path: PathBuf,
    /// `naga` or the external command.
    pub validator: String,
    pub message: String,
}

/// Parse and validate WGSL text with naga.
pub fn check(text: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(text).map_err(|e| e.emit_to_string(text))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| e.emit_to_string(text))?;
    Ok(())
}

/// Validate a written file in-process.
pub fn check_file(path: &Path, text: &str) -> Option<Issue> {
    let message = check(text).err()?;
    tracing::warn!(path = %path.display(), "naga rejected kernel");
    Some(Issue {
        path: path.to_path_buf(),
        validator: "naga".to_string(),
        message,
    })
}

/// Run an external validator command (program plus leading arguments)
/// on each path. A missing program is noted once and ends the pass.
pub fn run_external(command: &str, paths: &[PathBuf]) -> Vec<Issue> {
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return Vec::new();
    };
    let leading: Vec<&str> = words.collect();
    let mut issues = Vec::new();
    for path in paths {
        let output = match Command::new(program).args(&leading).arg(path).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(validator = program, "validator not found; skipping external validation");
                break;
            }
            Err(e) => {
                tracing::info!(validator = program, error = %e, "cannot run validator");
                break;
            }
        };
        if !output.status.success() {
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            tracing::warn!(path = %path.display(), validator = program, "validator rejected kernel");
            issues.push(Issue {
                path: path.clone(),
                validator: program.to_string(),
                message,
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_valid_compute_shader() {
        let text = "@group(0) @binding(0) var<storage, read_write> Data: array<u32>;\n\
                    @compute @workgroup_size(64, 1, 1)\n\
                    fn main(@builtin(local_invocation_index) i: u32) {\n\
                    \tData[i] = i;\n\
                    }\n";
        assert_eq!(check(text), Ok(()));
    }

    #[test]
    fn test_check_reports_errors() {
        let err = check("fn f() -> u32 { return undefined_name; }").unwrap_err();
        assert!(err.contains("undefined_name"), "{}", err);
        assert!(check_file(Path::new("k.wgsl"), "fn (").is_some());
    }

    #[test]
    fn test_missing_external_validator_is_not_fatal() {
        let issues = run_external(
            "rustsl-no-such-validator --flag",
            &[PathBuf::from("a.wgsl"), PathBuf::from("b.wgsl")],
        );
        assert!(issues.is_empty());
        assert!(run_external("   ", &[PathBuf::from("a.wgsl")]).is_empty());
    }
}
