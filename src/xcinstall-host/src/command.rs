use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Errors from running a system tool.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Run `program` to completion, capturing its output.
///
/// A non-zero exit status is reported as [`CommandError::Status`].
pub(crate) fn run<I, S>(program: &Path, args: I) -> Result<Output, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!(program = %program.display(), "running system command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| CommandError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(CommandError::Status {
            program: program.to_path_buf(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run(Path::new("/nonexistent/xcinstall-tool"), ["x"])
            .expect_err("program does not exist");
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_is_reported() {
        let err = run(Path::new("/bin/sh"), ["-c", "echo boom >&2; exit 3"])
            .expect_err("script fails");
        match err {
            CommandError::Status { stderr, status, .. } => {
                assert_eq!(stderr, "boom");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
