use crate::command;
use std::path::PathBuf;
use xcinstall_core::{ConsoleNotifier, NotificationSink};

/// Shows failures in a modal alert in front of the user's active app.
#[derive(Debug, Clone)]
pub struct DialogNotifier {
    program: PathBuf,
}

impl Default for DialogNotifier {
    fn default() -> Self {
        Self {
            program: PathBuf::from("osascript"),
        }
    }
}

impl DialogNotifier {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl NotificationSink for DialogNotifier {
    fn notify_failure(&self, message: &str) {
        let script = dialog_script(message);
        if let Err(e) = command::run(&self.program, ["-e", script.as_str()]) {
            tracing::warn!(error = %e, "could not display dialog");
            ConsoleNotifier::fallback("can't display dialog", message);
        }
    }

    fn notify_success(&self, message: &str) {
        ConsoleNotifier.notify_success(message);
    }
}

/// Speaks failures aloud. Successes are printed.
#[derive(Debug, Clone)]
pub struct SpeechNotifier {
    program: PathBuf,
}

impl Default for SpeechNotifier {
    fn default() -> Self {
        Self {
            program: PathBuf::from("say"),
        }
    }
}

impl SpeechNotifier {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl NotificationSink for SpeechNotifier {
    fn notify_failure(&self, message: &str) {
        if let Err(e) = command::run(&self.program, [message]) {
            tracing::warn!(error = %e, "could not speak message");
            ConsoleNotifier::fallback("can't talk", message);
        }
    }

    fn notify_success(&self, message: &str) {
        ConsoleNotifier.notify_success(message);
    }
}

fn dialog_script(message: &str) -> String {
    format!(
        r#"tell application (path to frontmost application as text) to display dialog "{}" buttons {{"OK"}} with icon stop"#,
        escape_applescript(message)
    )
}

fn escape_applescript(message: &str) -> String {
    message.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn recording_script(dir: &TempDir) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.path().join("args.txt");
        let script = dir.path().join("fake-tool");
        fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[test]
    fn dialog_script_escapes_quotes() {
        let script = dialog_script(r#"Error: bad "path" C:\x"#);
        assert_eq!(
            script,
            r#"tell application (path to frontmost application as text) to display dialog "Error: bad \"path\" C:\\x" buttons {"OK"} with icon stop"#
        );
    }

    #[test]
    #[cfg(unix)]
    fn dialog_runs_osascript() {
        let dir = TempDir::new().unwrap();
        let (script, log) = recording_script(&dir);

        DialogNotifier::with_program(&script).notify_failure("Error: boom");

        let args = fs::read_to_string(log).unwrap();
        assert!(args.starts_with("-e\n"));
        assert!(args.contains("display dialog \"Error: boom\""));
    }

    #[test]
    #[cfg(unix)]
    fn speech_passes_message() {
        let dir = TempDir::new().unwrap();
        let (script, log) = recording_script(&dir);

        SpeechNotifier::with_program(&script).notify_failure("UUID check done");

        assert_eq!(fs::read_to_string(log).unwrap(), "UUID check done\n");
    }

    #[test]
    fn missing_tools_fall_back_quietly() {
        DialogNotifier::with_program("/nonexistent/osascript").notify_failure("Error: boom");
        SpeechNotifier::with_program("/nonexistent/say").notify_failure("Error: boom");
    }
}
