use crate::command;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use xcinstall_core::{CompatibilityIdentifier, IdentifierError, IdentifierProvider};

/// Reads the compatibility identifier from Xcode's own `Info.plist` via
/// `defaults read <Xcode.app>/Contents/Info <key>`.
#[derive(Debug, Clone)]
pub struct DefaultsIdentifierProvider {
    program: PathBuf,
    domain: PathBuf,
    key: String,
}

impl DefaultsIdentifierProvider {
    pub fn new(app_bundle: &Path, key: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("defaults"),
            // `defaults` takes the plist path without its extension.
            domain: app_bundle.join("Contents").join("Info"),
            key: key.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl IdentifierProvider for DefaultsIdentifierProvider {
    fn fetch_current_identifier(&self) -> Result<CompatibilityIdentifier, IdentifierError> {
        let output = command::run(
            &self.program,
            [
                OsStr::new("read"),
                self.domain.as_os_str(),
                OsStr::new(&self.key),
            ],
        )
        .map_err(|e| IdentifierError::ProviderUnavailable {
            reason: e.to_string(),
        })?;

        let raw = String::from_utf8(output.stdout).map_err(|_| {
            IdentifierError::MalformedIdentifier {
                reason: "output is not valid UTF-8".into(),
            }
        })?;
        let identifier = CompatibilityIdentifier::parse(&raw)?;
        tracing::debug!(identifier = %identifier, key = %self.key, "read Xcode compatibility identifier");
        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[cfg(unix)]
    fn script(body: &str) -> tempfile::TempPath {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        file.flush().unwrap();

        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        file.into_temp_path()
    }

    fn provider(program: &Path) -> DefaultsIdentifierProvider {
        DefaultsIdentifierProvider::new(Path::new("/Applications/Xcode.app"), "DVTPlugInCompatibilityUUID")
            .with_program(program)
    }

    #[test]
    #[cfg(unix)]
    fn reads_identifier_from_defaults() {
        let fake = script(
            r#"[ "$1" = "read" ] || exit 2
[ "$2" = "/Applications/Xcode.app/Contents/Info" ] || exit 3
[ "$3" = "DVTPlugInCompatibilityUUID" ] || exit 4
echo "ABC-123""#,
        );

        let id = provider(&fake).fetch_current_identifier().expect("identifier");
        assert_eq!(id.as_str(), "ABC-123");
    }

    #[test]
    #[cfg(unix)]
    fn failing_query_is_unavailable() {
        let fake = script("echo 'Domain does not exist' >&2\nexit 1");

        let err = provider(&fake)
            .fetch_current_identifier()
            .expect_err("query fails");
        match err {
            IdentifierError::ProviderUnavailable { reason } => {
                assert!(reason.contains("Domain does not exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn empty_output_is_malformed() {
        let fake = script("echo");

        let err = provider(&fake)
            .fetch_current_identifier()
            .expect_err("empty output");
        assert!(matches!(err, IdentifierError::MalformedIdentifier { .. }));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let err = provider(Path::new("/nonexistent/defaults"))
            .fetch_current_identifier()
            .expect_err("program missing");
        assert!(matches!(err, IdentifierError::ProviderUnavailable { .. }));
    }
}
