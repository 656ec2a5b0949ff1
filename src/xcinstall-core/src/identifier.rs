//! Host compatibility identifiers.
//!
//! Xcode only loads plug-ins whose `Info.plist` lists the running Xcode's
//! `DVTPlugInCompatibilityUUID`. The value is issued by the host application
//! and treated here as an opaque token compared by exact string equality.

use std::fmt;
use thiserror::Error;

/// Errors raised while obtaining a compatibility identifier.
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("compatibility identifier provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },
    #[error("malformed compatibility identifier: {reason}")]
    MalformedIdentifier { reason: String },
}

/// A validated compatibility identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompatibilityIdentifier(String);

impl CompatibilityIdentifier {
    /// Validate raw provider output.
    ///
    /// A single trailing line terminator (`\n` or `\r\n`) is stripped. The
    /// remaining value must be non-empty and free of control characters.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let value = raw
            .strip_suffix("\r\n")
            .or_else(|| raw.strip_suffix('\n'))
            .unwrap_or(raw);

        if value.is_empty() {
            return Err(IdentifierError::MalformedIdentifier {
                reason: "value is empty".into(),
            });
        }

        if let Some(c) = value.chars().find(|c| c.is_control()) {
            return Err(IdentifierError::MalformedIdentifier {
                reason: format!("value contains control character {:?}", c),
            });
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompatibilityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompatibilityIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of the host application's current compatibility identifier.
///
/// Implementations perform at most one external query per call and never
/// retry.
pub trait IdentifierProvider {
    fn fetch_current_identifier(&self) -> Result<CompatibilityIdentifier, IdentifierError>;
}

/// Provider returning a fixed value, e.g. one pinned in `config.toml`.
#[derive(Debug, Clone)]
pub struct StaticIdentifierProvider {
    value: String,
}

impl StaticIdentifierProvider {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl IdentifierProvider for StaticIdentifierProvider {
    fn fetch_current_identifier(&self) -> Result<CompatibilityIdentifier, IdentifierError> {
        CompatibilityIdentifier::parse(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_trailing_newline() {
        let id = CompatibilityIdentifier::parse("ABC-123\n").expect("valid identifier");
        assert_eq!(id.as_str(), "ABC-123");

        let id = CompatibilityIdentifier::parse("ABC-123\r\n").expect("valid identifier");
        assert_eq!(id.as_str(), "ABC-123");
    }

    #[test]
    fn rejects_empty_value() {
        for raw in ["", "\n", "\r\n"] {
            let err = CompatibilityIdentifier::parse(raw).expect_err("empty should be rejected");
            assert!(matches!(err, IdentifierError::MalformedIdentifier { .. }));
        }
    }

    #[test]
    fn rejects_embedded_control_characters() {
        for raw in ["ABC\n123", "ABC-123\n\n", "ABC\t123", "ABC\u{7}"] {
            let err = CompatibilityIdentifier::parse(raw).expect_err("control char rejected");
            assert!(matches!(err, IdentifierError::MalformedIdentifier { .. }));
        }
    }

    #[test]
    fn static_provider_validates_value() {
        let provider = StaticIdentifierProvider::new("DEADBEEF-0000");
        let id = provider.fetch_current_identifier().expect("valid");
        assert_eq!(id.to_string(), "DEADBEEF-0000");

        let provider = StaticIdentifierProvider::new("");
        assert!(matches!(
            provider.fetch_current_identifier(),
            Err(IdentifierError::MalformedIdentifier { .. })
        ));
    }
}
