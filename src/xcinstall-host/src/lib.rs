//! macOS system integrations for the installer.
//!
//! Each type shells out to a single system tool:
//! - [`DefaultsIdentifierProvider`] reads Xcode's compatibility identifier
//!   with `defaults read`
//! - [`DialogNotifier`] shows a modal alert through `osascript`
//! - [`SpeechNotifier`] speaks a message with `say`
//!
//! The program paths are injectable so tests can substitute scripts.

mod command;
mod defaults;
mod dialog;

pub use command::CommandError;
pub use defaults::DefaultsIdentifierProvider;
pub use dialog::{DialogNotifier, SpeechNotifier};
