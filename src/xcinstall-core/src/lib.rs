pub mod config;
pub mod identifier;
pub mod install;
pub mod logging;
pub mod notify;
pub mod paths;
pub mod patcher;

pub use config::{
    Config, ConfigError, HostConfig, LogLevel, LoggingConfig, NotificationConfig, PatchConfig,
    ValidationError,
};
pub use identifier::{
    CompatibilityIdentifier, IdentifierError, IdentifierProvider, StaticIdentifierProvider,
};
pub use install::{InstallError, InstallReport, Installer, MoveFailure, SupportFiles, UninstallReport};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use notify::{ConsoleNotifier, NotificationSink};
pub use paths::{AppDirs, DirsError, InstallLayout};
pub use patcher::{MetadataPatcher, PatchError, PatchMode, PatchOutcome, COMPATIBILITY_KEY};

pub const APP_NAME: &str = "xcinstall";
pub const APP_AUTHOR: &str = "Xcinstall";
pub const APP_QUALIFIER: &str = "io";
