use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use xcinstall_core::{
    init_logging, AppDirs, Config, ConsoleNotifier, HostConfig, IdentifierProvider, InstallLayout,
    Installer, MetadataPatcher, NotificationConfig, NotificationSink, PatchOutcome,
    StaticIdentifierProvider, SupportFiles,
};
use xcinstall_host::{DefaultsIdentifierProvider, DialogNotifier, SpeechNotifier};

const USAGE: &str = "Usage: xcinstall [uninstall]";

#[derive(Debug, Parser)]
#[command(
    name = "xcinstall",
    version,
    about = "Install Xcode syntax support for a language",
    disable_help_subcommand = true,
    override_usage = "xcinstall [uninstall]"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Move the installed plug-in and language specification to the Trash
    Uninstall,
}

#[derive(Debug)]
enum Invocation {
    /// `None` installs.
    Run(Option<Command>),
    /// Anything we don't understand prints usage and exits successfully.
    Usage,
    /// `--help` / `--version`, rendered by clap.
    Clap(clap::Error),
}

fn parse_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Invocation::Run(cli.command),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Invocation::Clap(err)
        }
        Err(_) => Invocation::Usage,
    }
}

/// Fans failures out to the notifiers enabled in `[notifications]`.
struct Notifier {
    dialog: Option<DialogNotifier>,
    speech: Option<SpeechNotifier>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl Notifier {
    fn from_config(config: &NotificationConfig) -> Self {
        Self {
            dialog: config.dialog.then(DialogNotifier::default),
            speech: config.speak.then(SpeechNotifier::default),
        }
    }
}

impl NotificationSink for Notifier {
    fn notify_failure(&self, message: &str) {
        tracing::error!(%message, "installer failed");
        match &self.dialog {
            Some(dialog) => dialog.notify_failure(message),
            None => ConsoleNotifier.notify_failure(message),
        }
        if let Some(speech) = &self.speech {
            speech.notify_failure(message);
        }
    }

    fn notify_success(&self, message: &str) {
        ConsoleNotifier.notify_success(message);
    }
}

fn main() {
    let command = match parse_args(std::env::args_os()) {
        Invocation::Run(command) => command,
        Invocation::Usage => {
            print!("{}", banner(&Config::default().language));
            println!("{USAGE}\n");
            return;
        }
        Invocation::Clap(err) => err.exit(),
    };

    let mut notifier = Notifier::default();
    if let Err(err) = run(command, &mut notifier) {
        notifier.notify_failure(&format!("Error: {err:#}"));
    }
}

fn run(command: Option<Command>, notifier: &mut Notifier) -> Result<()> {
    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    print!("{}", banner(&config.language));
    *notifier = Notifier::from_config(&config.notifications);
    let _logging = init_logging(&config.logging, &dirs)?;

    let layout = InstallLayout::discover()?;
    tracing::info!(
        language = %config.language,
        source = %layout.source_dir.display(),
        config_dir = %dirs.config_dir().display(),
        "starting xcinstall"
    );
    let installer = Installer::new(
        layout,
        SupportFiles::new(config.language.as_str()),
        MetadataPatcher::new(config.patch.mode).with_backup(config.patch.backup),
    );

    match command {
        Some(Command::Uninstall) => uninstall(&installer, notifier),
        None => install(&installer, &config.host, notifier),
    }
}

fn install(installer: &Installer, host: &HostConfig, notifier: &Notifier) -> Result<()> {
    let provider = identifier_provider(host);
    let report = installer.install(provider.as_ref())?;

    println!("Copied {}", report.specification.display());
    println!("Copied {}", report.plugin.display());
    println!("Xcode UUID: {}", report.identifier);
    match report.outcome {
        PatchOutcome::Inserted { .. } => println!("Added Xcode UUID to plug-in"),
        PatchOutcome::AlreadyPresent => println!("Xcode UUID already in plug-in"),
    }

    notifier.notify_success("Installation completed. Please restart Xcode to load the plug-in.\n");
    Ok(())
}

fn uninstall(installer: &Installer, notifier: &Notifier) -> Result<()> {
    let report = installer.uninstall()?;

    for (from, to) in &report.moved {
        println!("Moved {} to {}", from.display(), to.display());
    }
    for failure in &report.failures {
        println!(
            "\x07Could not move file {}\nError: {}",
            failure.path.display(),
            failure.source
        );
    }

    notifier.notify_success("Files uninstalled. Please restart Xcode for changes to take effect.\n");
    Ok(())
}

fn identifier_provider(host: &HostConfig) -> Box<dyn IdentifierProvider> {
    match &host.compatibility_identifier {
        Some(value) => {
            tracing::info!("using compatibility identifier from config");
            Box::new(StaticIdentifierProvider::new(value.as_str()))
        }
        None => Box::new(DefaultsIdentifierProvider::new(
            &host.app_bundle,
            host.identifier_key.as_str(),
        )),
    }
}

fn banner(language: &str) -> String {
    let title = format!("{language} syntax support for Xcode");
    let version = format!("v{}", env!("CARGO_PKG_VERSION"));
    format!(
        r"
    _______________________________
   /\                              \
   \_| {title:<28}|
     | {version:<28}|
     |   __________________________|_
     \_/____________________________/

"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_installs() {
        assert!(matches!(parse_args(["xcinstall"]), Invocation::Run(None)));
    }

    #[test]
    fn uninstall_argument_uninstalls() {
        assert!(matches!(
            parse_args(["xcinstall", "uninstall"]),
            Invocation::Run(Some(Command::Uninstall))
        ));
    }

    #[test]
    fn other_arguments_print_usage() {
        for args in [
            vec!["xcinstall", "install"],
            vec!["xcinstall", "uninstall", "now"],
            vec!["xcinstall", "--force"],
        ] {
            assert!(
                matches!(parse_args(args.clone()), Invocation::Usage),
                "{args:?} should print usage"
            );
        }
    }

    #[test]
    fn help_subcommand_prints_usage() {
        assert!(matches!(
            parse_args(["xcinstall", "help"]),
            Invocation::Usage
        ));
    }

    #[test]
    fn banner_names_language() {
        let text = banner("Go");
        assert!(text.contains("| Go syntax support for Xcode |"));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn help_is_left_to_clap() {
        match parse_args(["xcinstall", "--help"]) {
            Invocation::Clap(err) => assert_eq!(err.kind(), ErrorKind::DisplayHelp),
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    #[test]
    fn configured_identifier_skips_defaults() {
        let host = HostConfig {
            compatibility_identifier: Some("ABC-123".into()),
            ..HostConfig::default()
        };

        let id = identifier_provider(&host)
            .fetch_current_identifier()
            .expect("static identifier");
        assert_eq!(id.as_str(), "ABC-123");
    }

    #[test]
    fn notifier_follows_config() {
        let notifier = Notifier::from_config(&NotificationConfig {
            dialog: false,
            speak: true,
        });
        assert!(notifier.dialog.is_none());
        assert!(notifier.speech.is_some());
        assert!(Notifier::default().dialog.is_some());
    }
}
