//! Install and uninstall orchestration.
//!
//! Every step is synchronous and the first fatal error aborts the run. The
//! only tolerated failures are per-file moves during uninstall.

use crate::identifier::{CompatibilityIdentifier, IdentifierError, IdentifierProvider};
use crate::paths::InstallLayout;
use crate::patcher::{MetadataPatcher, PatchError, PatchOutcome};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to find file {name}.\nPlease ensure it is in the same folder as this installer ({dir})")]
    MissingSupportFile { name: String, dir: PathBuf },
    #[error("could not create folder {path}: {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },
    #[error("could not copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// An installed artifact that could not be moved to the trash.
#[derive(Debug, Error)]
#[error("could not move file {path}: {source}")]
pub struct MoveFailure {
    pub path: PathBuf,
    pub source: io::Error,
}

/// Names of the files shipped beside the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportFiles {
    language: String,
}

impl SupportFiles {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn specification(&self) -> String {
        format!("{}.xclangspec", self.language)
    }

    pub fn plugin_bundle(&self) -> String {
        format!("{}.ideplugin", self.language)
    }

    pub fn names(&self) -> [String; 2] {
        [self.specification(), self.plugin_bundle()]
    }
}

#[derive(Debug)]
pub struct InstallReport {
    pub specification: PathBuf,
    pub plugin: PathBuf,
    pub metadata: PathBuf,
    pub identifier: CompatibilityIdentifier,
    pub outcome: PatchOutcome,
}

#[derive(Debug)]
pub struct UninstallReport {
    pub trash_folder: PathBuf,
    /// `(from, to)` for every artifact that was moved.
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub failures: Vec<MoveFailure>,
}

impl UninstallReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Installer {
    layout: InstallLayout,
    files: SupportFiles,
    patcher: MetadataPatcher,
}

impl Installer {
    pub fn new(layout: InstallLayout, files: SupportFiles, patcher: MetadataPatcher) -> Self {
        Self {
            layout,
            files,
            patcher,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn installed_specification(&self) -> PathBuf {
        self.layout
            .specifications_dir
            .join(self.files.specification())
    }

    pub fn installed_plugin(&self) -> PathBuf {
        self.layout.plugins_dir.join(self.files.plugin_bundle())
    }

    /// `Info.plist` of the installed plug-in bundle.
    pub fn metadata_path(&self) -> PathBuf {
        self.installed_plugin().join("Contents").join("Info.plist")
    }

    pub fn install(&self, provider: &dyn IdentifierProvider) -> Result<InstallReport, InstallError> {
        self.check_support_files()?;

        let specification = self.installed_specification();
        create_dir(&self.layout.specifications_dir)?;
        let source = self.layout.source_dir.join(self.files.specification());
        tracing::info!(from = %source.display(), to = %specification.display(), "copying language specification");
        fs::copy(&source, &specification).map_err(|source_err| InstallError::Copy {
            from: source.clone(),
            to: specification.clone(),
            source: source_err,
        })?;

        let plugin = self.installed_plugin();
        create_dir(&self.layout.plugins_dir)?;
        let source = self.layout.source_dir.join(self.files.plugin_bundle());
        tracing::info!(from = %source.display(), to = %plugin.display(), "copying plug-in bundle");
        copy_tree(&source, &plugin)?;

        let identifier = provider.fetch_current_identifier()?;
        tracing::info!(identifier = %identifier, "resolved Xcode compatibility identifier");

        let metadata = self.metadata_path();
        let outcome = self
            .patcher
            .ensure_identifier_present(&metadata, &identifier)?;

        Ok(InstallReport {
            specification,
            plugin,
            metadata,
            identifier,
            outcome,
        })
    }

    /// Move the installed artifacts into a fresh, timestamped trash folder.
    ///
    /// Only failing to create the trash folder is fatal; files that cannot
    /// be moved are reported and the remaining ones are still attempted.
    pub fn uninstall(&self) -> Result<UninstallReport, InstallError> {
        create_dir(&self.layout.trash_dir)?;
        let trash_folder = self
            .layout
            .trash_dir
            .join(trash_folder_name(Local::now().naive_local()));
        fs::create_dir(&trash_folder).map_err(|source| InstallError::DirectoryCreation {
            path: trash_folder.clone(),
            source,
        })?;

        let mut report = UninstallReport {
            trash_folder: trash_folder.clone(),
            moved: Vec::new(),
            failures: Vec::new(),
        };

        for path in [self.installed_plugin(), self.installed_specification()] {
            let Some(name) = path.file_name() else {
                continue;
            };
            let target = trash_folder.join(name);
            tracing::info!(from = %path.display(), to = %target.display(), "moving file to trash");
            match fs::rename(&path, &target) {
                Ok(()) => report.moved.push((path, target)),
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "could not move file");
                    report.failures.push(MoveFailure { path, source });
                }
            }
        }

        Ok(report)
    }

    fn check_support_files(&self) -> Result<(), InstallError> {
        for name in self.files.names() {
            let path = self.layout.source_dir.join(&name);
            if fs::metadata(&path).is_err() {
                return Err(InstallError::MissingSupportFile {
                    name,
                    dir: self.layout.source_dir.clone(),
                });
            }
        }
        Ok(())
    }
}

/// `Xcode Files - 2023-03-30 10:15:42.123`
pub fn trash_folder_name(now: NaiveDateTime) -> String {
    format!("Xcode Files - {}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
}

fn create_dir(path: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(path).map_err(|source| InstallError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    })
}

/// Recursive copy that merges into an existing destination, overwriting
/// files with the same relative path.
fn copy_tree(from: &Path, to: &Path) -> Result<(), InstallError> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| InstallError::Copy {
            from: e.path().unwrap_or(from).to_path_buf(),
            to: to.to_path_buf(),
            source: io::Error::from(e),
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(Path::new(""));
        let target = to.join(relative);
        let copy_err = |source: io::Error| InstallError::Copy {
            from: entry.path().to_path_buf(),
            to: target.clone(),
            source,
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(copy_err)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(copy_err)?;
        } else {
            fs::copy(entry.path(), &target).map_err(copy_err)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let link = fs::read_link(from)?;
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}
