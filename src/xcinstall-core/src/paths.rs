use crate::{APP_AUTHOR, APP_NAME, APP_QUALIFIER};
use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where the installer keeps its own configuration and logs.
#[derive(Debug, Clone)]
pub struct AppDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppDirs {
    pub fn discover() -> Result<Self, DirsError> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME)
            .ok_or(DirsError::MissingProjectDirs)?;
        let log_dir = dirs.data_dir().join("logs");
        Ok(Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
            log_dir,
        })
    }

    pub fn ensure_exists(&self) -> Result<(), DirsError> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|source| DirsError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Source and destination directories for one install or uninstall run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Directory holding the support files, normally beside the executable.
    pub source_dir: PathBuf,
    pub specifications_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub trash_dir: PathBuf,
}

impl InstallLayout {
    /// Standard Xcode locations under `home`.
    pub fn for_home(home: &Path, source_dir: impl Into<PathBuf>) -> Self {
        let xcode = home.join("Library").join("Developer").join("Xcode");
        Self {
            source_dir: source_dir.into(),
            specifications_dir: xcode.join("Specifications"),
            plugins_dir: xcode.join("Plug-ins"),
            trash_dir: home.join(".Trash"),
        }
    }

    /// Layout for the current user with support files beside the running
    /// executable.
    pub fn discover() -> Result<Self, DirsError> {
        let home = BaseDirs::new()
            .ok_or(DirsError::MissingHomeDir)?
            .home_dir()
            .to_path_buf();
        let exe = std::env::current_exe().map_err(DirsError::CurrentExe)?;
        let source_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| DirsError::NoExecutableDir { path: exe.clone() })?;
        Ok(Self::for_home(&home, source_dir))
    }
}

#[derive(Debug, Error)]
pub enum DirsError {
    #[error("unable to determine project directories for xcinstall")]
    MissingProjectDirs,
    #[error("unable to determine the home directory")]
    MissingHomeDir,
    #[error("could not find installer's path: {0}")]
    CurrentExe(std::io::Error),
    #[error("installer path {path} has no parent directory")]
    NoExecutableDir { path: PathBuf },
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_returns_dirs() {
        let dirs = AppDirs::discover().expect("should build dirs");
        assert!(dirs.log_dir().ends_with("logs"));
        assert!(dirs.log_dir().starts_with(dirs.data_dir()));
    }

    #[test]
    fn layout_uses_xcode_locations() {
        let layout = InstallLayout::for_home(Path::new("/Users/gopher"), "/opt/installer");
        assert_eq!(layout.source_dir, PathBuf::from("/opt/installer"));
        assert_eq!(
            layout.specifications_dir,
            PathBuf::from("/Users/gopher/Library/Developer/Xcode/Specifications")
        );
        assert_eq!(
            layout.plugins_dir,
            PathBuf::from("/Users/gopher/Library/Developer/Xcode/Plug-ins")
        );
        assert_eq!(layout.trash_dir, PathBuf::from("/Users/gopher/.Trash"));
    }
}
