//! Managed media directories.
//!
//! clipyard owns the uploads and outputs directories under the data root.
//! Media deletion is restricted to those directories. All paths are made
//! absolute up front so that absolute paths registered by the media backend
//! compare correctly against a relative `root_dir`.

use crate::config::Config;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
    uploads: PathBuf,
    outputs: PathBuf,
}

impl DataPaths {
    /// Create a new DataPaths with the default layout under `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = absolute(root.as_ref());
        Self {
            uploads: root.join("uploads"),
            outputs: root.join("outputs"),
            root,
        }
    }

    /// Layout as described by the `[data]` config section
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: absolute(&config.data_dir()),
            uploads: absolute(&config.uploads_dir()),
            outputs: absolute(&config.outputs_dir()),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for uploaded media
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    /// Directory for media produced by jobs
    pub fn outputs_dir(&self) -> &Path {
        &self.outputs
    }

    /// Create all necessary directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.root, &self.uploads, &self.outputs] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Whether `path` lies inside the uploads or outputs directory.
    ///
    /// Relative paths resolve against the working directory. Paths
    /// containing `..` are never managed.
    pub fn is_managed(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return false;
        }
        let path = absolute(path);
        [&self.uploads, &self.outputs]
            .iter()
            .any(|dir| path.starts_with(dir) && path != dir.as_path())
    }

    /// Delete the backing file of a removed video, if it is ours.
    ///
    /// Returns whether a file was deleted. Missing files are not an error.
    pub fn remove_media(&self, path: impl AsRef<Path>) -> std::io::Result<bool> {
        let path = path.as_ref();
        if !self.is_managed(path) {
            warn!(
                path = %path.display(),
                uploads = %self.uploads.display(),
                outputs = %self.outputs.display(),
                "Refusing to delete media outside data directories"
            );
            return Ok(false);
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted media file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Join a relative path onto the working directory, dropping `.` components
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                warn!(error = %e, "Cannot resolve working directory");
                path.to_path_buf()
            }
        }
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_managed() {
        let paths = DataPaths::new("/data");
        assert!(paths.is_managed("/data/uploads/a.mp4"));
        assert!(paths.is_managed("/data/outputs/job/segment_001.mp4"));
        assert!(paths.is_managed("/data/./uploads/a.mp4"));
        assert!(!paths.is_managed("/data/uploads"));
        assert!(!paths.is_managed("/data/clipyard.db"));
        assert!(!paths.is_managed("/data/uploads/../clipyard.db"));
        assert!(!paths.is_managed("/etc/passwd"));
    }

    #[test]
    fn test_relative_root_matches_absolute_media_paths() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let paths = DataPaths::from_config(&Config::default());
        assert!(paths.root().is_absolute());

        let registered = cwd.join("data").join("uploads").join("clip.mp4");
        assert!(paths.is_managed(&registered));
        assert!(paths.is_managed("data/outputs/job/segment_001.mp4"));
        assert!(paths.is_managed("./data/uploads/clip.mp4"));
        assert!(!paths.is_managed(cwd.join("elsewhere").join("clip.mp4")));
        Ok(())
    }

    #[test]
    fn test_remove_media() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());
        paths.create_dirs()?;

        let file = paths.uploads_dir().join("v1_clip.mp4");
        std::fs::write(&file, b"not really a video")?;
        assert!(paths.remove_media(&file)?);
        assert!(!file.exists());
        assert!(!paths.remove_media(&file)?);

        let outside = temp_dir.path().join("keep.txt");
        std::fs::write(&outside, b"keep")?;
        assert!(!paths.remove_media(&outside)?);
        assert!(outside.exists());
        Ok(())
    }
}
