//! Local storage for day-files while they are being read.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::errors::RbspDataErr;

/// The directory downloaded files are written to.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create the directory if it doesn't exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, RbspDataErr> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(RbspDataErr::Scratch)?;

        Ok(ScratchDir { root })
    }

    /// Get the path of the directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty scratch file named after a remote file. The file is deleted when the
    /// returned guard is dropped.
    ///
    /// Failure only affects this one file, so it comes back as `RbspDataErr::Transfer`.
    pub fn create_file(&self, remote_name: &str) -> Result<(ScratchFile, File), RbspDataErr> {
        let transfer_err = |reason: String| RbspDataErr::Transfer {
            file_name: remote_name.to_owned(),
            reason,
        };

        // Only the last component, a listing must not be able to write outside the directory.
        let local_name = Path::new(remote_name)
            .file_name()
            .ok_or_else(|| transfer_err("not a file name".to_owned()))?;

        let path = self.root.join(local_name);
        let file = File::create(&path).map_err(|err| {
            transfer_err(format!("unable to create {}: {}", path.display(), err))
        })?;

        Ok((ScratchFile { path }, file))
    }

    /// Remove any files left in the directory for a day, returning how many were removed.
    pub fn sweep_day(&self, day: NaiveDate) -> usize {
        let pattern = self
            .root
            .join(format!("*{}*", day.format("%Y%m%d")))
            .to_string_lossy()
            .into_owned();

        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(err) => {
                warn!("bad scratch pattern {}: {}", pattern, err);
                return 0;
            }
        };

        paths
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .filter(|path| match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!("swept {}", path.display());
                    true
                }
                Err(err) => {
                    warn!("unable to remove {}: {}", path.display(), err);
                    false
                }
            })
            .count()
    }
}

/// A downloaded file that is removed when this goes out of scope.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Get the local path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("unable to remove {}: {}", self.path.display(), err);
            }
        }
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
