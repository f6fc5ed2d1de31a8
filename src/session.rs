//! A session with the remote archive.

use std::io::Write;

use crate::errors::RbspDataErr;

mod ftp;

pub use self::ftp::FtpSession;

/// The operations the retrieval pipeline needs from a remote server.
///
/// Every call blocks. Implementations are expected to bound each call with a timeout.
pub trait RemoteSession {
    /// Move to a remote directory. A missing directory is `RbspDataErr::NotFound`.
    fn change_dir(&mut self, path: &str) -> Result<(), RbspDataErr>;

    /// List file names in the current directory matching a glob pattern such as `*20130101*`.
    ///
    /// No match is an empty list, not an error.
    fn list(&mut self, pattern: &str) -> Result<Vec<String>, RbspDataErr>;

    /// Download a file from the current directory into `dest`, returning the number of bytes.
    fn retrieve(&mut self, file_name: &str, dest: &mut dyn Write) -> Result<u64, RbspDataErr>;

    /// End the session. Calling it again does nothing.
    fn close(&mut self) -> Result<(), RbspDataErr>;
}
