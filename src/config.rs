//! Settings for a retrieval request.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// A flag the caller can set from another thread to stop a request.
///
/// The request checks it before every blocking network call, so it stops within one call's
/// timeout of the flag being set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a flag that is not set.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Ask the request to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Connection and storage settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    host: String,
    port: u16,
    user: String,
    password: String,
    base_path: String,
    scratch_root: PathBuf,
    connect_timeout: Duration,
    io_timeout: Duration,
    cancel: CancelFlag,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            host: Self::DEFAULT_HOST.to_owned(),
            port: 21,
            user: "anonymous".to_owned(),
            password: "anonymous@".to_owned(),
            base_path: Self::DEFAULT_BASE_PATH.to_owned(),
            scratch_root: std::env::temp_dir().join("sat"),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(120),
            cancel: CancelFlag::new(),
        }
    }
}

impl FetchConfig {
    /// NASA GSFC CDAWeb.
    pub const DEFAULT_HOST: &'static str = "cdaweb.gsfc.nasa.gov";
    /// Root of the RBSP data on the server.
    pub const DEFAULT_BASE_PATH: &'static str = "/pub/data/rbsp";

    /// Use another server.
    pub fn with_host<T: AsRef<str>>(self, host: T, port: u16) -> Self {
        FetchConfig {
            host: host.as_ref().to_owned(),
            port,
            ..self
        }
    }

    /// Log in with these credentials instead of anonymously.
    pub fn with_login<T: AsRef<str>>(self, user: T, password: T) -> Self {
        FetchConfig {
            user: user.as_ref().to_owned(),
            password: password.as_ref().to_owned(),
            ..self
        }
    }

    /// Root of the RBSP tree on the server.
    pub fn with_base_path<T: AsRef<str>>(self, base_path: T) -> Self {
        FetchConfig {
            base_path: base_path.as_ref().to_owned(),
            ..self
        }
    }

    /// Where downloaded files are kept while they are read.
    pub fn with_scratch_root<P: AsRef<Path>>(self, scratch_root: P) -> Self {
        FetchConfig {
            scratch_root: scratch_root.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Time limits for connecting and for each network read or write.
    pub fn with_timeouts(self, connect_timeout: Duration, io_timeout: Duration) -> Self {
        FetchConfig {
            connect_timeout,
            io_timeout,
            ..self
        }
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel_flag(self, cancel: CancelFlag) -> Self {
        FetchConfig { cancel, ..self }
    }

    /// Get the host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the user name.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Get the password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Get the remote base path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Get the scratch directory.
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Get the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Get the network read/write timeout.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Get the cancellation flag.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();

        assert_eq!(config.host(), "cdaweb.gsfc.nasa.gov");
        assert_eq!(config.port(), 21);
        assert_eq!(config.user(), "anonymous");
        assert_eq!(config.base_path(), "/pub/data/rbsp");
        assert!(config.scratch_root().ends_with("sat"));
        assert!(!config.cancel_flag().is_cancelled());
    }

    #[test]
    fn test_builder_and_shared_cancel() {
        let cancel = CancelFlag::new();
        let config = FetchConfig::default()
            .with_host("localhost", 2121)
            .with_scratch_root("/tmp/rbsp-test")
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(2))
            .with_cancel_flag(cancel.clone());

        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 2121);
        assert_eq!(config.scratch_root(), Path::new("/tmp/rbsp-test"));
        assert_eq!(config.io_timeout(), Duration::from_secs(2));

        cancel.cancel();
        assert!(config.cancel_flag().is_cancelled());
    }
}
