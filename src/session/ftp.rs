use std::{
    io::{self, Write},
    net::ToSocketAddrs,
    thread,
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;
use log::{debug, warn};
use suppaftp::{types::FileType, FtpStream};

use super::RemoteSession;
use crate::{config::FetchConfig, errors::RbspDataErr};

/// An FTP session with the archive server.
///
/// The control connection and the data connection of a transfer have read and write timeouts.
/// A listing that does not finish within the I/O timeout is abandoned along with the session.
/// The session is closed with `QUIT` when `close` is called or, failing that, when it is
/// dropped.
pub struct FtpSession {
    stream: Option<FtpStream>,
    io_timeout: Duration,
}

impl FtpSession {
    /// Connect and log in.
    pub fn open(config: &FetchConfig) -> Result<Self, RbspDataErr> {
        let addr = (config.host(), config.port())
            .to_socket_addrs()
            .map_err(|err| RbspDataErr::Connection(format!("{}: {}", config.host(), err)))?
            .next()
            .ok_or_else(|| RbspDataErr::Connection(format!("{}: no address", config.host())))?;

        debug!("connecting to {} ({})", config.host(), addr);
        let mut stream = FtpStream::connect_timeout(addr, config.connect_timeout())
            .map_err(|err| RbspDataErr::Connection(format!("{}: {}", config.host(), err)))?;

        let socket = stream.get_ref();
        socket
            .set_read_timeout(Some(config.io_timeout()))
            .and_then(|_| socket.set_write_timeout(Some(config.io_timeout())))
            .map_err(|err| RbspDataErr::Connection(err.to_string()))?;

        if let Err(err) = stream.login(config.user(), config.password()) {
            quit_quietly(stream);
            return Err(RbspDataErr::Authentication(err.to_string()));
        }

        if let Err(err) = stream.transfer_type(FileType::Binary) {
            quit_quietly(stream);
            return Err(RbspDataErr::Connection(err.to_string()));
        }

        Ok(FtpSession {
            stream: Some(stream),
            io_timeout: config.io_timeout(),
        })
    }

    fn stream(&mut self) -> Result<&mut FtpStream, RbspDataErr> {
        self.stream
            .as_mut()
            .ok_or_else(|| RbspDataErr::Connection("session is closed".to_owned()))
    }
}

fn quit_quietly(mut stream: FtpStream) {
    if let Err(err) = stream.quit() {
        warn!("problem quitting: {}", err);
    }
}

impl RemoteSession for FtpSession {
    fn change_dir(&mut self, path: &str) -> Result<(), RbspDataErr> {
        self.stream()?
            .cwd(path)
            .map_err(|err| RbspDataErr::NotFound(format!("{}: {}", path, err)))
    }

    /// `NLST` reads its data connection inside suppaftp with no timeout, so the listing runs on
    /// its own thread and is given up on after the I/O timeout. The session is lost with it.
    fn list(&mut self, pattern: &str) -> Result<Vec<String>, RbspDataErr> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| RbspDataErr::Connection("session is closed".to_owned()))?;

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let owned_pattern = pattern.to_owned();
        thread::spawn(move || {
            let listing = stream.nlst(Some(owned_pattern.as_str()));
            if sender.send((stream, listing)).is_err() {
                debug!("listing of {} finished after it was abandoned", owned_pattern);
            }
        });

        match receiver.recv_timeout(self.io_timeout) {
            Ok((stream, listing)) => {
                self.stream = Some(stream);
                listing.map_err(|err| RbspDataErr::Transfer {
                    file_name: pattern.to_owned(),
                    reason: err.to_string(),
                })
            }
            Err(RecvTimeoutError::Timeout) => Err(RbspDataErr::Connection(format!(
                "listing {} timed out after {:?}",
                pattern, self.io_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(RbspDataErr::Connection(format!(
                "listing {} stopped without an answer",
                pattern
            ))),
        }
    }

    fn retrieve(&mut self, file_name: &str, dest: &mut dyn Write) -> Result<u64, RbspDataErr> {
        let transfer_err = |reason: String| RbspDataErr::Transfer {
            file_name: file_name.to_owned(),
            reason,
        };

        let io_timeout = self.io_timeout;
        let stream = self.stream()?;

        let mut data = stream
            .retr_as_stream(file_name)
            .map_err(|err| transfer_err(err.to_string()))?;

        let copied = data
            .get_ref()
            .set_read_timeout(Some(io_timeout))
            .and_then(|_| io::copy(&mut data, dest));

        // Closes the data connection and reads the transfer status from the server.
        let finished = stream.finalize_retr_stream(data);

        let num_bytes = copied.map_err(|err| transfer_err(err.to_string()))?;
        finished.map_err(|err| transfer_err(err.to_string()))?;

        Ok(num_bytes)
    }

    fn close(&mut self) -> Result<(), RbspDataErr> {
        match self.stream.take() {
            Some(mut stream) => stream
                .quit()
                .map_err(|err| RbspDataErr::Connection(format!("problem quitting: {}", err))),
            None => Ok(()),
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("{}", err);
        }
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
