//! Primary FTP source
//!
//! suppaftp's synchronous client runs inside `spawn_blocking` and streams
//! RETR straight into the destination file. Every socket, control and data,
//! carries the download timeout as a read/write timeout, so a transfer only
//! fails when the server goes quiet, never for being slow, and the blocking
//! task always returns before the next attempt opens a new session.

use super::source::{classify_message, RemoteLayout, RemoteSource};
use crate::config::SourceConfig;
use crate::domain::{classify_io_error, Failure, FailureKind, Target};
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpResult, FtpStream, Mode};
use tracing::debug;

#[derive(Debug, Clone)]
struct FtpSettings {
    host: String,
    port: u16,
    user: String,
    password: String,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

/// Opens a socket whose reads and writes give up after `idle` of silence
fn open_socket(addr: SocketAddr, connect: Duration, idle: Duration) -> io::Result<TcpStream> {
    let socket = TcpStream::connect_timeout(&addr, connect)?;
    socket.set_read_timeout(Some(idle))?;
    socket.set_write_timeout(Some(idle))?;
    Ok(socket)
}

impl FtpSettings {
    fn connect(&self) -> Result<FtpStream, Failure> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| Failure::download(classify_io_error(&e), format!("resolve {}: {e}", self.host)))?
            .next()
            .ok_or_else(|| {
                Failure::download(FailureKind::Other, format!("no address for {}", self.host))
            })?;

        debug!(host = %self.host, port = self.port, "Connecting to FTP server");
        let control = open_socket(addr, self.connect_timeout, self.idle_timeout)
            .map_err(|e| ftp_failure(FtpError::ConnectionError(e)))?;

        let (connect, idle) = (self.connect_timeout, self.idle_timeout);
        let mut stream = FtpStream::connect_with_stream(control)
            .map_err(ftp_failure)?
            .passive_stream_builder(move |addr| -> FtpResult<TcpStream> {
                open_socket(addr, connect, idle).map_err(FtpError::ConnectionError)
            });
        stream.set_mode(Mode::Passive);
        stream
            .login(&self.user, &self.password)
            .map_err(ftp_failure)?;
        Ok(stream)
    }

    fn fetch(&self, remote_dir: &str, file_name: &str, dest: &Path) -> Result<u64, Failure> {
        let mut stream = self.connect()?;
        stream.cwd(remote_dir).map_err(ftp_failure)?;

        // Listing distinguishes "absent" from a transient RETR error. Some
        // servers refuse NLST, in which case RETR is attempted anyway.
        match stream.nlst(None) {
            Ok(listing) => {
                if !listing_contains(&listing, file_name) {
                    quit(&mut stream);
                    return Err(Failure::download(
                        FailureKind::NotFound,
                        format!("{file_name} not present in directory listing"),
                    ));
                }
            }
            Err(e) => debug!(error = %e, "NLST failed, attempting RETR anyway"),
        }

        stream
            .transfer_type(FileType::Binary)
            .map_err(ftp_failure)?;
        let mut data = stream.retr_as_stream(file_name).map_err(ftp_failure)?;
        let written = copy_to_file(&mut data, dest)?;
        stream.finalize_retr_stream(data).map_err(ftp_failure)?;
        quit(&mut stream);
        Ok(written)
    }

    fn probe(&self, base_dir: &str) -> Result<(), Failure> {
        let mut stream = self.connect()?;
        stream.cwd(base_dir).map_err(ftp_failure)?;
        quit(&mut stream);
        Ok(())
    }
}

fn copy_to_file(data: &mut impl io::Read, dest: &Path) -> Result<u64, Failure> {
    let transfer_failure = |e: io::Error| {
        Failure::download(
            classify_io_error(&e),
            format!("transfer into {} failed: {e}", dest.display()),
        )
    };
    let file = File::create(dest).map_err(transfer_failure)?;
    let mut writer = BufWriter::new(file);
    let written = io::copy(data, &mut writer).map_err(transfer_failure)?;
    writer.flush().map_err(transfer_failure)?;
    Ok(written)
}

fn quit(stream: &mut FtpStream) {
    if let Err(e) = stream.quit() {
        debug!(error = %e, "FTP session did not close cleanly");
    }
}

fn listing_contains(listing: &[String], file_name: &str) -> bool {
    listing.iter().any(|entry| {
        let name = entry.trim().rsplit('/').next().unwrap_or_default();
        name.eq_ignore_ascii_case(file_name)
    })
}

fn ftp_failure(err: FtpError) -> Failure {
    let kind = match &err {
        FtpError::ConnectionError(io) => match classify_io_error(io) {
            FailureKind::Other => classify_message(&io.to_string()),
            kind => kind,
        },
        other => classify_message(&other.to_string()),
    };
    Failure::download(kind, err.to_string())
}

/// DATASUS FTP server
pub struct FtpSource {
    settings: FtpSettings,
    layout: RemoteLayout,
}

impl FtpSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            settings: FtpSettings {
                host: config.ftp_host.clone(),
                port: config.ftp_port,
                user: config.ftp_user.clone(),
                password: config.ftp_password.clone(),
                connect_timeout: config.connect_timeout(),
                idle_timeout: config.download_timeout(),
            },
            layout: RemoteLayout::new(&config.base_dir, &config.window),
        }
    }

    async fn run_blocking<T, F>(&self, settings: FtpSettings, op: F) -> Result<T, Failure>
    where
        T: Send + 'static,
        F: FnOnce(FtpSettings) -> Result<T, Failure> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || op(settings))
            .await
            .unwrap_or_else(|join_err| {
                Err(Failure::download(
                    FailureKind::Other,
                    format!("FTP task failed: {join_err}"),
                ))
            })
    }
}

#[async_trait]
impl RemoteSource for FtpSource {
    fn name(&self) -> &str {
        "ftp"
    }

    async fn download(&self, target: &Target, dest: &Path) -> Result<u64, Failure> {
        let remote_dir = self.layout.remote_dir(target);
        let file_name = target.remote_file_name();
        let dest: PathBuf = dest.to_path_buf();
        debug!(remote = %self.layout.remote_path(target), "FTP download");

        let written = self
            .run_blocking(self.settings.clone(), move |settings| {
                settings.fetch(&remote_dir, &file_name, &dest)
            })
            .await?;

        if written == 0 {
            return Err(Failure::download(
                FailureKind::EmptyResult,
                "download returned 0 bytes",
            ));
        }
        Ok(written)
    }

    async fn probe(&self) -> Result<String, Failure> {
        let base_dir = format!("/{}", self.layout.base_dir());
        // A reachability check does not wait a full download timeout
        let settings = FtpSettings {
            idle_timeout: self.settings.connect_timeout,
            ..self.settings.clone()
        };
        self.run_blocking(settings, move |settings| settings.probe(&base_dir))
            .await?;
        Ok(format!("connected to FTP {}", self.settings.host))
    }
}
