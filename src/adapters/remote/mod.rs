//! Remote extract sources
//!
//! - [`FtpSource`] - primary DATASUS FTP server
//! - [`HttpMirrorSource`] - secondary HTTP mirror with the same tree

pub mod ftp;
pub mod mirror;
pub mod source;

pub use ftp::FtpSource;
pub use mirror::HttpMirrorSource;
pub use source::{classify_message, RemoteLayout, RemoteSource};
