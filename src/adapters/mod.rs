//! External system integrations for DataSUS Ingest.
//!
//! - [`remote`] - DATASUS FTP server and its HTTP mirror
//!
//! Sources implement [`remote::RemoteSource`] and report classified
//! [`Failure`](crate::domain::Failure)s, so the acquisition layer can be
//! tested against in-memory doubles.

pub mod remote;
