//! Source acquisition
//!
//! Downloads one target: up to `max_attempts` tries against the primary with
//! backoff between them, then a single try against the secondary mirror.
//! A not-found from the primary stops its retries at once.
//!
//! The destination path is populated only when `fetch` returns `Ok`.

pub mod backoff;

pub use backoff::BackoffPolicy;

use crate::adapters::remote::RemoteSource;
use crate::domain::{Failure, FailureKind, Stage, Target};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    /// Endpoint that delivered the file
    pub endpoint: String,
    pub bytes: u64,
    /// SHA-256 of the raw extract, if it could be computed
    pub sha256: Option<String>,
}

pub struct SourceAcquisition {
    primary: Arc<dyn RemoteSource>,
    secondary: Option<Arc<dyn RemoteSource>>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl SourceAcquisition {
    pub fn new(
        primary: Arc<dyn RemoteSource>,
        secondary: Option<Arc<dyn RemoteSource>>,
        max_attempts: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            primary,
            secondary,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Fetch `target` into `dest`
    pub async fn fetch(&self, target: &Target, dest: &Path) -> Result<Acquired, Failure> {
        let primary_name = self.primary.name().to_string();
        let mut last_failure: Option<Failure> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.backoff.delay(attempt);
                crate::log_retry_backoff!(attempt, delay);
                tokio::time::sleep(delay).await;
            }

            match attempt_endpoint(self.primary.as_ref(), target, dest).await {
                Ok(acquired) => return Ok(acquired),
                Err(failure) => {
                    crate::log_attempt_failure!(
                        primary_name.as_str(),
                        attempt,
                        self.max_attempts,
                        &failure
                    );
                    let retryable = failure.kind.is_retryable();
                    last_failure = Some(failure);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let primary_failure = last_failure.unwrap_or_else(|| {
            Failure::download(FailureKind::Other, "primary was not attempted")
        });

        let Some(secondary) = &self.secondary else {
            return Err(Failure::download(
                primary_failure.kind,
                format!("primary ({primary_name}): {}", primary_failure.message),
            ));
        };

        let secondary_name = secondary.name().to_string();
        match attempt_endpoint(secondary.as_ref(), target, dest).await {
            Ok(acquired) => Ok(acquired),
            Err(secondary_failure) => {
                crate::log_attempt_failure!(secondary_name.as_str(), 1, 1, &secondary_failure);
                Err(combine(
                    &primary_name,
                    &primary_failure,
                    &secondary_name,
                    &secondary_failure,
                ))
            }
        }
    }
}

/// Final classification after both endpoints failed
///
/// Not-found wins if either endpoint reported it, then timeout, then the
/// secondary's own classification.
pub fn combine(
    primary_name: &str,
    primary: &Failure,
    secondary_name: &str,
    secondary: &Failure,
) -> Failure {
    let kinds = [primary.kind, secondary.kind];
    let kind = if kinds.contains(&FailureKind::NotFound) {
        FailureKind::NotFound
    } else if kinds.contains(&FailureKind::Timeout) {
        FailureKind::Timeout
    } else {
        secondary.kind
    };
    Failure::new(
        kind,
        Stage::Download,
        format!(
            "primary ({primary_name}): {} | secondary ({secondary_name}): {}",
            primary.message, secondary.message
        ),
    )
}

/// One download through `source`; `dest` is removed on any failure
async fn attempt_endpoint(
    source: &dyn RemoteSource,
    target: &Target,
    dest: &Path,
) -> Result<Acquired, Failure> {
    let result = match source.download(target, dest).await {
        Ok(bytes) => finish(dest, source.name(), bytes).await,
        Err(failure) => Err(failure),
    };
    if result.is_err() {
        discard(dest).await;
    }
    result
}

async fn finish(dest: &Path, endpoint: &str, reported: u64) -> Result<Acquired, Failure> {
    let on_disk = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
    if reported == 0 || on_disk == 0 {
        return Err(Failure::download(
            FailureKind::EmptyResult,
            format!("{endpoint}: download returned 0 bytes"),
        ));
    }

    let sha256 = match sha256_file(dest.to_path_buf()).await {
        Ok(digest) => Some(digest),
        Err(e) => {
            tracing::warn!(error = %e, path = %dest.display(), "Could not checksum raw extract");
            None
        }
    };

    tracing::info!(endpoint, bytes = on_disk, "Raw extract downloaded");
    Ok(Acquired {
        endpoint: endpoint.to_string(),
        bytes: on_disk,
        sha256,
    })
}

async fn discard(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(error = %e, path = %dest.display(), "Could not remove partial download"),
    }
}

/// SHA-256 of a file, hex encoded
pub async fn sha256_file(path: PathBuf) -> std::io::Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Source that replays a script, then repeats its fallback outcome
    struct ScriptedSource {
        name: &'static str,
        script: Mutex<VecDeque<Result<&'static [u8], FailureKind>>>,
        fallback: Result<&'static [u8], FailureKind>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn always(name: &'static str, outcome: Result<&'static [u8], FailureKind>) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(VecDeque::new()),
                fallback: outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn scripted(
            name: &'static str,
            script: Vec<Result<&'static [u8], FailureKind>>,
            fallback: Result<&'static [u8], FailureKind>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteSource for ScriptedSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn download(&self, _target: &Target, dest: &Path) -> Result<u64, Failure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback);
            match next {
                Ok(bytes) => {
                    tokio::fs::write(dest, bytes).await.unwrap();
                    Ok(bytes.len() as u64)
                }
                Err(kind) => {
                    // Leave a partial file behind to exercise cleanup
                    tokio::fs::write(dest, b"partial").await.unwrap();
                    Err(Failure::download(kind, format!("{} said {kind}", self.name)))
                }
            }
        }

        async fn probe(&self) -> Result<String, Failure> {
            Ok("ok".to_string())
        }
    }

    fn target() -> Target {
        Target::from_str("SIH-RD SP 2024 3").unwrap()
    }

    fn acquisition(
        primary: Arc<ScriptedSource>,
        secondary: Option<Arc<ScriptedSource>>,
    ) -> SourceAcquisition {
        SourceAcquisition::new(
            primary,
            secondary.map(|s| s as Arc<dyn RemoteSource>),
            3,
            BackoffPolicy::new(Duration::from_secs(60)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_fall_back_to_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raw.dbc");
        let primary = ScriptedSource::always("ftp", Err(FailureKind::Timeout));
        let secondary = ScriptedSource::always("mirror", Ok(b"payload"));

        let acquired = acquisition(primary.clone(), Some(secondary.clone()))
            .fetch(&target(), &dest)
            .await
            .unwrap();

        assert_eq!(primary.calls(), 3);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(acquired.endpoint, "mirror");
        assert!(std::fs::metadata(&dest).unwrap().len() > 0);
        assert_eq!(acquired.sha256.as_deref().map(str::len), Some(64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_primary_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raw.dbc");
        let primary = ScriptedSource::scripted(
            "ftp",
            vec![Err(FailureKind::Timeout), Err(FailureKind::Other)],
            Ok(b"payload"),
        );

        let start = tokio::time::Instant::now();
        acquisition(primary.clone(), None)
            .fetch(&target(), &dest)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // 2^2 + j and 2^3 + j, with j in [0, 1)
        assert!(elapsed >= Duration::from_secs(12));
        assert!(elapsed < Duration::from_secs(14));
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_skips_retries_and_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raw.dbc");
        let primary = ScriptedSource::always("ftp", Err(FailureKind::NotFound));
        let secondary = ScriptedSource::always("mirror", Err(FailureKind::NotFound));

        let start = tokio::time::Instant::now();
        let failure = acquisition(primary.clone(), Some(secondary.clone()))
            .fetch(&target(), &dest)
            .await
            .unwrap_err();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.contains("primary (ftp)"));
        assert!(failure.message.contains("secondary (mirror)"));
        assert!(!dest.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_download_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raw.dbc");
        let primary = ScriptedSource::always("ftp", Ok(b""));

        let failure = acquisition(primary.clone(), None)
            .fetch(&target(), &dest)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::EmptyResult);
        assert_eq!(primary.calls(), 3);
        assert!(!dest.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_fail_without_leaving_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("raw.dbc");
        let primary = ScriptedSource::always("ftp", Err(FailureKind::Other));
        let secondary = ScriptedSource::always("mirror", Err(FailureKind::Other));

        let failure = acquisition(primary, Some(secondary))
            .fetch(&target(), &dest)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Other);
        assert_eq!(failure.stage, Stage::Download);
        assert!(!dest.exists());
    }

    #[test]
    fn test_combine_prefers_not_found_then_timeout() {
        let nf = Failure::download(FailureKind::NotFound, "550");
        let to = Failure::download(FailureKind::Timeout, "slow");
        let other = Failure::download(FailureKind::Other, "reset");
        let empty = Failure::download(FailureKind::EmptyResult, "0 bytes");

        assert_eq!(combine("ftp", &to, "mirror", &nf).kind, FailureKind::NotFound);
        assert_eq!(combine("ftp", &nf, "mirror", &other).kind, FailureKind::NotFound);
        assert_eq!(combine("ftp", &to, "mirror", &other).kind, FailureKind::Timeout);
        assert_eq!(combine("ftp", &other, "mirror", &empty).kind, FailureKind::EmptyResult);
    }
}
