//! External helper process supervision
//!
//! The helper is spawned with `UF YEAR MONTH SYSTEM` appended to its
//! configured arguments and `DATASUS_CACHE_PATH` pointing at the cache file
//! it must produce. Both output streams are drained by reader tasks that
//! stamp a shared activity clock. The supervising loop wakes on the poll
//! interval, treats a non-empty cache file as activity, and kills the helper
//! when it goes quiet for too long or runs past the hard limit.

use super::stderr::{is_progress_line, summarize_exit};
use crate::config::FallbackConfig;
use crate::domain::{Failure, FailureKind, Target};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Environment variable carrying the cache path to the helper
pub const CACHE_PATH_ENV: &str = "DATASUS_CACHE_PATH";

/// Captured diagnostic lines kept per helper run
const MAX_CAPTURED_LINES: usize = 1_000;

const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub no_progress_timeout: Duration,
    pub hard_timeout: Duration,
    pub poll_interval: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &FallbackConfig) -> Self {
        Self {
            no_progress_timeout: Duration::from_secs(config.no_progress_timeout_secs),
            hard_timeout: Duration::from_secs(config.hard_timeout_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        }
    }
}

/// Last-activity timestamp shared between the reader tasks and the poll loop
#[derive(Clone)]
struct ActivityClock {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ActivityClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(now, Ordering::Relaxed);
    }

    fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last)
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

enum Termination {
    Exited(ExitStatus),
    Stalled,
    ExceededDuration,
}

/// Runs the external helper for one target and waits for its cache file
pub struct FallbackSupervisor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    settings: SupervisorSettings,
}

impl FallbackSupervisor {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: Option<PathBuf>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir,
            settings,
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.working_dir.clone(),
            SupervisorSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// First configured argument that names a script file which is absent
    fn missing_script(&self) -> Option<PathBuf> {
        let first = self.args.first()?;
        if first.starts_with('-') || !first.contains(std::path::MAIN_SEPARATOR) {
            return None;
        }
        let path = self.resolve(Path::new(first));
        (!path.exists()).then_some(path)
    }

    fn command(&self, target: &Target, cache_path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(target.region.as_str())
            .arg(target.year.to_string())
            .arg(target.month.to_string())
            .arg(target.system.code())
            .env(CACHE_PATH_ENV, cache_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }

    /// Run the helper until it exits, stalls, or exceeds the hard limit
    ///
    /// On success the cache file exists at `cache_path`. Every failure is
    /// reported with [`Stage::Fallback`](crate::domain::Stage::Fallback).
    pub async fn acquire(&self, target: &Target, cache_path: &Path) -> Result<(), Failure> {
        if let Some(script) = self.missing_script() {
            return Err(Failure::fallback(
                FailureKind::Other,
                format!("helper script not found: {}", script.display()),
            ));
        }
        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Failure::fallback(
                    FailureKind::Other,
                    format!("failed to create {}: {e}", parent.display()),
                )
            })?;
        }

        let mut child = self.command(target, cache_path).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Failure::fallback(
                    FailureKind::Other,
                    format!("helper program not found: {} (is it installed and on PATH?)", self.program),
                )
            } else {
                Failure::fallback(
                    FailureKind::Other,
                    format!("failed to start helper {}: {e}", self.program),
                )
            }
        })?;

        tracing::info!(
            target_label = %target,
            program = %self.program,
            cache = %cache_path.display(),
            "Started fallback helper"
        );

        let clock = ActivityClock::new();
        let stdout_reader = child
            .stdout
            .take()
            .map(|s| spawn_reader(s, clock.clone(), "stdout", false));
        let stderr_reader = child
            .stderr
            .take()
            .map(|s| spawn_reader(s, clock.clone(), "stderr", true));

        let termination = self.watch(&mut child, &clock, cache_path).await;

        if let Some(reader) = stdout_reader {
            join_reader(reader).await;
        }
        let stderr_lines = match stderr_reader {
            Some(reader) => join_reader(reader).await,
            None => Vec::new(),
        };

        let minutes = |d: Duration| d.as_secs() / 60;
        match termination? {
            Termination::Stalled => Err(Failure::fallback(
                FailureKind::Stalled,
                format!(
                    "helper produced no output or cache growth for {} min",
                    minutes(self.settings.no_progress_timeout)
                ),
            )),
            Termination::ExceededDuration => Err(Failure::fallback(
                FailureKind::ExceededDuration,
                format!(
                    "helper exceeded the {} min limit",
                    minutes(self.settings.hard_timeout)
                ),
            )),
            Termination::Exited(status) if !status.success() => Err(Failure::fallback(
                FailureKind::Other,
                summarize_exit(status.code(), &stderr_lines),
            )),
            Termination::Exited(_) => {
                if tokio::fs::metadata(cache_path).await.map(|m| m.is_file()).unwrap_or(false) {
                    tracing::info!(
                        target_label = %target,
                        elapsed_secs = clock.elapsed().as_secs(),
                        "Fallback helper produced cache"
                    );
                    Ok(())
                } else {
                    let name = cache_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| cache_path.display().to_string());
                    Err(Failure::fallback(
                        FailureKind::Other,
                        format!("helper finished without producing cache: {name}"),
                    ))
                }
            }
        }
    }

    async fn watch(
        &self,
        child: &mut Child,
        clock: &ActivityClock,
        cache_path: &Path,
    ) -> Result<Termination, Failure> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut reported_minutes = 0;

        loop {
            tokio::select! {
                status = child.wait() => {
                    return status.map(Termination::Exited).map_err(|e| {
                        Failure::fallback(FailureKind::Other, format!("failed to wait for helper: {e}"))
                    });
                }
                _ = ticker.tick() => {}
            }

            let cache_len = tokio::fs::metadata(cache_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            if cache_len > 0 {
                clock.touch();
            }

            let elapsed_minutes = clock.elapsed().as_secs() / 60;
            if elapsed_minutes > reported_minutes {
                reported_minutes = elapsed_minutes;
                tracing::info!(
                    elapsed_minutes,
                    cache_bytes = cache_len,
                    "Fallback helper still running"
                );
            }

            let termination = if clock.idle() > self.settings.no_progress_timeout {
                Termination::Stalled
            } else if clock.elapsed() > self.settings.hard_timeout {
                Termination::ExceededDuration
            } else {
                continue;
            };

            tracing::warn!(
                idle_secs = clock.idle().as_secs(),
                elapsed_secs = clock.elapsed().as_secs(),
                "Killing fallback helper"
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill fallback helper");
            }
            return Ok(termination);
        }
    }
}

fn spawn_reader<R>(
    stream: R,
    clock: ActivityClock,
    stream_name: &'static str,
    capture: bool,
) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut captured = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    clock.touch();
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if is_progress_line(line) {
                        tracing::info!(stream = stream_name, "{}", line);
                    } else {
                        tracing::trace!(stream = stream_name, "{}", line);
                    }
                    if capture && captured.len() < MAX_CAPTURED_LINES {
                        captured.push(line.to_string());
                    }
                }
                Err(e) => {
                    tracing::debug!(stream = stream_name, error = %e, "Helper stream read failed");
                    break;
                }
            }
        }
        captured
    })
}

/// Wait briefly for a reader to drain; abandon it otherwise
async fn join_reader(mut reader: JoinHandle<Vec<String>>) -> Vec<String> {
    match tokio::time::timeout(READER_JOIN_TIMEOUT, &mut reader).await {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Helper reader task failed");
            Vec::new()
        }
        Err(_) => {
            reader.abort();
            Vec::new()
        }
    }
}
