//! Remote source trait definition
//!
//! A [`RemoteSource`] fetches one raw extract to a local path. Implementations
//! classify their own failures; retry policy lives in
//! [`crate::core::acquisition`], not here.

use crate::domain::{Failure, FailureKind, Target};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// An endpoint able to download raw extracts
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Short endpoint name used in logs and compound messages (`ftp`, `mirror`)
    fn name(&self) -> &str;

    /// Download `target` into `dest`, returning the number of bytes written
    ///
    /// A zero-byte result is reported as [`FailureKind::EmptyResult`]. On
    /// failure `dest` may hold partial content; the caller removes it.
    async fn download(&self, target: &Target, dest: &Path) -> Result<u64, Failure>;

    /// Cheap reachability check used before a run
    async fn probe(&self) -> Result<String, Failure>;
}

/// Remote directory convention shared by the FTP server and its mirror
///
/// `{base_dir}/{family}/{window}/Dados/{prefix}{UF}{yy}{mm}.dbc`
#[derive(Debug, Clone)]
pub struct RemoteLayout {
    base_dir: String,
    window: String,
}

impl RemoteLayout {
    pub fn new(base_dir: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            window: window.into(),
        }
    }

    /// Absolute directory of the target's file on the FTP server
    pub fn remote_dir(&self, target: &Target) -> String {
        format!(
            "/{}/{}/{}/Dados",
            self.base_dir.trim_matches('/'),
            target.system.family(),
            self.window.trim_matches('/')
        )
    }

    /// Absolute path of the target's file on the FTP server
    pub fn remote_path(&self, target: &Target) -> String {
        format!("{}/{}", self.remote_dir(target), target.remote_file_name())
    }

    /// Path relative to the server root, as used by the mirror
    pub fn relative_path(&self, target: &Target) -> String {
        self.remote_path(target).trim_start_matches('/').to_string()
    }

    /// Base directory, relative to the server root
    pub fn base_dir(&self) -> &str {
        self.base_dir.trim_matches('/')
    }
}

fn not_found_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // A reply code only counts at the start of a line, in suppaftp's
        // `[550]` form, or right after a status keyword
        Regex::new(r"(?m)(?:^\s*|\[|\b(?:HTTP|STATUS|CODE|ERROR)[\s:]+)(?:550|404|410)\b")
            .expect("status code pattern is valid")
    })
}

/// Classifies a free-text error reported by a remote endpoint
pub fn classify_message(message: &str) -> FailureKind {
    let upper = message.to_uppercase();
    let not_found_phrases = [
        "FILE NOT FOUND",
        "NO SUCH FILE",
        "CANNOT FIND THE FILE",
        "ARQUIVO INEXISTENTE",
    ];
    if not_found_code_regex().is_match(&upper)
        || not_found_phrases.iter().any(|m| upper.contains(m))
    {
        return FailureKind::NotFound;
    }
    if upper.contains("TIMED OUT") || upper.contains("TIMEOUT") || upper.contains("ERRNO 60") {
        return FailureKind::Timeout;
    }
    if upper.contains("OUT OF MEMORY") || upper.contains("MEMORY ALLOCATION") {
        return FailureKind::ResourceExhausted;
    }
    FailureKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test]
    fn test_layout_paths() {
        let layout = RemoteLayout::new("/dissemin/publicos/", "200801_");
        let target = Target::from_str("SIA-PA AC 2025 12").unwrap();
        assert_eq!(
            layout.remote_dir(&target),
            "/dissemin/publicos/SIASUS/200801_/Dados"
        );
        assert_eq!(
            layout.remote_path(&target),
            "/dissemin/publicos/SIASUS/200801_/Dados/PAAC2512.dbc"
        );
        assert_eq!(
            layout.relative_path(&target),
            "dissemin/publicos/SIASUS/200801_/Dados/PAAC2512.dbc"
        );
    }

    #[test_case("550 Failed to open file.", FailureKind::NotFound ; "ftp 550")]
    #[test_case("Invalid response: [550] Can't open RDSP2403.dbc", FailureKind::NotFound ; "suppaftp 550")]
    #[test_case("HTTP 410 Gone", FailureKind::NotFound ; "http 410")]
    #[test_case("connection to 10.0.55.0:41000 reset", FailureKind::Other ; "digits in address")]
    #[test_case("reset after 550 bytes", FailureKind::Other ; "digits in byte count")]
    #[test_case("wrote 14040 bytes then broken pipe", FailureKind::Other ; "digits inside number")]
    #[test_case("HTTP status 404 Not Found", FailureKind::NotFound ; "http 404")]
    #[test_case("No such file or directory", FailureKind::NotFound ; "no such file")]
    #[test_case("operation timed out", FailureKind::Timeout ; "timed out")]
    #[test_case("Read timeout after 600s", FailureKind::Timeout ; "timeout word")]
    #[test_case("connection reset by peer", FailureKind::Other ; "other")]
    fn test_classify_message(message: &str, expected: FailureKind) {
        assert_eq!(classify_message(message), expected);
    }
}
