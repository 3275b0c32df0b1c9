//! Helper diagnostic-stream handling
//!
//! Progress lines are echoed while the helper runs. On failure the captured
//! error stream is reduced to one short line for the failure log, skipping
//! lines that are purely informational.

/// Substrings (lower-case) of helper lines that carry no failure information
const INFORMATIONAL_MARKERS: &[&str] = &[
    "your local internet",
    "datasus ftp server",
    "seems to be ok",
    "seems to be up",
    "[etapa]",
    "[step]",
    "[chunk]",
    "baixando",
    "downloading",
    "modo único arquivo",
    "tentativa ",
    "attempt ",
    "ℹ",
    "connection seems",
    "server seems",
];

/// Substrings of helper lines worth echoing at info level
const PROGRESS_MARKERS: &[&str] = &["[ETAPA]", "[STEP]", "Concluído", "BAIXANDO", "DOWNLOADING"];

const MAX_DETAIL_CHARS: usize = 120;

pub fn is_progress_line(line: &str) -> bool {
    PROGRESS_MARKERS.iter().any(|m| line.contains(m))
}

fn is_informational(line: &str) -> bool {
    let lower = line.to_lowercase();
    INFORMATIONAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn truncate(line: &str) -> String {
    if line.chars().count() <= MAX_DETAIL_CHARS {
        return line.to_string();
    }
    let head: String = line.chars().take(MAX_DETAIL_CHARS - 3).collect();
    format!("{head}...")
}

/// One-line summary of a failed helper exit
///
/// `code` is `None` when the helper was terminated by a signal.
pub fn summarize_exit(code: Option<i32>, stderr_lines: &[String]) -> String {
    let base = match code {
        Some(code) => format!("helper exited with status {code}"),
        None => "helper terminated by signal".to_string(),
    };

    let detail = stderr_lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .find(|line| !is_informational(line));

    match detail {
        Some(line) => format!("{base}; {}", truncate(line)),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_summary_without_stderr() {
        assert_eq!(summarize_exit(Some(1), &[]), "helper exited with status 1");
        assert_eq!(summarize_exit(None, &[]), "helper terminated by signal");
    }

    #[test]
    fn test_summary_skips_informational_lines() {
        let stderr = lines(&[
            "",
            "ℹ Your local internet connection seems to be ok.",
            "[ETAPA] 1/3 baixando",
            "Error in read.dbc(file): cannot open file",
            "Execution halted",
        ]);
        assert_eq!(
            summarize_exit(Some(1), &stderr),
            "helper exited with status 1; Error in read.dbc(file): cannot open file"
        );
    }

    #[test]
    fn test_summary_all_informational() {
        let stderr = lines(&["DATASUS FTP server seems to be up", "Tentativa 2 de 3"]);
        assert_eq!(summarize_exit(Some(2), &stderr), "helper exited with status 2");
    }

    #[test]
    fn test_long_detail_is_truncated() {
        let long = "x".repeat(200);
        let summary = summarize_exit(Some(1), &[long]);
        let detail = summary.split("; ").nth(1).unwrap();
        assert_eq!(detail.chars().count(), 120);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let long = "ç".repeat(130);
        let out = truncate(&long);
        assert_eq!(out.chars().count(), 120);
    }

    #[test_case("[ETAPA] 2/3 convertendo", true ; "etapa")]
    #[test_case("Concluído em 3 min", true ; "concluido")]
    #[test_case("BAIXANDO RDSP2403.dbc", true ; "baixando")]
    #[test_case("[STEP] download", true ; "step")]
    #[test_case("Loading required package", false ; "noise")]
    fn test_progress_lines(line: &str, expected: bool) {
        assert_eq!(is_progress_line(line), expected);
    }
}
