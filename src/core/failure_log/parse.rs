//! Retry-hint parsing
//!
//! Only the message field is inspected, and only the two failure tags are
//! recognized. Anything else (other tags, legacy free text, truncated lines)
//! is ignored, so new event shapes never break retry targeting.

use super::event::FIELD_SEPARATOR;
use crate::domain::{Region, System, Target};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

fn failure_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:PROCESSING ERROR|DEFINITIVE DOWNLOAD FAILURE):?\s+(SIH-RD|SIA-PA|SIH|SIA)\s+([A-Z]{2})\s+(\d{4})\s+(\d{1,2})(?:\D|$)",
        )
        .expect("failure line pattern is valid")
    })
}

/// Returns the message field of a log line, if the line has all four fields
pub fn message_field(line: &str) -> Option<&str> {
    let mut fields = line.splitn(4, FIELD_SEPARATOR);
    let _timestamp = fields.next()?;
    let _actor = fields.next()?;
    let _location = fields.next()?;
    fields.next()
}

/// Extracts the target of a failure-tagged line
pub fn parse_failure_line(line: &str) -> Option<Target> {
    let message = message_field(line)?;
    let caps = failure_pattern().captures(message)?;

    let system = System::from_str(&caps[1]).ok()?;
    let region = Region::new(&caps[2]).ok()?;
    let year = caps[3].parse::<i32>().ok()?;
    let month = caps[4].parse::<u32>().ok()?;
    Target::new(system, region, year, month).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn target(s: &str) -> Target {
        Target::from_str(s).unwrap()
    }

    #[test_case(
        "2025-01-01T00:00:00Z | scheduler | run | PROCESSING ERROR: SIH-RD SP 2024 03: no-match: x",
        Some("SIH-RD SP 2024 03") ; "canonical processing error"
    )]
    #[test_case(
        "2025-01-01T00:00:00Z | scheduler | run | DEFINITIVE DOWNLOAD FAILURE: SIA-PA AC 2022 11: timeout: slow",
        Some("SIA-PA AC 2022 11") ; "canonical download failure"
    )]
    #[test_case(
        "t | a | l | processing error: sih-rd sp 2024 3",
        Some("SIH-RD SP 2024 03") ; "case insensitive single digit month"
    )]
    #[test_case(
        "t | a | l | Definitive Download Failure SIA ba 2021 1: other",
        Some("SIA-PA BA 2021 01") ; "short system code without colon"
    )]
    #[test_case("t | a | l | SUCCEEDED: SIH-RD SP 2024 03: 10 rows", None ; "success tag ignored")]
    #[test_case("t | a | l | SKIPPED: SIH-RD SP 2024 03: 3 logged failures", None ; "skip tag ignored")]
    #[test_case("PROCESSING ERROR: SIH-RD SP 2024 03", None ; "missing fields")]
    #[test_case("t | a | l | PROCESSING ERROR: SIH-RD SP 2024 13", None ; "month out of range")]
    #[test_case("t | a | l | PROCESSING ERROR: SIH-RD SP 2024 123", None ; "three digit month")]
    #[test_case("t | a | l | note: PROCESSING ERROR: SIH-RD SP 2024 03", None ; "tag not at start")]
    fn test_parse_failure_line(line: &str, expected: Option<&str>) {
        assert_eq!(parse_failure_line(line), expected.map(target));
    }

    #[test]
    fn test_message_may_contain_separator() {
        let line = "t | a | l | DEFINITIVE DOWNLOAD FAILURE: SIH-RD RS 2025 02: timeout: primary (ftp): x | mirror (http): y";
        assert_eq!(
            message_field(line),
            Some("DEFINITIVE DOWNLOAD FAILURE: SIH-RD RS 2025 02: timeout: primary (ftp): x | mirror (http): y")
        );
        assert_eq!(parse_failure_line(line), Some(target("SIH-RD RS 2025 2")));
    }
}
