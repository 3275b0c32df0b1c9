//! Per-system row inclusion filters and clinical-group classification
//!
//! Filters run on batches whose column names are already canonical.

use super::batch::RawBatch;
use crate::domain::System;
use regex::Regex;
use std::sync::OnceLock;

/// Diagnosis codes of interest (diabetes, vascular, trauma, amputation)
const ICD_ALLOWLIST: &str = r"^(E1[0-4]|I70|I73|I74|L97|M86|S78|S88|S98|T13\.6|T87|Z89|S72)";

/// SIH procedure prefix kept regardless of diagnosis
const SIH_PROCEDURE_PREFIX: &str = "0415";

pub const SIH_DIAGNOSIS: &str = "diag_princ";
pub const SIH_PROCEDURE: &str = "proc_rea";
pub const SIA_PROCEDURE: &str = "pa_proc_id";
pub const SIA_DIAGNOSIS: &str = "pa_cidpri";

fn allowlist() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ICD_ALLOWLIST).expect("valid diagnosis allowlist"))
}

fn icd_groups() -> &'static [(Regex, &'static str)] {
    static GROUPS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    GROUPS.get_or_init(|| {
        [
            (r"^E1[0-4]", "Diabetes"),
            (r"^(I70|I73|I74|L97)", "Vascular"),
            (r"^(S78|S88|S98|T13\.6|S72)", "Trauma"),
            (r"^(Z89|T87|M86)", "Pos-Amputacao"),
        ]
        .into_iter()
        .map(|(pattern, group)| (Regex::new(pattern).expect("valid group pattern"), group))
        .collect()
    })
}

fn normalized_code(code: Option<&str>) -> Option<String> {
    code.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty())
}

pub fn matches_allowlist(code: Option<&str>) -> bool {
    normalized_code(code)
        .map(|c| allowlist().is_match(&c))
        .unwrap_or(false)
}

/// Clinical group of a diagnosis code
pub fn icd_group(code: Option<&str>) -> &'static str {
    let Some(code) = normalized_code(code) else {
        return "Sem CID";
    };
    icd_groups()
        .iter()
        .find(|(re, _)| re.is_match(&code))
        .map(|(_, group)| *group)
        .unwrap_or("Outro")
}

/// Procedure code split into (group, subgroup), zero-padded to 10 digits
pub fn procedure_group(code: Option<&str>) -> (String, String) {
    let code = code.map(str::trim).unwrap_or("");
    let padded = format!("{code:0>10}");
    let group: String = padded.chars().take(2).collect();
    let subgroup: String = padded.chars().skip(2).take(2).collect();
    (group, subgroup)
}

fn sih_mask(batch: &RawBatch) -> Vec<bool> {
    let Some(diagnosis) = batch.column(SIH_DIAGNOSIS) else {
        return vec![false; batch.num_rows()];
    };
    let procedure = batch.column(SIH_PROCEDURE);

    diagnosis
        .iter()
        .enumerate()
        .map(|(row, diag)| {
            matches_allowlist(diag.as_deref())
                || procedure
                    .and_then(|p| p[row].as_deref())
                    .map(|p| p.trim().starts_with(SIH_PROCEDURE_PREFIX))
                    .unwrap_or(false)
        })
        .collect()
}

fn sia_mask(batch: &RawBatch) -> Vec<bool> {
    let Some(procedure) = batch.column(SIA_PROCEDURE) else {
        return vec![false; batch.num_rows()];
    };
    let diagnosis = batch.column(SIA_DIAGNOSIS);

    procedure
        .iter()
        .enumerate()
        .map(|(row, proc)| {
            let (group, subgroup) = procedure_group(proc.as_deref());
            let diag_ok = diagnosis
                .map(|d| matches_allowlist(d[row].as_deref()))
                .unwrap_or(false);
            (group == "03" && subgroup == "02" && diag_ok)
                || (group == "07" && (subgroup == "01" || subgroup == "02"))
        })
        .collect()
}

/// Inclusion mask for every row of the batch
pub fn inclusion_mask(system: System, batch: &RawBatch) -> Vec<bool> {
    match system {
        System::SihRd => sih_mask(batch),
        System::SiaPa => sia_mask(batch),
    }
}

/// Drops the rows that fail the system's inclusion filter
pub fn apply(system: System, batch: RawBatch) -> RawBatch {
    let mask = inclusion_mask(system, &batch);
    batch.retain_rows(&mask)
}
