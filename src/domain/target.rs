//! Acquisition targets
//!
//! A [`Target`] is one `(system, region, year, month)` extract. It is the key
//! used everywhere: failure log matching, destination paths, remote paths and
//! de-duplication in the resolver.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The 27 Brazilian federative units, in the order DATASUS publishes them
pub const ALL_REGIONS: [&str; 27] = [
    "AC", "AL", "AM", "AP", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB", "PE",
    "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
];

/// Source record family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum System {
    /// Hospital admissions (AIH reduced records)
    #[serde(rename = "SIH-RD", alias = "SIH")]
    SihRd,
    /// Outpatient production
    #[serde(rename = "SIA-PA", alias = "SIA")]
    SiaPa,
}

impl System {
    /// Both systems, in grid enumeration order
    pub const ALL: [System; 2] = [System::SihRd, System::SiaPa];

    /// Code used in logs and helper invocations (`SIH-RD`, `SIA-PA`)
    pub fn code(&self) -> &'static str {
        match self {
            System::SihRd => "SIH-RD",
            System::SiaPa => "SIA-PA",
        }
    }

    /// Partition label (`SIH`, `SIA`)
    pub fn label(&self) -> &'static str {
        match self {
            System::SihRd => "SIH",
            System::SiaPa => "SIA",
        }
    }

    /// Prefix of the remote file name (`RD`, `PA`)
    pub fn file_prefix(&self) -> &'static str {
        match self {
            System::SihRd => "RD",
            System::SiaPa => "PA",
        }
    }

    /// Remote directory family (`SIHSUS`, `SIASUS`)
    pub fn family(&self) -> &'static str {
        match self {
            System::SihRd => "SIHSUS",
            System::SiaPa => "SIASUS",
        }
    }

    /// Prefix of the destination artifact name (`sih`, `sia`)
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            System::SihRd => "sih",
            System::SiaPa => "sia",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for System {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIH-RD" | "SIH" => Ok(System::SihRd),
            "SIA-PA" | "SIA" => Ok(System::SiaPa),
            other => Err(format!(
                "Unknown system '{other}'. Must be one of: SIH-RD, SIA-PA"
            )),
        }
    }
}

impl Ord for System {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(other.code())
    }
}

impl PartialOrd for System {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Two-letter federative unit code, always upper-case
///
/// # Examples
///
/// ```
/// use datasus_ingest::domain::Region;
/// use std::str::FromStr;
///
/// let region = Region::from_str("sp").unwrap();
/// assert_eq!(region.as_str(), "SP");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Creates a region code, normalizing to upper-case
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into().trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(format!(
                "Invalid region code '{code}'. Expected two letters"
            ));
        }
        Ok(Self(code))
    }

    /// Returns the region code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All federative units
    pub fn all() -> Vec<Region> {
        ALL_REGIONS.iter().map(|r| Region(r.to_string())).collect()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Region {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// One unit of acquisition work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub system: System,
    pub region: Region,
    pub year: i32,
    pub month: u32,
}

impl Target {
    /// Creates a target, validating the month and year ranges
    pub fn new(system: System, region: Region, year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("Invalid month {month}. Must be between 1 and 12"));
        }
        if !(1000..=9999).contains(&year) {
            return Err(format!("Invalid year {year}. Must have four digits"));
        }
        Ok(Self {
            system,
            region,
            year,
            month,
        })
    }

    /// Canonical label, e.g. `SIH-RD SP 2024 03`
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Remote file name, e.g. `RDSP2403.dbc`
    pub fn remote_file_name(&self) -> String {
        format!(
            "{}{}{:02}{:02}.dbc",
            self.system.file_prefix(),
            self.region,
            self.year.rem_euclid(100),
            self.month
        )
    }

    /// Destination artifact file name, e.g. `sih_SP_2024_03.parquet`
    pub fn artifact_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{:02}.parquet",
            self.system.artifact_prefix(),
            self.region,
            self.year,
            self.month
        )
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:02}",
            self.system, self.region, self.year, self.month
        )
    }
}

impl FromStr for Target {
    type Err = String;

    /// Parses `{SYSTEM} {REGION} {YYYY} {M|MM}`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 4 {
            return Err(format!(
                "Invalid target '{s}'. Expected '<SYSTEM> <UF> <YYYY> <MM>'"
            ));
        }
        let system = System::from_str(parts[0])?;
        let region = Region::new(parts[1])?;
        let year = parts[2]
            .parse::<i32>()
            .map_err(|e| format!("Invalid year '{}': {e}", parts[2]))?;
        let month = parts[3]
            .parse::<u32>()
            .map_err(|e| format!("Invalid month '{}': {e}", parts[3]))?;
        Target::new(system, region, year, month)
    }
}

// Resolver order: region, year, month, system
impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.region
            .cmp(&other.region)
            .then(self.year.cmp(&other.year))
            .then(self.month.cmp(&other.month))
            .then(self.system.cmp(&other.system))
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
