//! Destination store layout
//!
//! `{raw_base}/ano={YYYY}/uf={UF}/sistema={SIH|SIA}/{sih|sia}_{UF}_{YYYY}_{MM}.parquet`
//!
//! Presence of the artifact file is the only completion signal. The helper's
//! raw cache and the writer's in-progress file live next to it under names
//! that never match the artifact name.

use crate::domain::{IngestError, Result, Target};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DestinationStore {
    raw_base: PathBuf,
}

impl DestinationStore {
    pub fn new(raw_base: impl Into<PathBuf>) -> Self {
        Self {
            raw_base: raw_base.into(),
        }
    }

    pub fn raw_base(&self) -> &Path {
        &self.raw_base
    }

    /// Partition directory of a target
    pub fn partition_dir(&self, target: &Target) -> PathBuf {
        self.raw_base
            .join(format!("ano={}", target.year))
            .join(format!("uf={}", target.region))
            .join(format!("sistema={}", target.system.label()))
    }

    /// Final destination artifact
    pub fn artifact_path(&self, target: &Target) -> PathBuf {
        self.partition_dir(target).join(target.artifact_file_name())
    }

    /// In-progress output, renamed onto the artifact on success
    pub fn partial_path(&self, target: &Target) -> PathBuf {
        self.partition_dir(target)
            .join(format!("{}.partial", target.artifact_file_name()))
    }

    /// Raw cache produced by the external helper
    pub fn cache_path(&self, target: &Target) -> PathBuf {
        self.partition_dir(target)
            .join(format!(".download_{}", target.artifact_file_name()))
    }

    /// Whether the target has already been acquired
    pub fn exists(&self, target: &Target) -> bool {
        self.artifact_path(target).is_file()
    }

    /// Creates the partition directory and returns it
    pub fn ensure_partition(&self, target: &Target) -> Result<PathBuf> {
        let dir = self.partition_dir(target);
        std::fs::create_dir_all(&dir).map_err(|e| {
            IngestError::Storage(format!(
                "Failed to create partition directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_layout() {
        let store = DestinationStore::new("/data/raw");
        let target = Target::from_str("SIH-RD SP 2024 3").unwrap();
        assert_eq!(
            store.artifact_path(&target),
            PathBuf::from("/data/raw/ano=2024/uf=SP/sistema=SIH/sih_SP_2024_03.parquet")
        );
        assert_eq!(
            store.cache_path(&target),
            PathBuf::from("/data/raw/ano=2024/uf=SP/sistema=SIH/.download_sih_SP_2024_03.parquet")
        );
        assert_eq!(
            store.partial_path(&target),
            PathBuf::from("/data/raw/ano=2024/uf=SP/sistema=SIH/sih_SP_2024_03.parquet.partial")
        );
    }

    #[test]
    fn test_partial_and_cache_do_not_count_as_done() {
        let dir = tempfile::tempdir().unwrap();
        let store = DestinationStore::new(dir.path());
        let target = Target::from_str("SIA-PA MG 2022 10").unwrap();
        store.ensure_partition(&target).unwrap();

        std::fs::write(store.partial_path(&target), b"half").unwrap();
        std::fs::write(store.cache_path(&target), b"raw").unwrap();
        assert!(!store.exists(&target));

        std::fs::write(store.artifact_path(&target), b"done").unwrap();
        assert!(store.exists(&target));
    }
}
