//! District crime volumes and their alert tiers.

use std::{fmt, fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::debug;
use serde::{Deserialize, Serialize};

/// Counts below this are `Low`.
pub const MEDIUM_THRESHOLD: u64 = 50;
/// Counts above this are `High`.
pub const HIGH_THRESHOLD: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CrimeTier {
    #[default]
    Low,
    Medium,
    High,
}

impl CrimeTier {
    pub fn from_count(count: u64) -> Self {
        if count < MEDIUM_THRESHOLD {
            Self::Low
        } else if count <= HIGH_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Traffic-light colour shown next to the tier.
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Low => "Green",
            Self::Medium => "Yellow",
            Self::High => "Red",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for CrimeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrimeRecord {
    pub region_name: String,
    pub total_crime_count: u64,
    pub tier: CrimeTier,
}

#[derive(Debug, Deserialize)]
struct CrimeRow {
    #[serde(rename = "registeration_circles")]
    region: String,
    #[serde(rename = "total_crime_against_women")]
    total: u64,
}

/// Region table with tiers computed at load time.
#[derive(Debug, Clone, Default)]
pub struct CrimeTable {
    records: Vec<CrimeRecord>,
    keys: Vec<String>,
}

impl CrimeTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open crime table {}", path.display()))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        debug!("loaded {} regions from {}", table.records.len(), path.display());
        Ok(table)
    }

    /// Parse CSV with `registeration_circles` and `total_crime_against_women`
    /// columns; any other column is ignored.
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<CrimeRow>().enumerate() {
            let row = row.with_context(|| format!("{source}: malformed row {}", idx + 2))?;
            records.push(CrimeRecord {
                region_name: row.region,
                total_crime_count: row.total,
                tier: CrimeTier::from_count(row.total),
            });
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<CrimeRecord>) -> Self {
        let keys = records
            .iter()
            .map(|r| r.region_name.to_lowercase())
            .collect();
        Self { records, keys }
    }

    /// First region whose name contains `query`, ignoring case.
    pub fn find(&self, query: &str) -> Option<&CrimeRecord> {
        let needle = query.to_lowercase();
        self.keys
            .iter()
            .position(|key| key.contains(&needle))
            .map(|idx| &self.records[idx])
    }

    /// Alert tier for a region; `Low` when nothing matches.
    pub fn alert_for_region(&self, query: &str) -> CrimeTier {
        match self.find(query) {
            Some(record) => record.tier,
            None => {
                debug!("no region matches '{query}', defaulting to Low");
                CrimeTier::Low
            }
        }
    }

    pub fn records(&self) -> &[CrimeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
