//! Police station reference table.

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SentinelError;
use crate::geo::Coordinate;

/// One registered station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityRecord {
    pub name: String,
    /// Contact number with separators removed.
    pub contact_number: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl FacilityRecord {
    /// Validated station position.
    pub fn coordinate(&self) -> Result<Coordinate, SentinelError> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
struct FacilityRow {
    #[serde(rename = "Police_station_name")]
    name: String,
    #[serde(rename = "phone_number", default)]
    phone_number: String,
    latitude: f64,
    longitude: f64,
}

/// Read-only table of stations in file order.
#[derive(Debug, Clone, Default)]
pub struct FacilityTable {
    records: Vec<FacilityRecord>,
    // Lower-cased names, parallel to `records`.
    keys: Vec<String>,
}

impl FacilityTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open facility table {}", path.display()))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        debug!(
            "loaded {} facilities from {}",
            table.records.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse CSV with `Police_station_name`, `phone_number`, `latitude` and
    /// `longitude` columns. `source` names the input in error messages.
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<FacilityRow>().enumerate() {
            // Header is line 1.
            let row = row.with_context(|| format!("{source}: malformed row {}", idx + 2))?;
            records.push(FacilityRecord {
                contact_number: normalize_contact(&row.phone_number),
                name: row.name,
                latitude: row.latitude,
                longitude: row.longitude,
            });
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<FacilityRecord>) -> Self {
        let keys = records.iter().map(|r| r.name.to_lowercase()).collect();
        Self { records, keys }
    }

    /// First station whose name contains `label`, ignoring case.
    ///
    /// The label is matched literally; an empty label matches the first row.
    pub fn lookup(&self, label: &str) -> Result<&FacilityRecord, SentinelError> {
        let needle = label.to_lowercase();
        self.keys
            .iter()
            .position(|key| key.contains(&needle))
            .map(|idx| &self.records[idx])
            .ok_or_else(|| SentinelError::FacilityNotFound(label.to_string()))
    }

    pub fn records(&self) -> &[FacilityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Strip separators (`-`, `.`, parentheses and whitespace) from a phone number.
pub fn normalize_contact(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '.' | '(' | ')') && !c.is_whitespace())
        .collect()
}
