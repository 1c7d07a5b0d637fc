use serde::Serialize;

use crate::gender::Gender;

/// Per-image tally of classified faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DemographicCount {
    pub male: u32,
    pub female: u32,
    pub total: u32,
}

impl DemographicCount {
    pub fn record(&mut self, gender: Gender) {
        match gender {
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
        }
        self.total = self.male + self.female;
    }
}

/// Result of counting faces in one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceCountOutcome {
    /// The detector returned no regions.
    NoFaces,
    Counted(DemographicCount),
}

impl FaceCountOutcome {
    pub fn count(&self) -> Option<&DemographicCount> {
        match self {
            Self::NoFaces => None,
            Self::Counted(count) => Some(count),
        }
    }
}

/// Tally genders. An empty sequence is `NoFaces`, never a zero count.
pub fn aggregate<I>(genders: I) -> FaceCountOutcome
where
    I: IntoIterator<Item = Gender>,
{
    let mut count = DemographicCount::default();
    for gender in genders {
        count.record(gender);
    }
    if count.total == 0 {
        FaceCountOutcome::NoFaces
    } else {
        FaceCountOutcome::Counted(count)
    }
}
