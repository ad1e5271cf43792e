use std::{borrow::Borrow, fmt, str::FromStr};

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::{Result, Status};

/// `YYYY.MM.DD HH:MM:SS`, every field zero-padded.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

const SNAPSHOT_ID_LEN: usize = 19;

/// Snapshot identifier derived from the database server's clock.
///
/// Fixed-width zero-padded fields make the derived (string) ordering equal to
/// chronological ordering, which is what keeps the registry time-ordered.
/// Sub-second precision is dropped, so two captures within the same second
/// share an id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn from_instant(instant: NaiveDateTime) -> Result<Self> {
        let year = instant.year();
        if !(0..=9999).contains(&year) {
            return Err(Status::invalid_argument(format!(
                "server instant year {year} does not fit a four-digit snapshot id"
            )));
        }
        Ok(SnapshotId(instant.format(SNAPSHOT_ID_FORMAT).to_string()))
    }

    /// Parse an id, accepting only the exact canonical text.
    pub fn parse(text: &str) -> Result<Self> {
        if text.len() != SNAPSHOT_ID_LEN {
            return Err(invalid_id(text));
        }
        let instant =
            NaiveDateTime::parse_from_str(text, SNAPSHOT_ID_FORMAT).map_err(|_| invalid_id(text))?;
        let id = SnapshotId::from_instant(instant)?;
        // chrono accepts unpadded fields; reject anything that is not canonical.
        if id.0 != text {
            return Err(invalid_id(text));
        }
        Ok(id)
    }

    pub fn instant(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, SNAPSHOT_ID_FORMAT).map_err(|_| invalid_id(&self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system friendly form: `2024.03.07_09-05-03`.
    pub fn file_stem(&self) -> String {
        self.0.replace(' ', "_").replace(':', "-")
    }
}

fn invalid_id(text: &str) -> Status {
    Status::invalid_argument(format!(
        "snapshot id {text:?} is not of the form YYYY.MM.DD HH:MM:SS"
    ))
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = Status;

    fn from_str(s: &str) -> Result<Self> {
        SnapshotId::parse(s)
    }
}

impl Borrow<str> for SnapshotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SnapshotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        SnapshotId::parse(&text).map_err(serde::de::Error::custom)
    }
}
