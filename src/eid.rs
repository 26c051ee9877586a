use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

use crate::documents::ValidationError;

/// Identifier of an indexed point.
///
/// Generated from a ULID so ids sort by creation time, and rendered in
/// hyphenated UUID form because that is what the vector store accepts as a
/// point id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct PointId(String);

impl Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PointId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let groups: Vec<&str> = s.split('-').collect();
        let well_formed = groups.len() == 5
            && groups
                .iter()
                .zip([8, 4, 4, 4, 12])
                .all(|(group, len)| {
                    group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit())
                });

        if !well_formed {
            return Err(ValidationError::field("id", format!("malformed point id {s:?}")));
        }

        Ok(PointId(s))
    }
}

impl Deref for PointId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PointId> for String {
    fn from(fr: PointId) -> Self {
        fr.0
    }
}

impl PointId {
    #[inline]
    pub fn new() -> PointId {
        let raw = u128::from(rusty_ulid::Ulid::generate());
        PointId(format_uuid(raw))
    }
}

impl Default for PointId {
    fn default() -> Self {
        Self::new()
    }
}

fn format_uuid(raw: u128) -> String {
    let hex = format!("{raw:032x}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
