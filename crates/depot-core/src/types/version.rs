//! Version parsing and ordering.
//!
//! Versions are free-form strings (`1.0`, `2.1.0-rc.1`, `3.0-SNAPSHOT`). They are
//! split into parts at separators and at every digit/letter boundary, and then
//! compared part by part with a few well-known qualifiers given special rank.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A parsed version string
#[derive(Debug, Clone)]
pub struct Version {
    source: String,
    parts: Vec<String>,
    /// Whether each part is made of digits only
    numeric: Vec<bool>,
}

/// Component status, ordered from least to most mature
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Integration,
    Milestone,
    #[default]
    Release,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status '{input}': expected integration, milestone or release")]
pub struct StatusError {
    pub input: String,
}

impl Version {
    /// Parse a version string. Parsing never fails; an empty string yields a
    /// version without parts.
    pub fn parse(input: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut current_is_digit = false;

        for ch in input.chars() {
            if matches!(ch, '.' | '-' | '_' | '+') {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                continue;
            }
            let is_digit = ch.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                parts.push(std::mem::take(&mut current));
            }
            current_is_digit = is_digit;
            current.push(ch);
        }
        if !current.is_empty() {
            parts.push(current);
        }

        let numeric = parts
            .iter()
            .map(|part| part.bytes().all(|b| b.is_ascii_digit()))
            .collect();

        Self {
            source: input.to_string(),
            parts,
            numeric,
        }
    }

    /// The original version string
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Version parts as split by the parser
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Whether each part is numeric. Numeric parts may be arbitrarily long.
    pub fn numeric_parts(&self) -> &[bool] {
        &self.numeric
    }

    /// Check if this version carries a non-numeric qualifier
    pub fn is_qualified(&self) -> bool {
        self.numeric.iter().any(|numeric| !numeric)
    }

    /// The leading numeric parts of this version (`1.2` for `1.2-rc1`)
    pub fn base_version(&self) -> Version {
        let count = self
            .numeric
            .iter()
            .take_while(|numeric| **numeric)
            .count();
        if count == self.parts.len() {
            return self.clone();
        }
        Version::parse(&self.parts[..count].join("."))
    }

    /// Check if the version string is empty
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Rank of qualifiers with a well-known meaning. Unknown qualifiers rank 0.
fn special_meaning(part: &str) -> Option<i32> {
    match part.to_ascii_lowercase().as_str() {
        "dev" => Some(-1),
        "rc" => Some(1),
        "snapshot" => Some(2),
        "final" => Some(3),
        "ga" => Some(4),
        "release" => Some(5),
        "sp" => Some(6),
        _ => None,
    }
}

/// Compare two digit strings by value without parsing them
fn compare_numeric(part1: &str, part2: &str) -> Ordering {
    let a = part1.trim_start_matches('0');
    let b = part2.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_parts(part1: &str, numeric1: bool, part2: &str, numeric2: bool) -> Ordering {
    if part1 == part2 {
        return Ordering::Equal;
    }
    match (numeric1, numeric2) {
        (true, true) => compare_numeric(part1, part2),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match (special_meaning(part1), special_meaning(part2)) {
            (None, None) => part1.cmp(part2),
            (sm1, sm2) => sm1.unwrap_or(0).cmp(&sm2.unwrap_or(0)),
        },
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let common = self.parts.len().min(other.parts.len());
        for i in 0..common {
            let ordering = compare_parts(
                &self.parts[i],
                self.numeric[i],
                &other.parts[i],
                other.numeric[i],
            );
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        // An extra numeric part makes a version greater (1.0.1 > 1.0),
        // an extra qualifier makes it smaller (1.0-rc < 1.0).
        match self.parts.len().cmp(&other.parts.len()) {
            Ordering::Greater => {
                if self.numeric[common] {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            },
            Ordering::Less => {
                if other.numeric[common] {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            },
            Ordering::Equal => Ordering::Equal,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl From<&str> for Version {
    fn from(input: &str) -> Self {
        Version::parse(input)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Ok(Version::parse(&source))
    }
}

/// Compare two version strings
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    Version::parse(left).cmp(&Version::parse(right))
}

impl FromStr for Status {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integration" => Ok(Status::Integration),
            "milestone" => Ok(Status::Milestone),
            "release" => Ok(Status::Release),
            other => Err(StatusError {
                input: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Integration => "integration",
            Status::Milestone => "milestone",
            Status::Release => "release",
        };
        f.write_str(name)
    }
}
