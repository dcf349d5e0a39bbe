//! Test partitions handed to `cargo nextest run --partition`
//!
//! Partitions are 1-based `i/N`. nextest does the assignment: `count` deals
//! tests out round-robin, `hash` buckets each test by its name. Running every
//! `i` in `1..=N` of one mode runs each test exactly once.

use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How tests are assigned to partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionMode {
    Count,
    Hash,
}

impl PartitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Hash => "hash",
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionMode {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "hash" => Ok(Self::Hash),
            other => Err(KilnError::InvalidPartition(format!(
                "unknown partition mode '{}' (expected count or hash)",
                other
            ))),
        }
    }
}

/// One partition `index/total` of a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub mode: PartitionMode,
    /// 1-based
    pub index: u32,
    pub total: u32,
}

impl Partition {
    /// Validate and create a partition
    pub fn new(mode: PartitionMode, index: u32, total: u32) -> KilnResult<Self> {
        if total == 0 {
            return Err(KilnError::InvalidPartition(
                "partition count must be at least 1".to_string(),
            ));
        }
        if index == 0 || index > total {
            return Err(KilnError::InvalidPartition(format!(
                "partition {}/{} is out of range",
                index, total
            )));
        }
        Ok(Self { mode, index, total })
    }

    /// Every partition of a mode
    pub fn all(mode: PartitionMode, total: u32) -> KilnResult<Vec<Self>> {
        (1..=total.max(1))
            .map(|index| Self::new(mode, index, total))
            .collect()
    }

    /// Value of nextest's `--partition` argument
    pub fn arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.mode, self.index, self.total)
    }
}

impl FromStr for Partition {
    type Err = KilnError;

    /// Parse `mode:i/N`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KilnError::InvalidPartition(format!("expected mode:i/N, got '{}'", s));
        let (mode, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (index, total) = rest.split_once('/').ok_or_else(invalid)?;
        let index = index.parse().map_err(|_| invalid())?;
        let total = total.parse().map_err(|_| invalid())?;
        Self::new(mode.parse()?, index, total)
    }
}
