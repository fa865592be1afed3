//! Server version parsing and comparison.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// First server release that supports project branches.
pub const MIN_FOR_BRANCHING: &[u32] = &[2022, 4, 3];

/// A dotted server version such as `2023.8.1`.
///
/// Comparison is component-wise with missing trailing components treated as
/// zero, so `2023.8` == `2023.8.0` < `2023.8.1`.
#[derive(Debug, Clone)]
pub struct ServerVersion {
    parts: Vec<u32>,
}

impl ServerVersion {
    pub fn new(parts: impl Into<Vec<u32>>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    /// Minimum version required for branch-related endpoints.
    pub fn min_for_branching() -> Self {
        Self::new(MIN_FOR_BRANCHING)
    }

    pub fn supports_branching(&self) -> bool {
        *self >= Self::min_for_branching()
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl FromStr for ServerVersion {
    type Err = String;

    /// Parse the leading numeric part of a version string.
    ///
    /// Build suffixes are ignored: `2023.8.1-beta+42` parses as `2023.8.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        let numeric: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let numeric = numeric.trim_end_matches('.');

        if numeric.is_empty() {
            return Err(format!("invalid server version: {:?}", s));
        }

        let parts = numeric
            .split('.')
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| format!("invalid server version: {:?}", s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", joined.join("."))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ServerVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ServerVersion {}
