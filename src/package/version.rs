//! Version values for mods and the game.
//!
//! A version is a sequence of non-negative integer segments with an optional
//! trailing qualifier (`1.2.3`, `0.17`, `2.0.0-rc1`). Missing trailing
//! segments compare as zero, so `1.0` and `1.0.0` are equal.

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Game major.minor assumed for mods that do not declare `factorio_version`.
pub const DEFAULT_GAME_VERSION: &str = "0.12";

#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    qualifier: Option<String>,
}

impl Version {
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Truncate to `major.minor`, dropping any qualifier.
    ///
    /// Releases declare compatibility with exactly one major.minor, so game
    /// version checks always compare truncated values.
    pub fn major_minor(&self) -> Version {
        let segment = |i: usize| self.segments.get(i).copied().unwrap_or(0);
        Version {
            segments: vec![segment(0), segment(1)],
            qualifier: None,
        }
    }

    /// The fallback game version for mods without `factorio_version`.
    pub fn default_game_version() -> Version {
        Version {
            segments: vec![0, 12],
            qualifier: None,
        }
    }

    fn significant_segments(&self) -> &[u64] {
        let len = self
            .segments
            .iter()
            .rposition(|s| *s != 0)
            .map_or(0, |i| i + 1);
        &self.segments[..len]
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = match text.strip_prefix(['v', 'V']) {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => text,
        };

        let mut segments = Vec::new();
        let mut rest = text;
        loop {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if end == 0 {
                break;
            }
            let Ok(segment) = rest[..end].parse::<u64>() else {
                bail!("Invalid version {:?}: segment out of range", s);
            };
            segments.push(segment);
            rest = &rest[end..];

            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        if segments.is_empty() {
            bail!("Invalid version: {:?}", s);
        }

        let qualifier = rest.trim_start_matches(['-', '.', '+', '_']);
        if qualifier.chars().any(|c| c.is_whitespace()) {
            bail!("Invalid version: {:?}", s);
        }

        Ok(Version {
            segments,
            qualifier: (!qualifier.is_empty()).then(|| qualifier.to_string()),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        match &self.qualifier {
            Some(q) => write!(f, "{}-{}", joined, q),
            None => write!(f, "{}", joined),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        // A qualified version is a pre-release of the bare one.
        match (&self.qualifier, &other.qualifier) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
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

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_segments().hash(state);
        self.qualifier.hash(state);
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
