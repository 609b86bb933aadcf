use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

/// Declared `min-max` count of images or texts a template accepts.
///
/// `0-0` doubles as "not fetched yet" and "no constraint"; the wire format
/// has no way to tell those apart from a genuine zero-only range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const UNSET: CountRange = CountRange { min: 0, max: 0 };

    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn is_unset(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// True when `count` satisfies the range. An unset range accepts anything.
    pub fn contains(&self, count: usize) -> bool {
        if self.is_unset() {
            return true;
        }
        count >= self.min as usize && count <= self.max as usize
    }
}

impl fmt::Display for CountRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Serialized in the wire's `"min-max"` form.
impl Serialize for CountRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn range_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+)-(\d+)").ok())
        .as_ref()
}

/// Parses the first `digits-digits` run in `raw`. Missing or malformed input
/// yields `0-0`.
pub fn parse_range(raw: Option<&str>) -> CountRange {
    let Some(captures) = raw.zip(range_pattern()).and_then(|(raw, re)| re.captures(raw)) else {
        return CountRange::UNSET;
    };
    let (Ok(min), Ok(max)) = (captures[1].parse(), captures[2].parse()) else {
        return CountRange::UNSET;
    };
    CountRange { min, max }
}
