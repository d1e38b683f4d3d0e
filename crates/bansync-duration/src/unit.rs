//! Unit letters.

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// A duration unit keyed by a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    /// All units, largest first.
    pub const ALL: [Unit; 7] = [
        Unit::Year,
        Unit::Month,
        Unit::Week,
        Unit::Day,
        Unit::Hour,
        Unit::Minute,
        Unit::Second,
    ];

    /// Look up a unit by its key. Exactly one letter, any case.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|u| u.letter().eq_ignore_ascii_case(&c))
    }

    /// The letter operators type for this unit.
    pub const fn letter(self) -> char {
        match self {
            Unit::Year => 'Y',
            Unit::Month => 'M',
            Unit::Week => 'W',
            Unit::Day => 'D',
            Unit::Hour => 'H',
            Unit::Minute => 'N',
            Unit::Second => 'S',
        }
    }

    /// Length of one unit in seconds. Years and months are fixed-length.
    pub const fn seconds(self) -> u64 {
        match self {
            Unit::Year => 365 * DAY,
            Unit::Month => 30 * DAY,
            Unit::Week => 7 * DAY,
            Unit::Day => DAY,
            Unit::Hour => HOUR,
            Unit::Minute => MINUTE,
            Unit::Second => 1,
        }
    }
}
