//! Ban Duration Expressions
//!
//! Parses the compact duration syntax operators type when issuing a ban:
//! `-`-separated tokens, each a positive integer followed by one unit letter.
//!
//! ```text
//! UNIT   MEANS      SECONDS
//! ───────────────────────────
//!  Y     year       365 days
//!  M     month      30 days
//!  W     week       7 days
//!  D     day        86 400
//!  H     hour       3 600
//!  N     minute     60
//!  S     second     1
//! ```
//!
//! Letters are matched case-insensitively. `M` is always a month; minutes use
//! `N` so no letter carries two meanings. A lone `/` means the ban never
//! expires.
//!
//! # Example
//!
//! ```
//! use bansync_duration::{parse, Lifetime};
//!
//! let Lifetime::Limited(d) = parse("2D-3H").unwrap() else { panic!() };
//! assert_eq!((d.days, d.hours), (2, 3));
//! assert_eq!(d.display, "2 days and 3 hours");
//!
//! assert_eq!(parse("/").unwrap(), Lifetime::Permanent);
//! assert!(parse("5Z").is_err());
//! ```

mod error;
mod parsed;
mod unit;

pub use error::{ParseError, Result};
pub use parsed::{join_words, ParsedDuration};
pub use unit::Unit;

/// The literal that marks a permanent ban.
pub const PERMANENT: &str = "/";

/// Display string used for permanent bans.
pub const FOREVER: &str = "Forever";

/// Outcome of parsing a duration expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifetime {
    /// `/` - no expiry
    Permanent,
    /// A finite, non-zero duration
    Limited(ParsedDuration),
}

impl Lifetime {
    /// Human-readable form ("Forever" or the spelled-out duration).
    pub fn display(&self) -> &str {
        match self {
            Lifetime::Permanent => FOREVER,
            Lifetime::Limited(d) => &d.display,
        }
    }
}

/// Parse a duration expression.
///
/// Every unrecognized token is collected before failing, so the error names
/// all of them at once. Unknown keys are reported ahead of
/// [`ParseError::Overflow`]. Empty tokens (`"2D-"`) are ignored; an expression
/// with no tokens at all is [`ParseError::Empty`].
pub fn parse(expr: &str) -> Result<Lifetime> {
    let expr = expr.trim();
    if expr == PERMANENT {
        return Ok(Lifetime::Permanent);
    }

    let mut total: u64 = 0;
    let mut seen_token = false;
    let mut overflowed = false;
    let mut unknown = Vec::new();

    for token in expr.split('-').map(str::trim).filter(|t| !t.is_empty()) {
        seen_token = true;

        let split = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        let (digits, suffix) = token.split_at(split);

        if digits.is_empty() {
            unknown.push(token.to_string());
            continue;
        }

        let Some(unit) = Unit::from_key(suffix) else {
            let key = if suffix.is_empty() { token } else { suffix };
            unknown.push(key.to_string());
            continue;
        };

        let Ok(value) = digits.parse::<u64>() else {
            overflowed = true;
            continue;
        };
        if value == 0 {
            unknown.push(token.to_string());
            continue;
        }

        match value
            .checked_mul(unit.seconds())
            .and_then(|secs| total.checked_add(secs))
        {
            Some(sum) => total = sum,
            None => overflowed = true,
        }
    }

    if !unknown.is_empty() {
        return Err(ParseError::UnknownKeys(unknown));
    }
    if overflowed {
        return Err(ParseError::Overflow);
    }
    if !seen_token {
        return Err(ParseError::Empty);
    }

    Ok(Lifetime::Limited(ParsedDuration::from_seconds(total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(expr: &str) -> ParsedDuration {
        match parse(expr).unwrap() {
            Lifetime::Limited(d) => d,
            Lifetime::Permanent => panic!("{expr} parsed as permanent"),
        }
    }

    #[test]
    fn days_and_hours() {
        let d = limited("2D-3H");
        assert_eq!((d.days, d.hours, d.minutes, d.seconds), (2, 3, 0, 0));
        assert_eq!(d.display, "2 days and 3 hours");
    }

    #[test]
    fn permanent() {
        let lifetime = parse("/").unwrap();
        assert_eq!(lifetime, Lifetime::Permanent);
        assert_eq!(lifetime.display(), "Forever");
    }

    #[test]
    fn unknown_unit_is_reported() {
        let err = parse("5Z").unwrap_err();
        assert_eq!(err, ParseError::UnknownKeys(vec!["Z".into()]));
        assert_eq!(err.to_string(), "I don't have these keycode(s): Z");
    }

    #[test]
    fn all_unknown_units_are_collected() {
        let err = parse("5Z-2D-3Q").unwrap_err();
        assert_eq!(err.to_string(), "I don't have these keycode(s): Z and Q");
    }

    #[test]
    fn month_and_minute_are_distinct() {
        assert_eq!(limited("1M").days, 30);
        let d = limited("1N");
        assert_eq!((d.days, d.minutes), (0, 1));
    }

    #[test]
    fn larger_units_fold_into_days() {
        assert_eq!(limited("1Y").days, 365);
        assert_eq!(limited("2W-3D").days, 17);
    }

    #[test]
    fn lowercase_units() {
        assert_eq!(limited("2d-3h"), limited("2D-3H"));
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse(" - ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn zero_and_bare_tokens_are_unknown() {
        assert_eq!(
            parse("0D").unwrap_err(),
            ParseError::UnknownKeys(vec!["0D".into()])
        );
        assert_eq!(
            parse("D").unwrap_err(),
            ParseError::UnknownKeys(vec!["D".into()])
        );
    }

    #[test]
    fn slash_only_alone() {
        assert_eq!(
            parse("/-2D").unwrap_err(),
            ParseError::UnknownKeys(vec!["/".into()])
        );
    }

    #[test]
    fn multi_letter_suffix_is_unknown() {
        assert_eq!(
            parse("3HR").unwrap_err(),
            ParseError::UnknownKeys(vec!["HR".into()])
        );
        assert_eq!(
            parse("12").unwrap_err(),
            ParseError::UnknownKeys(vec!["12".into()])
        );
    }

    #[test]
    fn overflow() {
        assert_eq!(parse("99999999999999999999Y").unwrap_err(), ParseError::Overflow);
        assert_eq!(parse("584942417356Y").unwrap_err(), ParseError::Overflow);
    }

    #[test]
    fn unknown_units_win_over_overflow() {
        assert_eq!(
            parse("99999999999999999999Z").unwrap_err(),
            ParseError::UnknownKeys(vec!["Z".into()])
        );
        assert_eq!(
            parse("5Z-99999999999999999999D").unwrap_err(),
            ParseError::UnknownKeys(vec!["Z".into()])
        );
        assert_eq!(
            parse("99999999999999999999D-5Q").unwrap_err(),
            ParseError::UnknownKeys(vec!["Q".into()])
        );
    }

    #[test]
    fn carries_normalize() {
        let d = limited("90N");
        assert_eq!((d.hours, d.minutes), (1, 30));
        assert_eq!(d.display, "1 hour and 30 minutes");
    }
}
