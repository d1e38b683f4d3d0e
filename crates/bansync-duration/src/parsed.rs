//! Normalized durations and their spelled-out form.

use std::time::Duration;

/// A finite duration broken into day/hour/minute/second components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDuration {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// e.g. "2 days and 3 hours"
    pub display: String,
}

impl ParsedDuration {
    /// Split a number of seconds into components (with carries applied).
    pub fn from_seconds(total: u64) -> Self {
        let days = total / 86_400;
        let hours = total % 86_400 / 3_600;
        let minutes = total % 3_600 / 60;
        let seconds = total % 60;

        let parts: Vec<String> = [
            (days, "day"),
            (hours, "hour"),
            (minutes, "minute"),
            (seconds, "second"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, word)| plural(n, word))
        .collect();

        Self {
            days,
            hours,
            minutes,
            seconds,
            display: join_words(&parts),
        }
    }

    /// Total length in seconds.
    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }

    pub fn as_std(&self) -> Duration {
        Duration::from_secs(self.total_seconds())
    }
}

fn plural(n: u64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Join items as "a", "a and b", "a, b and c".
pub fn join_words<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join() {
        assert_eq!(join_words::<&str>(&[]), "");
        assert_eq!(join_words(&["a"]), "a");
        assert_eq!(join_words(&["a", "b"]), "a and b");
        assert_eq!(join_words(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn singular_units() {
        let d = ParsedDuration::from_seconds(86_400 + 3_600 + 60 + 1);
        assert_eq!(d.display, "1 day, 1 hour, 1 minute and 1 second");
    }

    #[test]
    fn skips_zero_components() {
        let d = ParsedDuration::from_seconds(2 * 86_400 + 5);
        assert_eq!(d.display, "2 days and 5 seconds");
        assert_eq!(d.as_std(), Duration::from_secs(2 * 86_400 + 5));
    }
}
