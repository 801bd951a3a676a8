//! Mapping from delay unit labels to scheduler time units

use crate::errors::UnknownUnit;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Duration unit understood by the queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis_per_unit(&self) -> u64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    /// Converts `amount` of this unit, saturating on overflow
    pub fn to_duration(&self, amount: u64) -> Duration {
        Duration::from_millis(amount.saturating_mul(self.millis_per_unit()))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeUnit::Milliseconds => "Milliseconds",
            TimeUnit::Seconds => "Seconds",
            TimeUnit::Minutes => "Minutes",
            TimeUnit::Hours => "Hours",
            TimeUnit::Days => "Days",
        };
        f.write_str(label)
    }
}

impl FromStr for TimeUnit {
    type Err = UnknownUnit;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim() {
            "Milliseconds" => Ok(TimeUnit::Milliseconds),
            "Seconds" => Ok(TimeUnit::Seconds),
            "Minutes" => Ok(TimeUnit::Minutes),
            "Hours" => Ok(TimeUnit::Hours),
            "Days" => Ok(TimeUnit::Days),
            _ => Err(UnknownUnit {
                label: label.to_string(),
            }),
        }
    }
}

/// Resolves canonical unit captions (see `DelayUnit::caption`) to [`TimeUnit`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeUnitResolver;

impl TimeUnitResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, label: &str) -> Result<TimeUnit, UnknownUnit> {
        label.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::DelayUnit;
    use std::collections::HashSet;

    #[test]
    fn test_canonical_labels_resolve_to_distinct_units() {
        let resolver = TimeUnitResolver::new();
        let units: HashSet<TimeUnit> = ["Milliseconds", "Seconds", "Minutes", "Hours", "Days"]
            .iter()
            .map(|label| resolver.resolve(label).unwrap())
            .collect();
        assert_eq!(units.len(), 5);
        assert_eq!(resolver.resolve("Seconds").unwrap(), TimeUnit::Seconds);
        assert_eq!(resolver.resolve("Seconds").unwrap(), resolver.resolve("Seconds").unwrap());
    }

    #[test]
    fn test_every_delay_unit_caption_resolves() {
        let resolver = TimeUnitResolver::new();
        for unit in [
            DelayUnit::Milliseconds,
            DelayUnit::Seconds,
            DelayUnit::Minutes,
            DelayUnit::Hours,
            DelayUnit::Days,
        ] {
            let resolved = resolver.resolve(unit.caption()).unwrap();
            assert_eq!(resolved.to_string(), unit.caption());
        }
    }

    #[test]
    fn test_unknown_label() {
        let resolver = TimeUnitResolver::new();
        let err = resolver.resolve("bogus").unwrap_err();
        assert_eq!(err.label, "bogus");
        assert!(resolver.resolve("seconds").is_err());
        assert!(resolver.resolve("").is_err());
    }

    #[test]
    fn test_to_duration() {
        assert_eq!(TimeUnit::Milliseconds.to_duration(500), Duration::from_millis(500));
        assert_eq!(TimeUnit::Seconds.to_duration(2), Duration::from_secs(2));
        assert_eq!(TimeUnit::Minutes.to_duration(3), Duration::from_secs(180));
        assert_eq!(TimeUnit::Hours.to_duration(1), Duration::from_secs(3600));
        assert_eq!(TimeUnit::Days.to_duration(1), Duration::from_secs(86_400));
        assert_eq!(
            TimeUnit::Days.to_duration(u64::MAX),
            Duration::from_millis(u64::MAX)
        );
    }
}
