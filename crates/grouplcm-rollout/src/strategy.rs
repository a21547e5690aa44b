//! Rollout strategies: all sites at once, or one site per batch.

use std::fmt;
use std::str::FromStr;

use crate::error::PlanError;

/// How a group's sites are split into rollout batches.
///
/// The set is closed: manifest keywords that map to neither variant are
/// rejected instead of falling back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RolloutStrategy {
    /// A single batch holding every site.
    AllAtOnce,
    /// One batch per site, in site order.
    OneAtATime,
}

impl RolloutStrategy {
    /// Canonical manifest keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            RolloutStrategy::AllAtOnce => "Parallel",
            RolloutStrategy::OneAtATime => "Serial",
        }
    }
}

impl FromStr for RolloutStrategy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Parallel" | "AllAtOnce" => Ok(RolloutStrategy::AllAtOnce),
            "Serial" | "Sequential" | "OneAtATime" => Ok(RolloutStrategy::OneAtATime),
            other => Err(PlanError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for RolloutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keywords() {
        assert_eq!("Parallel".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::AllAtOnce);
        assert_eq!("AllAtOnce".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::AllAtOnce);
        assert_eq!("Serial".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::OneAtATime);
        assert_eq!("Sequential".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::OneAtATime);
        assert_eq!("OneAtATime".parse::<RolloutStrategy>().unwrap(), RolloutStrategy::OneAtATime);
    }

    #[test]
    fn rejects_unknown_instead_of_defaulting() {
        for bad in ["", "parallel", "Canary", "Rolling"] {
            let err = bad.parse::<RolloutStrategy>().unwrap_err();
            assert!(matches!(err, PlanError::UnknownStrategy(ref s) if s == bad));
        }
    }

    #[test]
    fn keyword_roundtrip() {
        for s in [RolloutStrategy::AllAtOnce, RolloutStrategy::OneAtATime] {
            assert_eq!(s.keyword().parse::<RolloutStrategy>().unwrap(), s);
        }
    }
}
