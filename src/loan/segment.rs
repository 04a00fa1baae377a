//! Rate segments: principal ranges that each carry one nominal rate

use serde::{Deserialize, Serialize};

/// Upper end of a segment
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum UpperLimit {
    Bounded(f64),
    #[default]
    Unbounded,
}

impl UpperLimit {
    pub fn is_unbounded(self) -> bool {
        matches!(self, UpperLimit::Unbounded)
    }

    /// The bound, or `fallback` when there is none
    pub fn value_or(self, fallback: f64) -> f64 {
        match self {
            UpperLimit::Bounded(value) => value,
            UpperLimit::Unbounded => fallback,
        }
    }

    /// `amount <= limit`
    pub fn admits(self, amount: f64) -> bool {
        match self {
            UpperLimit::Bounded(value) => amount <= value,
            UpperLimit::Unbounded => true,
        }
    }
}

impl From<Option<f64>> for UpperLimit {
    fn from(value: Option<f64>) -> Self {
        value.map_or(UpperLimit::Unbounded, UpperLimit::Bounded)
    }
}

impl From<UpperLimit> for Option<f64> {
    fn from(limit: UpperLimit) -> Self {
        match limit {
            UpperLimit::Bounded(value) => Some(value),
            UpperLimit::Unbounded => None,
        }
    }
}

/// A principal range with its own nominal annual rate and periodic fee
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSegment {
    #[serde(default)]
    pub lower_limit: f64,

    #[serde(default)]
    pub upper_limit: UpperLimit,

    #[serde(default)]
    pub periodic_fee: f64,

    /// Nominal annual rate in percent
    pub annual_interest: f64,
}

impl RateSegment {
    /// Unbounded segment starting at zero
    pub fn flat(annual_interest: f64, periodic_fee: f64) -> Self {
        Self {
            lower_limit: 0.0,
            upper_limit: UpperLimit::Unbounded,
            periodic_fee,
            annual_interest,
        }
    }

    pub fn bounded(annual_interest: f64, periodic_fee: f64, lower: f64, upper: f64) -> Self {
        Self {
            lower_limit: lower,
            upper_limit: UpperLimit::Bounded(upper),
            periodic_fee,
            annual_interest,
        }
    }

    /// `lower <= amount <= upper`
    pub fn spans(&self, amount: f64) -> bool {
        amount >= self.lower_limit && self.upper_limit.admits(amount)
    }

    /// Interest for one period on `amount`
    pub fn periodic_interest(&self, amount: f64, rate_divisor: f64) -> f64 {
        amount * self.annual_interest / rate_divisor
    }
}

/// Close gaps between consecutive segments.
///
/// Each segment's upper limit becomes the next segment's lower limit, except
/// that an unbounded segment followed by a zero lower limit keeps no bound.
pub fn close_gaps(segments: &mut [RateSegment]) {
    for i in 1..segments.len() {
        let next_lower = segments[i].lower_limit;
        let prev = &mut segments[i - 1];
        if !prev.upper_limit.is_unbounded() || next_lower != 0.0 {
            prev.upper_limit = UpperLimit::Bounded(next_lower);
        }
    }
}

/// Segments as the amortization sees them once the balloon is set aside.
///
/// Only segments reaching above the balloon survive. Their limits move down
/// by the balloon amount, clamped at zero.
pub fn net_of_balloon(segments: &[RateSegment], balloon: f64) -> Vec<RateSegment> {
    if balloon <= 0.0 {
        return segments.to_vec();
    }

    segments
        .iter()
        .filter(|segment| match segment.upper_limit {
            UpperLimit::Bounded(upper) => upper > balloon,
            UpperLimit::Unbounded => true,
        })
        .map(|segment| RateSegment {
            lower_limit: (segment.lower_limit - balloon).max(0.0),
            upper_limit: match segment.upper_limit {
                UpperLimit::Bounded(upper) => UpperLimit::Bounded(upper - balloon),
                UpperLimit::Unbounded => UpperLimit::Unbounded,
            },
            ..*segment
        })
        .collect()
}

/// Interest per period on the balloon when segments accrue concurrently.
///
/// Every segment that the balloon reaches into contributes the part of the
/// balloon it covers at its own rate.
pub fn concurrent_balloon_interest(
    segments: &[RateSegment],
    balloon: f64,
    rate_divisor: f64,
) -> f64 {
    segments
        .iter()
        .filter(|segment| balloon > segment.lower_limit || segment.lower_limit == 0.0)
        .map(|segment| {
            let high = segment.upper_limit.value_or(balloon);
            let covered = high.min(balloon) - segment.lower_limit;
            segment.periodic_interest(covered, rate_divisor)
        })
        .sum()
}
