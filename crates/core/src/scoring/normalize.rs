use serde::{Deserialize, Serialize};

use super::{invert_novelty, RateSignal};
use crate::domain::stats::ProductStats;

/// Observed range of one raw rate across the stats table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateBounds {
    pub min: f64,
    pub max: f64,
}

impl RateBounds {
    /// Bounds reported for an empty stats table.
    pub const EMPTY: RateBounds = RateBounds { min: 0.0, max: 1.0 };

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationBounds {
    pub order: RateBounds,
    pub favourite: RateBounds,
    pub novelty: RateBounds,
}

impl Default for PopulationBounds {
    fn default() -> Self {
        Self { order: RateBounds::EMPTY, favourite: RateBounds::EMPTY, novelty: RateBounds::EMPTY }
    }
}

impl PopulationBounds {
    pub fn observe<'a>(rows: impl IntoIterator<Item = &'a ProductStats>) -> Self {
        let mut rows = rows.into_iter();
        let Some(first) = rows.next() else {
            return Self::default();
        };

        let point = |value: f64| RateBounds { min: value, max: value };
        let widen = |bounds: &mut RateBounds, value: f64| {
            bounds.min = bounds.min.min(value);
            bounds.max = bounds.max.max(value);
        };

        let mut bounds = Self {
            order: point(first.order_rate),
            favourite: point(first.favourite_rate),
            novelty: point(first.novelty_rate),
        };
        for row in rows {
            widen(&mut bounds.order, row.order_rate);
            widen(&mut bounds.favourite, row.favourite_rate);
            widen(&mut bounds.novelty, row.novelty_rate);
        }
        bounds
    }

    pub fn for_signal(&self, signal: RateSignal) -> RateBounds {
        match signal {
            RateSignal::Order => self.order,
            RateSignal::Favourite => self.favourite,
            RateSignal::Novelty => self.novelty,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisorSource {
    /// `max - min`, the regular min-max case.
    Span,
    /// The range collapsed; the raw maximum is used instead.
    Max,
    /// Range and maximum are both zero.
    Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Divisor {
    pub value: f64,
    pub source: DivisorSource,
}

/// Never returns zero: a collapsed span falls back to `max`, then to `1`.
///
/// The fallback to `max` shrinks every value of a uniform positive
/// population to `0` rather than mapping it onto a fixed point. That is the
/// established ranking behavior and is kept; callers log when it kicks in.
pub fn fallback_divisor(span: f64, max: f64) -> Divisor {
    if span != 0.0 {
        Divisor { value: span, source: DivisorSource::Span }
    } else if max != 0.0 {
        Divisor { value: max, source: DivisorSource::Max }
    } else {
        Divisor { value: 1.0, source: DivisorSource::Unit }
    }
}

/// Offsets and divisors applied to every stats row in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub min_order_rate: f64,
    pub order_divisor: Divisor,
    pub min_favourite_rate: f64,
    pub favourite_divisor: Divisor,
    pub max_novelty_rate: f64,
    pub novelty_divisor: Divisor,
}

impl Normalization {
    pub fn from_bounds(bounds: &PopulationBounds) -> Self {
        let novelty_span =
            invert_novelty(bounds.novelty.min) - invert_novelty(bounds.novelty.max);

        Self {
            min_order_rate: bounds.order.min,
            order_divisor: fallback_divisor(bounds.order.span(), bounds.order.max),
            min_favourite_rate: bounds.favourite.min,
            favourite_divisor: fallback_divisor(bounds.favourite.span(), bounds.favourite.max),
            max_novelty_rate: bounds.novelty.max,
            novelty_divisor: fallback_divisor(novelty_span, bounds.novelty.max),
        }
    }

    pub fn order(&self, order_rate: f64) -> f64 {
        (order_rate - self.min_order_rate) / self.order_divisor.value
    }

    pub fn favourite(&self, favourite_rate: f64) -> f64 {
        (favourite_rate - self.min_favourite_rate) / self.favourite_divisor.value
    }

    /// Fresher products score higher, so novelty is measured from the stalest row.
    pub fn novelty(&self, novelty_rate: f64) -> f64 {
        (invert_novelty(novelty_rate) - invert_novelty(self.max_novelty_rate))
            / self.novelty_divisor.value
    }

    pub fn apply(&self, stats: &mut ProductStats) {
        stats.normalized_order_rate = Some(self.order(stats.order_rate));
        stats.normalized_favourite_rate = Some(self.favourite(stats.favourite_rate));
        stats.normalized_novelty_rate = Some(self.novelty(stats.novelty_rate));
    }

    pub fn divisor(&self, signal: RateSignal) -> Divisor {
        match signal {
            RateSignal::Order => self.order_divisor,
            RateSignal::Favourite => self.favourite_divisor,
            RateSignal::Novelty => self.novelty_divisor,
        }
    }

    /// Signals whose divisor did not come from the observed span.
    pub fn fallbacks(&self) -> Vec<(RateSignal, Divisor)> {
        RateSignal::ALL
            .into_iter()
            .map(|signal| (signal, self.divisor(signal)))
            .filter(|(_, divisor)| divisor.source != DivisorSource::Span)
            .collect()
    }
}
