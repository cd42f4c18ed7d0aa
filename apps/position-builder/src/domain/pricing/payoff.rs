//! P&L at Expiration
//!
//! Value of the position at expiry over a grid of underlying prices, net of
//! what it cost to put on. The curve is lazy and restartable: nothing is
//! computed until [`PayoffCurve::points`] is iterated, and every call starts
//! from the low end again.

use crate::domain::position::Position;

use super::errors::PricingError;
use super::totals::lazy_total;

/// Guards the inclusive upper bound against float error in `(high - low) / step`.
const GRID_EPSILON: f64 = 1e-9;

/// Most grid points a range may hold.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Inclusive, fixed-step range of underlying prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    low: f64,
    high: f64,
    step: f64,
}

impl PriceRange {
    /// Create a range.
    ///
    /// # Errors
    ///
    /// `InvalidPriceRange` unless bounds are finite, `low <= high`, `step > 0`
    /// and the grid holds at most [`MAX_GRID_POINTS`] points.
    pub fn new(low: f64, high: f64, step: f64) -> Result<Self, PricingError> {
        if !(low.is_finite() && high.is_finite() && step.is_finite()) {
            return Err(PricingError::InvalidPriceRange {
                message: "bounds and step must be finite".to_string(),
            });
        }
        if low > high {
            return Err(PricingError::InvalidPriceRange {
                message: format!("low {low} is above high {high}"),
            });
        }
        if step <= 0.0 {
            return Err(PricingError::InvalidPriceRange {
                message: format!("step {step} must be positive"),
            });
        }
        let intervals = grid_intervals(low, high, step);
        if !intervals.is_finite() || intervals >= MAX_GRID_POINTS as f64 {
            return Err(PricingError::InvalidPriceRange {
                message: format!(
                    "step {step} over [{low}, {high}] exceeds {MAX_GRID_POINTS} points"
                ),
            });
        }
        Ok(Self { low, high, step })
    }

    /// Window around the position's strikes, padded by `padding_ratio` on
    /// each side and split into `steps` intervals.
    ///
    /// Returns `None` for an empty position.
    ///
    /// # Errors
    ///
    /// `InvalidPriceRange` if `steps` is zero or the padding is negative.
    pub fn around_strikes(
        position: &Position,
        padding_ratio: f64,
        steps: u32,
    ) -> Result<Option<Self>, PricingError> {
        if steps == 0 {
            return Err(PricingError::InvalidPriceRange {
                message: "steps must be positive".to_string(),
            });
        }
        if !(padding_ratio.is_finite() && padding_ratio >= 0.0) {
            return Err(PricingError::InvalidPriceRange {
                message: format!("padding ratio {padding_ratio} must be non-negative"),
            });
        }

        let strikes = position.iter().map(|leg| leg.key().strike_value());
        let Some((min, max)) = strikes.fold(None, |acc: Option<(f64, f64)>, k| {
            Some(acc.map_or((k, k), |(lo, hi)| (lo.min(k), hi.max(k))))
        }) else {
            return Ok(None);
        };

        let low = (min * (1.0 - padding_ratio)).max(0.0);
        let high = max * (1.0 + padding_ratio);
        if high == low {
            return Self::new(low, high, 1.0).map(Some);
        }
        Self::new(low, high, (high - low) / f64::from(steps)).map(Some)
    }

    /// Lower bound.
    #[must_use]
    pub const fn low(&self) -> f64 {
        self.low
    }

    /// Upper bound.
    #[must_use]
    pub const fn high(&self) -> f64 {
        self.high
    }

    /// Grid step.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Number of grid points, both ends included.
    #[must_use]
    pub fn len(&self) -> usize {
        (grid_intervals(self.low, self.high, self.step) as usize).saturating_add(1)
    }

    /// A range always has at least its low point.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    fn point(&self, index: usize) -> f64 {
        (self.low + self.step * index as f64).min(self.high)
    }
}

fn grid_intervals(low: f64, high: f64, step: f64) -> f64 {
    ((high - low) / step + GRID_EPSILON).floor()
}

/// One point of the payoff curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffPoint {
    /// Underlying price at expiry.
    pub underlying: f64,
    /// Profit or loss at that price.
    pub pnl: f64,
}

/// Payoff at expiry of a position against a fixed cost basis.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffCurve {
    position: Position,
    cost_basis: f64,
    range: PriceRange,
}

impl PayoffCurve {
    /// Build a curve against an explicit cost basis.
    #[must_use]
    pub const fn new(position: Position, cost_basis: f64, range: PriceRange) -> Self {
        Self {
            position,
            cost_basis,
            range,
        }
    }

    /// Build a curve against the position's lazy total.
    ///
    /// Returns `None` when the lazy total is unknown or there are no legs; the
    /// caller shows no chart rather than a curve with a made-up cost basis.
    #[must_use]
    pub fn at_lazy_cost(position: &Position, range: PriceRange) -> Option<Self> {
        if position.is_empty() {
            return None;
        }
        let cost_basis = lazy_total(position).value()?;
        Some(Self::new(position.clone(), cost_basis, range))
    }

    /// Cost basis subtracted at every point.
    #[must_use]
    pub const fn cost_basis(&self) -> f64 {
        self.cost_basis
    }

    /// Price grid.
    #[must_use]
    pub const fn range(&self) -> &PriceRange {
        &self.range
    }

    /// Value of the legs at expiry for one underlying price.
    #[must_use]
    pub fn value_at(&self, underlying: f64) -> f64 {
        self.position
            .iter()
            .map(|leg| {
                leg.key().right.intrinsic(leg.key().strike_value(), underlying)
                    * leg.signed_quantity()
            })
            .sum()
    }

    /// Iterate the curve from the low end.
    #[must_use]
    pub fn points(&self) -> PayoffPoints<'_> {
        PayoffPoints {
            curve: self,
            next: 0,
            len: self.range.len(),
        }
    }
}

impl<'a> IntoIterator for &'a PayoffCurve {
    type Item = PayoffPoint;
    type IntoIter = PayoffPoints<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.points()
    }
}

/// Iterator over a [`PayoffCurve`].
#[derive(Debug, Clone)]
pub struct PayoffPoints<'a> {
    curve: &'a PayoffCurve,
    next: usize,
    len: usize,
}

impl Iterator for PayoffPoints<'_> {
    type Item = PayoffPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let underlying = self.curve.range.point(self.next);
        self.next += 1;
        Some(PayoffPoint {
            underlying,
            pnl: self.curve.value_at(underlying) - self.curve.cost_basis,
        })
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.next = self.next.saturating_add(n).min(self.len);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PayoffPoints<'_> {}

/// Free-function form of [`PayoffCurve::new`].
#[must_use]
pub fn payoff_curve(position: &Position, cost_basis: f64, range: PriceRange) -> PayoffCurve {
    PayoffCurve::new(position.clone(), cost_basis, range)
}

/// Free-function form of [`PayoffCurve::at_lazy_cost`].
#[must_use]
pub fn payoff_curve_for(position: &Position, range: PriceRange) -> Option<PayoffCurve> {
    PayoffCurve::at_lazy_cost(position, range)
}
