// Log-domain weight arithmetic.
//
// Weights are stored as integer logarithms in base `1 + 10^-precision`.
// Multiplication is integer addition; addition goes through a precomputed
// table of `log_b(1 + b^-d)`. The table and base live in an explicitly
// constructed `LogDomain` held by each semiring.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Default precision: base `1.00001`.
pub const DEFAULT_PRECISION: u32 = 5;

/// Largest accepted precision. The add table grows roughly tenfold per step.
pub const MAX_PRECISION: u32 = 6;

/// Raw log value representing real zero.
const LOG_ZERO: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WeightError {
    #[error("log precision {0} out of range (expected 1..=6)")]
    PrecisionOutOfRange(u32),
}

/// Log base and log-add table for one precision.
///
/// Building a domain is the only expensive step (about a million table
/// entries at the default precision); share it through an `Arc`.
pub struct LogDomain {
    precision: u32,
    base: f64,
    log_base: f64,
    add_table: Vec<u32>,
}

impl LogDomain {
    pub fn new(precision: u32) -> Result<Self, WeightError> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(WeightError::PrecisionOutOfRange(precision));
        }
        Ok(Self::build(precision))
    }

    fn build(precision: u32) -> Self {
        let base = 1.0 + 0.1f64.powi(precision as i32);
        let log_base = base.ln();
        // Past this difference log_b(1 + b^-d) is below one unit.
        let table_len = ((1.0 / (base - 1.0)).ln() / log_base) as usize;
        let add_table = (0..table_len)
            .map(|d| ((-(d as f64) * log_base).exp().ln_1p() / log_base).round() as u32)
            .collect();
        LogDomain {
            precision,
            base,
            log_base,
            add_table,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Number of entries in the log-add table.
    pub fn table_len(&self) -> usize {
        self.add_table.len()
    }

    /// Convert a linear value. Non-positive and NaN inputs map to zero.
    pub fn to_log(&self, value: f64) -> i64 {
        if value > 0.0 {
            (value.ln() / self.log_base).round() as i64
        } else {
            LOG_ZERO
        }
    }

    pub fn to_linear(&self, log: i64) -> f64 {
        if log == LOG_ZERO {
            0.0
        } else {
            (log as f64 * self.log_base).exp()
        }
    }

    /// `log(b^a + b^c)`.
    pub fn log_add(&self, a: i64, c: i64) -> i64 {
        if a == LOG_ZERO {
            return c;
        }
        if c == LOG_ZERO {
            return a;
        }
        let (lo, hi) = if a <= c { (a, c) } else { (c, a) };
        let diff = hi.saturating_sub(lo);
        match usize::try_from(diff).ok().and_then(|d| self.add_table.get(d)) {
            Some(&step) => hi.saturating_add(i64::from(step)),
            None => hi,
        }
    }

    /// `log(b^a - b^c)`, or zero when `a <= c`.
    pub fn log_sub(&self, a: i64, c: i64) -> i64 {
        if c == LOG_ZERO {
            return a;
        }
        if a <= c {
            return LOG_ZERO;
        }
        let diff = a.saturating_sub(c);
        if diff as u64 >= self.add_table.len() as u64 {
            return a;
        }
        let step = ((diff as f64 * self.log_base).exp_m1().ln() / self.log_base).round() as i64;
        c.saturating_add(step)
    }

    pub fn log_mul(&self, a: i64, c: i64) -> i64 {
        if a == LOG_ZERO || c == LOG_ZERO {
            return LOG_ZERO;
        }
        a.saturating_add(c)
    }

    /// Division by zero yields zero.
    pub fn log_div(&self, a: i64, c: i64) -> i64 {
        if a == LOG_ZERO || c == LOG_ZERO {
            return LOG_ZERO;
        }
        a.saturating_sub(c)
    }
}

impl Default for LogDomain {
    fn default() -> Self {
        Self::build(DEFAULT_PRECISION)
    }
}

impl fmt::Debug for LogDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogDomain")
            .field("precision", &self.precision)
            .field("base", &self.base)
            .field("table_len", &self.add_table.len())
            .finish()
    }
}

fn fmt_raw(name: &str, raw: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if raw == LOG_ZERO {
        write!(f, "{name}(zero)")
    } else {
        write!(f, "{name}({raw})")
    }
}

/// A probability in `[0, 1]`, stored as a non-positive integer log.
///
/// Ordering follows the underlying probability.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogProb(i64);

impl LogProb {
    pub const ZERO: LogProb = LogProb(LOG_ZERO);
    pub const ONE: LogProb = LogProb(0);

    /// Raw integer log. Real zero is `i64::MIN`.
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Positive raw logs lie outside `[0, 1]` and collapse to zero.
    pub fn from_raw(raw: i64) -> Self {
        if raw > 0 { Self::ZERO } else { LogProb(raw) }
    }

    pub fn is_zero(self) -> bool {
        self.0 == LOG_ZERO
    }
}

impl fmt::Debug for LogProb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_raw("LogProb", self.0, f)
    }
}

/// A non-negative magnitude, stored as an integer log.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogMagnitude(i64);

impl LogMagnitude {
    pub const ZERO: LogMagnitude = LogMagnitude(LOG_ZERO);
    pub const ONE: LogMagnitude = LogMagnitude(0);

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn from_raw(raw: i64) -> Self {
        LogMagnitude(raw)
    }

    pub fn is_zero(self) -> bool {
        self.0 == LOG_ZERO
    }
}

impl fmt::Debug for LogMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_raw("LogMagnitude", self.0, f)
    }
}

/// Weight algebra used by automata.
///
/// `plus` combines alternative paths, `times` extends a path.
pub trait Semiring {
    type Weight: Copy + Ord + Hash + fmt::Debug;

    fn zero(&self) -> Self::Weight;
    fn one(&self) -> Self::Weight;

    /// Convert a linear value into a weight.
    fn weight(&self, value: f64) -> Self::Weight;

    /// Convert a weight back to its linear value.
    fn value(&self, weight: Self::Weight) -> f64;

    fn plus(&self, a: Self::Weight, b: Self::Weight) -> Self::Weight;
    fn times(&self, a: Self::Weight, b: Self::Weight) -> Self::Weight;
    fn divide(&self, a: Self::Weight, b: Self::Weight) -> Self::Weight;

    fn is_zero(&self, weight: Self::Weight) -> bool {
        weight == self.zero()
    }

    fn product<I: IntoIterator<Item = Self::Weight>>(&self, weights: I) -> Self::Weight {
        weights
            .into_iter()
            .fold(self.one(), |acc, w| self.times(acc, w))
    }

    fn sum<I: IntoIterator<Item = Self::Weight>>(&self, weights: I) -> Self::Weight {
        weights
            .into_iter()
            .fold(self.zero(), |acc, w| self.plus(acc, w))
    }
}

/// Probabilities bounded to `[0, 1]`.
///
/// Sums saturate at one; products and quotients that would exceed one
/// collapse to zero.
#[derive(Debug, Clone, Default)]
pub struct ProbabilitySemiring {
    domain: Arc<LogDomain>,
}

impl ProbabilitySemiring {
    pub fn new(domain: Arc<LogDomain>) -> Self {
        ProbabilitySemiring { domain }
    }

    pub fn with_precision(precision: u32) -> Result<Self, WeightError> {
        Ok(Self::new(Arc::new(LogDomain::new(precision)?)))
    }

    pub fn domain(&self) -> &Arc<LogDomain> {
        &self.domain
    }
}

impl Semiring for ProbabilitySemiring {
    type Weight = LogProb;

    fn zero(&self) -> LogProb {
        LogProb::ZERO
    }

    fn one(&self) -> LogProb {
        LogProb::ONE
    }

    fn weight(&self, value: f64) -> LogProb {
        if value >= 1.0 {
            LogProb::ONE
        } else {
            LogProb(self.domain.to_log(value).min(0))
        }
    }

    fn value(&self, weight: LogProb) -> f64 {
        self.domain.to_linear(weight.0)
    }

    fn plus(&self, a: LogProb, b: LogProb) -> LogProb {
        LogProb(self.domain.log_add(a.0, b.0).min(0))
    }

    fn times(&self, a: LogProb, b: LogProb) -> LogProb {
        LogProb::from_raw(self.domain.log_mul(a.0, b.0))
    }

    fn divide(&self, a: LogProb, b: LogProb) -> LogProb {
        LogProb::from_raw(self.domain.log_div(a.0, b.0))
    }
}

/// Unbounded non-negative magnitudes with true subtraction.
#[derive(Debug, Clone, Default)]
pub struct MagnitudeSemiring {
    domain: Arc<LogDomain>,
}

impl MagnitudeSemiring {
    pub fn new(domain: Arc<LogDomain>) -> Self {
        MagnitudeSemiring { domain }
    }

    pub fn with_precision(precision: u32) -> Result<Self, WeightError> {
        Ok(Self::new(Arc::new(LogDomain::new(precision)?)))
    }

    pub fn domain(&self) -> &Arc<LogDomain> {
        &self.domain
    }

    /// `a - b`, saturating at zero when `a <= b`.
    pub fn minus(&self, a: LogMagnitude, b: LogMagnitude) -> LogMagnitude {
        LogMagnitude(self.domain.log_sub(a.0, b.0))
    }
}

impl Semiring for MagnitudeSemiring {
    type Weight = LogMagnitude;

    fn zero(&self) -> LogMagnitude {
        LogMagnitude::ZERO
    }

    fn one(&self) -> LogMagnitude {
        LogMagnitude::ONE
    }

    fn weight(&self, value: f64) -> LogMagnitude {
        LogMagnitude(self.domain.to_log(value))
    }

    fn value(&self, weight: LogMagnitude) -> f64 {
        self.domain.to_linear(weight.0)
    }

    fn plus(&self, a: LogMagnitude, b: LogMagnitude) -> LogMagnitude {
        LogMagnitude(self.domain.log_add(a.0, b.0))
    }

    fn times(&self, a: LogMagnitude, b: LogMagnitude) -> LogMagnitude {
        LogMagnitude(self.domain.log_mul(a.0, b.0))
    }

    fn divide(&self, a: LogMagnitude, b: LogMagnitude) -> LogMagnitude {
        LogMagnitude(self.domain.log_div(a.0, b.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn domain() -> Arc<LogDomain> {
        static DOMAIN: OnceLock<Arc<LogDomain>> = OnceLock::new();
        DOMAIN.get_or_init(|| Arc::new(LogDomain::default())).clone()
    }

    fn prob() -> ProbabilitySemiring {
        ProbabilitySemiring::new(domain())
    }

    fn mag() -> MagnitudeSemiring {
        MagnitudeSemiring::new(domain())
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn precision_bounds() {
        assert_eq!(
            LogDomain::new(0).unwrap_err(),
            WeightError::PrecisionOutOfRange(0)
        );
        assert!(LogDomain::new(7).is_err());
        assert_eq!(LogDomain::new(3).unwrap().table_len(), 6911);
    }

    #[test]
    fn default_table_size() {
        let d = domain();
        assert_eq!(d.precision(), 5);
        assert_eq!(d.table_len(), 1_151_298);
    }

    #[test]
    fn half_plus_half_is_exactly_one() {
        let s = prob();
        let half = s.weight(0.5);
        assert_eq!(half.raw(), -69315);
        assert_eq!(s.plus(half, half), LogProb::ONE);
    }

    #[test]
    fn complementary_pairs_sum_to_one() {
        let s = prob();
        assert_eq!(s.plus(s.weight(0.3), s.weight(0.7)), s.one());
        assert_eq!(s.plus(s.weight(0.6), s.weight(0.4)), s.one());
    }

    #[test]
    fn sum_saturates_at_one() {
        let s = prob();
        assert_eq!(s.plus(s.weight(0.75), s.weight(0.75)), s.one());
        assert_eq!(s.plus(s.one(), s.one()), s.one());
    }

    #[test]
    fn product_tracks_linear_product() {
        let s = prob();
        let grid = [0.05, 0.1, 0.25, 0.5, 0.9, 1.0];
        for &p in &grid {
            for &q in &grid {
                let w = s.times(s.weight(p), s.weight(q));
                assert!((w.raw() - s.weight(p * q).raw()).abs() <= 1, "{p} * {q}");
            }
        }
    }

    #[test]
    fn one_times_one_is_one() {
        let s = prob();
        assert_eq!(s.times(s.one(), s.one()), s.one());
    }

    #[test]
    fn quotient_above_one_collapses_to_zero() {
        let s = prob();
        assert_eq!(s.divide(s.weight(0.5), s.weight(0.25)), s.zero());
        assert_close(s.value(s.divide(s.weight(0.25), s.weight(0.5))), 0.5, 1e-4);
        assert_eq!(s.divide(s.weight(0.5), s.zero()), s.zero());
    }

    #[test]
    fn zero_identities() {
        let s = prob();
        let w = s.weight(0.4);
        assert_eq!(s.plus(w, s.zero()), w);
        assert_eq!(s.plus(s.zero(), w), w);
        assert_eq!(s.times(w, s.zero()), s.zero());
        assert_eq!(s.times(w, s.one()), w);
        assert!(s.is_zero(s.weight(0.0)));
        assert!(s.is_zero(s.weight(-1.0)));
        assert!(s.is_zero(s.weight(f64::NAN)));
        assert_eq!(s.weight(3.0), s.one());
        assert_eq!(s.value(s.zero()), 0.0);
    }

    #[test]
    fn ordering_follows_probability() {
        let s = prob();
        assert!(s.zero() < s.weight(0.001));
        assert!(s.weight(0.1) < s.weight(0.2));
        assert!(s.weight(0.9) < s.one());
    }

    #[test]
    fn product_and_sum_folds() {
        let s = prob();
        let half = s.weight(0.5);
        assert_close(s.value(s.product([half, half, half])), 0.125, 1e-4);
        assert_eq!(s.product([]), s.one());
        assert_eq!(s.sum([]), s.zero());
        assert_eq!(s.sum([half, half]), s.one());
    }

    #[test]
    fn magnitude_arithmetic() {
        let s = mag();
        let nine = s.weight(9.0);
        assert_close(s.value(s.plus(nine, nine)), 18.0, 1e-3);
        assert_close(s.value(s.times(nine, nine)), 81.0, 1e-2);
        assert_close(s.value(s.minus(s.weight(11.0), nine)), 2.0, 1e-3);
        assert_close(s.value(s.divide(s.weight(2.0), s.weight(0.25))), 8.0, 1e-3);
    }

    #[test]
    fn magnitude_minus_saturates() {
        let s = mag();
        let nine = s.weight(9.0);
        assert_eq!(s.minus(nine, s.weight(11.0)), s.zero());
        assert_eq!(s.minus(nine, nine), s.zero());
        assert_eq!(s.minus(nine, s.zero()), nine);
    }

    #[test]
    fn magnitude_divide_by_zero_is_zero() {
        let s = mag();
        assert_eq!(s.divide(s.weight(4.0), s.zero()), s.zero());
    }

    #[test]
    fn lower_precision_is_coarser() {
        let s = ProbabilitySemiring::with_precision(3).unwrap();
        let half = s.weight(0.5);
        assert_eq!(half.raw(), -693);
        assert_eq!(s.plus(half, half), s.one());
    }

    #[test]
    fn debug_marks_zero() {
        assert_eq!(format!("{:?}", LogProb::ZERO), "LogProb(zero)");
        assert_eq!(format!("{:?}", LogProb::ONE), "LogProb(0)");
    }
}
