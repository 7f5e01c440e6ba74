use std::fmt;

/// Closed integer interval `[lower, upper]`. Empty when `lower > upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub lower: i64,
    pub upper: i64,
}

impl Interval {
    pub const fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    pub const fn point(value: i64) -> Self {
        Self { lower: value, upper: value }
    }

    /// `[0, size - 1]`, the index range of a dimension of `size` elements.
    pub const fn extent(size: usize) -> Self {
        Self { lower: 0, upper: size as i64 - 1 }
    }

    pub const fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    pub const fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    pub const fn contains(&self, value: i64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Whether `other` lies entirely inside `self`.
    pub const fn covers(&self, other: Interval) -> bool {
        other.is_empty() || (self.lower <= other.lower && other.upper <= self.upper)
    }

    /// Number of integers in the interval.
    pub const fn size(&self) -> u64 {
        if self.is_empty() { 0 } else { (self.upper - self.lower) as u64 + 1 }
    }

    pub fn intersect(self, other: Interval) -> Interval {
        Interval::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    pub fn union(self, other: Interval) -> Interval {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Interval::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    pub fn add(self, other: Interval) -> Interval {
        Interval::new(self.lower.saturating_add(other.lower), self.upper.saturating_add(other.upper))
    }

    pub fn scale(self, factor: i64) -> Interval {
        let (a, b) = (self.lower.saturating_mul(factor), self.upper.saturating_mul(factor));
        Interval::new(a.min(b), a.max(b))
    }

    /// Range of `x floordiv divisor` for `x` in this interval.
    pub fn floor_div(self, divisor: i64) -> Interval {
        assert!(divisor > 0, "floordiv by non-positive {divisor}");
        Interval::new(self.lower.div_euclid(divisor), self.upper.div_euclid(divisor))
    }

    /// Range of `x mod divisor` for `x` in this interval.
    pub fn modulo(self, divisor: i64) -> Interval {
        assert!(divisor > 0, "mod by non-positive {divisor}");
        if self.lower.div_euclid(divisor) == self.upper.div_euclid(divisor) {
            Interval::new(self.lower.rem_euclid(divisor), self.upper.rem_euclid(divisor))
        } else {
            Interval::new(0, divisor - 1)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
