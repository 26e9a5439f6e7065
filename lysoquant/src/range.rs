//! 1-based inclusive ranges over channels, slices and frames.

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimRange {
    pub first: usize,
    pub last: usize,
}

impl DimRange {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first >= 1 && first <= last);
        Self { first, last }
    }

    pub fn full(count: usize) -> Self {
        Self::new(1, count.max(1))
    }

    /// Parses `"a-b"` or `"a"` and clamps the result to `[1, count]`.
    ///
    /// An unreadable start becomes 1, a missing end equals the start, and an
    /// inverted range falls back to the full extent.
    pub fn parse(text: &str, count: usize) -> Self {
        let count = count.max(1);
        let mut tokens = text
            .split(|c: char| c == ' ' || c == '-')
            .filter(|token| !token.is_empty());

        let start = tokens.next().and_then(parse_index);
        let end = tokens.next().and_then(parse_index);

        Self::clamped(start, end, count)
    }

    /// Applies the clamping rules to already-parsed bounds.
    pub fn clamped(start: Option<i64>, end: Option<i64>, count: usize) -> Self {
        let count = count.max(1) as i64;

        let mut first = start.unwrap_or(1);
        let mut last = end.unwrap_or(first);

        if first < 1 {
            first = 1;
        }
        if last > count {
            last = count;
        }
        if first > last {
            first = 1;
            last = count;
        }

        Self::new(first as usize, last as usize)
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }

    pub fn iter(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

fn parse_index(token: &str) -> Option<i64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

impl fmt::Display for DimRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}
