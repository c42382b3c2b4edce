//! Defines a [`Span`] which is used to represent a region in the template
//! source code.

use std::cmp::{max, min};
use std::ops::{Index, Range};

/// A byte range `m..n` in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub m: usize,
    pub n: usize,
}

impl Span {
    /// An empty span at the given offset.
    pub fn at(offset: usize) -> Self {
        Self {
            m: offset,
            n: offset,
        }
    }

    pub fn combine(self, other: Self) -> Self {
        let m = min(self.m, other.m);
        let n = max(self.n, other.n);
        Self { m, n }
    }

    /// Shrinks the span by the given number of bytes on each side, used to
    /// step inside delimiters.
    pub fn inner(self, left: usize, right: usize) -> Self {
        Self {
            m: self.m + left,
            n: self.n - right,
        }
    }

    pub fn len(&self) -> usize {
        self.n - self.m
    }

    pub fn is_empty(&self) -> bool {
        self.m == self.n
    }
}

impl Index<Span> for str {
    type Output = str;

    fn index(&self, span: Span) -> &Self::Output {
        let Span { m, n } = span;
        &self[m..n]
    }
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Self {
            m: r.start,
            n: r.end,
        }
    }
}
