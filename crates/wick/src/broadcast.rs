//! Parameter broadcasting across repeated factory invocations.
//!
//! A [`Params`] set maps parameter names to [`Source`] values: scalars
//! repeat for every invocation, finite sequences contribute one value per
//! invocation, and cyclic sequences wrap around to match the longest
//! finite sequence. Broadcasting is strict — every finite sequence must
//! share one length — unless a cyclic source is present, in which case the
//! cycles paper over the difference.

use crate::args::{Arg, KwArgs};
use crate::error::{Error, Result};

/// Where the per-invocation values of one parameter come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// One value repeated for every invocation.
    Scalar(Arg),
    /// One value per invocation; its length helps determine the row count.
    Seq(Vec<Arg>),
    /// Values repeated with wraparound; never determines the row count.
    Cycle(Vec<Arg>),
}

impl Source {
    // Sequences index with wraparound too: under a strict broadcast the row
    // count never exceeds their length, and under a non-strict one shorter
    // finite sequences are tolerated by cycling.
    fn sample(&self, index: usize) -> Arg {
        match self {
            Source::Scalar(value) => value.clone(),
            Source::Seq(values) | Source::Cycle(values) => {
                values[index % values.len()].clone()
            }
        }
    }
}

/// An insertion-ordered set of named parameter sources.
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: Vec<(String, Source)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scalar parameter.
    pub fn scalar(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.set(name, Source::Scalar(value.into()));
        self
    }

    /// Adds a finite sequence parameter.
    pub fn seq<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.set(name, Source::Seq(values));
        self
    }

    /// Adds a cyclic sequence parameter.
    pub fn cycle<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.set(name, Source::Cycle(values));
        self
    }

    /// Inserts or replaces a parameter source, keeping first-insertion
    /// order.
    pub fn set(&mut self, name: impl Into<String>, source: Source) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = source,
            None => self.entries.push((name, source)),
        }
    }

    /// Appends every parameter of `other`, replacing same-named entries.
    pub fn merge(mut self, other: Params) -> Self {
        for (name, source) in other.entries {
            self.set(name, source);
        }
        self
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the broadcast into per-invocation keyword-argument rows.
    ///
    /// The row count is the shared length of the finite sequences (strict
    /// mode), or the longest finite length when a cycle suspends
    /// strictness. All-scalar sets produce exactly one row; an empty set
    /// produces none.
    pub fn rows(self) -> Result<Rows> {
        let mut strict = true;
        let mut finite: Vec<(String, usize)> = Vec::new();
        for (name, source) in &self.entries {
            match source {
                Source::Scalar(_) => {}
                Source::Seq(values) => finite.push((name.clone(), values.len())),
                Source::Cycle(values) => {
                    if values.is_empty() {
                        return Err(Error::EmptyCycle { name: name.clone() });
                    }
                    strict = false;
                }
            }
        }

        let count = if strict {
            match finite.first().map(|&(_, len)| len) {
                None => usize::from(!self.entries.is_empty()),
                Some(first) => {
                    if finite.iter().any(|&(_, len)| len != first) {
                        return Err(Error::LengthMismatch { lengths: finite });
                    }
                    first
                }
            }
        } else {
            if let Some((name, _)) = finite.iter().find(|&&(_, len)| len == 0) {
                return Err(Error::EmptyCycle { name: name.clone() });
            }
            match finite.iter().map(|&(_, len)| len).max() {
                Some(longest) => longest,
                None => return Err(Error::UnboundedBroadcast),
            }
        };

        Ok(Rows {
            entries: self.entries,
            count,
            index: 0,
        })
    }
}

/// Lazy sequence of broadcast rows.
///
/// Each row is a [`KwArgs`] whose key order follows the parameter set's
/// insertion order.
#[derive(Debug)]
pub struct Rows {
    entries: Vec<(String, Source)>,
    count: usize,
    index: usize,
}

impl Iterator for Rows {
    type Item = KwArgs;

    fn next(&mut self) -> Option<KwArgs> {
        if self.index >= self.count {
            return None;
        }
        let index = self.index;
        self.index += 1;
        Some(
            self.entries
                .iter()
                .map(|(name, source)| (name.clone(), source.sample(index)))
                .collect(),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rows {}
