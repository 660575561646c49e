//! Keyword arguments for layer factories.
//!
//! [`KwArgs`] preserves insertion order and tracks which keys a factory
//! consumed, so leftover arguments can be reported after every tag has
//! run. Two consumption styles exist, mirroring how shared and exclusive
//! arguments behave: [`KwArgs::take`] removes the entry (channel counts,
//! which each channel-bearing tag claims for itself) while [`KwArgs::get`]
//! leaves it in place (bias, kernel geometry and other arguments shared by
//! every tag that understands them).

use std::fmt;

use crate::error::{Error, Result};

/// One keyword-argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Structural size: channel count, kernel extent, stride, ...
    Usize(usize),
    /// Continuous hyperparameter: epsilon, momentum, drop probability, ...
    Float(f64),
    /// On/off switch: bias, affine, tracking, ...
    Bool(bool),
    /// Symbolic choice: padding mode, ...
    Str(String),
}

impl Arg {
    /// Human-readable name of the value's type for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Usize(_) => "an integer",
            Arg::Float(_) => "a float",
            Arg::Bool(_) => "a bool",
            Arg::Str(_) => "a string",
        }
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Usize(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Usize(value) => write!(f, "{value}"),
            Arg::Float(value) => write!(f, "{value}"),
            Arg::Bool(value) => write!(f, "{value}"),
            Arg::Str(value) => write!(f, "'{value}'"),
        }
    }
}

/// Insertion-ordered keyword arguments with consumed-key tracking.
#[derive(Debug, Clone, Default)]
pub struct KwArgs {
    entries: Vec<(String, Arg)>,
    used: Vec<String>,
}

impl KwArgs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an argument, keeping first-insertion order.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`KwArgs::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.set(name, value);
        self
    }

    /// Number of arguments currently present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no arguments are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the present arguments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Removes and returns an argument, marking it consumed.
    pub fn take(&mut self, key: &str) -> Option<Arg> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns an argument without removing it, marking it consumed.
    pub fn get(&mut self, key: &str) -> Option<&Arg> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        if !self.used.iter().any(|used| used == key) {
            self.used.push(key.to_owned());
        }
        Some(&self.entries[index].1)
    }

    /// Every key that is still present and was never consumed, sorted.
    pub fn unused(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .filter(|key| !self.used.iter().any(|used| used == key))
            .collect();
        keys.sort();
        keys
    }

    /// [`KwArgs::take`] with an integer conversion.
    pub fn take_usize(&mut self, key: &str) -> Result<Option<usize>> {
        match self.take(key) {
            Some(Arg::Usize(value)) => Ok(Some(value)),
            Some(other) => Err(type_error(key, "an integer", &other)),
            None => Ok(None),
        }
    }

    /// [`KwArgs::get`] with an integer conversion.
    pub fn get_usize(&mut self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            Some(Arg::Usize(value)) => Ok(Some(*value)),
            Some(other) => Err(type_error(key, "an integer", other)),
            None => Ok(None),
        }
    }

    /// [`KwArgs::get`] with a float conversion; integers widen.
    pub fn get_f64(&mut self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            Some(Arg::Float(value)) => Ok(Some(*value)),
            Some(Arg::Usize(value)) => Ok(Some(*value as f64)),
            Some(other) => Err(type_error(key, "a number", other)),
            None => Ok(None),
        }
    }

    /// [`KwArgs::get`] with a bool conversion.
    pub fn get_bool(&mut self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            Some(Arg::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(type_error(key, "a bool", other)),
            None => Ok(None),
        }
    }

    /// [`KwArgs::get`] with a string conversion.
    pub fn get_str(&mut self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            Some(Arg::Str(value)) => Ok(Some(value.clone())),
            Some(other) => Err(type_error(key, "a string", other)),
            None => Ok(None),
        }
    }
}

impl<K: Into<String>, V: Into<Arg>> FromIterator<(K, V)> for KwArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kwargs = KwArgs::new();
        for (key, value) in iter {
            kwargs.set(key, value);
        }
        kwargs
    }
}

fn type_error(key: &str, expected: &str, got: &Arg) -> Error {
    Error::ArgumentType {
        key: key.to_owned(),
        expected: expected.to_owned(),
        got: got.type_name().to_owned(),
    }
}
