// Alphabet symbols with a distinguished epsilon marker.

use std::fmt;

/// Error raised when a concrete value is requested from an epsilon symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("epsilon cannot be cast to an underlying symbol value")]
    EpsilonCast,
}

/// A transition label: either a concrete alphabet value or epsilon.
///
/// Epsilon is declared first, so the derived ordering places it strictly
/// before every concrete value. All epsilons compare and hash equal, and
/// never equal a concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol<T> {
    Epsilon,
    Value(T),
}

impl<T> Symbol<T> {
    /// Wrap a concrete alphabet value.
    pub fn new(value: T) -> Self {
        Symbol::Value(value)
    }

    /// The "consumes nothing" symbol.
    pub fn epsilon() -> Self {
        Symbol::Epsilon
    }

    #[inline]
    pub fn is_epsilon(&self) -> bool {
        matches!(self, Symbol::Epsilon)
    }

    /// Borrow the concrete value.
    ///
    /// Fails with [`SymbolError::EpsilonCast`] on epsilon; there is no
    /// default value to fall back on.
    pub fn value(&self) -> Result<&T, SymbolError> {
        match self {
            Symbol::Value(v) => Ok(v),
            Symbol::Epsilon => Err(SymbolError::EpsilonCast),
        }
    }

    /// Take the concrete value, failing on epsilon.
    pub fn into_value(self) -> Result<T, SymbolError> {
        match self {
            Symbol::Value(v) => Ok(v),
            Symbol::Epsilon => Err(SymbolError::EpsilonCast),
        }
    }

    /// The concrete value, or `None` for epsilon.
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Symbol::Value(v) => Some(v),
            Symbol::Epsilon => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Symbol<U> {
        match self {
            Symbol::Value(v) => Symbol::Value(f(v)),
            Symbol::Epsilon => Symbol::Epsilon,
        }
    }
}

impl<T> From<T> for Symbol<T> {
    fn from(value: T) -> Self {
        Symbol::Value(value)
    }
}

impl<T> Default for Symbol<T> {
    fn default() -> Self {
        Symbol::Epsilon
    }
}

impl<T: fmt::Display> fmt::Display for Symbol<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Value(v) => v.fmt(f),
            Symbol::Epsilon => f.write_str("<eps>"),
        }
    }
}
