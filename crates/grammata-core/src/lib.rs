//! Shared value types for the grammata automaton engine.
//!
//! This crate has no internal dependencies and holds the two leaf
//! abstractions every automaton is built from:
//!
//! - [`weight`] -- log-domain weight arithmetic (`LogDomain`, `LogProb`,
//!   `LogMagnitude`) and the [`Semiring`](weight::Semiring) trait
//! - [`symbol`] -- alphabet values augmented with a distinguished epsilon

pub mod symbol;
pub mod weight;

pub use symbol::{Symbol, SymbolError};
pub use weight::{
    LogDomain, LogMagnitude, LogProb, MagnitudeSemiring, ProbabilitySemiring, Semiring,
    WeightError,
};
