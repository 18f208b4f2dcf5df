//! Weighted finite-state acceptors and transducers.
//!
//! Automata are built by compiling a regular-expression-style [`Expr`] into
//! an arena-backed [`Automaton`], and chained with a lazy, epsilon-filtered
//! [`Composition`].
//!
//! # Architecture
//!
//! - [`token`] -- Acceptor/transducer label capability
//! - [`store`] -- Arena-backed automaton store with indexed transitions
//! - [`expr`] -- Expression tree and combinators
//! - [`fragment`] -- Dangling-edge builder used during compilation
//! - [`compile`] -- Expression to automaton compiler
//! - [`filter`] -- Four-state epsilon filter for composition
//! - [`compose`] -- Lazy composition and its materialization
//! - [`config`] -- Traversal limits
//! - [`traverse`] -- Depth-first path enumeration

use std::fmt;
use std::hash::Hash;

pub mod compile;
pub mod compose;
pub mod config;
pub mod expr;
pub mod filter;
pub mod fragment;
pub mod store;
pub mod token;
pub mod traverse;

pub use compile::Compiler;
pub use compose::{ComposedState, ComposedTransition, Composition};
pub use config::TraversalConfig;
pub use expr::Expr;
pub use filter::{FilterState, Move};
pub use grammata_core::{
    LogDomain, LogMagnitude, LogProb, MagnitudeSemiring, ProbabilitySemiring, Semiring, Symbol,
    SymbolError, WeightError,
};
pub use store::{Acceptor, Automaton, StateId, Transducer, Transition, TransitionId};
pub use token::{Pair, Token};
pub use traverse::{Path, PathWalker};

/// Error type for automaton construction and composition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FstError {
    #[error("unknown or removed state {0}")]
    UnknownState(StateId),
    #[error("unknown or removed transition {0}")]
    UnknownTransition(TransitionId),
    #[error("the start state cannot be removed")]
    StartStateRemoval,
    #[error("state {state} is still the target of {incoming} transition(s)")]
    StateHasIncoming { state: StateId, incoming: u32 },
    #[error("outer output alphabet and inner input alphabet share no symbol")]
    DisjointAlphabets,
    #[error("composition exceeded the limit of {limit} states")]
    StateLimit { limit: usize },
}

/// Default bound on the work done by a single traversal step.
pub const MAX_LOOP_COUNT: u32 = 100_000;

/// One outgoing arc as seen through the read-only [`Machine`] interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<S, L, W> {
    pub to: S,
    pub label: L,
    pub weight: W,
}

/// Read-only view of a weighted automaton.
///
/// Implemented both by the concrete [`Automaton`] store and by the lazy
/// [`Composition`], so traversal and export code does not care whether
/// states exist yet.
pub trait Machine {
    type State: Clone + Eq + Hash + fmt::Debug;
    type Label: Token;
    type Weight: Copy + fmt::Debug;
    type Arcs<'a>: Iterator<Item = Edge<Self::State, Self::Label, Self::Weight>>
    where
        Self: 'a;

    fn start(&self) -> Self::State;
    fn is_final(&self, state: &Self::State) -> bool;
    fn arcs<'a>(&'a self, state: &Self::State) -> Self::Arcs<'a>;
}
