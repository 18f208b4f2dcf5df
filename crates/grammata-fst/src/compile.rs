// Expression compiler
//
// Walks an `Expr` bottom-up with an explicit work stack, turning each node
// into a `Fragment`, and seals the result onto a start state. Branch weights
// are resolved here; the edge surgery itself lives on `Fragment`.

use grammata_core::Semiring;
use log::debug;

use crate::expr::Expr;
use crate::fragment::Fragment;
use crate::store::{Automaton, StateId};
use crate::token::Token;
use crate::FstError;

/// Weight used for an unweighted choice, loop or skip decision.
pub const DEFAULT_BRANCH_WEIGHT: f64 = 0.5;

/// Compiles expressions into automata weighted by one semiring.
pub struct Compiler<'s, S> {
    semiring: &'s S,
}

impl<'s, S: Semiring> Compiler<'s, S> {
    pub fn new(semiring: &'s S) -> Self {
        Compiler { semiring }
    }

    /// Compile `expr` into a fresh automaton with one start state and one
    /// final state (or a final start state).
    pub fn compile<T: Token>(&self, expr: &Expr<T>) -> Result<Automaton<T, S::Weight>, FstError> {
        let mut store = Automaton::new();
        let start = store.start();
        let end = self.compile_from(&mut store, start, expr)?;
        debug!(
            "compiled expression: {} states, {} transitions, final {}",
            store.state_count(),
            store.transition_count(),
            end
        );
        Ok(store)
    }

    /// Splice `expr` into `store` starting at `state`. Returns the state the
    /// expression ends in, which is marked final.
    pub fn compile_from<T: Token>(
        &self,
        store: &mut Automaton<T, S::Weight>,
        state: StateId,
        expr: &Expr<T>,
    ) -> Result<StateId, FstError> {
        if !store.contains_state(state) {
            return Err(FstError::UnknownState(state));
        }
        self.fragment(store, expr)?.seal(store, state)
    }

    /// Build the fragment for `expr`. Junction states are allocated in
    /// `store`; everything else stays open until the fragment is sealed.
    ///
    /// The tree is walked post-order with an explicit work stack, so the
    /// depth of `expr` is bounded by memory only.
    pub fn fragment<T: Token>(
        &self,
        store: &mut Automaton<T, S::Weight>,
        expr: &Expr<T>,
    ) -> Result<Fragment<T, S::Weight>, FstError> {
        let sr = self.semiring;
        let mut tasks = vec![Task::Visit(expr)];
        let mut done: Vec<Fragment<T, S::Weight>> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(expr) => match expr {
                    Expr::Epsilon => done.push(Fragment::edge(T::epsilon(), sr.one())),
                    Expr::Token(token) => done.push(Fragment::edge(token.clone(), sr.one())),
                    // A weight outside a choice context has nothing to split against.
                    Expr::Weighted(_, inner) => tasks.push(Task::Visit(&**inner)),
                    Expr::Concat(a, b) => {
                        tasks.push(Task::Concat);
                        tasks.push(Task::Visit(&**b));
                        tasks.push(Task::Visit(&**a));
                    }
                    Expr::Alt(..) => {
                        let (branches, factors) = self.alternatives(expr);
                        tasks.push(Task::Merge(factors));
                        tasks.extend(branches.into_iter().rev().map(Task::Visit));
                    }
                    Expr::Kleene(body) => {
                        let (repeat, exit) = self.decision(body);
                        tasks.push(Task::Closure { repeat, exit });
                        tasks.push(Task::Visit(&**body));
                    }
                    Expr::Positive(body) => {
                        let (repeat, exit) = self.decision(body);
                        tasks.push(Task::Positive { repeat, exit });
                        tasks.push(Task::Visit(&**body));
                        tasks.push(Task::Visit(&**body));
                    }
                    Expr::Optional(body) => {
                        let (take, skip) = self.decision(body);
                        tasks.push(Task::Optional { take, skip });
                        tasks.push(Task::Visit(&**body));
                    }
                },
                Task::Concat => {
                    let right = operand(&mut done);
                    let left = operand(&mut done);
                    done.push(left.concat(right, store)?);
                }
                Task::Merge(factors) => {
                    let branches = done.split_off(done.len().saturating_sub(factors.len()));
                    let mut merged = Fragment::new();
                    for (mut branch, factor) in branches.into_iter().zip(factors) {
                        branch.scale_entries(sr, factor);
                        merged = merged.merge(branch);
                    }
                    done.push(merged);
                }
                Task::Closure { repeat, exit } => {
                    let body = operand(&mut done);
                    done.push(body.closure(store, sr, repeat, exit)?);
                }
                Task::Positive { repeat, exit } => {
                    let again = operand(&mut done);
                    let first = operand(&mut done);
                    done.push(first.positive_closure(again, store, sr, repeat, exit)?);
                }
                Task::Optional { take, skip } => {
                    let body = operand(&mut done);
                    done.push(body.optional(sr, take, skip));
                }
            }
        }
        Ok(operand(&mut done))
    }

    /// Branches of the alternation rooted at `expr`, left to right, each
    /// with the product of the choice weights on the way down to it.
    ///
    /// Nested alternations (also under `Weighted`) are flattened, so a
    /// chain of n choices scales each branch once instead of once per level.
    fn alternatives<'e, T>(&self, expr: &'e Expr<T>) -> (Vec<&'e Expr<T>>, Vec<S::Weight>) {
        let sr = self.semiring;
        let mut branches = Vec::new();
        let mut factors = Vec::new();
        let mut pending = vec![(expr, sr.one())];
        while let Some((node, factor)) = pending.pop() {
            match node.without_weight() {
                Expr::Alt(a, b) => {
                    let (wa, wb) = self.choice(a, b);
                    pending.push((&**b, sr.times(factor, wb)));
                    pending.push((&**a, sr.times(factor, wa)));
                }
                _ => {
                    branches.push(node);
                    factors.push(factor);
                }
            }
        }
        (branches, factors)
    }

    /// Weight of taking `body` and of the complementary branch.
    fn decision<T>(&self, body: &Expr<T>) -> (S::Weight, S::Weight) {
        let w = body.branch_weight().unwrap_or(DEFAULT_BRANCH_WEIGHT);
        (self.semiring.weight(w), self.semiring.weight(1.0 - w))
    }

    /// Weights of the two sides of an alternation.
    fn choice<T>(&self, a: &Expr<T>, b: &Expr<T>) -> (S::Weight, S::Weight) {
        let (wa, wb) = match (a.branch_weight(), b.branch_weight()) {
            (Some(wa), Some(wb)) => (wa, wb),
            (Some(wa), None) => (wa, 1.0 - wa),
            (None, Some(wb)) => (1.0 - wb, wb),
            (None, None) => (DEFAULT_BRANCH_WEIGHT, DEFAULT_BRANCH_WEIGHT),
        };
        (self.semiring.weight(wa), self.semiring.weight(wb))
    }
}

/// Pending step of the post-order compile walk.
enum Task<'e, T, W> {
    Visit(&'e Expr<T>),
    Concat,
    /// Scale the last finished fragments, one per factor, and merge them.
    Merge(Vec<W>),
    Closure { repeat: W, exit: W },
    Positive { repeat: W, exit: W },
    Optional { take: W, skip: W },
}

// Every combinator task is pushed below its operands' visits, so its
// operands are on `done` when it runs.
fn operand<T, W>(done: &mut Vec<Fragment<T, W>>) -> Fragment<T, W> {
    done.pop().unwrap_or_default()
}
