// Lazy epsilon-filtered composition
//
// A composed state pairs an outer and an inner state with a filter state.
// Nothing is stored: the outgoing transitions of a composed state are
// computed on request by walking the outer state's edges and looking up
// matching inner edges through the input index.

use std::collections::VecDeque;

use grammata_core::{Semiring, Symbol};
use hashbrown::{HashMap, HashSet};
use log::{debug, trace};

use crate::config::TraversalConfig;
use crate::filter::{FilterState, Move};
use crate::store::{Automaton, StateId, Transducer, Transition, Transitions};
use crate::token::{Pair, Token};
use crate::{Edge, FstError, Machine};

/// A state of the composed machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComposedState {
    pub outer: StateId,
    pub inner: StateId,
    pub filter: FilterState,
}

/// A transition of the composed machine, labelled outer input to inner
/// output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedTransition<I, O, W> {
    pub from: ComposedState,
    pub to: ComposedState,
    pub token: Pair<I, O>,
    pub weight: W,
}

/// The composition `outer` then `inner`: outer's output feeds inner's
/// input.
///
/// Borrows both automata, which therefore cannot be mutated while the
/// composition is alive.
pub struct Composition<'a, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    outer: &'a Automaton<A, S::Weight>,
    inner: &'a Automaton<B, S::Weight>,
    semiring: &'a S,
}

impl<'a, A, B, S> Composition<'a, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    pub fn new(
        outer: &'a Automaton<A, S::Weight>,
        inner: &'a Automaton<B, S::Weight>,
        semiring: &'a S,
    ) -> Self {
        Composition {
            outer,
            inner,
            semiring,
        }
    }

    /// Like [`Composition::new`], but fails when both sides use concrete
    /// intermediate symbols and none of them is shared.
    pub fn checked(
        outer: &'a Automaton<A, S::Weight>,
        inner: &'a Automaton<B, S::Weight>,
        semiring: &'a S,
    ) -> Result<Self, FstError> {
        let produced: HashSet<&Symbol<A::Out>> = outer
            .all_transitions()
            .map(|t| t.output())
            .filter(|s| !s.is_epsilon())
            .collect();
        let mut consumed = inner
            .all_transitions()
            .map(|t| t.input())
            .filter(|s| !s.is_epsilon())
            .peekable();
        if !produced.is_empty()
            && consumed.peek().is_some()
            && !consumed.any(|s| produced.contains(&s))
        {
            return Err(FstError::DisjointAlphabets);
        }
        Ok(Self::new(outer, inner, semiring))
    }

    pub fn outer(&self) -> &'a Automaton<A, S::Weight> {
        self.outer
    }

    pub fn inner(&self) -> &'a Automaton<B, S::Weight> {
        self.inner
    }

    pub fn start(&self) -> ComposedState {
        ComposedState {
            outer: self.outer.start(),
            inner: self.inner.start(),
            filter: FilterState::MoveBoth,
        }
    }

    /// Final iff both sides are final, whatever the filter state.
    pub fn is_final(&self, state: &ComposedState) -> bool {
        self.outer.is_final(state.outer) && self.inner.is_final(state.inner)
    }

    /// Outgoing transitions of `state`, computed lazily.
    ///
    /// For each outer edge, in insertion order: an epsilon-output edge first
    /// yields its outer-only move, then its joint moves with inner
    /// epsilon-input edges; a concrete output yields one move per matching
    /// inner edge. Inner-only epsilon moves come last. Moves the filter
    /// rejects are never produced.
    pub fn transitions(&self, state: &ComposedState) -> ComposedTransitions<'a, A, B, S> {
        trace!("expanding {state:?}");
        let phase = if state.filter.is_valid() {
            Phase::Outer
        } else {
            Phase::Done
        };
        ComposedTransitions {
            inner: self.inner,
            semiring: self.semiring,
            from: *state,
            outer_edges: self.outer.transitions(state.outer),
            phase,
        }
    }

    /// Expand every reachable composed state breadth-first into a concrete
    /// transducer.
    ///
    /// Fails with [`FstError::StateLimit`] once more than
    /// `config.max_states` states would be created.
    pub fn materialize(
        &self,
        config: &TraversalConfig,
    ) -> Result<Transducer<A::In, B::Out, S::Weight>, FstError> {
        let mut result: Transducer<A::In, B::Out, S::Weight> = Automaton::new();
        let start = self.start();
        let mut ids: HashMap<ComposedState, StateId> = HashMap::new();
        ids.insert(start, result.start());
        if self.is_final(&start) {
            result.set_final(result.start(), true)?;
        }

        let mut queue = VecDeque::from([start]);
        while let Some(state) = queue.pop_front() {
            let Some(&from) = ids.get(&state) else {
                continue;
            };
            for t in self.transitions(&state) {
                let to = match ids.get(&t.to) {
                    Some(&id) => id,
                    None => {
                        if ids.len() >= config.max_states {
                            return Err(FstError::StateLimit {
                                limit: config.max_states,
                            });
                        }
                        let id = result.add_state(self.is_final(&t.to));
                        ids.insert(t.to, id);
                        queue.push_back(t.to);
                        id
                    }
                };
                result.add_transition(from, to, t.token, t.weight)?;
            }
        }
        debug!(
            "materialized composition: {} states, {} transitions",
            result.state_count(),
            result.transition_count()
        );
        Ok(result)
    }
}

enum Phase<'a, A, B, W> {
    /// Pick the next outer edge.
    Outer,
    /// Pair the current outer edge with inner edges on its output symbol.
    Pairing {
        edge: &'a Transition<A, W>,
        partners: Transitions<'a, B, W>,
        kind: Move,
    },
    /// Inner epsilon-input edges with the outer side waiting.
    InnerEpsilons(Transitions<'a, B, W>),
    Done,
}

/// Lazy iterator over the outgoing transitions of one composed state.
pub struct ComposedTransitions<'a, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    inner: &'a Automaton<B, S::Weight>,
    semiring: &'a S,
    from: ComposedState,
    outer_edges: Transitions<'a, A, S::Weight>,
    phase: Phase<'a, A, B, S::Weight>,
}

impl<'a, A, B, S> Iterator for ComposedTransitions<'a, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    type Item = ComposedTransition<A::In, B::Out, S::Weight>;

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.from;
        loop {
            match &mut self.phase {
                Phase::Outer => {
                    let Some(edge) = self.outer_edges.next() else {
                        let partners = self.inner.transitions_on(from.inner, &Symbol::Epsilon);
                        self.phase = Phase::InnerEpsilons(partners);
                        continue;
                    };
                    let partners = self.inner.transitions_on(from.inner, edge.output());
                    if edge.output().is_epsilon() {
                        self.phase = Phase::Pairing {
                            edge,
                            partners,
                            kind: Move::Epsilons,
                        };
                        let target = from.filter.step(Move::Outer);
                        if target.is_valid() {
                            return Some(outer_only(from, target, edge));
                        }
                    } else {
                        self.phase = Phase::Pairing {
                            edge,
                            partners,
                            kind: Move::Match,
                        };
                    }
                }
                Phase::Pairing {
                    edge,
                    partners,
                    kind,
                } => {
                    let edge = *edge;
                    let target = from.filter.step(*kind);
                    if !target.is_valid() {
                        self.phase = Phase::Outer;
                        continue;
                    }
                    match partners.next() {
                        Some(partner) => {
                            return Some(joint(self.semiring, from, target, edge, partner));
                        }
                        None => self.phase = Phase::Outer,
                    }
                }
                Phase::InnerEpsilons(partners) => {
                    let target = from.filter.step(Move::Inner);
                    match partners.next() {
                        Some(partner) if target.is_valid() => {
                            return Some(inner_only(from, target, partner));
                        }
                        _ => self.phase = Phase::Done,
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

fn outer_only<A: Token, O, W: Copy>(
    from: ComposedState,
    filter: FilterState,
    edge: &Transition<A, W>,
) -> ComposedTransition<A::In, O, W> {
    ComposedTransition {
        from,
        to: ComposedState {
            outer: edge.to(),
            inner: from.inner,
            filter,
        },
        token: Pair::new(edge.input().clone(), Symbol::Epsilon),
        weight: edge.weight(),
    }
}

fn inner_only<I, B: Token, W: Copy>(
    from: ComposedState,
    filter: FilterState,
    edge: &Transition<B, W>,
) -> ComposedTransition<I, B::Out, W> {
    ComposedTransition {
        from,
        to: ComposedState {
            outer: from.outer,
            inner: edge.to(),
            filter,
        },
        token: Pair::new(Symbol::Epsilon, edge.output().clone()),
        weight: edge.weight(),
    }
}

fn joint<A: Token, B: Token, S: Semiring>(
    semiring: &S,
    from: ComposedState,
    filter: FilterState,
    outer: &Transition<A, S::Weight>,
    inner: &Transition<B, S::Weight>,
) -> ComposedTransition<A::In, B::Out, S::Weight> {
    ComposedTransition {
        from,
        to: ComposedState {
            outer: outer.to(),
            inner: inner.to(),
            filter,
        },
        token: Pair::new(outer.input().clone(), inner.output().clone()),
        weight: semiring.times(outer.weight(), inner.weight()),
    }
}

/// Arc iterator for the [`Machine`] view of a composition.
pub struct ComposedArcs<'a, A, B, S>(ComposedTransitions<'a, A, B, S>)
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring;

impl<A, B, S> Iterator for ComposedArcs<'_, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    type Item = Edge<ComposedState, Pair<A::In, B::Out>, S::Weight>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|t| Edge {
            to: t.to,
            label: t.token,
            weight: t.weight,
        })
    }
}

impl<'a, A, B, S> Machine for Composition<'a, A, B, S>
where
    A: Token,
    B: Token<In = A::Out>,
    S: Semiring,
{
    type State = ComposedState;
    type Label = Pair<A::In, B::Out>;
    type Weight = S::Weight;
    type Arcs<'m>
        = ComposedArcs<'a, A, B, S>
    where
        Self: 'm;

    fn start(&self) -> ComposedState {
        Composition::start(self)
    }

    fn is_final(&self, state: &ComposedState) -> bool {
        Composition::is_final(self, state)
    }

    fn arcs<'m>(&'m self, state: &ComposedState) -> ComposedArcs<'a, A, B, S> {
        ComposedArcs(self.transitions(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Acceptor;
    use crate::traverse::{Path, PathWalker};
    use grammata_core::{LogDomain, LogProb, ProbabilitySemiring};
    use std::sync::{Arc, OnceLock};

    fn semiring() -> ProbabilitySemiring {
        static DOMAIN: OnceLock<Arc<LogDomain>> = OnceLock::new();
        ProbabilitySemiring::new(DOMAIN.get_or_init(|| Arc::new(LogDomain::default())).clone())
    }

    type Fst = Transducer<&'static str, &'static str, LogProb>;

    /// A linear transducer over `(input, output, weight)` edges; `""` is
    /// epsilon.
    fn chain(sr: &ProbabilitySemiring, edges: &[(&'static str, &'static str, f64)]) -> Fst {
        let sym = |s: &'static str| {
            if s.is_empty() {
                Symbol::Epsilon
            } else {
                Symbol::new(s)
            }
        };
        let mut t: Fst = Automaton::new();
        let mut state = t.start();
        for &(i, o, w) in edges {
            let next = t.add_state(false);
            t.add_pair_transition(state, next, sym(i), sym(o), sr.weight(w))
                .unwrap();
            state = next;
        }
        t.set_final(state, true).unwrap();
        t
    }

    fn accepted<M: Machine<Weight = LogProb>>(
        sr: &ProbabilitySemiring,
        m: &M,
    ) -> Vec<Path<M::Label, LogProb>> {
        PathWalker::new(m, sr, TraversalConfig::default()).collect()
    }

    #[test]
    fn matching_symbols_advance_both_sides() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "x", 0.5)]);
        let b = chain(&sr, &[("x", "1", 0.4)]);
        let c = Composition::new(&a, &b, &sr);
        let start = c.start();
        assert!(!c.is_final(&start));

        let out: Vec<_> = c.transitions(&start).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].token, Pair::of("a", "1"));
        assert_eq!(out[0].to.filter, FilterState::MoveBoth);
        assert_eq!(out[0].weight, sr.times(sr.weight(0.5), sr.weight(0.4)));
        assert!(c.is_final(&out[0].to));
    }

    #[test]
    fn mismatched_symbols_produce_nothing() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "x", 1.0)]);
        let b = chain(&sr, &[("y", "1", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        assert_eq!(c.transitions(&c.start()).count(), 0);
    }

    #[test]
    fn epsilon_interleavings_yield_one_path() {
        // Unfiltered, a:eps then eps:b, eps:b then a:eps, and the joint step
        // would each reach the final pair.
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 0.5)]);
        let b = chain(&sr, &[("", "b", 0.25)]);
        let c = Composition::new(&a, &b, &sr);

        let from_start: Vec<_> = c.transitions(&c.start()).collect();
        assert_eq!(from_start.len(), 3);

        let paths = accepted(&sr, &c);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].inputs(), vec![&"a"]);
        assert_eq!(paths[0].outputs(), vec![&"b"]);
        assert_eq!(paths[0].weight, sr.times(sr.weight(0.5), sr.weight(0.25)));
    }

    #[test]
    fn epsilon_runs_on_both_sides_pair_up_once() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0), ("b", "", 1.0)]);
        let b = chain(&sr, &[("", "x", 1.0), ("", "y", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let paths = accepted(&sr, &c);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].inputs(), vec![&"a", &"b"]);
        assert_eq!(paths[0].outputs(), vec![&"x", &"y"]);
    }

    #[test]
    fn unbalanced_epsilon_runs_pair_up_once() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0), ("b", "", 1.0)]);
        let b = chain(&sr, &[("", "x", 1.0)]);
        let paths = accepted(&sr, &Composition::new(&a, &b, &sr));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].outputs(), vec![&"x"]);
    }

    #[test]
    fn epsilons_around_a_match() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0), ("b", "m", 1.0)]);
        let b = chain(&sr, &[("", "x", 1.0), ("m", "y", 1.0)]);
        let paths = accepted(&sr, &Composition::new(&a, &b, &sr));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].inputs(), vec![&"a", &"b"]);
        assert_eq!(paths[0].outputs(), vec![&"x", &"y"]);
    }

    #[test]
    fn move_outer_blocks_inner_epsilons() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0)]);
        let b = chain(&sr, &[("", "b", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let state = ComposedState {
            filter: FilterState::MoveOuter,
            ..c.start()
        };
        let out: Vec<_> = c.transitions(&state).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].token, Pair::new(Symbol::new("a"), Symbol::Epsilon));
        assert_eq!(out[0].to.filter, FilterState::MoveOuter);
    }

    #[test]
    fn move_inner_blocks_outer_epsilons() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0)]);
        let b = chain(&sr, &[("", "b", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let state = ComposedState {
            filter: FilterState::MoveInner,
            ..c.start()
        };
        let out: Vec<_> = c.transitions(&state).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].token, Pair::new(Symbol::Epsilon, Symbol::new("b")));
    }

    #[test]
    fn invalid_state_has_no_transitions() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "x", 1.0)]);
        let b = chain(&sr, &[("x", "y", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let dead = ComposedState {
            filter: FilterState::Invalid,
            ..c.start()
        };
        assert_eq!(c.transitions(&dead).count(), 0);
    }

    #[test]
    fn finality_ignores_filter_state() {
        let sr = semiring();
        let mut a: Fst = Automaton::new();
        let mut b: Fst = Automaton::new();
        a.set_final(a.start(), true).unwrap();
        b.set_final(b.start(), true).unwrap();
        let c = Composition::new(&a, &b, &sr);
        for filter in [FilterState::MoveBoth, FilterState::MoveOuter, FilterState::MoveInner] {
            assert!(c.is_final(&ComposedState {
                filter,
                ..c.start()
            }));
        }
    }

    #[test]
    fn checked_rejects_disjoint_alphabets() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "x", 1.0)]);
        let b = chain(&sr, &[("y", "1", 1.0)]);
        assert!(matches!(
            Composition::checked(&a, &b, &sr),
            Err(FstError::DisjointAlphabets)
        ));
        let b = chain(&sr, &[("x", "1", 1.0)]);
        assert!(Composition::checked(&a, &b, &sr).is_ok());
        let eps_only = chain(&sr, &[("", "1", 1.0)]);
        assert!(Composition::checked(&a, &eps_only, &sr).is_ok());
    }

    #[test]
    fn materialize_keeps_dead_ends() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0)]);
        let b = chain(&sr, &[("", "b", 1.0)]);
        let t = Composition::new(&a, &b, &sr)
            .materialize(&TraversalConfig::default())
            .unwrap();
        assert_eq!(t.state_count(), 4);
        assert_eq!(t.transition_count(), 3);
        assert_eq!(t.final_states().count(), 1);
        assert_eq!(
            t.transitions_on(t.start(), &Symbol::new("a"))
                .filter(|tr| *tr.output() == Symbol::new("b"))
                .count(),
            1
        );
    }

    #[test]
    fn materialize_respects_state_limit() {
        let sr = semiring();
        let a = chain(&sr, &[("a", "", 1.0)]);
        let b = chain(&sr, &[("", "b", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let err = c
            .materialize(&TraversalConfig::default().with_max_states(2))
            .unwrap_err();
        assert_eq!(err, FstError::StateLimit { limit: 2 });
    }

    #[test]
    fn acceptor_as_outer_side() {
        let sr = semiring();
        let mut a: Acceptor<&str, LogProb> = Automaton::new();
        let s = a.start();
        let f = a.add_state(true);
        a.add_transition(s, f, Symbol::new("x"), sr.weight(0.5)).unwrap();
        let b = chain(&sr, &[("x", "X", 1.0)]);
        let c = Composition::new(&a, &b, &sr);
        let paths = accepted(&sr, &c);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].labels, vec![Pair::of("x", "X")]);
    }

    #[test]
    fn composed_cycles_stay_lazy() {
        let sr = semiring();
        let mut a: Fst = Automaton::new();
        let s = a.start();
        a.set_final(s, true).unwrap();
        a.add_pair_transition(s, s, Symbol::new("a"), Symbol::new("x"), sr.weight(0.5))
            .unwrap();
        let mut b: Fst = Automaton::new();
        let t = b.start();
        b.set_final(t, true).unwrap();
        b.add_pair_transition(t, t, Symbol::new("x"), Symbol::new("y"), sr.weight(0.5))
            .unwrap();
        let c = Composition::new(&a, &b, &sr);
        let first: Vec<_> = c.transitions(&c.start()).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].to, c.start());
        let m = c.materialize(&TraversalConfig::default()).unwrap();
        assert_eq!(m.state_count(), 1);
        assert_eq!(m.transition_count(), 1);
    }
}
