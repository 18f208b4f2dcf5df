// Dangling-edge fragments
//
// A fragment is a partially built automaton piece. Its edges have one or
// both endpoints still open; combinators splice fragments by rewriting those
// edge lists, and only junction points introduce real states. `seal` turns
// the remaining open edges into transitions in one pass.

use grammata_core::Semiring;

use crate::store::{Automaton, StateId};
use crate::token::Token;
use crate::FstError;

/// Edge with both endpoints open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection<T, W> {
    pub token: T,
    pub weight: W,
}

/// Edge with an open source and a fixed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTo<T, W> {
    pub token: T,
    pub weight: W,
    pub to: StateId,
}

/// Edge with a fixed source and an open destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFrom<T, W> {
    pub from: StateId,
    pub token: T,
    pub weight: W,
}

/// A compiled sub-expression that is not yet attached to any start or
/// final state.
///
/// Dropping a fragment without sealing it discards whatever weight its
/// open edges carried.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<T, W> {
    connections: Vec<Connection<T, W>>,
    to: Vec<ConnectionTo<T, W>>,
    from: Vec<ConnectionFrom<T, W>>,
}

impl<T, W> Default for Fragment<T, W> {
    fn default() -> Self {
        Fragment {
            connections: Vec::new(),
            to: Vec::new(),
            from: Vec::new(),
        }
    }
}

impl<T, W> Fragment<T, W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single unattached edge.
    pub fn edge(token: T, weight: W) -> Self {
        Fragment {
            connections: vec![Connection { token, weight }],
            to: Vec::new(),
            from: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty() && self.to.is_empty() && self.from.is_empty()
    }

    pub fn connections(&self) -> &[Connection<T, W>] {
        &self.connections
    }

    pub fn to_edges(&self) -> &[ConnectionTo<T, W>] {
        &self.to
    }

    pub fn from_edges(&self) -> &[ConnectionFrom<T, W>] {
        &self.from
    }

    pub fn push_connection(&mut self, token: T, weight: W) {
        self.connections.push(Connection { token, weight });
    }

    pub fn push_to(&mut self, token: T, weight: W, to: StateId) {
        self.to.push(ConnectionTo { token, weight, to });
    }

    pub fn push_from(&mut self, from: StateId, token: T, weight: W) {
        self.from.push(ConnectionFrom { from, token, weight });
    }

    /// Parallel union of the edge lists. No state is introduced.
    pub fn merge(mut self, other: Fragment<T, W>) -> Self {
        self.connections.extend(other.connections);
        self.to.extend(other.to);
        self.from.extend(other.from);
        self
    }
}

impl<T: Token, W: Copy + Ord> Fragment<T, W> {
    /// Multiply every entry edge (connections and to-edges) by `factor`.
    ///
    /// From-edges leave states that are only reachable through entries, so
    /// they already carry the factor.
    pub fn scale_entries<S: Semiring<Weight = W>>(&mut self, semiring: &S, factor: W) {
        for c in &mut self.connections {
            c.weight = semiring.times(c.weight, factor);
        }
        for c in &mut self.to {
            c.weight = semiring.times(c.weight, factor);
        }
    }

    /// Sequence `self` then `next` through one new junction state.
    pub fn concat(
        self,
        next: Fragment<T, W>,
        store: &mut Automaton<T, W>,
    ) -> Result<Self, FstError> {
        let junction = store.add_state(false);
        for c in self.from {
            store.add_transition(c.from, junction, c.token, c.weight)?;
        }
        for c in next.to {
            store.add_transition(junction, c.to, c.token, c.weight)?;
        }

        let mut to = self.to;
        to.extend(self.connections.into_iter().map(|c| ConnectionTo {
            token: c.token,
            weight: c.weight,
            to: junction,
        }));
        let mut from = next.from;
        from.extend(next.connections.into_iter().map(|c| ConnectionFrom {
            from: junction,
            token: c.token,
            weight: c.weight,
        }));
        Ok(Fragment {
            connections: Vec::new(),
            to,
            from,
        })
    }

    /// Zero-or-more closure around one new loop state.
    ///
    /// Each pass through the body costs `repeat`; leaving the loop costs
    /// `exit`.
    pub fn closure<S: Semiring<Weight = W>>(
        self,
        store: &mut Automaton<T, W>,
        semiring: &S,
        repeat: W,
        exit: W,
    ) -> Result<Self, FstError> {
        let hub = store.add_state(false);
        self.attach_loop(store, semiring, hub, repeat)?;
        Ok(Fragment {
            connections: Vec::new(),
            to: vec![ConnectionTo {
                token: T::epsilon(),
                weight: semiring.one(),
                to: hub,
            }],
            from: vec![ConnectionFrom {
                from: hub,
                token: T::epsilon(),
                weight: exit,
            }],
        })
    }

    /// One-or-more closure. `self` is the mandatory first pass and `again`
    /// a second instance of the same body used for the repetitions.
    pub fn positive_closure<S: Semiring<Weight = W>>(
        self,
        again: Fragment<T, W>,
        store: &mut Automaton<T, W>,
        semiring: &S,
        repeat: W,
        exit: W,
    ) -> Result<Self, FstError> {
        let hub = store.add_state(false);
        for c in self.from {
            store.add_transition(c.from, hub, c.token, c.weight)?;
        }
        let mut to = self.to;
        to.extend(self.connections.into_iter().map(|c| ConnectionTo {
            token: c.token,
            weight: c.weight,
            to: hub,
        }));
        again.attach_loop(store, semiring, hub, repeat)?;
        Ok(Fragment {
            connections: Vec::new(),
            to,
            from: vec![ConnectionFrom {
                from: hub,
                token: T::epsilon(),
                weight: exit,
            }],
        })
    }

    /// Take `self` at weight `take`, or skip it with an epsilon at `skip`.
    pub fn optional<S: Semiring<Weight = W>>(mut self, semiring: &S, take: W, skip: W) -> Self {
        self.scale_entries(semiring, take);
        self.push_connection(T::epsilon(), skip);
        self
    }

    /// Close every open edge on `hub`, scaling entries by `repeat`.
    fn attach_loop<S: Semiring<Weight = W>>(
        self,
        store: &mut Automaton<T, W>,
        semiring: &S,
        hub: StateId,
        repeat: W,
    ) -> Result<(), FstError> {
        for c in self.connections {
            store.add_transition(hub, hub, c.token, semiring.times(c.weight, repeat))?;
        }
        for c in self.to {
            store.add_transition(hub, c.to, c.token, semiring.times(c.weight, repeat))?;
        }
        for c in self.from {
            store.add_transition(c.from, hub, c.token, c.weight)?;
        }
        Ok(())
    }

    /// Attach the fragment at `start` and return its final state.
    ///
    /// Open sources become `start`. Open destinations share one final state,
    /// allocated the first time one is needed. A fragment with no open
    /// destination at all makes `start` itself final.
    pub fn seal(self, store: &mut Automaton<T, W>, start: StateId) -> Result<StateId, FstError> {
        if !store.contains_state(start) {
            return Err(FstError::UnknownState(start));
        }
        let mut terminal: Option<StateId> = None;
        for c in self.connections {
            let end = *terminal.get_or_insert_with(|| store.add_state(true));
            store.add_transition(start, end, c.token, c.weight)?;
        }
        for c in self.to {
            store.add_transition(start, c.to, c.token, c.weight)?;
        }
        for c in self.from {
            let end = *terminal.get_or_insert_with(|| store.add_state(true));
            store.add_transition(c.from, end, c.token, c.weight)?;
        }
        match terminal {
            Some(end) => Ok(end),
            None => {
                store.set_final(start, true)?;
                Ok(start)
            }
        }
    }
}
