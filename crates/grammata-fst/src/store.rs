// Arena-backed automaton store
//
// States and transitions live in generation-checked slot vectors owned by a
// single `Automaton`. Transitions refer to states by `StateId`, so removing a
// state leaves stale handles that lookups reject rather than dangling
// references.

use std::fmt;
use std::slice;

use grammata_core::Symbol;
use hashbrown::HashMap;
use hashbrown::hash_map;

use crate::token::{Alphabet, Pair, Token};
use crate::{Edge, FstError, Machine};

/// Handle to a state in one automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId {
    index: u32,
    generation: u32,
}

impl StateId {
    /// Slot index. Unique among live states of one automaton.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.index)
    }
}

/// Handle to a transition in one automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId {
    index: u32,
    generation: u32,
}

impl TransitionId {
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.index)
    }
}

struct Slot<D> {
    generation: u32,
    data: Option<D>,
}

/// Slot vector with a free list. Removing bumps the slot generation so old
/// handles stop resolving.
struct Arena<D> {
    slots: Vec<Slot<D>>,
    free: Vec<u32>,
    live: usize,
}

impl<D> Arena<D> {
    fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    fn insert_with(&mut self, make: impl FnOnce(u32, u32) -> D) -> (u32, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(make(index, slot.generation));
            return (index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            data: Some(make(index, 0)),
        });
        (index, 0)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&D> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.data.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut D> {
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.data.as_mut())
    }

    /// Lookup by index alone, for indices held in internal lists.
    fn live(&self, index: u32) -> Option<&D> {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.data.as_ref())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<D> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let data = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(data)
    }

    fn iter(&self) -> impl Iterator<Item = (u32, u32, &D)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.data
                .as_ref()
                .map(|data| (index as u32, slot.generation, data))
        })
    }
}

/// Per-state bookkeeping: finality, in-degree, and the outgoing indexes.
struct StateData<T: Token> {
    is_final: bool,
    /// Transitions from other states that target this one. Self-loops are
    /// owned by the state itself and not counted.
    incoming: u32,
    outgoing: Vec<u32>,
    by_input: HashMap<Symbol<T::In>, Vec<u32>>,
    /// Only populated for transducers.
    by_output: HashMap<Symbol<T::Out>, Vec<u32>>,
    /// Ascending by weight, ties in insertion order.
    by_weight: Vec<u32>,
}

impl<T: Token> StateData<T> {
    fn new(is_final: bool) -> Self {
        StateData {
            is_final,
            incoming: 0,
            outgoing: Vec::new(),
            by_input: HashMap::new(),
            by_output: HashMap::new(),
            by_weight: Vec::new(),
        }
    }
}

fn unlink(list: &mut Vec<u32>, index: u32) {
    if let Some(pos) = list.iter().position(|&i| i == index) {
        list.remove(pos);
    }
}

/// A weighted transition. Owned by its source state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T, W> {
    id: TransitionId,
    from: StateId,
    to: StateId,
    token: T,
    weight: W,
}

impl<T, W: Copy> Transition<T, W> {
    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn from(&self) -> StateId {
        self.from
    }

    pub fn to(&self) -> StateId {
        self.to
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn weight(&self) -> W {
        self.weight
    }
}

impl<T: Token, W: Copy> Transition<T, W> {
    pub fn input(&self) -> &Symbol<T::In> {
        self.token.input()
    }

    pub fn output(&self) -> &Symbol<T::Out> {
        self.token.output()
    }

    pub fn edge(&self) -> Edge<StateId, T, W> {
        Edge {
            to: self.to,
            label: self.token.clone(),
            weight: self.weight,
        }
    }
}

/// Iterator over a list of transitions of one state.
pub struct Transitions<'a, T, W> {
    indices: slice::Iter<'a, u32>,
    arena: &'a Arena<Transition<T, W>>,
}

impl<'a, T, W> Transitions<'a, T, W> {
    fn empty(arena: &'a Arena<Transition<T, W>>) -> Self {
        Transitions {
            indices: <&[u32]>::default().iter(),
            arena,
        }
    }
}

impl<'a, T, W> Iterator for Transitions<'a, T, W> {
    type Item = &'a Transition<T, W>;

    fn next(&mut self) -> Option<Self::Item> {
        let arena = self.arena;
        self.indices.by_ref().find_map(|&i| arena.live(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.indices.len()))
    }
}

impl<T, W> DoubleEndedIterator for Transitions<'_, T, W> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let arena = self.arena;
        self.indices.by_ref().rev().find_map(|&i| arena.live(i))
    }
}

/// Transitions of one state grouped by output symbol.
pub struct GroupedTransitions<'a, T, O, W> {
    groups: Option<hash_map::Iter<'a, Symbol<O>, Vec<u32>>>,
    current: Transitions<'a, T, W>,
}

impl<'a, T, O, W> Iterator for GroupedTransitions<'a, T, O, W> {
    type Item = &'a Transition<T, W>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(t) = self.current.next() {
                return Some(t);
            }
            let (_, list) = self.groups.as_mut()?.next()?;
            self.current.indices = list.iter();
        }
    }
}

/// Arena-backed acceptor or transducer.
///
/// Has exactly one start state, allocated by [`Automaton::new`] and never
/// removable. Transition handles stay valid until that transition is
/// removed; iterators borrow the store, so no mutation can happen while one
/// is alive.
pub struct Automaton<T: Token, W> {
    states: Arena<StateData<T>>,
    transitions: Arena<Transition<T, W>>,
    start: StateId,
}

/// Automaton labelled by single symbols.
pub type Acceptor<S, W> = Automaton<Symbol<S>, W>;

/// Automaton labelled by input/output symbol pairs.
pub type Transducer<I, O, W> = Automaton<Pair<I, O>, W>;

impl<T: Token, W: Copy + Ord> Automaton<T, W> {
    pub fn new() -> Self {
        let mut states = Arena::new();
        let (index, generation) = states.insert_with(|_, _| StateData::new(false));
        Automaton {
            states,
            transitions: Arena::new(),
            start: StateId { index, generation },
        }
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn add_state(&mut self, is_final: bool) -> StateId {
        let (index, generation) = self.states.insert_with(|_, _| StateData::new(is_final));
        StateId { index, generation }
    }

    pub fn contains_state(&self, state: StateId) -> bool {
        self.state(state).is_some()
    }

    /// `false` for unknown states.
    pub fn is_final(&self, state: StateId) -> bool {
        self.state(state).is_some_and(|s| s.is_final)
    }

    pub fn set_final(&mut self, state: StateId, is_final: bool) -> Result<(), FstError> {
        self.state_mut(state)?.is_final = is_final;
        Ok(())
    }

    /// Remove a state together with its outgoing transitions.
    ///
    /// Transitions from other states into `state` must be removed first.
    pub fn remove_state(&mut self, state: StateId) -> Result<(), FstError> {
        if state == self.start {
            return Err(FstError::StartStateRemoval);
        }
        let data = self.state(state).ok_or(FstError::UnknownState(state))?;
        if data.incoming > 0 {
            return Err(FstError::StateHasIncoming {
                state,
                incoming: data.incoming,
            });
        }
        let data = self
            .states
            .remove(state.index, state.generation)
            .ok_or(FstError::UnknownState(state))?;
        for index in data.outgoing {
            let Some(t) = self.transitions.live(index) else {
                continue;
            };
            let (generation, to) = (t.id.generation, t.to);
            self.transitions.remove(index, generation);
            if to != state {
                if let Ok(target) = self.state_mut(to) {
                    target.incoming = target.incoming.saturating_sub(1);
                }
            }
        }
        log::trace!("removed state {state}");
        Ok(())
    }

    pub fn add_transition(
        &mut self,
        from: StateId,
        to: StateId,
        token: T,
        weight: W,
    ) -> Result<TransitionId, FstError> {
        if !self.contains_state(from) {
            return Err(FstError::UnknownState(from));
        }
        if !self.contains_state(to) {
            return Err(FstError::UnknownState(to));
        }
        let input = token.input().clone();
        let output = T::IS_TRANSDUCER.then(|| token.output().clone());
        let (index, generation) = self.transitions.insert_with(|index, generation| Transition {
            id: TransitionId { index, generation },
            from,
            to,
            token,
            weight,
        });

        let transitions = &self.transitions;
        let source = self
            .states
            .get_mut(from.index, from.generation)
            .ok_or(FstError::UnknownState(from))?;
        source.outgoing.push(index);
        source.by_input.entry(input).or_default().push(index);
        if let Some(output) = output {
            source.by_output.entry(output).or_default().push(index);
        }
        let pos = source.by_weight.partition_point(|&i| {
            transitions
                .live(i)
                .is_some_and(|t| t.weight <= weight)
        });
        source.by_weight.insert(pos, index);

        if to != from {
            self.state_mut(to)?.incoming += 1;
        }
        Ok(TransitionId { index, generation })
    }

    /// Remove a transition and return it.
    pub fn remove_transition(&mut self, id: TransitionId) -> Result<Transition<T, W>, FstError> {
        let t = self
            .transitions
            .remove(id.index, id.generation)
            .ok_or(FstError::UnknownTransition(id))?;
        let source = self.state_mut(t.from)?;
        unlink(&mut source.outgoing, id.index);
        unlink(&mut source.by_weight, id.index);
        if let Some(list) = source.by_input.get_mut(t.token.input()) {
            unlink(list, id.index);
            if list.is_empty() {
                source.by_input.remove(t.token.input());
            }
        }
        if let Some(list) = source.by_output.get_mut(t.token.output()) {
            unlink(list, id.index);
            if list.is_empty() {
                source.by_output.remove(t.token.output());
            }
        }
        if t.to != t.from {
            let target = self.state_mut(t.to)?;
            target.incoming = target.incoming.saturating_sub(1);
        }
        Ok(t)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition<T, W>> {
        self.transitions.get(id.index, id.generation)
    }

    /// All live states, start state first.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .iter()
            .map(|(index, generation, _)| StateId { index, generation })
    }

    pub fn final_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .iter()
            .filter(|(_, _, data)| data.is_final)
            .map(|(index, generation, _)| StateId { index, generation })
    }

    pub fn state_count(&self) -> usize {
        self.states.live
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.live
    }

    /// Number of transitions from other states into `state`.
    pub fn incoming_count(&self, state: StateId) -> Option<u32> {
        self.state(state).map(|s| s.incoming)
    }

    /// Outgoing transitions in insertion order.
    pub fn transitions(&self, state: StateId) -> Transitions<'_, T, W> {
        match self.state(state) {
            Some(data) => self.iter_list(&data.outgoing),
            None => Transitions::empty(&self.transitions),
        }
    }

    /// Outgoing transitions whose input symbol equals `input`.
    pub fn transitions_on(&self, state: StateId, input: &Symbol<T::In>) -> Transitions<'_, T, W> {
        match self.state(state).and_then(|data| data.by_input.get(input)) {
            Some(list) => self.iter_list(list),
            None => Transitions::empty(&self.transitions),
        }
    }

    /// Outgoing transitions in ascending weight order.
    pub fn transitions_by_weight(&self, state: StateId) -> Transitions<'_, T, W> {
        match self.state(state) {
            Some(data) => self.iter_list(&data.by_weight),
            None => Transitions::empty(&self.transitions),
        }
    }

    pub fn all_transitions(&self) -> impl Iterator<Item = &Transition<T, W>> + '_ {
        self.transitions.iter().map(|(_, _, t)| t)
    }

    fn iter_list<'a>(&'a self, list: &'a [u32]) -> Transitions<'a, T, W> {
        Transitions {
            indices: list.iter(),
            arena: &self.transitions,
        }
    }

    fn state(&self, id: StateId) -> Option<&StateData<T>> {
        self.states.get(id.index, id.generation)
    }

    fn state_mut(&mut self, id: StateId) -> Result<&mut StateData<T>, FstError> {
        self.states
            .get_mut(id.index, id.generation)
            .ok_or(FstError::UnknownState(id))
    }
}

impl<I: Alphabet, O: Alphabet, W: Copy + Ord> Automaton<Pair<I, O>, W> {
    /// Add a transducer transition from separate input and output symbols.
    pub fn add_pair_transition(
        &mut self,
        from: StateId,
        to: StateId,
        input: Symbol<I>,
        output: Symbol<O>,
        weight: W,
    ) -> Result<TransitionId, FstError> {
        self.add_transition(from, to, Pair::new(input, output), weight)
    }

    /// Outgoing transitions grouped by output symbol.
    pub fn inverse_transitions(&self, state: StateId) -> GroupedTransitions<'_, Pair<I, O>, O, W> {
        GroupedTransitions {
            groups: self.state(state).map(|data| data.by_output.iter()),
            current: Transitions::empty(&self.transitions),
        }
    }

    /// Outgoing transitions whose output symbol equals `output`.
    pub fn inverse_transitions_on(
        &self,
        state: StateId,
        output: &Symbol<O>,
    ) -> Transitions<'_, Pair<I, O>, W> {
        match self.state(state).and_then(|data| data.by_output.get(output)) {
            Some(list) => self.iter_list(list),
            None => Transitions::empty(&self.transitions),
        }
    }
}

impl<T: Token, W: Copy + Ord> Default for Automaton<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Token, W> fmt::Debug for Automaton<T, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Automaton")
            .field("start", &self.start)
            .field("states", &self.states.live)
            .field("transitions", &self.transitions.live)
            .finish()
    }
}

/// Arc iterator for the [`Machine`] view of an automaton.
pub struct AutomatonArcs<'a, T, W>(Transitions<'a, T, W>);

impl<T: Token, W: Copy> Iterator for AutomatonArcs<'_, T, W> {
    type Item = Edge<StateId, T, W>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(Transition::edge)
    }
}

impl<T: Token, W: Copy + Ord + fmt::Debug> Machine for Automaton<T, W> {
    type State = StateId;
    type Label = T;
    type Weight = W;
    type Arcs<'a>
        = AutomatonArcs<'a, T, W>
    where
        Self: 'a;

    fn start(&self) -> StateId {
        self.start
    }

    fn is_final(&self, state: &StateId) -> bool {
        Automaton::is_final(self, *state)
    }

    fn arcs<'a>(&'a self, state: &StateId) -> AutomatonArcs<'a, T, W> {
        AutomatonArcs(self.transitions(*state))
    }
}
