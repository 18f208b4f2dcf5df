// Epsilon filter for composition
//
// Without a filter, an outer epsilon-output edge and an inner
// epsilon-input edge can be taken in either order (or together), and the
// product contains one copy of the same logical path per interleaving. The
// filter tracks which side moved last and rejects every interleaving but
// one.

/// Filter component of a composed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterState {
    /// Either side may move.
    MoveBoth,
    /// The outer side took an epsilon alone; it may continue, or both may
    /// match.
    MoveOuter,
    /// The inner side took an epsilon alone.
    MoveInner,
    /// Dead. Nothing leaves this state.
    Invalid,
}

/// Kind of a composed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Both sides advance on the same concrete intermediate symbol.
    Match,
    /// The outer side advances on an epsilon output; the inner side waits.
    Outer,
    /// The inner side advances on an epsilon input; the outer side waits.
    Inner,
    /// Both sides advance on epsilon together.
    Epsilons,
}

use FilterState::{Invalid, MoveBoth, MoveInner, MoveOuter};

// Rows: current state. Columns: Match, Outer, Inner, Epsilons.
const TABLE: [[FilterState; 4]; 4] = [
    [MoveBoth, MoveOuter, MoveInner, MoveBoth],
    [MoveBoth, MoveOuter, Invalid, Invalid],
    [MoveBoth, Invalid, MoveInner, Invalid],
    [Invalid, Invalid, Invalid, Invalid],
];

impl FilterState {
    /// State after taking `mv` from `self`.
    #[inline]
    pub const fn step(self, mv: Move) -> FilterState {
        TABLE[self as usize][mv as usize]
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Invalid)
    }

    /// Whether `mv` may be taken from `self`.
    #[inline]
    pub const fn allows(self, mv: Move) -> bool {
        self.step(mv).is_valid()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        MoveBoth
    }
}
