// Transition labels: single symbols for acceptors, symbol pairs for
// transducers.

use std::fmt;
use std::hash::Hash;

use grammata_core::Symbol;

/// Bounds shared by every alphabet value type.
pub trait Alphabet: Clone + Eq + Hash + Ord + fmt::Debug {}

impl<T: Clone + Eq + Hash + Ord + fmt::Debug> Alphabet for T {}

/// Label capability of an automaton, resolved statically per label type.
///
/// An acceptor label reads and writes the same symbol; a transducer label
/// carries separate input and output symbols.
pub trait Token: Clone + Eq + Hash + Ord + fmt::Debug {
    type In: Alphabet;
    type Out: Alphabet;

    /// Whether the store should keep an output-symbol index.
    const IS_TRANSDUCER: bool;

    fn input(&self) -> &Symbol<Self::In>;
    fn output(&self) -> &Symbol<Self::Out>;

    /// The label that consumes and produces nothing.
    fn epsilon() -> Self;

    /// Build a label from an input symbol alone. For transducers the
    /// output is epsilon.
    fn from_input(input: Symbol<Self::In>) -> Self;

    /// Build a label from an output symbol alone. For transducers the
    /// input is epsilon.
    fn from_output(output: Symbol<Self::Out>) -> Self;

    fn is_epsilon(&self) -> bool {
        self.input().is_epsilon() && self.output().is_epsilon()
    }
}

impl<S: Alphabet> Token for Symbol<S> {
    type In = S;
    type Out = S;

    const IS_TRANSDUCER: bool = false;

    #[inline]
    fn input(&self) -> &Symbol<S> {
        self
    }

    #[inline]
    fn output(&self) -> &Symbol<S> {
        self
    }

    fn epsilon() -> Self {
        Symbol::Epsilon
    }

    fn from_input(input: Symbol<S>) -> Self {
        input
    }

    fn from_output(output: Symbol<S>) -> Self {
        output
    }
}

/// Transducer label: an input symbol mapped to an output symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair<I, O> {
    pub input: Symbol<I>,
    pub output: Symbol<O>,
}

impl<I, O> Pair<I, O> {
    pub fn new(input: Symbol<I>, output: Symbol<O>) -> Self {
        Pair { input, output }
    }

    /// A pair of two concrete values.
    pub fn of(input: I, output: O) -> Self {
        Pair {
            input: Symbol::Value(input),
            output: Symbol::Value(output),
        }
    }
}

impl<I: Alphabet, O: Alphabet> Token for Pair<I, O> {
    type In = I;
    type Out = O;

    const IS_TRANSDUCER: bool = true;

    #[inline]
    fn input(&self) -> &Symbol<I> {
        &self.input
    }

    #[inline]
    fn output(&self) -> &Symbol<O> {
        &self.output
    }

    fn epsilon() -> Self {
        Pair::new(Symbol::Epsilon, Symbol::Epsilon)
    }

    fn from_input(input: Symbol<I>) -> Self {
        Pair::new(input, Symbol::Epsilon)
    }

    fn from_output(output: Symbol<O>) -> Self {
        Pair::new(Symbol::Epsilon, output)
    }
}

impl<I: fmt::Display, O: fmt::Display> fmt::Display for Pair<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptor_label_reads_and_writes_itself() {
        let s = Symbol::new('a');
        assert_eq!(s.input(), &Symbol::new('a'));
        assert_eq!(s.output(), &Symbol::new('a'));
        assert!(!<Symbol<char> as Token>::IS_TRANSDUCER);
        assert!(<Symbol<char> as Token>::epsilon().is_epsilon());
    }

    #[test]
    fn transducer_epsilon_is_a_pair_of_epsilons() {
        let eps = <Pair<char, u8> as Token>::epsilon();
        assert!(eps.input.is_epsilon());
        assert!(eps.output.is_epsilon());
        assert!(Token::is_epsilon(&eps));
        assert!(<Pair<char, u8> as Token>::IS_TRANSDUCER);
    }

    #[test]
    fn from_input_has_epsilon_output() {
        let p = <Pair<&str, &str> as Token>::from_input(Symbol::new("in"));
        assert_eq!(p, Pair::new(Symbol::new("in"), Symbol::Epsilon));
        assert!(!Token::is_epsilon(&p));
    }

    #[test]
    fn from_output_has_epsilon_input() {
        let p = <Pair<&str, &str> as Token>::from_output(Symbol::new("out"));
        assert_eq!(p, Pair::new(Symbol::Epsilon, Symbol::new("out")));
        assert_eq!(<Symbol<char> as Token>::from_output(Symbol::new('x')), Symbol::new('x'));
    }

    #[test]
    fn half_epsilon_pair_is_not_epsilon() {
        let p: Pair<char, char> = Pair::new(Symbol::Epsilon, Symbol::new('b'));
        assert!(!Token::is_epsilon(&p));
    }

    #[test]
    fn pairs_order_by_input_then_output() {
        let eps_out: Pair<char, char> = Pair::new(Symbol::new('a'), Symbol::Epsilon);
        assert!(eps_out < Pair::of('a', 'a'));
        assert!(Pair::of('a', 'z') < Pair::of('b', 'a'));
    }

    #[test]
    fn display() {
        assert_eq!(Pair::of("a", "b").to_string(), "a:b");
        let p: Pair<&str, &str> = Pair::new(Symbol::new("a"), Symbol::Epsilon);
        assert_eq!(p.to_string(), "a:<eps>");
    }
}
