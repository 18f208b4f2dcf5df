// Regular-expression-style combinator trees
//
// An `Expr` is pure data. It allocates nothing until handed to a
// `Compiler`, so the same expression can be compiled into several automata.
// Trees built by folding a word list are as deep as the list is long, so
// compiling and dropping never recurse on the tree.

use std::mem;
use std::ops::{BitOr, Mul, Not, Shr};

use grammata_core::Symbol;

use crate::token::{Pair, Token};

/// A combinator tree over labels of type `T`.
///
/// `T` is `Symbol<S>` for acceptors and `Pair<I, O>` for transducers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<T> {
    /// Consumes nothing.
    Epsilon,
    /// A single labelled edge.
    Token(T),
    Concat(Box<Expr<T>>, Box<Expr<T>>),
    Alt(Box<Expr<T>>, Box<Expr<T>>),
    /// Zero or more.
    Kleene(Box<Expr<T>>),
    /// One or more.
    Positive(Box<Expr<T>>),
    Optional(Box<Expr<T>>),
    /// `E` with an explicit branch weight. Only meaningful as an operand of
    /// `Alt`, `Kleene`, `Positive` or `Optional`.
    Weighted(f64, Box<Expr<T>>),
}

impl<T> Expr<T> {
    pub fn token(token: T) -> Self {
        Expr::Token(token)
    }

    pub fn epsilon() -> Self {
        Expr::Epsilon
    }

    pub fn then(self, next: Expr<T>) -> Self {
        Expr::Concat(Box::new(self), Box::new(next))
    }

    pub fn or(self, other: Expr<T>) -> Self {
        Expr::Alt(Box::new(self), Box::new(other))
    }

    pub fn star(self) -> Self {
        Expr::Kleene(Box::new(self))
    }

    pub fn plus(self) -> Self {
        Expr::Positive(Box::new(self))
    }

    pub fn opt(self) -> Self {
        Expr::Optional(Box::new(self))
    }

    pub fn weighted(self, weight: f64) -> Self {
        Expr::Weighted(weight, Box::new(self))
    }

    /// The explicit weight of a `Weighted` node, if this is one.
    pub fn branch_weight(&self) -> Option<f64> {
        match self {
            Expr::Weighted(w, _) => Some(*w),
            _ => None,
        }
    }

    /// The operand under any `Weighted` wrappers.
    pub fn without_weight(&self) -> &Expr<T> {
        let mut expr = self;
        while let Expr::Weighted(_, inner) = expr {
            expr = &**inner;
        }
        expr
    }

    /// Concatenation of every item in order. Empty input gives `Epsilon`.
    pub fn sequence<I: IntoIterator<Item = Expr<T>>>(items: I) -> Self {
        items
            .into_iter()
            .reduce(Expr::then)
            .unwrap_or(Expr::Epsilon)
    }

    // Move the children out so they are dropped from `stack`, not through
    // the box chain.
    fn detach(&mut self, stack: &mut Vec<Expr<T>>) {
        match self {
            Expr::Concat(a, b) | Expr::Alt(a, b) => {
                stack.push(mem::replace(&mut **a, Expr::Epsilon));
                stack.push(mem::replace(&mut **b, Expr::Epsilon));
            }
            Expr::Kleene(e) | Expr::Positive(e) | Expr::Optional(e) | Expr::Weighted(_, e) => {
                stack.push(mem::replace(&mut **e, Expr::Epsilon));
            }
            Expr::Epsilon | Expr::Token(_) => {}
        }
    }
}

impl<T: Token> Expr<T> {
    /// An edge that reads `value`. On a transducer it writes nothing.
    pub fn input(value: T::In) -> Self {
        Expr::Token(T::from_input(Symbol::Value(value)))
    }

    /// An edge that writes `value`. On a transducer it reads nothing.
    pub fn output(value: T::Out) -> Self {
        Expr::Token(T::from_output(Symbol::Value(value)))
    }
}

impl<S> Expr<Symbol<S>> {
    /// An acceptor edge on a concrete symbol.
    pub fn symbol(value: S) -> Self {
        Expr::Token(Symbol::Value(value))
    }
}

impl<I, O> Expr<Pair<I, O>> {
    /// A transducer edge mapping `input` to `output`.
    pub fn pair(input: I, output: O) -> Self {
        Expr::Token(Pair::of(input, output))
    }
}

pub fn symbol<S>(value: S) -> Expr<Symbol<S>> {
    Expr::symbol(value)
}

pub fn pair<I, O>(input: I, output: O) -> Expr<Pair<I, O>> {
    Expr::pair(input, output)
}

pub fn input<T: Token>(value: T::In) -> Expr<T> {
    Expr::input(value)
}

pub fn output<T: Token>(value: T::Out) -> Expr<T> {
    Expr::output(value)
}

pub fn epsilon<T>() -> Expr<T> {
    Expr::Epsilon
}

pub fn concat<T>(a: Expr<T>, b: Expr<T>) -> Expr<T> {
    a.then(b)
}

pub fn alt<T>(a: Expr<T>, b: Expr<T>) -> Expr<T> {
    a.or(b)
}

pub fn kleene<T>(e: Expr<T>) -> Expr<T> {
    e.star()
}

pub fn positive<T>(e: Expr<T>) -> Expr<T> {
    e.plus()
}

pub fn optional<T>(e: Expr<T>) -> Expr<T> {
    e.opt()
}

pub fn weighted<T>(weight: f64, e: Expr<T>) -> Expr<T> {
    e.weighted(weight)
}

impl<T> Drop for Expr<T> {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach(&mut stack);
        while let Some(mut expr) = stack.pop() {
            expr.detach(&mut stack);
        }
    }
}

/// `a >> b` concatenates.
impl<T> Shr for Expr<T> {
    type Output = Expr<T>;

    fn shr(self, rhs: Expr<T>) -> Expr<T> {
        self.then(rhs)
    }
}

/// `a | b` alternates.
impl<T> BitOr for Expr<T> {
    type Output = Expr<T>;

    fn bitor(self, rhs: Expr<T>) -> Expr<T> {
        self.or(rhs)
    }
}

/// `!a` makes `a` optional.
impl<T> Not for Expr<T> {
    type Output = Expr<T>;

    fn not(self) -> Expr<T> {
        self.opt()
    }
}

/// `0.3 * a` attaches a branch weight.
impl<T> Mul<Expr<T>> for f64 {
    type Output = Expr<T>;

    fn mul(self, rhs: Expr<T>) -> Expr<T> {
        rhs.weighted(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_the_expected_tree() {
        let e = symbol("a") >> (symbol("b") | 0.3 * symbol("c"));
        let expected = Expr::Concat(
            Box::new(Expr::Token(Symbol::new("a"))),
            Box::new(Expr::Alt(
                Box::new(Expr::Token(Symbol::new("b"))),
                Box::new(Expr::Weighted(0.3, Box::new(Expr::Token(Symbol::new("c"))))),
            )),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn not_is_optional() {
        assert_eq!(!symbol('x'), optional(symbol('x')));
    }

    #[test]
    fn method_and_free_function_forms_agree() {
        assert_eq!(symbol(1).star(), kleene(symbol(1)));
        assert_eq!(symbol(1).plus(), positive(symbol(1)));
        assert_eq!(weighted(0.2, symbol(1)), 0.2 * symbol(1));
        assert_eq!(concat(symbol(1), symbol(2)), symbol(1) >> symbol(2));
        assert_eq!(alt(symbol(1), symbol(2)), symbol(1) | symbol(2));
    }

    #[test]
    fn branch_weight_only_on_weighted() {
        assert_eq!((0.7 * symbol('a')).branch_weight(), Some(0.7));
        assert_eq!(symbol('a').branch_weight(), None);
        assert_eq!(symbol('a').star().weighted(0.1).branch_weight(), Some(0.1));
    }

    #[test]
    fn sequence_folds_left() {
        let e = Expr::sequence(['a', 'b', 'c'].map(symbol));
        assert_eq!(e, (symbol('a') >> symbol('b')) >> symbol('c'));
        assert_eq!(Expr::<Symbol<char>>::sequence([]), Expr::Epsilon);
    }

    #[test]
    fn pair_builds_transducer_token() {
        assert_eq!(pair('a', 1u8), Expr::Token(Pair::of('a', 1u8)));
    }

    #[test]
    fn one_sided_transducer_edges() {
        let read: Expr<Pair<char, u8>> = input('a');
        assert_eq!(read, Expr::Token(Pair::new(Symbol::new('a'), Symbol::Epsilon)));
        let write: Expr<Pair<char, u8>> = output(7);
        assert_eq!(write, Expr::Token(Pair::new(Symbol::Epsilon, Symbol::new(7))));
    }

    #[test]
    fn one_sided_acceptor_edges_are_plain_symbols() {
        assert_eq!(Expr::<Symbol<char>>::input('a'), symbol('a'));
        assert_eq!(Expr::<Symbol<char>>::output('a'), symbol('a'));
    }

    #[test]
    fn without_weight_peels_every_wrapper() {
        let e = 0.2 * (0.4 * symbol('a'));
        assert_eq!(e.without_weight(), &symbol('a'));
        assert_eq!(symbol('b').without_weight(), &symbol('b'));
    }

    #[test]
    fn deep_trees_drop_without_overflow() {
        let n = 100_000u32;
        let alternation = (0..n).map(symbol).reduce(|a, b| a | b).unwrap();
        drop(alternation);
        let sequence = Expr::sequence((0..n).map(symbol));
        drop(sequence);
        let nested = (0..n).fold(symbol(0u32), |e, i| match i % 3 {
            0 => e.star(),
            1 => !e,
            _ => 0.5 * e,
        });
        drop(nested);
    }
}
