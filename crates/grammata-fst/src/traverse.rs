// Depth-first path enumeration
//
// Works on any `Machine`, so compiled automata and lazy compositions are
// walked the same way. The DFS stack is explicit, one frame per state on the
// current path.

use grammata_core::Semiring;
use log::{trace, warn};

use crate::config::TraversalConfig;
use crate::token::Token;
use crate::Machine;

/// An accepted path: its labels from start to a final state and the product
/// of their weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<L, W> {
    pub labels: Vec<L>,
    pub weight: W,
}

impl<L: Token, W> Path<L, W> {
    /// Concrete input symbols along the path.
    pub fn inputs(&self) -> Vec<&L::In> {
        self.labels
            .iter()
            .filter_map(|l| l.input().as_option())
            .collect()
    }

    /// Concrete output symbols along the path.
    pub fn outputs(&self) -> Vec<&L::Out> {
        self.labels
            .iter()
            .filter_map(|l| l.output().as_option())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

struct Frame<'m, M: Machine + 'm> {
    state: M::State,
    weight: M::Weight,
    arcs: M::Arcs<'m>,
    final_checked: bool,
}

/// Iterator over the accepted paths of a machine, depth-first.
///
/// Arcs are followed in the order the machine yields them. Paths whose
/// weight becomes zero are pruned. Cycles are cut at `max_depth` labels, and
/// a single `next` call gives up after `max_steps` arc visits; both cases
/// log a warning once.
pub struct PathWalker<'m, M: Machine, S> {
    machine: &'m M,
    semiring: &'m S,
    config: TraversalConfig,
    stack: Vec<Frame<'m, M>>,
    labels: Vec<M::Label>,
    depth_cut: bool,
}

impl<'m, M, S> PathWalker<'m, M, S>
where
    M: Machine,
    S: Semiring<Weight = M::Weight>,
{
    pub fn new(machine: &'m M, semiring: &'m S, config: TraversalConfig) -> Self {
        let start = machine.start();
        let arcs = machine.arcs(&start);
        let stack = vec![Frame {
            state: start,
            weight: semiring.one(),
            arcs,
            final_checked: false,
        }];
        PathWalker {
            machine,
            semiring,
            config,
            stack,
            labels: Vec::new(),
            depth_cut: false,
        }
    }

    /// Whether some path was cut at `max_depth`.
    pub fn truncated(&self) -> bool {
        self.depth_cut
    }
}

impl<'m, M, S> Iterator for PathWalker<'m, M, S>
where
    M: Machine,
    S: Semiring<Weight = M::Weight>,
{
    type Item = Path<M::Label, M::Weight>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut steps = 0u32;
        loop {
            let depth = self.labels.len();
            let frame = self.stack.last_mut()?;
            if !frame.final_checked {
                frame.final_checked = true;
                if self.machine.is_final(&frame.state) {
                    trace!("accepted path of length {depth}");
                    return Some(Path {
                        labels: self.labels.clone(),
                        weight: frame.weight,
                    });
                }
            }

            if depth >= self.config.max_depth {
                if !self.depth_cut {
                    warn!("path enumeration cut at depth {}", self.config.max_depth);
                    self.depth_cut = true;
                }
                self.stack.pop();
                self.labels.pop();
                continue;
            }

            let Some(edge) = frame.arcs.next() else {
                self.stack.pop();
                self.labels.pop();
                continue;
            };
            let weight = self.semiring.times(frame.weight, edge.weight);

            steps += 1;
            if steps > self.config.max_steps {
                warn!(
                    "path enumeration stopped after {} steps without a result",
                    self.config.max_steps
                );
                self.stack.clear();
                return None;
            }
            if self.semiring.is_zero(weight) {
                continue;
            }

            let arcs = self.machine.arcs(&edge.to);
            self.labels.push(edge.label);
            self.stack.push(Frame {
                state: edge.to,
                weight,
                arcs,
                final_checked: false,
            });
        }
    }
}
