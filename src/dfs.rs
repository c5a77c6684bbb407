//! Exhaustive depth-first exploration of a [KripkeStructure].
//!
//! Applied to a [Simulator](crate::futures::Simulator), this runs a scenario under every
//! possible task interleaving, which is how async races between select cases are checked
//! without asserting any particular winner.

use crate::KripkeStructure;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DfsError {
    #[error("depth exceeded max depth {0}")]
    MaxDepthExceeded(usize),
}

/// The current path: the label taken at each depth, and the labels still to try there.
#[derive(Clone, Debug)]
struct PathState<T, I> {
    iters: Vec<I>,
    items: Vec<T>,
}

impl<T, I> PathState<T, I>
where
    T: Copy,
    I: Iterator<Item = T>,
{
    fn new() -> Self {
        Self {
            iters: Vec::new(),
            items: Vec::new(),
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    fn depth(&self) -> usize {
        self.items.len()
    }

    /// Descend along the first label of `successors`. Returns false at the end of a trajectory.
    #[inline]
    fn append(&mut self, successors: Option<I>) -> bool {
        let Some(mut iter) = successors else {
            return false;
        };
        match iter.next() {
            None => false,
            Some(item) => {
                self.iters.push(iter);
                self.items.push(item);
                true
            }
        }
    }

    /// Move to the next unexplored sibling, backtracking as needed. Returns false when the
    /// whole space has been explored.
    #[inline]
    fn advance(&mut self) -> bool {
        while let Some(iter) = self.iters.last_mut() {
            if let Some(item) = iter.next() {
                if let Some(last) = self.items.last_mut() {
                    *last = item;
                }
                return true;
            }
            self.iters.pop();
            self.items.pop();
        }
        false
    }
}

/// Visit every trajectory of `ks`, returning how many there were.
///
/// Each trajectory is replayed from the root, so `ks` must behave deterministically.
pub fn dfs<KS>(ks: KS, max_depth: Option<usize>) -> Result<usize, DfsError>
where
    KS: KripkeStructure + Copy,
{
    let mut stack: PathState<KS::Label, KS::LabelIterator> = PathState::new();
    let mut trajectories = 0;

    ks.restart();
    if !stack.append(ks.successors()) {
        return Ok(1);
    }

    // Invariant: `ks` is in the state reached by every label on the path except the last.
    while let Some(&label) = stack.items.last() {
        if let Some(d) = max_depth {
            if stack.depth() > d {
                return Err(DfsError::MaxDepthExceeded(d));
            }
        }

        ks.transition(label);
        if stack.append(ks.successors()) {
            continue;
        }

        trajectories += 1;
        if !stack.advance() {
            break;
        }
        ks.restart();
        let replay = stack.depth() - 1;
        for label in stack.items[..replay].iter().copied() {
            ks.transition(label);
        }
    }
    Ok(trajectories)
}
