//! Defines the Kripke structure.

/// An implicit [Kripke structure](https://en.wikipedia.org/wiki/Kripke_structure): a state space
/// that is explored by replaying labelled transitions from a single root state.
///
/// For a [Simulator](crate::futures::Simulator), a state is a point in an async execution, and a
/// label is the index of the ready task to poll next.
pub trait KripkeStructure {
    type Label: Copy;
    type LabelIterator: Iterator<Item = Self::Label> + Clone;

    /// Take the transition named by `label`, which came from the latest call to `successors`.
    fn transition(self, label: Self::Label);

    /// Return the labels leaving the current state (never empty), or None at the end of a
    /// trajectory.
    fn successors(self) -> Option<Self::LabelIterator>;

    /// Go back to the root state.
    fn restart(self);
}
