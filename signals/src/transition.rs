//! Position transitions

use sg_storage::Position;

use crate::types::Signal;

/// What a tick does to a stored position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to record or emit
    Hold,
    /// No position yet; take one
    Open { to: Position },
    /// Close `from`, then open `to`
    Reverse { from: Position, to: Position },
}

impl Transition {
    /// Position to persist, if any
    pub fn target(&self) -> Option<Position> {
        match self {
            Transition::Hold => None,
            Transition::Open { to } | Transition::Reverse { to, .. } => Some(*to),
        }
    }
}

/// Decide the transition for a stored position and this tick's signal
pub fn decide(stored: Option<Position>, signal: Signal) -> Transition {
    match (stored, signal.position()) {
        (_, None) => Transition::Hold,
        (None, Some(to)) => Transition::Open { to },
        (Some(from), Some(to)) if from == to => Transition::Hold,
        (Some(from), Some(to)) => Transition::Reverse { from, to },
    }
}
