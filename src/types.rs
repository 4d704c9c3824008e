//! Trait state and taxon record types.

use serde::{Deserialize, Serialize};

/// Binary trait state: presence or absence of the defense structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    /// Structure absent (0). Also the tie-break default.
    #[default]
    Absent,
    /// Structure present (1).
    Present,
}

impl State {
    /// Numeric coding, 0 or 1.
    pub fn as_index(self) -> usize {
        match self {
            State::Absent => 0,
            State::Present => 1,
        }
    }

    /// The other state.
    pub fn flipped(self) -> Self {
        match self {
            State::Absent => State::Present,
            State::Present => State::Absent,
        }
    }
}

impl From<bool> for State {
    fn from(present: bool) -> Self {
        if present {
            State::Present
        } else {
            State::Absent
        }
    }
}

impl TryFrom<u8> for State {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(State::Absent),
            1 => Ok(State::Present),
            other => Err(other),
        }
    }
}

/// Per-node states, indexed by [`NodeId`](crate::tree::NodeId).
pub type NodeStates = Vec<State>;

/// One taxon: a tree tip with its measured traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    /// Tip label (unique).
    pub label: String,
    /// Body size, positive; log-transformed before use.
    pub body_size: f64,
    /// Presence/absence of the defense structure.
    pub state: State,
    /// Optional predator size, used to rescale body size.
    pub predator_size: Option<f64>,
}

impl Taxon {
    /// Create a taxon record without predator size.
    pub fn new(label: impl Into<String>, body_size: f64, state: State) -> Self {
        Self {
            label: label.into(),
            body_size,
            state,
            predator_size: None,
        }
    }

    /// Attach a predator size.
    pub fn with_predator_size(mut self, predator_size: f64) -> Self {
        self.predator_size = Some(predator_size);
        self
    }
}
