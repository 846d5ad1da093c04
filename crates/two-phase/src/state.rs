//! Two-phase commit state machine.

use common::Resource;
use serde::{Deserialize, Serialize};

use crate::place_order;

/// The phase of a two-phase commit attempt.
///
/// State transitions:
/// ```text
/// Init ──► PrepareOrder ──► PrepareInventory ──► PreparePayment ──► CommitAll ──► Done
///               │                  │                   │
///               └──────────────────┴───────────────────┴──► Aborted
/// ```
/// No phase is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TwoPhaseState {
    #[default]
    Init,
    PrepareOrder,
    PrepareInventory,
    PreparePayment,
    /// Every resource prepared; commits are being issued.
    CommitAll,
    /// Commit phase finished (terminal state).
    Done,
    /// A prepare failed and the prepared resources were aborted (terminal state).
    Aborted,
}

impl TwoPhaseState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: TwoPhaseState) -> bool {
        use TwoPhaseState::*;
        matches!(
            (self, next),
            (Init, PrepareOrder)
                | (PrepareOrder, PrepareInventory)
                | (PrepareInventory, PreparePayment)
                | (PreparePayment, CommitAll)
                | (CommitAll, Done)
                | (PrepareOrder | PrepareInventory | PreparePayment, Aborted)
        )
    }

    /// Returns true if this is a prepare phase.
    pub fn is_prepare(&self) -> bool {
        self.resource().is_some()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TwoPhaseState::Done | TwoPhaseState::Aborted)
    }

    /// The resource prepared in this phase.
    pub fn resource(&self) -> Option<Resource> {
        match self {
            TwoPhaseState::PrepareOrder => Some(Resource::Order),
            TwoPhaseState::PrepareInventory => Some(Resource::Inventory),
            TwoPhaseState::PreparePayment => Some(Resource::Payment),
            _ => None,
        }
    }

    /// The `failedAt` tag reported when the attempt fails in this phase.
    pub fn failure_tag(&self) -> Option<&'static str> {
        match self {
            TwoPhaseState::PrepareOrder => Some(place_order::ORDER_PREPARE),
            TwoPhaseState::PrepareInventory => Some(place_order::INVENTORY_PREPARE),
            TwoPhaseState::PreparePayment => Some(place_order::PAYMENT_PREPARE),
            TwoPhaseState::CommitAll => Some(place_order::COMMIT_PHASE),
            _ => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoPhaseState::Init => "Init",
            TwoPhaseState::PrepareOrder => "PrepareOrder",
            TwoPhaseState::PrepareInventory => "PrepareInventory",
            TwoPhaseState::PreparePayment => "PreparePayment",
            TwoPhaseState::CommitAll => "CommitAll",
            TwoPhaseState::Done => "Done",
            TwoPhaseState::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for TwoPhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
