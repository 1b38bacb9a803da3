//! Workflow and delivery states of a document.
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;
use crate::permission::StageArea;

/// Position of a document in the fixed four-stage workflow.
///
/// Declaration order is workflow order, so `Ord` compares progress.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum DocumentState {
    #[n(0)]
    PendingPurchasing,
    #[n(1)]
    PendingBilling,
    #[n(2)]
    PendingOperations,
    #[n(3)]
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum DeliveryState {
    #[n(0)]
    Waiting,
    #[n(1)]
    InTransit,
    #[n(2)]
    Delivered,
}

impl DocumentState {
    pub const ALL: [DocumentState; 4] = [
        DocumentState::PendingPurchasing,
        DocumentState::PendingBilling,
        DocumentState::PendingOperations,
        DocumentState::Completed,
    ];

    /// The following state, or `None` once completed.
    pub fn next(&self) -> Option<DocumentState> {
        match self {
            DocumentState::PendingPurchasing => Some(DocumentState::PendingBilling),
            DocumentState::PendingBilling => Some(DocumentState::PendingOperations),
            DocumentState::PendingOperations => Some(DocumentState::Completed),
            DocumentState::Completed => None,
        }
    }

    /// Area whose first attachment the document is waiting on.
    pub fn pending_area(&self) -> Option<StageArea> {
        match self {
            DocumentState::PendingPurchasing => Some(StageArea::Purchasing),
            DocumentState::PendingBilling => Some(StageArea::Billing),
            DocumentState::PendingOperations => Some(StageArea::Operations),
            DocumentState::Completed => None,
        }
    }

    /// True once the document has moved past `area`'s stage.
    pub fn has_passed(&self, area: StageArea) -> bool {
        match self.pending_area() {
            Some(pending) => pending > area,
            None => true,
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == DocumentState::Completed
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentState::PendingPurchasing => "Pending Purchasing",
            DocumentState::PendingBilling => "Pending Billing",
            DocumentState::PendingOperations => "Pending Operations",
            DocumentState::Completed => "Completed",
        }
    }
}

impl DeliveryState {
    pub const ALL: [DeliveryState; 3] = [
        DeliveryState::Waiting,
        DeliveryState::InTransit,
        DeliveryState::Delivered,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryState::Waiting => "Waiting",
            DeliveryState::InTransit => "In Transit",
            DeliveryState::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeliveryState {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliveryState::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| WorkflowError::InvalidInput(format!("unknown delivery state '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_the_fixed_order() {
        let mut state = DocumentState::PendingPurchasing;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            seen.push(state);
        }
        assert_eq!(seen, DocumentState::ALL.to_vec());
    }

    #[test]
    fn has_passed_tracks_completed_stages() {
        let state = DocumentState::PendingBilling;
        assert!(state.has_passed(StageArea::Purchasing));
        assert!(!state.has_passed(StageArea::Billing));
        assert!(!state.has_passed(StageArea::Operations));
        assert!(DocumentState::Completed.has_passed(StageArea::Operations));
    }

    #[test]
    fn delivery_state_parses_labels() {
        assert_eq!(
            "in transit".parse::<DeliveryState>().unwrap(),
            DeliveryState::InTransit
        );
        assert!("lost".parse::<DeliveryState>().is_err());
    }
}
