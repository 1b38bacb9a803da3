//! Append-only audit trail of a document
use std::fmt;

use chrono::Utc;

use crate::error::Result;
use crate::permission::Area;
use crate::state::DeliveryState;
use crate::types::{ActorId, TimeStamp};

/// File label recorded for events that do not concern a file.
pub const NO_FILE: &str = "-";

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum AuditAction {
    #[n(0)]
    DocumentRegistered,
    #[n(1)]
    AttachmentAdded,
    #[n(2)]
    NewVersionAttached,
    #[n(3)]
    AttachmentRemoved,
    #[n(4)]
    DeliveryStatusUpdated(#[n(0)] DeliveryState),
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::DocumentRegistered => f.write_str("Document Registered"),
            AuditAction::AttachmentAdded => f.write_str("Attachment Added"),
            AuditAction::NewVersionAttached => f.write_str("New Version Attached"),
            AuditAction::AttachmentRemoved => f.write_str("Attachment Removed"),
            AuditAction::DeliveryStatusUpdated(state) => {
                write!(f, "Delivery Status Updated: {state}")
            }
        }
    }
}

/// One immutable record of who did what, when, and in which area.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct AuditEvent {
    #[n(0)]
    pub timestamp: TimeStamp<Utc>,
    #[n(1)]
    pub actor_id: ActorId,
    #[n(2)]
    pub area: Area,
    #[n(3)]
    pub action: AuditAction,
    #[n(4)]
    pub file_name: String, // display label, NO_FILE when not about a file
}

impl AuditEvent {
    pub fn new(actor_id: ActorId, area: Area, action: AuditAction, file_name: String) -> Self {
        Self {
            timestamp: TimeStamp::new(),
            actor_id,
            area,
            action,
            file_name,
        }
    }

    /// Free-form description shown in the audit trail.
    pub fn description(&self) -> String {
        self.action.to_string()
    }

    /// CBOR encoding of the event and the sha256 digest of that encoding.
    pub fn build(&self) -> Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

/// Ordered event sequence, oldest first. Events cannot be edited or
/// dropped once appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AuditLog {
    #[n(0)]
    events: Vec<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEvent> {
        self.events.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuditEvent> {
        self.events.iter()
    }

    /// Chained digest over every event: each step hashes the previous
    /// digest together with the next event's digest.
    pub fn digest(&self) -> Result<String> {
        let mut chain = String::new();
        for event in &self.events {
            let (hash, _) = event.build()?;
            chain = sha256::digest(format!("{chain}{hash}"));
        }
        Ok(chain)
    }
}

impl<'a> IntoIterator for &'a AuditLog {
    type Item = &'a AuditEvent;
    type IntoIter = std::slice::Iter<'a, AuditEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
