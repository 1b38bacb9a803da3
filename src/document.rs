//! The purchase-order document and its state transitions.
//!
//! Every `apply_*` method checks its preconditions before touching the
//! document, so an `Err` always leaves the value unchanged. Each successful
//! call appends exactly one audit event.
use chrono::Utc;

use crate::attachment::Attachments;
use crate::audit::{AuditAction, AuditEvent, AuditLog, NO_FILE};
use crate::config::StageOrder;
use crate::error::{Result, WorkflowError};
use crate::permission::{Area, StageArea};
use crate::state::{DeliveryState, DocumentState};
use crate::types::{ActorId, FileRef, TimeStamp};
use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Document {
    #[n(0)]
    pub id: String, // uuid7, use bech32
    #[n(1)]
    pub order_ref: String,
    #[n(2)]
    pub main_file: FileRef,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub created_by: ActorId,
    #[n(5)]
    pub state: DocumentState,
    #[n(6)]
    pub delivery_state: Option<DeliveryState>,
    #[n(7)]
    pub attachments: Attachments,
    #[n(8)]
    pub history: AuditLog,
}

/// Trims an order reference and rejects it if nothing is left.
pub fn normalize_order_ref(order_ref: &str) -> Result<String> {
    let trimmed = order_ref.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::InvalidInput(
            "order reference must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

impl Document {
    /// A freshly registered document waiting on Purchasing, with its
    /// registration recorded as the first history event.
    pub fn register(order_ref: &str, main_file: FileRef, created_by: ActorId) -> Result<Self> {
        let order_ref = normalize_order_ref(order_ref)?;
        main_file.validate()?;

        let mut history = AuditLog::new();
        history.append(AuditEvent::new(
            created_by,
            Area::Sales,
            AuditAction::DocumentRegistered,
            main_file.name.clone(),
        ));

        Ok(Self {
            id: utils::new_uuid_to_bech32("doc_")?,
            order_ref,
            main_file,
            created_at: TimeStamp::new(),
            created_by,
            state: DocumentState::PendingPurchasing,
            delivery_state: None,
            attachments: Attachments::new(),
            history,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(minicbor::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(minicbor::decode(bytes)?)
    }

    /// State reached after a first attachment to `area`, if one is allowed.
    fn advance_for(&self, area: StageArea, order: StageOrder) -> Result<DocumentState> {
        match order {
            StageOrder::Strict => match self.state.pending_area() {
                Some(pending) if pending == area => {
                    Ok(self.state.next().unwrap_or(DocumentState::Completed))
                }
                Some(pending) => Err(WorkflowError::ValidationConflict(format!(
                    "order {} is waiting on {pending}, not {area}",
                    self.order_ref
                ))),
                None => Err(WorkflowError::ValidationConflict(format!(
                    "order {} is already completed; attach a new version instead",
                    self.order_ref
                ))),
            },
            StageOrder::Permissive => Ok(self.state.next().unwrap_or(self.state)),
        }
    }

    /// Appends `file` to `area`.
    ///
    /// A first attachment (`is_new_version == false`) moves the document one
    /// stage forward. Under [`StageOrder::Strict`] it must come from the area
    /// the document is waiting on, and a new version is only accepted for an
    /// area whose stage has already been reached. A file id the document
    /// already references is a conflict in any order.
    pub fn apply_attachment(
        &mut self,
        area: StageArea,
        file: FileRef,
        actor_id: ActorId,
        is_new_version: bool,
        order: StageOrder,
    ) -> Result<()> {
        file.validate()?;
        if self.references(&file.id) {
            return Err(WorkflowError::ValidationConflict(format!(
                "file {} is already referenced by order {}",
                file.id, self.order_ref
            )));
        }

        let next_state = if is_new_version {
            if order == StageOrder::Strict
                && !self.state.has_passed(area)
                && self.attachments.is_empty(area)
            {
                return Err(WorkflowError::ValidationConflict(format!(
                    "order {} has no {area} attachment to version yet",
                    self.order_ref
                )));
            }
            self.state
        } else {
            self.advance_for(area, order)?
        };

        let action = if is_new_version {
            AuditAction::NewVersionAttached
        } else {
            AuditAction::AttachmentAdded
        };
        let event = AuditEvent::new(actor_id, area.area(), action, file.name.clone());

        self.attachments.append(area, file);
        self.state = next_state;
        self.history.append(event);
        Ok(())
    }

    /// Removes the file with `file_id` from `area`. The workflow state is untouched.
    pub fn apply_removal(
        &mut self,
        area: StageArea,
        file_id: &str,
        actor_id: ActorId,
    ) -> Result<FileRef> {
        let removed = self.attachments.remove(area, file_id).ok_or_else(|| {
            WorkflowError::NotFound(format!(
                "file {file_id} in {area} attachments of order {}",
                self.order_ref
            ))
        })?;

        self.history.append(AuditEvent::new(
            actor_id,
            area.area(),
            AuditAction::AttachmentRemoved,
            removed.name.clone(),
        ));
        Ok(removed)
    }

    pub fn apply_delivery_state(
        &mut self,
        delivery_state: DeliveryState,
        actor_id: ActorId,
        requires_completion: bool,
    ) -> Result<()> {
        if requires_completion && !self.state.is_completed() {
            return Err(WorkflowError::ValidationConflict(format!(
                "order {} is {}; delivery can only be tracked once completed",
                self.order_ref, self.state
            )));
        }

        self.delivery_state = Some(delivery_state);
        self.history.append(AuditEvent::new(
            actor_id,
            Area::Operations,
            AuditAction::DeliveryStatusUpdated(delivery_state),
            NO_FILE.into(),
        ));
        Ok(())
    }

    pub fn latest(&self, area: StageArea) -> Option<&FileRef> {
        self.attachments.latest(area)
    }

    /// Whether the main file or any attachment has this file id.
    pub fn references(&self, file_id: &str) -> bool {
        self.file_refs().any(|f| f.id == file_id)
    }

    /// The main file followed by every attachment.
    pub fn file_refs(&self) -> impl Iterator<Item = &FileRef> {
        std::iter::once(&self.main_file).chain(self.attachments.iter_files().map(|(_, f)| f))
    }
}
