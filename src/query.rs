//! Search filters and summary counts over already-visible documents.
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::audit::AuditAction;
use crate::document::Document;
use crate::permission::StageArea;
use crate::policy::{Actor, Capability};
use crate::state::{DeliveryState, DocumentState};
use crate::types::ActorId;

/// All set criteria must match. An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Case-insensitive substring of the order reference or any file name.
    pub term: Option<String>,
    pub state: Option<DocumentState>,
    /// Inclusive creation-date bounds (UTC calendar days).
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn term(mut self, term: &str) -> Self {
        let term = term.trim();
        self.term = (!term.is_empty()).then(|| term.to_lowercase());
        self
    }
    pub fn state(mut self, state: DocumentState) -> Self {
        self.state = Some(state);
        self
    }
    pub fn created_from(mut self, date: NaiveDate) -> Self {
        self.created_from = Some(date);
        self
    }
    pub fn created_to(mut self, date: NaiveDate) -> Self {
        self.created_to = Some(date);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        if let Some(term) = &self.term {
            let term = term.to_lowercase();
            let hit = document.order_ref.to_lowercase().contains(&term)
                || document
                    .file_refs()
                    .any(|f| f.name.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        if self.state.is_some_and(|s| s != document.state) {
            return false;
        }

        let created = document.created_at.to_datetime_utc().date_naive();
        if self.created_from.is_some_and(|from| created < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| created > to) {
            return false;
        }
        true
    }
}

/// Counts for a reports screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Registered by Sales but not yet picked up by Purchasing.
    pub waiting_on_purchasing: usize,
    /// Documents with at least one file in each area.
    pub with_attachments: BTreeMap<StageArea, usize>,
    pub by_state: BTreeMap<DocumentState, usize>,
    pub by_delivery: BTreeMap<DeliveryState, usize>,
}

impl Summary {
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut summary = Summary::default();

        for document in documents {
            summary.total += 1;
            if document.state.is_completed() {
                summary.completed += 1;
            } else {
                summary.pending += 1;
            }
            if document.state == DocumentState::PendingPurchasing {
                summary.waiting_on_purchasing += 1;
            }
            for area in StageArea::ALL {
                if !document.attachments.is_empty(area) {
                    *summary.with_attachments.entry(area).or_default() += 1;
                }
            }
            *summary.by_state.entry(document.state).or_default() += 1;
            if let Some(delivery) = document.delivery_state {
                *summary.by_delivery.entry(delivery).or_default() += 1;
            }
        }

        summary
    }
}

/// Personal counts for an actor's own reports screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Documents the actor registered. Always zero for actors who cannot register.
    pub own_completed: usize,
    pub own_pending: usize,
    /// Documents currently waiting on an area the actor can attach to.
    pub pending_for_my_areas: usize,
    pub attached_by_me: usize,
}

impl TaskReport {
    pub fn for_actor(documents: &[Document], actor: &Actor) -> Self {
        let registers = actor.can(Capability::RegisterDocument);
        let areas = actor.permissions.attach_areas();
        let mut report = TaskReport {
            attached_by_me: documents_attached_by(documents, actor.id),
            ..TaskReport::default()
        };

        for document in documents {
            if registers && document.created_by == actor.id {
                if document.state.is_completed() {
                    report.own_completed += 1;
                } else {
                    report.own_pending += 1;
                }
            }
            if document
                .state
                .pending_area()
                .is_some_and(|area| areas.contains(&area))
            {
                report.pending_for_my_areas += 1;
            }
        }

        report
    }
}

/// Number of documents `actor_id` has attached or versioned a file on.
pub fn documents_attached_by<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    actor_id: ActorId,
) -> usize {
    documents
        .into_iter()
        .filter(|d| {
            d.history.iter().any(|e| {
                e.actor_id == actor_id
                    && matches!(
                        e.action,
                        AuditAction::AttachmentAdded | AuditAction::NewVersionAttached
                    )
            })
        })
        .count()
}
