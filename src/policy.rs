//! Access policy: maps a requested capability onto the actor's permission flags.
//!
//! Evaluation is plain set membership. The only non-exact checks are the
//! `Any*` capabilities, which match a flag for any area.
use std::fmt;

use crate::config::VisibilityPolicy;
use crate::document::Document;
use crate::error::{Result, WorkflowError};
use crate::permission::{Area, Permission, PermissionSet, StageArea, View};
use crate::types::ActorId;

/// An operation an actor asks to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RegisterDocument,
    DeleteOrder,
    Attach(StageArea),
    RemoveAttachment(StageArea),
    Access(View, Area),
    AccessAny(View),
    ManageUsers,
    ManageRoles,
    SeeAllDocuments,
    AdvancedReports(Area),
    AnyAdvancedReports,
    UpdateDeliveryState,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::RegisterDocument => f.write_str("register-document"),
            Capability::DeleteOrder => f.write_str("delete-order"),
            Capability::Attach(area) => write!(f, "attach:{area}"),
            Capability::RemoveAttachment(area) => write!(f, "remove-attachment:{area}"),
            Capability::Access(view, area) => write!(f, "access-{}:{area}", view.slug()),
            Capability::AccessAny(view) => write!(f, "access-{}:*", view.slug()),
            Capability::ManageUsers => f.write_str("manage-users"),
            Capability::ManageRoles => f.write_str("manage-roles"),
            Capability::SeeAllDocuments => f.write_str("see-all-documents"),
            Capability::AdvancedReports(area) => write!(f, "advanced-reports:{area}"),
            Capability::AnyAdvancedReports => f.write_str("advanced-reports:*"),
            Capability::UpdateDeliveryState => f.write_str("update-delivery-state"),
        }
    }
}

pub fn is_allowed(permissions: &PermissionSet, capability: Capability) -> bool {
    let exact = |p: Permission| permissions.contains(&p);

    match capability {
        Capability::RegisterDocument => exact(Permission::RegisterDocument),
        Capability::DeleteOrder => exact(Permission::DeleteOrder),
        Capability::Attach(area) => exact(Permission::Attach(area)),
        Capability::RemoveAttachment(area) => exact(Permission::EditRemoveAttachment(area)),
        Capability::Access(view, area) => exact(Permission::Access(view, area)),
        Capability::AccessAny(view) => permissions
            .iter()
            .any(|p| matches!(p, Permission::Access(v, _) if *v == view)),
        Capability::ManageUsers => exact(Permission::ManageUsers),
        Capability::ManageRoles => exact(Permission::ManageRoles),
        Capability::SeeAllDocuments => exact(Permission::SeeAllDocuments),
        Capability::AdvancedReports(area) => exact(Permission::AdvancedReports(area)),
        Capability::AnyAdvancedReports => permissions
            .iter()
            .any(|p| matches!(p, Permission::AdvancedReports(_))),
        Capability::UpdateDeliveryState => exact(Permission::UpdateDeliveryState),
    }
}

/// An authenticated caller: their id and the permissions resolved from their role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub permissions: PermissionSet,
}

impl Actor {
    pub fn new(id: ActorId, permissions: PermissionSet) -> Self {
        Self { id, permissions }
    }

    pub fn can(&self, capability: Capability) -> bool {
        is_allowed(&self.permissions, capability)
    }

    /// Fails with `PermissionDenied` unless the actor holds `capability`.
    pub fn ensure(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            return Ok(());
        }
        tracing::warn!(actor = self.id, %capability, "Permission denied");
        Err(WorkflowError::PermissionDenied {
            actor: self.id,
            capability,
        })
    }
}

/// Which documents an actor gets back from listings and searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    CreatedBy(ActorId),
    Areas(Vec<StageArea>),
}

impl Visibility {
    pub fn for_actor(actor: &Actor, policy: VisibilityPolicy) -> Self {
        if actor.can(Capability::SeeAllDocuments) {
            return Visibility::All;
        }
        if actor.can(Capability::RegisterDocument) {
            return Visibility::CreatedBy(actor.id);
        }
        match policy {
            VisibilityPolicy::Permissive => Visibility::All,
            VisibilityPolicy::AreaScoped => Visibility::Areas(actor.permissions.attach_areas()),
        }
    }

    pub fn admits(&self, document: &Document) -> bool {
        match self {
            Visibility::All => true,
            Visibility::CreatedBy(actor) => document.created_by == *actor,
            Visibility::Areas(areas) => areas.iter().any(|area| {
                document.state.pending_area() == Some(*area)
                    || !document.attachments.is_empty(*area)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(permissions: &[Permission]) -> PermissionSet {
        permissions.iter().copied().collect()
    }

    #[test]
    fn attach_is_area_scoped() {
        let perms = set(&[Permission::Attach(StageArea::Purchasing)]);

        assert!(is_allowed(&perms, Capability::Attach(StageArea::Purchasing)));
        assert!(!is_allowed(&perms, Capability::Attach(StageArea::Billing)));
        assert!(!is_allowed(&perms, Capability::RemoveAttachment(StageArea::Purchasing)));
    }

    #[test]
    fn any_area_capabilities_match_a_single_flag() {
        let perms = set(&[
            Permission::AdvancedReports(Area::Billing),
            Permission::Access(View::Audit, Area::Operations),
        ]);

        assert!(is_allowed(&perms, Capability::AnyAdvancedReports));
        assert!(is_allowed(&perms, Capability::AccessAny(View::Audit)));
        assert!(!is_allowed(&perms, Capability::AccessAny(View::Reports)));
        assert!(!is_allowed(&perms, Capability::AdvancedReports(Area::Sales)));
    }

    #[test]
    fn empty_set_allows_nothing() {
        let perms = PermissionSet::new();
        assert!(!is_allowed(&perms, Capability::RegisterDocument));
        assert!(!is_allowed(&perms, Capability::AccessAny(View::Tracking)));
        assert!(!is_allowed(&perms, Capability::AnyAdvancedReports));
    }

    #[test]
    fn ensure_reports_actor_and_capability() {
        let actor = Actor::new(42, PermissionSet::new());
        let err = actor.ensure(Capability::DeleteOrder).unwrap_err();

        match err {
            WorkflowError::PermissionDenied { actor, capability } => {
                assert_eq!(actor, 42);
                assert_eq!(capability, Capability::DeleteOrder);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn visibility_precedence() {
        let admin = Actor::new(1, set(&[Permission::SeeAllDocuments, Permission::RegisterDocument]));
        let sales = Actor::new(2, set(&[Permission::RegisterDocument]));
        let billing = Actor::new(3, set(&[Permission::Attach(StageArea::Billing)]));

        assert_eq!(
            Visibility::for_actor(&admin, VisibilityPolicy::AreaScoped),
            Visibility::All
        );
        assert_eq!(
            Visibility::for_actor(&sales, VisibilityPolicy::Permissive),
            Visibility::CreatedBy(2)
        );
        assert_eq!(
            Visibility::for_actor(&billing, VisibilityPolicy::Permissive),
            Visibility::All
        );
        assert_eq!(
            Visibility::for_actor(&billing, VisibilityPolicy::AreaScoped),
            Visibility::Areas(vec![StageArea::Billing])
        );
    }
}
