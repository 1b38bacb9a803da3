//! Resolves authenticated actor ids into [`Actor`]s.
use std::collections::HashMap;

use crate::error::{Result, WorkflowError};
use crate::permission::{PermissionSet, Role, default_roles};
use crate::policy::Actor;
use crate::types::ActorId;

pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, actor_id: ActorId) -> Result<Actor>;
}

/// Roles by id and the role assigned to each actor.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    roles: HashMap<u64, Role>,
    assignments: HashMap<ActorId, u64>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory seeded with the built-in roles.
    pub fn with_default_roles() -> Self {
        let mut directory = Self::new();
        for role in default_roles() {
            directory.add_role(role);
        }
        directory
    }

    /// Inserts or replaces a role. Already resolved actors keep their old set.
    pub fn add_role(&mut self, role: Role) -> Option<Role> {
        self.roles.insert(role.id, role)
    }

    pub fn remove_role(&mut self, role_id: u64) -> Option<Role> {
        self.roles.remove(&role_id)
    }

    pub fn role(&self, role_id: u64) -> Option<&Role> {
        self.roles.get(&role_id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles.values().find(|r| r.name == name)
    }

    pub fn assign(&mut self, actor_id: ActorId, role_id: u64) -> Result<()> {
        if !self.roles.contains_key(&role_id) {
            return Err(WorkflowError::NotFound(format!("role {role_id}")));
        }
        self.assignments.insert(actor_id, role_id);
        Ok(())
    }
}

impl IdentityProvider for RoleDirectory {
    fn resolve(&self, actor_id: ActorId) -> Result<Actor> {
        let role_id = self
            .assignments
            .get(&actor_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("actor {actor_id}")))?;

        // a role removed after assignment leaves the actor with nothing
        let permissions = self
            .roles
            .get(role_id)
            .map(|r| r.permissions.clone())
            .unwrap_or_else(PermissionSet::new);

        Ok(Actor::new(actor_id, permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;

    #[test]
    fn resolves_assigned_role() {
        let mut directory = RoleDirectory::with_default_roles();
        let supervisor = directory.role_by_name("Sales Supervisor").unwrap().id;
        directory.assign(7, supervisor).unwrap();

        let actor = directory.resolve(7).unwrap();
        assert_eq!(actor.id, 7);
        assert!(actor.permissions.contains(&Permission::DeleteOrder));
    }

    #[test]
    fn unknown_actor_or_role_is_not_found() {
        let mut directory = RoleDirectory::with_default_roles();
        assert!(directory.resolve(99).unwrap_err().is_not_found());
        assert!(directory.assign(1, 404).unwrap_err().is_not_found());
    }

    #[test]
    fn removed_role_resolves_to_empty_set() {
        let mut directory = RoleDirectory::with_default_roles();
        directory.assign(3, 3).unwrap();
        directory.remove_role(3);

        assert!(directory.resolve(3).unwrap().permissions.is_empty());
    }
}
