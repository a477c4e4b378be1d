//! Object-level access resolution.
//!
//! Every decision takes an explicit [`Actor`] snapshot; there is no ambient
//! current-user state. Authorization failures are distinct from state
//! failures: the former say "you may not", the latter "not yet / not
//! anymore" and are raised by the state machine or workflow checks instead.

use crate::domain::hierarchy;
use crate::domain::models::{GoalStatus, UserRole};
use crate::domain::state_machine::GoalAction;
use std::collections::HashMap;
use uuid::Uuid;

/// Snapshot of the calling user, loaded once per request.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
    pub employee: Option<EmployeeRef>,
}

#[derive(Clone, Debug)]
pub struct EmployeeRef {
    pub id: Uuid,
    pub manager_id: Option<Uuid>,
    pub has_reports: bool,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// The actor's employee profile, or the distinct no-profile outcome.
    pub fn employee(&self) -> Result<&EmployeeRef, AccessError> {
        self.employee.as_ref().ok_or(AccessError::NoProfile)
    }
}

/// Where the actor stands relative to a goal's owner in the manager tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Owner,
    DirectManager,
    IndirectAncestor,
    Unrelated,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("you have no employee profile")]
    NoProfile,
    #[error("{0}")]
    Denied(&'static str),
}

/// Compute the actor/owner relation. `owner_manager` is the owner's direct
/// manager; `parents` is the full id -> manager map used for the ancestor
/// walk above the direct link.
pub fn relation(
    actor_employee: Uuid,
    owner: Uuid,
    owner_manager: Option<Uuid>,
    parents: &HashMap<Uuid, Uuid>,
) -> Relation {
    if actor_employee == owner {
        return Relation::Owner;
    }
    if owner_manager == Some(actor_employee) {
        return Relation::DirectManager;
    }
    if hierarchy::is_ancestor(actor_employee, owner, parents) {
        return Relation::IndirectAncestor;
    }
    Relation::Unrelated
}

/// Read access to a goal: owner, any ancestor on the management chain,
/// admin, or an expertise leader while the goal awaits assessment.
///
/// Callers surface a denial on GET as not-found, so an out-of-scope id is
/// indistinguishable from a nonexistent one.
pub fn can_read_goal(actor: &Actor, rel: Relation, status: GoalStatus) -> bool {
    if actor.is_admin() {
        return true;
    }
    if actor.role == UserRole::ExpertiseLeader && status == GoalStatus::PendingAssessment {
        return true;
    }
    matches!(rel, Relation::Owner | Relation::DirectManager | Relation::IndirectAncestor)
}

/// Edit/delete a goal: owner only (or admin). Draft-ness is the state
/// machine's concern, checked separately so the error kinds stay distinct.
pub fn authorize_goal_edit(actor: &Actor, rel: Relation) -> Result<(), AccessError> {
    if actor.is_admin() || rel == Relation::Owner {
        Ok(())
    } else {
        Err(AccessError::Denied("only the goal owner may modify it"))
    }
}

/// Who may trigger each lifecycle transition.
pub fn authorize_goal_action(actor: &Actor, action: GoalAction, rel: Relation) -> Result<(), AccessError> {
    if actor.is_admin() {
        return Ok(());
    }
    match action {
        GoalAction::Submit | GoalAction::Complete => {
            if rel == Relation::Owner {
                Ok(())
            } else {
                Err(AccessError::Denied("only the goal owner may do this"))
            }
        }
        GoalAction::Approve => {
            if rel == Relation::DirectManager {
                Ok(())
            } else {
                Err(AccessError::Denied("only the owner's direct manager may approve"))
            }
        }
    }
}

/// Progress notes: owner or direct manager (or admin) may add them.
pub fn authorize_progress_create(actor: &Actor, rel: Relation) -> Result<(), AccessError> {
    if actor.is_admin() || matches!(rel, Relation::Owner | Relation::DirectManager) {
        Ok(())
    } else {
        Err(AccessError::Denied("you may not add progress to this goal"))
    }
}

/// Self-assessment is the owner's own voice; nobody writes it for them.
pub fn authorize_self_assessment_write(actor: &Actor, rel: Relation) -> Result<(), AccessError> {
    if actor.is_admin() || rel == Relation::Owner {
        Ok(())
    } else {
        Err(AccessError::Denied("only the goal owner may write the self-assessment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn actor(role: UserRole, employee: Option<EmployeeRef>) -> Actor {
        Actor { user_id: id(100), role, employee }
    }

    fn emp(n: u128) -> EmployeeRef {
        EmployeeRef { id: id(n), manager_id: None, has_reports: false }
    }

    /// dev(4) -> manager(3) -> head(2) -> director(1)
    fn parents() -> HashMap<Uuid, Uuid> {
        let mut map = HashMap::new();
        map.insert(id(4), id(3));
        map.insert(id(3), id(2));
        map.insert(id(2), id(1));
        map
    }

    #[test]
    fn relation_classification() {
        let parents = parents();
        assert_eq!(relation(id(4), id(4), Some(id(3)), &parents), Relation::Owner);
        assert_eq!(relation(id(3), id(4), Some(id(3)), &parents), Relation::DirectManager);
        assert_eq!(relation(id(2), id(4), Some(id(3)), &parents), Relation::IndirectAncestor);
        assert_eq!(relation(id(1), id(4), Some(id(3)), &parents), Relation::IndirectAncestor);
        assert_eq!(relation(id(9), id(4), Some(id(3)), &parents), Relation::Unrelated);
        // Subordinates are not ancestors of their manager.
        assert_eq!(relation(id(4), id(3), Some(id(2)), &parents), Relation::Unrelated);
    }

    #[test]
    fn read_access_matrix() {
        let employee = actor(UserRole::Employee, Some(emp(4)));
        assert!(can_read_goal(&employee, Relation::Owner, GoalStatus::Draft));
        assert!(can_read_goal(&employee, Relation::DirectManager, GoalStatus::Draft));
        assert!(can_read_goal(&employee, Relation::IndirectAncestor, GoalStatus::InProgress));
        // An unrelated employee never sees the goal, whatever its status.
        for status in GoalStatus::ALL {
            assert!(!can_read_goal(&employee, Relation::Unrelated, status));
        }
    }

    #[test]
    fn expertise_leader_reads_only_pending_assessment() {
        let leader = actor(UserRole::ExpertiseLeader, Some(emp(7)));
        assert!(can_read_goal(&leader, Relation::Unrelated, GoalStatus::PendingAssessment));
        assert!(!can_read_goal(&leader, Relation::Unrelated, GoalStatus::InProgress));
        assert!(!can_read_goal(&leader, Relation::Unrelated, GoalStatus::Completed));
    }

    #[test]
    fn admin_reads_everything() {
        let admin = actor(UserRole::Admin, None);
        for status in GoalStatus::ALL {
            assert!(can_read_goal(&admin, Relation::Unrelated, status));
        }
    }

    #[test]
    fn transition_authorization() {
        let owner = actor(UserRole::Employee, Some(emp(4)));
        assert!(authorize_goal_action(&owner, GoalAction::Submit, Relation::Owner).is_ok());
        assert!(authorize_goal_action(&owner, GoalAction::Complete, Relation::Owner).is_ok());
        assert!(authorize_goal_action(&owner, GoalAction::Approve, Relation::Owner).is_err());
        assert!(authorize_goal_action(&owner, GoalAction::Approve, Relation::DirectManager).is_ok());
        // Approval does not flow further up the chain.
        assert!(authorize_goal_action(&owner, GoalAction::Approve, Relation::IndirectAncestor).is_err());
        assert!(authorize_goal_action(&owner, GoalAction::Submit, Relation::DirectManager).is_err());
    }

    #[test]
    fn edit_is_owner_only() {
        let employee = actor(UserRole::Employee, Some(emp(4)));
        assert!(authorize_goal_edit(&employee, Relation::Owner).is_ok());
        assert!(authorize_goal_edit(&employee, Relation::DirectManager).is_err());
        let admin = actor(UserRole::Admin, None);
        assert!(authorize_goal_edit(&admin, Relation::Unrelated).is_ok());
    }

    #[test]
    fn missing_profile_is_a_named_outcome() {
        let actor = actor(UserRole::Employee, None);
        assert_eq!(actor.employee().unwrap_err(), AccessError::NoProfile);
    }
}
