//! Listing scope for goals.
//!
//! Translates the actor snapshot into a declarative scope that the storage
//! layer turns into a WHERE clause. Managers (anyone with at least one
//! direct report, whatever their role label says) see their whole subtree;
//! expertise leaders additionally see every goal awaiting assessment.

use crate::domain::access::{AccessError, Actor};
use crate::domain::models::UserRole;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GoalScope {
    /// Admin: no filter.
    All,
    /// Own goals plus goals of every employee in the list.
    Team(Vec<Uuid>),
    /// Own goals plus all goals in `pending_assessment`, org-wide.
    OwnPlusPendingAssessment(Uuid),
    /// Own goals only.
    Own(Uuid),
}

/// `descendants` must hold the unbounded closure under the actor's own
/// employee node; it is only consulted when the actor has direct reports.
pub fn goal_scope(actor: &Actor, descendants: &[Uuid]) -> Result<GoalScope, AccessError> {
    if actor.is_admin() {
        return Ok(GoalScope::All);
    }

    let employee = actor.employee()?;

    if employee.has_reports {
        let mut team = Vec::with_capacity(descendants.len() + 1);
        team.push(employee.id);
        team.extend_from_slice(descendants);
        return Ok(GoalScope::Team(team));
    }

    if actor.role == UserRole::ExpertiseLeader {
        return Ok(GoalScope::OwnPlusPendingAssessment(employee.id));
    }

    Ok(GoalScope::Own(employee.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::EmployeeRef;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn actor(role: UserRole, employee: Option<EmployeeRef>) -> Actor {
        Actor { user_id: id(100), role, employee }
    }

    fn emp(n: u128, has_reports: bool) -> EmployeeRef {
        EmployeeRef { id: id(n), manager_id: None, has_reports }
    }

    #[test]
    fn admin_sees_all_even_without_profile() {
        let admin = actor(UserRole::Admin, None);
        assert_eq!(goal_scope(&admin, &[]).unwrap(), GoalScope::All);
    }

    #[test]
    fn plain_employee_sees_own_only() {
        let employee = actor(UserRole::Employee, Some(emp(4, false)));
        assert_eq!(goal_scope(&employee, &[]).unwrap(), GoalScope::Own(id(4)));
    }

    #[test]
    fn manager_sees_own_and_subtree() {
        let manager = actor(UserRole::Employee, Some(emp(3, true)));
        let scope = goal_scope(&manager, &[id(4), id(5)]).unwrap();
        assert_eq!(scope, GoalScope::Team(vec![id(3), id(4), id(5)]));
    }

    #[test]
    fn expertise_leader_without_reports_sees_assessment_queue() {
        let leader = actor(UserRole::ExpertiseLeader, Some(emp(7, false)));
        assert_eq!(
            goal_scope(&leader, &[]).unwrap(),
            GoalScope::OwnPlusPendingAssessment(id(7))
        );
    }

    #[test]
    fn expertise_leader_with_reports_is_scoped_as_manager() {
        let leader = actor(UserRole::ExpertiseLeader, Some(emp(7, true)));
        assert_eq!(
            goal_scope(&leader, &[id(8)]).unwrap(),
            GoalScope::Team(vec![id(7), id(8)])
        );
    }

    #[test]
    fn no_profile_is_denied_not_empty() {
        let actor = actor(UserRole::Employee, None);
        assert_eq!(goal_scope(&actor, &[]).unwrap_err(), AccessError::NoProfile);
    }

    /// Promoting an actor to manager only ever widens the visible set.
    #[test]
    fn visibility_is_monotone_under_promotion() {
        let before = actor(UserRole::Employee, Some(emp(3, false)));
        let after = actor(UserRole::Employee, Some(emp(3, true)));

        let GoalScope::Own(own) = goal_scope(&before, &[]).unwrap() else {
            panic!("expected own-only scope")
        };
        let GoalScope::Team(team) = goal_scope(&after, &[id(4), id(5)]).unwrap() else {
            panic!("expected team scope")
        };
        assert!(team.contains(&own));
    }
}
