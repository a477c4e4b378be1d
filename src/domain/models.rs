use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Employee,
    ExpertiseLeader,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "employee",
            UserRole::ExpertiseLeader => "expertise_leader",
            UserRole::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for UserRole {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "employee" => Ok(UserRole::Employee),
            "expertise_leader" => Ok(UserRole::ExpertiseLeader),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

/// Goal lifecycle. `Approved` exists in the persisted enum for parity with
/// historical rows but the approve transition lands directly on
/// `InProgress`; nothing transitions into `Cancelled`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "goal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Draft,
    PendingApproval,
    Approved,
    InProgress,
    PendingAssessment,
    Completed,
    Cancelled,
}

impl sqlx::postgres::PgHasArrayType for GoalStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_goal_status")
    }
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 7] = [
        GoalStatus::Draft,
        GoalStatus::PendingApproval,
        GoalStatus::Approved,
        GoalStatus::InProgress,
        GoalStatus::PendingAssessment,
        GoalStatus::Completed,
        GoalStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Draft => "draft",
            GoalStatus::PendingApproval => "pending_approval",
            GoalStatus::Approved => "approved",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::PendingAssessment => "pending_assessment",
            GoalStatus::Completed => "completed",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_add_progress(&self) -> bool {
        matches!(self, GoalStatus::InProgress)
    }

    pub fn can_add_self_assessment(&self) -> bool {
        matches!(self, GoalStatus::InProgress | GoalStatus::PendingAssessment)
    }
}

impl TryFrom<&str> for GoalStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "draft" => Ok(GoalStatus::Draft),
            "pending_approval" => Ok(GoalStatus::PendingApproval),
            "approved" => Ok(GoalStatus::Approved),
            "in_progress" => Ok(GoalStatus::InProgress),
            "pending_assessment" => Ok(GoalStatus::PendingAssessment),
            "completed" => Ok(GoalStatus::Completed),
            "cancelled" => Ok(GoalStatus::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "feedback_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRequestStatus {
    Pending,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [UserRole::Employee, UserRole::ExpertiseLeader, UserRole::Admin] {
            assert_eq!(UserRole::try_from(role.as_str()), Ok(role));
        }
        assert!(UserRole::try_from("manager").is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in GoalStatus::ALL {
            assert_eq!(GoalStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(GoalStatus::try_from("done").is_err());
    }

    #[test]
    fn progress_only_in_progress() {
        for status in GoalStatus::ALL {
            assert_eq!(status.can_add_progress(), status == GoalStatus::InProgress);
        }
    }

    #[test]
    fn self_assessment_window() {
        assert!(GoalStatus::InProgress.can_add_self_assessment());
        assert!(GoalStatus::PendingAssessment.can_add_self_assessment());
        assert!(!GoalStatus::Draft.can_add_self_assessment());
        assert!(!GoalStatus::Completed.can_add_self_assessment());
    }
}
