/// Deal status transitions
///
/// ```text
/// draft ──> review ──> available ──> reserved ──> sold
///   ^  <──    │            ^    <──     │
///   │         v            v            v
///   └────── withdrawn <────┴────────────┘
/// ```
///
/// Publishing (`review -> available`), completing a sale
/// (`reserved -> sold`) and reviving a withdrawn deal (`withdrawn -> draft`)
/// are reserved for admins.

use super::WorkflowError;
use crate::models::deal::DealStatus;
use crate::models::user::UserRole;

/// Statuses reachable from `from` in one step
pub fn allowed_targets(from: DealStatus) -> &'static [DealStatus] {
    use DealStatus::*;

    match from {
        Draft => &[Review, Withdrawn],
        Review => &[Draft, Available, Withdrawn],
        Available => &[Reserved, Withdrawn],
        Reserved => &[Available, Sold, Withdrawn],
        Sold => &[],
        Withdrawn => &[Draft],
    }
}

pub fn is_admin_only(from: DealStatus, to: DealStatus) -> bool {
    matches!(
        (from, to),
        (DealStatus::Review, DealStatus::Available)
            | (DealStatus::Reserved, DealStatus::Sold)
            | (DealStatus::Withdrawn, DealStatus::Draft)
    )
}

/// Checks whether `role` may move a deal from `from` to `to`
pub fn check_transition(
    role: UserRole,
    from: DealStatus,
    to: DealStatus,
) -> Result<(), WorkflowError> {
    if !role.is_staff() {
        return Err(WorkflowError::NotPermitted);
    }

    if !allowed_targets(from).contains(&to) {
        return Err(WorkflowError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        });
    }

    if is_admin_only(from, to) && role != UserRole::Admin {
        return Err(WorkflowError::AdminRequired {
            from: from.as_str(),
            to: to.as_str(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_for_admin() {
        let path = [
            DealStatus::Draft,
            DealStatus::Review,
            DealStatus::Available,
            DealStatus::Reserved,
            DealStatus::Sold,
        ];

        for pair in path.windows(2) {
            assert_eq!(check_transition(UserRole::Admin, pair[0], pair[1]), Ok(()));
        }
    }

    #[test]
    fn test_admin_only_edges_rejected_for_sourcer() {
        for (from, to) in [
            (DealStatus::Review, DealStatus::Available),
            (DealStatus::Reserved, DealStatus::Sold),
            (DealStatus::Withdrawn, DealStatus::Draft),
        ] {
            assert!(matches!(
                check_transition(UserRole::Sourcer, from, to),
                Err(WorkflowError::AdminRequired { .. })
            ));
            assert!(check_transition(UserRole::Admin, from, to).is_ok());
        }
    }

    #[test]
    fn test_sourcer_edges() {
        assert!(check_transition(UserRole::Sourcer, DealStatus::Draft, DealStatus::Review).is_ok());
        assert!(check_transition(UserRole::Sourcer, DealStatus::Review, DealStatus::Draft).is_ok());
        assert!(check_transition(UserRole::Sourcer, DealStatus::Available, DealStatus::Reserved).is_ok());
        assert!(check_transition(UserRole::Sourcer, DealStatus::Reserved, DealStatus::Available).is_ok());
        assert!(check_transition(UserRole::Sourcer, DealStatus::Available, DealStatus::Withdrawn).is_ok());
    }

    #[test]
    fn test_edges_outside_table_rejected() {
        for (from, to) in [
            (DealStatus::Draft, DealStatus::Available),
            (DealStatus::Draft, DealStatus::Draft),
            (DealStatus::Sold, DealStatus::Available),
            (DealStatus::Sold, DealStatus::Withdrawn),
            (DealStatus::Withdrawn, DealStatus::Available),
            (DealStatus::Available, DealStatus::Sold),
        ] {
            assert_eq!(
                check_transition(UserRole::Admin, from, to),
                Err(WorkflowError::InvalidTransition {
                    from: from.as_str(),
                    to: to.as_str()
                })
            );
        }
    }

    #[test]
    fn test_investor_cannot_change_status() {
        assert_eq!(
            check_transition(UserRole::Investor, DealStatus::Draft, DealStatus::Review),
            Err(WorkflowError::NotPermitted)
        );
    }

    #[test]
    fn test_sold_is_final() {
        assert!(allowed_targets(DealStatus::Sold).is_empty());
    }
}
