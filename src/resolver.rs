use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{DirectoryUser, Role, SubscriberSpec};

/// Resolve a subscriber spec against a directory snapshot.
///
/// Deterministic for a given snapshot and free of side effects. `all`,
/// `departments` and `managers` only reach active, verified users;
/// `users` and `custom` pass the given IDs through verbatim. Returning a
/// set collapses duplicate IDs before any notification is created.
pub fn resolve(spec: &SubscriberSpec, directory: &[DirectoryUser]) -> HashSet<Uuid> {
    match spec {
        SubscriberSpec::All => directory
            .iter()
            .filter(|u| u.is_active && u.is_verified)
            .map(|u| u.id)
            .collect(),
        SubscriberSpec::Departments { department_ids } => directory
            .iter()
            .filter(|u| u.is_active && u.is_verified)
            .filter(|u| u.department_id.map(|d| department_ids.contains(&d)).unwrap_or(false))
            .map(|u| u.id)
            .collect(),
        SubscriberSpec::Users { user_ids } | SubscriberSpec::Custom { user_ids } => {
            user_ids.iter().copied().collect()
        }
        SubscriberSpec::Managers => directory
            .iter()
            .filter(|u| u.is_active && u.is_verified && u.role == Role::Manager)
            .map(|u| u.id)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role, department_id: Option<Uuid>, active: bool, verified: bool) -> DirectoryUser {
        DirectoryUser {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            full_name: "Directory User".to_string(),
            role,
            department_id,
            is_active: active,
            is_verified: verified,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_filters_inactive_and_unverified() {
        let eligible = user(Role::Employee, None, true, true);
        let inactive = user(Role::Employee, None, false, true);
        let unverified = user(Role::Employee, None, true, false);
        let directory = vec![eligible.clone(), inactive, unverified];

        let resolved = resolve(&SubscriberSpec::All, &directory);
        assert_eq!(resolved, HashSet::from([eligible.id]));
    }

    #[test]
    fn departments_matches_membership() {
        let dept = Uuid::new_v4();
        let other_dept = Uuid::new_v4();
        let in_dept = user(Role::Employee, Some(dept), true, true);
        let elsewhere = user(Role::Employee, Some(other_dept), true, true);
        let no_dept = user(Role::Employee, None, true, true);
        let directory = vec![in_dept.clone(), elsewhere, no_dept];

        let resolved = resolve(
            &SubscriberSpec::Departments { department_ids: vec![dept] },
            &directory,
        );
        assert_eq!(resolved, HashSet::from([in_dept.id]));
    }

    #[test]
    fn explicit_user_ids_pass_through_unfiltered() {
        let inactive = user(Role::Employee, None, false, false);
        let directory = vec![inactive.clone()];
        let outsider = Uuid::new_v4();

        let resolved = resolve(
            &SubscriberSpec::Users { user_ids: vec![inactive.id, outsider, outsider] },
            &directory,
        );
        // Not filtered by status, and duplicates collapse.
        assert_eq!(resolved, HashSet::from([inactive.id, outsider]));
    }

    #[test]
    fn managers_mode_selects_active_verified_managers() {
        let manager = user(Role::Manager, None, true, true);
        let suspended_manager = user(Role::Manager, None, false, true);
        let employee = user(Role::Employee, None, true, true);
        let directory = vec![manager.clone(), suspended_manager, employee];

        let resolved = resolve(&SubscriberSpec::Managers, &directory);
        assert_eq!(resolved, HashSet::from([manager.id]));
    }

    #[test]
    fn empty_spec_resolves_empty() {
        let directory = vec![user(Role::Employee, None, true, true)];
        let resolved = resolve(&SubscriberSpec::Custom { user_ids: vec![] }, &directory);
        assert!(resolved.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let directory: Vec<_> = (0..5).map(|_| user(Role::Employee, None, true, true)).collect();
        let first = resolve(&SubscriberSpec::All, &directory);
        let second = resolve(&SubscriberSpec::All, &directory);
        assert_eq!(first, second);
    }
}
