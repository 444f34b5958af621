//! Permission resolver
//!
//! Decides whether a user is a dev, a group admin, or neither. The dev set
//! supplied by the deployment takes precedence over the one stored in the
//! configuration document: when it is non-empty the stored list is ignored.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::models::{GroupId, UserId};
use crate::store::StoreState;
use crate::utils::errors::{QueueBuddyError, Result};

/// Access level of a user in some context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Dev,
    GroupAdmin,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    env_devs: BTreeSet<UserId>,
}

impl PermissionResolver {
    pub fn new(env_devs: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            env_devs: env_devs.into_iter().collect(),
        }
    }

    /// Dev set in effect for `state`
    pub fn effective_devs(&self, state: &StoreState) -> Vec<UserId> {
        if self.env_devs.is_empty() {
            state.file_dev_users.clone()
        } else {
            self.env_devs.iter().copied().collect()
        }
    }

    pub fn is_dev(&self, state: &StoreState, user_id: UserId) -> bool {
        if self.env_devs.is_empty() {
            state.file_dev_users.contains(&user_id)
        } else {
            self.env_devs.contains(&user_id)
        }
    }

    /// Retired global-admin role; kept so old callers still resolve
    pub fn is_legacy_admin(&self, _user_id: UserId) -> bool {
        false
    }

    pub fn is_group_admin(&self, state: &StoreState, user_id: UserId, group_id: GroupId) -> bool {
        state.admins(group_id).contains(&user_id)
    }

    /// Dev access, or admin of `group_id`, or admin of any group when no
    /// group is given
    pub fn has_admin_access(&self, state: &StoreState, user_id: UserId, group_id: Option<GroupId>) -> bool {
        if self.is_dev(state, user_id) || self.is_legacy_admin(user_id) {
            return true;
        }

        match group_id {
            Some(group_id) => self.is_group_admin(state, user_id, group_id),
            None => state.groups.keys().any(|gid| self.is_group_admin(state, user_id, *gid)),
        }
    }

    pub fn access_level(&self, state: &StoreState, user_id: UserId, group_id: Option<GroupId>) -> AccessLevel {
        if self.is_dev(state, user_id) {
            AccessLevel::Dev
        } else if self.has_admin_access(state, user_id, group_id) {
            AccessLevel::GroupAdmin
        } else {
            AccessLevel::None
        }
    }

    pub fn require_admin(&self, state: &StoreState, user_id: UserId, group_id: Option<GroupId>) -> Result<()> {
        if self.has_admin_access(state, user_id, group_id) {
            debug!(user_id = user_id, group_id = ?group_id, "Admin access granted");
            Ok(())
        } else {
            warn!(user_id = user_id, group_id = ?group_id, "Unauthorized admin access attempt");
            Err(QueueBuddyError::PermissionDenied("Admin privileges required".to_string()))
        }
    }

    pub fn require_dev(&self, state: &StoreState, user_id: UserId) -> Result<()> {
        if self.is_dev(state, user_id) {
            Ok(())
        } else {
            warn!(user_id = user_id, "Unauthorized dev access attempt");
            Err(QueueBuddyError::PermissionDenied("Dev privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupInfo;
    use chrono::{FixedOffset, TimeZone};

    fn state() -> StoreState {
        let created = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = StoreState {
            file_dev_users: vec![10],
            ..StoreState::default()
        };
        state.groups.insert(-1, GroupInfo::new("G1", created));
        state.groups.insert(-2, GroupInfo::new("G2", created));
        state.admins_mut(-2).push(20);
        state
    }

    #[test]
    fn test_file_devs_used_when_env_empty() {
        let resolver = PermissionResolver::default();
        assert!(resolver.is_dev(&state(), 10));
        assert_eq!(resolver.effective_devs(&state()), vec![10]);
    }

    #[test]
    fn test_env_devs_replace_file_devs() {
        let resolver = PermissionResolver::new([99]);
        let state = state();
        assert!(resolver.is_dev(&state, 99));
        assert!(!resolver.is_dev(&state, 10));
        assert!(!resolver.has_admin_access(&state, 10, Some(-1)));
    }

    #[test]
    fn test_admin_access_scopes() {
        let resolver = PermissionResolver::default();
        let state = state();

        assert!(resolver.has_admin_access(&state, 20, Some(-2)));
        assert!(!resolver.has_admin_access(&state, 20, Some(-1)));
        assert!(resolver.has_admin_access(&state, 20, None));
        assert!(!resolver.has_admin_access(&state, 30, None));
        assert!(resolver.has_admin_access(&state, 10, Some(-1)));

        assert_eq!(resolver.access_level(&state, 10, None), AccessLevel::Dev);
        assert_eq!(resolver.access_level(&state, 20, Some(-2)), AccessLevel::GroupAdmin);
        assert_eq!(resolver.access_level(&state, 20, Some(-1)), AccessLevel::None);
    }

    #[test]
    fn test_require_helpers() {
        let resolver = PermissionResolver::default();
        let state = state();
        assert!(resolver.require_admin(&state, 20, Some(-2)).is_ok());
        assert!(matches!(
            resolver.require_dev(&state, 20),
            Err(QueueBuddyError::PermissionDenied(_))
        ));
        assert!(!resolver.is_legacy_admin(10));
    }
}
