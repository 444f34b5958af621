//! Admin sets, blacklist, queue capacity and user associations

use tracing::info;

use crate::models::{GroupId, UserId};
use crate::services::permissions::AccessLevel;
use crate::utils::errors::{QueueBuddyError, Result};
use crate::utils::logging::log_admin_action;
use super::{require_group, Documents, EntityStore};

impl EntityStore {
    pub fn is_dev(&self, user_id: UserId) -> Result<bool> {
        let state = self.lock()?;
        Ok(self.permissions.is_dev(&state, user_id))
    }

    pub fn is_group_admin(&self, user_id: UserId, group_id: GroupId) -> Result<bool> {
        let state = self.lock()?;
        Ok(self.permissions.is_group_admin(&state, user_id, group_id))
    }

    pub fn has_admin_access(&self, user_id: UserId, group_id: Option<GroupId>) -> Result<bool> {
        let state = self.lock()?;
        Ok(self.permissions.has_admin_access(&state, user_id, group_id))
    }

    pub fn access_level(&self, user_id: UserId, group_id: Option<GroupId>) -> Result<AccessLevel> {
        let state = self.lock()?;
        Ok(self.permissions.access_level(&state, user_id, group_id))
    }

    pub fn require_admin(&self, user_id: UserId, group_id: Option<GroupId>) -> Result<()> {
        let state = self.lock()?;
        self.permissions.require_admin(&state, user_id, group_id)
    }

    pub fn require_dev(&self, user_id: UserId) -> Result<()> {
        let state = self.lock()?;
        self.permissions.require_dev(&state, user_id)
    }

    /// Effective dev set
    pub fn dev_users(&self) -> Result<Vec<UserId>> {
        let state = self.lock()?;
        Ok(self.permissions.effective_devs(&state))
    }

    pub fn add_group_admin(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.mutate(Documents::Config, |state| {
            require_group(state, group_id)?;
            let admins = state.admins_mut(group_id);
            if admins.contains(&user_id) {
                return Err(QueueBuddyError::AlreadyAdmin { user_id, group_id });
            }
            admins.push(user_id);
            Ok(())
        })?;

        log_admin_action(user_id, "admin_added", Some(group_id));
        Ok(())
    }

    pub fn remove_group_admin(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.mutate(Documents::Config, |state| {
            let admins = state.group_admins.get_mut(&group_id);
            let Some(admins) = admins.filter(|admins| admins.contains(&user_id)) else {
                return Err(QueueBuddyError::AdminNotFound { user_id, group_id });
            };
            admins.retain(|id| *id != user_id);
            if admins.is_empty() {
                state.group_admins.remove(&group_id);
            }
            Ok(())
        })?;

        log_admin_action(user_id, "admin_removed", Some(group_id));
        Ok(())
    }

    pub fn group_admins(&self, group_id: GroupId) -> Result<Vec<UserId>> {
        Ok(self.lock()?.admins(group_id).to_vec())
    }

    /// Groups in which `user_id` is an admin
    pub fn admin_groups(&self, user_id: UserId) -> Result<Vec<GroupId>> {
        let state = self.lock()?;
        Ok(state
            .group_admins
            .iter()
            .filter(|(_, admins)| admins.contains(&user_id))
            .map(|(group_id, _)| *group_id)
            .collect())
    }

    pub fn blacklist_add(&self, user_id: UserId) -> Result<()> {
        self.mutate(Documents::Config, |state| {
            if self.permissions.is_dev(state, user_id) {
                return Err(QueueBuddyError::CannotBlacklistDev(user_id));
            }
            if state.blacklist.contains(&user_id) {
                return Err(QueueBuddyError::AlreadyBlacklisted(user_id));
            }
            state.blacklist.push(user_id);
            Ok(())
        })?;

        log_admin_action(user_id, "blacklisted", None);
        Ok(())
    }

    pub fn blacklist_remove(&self, user_id: UserId) -> Result<()> {
        self.mutate(Documents::Config, |state| {
            if !state.blacklist.contains(&user_id) {
                return Err(QueueBuddyError::NotBlacklisted(user_id));
            }
            state.blacklist.retain(|id| *id != user_id);
            Ok(())
        })?;

        log_admin_action(user_id, "unblacklisted", None);
        Ok(())
    }

    pub fn blacklist(&self) -> Result<Vec<UserId>> {
        Ok(self.lock()?.blacklist.clone())
    }

    pub fn is_blacklisted(&self, user_id: UserId) -> Result<bool> {
        Ok(self.lock()?.blacklist.contains(&user_id))
    }

    /// Queue capacity of a group, the global default unless overridden
    pub fn queue_capacity(&self, group_id: GroupId) -> Result<usize> {
        Ok(self.lock()?.capacity(group_id))
    }

    /// Override the queue capacity of a group. Existing entries beyond the
    /// new capacity stay; further registrations are refused.
    pub fn set_queue_capacity(&self, group_id: GroupId, capacity: i64) -> Result<()> {
        if capacity <= 0 {
            return Err(QueueBuddyError::InvalidCapacity(capacity));
        }

        self.mutate(Documents::Config, |state| {
            require_group(state, group_id)?;
            state.queue_sizes.insert(group_id, capacity as usize);
            Ok(())
        })?;

        info!(group_id = group_id, capacity = capacity, "Queue capacity changed");
        Ok(())
    }

    /// Make `group_id` the active group of `user_id` for private chats
    pub fn associate_user_with_group(&self, user_id: UserId, group_id: GroupId) -> Result<()> {
        self.mutate(Documents::Runtime, |state| {
            require_group(state, group_id)?;
            state.user_groups.insert(user_id, group_id);
            Ok(())
        })?;

        info!(user_id = user_id, group_id = group_id, "Associated user with group");
        Ok(())
    }

    pub fn user_group(&self, user_id: UserId) -> Result<Option<GroupId>> {
        Ok(self.lock()?.user_groups.get(&user_id).copied())
    }
}
