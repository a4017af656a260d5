//! Access levels
//!
//! A command runs only if the sender's level reaches the highest of: the
//! command's own permission, the global admin-only mode (when enabled) and
//! the thread's admin-only mode (when set).

use crate::application::errors::CommandError;
use crate::domain::entities::{CommandConfig, Permission, ThreadRecord, UserId};
use crate::infrastructure::config::BotConfig;

/// The level a user holds according to the config lists
pub fn user_level(config: &BotConfig, user: &UserId) -> Permission {
    if config.is_owner(user) {
        Permission::Owner
    } else if config.is_admin(user) {
        Permission::Admin
    } else if config.is_support(user) {
        Permission::Support
    } else {
        Permission::Public
    }
}

pub fn required_level(
    config: &BotConfig,
    command: &CommandConfig,
    thread: Option<&ThreadRecord>,
) -> Permission {
    let mut required = command.permission;
    if config.admin_only_mode.global {
        required = required.max(config.admin_only_mode.mode);
    }
    if let Some(mode) = thread.and_then(|t| t.settings.admin_only_mode) {
        required = required.max(mode);
    }
    required
}

pub fn check_access(
    config: &BotConfig,
    command: &CommandConfig,
    thread: Option<&ThreadRecord>,
    user: &UserId,
) -> Result<(), CommandError> {
    let required = required_level(config, command, thread);
    let held = user_level(config, user);
    if held >= required {
        Ok(())
    } else {
        tracing::debug!(
            "{} ({}) denied {}: requires {}",
            user,
            held,
            command.name,
            required
        );
        Err(CommandError::PermissionDenied)
    }
}

/// User-facing explanation for a denial
pub fn denial_message(required: Permission) -> String {
    match required {
        Permission::Owner => "❌ Only the bot owner can use this command".to_string(),
        Permission::Admin => "❌ Only bot admins can use this command".to_string(),
        Permission::Support => "❌ Only bot supporters can use this command".to_string(),
        Permission::Public => "❌ You cannot use this command".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BotConfig {
        BotConfig {
            owner_id: UserId::new("owner"),
            admin_ids: vec![UserId::new("admin")],
            support_ids: vec![UserId::new("support")],
            ..BotConfig::default()
        }
    }

    #[test]
    fn test_levels() {
        let config = config();
        assert_eq!(user_level(&config, &UserId::new("owner")), Permission::Owner);
        assert_eq!(user_level(&config, &UserId::new("admin")), Permission::Admin);
        assert_eq!(user_level(&config, &UserId::new("support")), Permission::Support);
        assert_eq!(user_level(&config, &UserId::new("x")), Permission::Public);
    }

    #[test]
    fn test_no_owner_configured() {
        let config = BotConfig::default();
        assert_eq!(user_level(&config, &UserId::new("")), Permission::Public);
    }

    #[test]
    fn test_required_level_takes_maximum() {
        let mut config = config();
        let ping = CommandConfig::new("ping");
        assert_eq!(required_level(&config, &ping, None), Permission::Public);

        config.admin_only_mode.global = true;
        config.admin_only_mode.mode = Permission::Support;
        assert_eq!(required_level(&config, &ping, None), Permission::Support);

        let mut thread = ThreadRecord::new("t1", "group");
        thread.settings.admin_only_mode = Some(Permission::Owner);
        assert_eq!(required_level(&config, &ping, Some(&thread)), Permission::Owner);

        let admin_cmd = CommandConfig::new("admin").with_permission(Permission::Admin);
        config.admin_only_mode.global = false;
        assert_eq!(required_level(&config, &admin_cmd, None), Permission::Admin);
    }

    #[test]
    fn test_check_access() {
        let config = config();
        let admin_cmd = CommandConfig::new("admin").with_permission(Permission::Admin);
        assert!(check_access(&config, &admin_cmd, None, &UserId::new("owner")).is_ok());
        assert!(check_access(&config, &admin_cmd, None, &UserId::new("admin")).is_ok());
        assert!(matches!(
            check_access(&config, &admin_cmd, None, &UserId::new("support")),
            Err(CommandError::PermissionDenied)
        ));
    }
}
