//! `admin`: bans, info, reload, restart and the admin-only modes

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler};
use crate::domain::entities::{Permission, ThreadId, ThreadRecord, UserId, UserRecord};

/// Delay before the process exits after `admin restart`
pub const RESTART_DELAY: Duration = Duration::from_secs(2);

const HELP: &str = "⚙️ Admin Commands:\n\n\
📋 User/Thread Management:\n\
- ban user [userID] [reason]: Ban a user\n\
- ban thread [threadID] [reason]: Ban a thread\n\
- unban user [userID]: Unban a user\n\
- unban thread [threadID]: Unban a thread\n\
- info user [userID]: Get user info\n\
- info thread [threadID]: Get thread info\n\n\
🔐 Permission Modes:\n\
- owner only: Only owner can use bot globally\n\
- only: Only owner and admins can use bot globally\n\
- support only: Owner, admins, and supporters can use bot globally\n\
- owner only group: Only owner can use bot in this group\n\
- only group: Only owner and admins can use bot in this group\n\
- support only group: Owner, admins, and supporters can use bot in this group\n\
- public: Everyone can use bot (reset modes)\n\n\
🔧 System:\n\
- reload [command]: Reload a command\n\
- restart: Restart the bot (owner only)";

pub struct AdminCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    User,
    Thread,
}

fn parse_target(raw: Option<&str>) -> Option<Target> {
    match raw?.to_lowercase().as_str() {
        "user" => Some(Target::User),
        "thread" => Some(Target::Thread),
        _ => None,
    }
}

const INVALID_TARGET: &str = "❌ Invalid target type. Use \"user\" or \"thread\"";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "✅"
    } else {
        "❌"
    }
}

impl AdminCommand {
    async fn ban(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let (Some(kind), Some(id)) = (ctx.arg(1), ctx.arg(2)) else {
            ctx.reply("❌ Missing target type (user/thread) or ID").await?;
            return Ok(());
        };
        let reason = match ctx.rest(3) {
            r if r.is_empty() => "No reason provided".to_string(),
            r => r,
        };

        match parse_target(Some(kind)) {
            Some(Target::User) => self.ban_user(ctx, UserId::new(id), reason).await,
            Some(Target::Thread) => self.ban_thread(ctx, ThreadId::new(id), reason).await,
            None => {
                ctx.reply(INVALID_TARGET).await?;
                Ok(())
            }
        }
    }

    async fn ban_user(&self, ctx: &CommandContext, id: UserId, reason: String) -> Result<(), CommandError> {
        let services = &ctx.services;
        let mut user = match services.store.find_user(&id).await? {
            Some(user) => user,
            None => match services.api.user_info(&id).await {
                Ok(Some(info)) => UserRecord::new(id.clone(), info.name),
                _ => {
                    ctx.reply(&format!("❌ User with ID {} not found", id)).await?;
                    return Ok(());
                }
            },
        };

        if user.is_banned {
            ctx.reply(&format!(
                "❌ User {} is already banned. Reason: {}",
                user.name,
                user.ban_reason.as_deref().unwrap_or("No reason provided")
            ))
            .await?;
            return Ok(());
        }

        let (target_is_owner, target_is_admin, sender_is_owner) = services
            .config
            .read(|c| (c.is_owner(&id), c.is_admin(&id), c.is_owner(ctx.sender())));
        if target_is_owner {
            ctx.reply("❌ Cannot ban the bot owner").await?;
            return Ok(());
        }
        if target_is_admin && !sender_is_owner {
            ctx.reply("❌ Only the owner can ban an admin").await?;
            return Ok(());
        }

        user.is_banned = true;
        user.ban_reason = Some(reason.clone());
        services.store.save_user(&user).await?;
        tracing::info!(target: "audit", "User {} ({}) was banned by {}. Reason: {}", id, user.name, ctx.sender(), reason);

        ctx.reply(&format!("✅ Banned user {} ({})\nReason: {}", user.name, id, reason))
            .await?;
        Ok(())
    }

    async fn ban_thread(&self, ctx: &CommandContext, id: ThreadId, reason: String) -> Result<(), CommandError> {
        let services = &ctx.services;
        let mut thread = match services.store.find_thread(&id).await? {
            Some(thread) => thread,
            None => match services.api.thread_info(&id).await {
                Ok(Some(info)) => ThreadRecord::new(id.clone(), info.name),
                _ => {
                    ctx.reply(&format!("❌ Thread with ID {} not found", id)).await?;
                    return Ok(());
                }
            },
        };

        if thread.is_banned {
            ctx.reply(&format!(
                "❌ Thread {} is already banned. Reason: {}",
                thread.name,
                thread.ban_reason.as_deref().unwrap_or("No reason provided")
            ))
            .await?;
            return Ok(());
        }

        thread.is_banned = true;
        thread.ban_reason = Some(reason.clone());
        services.store.save_thread(&thread).await?;
        tracing::info!(target: "audit", "Thread {} ({}) was banned by {}. Reason: {}", id, thread.name, ctx.sender(), reason);

        let notice = format!(
            "⚠️ This group has been banned from using the bot\nReason: {}\n\nContact the bot owner for more information.",
            reason
        );
        if let Err(e) = services.api.send_message(&id, &notice, None).await {
            tracing::warn!("Could not notify banned thread {}: {}", id, e);
        }

        ctx.reply(&format!("✅ Banned thread {} ({})\nReason: {}", thread.name, id, reason))
            .await?;
        Ok(())
    }

    async fn unban(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let (Some(kind), Some(id)) = (ctx.arg(1), ctx.arg(2)) else {
            ctx.reply("❌ Missing target type (user/thread) or ID").await?;
            return Ok(());
        };
        let services = &ctx.services;

        match parse_target(Some(kind)) {
            Some(Target::User) => {
                let id = UserId::new(id);
                let Some(mut user) = services.store.find_user(&id).await? else {
                    ctx.reply(&format!("❌ User with ID {} not found", id)).await?;
                    return Ok(());
                };
                if !user.is_banned {
                    ctx.reply(&format!("❌ User {} is not banned", user.name)).await?;
                    return Ok(());
                }
                user.is_banned = false;
                user.ban_reason = None;
                services.store.save_user(&user).await?;
                tracing::info!(target: "audit", "User {} ({}) was unbanned by {}", id, user.name, ctx.sender());
                ctx.reply(&format!("✅ Unbanned user {} ({})", user.name, id)).await?;
            }
            Some(Target::Thread) => {
                let id = ThreadId::new(id);
                let Some(mut thread) = services.store.find_thread(&id).await? else {
                    ctx.reply(&format!("❌ Thread with ID {} not found", id)).await?;
                    return Ok(());
                };
                if !thread.is_banned {
                    ctx.reply(&format!("❌ Thread {} is not banned", thread.name)).await?;
                    return Ok(());
                }
                thread.is_banned = false;
                thread.ban_reason = None;
                services.store.save_thread(&thread).await?;
                tracing::info!(target: "audit", "Thread {} ({}) was unbanned by {}", id, thread.name, ctx.sender());

                if let Err(e) = services
                    .api
                    .send_message(&id, "✅ This group has been unbanned and can now use the bot again.", None)
                    .await
                {
                    tracing::warn!("Could not notify unbanned thread {}: {}", id, e);
                }
                ctx.reply(&format!("✅ Unbanned thread {} ({})", thread.name, id)).await?;
            }
            None => {
                ctx.reply(INVALID_TARGET).await?;
            }
        }
        Ok(())
    }

    async fn info(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(kind) = ctx.arg(1) else {
            ctx.reply("❌ Missing target type (user/thread)").await?;
            return Ok(());
        };
        match parse_target(Some(kind)) {
            Some(Target::User) => {
                let id = ctx.arg(2).map(UserId::new).unwrap_or_else(|| ctx.sender().clone());
                let body = self.user_info(ctx, &id).await?;
                ctx.reply(&body).await?;
            }
            Some(Target::Thread) => {
                let id = ctx.arg(2).map(ThreadId::new).unwrap_or_else(|| ctx.thread().clone());
                let body = self.thread_info(ctx, &id).await?;
                ctx.reply(&body).await?;
            }
            None => {
                ctx.reply(INVALID_TARGET).await?;
            }
        }
        Ok(())
    }

    async fn user_info(&self, ctx: &CommandContext, id: &UserId) -> Result<String, CommandError> {
        let services = &ctx.services;
        let Some(user) = services.store.find_user(id).await? else {
            return Ok(format!("❌ User with ID {} not found in database", id));
        };
        let currency = services.store.find_currency(id).await?;

        let mut reply = String::from("👤 User Information:\n");
        reply.push_str(&format!("- ID: {}\n", id));
        reply.push_str(&format!("- Name: {}\n", user.name));
        reply.push_str(&format!(
            "- Status: {}\n",
            if user.is_banned { "🚫 Banned" } else { "✅ Active" }
        ));
        if user.is_banned {
            reply.push_str(&format!(
                "- Ban Reason: {}\n",
                user.ban_reason.as_deref().unwrap_or("No reason provided")
            ));
        }
        reply.push_str(&format!("- Created: {}\n", user.created_at.format("%Y-%m-%d %H:%M:%S")));
        reply.push_str(&format!("- Last Active: {}\n\n", user.last_active.format("%Y-%m-%d %H:%M:%S")));

        if let Some(currency) = currency {
            reply.push_str("💰 Currency Information:\n");
            reply.push_str(&format!("- Level: {}\n", currency.level));
            reply.push_str(&format!("- XP: {}\n", currency.exp));
            reply.push_str(&format!("- Money: {}\n", currency.money));
            reply.push_str(&format!("- Bank: {}/{}\n", currency.bank, currency.bank_capacity));
        }

        let (owner, admin, support) = services
            .config
            .read(|c| (c.is_owner(id), c.is_admin(id), c.is_support(id)));
        reply.push_str("\n🔒 Permissions:\n");
        reply.push_str(&format!("- Owner: {}\n", yes_no(owner)));
        reply.push_str(&format!("- Admin: {}\n", yes_no(admin)));
        reply.push_str(&format!("- Supporter: {}", yes_no(support)));
        Ok(reply)
    }

    async fn thread_info(&self, ctx: &CommandContext, id: &ThreadId) -> Result<String, CommandError> {
        let services = &ctx.services;
        let Some(thread) = services.store.find_thread(id).await? else {
            return Ok(format!("❌ Thread with ID {} not found in database", id));
        };
        let live = services.api.thread_info(id).await.ok().flatten();
        let is_group = live.as_ref().map(|t| t.is_group).unwrap_or(true);
        let members = live
            .as_ref()
            .map(|t| t.participant_ids.len() as u32)
            .filter(|n| *n > 0)
            .unwrap_or(thread.member_count);

        let mut reply = String::from("👥 Thread Information:\n");
        reply.push_str(&format!("- ID: {}\n", id));
        reply.push_str(&format!("- Name: {}\n", thread.name));
        reply.push_str(&format!("- Type: {}\n", if is_group { "Group" } else { "Personal Chat" }));
        reply.push_str(&format!(
            "- Status: {}\n",
            if thread.is_banned { "🚫 Banned" } else { "✅ Active" }
        ));
        if thread.is_banned {
            reply.push_str(&format!(
                "- Ban Reason: {}\n",
                thread.ban_reason.as_deref().unwrap_or("No reason provided")
            ));
        }
        reply.push_str(&format!("- Created: {}\n", thread.created_at.format("%Y-%m-%d %H:%M:%S")));
        reply.push_str(&format!("- Last Active: {}\n", thread.last_active.format("%Y-%m-%d %H:%M:%S")));
        reply.push_str(&format!("- Member Count: {}\n\n", members));
        reply.push_str("⚙️ Settings:\n");
        reply.push_str(&format!(
            "- Admin-only mode: {}",
            thread
                .settings
                .admin_only_mode
                .map(|m| m.to_string())
                .unwrap_or_else(|| "off".to_string())
        ));
        Ok(reply)
    }

    async fn reload(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(name) = ctx.arg(1) else {
            ctx.reply("❌ Missing command name to reload").await?;
            return Ok(());
        };
        match ctx.services.registry.try_reload(name).await {
            Ok(_) => ctx.reply(&format!("✅ Successfully reloaded command: {}", name)).await?,
            Err(e) => {
                tracing::error!("Failed to reload command {}: {}", name, e);
                ctx.reply(&format!("❌ Failed to reload command: {}\n{}", name, e)).await?
            }
        };
        Ok(())
    }

    async fn restart(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        if !ctx.services.config.read(|c| c.is_owner(ctx.sender())) {
            ctx.reply("❌ Only the bot owner can use the restart command").await?;
            return Ok(());
        }
        ctx.reply("🔄 Restarting bot...").await?;
        tracing::info!(target: "audit", "Bot restart initiated by {}", ctx.sender());

        let shutdown = ctx.services.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESTART_DELAY).await;
            shutdown.notify_one();
        });
        Ok(())
    }

    /// `owner only`, `only`, `support only`, `public`, each optionally followed by `group`
    async fn set_mode(&self, ctx: &CommandContext, mode: Permission, group: bool) -> Result<(), CommandError> {
        let services = &ctx.services;
        let level = services
            .config
            .read(|c| crate::application::services::user_level(c, ctx.sender()));
        if mode == Permission::Owner && level < Permission::Owner {
            ctx.reply("❌ Only the bot owner can change permission modes").await?;
            return Ok(());
        }
        if level < Permission::Admin {
            ctx.reply("❌ Only admins can change permission modes").await?;
            return Ok(());
        }

        let thread_mode = (mode != Permission::Public).then_some(mode);
        if group || mode == Permission::Public {
            self.set_thread_mode(ctx, thread_mode).await?;
        }
        if !group {
            services.config.update(|c| {
                c.admin_only_mode.global = mode != Permission::Public;
                c.admin_only_mode.mode = mode;
            })?;
        }
        tracing::info!(
            target: "audit",
            "{} set {} mode to {}",
            ctx.sender(),
            if group { "thread" } else { "global" },
            mode
        );

        let body = match (mode, group) {
            (Permission::Owner, true) => "🔐 This group is now in OWNER-ONLY mode.\nOnly the bot owner can use commands in this group.",
            (Permission::Owner, false) => "🔐 Bot is now in OWNER-ONLY mode globally.\nOnly the bot owner can use commands.",
            (Permission::Admin, true) => "🔐 This group is now in ADMIN-ONLY mode.\nOnly owner and admins can use commands in this group.",
            (Permission::Admin, false) => "🔐 Bot is now in ADMIN-ONLY mode globally.\nOnly owner and admins can use commands.",
            (Permission::Support, true) => "🔐 This group is now in SUPPORT-ONLY mode.\nOnly owner, admins, and supporters can use commands in this group.",
            (Permission::Support, false) => "🔐 Bot is now in SUPPORT-ONLY mode globally.\nOnly owner, admins, and supporters can use commands.",
            (Permission::Public, true) => "🔓 This group is now in PUBLIC mode.\nEveryone can use commands in this group.",
            (Permission::Public, false) => "🔓 Bot is now in PUBLIC mode globally & in this group.\nEveryone can use commands.",
        };
        ctx.reply(body).await?;
        Ok(())
    }

    async fn set_thread_mode(&self, ctx: &CommandContext, mode: Option<Permission>) -> Result<(), CommandError> {
        let store = &ctx.services.store;
        let mut thread = match store.find_thread(ctx.thread()).await? {
            Some(thread) => thread,
            None => {
                let name = ctx
                    .services
                    .api
                    .thread_info(ctx.thread())
                    .await
                    .ok()
                    .flatten()
                    .map(|t| t.name)
                    .unwrap_or_default();
                ThreadRecord::new(ctx.thread().clone(), name)
            }
        };
        thread.settings.admin_only_mode = mode;
        thread.settings.updated_by = Some(ctx.sender().clone());
        thread.settings.updated_at = Some(Utc::now());
        store.save_thread(&thread).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for AdminCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(action) = ctx.arg(0).map(str::to_lowercase) else {
            ctx.reply(HELP).await?;
            return Ok(());
        };
        let next = ctx.arg(1).map(str::to_lowercase);
        let next = next.as_deref();
        let after = ctx.arg(2).map(str::to_lowercase);
        let after = after.as_deref();

        match (action.as_str(), next) {
            ("ban", _) => self.ban(ctx).await,
            ("unban", _) => self.unban(ctx).await,
            ("info", _) => self.info(ctx).await,
            ("reload", _) => self.reload(ctx).await,
            ("restart", _) => self.restart(ctx).await,
            ("owner", Some("only")) => self.set_mode(ctx, Permission::Owner, after == Some("group")).await,
            ("support", Some("only")) => self.set_mode(ctx, Permission::Support, after == Some("group")).await,
            ("only", _) => self.set_mode(ctx, Permission::Admin, next == Some("group")).await,
            ("public", _) => self.set_mode(ctx, Permission::Public, next == Some("group")).await,
            _ => {
                ctx.reply(&format!(
                    "❌ Invalid admin action: {}\nUse {}admin for a list of valid actions",
                    action,
                    ctx.prefix()
                ))
                .await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_ban_and_unban_user() {
        let bot = TestBot::new().await;
        bot.store_user("U5", "Mallory").await;

        bot.run_as("admin1", "admin ban user U5 spamming links").await;
        let user = bot.services.store.find_user(&UserId::new("U5")).await.unwrap().unwrap();
        assert!(user.is_banned);
        assert_eq!(user.ban_reason.as_deref(), Some("spamming links"));
        assert!(bot.last_body().starts_with("✅ Banned user Mallory (U5)"));

        bot.run_as("admin1", "admin unban user U5").await;
        let user = bot.services.store.find_user(&UserId::new("U5")).await.unwrap().unwrap();
        assert!(!user.is_banned);
    }

    #[tokio::test]
    async fn test_cannot_ban_owner() {
        let bot = TestBot::new().await;
        bot.store_user("owner", "Boss").await;
        bot.run_as("admin1", "admin ban user owner").await;
        assert_eq!(bot.last_body(), "❌ Cannot ban the bot owner");
    }

    #[tokio::test]
    async fn test_thread_mode_persists_in_store() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "admin only group").await;
        let thread = bot
            .services
            .store
            .find_thread(&ThreadId::new(TestBot::THREAD))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thread.settings.admin_only_mode, Some(Permission::Admin));
        assert!(!bot.services.config.read(|c| c.admin_only_mode.global));
    }

    #[tokio::test]
    async fn test_global_owner_mode_requires_owner() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "admin owner only").await;
        assert_eq!(bot.last_body(), "❌ Only the bot owner can change permission modes");

        bot.run_as("owner", "admin owner only").await;
        let mode = bot.services.config.read(|c| c.admin_only_mode.clone());
        assert!(mode.global);
        assert_eq!(mode.mode, Permission::Owner);
    }

    #[tokio::test]
    async fn test_global_mode_written_to_config_and_cleared_by_public() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "admin only").await;
        let mode = bot.services.config.read(|c| c.admin_only_mode.clone());
        assert!(mode.global);
        assert_eq!(mode.mode, Permission::Admin);

        bot.run_as("admin1", "admin public").await;
        assert!(!bot.services.config.read(|c| c.admin_only_mode.global));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_notifies_shutdown_after_delay() {
        let bot = TestBot::new().await;
        let shutdown = bot.services.shutdown.clone();
        bot.run_as("owner", "admin restart").await;
        assert_eq!(bot.last_body(), "🔄 Restarting bot...");
        tokio::time::timeout(RESTART_DELAY * 2, shutdown.notified())
            .await
            .expect("shutdown requested");
    }
}
