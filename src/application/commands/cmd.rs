//! `cmd`: list, reload, enable and disable commands. Cannot be disabled itself.

use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler};

pub struct CmdCommand;

impl CmdCommand {
    async fn list(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let registry = &ctx.services.registry;
        let mut body = format!("📦 Loaded commands ({}):\n", registry.len());
        for desc in registry.descriptors() {
            if desc.aliases().is_empty() {
                body.push_str(&format!("- {}\n", desc.name()));
            } else {
                body.push_str(&format!("- {} ({})\n", desc.name(), desc.aliases().join(", ")));
            }
        }
        let disabled = ctx.services.config.read(|c| c.disabled_commands.clone());
        if !disabled.is_empty() {
            body.push_str(&format!("\n🚫 Disabled: {}", disabled.join(", ")));
        }
        ctx.reply(body.trim_end()).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for CmdCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let action = ctx.arg(0).map(str::to_lowercase).unwrap_or_else(|| "list".to_string());
        if action == "list" {
            return self.list(ctx).await;
        }

        let Some(target) = ctx.arg(1) else {
            ctx.reply(&format!("❌ Usage: {}cmd {} <name|all>", ctx.prefix(), action))
                .await?;
            return Ok(());
        };
        let registry = &ctx.services.registry;

        let body = match action.as_str() {
            "reload" => match registry.try_reload(target).await {
                Ok(name) => format!("✅ Reloaded {}", name),
                Err(e) => format!("❌ Failed to reload {}: {}", target, e),
            },
            "enable" => match registry.try_enable(target).await {
                Ok(n) => format!("✅ Enabled {} ({} command{})", target, n, if n == 1 { "" } else { "s" }),
                Err(e) => format!("❌ Failed to enable {}: {}", target, e),
            },
            "disable" => match registry.try_disable(target) {
                Ok(n) => format!("✅ Disabled {} ({} command{})", target, n, if n == 1 { "" } else { "s" }),
                Err(e) => format!("❌ Failed to disable {}: {}", target, e),
            },
            other => format!("❌ Unknown action: {}. Use list, reload, enable or disable", other),
        };
        tracing::info!(target: "audit", "{} ran cmd {} {}", ctx.sender(), action, target);
        ctx.reply(&body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_disable_and_enable_round_trip() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "cmd disable help").await;
        assert!(bot.services.registry.get("help").is_none());
        assert!(bot.services.registry.get("h").is_none());
        assert!(bot.services.config.read(|c| c.is_disabled("help")));

        bot.run_as("admin1", "cmd enable help").await;
        assert!(bot.services.registry.get("h").is_some());
        assert!(!bot.services.config.read(|c| c.is_disabled("help")));
    }

    #[tokio::test]
    async fn test_disable_all_keeps_cmd() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "cmd disable all").await;
        assert_eq!(bot.services.registry.names(), vec!["cmd".to_string()]);

        bot.run_as("admin1", "cmd disable cmd").await;
        assert!(bot.last_body().starts_with("❌ Failed to disable cmd"));

        bot.run_as("admin1", "cmd enable all").await;
        assert!(bot.services.registry.get("admin").is_some());
    }

    #[tokio::test]
    async fn test_list_shows_aliases() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "cmd").await;
        assert!(bot.last_body().contains("- admin (a, system)"));
    }
}
