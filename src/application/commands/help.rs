use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler};

pub struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let prefix = ctx.prefix();
        let registry = &ctx.services.registry;

        if let Some(name) = ctx.arg(0) {
            let Some(desc) = registry.get(&name.to_lowercase()) else {
                ctx.reply(&format!("❌ Command {} not found", name)).await?;
                return Ok(());
            };
            let config = &desc.config;
            let mut body = format!("📖 {}{}\n", prefix, config.name);
            if let Some(description) = &config.description {
                body.push_str(&format!("{}\n", description));
            }
            if let Some(usage) = &config.usage {
                body.push_str(&format!("Usage: {}\n", usage.replace("{prefix}", &prefix)));
            }
            if !config.aliases.is_empty() {
                body.push_str(&format!("Aliases: {}\n", config.aliases.join(", ")));
            }
            body.push_str(&format!("Permission: {}", config.permission));
            if config.cooldown > 0 {
                body.push_str(&format!("\nCooldown: {}s", config.cooldown));
            }
            ctx.reply(&body).await?;
            return Ok(());
        }

        let mut body = String::from("📋 Commands:\n");
        for desc in registry.descriptors() {
            match &desc.config.description {
                Some(d) => body.push_str(&format!("{}{} - {}\n", prefix, desc.name(), d)),
                None => body.push_str(&format!("{}{}\n", prefix, desc.name())),
            }
        }
        body.push_str(&format!("\nUse {}help <command> for details", prefix));
        ctx.reply(&body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_help_for_alias() {
        let bot = TestBot::new().await;
        bot.run_as("U1", "help a").await;
        let body = bot.last_body();
        assert!(body.starts_with("📖 /admin"));
        assert!(body.contains("Permission: admin"));
    }

    #[tokio::test]
    async fn test_help_lists_everything() {
        let bot = TestBot::new().await;
        bot.run_as("U1", "help").await;
        assert!(bot.last_body().contains("/loan"));
    }
}
