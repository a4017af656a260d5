//! `code`: view, edit, create, delete and rename command units in place
//!
//! All edits go through the registry, which validates, writes, reloads and
//! rolls back on failure.

use async_trait::async_trait;

use super::source_from;
use crate::application::errors::{CommandError, RegistryError};
use crate::application::handler::{CommandContext, CommandHandler};
use crate::domain::entities::UnitId;

pub struct CodeCommand;

fn usage(prefix: &str) -> String {
    format!(
        "❌ Not enough arguments provided.\nUsage:\n\
         • {p}code view [unit] - View a unit's source\n\
         • {p}code edit [unit] [new_code] - Edit a unit\n\
         • {p}code create [unit] [code] - Create a new unit\n\
         • {p}code delete [unit] - Delete a unit\n\
         • {p}code rename [old_unit] [new_unit] - Rename a unit",
        p = prefix
    )
}

const NEED_SOURCE: &str = "❌ For edit or create actions, you need to either provide the code as the third argument or reply to a message containing the code or a Pastebin link.";

impl CodeCommand {
    async fn view(&self, ctx: &CommandContext, unit: &UnitId) -> Result<String, CommandError> {
        Ok(match ctx.services.registry.read_unit(unit).await {
            Ok(source) => format!("📄 File: {}\n📝 Content:\n\n{}", unit.file_name(), source),
            Err(RegistryError::UnitNotFound(_)) => format!("❌ File not found: {}", unit.file_name()),
            Err(e) => return Err(e.into()),
        })
    }

    async fn edit(&self, ctx: &CommandContext, unit: &UnitId, source: &str) -> Result<String, CommandError> {
        let registry = &ctx.services.registry;
        let current = registry.snapshot().name_for_unit(unit);
        let validation = registry.validate(unit, source, current.as_deref());
        if let Some(error) = validation.error {
            return Ok(format!(
                "❌ Validation failed: {}\nCommand: {}",
                error,
                validation.command_name.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(match registry.replace_unit(ctx.sender(), unit, source, false).await {
            Ok(name) => format!(
                "✅ Successfully edited file: {}\n✅ Command \"{}\" reloaded successfully!",
                unit.file_name(),
                name
            ),
            Err(RegistryError::UnitNotFound(_)) => format!("❌ File not found: {}", unit.file_name()),
            Err(e) => format!("❌ Error: {}\nOriginal content has been restored.", e),
        })
    }

    async fn create(&self, ctx: &CommandContext, unit: &UnitId, source: &str) -> Result<String, CommandError> {
        let registry = &ctx.services.registry;
        let validation = registry.validate(unit, source, None);
        if let Some(error) = validation.error {
            return Ok(format!(
                "❌ Validation failed: {}\nCommand: {}",
                error,
                validation.command_name.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(match registry.create_unit(ctx.sender(), unit, source).await {
            Ok(name) => format!(
                "✅ Successfully created file: {}\n✅ Command \"{}\" loaded successfully!",
                unit.file_name(),
                name
            ),
            Err(RegistryError::UnitExists(_)) => format!(
                "❌ File already exists: {}\nUse the edit action to modify it.",
                unit.file_name()
            ),
            Err(e) => format!("❌ Error creating command file: {}", e),
        })
    }

    async fn delete(&self, ctx: &CommandContext, unit: &UnitId) -> Result<String, CommandError> {
        Ok(match ctx.services.registry.delete_unit(ctx.sender(), unit).await {
            Ok(Some(name)) => format!(
                "✅ Successfully deleted file: {}\n✅ Command \"{}\" unloaded.",
                unit.file_name(),
                name
            ),
            Ok(None) => format!("✅ Successfully deleted file: {}", unit.file_name()),
            Err(RegistryError::UnitNotFound(_)) => format!("❌ File not found: {}", unit.file_name()),
            Err(e) => format!("❌ Error deleting file: {}", e),
        })
    }

    async fn rename(&self, ctx: &CommandContext, from: &UnitId, to: &UnitId) -> Result<String, CommandError> {
        Ok(match ctx.services.registry.rename_unit(ctx.sender(), from, to).await {
            Ok(name) => format!(
                "✅ Successfully renamed file from {} to {}\n✅ Command \"{}\" reloaded successfully!",
                from.file_name(),
                to.file_name(),
                name
            ),
            Err(RegistryError::UnitNotFound(_)) => format!("❌ File not found: {}", from.file_name()),
            Err(RegistryError::UnitExists(_)) => {
                format!("❌ Destination file already exists: {}", to.file_name())
            }
            Err(e) => format!("❌ Error renaming file: {}", e),
        })
    }
}

#[async_trait]
impl CommandHandler for CodeCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let (Some(action), Some(target)) = (ctx.arg(0), ctx.arg(1)) else {
            ctx.reply(&usage(&ctx.prefix())).await?;
            return Ok(());
        };
        let action = action.to_lowercase();
        let unit = UnitId::parse(target)?;

        let body = match action.as_str() {
            "view" => self.view(ctx, &unit).await?,
            "edit" | "create" => {
                let Some(source) = source_from(ctx, ctx.raw_after(2)).await? else {
                    ctx.reply(NEED_SOURCE).await?;
                    return Ok(());
                };
                if action == "edit" {
                    self.edit(ctx, &unit, &source).await?
                } else {
                    self.create(ctx, &unit, &source).await?
                }
            }
            "delete" => self.delete(ctx, &unit).await?,
            "rename" => {
                let Some(to) = ctx.arg(2) else {
                    ctx.reply("❌ Missing new unit name").await?;
                    return Ok(());
                };
                let to = UnitId::parse(to)?;
                self.rename(ctx, &unit, &to).await?
            }
            other => format!(
                "❌ Unknown action: {}\nAvailable actions: view, edit, create, delete, rename",
                other
            ),
        };
        ctx.reply(&body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_create_edit_view_delete() {
        let bot = TestBot::new().await;

        bot.run_as("admin1", "code create poll\nname: poll\nreply: vote now").await;
        assert!(bot.last_body().contains("Command \"poll\" loaded"));
        assert!(bot.services.registry.get("poll").is_some());

        bot.run_as("admin1", "code edit poll\nname: poll\naliases: [vote]\nreply: vote!").await;
        assert!(bot.last_body().starts_with("✅ Successfully edited file: poll.yaml"));
        assert!(bot.services.registry.get("vote").is_some());

        bot.run_as("admin1", "code view poll").await;
        assert!(bot.last_body().contains("aliases: [vote]"));

        bot.run_as("admin1", "code delete poll").await;
        assert!(bot.services.registry.get("poll").is_none());
        assert!(bot.units.get(&UnitId::parse("poll").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_edit_rejecting_collision_keeps_old_source() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "code create poll\nname: poll\nreply: a").await;

        bot.run_as("admin1", "code edit poll\nname: help\nreply: b").await;
        assert!(bot.last_body().starts_with("❌ Validation failed"));
        assert!(bot.services.registry.get("poll").is_some());
        assert_eq!(
            bot.units.get(&UnitId::parse("poll").unwrap()).as_deref(),
            Some("name: poll\nreply: a")
        );
    }

    #[tokio::test]
    async fn test_create_from_replied_message() {
        let bot = TestBot::new().await;
        bot.run_replying("admin1", "code create echo", "name: echo\nreply: '{args}'").await;
        assert!(bot.services.registry.get("echo").is_some());
    }

    #[tokio::test]
    async fn test_rename_moves_command() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "code create poll\nname: poll\nreply: a").await;
        bot.run_as("admin1", "code rename poll survey").await;
        assert!(bot.last_body().starts_with("✅ Successfully renamed file from poll.yaml to survey.yaml"));
        assert_eq!(
            bot.services.registry.get("poll").map(|d| d.unit.to_string()),
            Some("survey".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_explained() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "code create nothing").await;
        assert_eq!(bot.last_body(), NEED_SOURCE);
    }
}
