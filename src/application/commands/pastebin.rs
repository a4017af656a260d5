//! `pastebin`: share a unit or working-directory file, or apply a paste as a unit

use async_trait::async_trait;
use std::path::Path;

use crate::application::errors::{CommandError, RegistryError};
use crate::application::handler::{CommandContext, CommandHandler};
use crate::domain::entities::UnitId;
use crate::infrastructure::remote::pastebin::{extract_raw_link, format_for, to_raw_url};
use crate::infrastructure::remote::updates::resolve_under;

pub struct PastebinCommand;

impl PastebinCommand {
    async fn upload(&self, ctx: &CommandContext, file_name: &str, content: &str) -> Result<(), CommandError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = format_for(extension);
        let client = ctx.services.config.read(|c| ctx.services.remote.pastebin(c));
        let url = client.create_paste(file_name, content, format).await?;
        tracing::info!(target: "audit", "{} uploaded {} to {}", ctx.sender(), file_name, url);

        ctx.reply(&format!(
            "✅ Pastebin link generated successfully!\n\n📄 File: {}\n🔗 Link: {}\n📝 Raw URL: {}\n📋 Format: {}\n\n⏱️ This link will never expire.",
            file_name,
            url,
            to_raw_url(&url),
            format
        ))
        .await?;
        Ok(())
    }

    async fn share_unit(&self, ctx: &CommandContext, target: &str) -> Result<(), CommandError> {
        let unit = UnitId::parse(target)?;
        let source = match ctx.services.registry.read_unit(&unit).await {
            Ok(source) => source,
            Err(RegistryError::UnitNotFound(_)) => {
                ctx.reply(&format!("❌ File not found: {}", unit.file_name())).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.upload(ctx, &unit.file_name(), &source).await
    }

    async fn share_file(&self, ctx: &CommandContext, relative: &str) -> Result<(), CommandError> {
        let Some(path) = resolve_under(&ctx.services.root, relative) else {
            ctx.reply(&format!("❌ Invalid path: {}", relative)).await?;
            return Ok(());
        };
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                ctx.reply(&format!("❌ File not found: {}", relative)).await?;
                return Ok(());
            }
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(relative)
            .to_string();
        self.upload(ctx, &file_name, &content).await
    }

    async fn apply(&self, ctx: &CommandContext, target: Option<&str>) -> Result<(), CommandError> {
        let Some(target) = target else {
            ctx.reply(&format!(
                "❌ Please provide a unit name.\nUsage: {}pastebin apply [unit]\nReply to a message containing a pastebin link.",
                ctx.prefix()
            ))
            .await?;
            return Ok(());
        };
        let unit = UnitId::parse(target)?;
        let Some(replied) = ctx.message.message_reply.as_ref().filter(|r| !r.body.is_empty()) else {
            ctx.reply("❌ Please reply to a message containing a pastebin link.").await?;
            return Ok(());
        };
        let Some(raw_url) = extract_raw_link(&replied.body) else {
            ctx.reply("❌ No pastebin link found in the replied message.").await?;
            return Ok(());
        };

        ctx.reply("🔄 Fetching code from Pastebin...").await?;
        let client = ctx.services.config.read(|c| ctx.services.remote.pastebin(c));
        let source = match client.fetch_raw(&raw_url).await {
            Ok(source) => source,
            Err(e) => {
                ctx.reply(&format!("❌ Failed to fetch code from Pastebin: {}", e)).await?;
                return Ok(());
            }
        };

        let registry = &ctx.services.registry;
        let existed = registry.read_unit(&unit).await.is_ok();
        let verb = if existed { "modified" } else { "created" };
        let current = registry.snapshot().name_for_unit(&unit);
        let validation = registry.validate(&unit, &source, current.as_deref());
        if let Some(error) = validation.error {
            ctx.reply(&format!("❌ Validation failed: {}\n⚠️ File was not {}.", error, verb))
                .await?;
            return Ok(());
        }

        let body = match registry.replace_unit(ctx.sender(), &unit, &source, true).await {
            Ok(name) => format!(
                "✅ Successfully {} file: {}\n✅ Command \"{}\" loaded successfully!\n📝 Source: {}",
                if existed { "updated" } else { "created" },
                unit.file_name(),
                name,
                raw_url
            ),
            Err(e) => format!("❌ Error: {}\n⚠️ File was not {}.", e, verb),
        };
        ctx.reply(&body).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for PastebinCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(first) = ctx.arg(0) else {
            let p = ctx.prefix();
            ctx.reply(&format!(
                "❌ Please provide an action or unit.\nUsage:\n\
                 • {p}pastebin [unit] - Generate pastebin link\n\
                 • {p}pastebin global [file_path] - Generate for any file\n\
                 • {p}pastebin apply [unit] - Apply code from pastebin (reply to message with link)",
                p = p
            ))
            .await?;
            return Ok(());
        };

        match first.to_lowercase().as_str() {
            "apply" => self.apply(ctx, ctx.arg(1)).await,
            "global" => {
                let path = ctx.rest(1);
                if path.is_empty() {
                    ctx.reply("❌ Please provide a file path").await?;
                    return Ok(());
                }
                self.share_file(ctx, &path).await
            }
            _ => self.share_unit(ctx, first).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::application::commands::testkit::TestBot;

    #[tokio::test]
    async fn test_apply_requires_reply_with_link() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "pastebin apply poll").await;
        assert_eq!(bot.last_body(), "❌ Please reply to a message containing a pastebin link.");

        bot.run_replying("admin1", "pb apply poll", "no links in here").await;
        assert_eq!(bot.last_body(), "❌ No pastebin link found in the replied message.");
    }

    #[tokio::test]
    async fn test_global_rejects_escaping_path() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "pastebin global ../secrets.txt").await;
        assert_eq!(bot.last_body(), "❌ Invalid path: ../secrets.txt");
    }

    #[tokio::test]
    async fn test_share_missing_unit() {
        let bot = TestBot::new().await;
        bot.run_as("admin1", "pastebin ghost").await;
        assert_eq!(bot.last_body(), "❌ File not found: ghost.yaml");
    }
}
