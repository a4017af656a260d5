//! `update [full]`: pull newer files from the update host
//!
//! The plan is shown first and applied only when the owner replies "yes".
//! With `full` (or `all`, `github`, `repo`) the GitHub repo's version is the
//! baseline and the applied files are pushed back to the repo.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::errors::{BotError, CommandError};
use crate::application::handler::{CommandContext, CommandHandler, ReplyContext, Services};
use crate::domain::entities::{MessageId, ThreadId};
use crate::infrastructure::remote::updates::{
    read_local_version, resolve_under, write_local_version, Baseline, UpdatePlan,
};

const FULL_UPDATE_KEYWORDS: &[&str] = &["full", "all", "github", "repo"];

pub struct UpdateCommand;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingUpdate {
    plan: UpdatePlan,
    full: bool,
}

/// One progress message, edited in place as the update advances
pub struct StatusMessage {
    thread_id: ThreadId,
    reply_to: MessageId,
    message_id: Option<MessageId>,
}

impl StatusMessage {
    pub fn new(thread_id: ThreadId, reply_to: MessageId) -> Self {
        Self {
            thread_id,
            reply_to,
            message_id: None,
        }
    }

    pub async fn show(&mut self, services: &Services, text: &str) {
        if let Some(id) = &self.message_id {
            match services.api.edit_message(&self.thread_id, id, text).await {
                Ok(()) => return,
                Err(e) => tracing::warn!("Status message update failed: {}", e),
            }
        }
        match services
            .api
            .send_message(&self.thread_id, text, Some(&self.reply_to))
            .await
        {
            Ok(id) => self.message_id = Some(id),
            Err(e) => tracing::warn!("Status send failed: {}", e),
        }
    }
}

/// Whether any updated file lives under the commands directory
fn touches_commands<'a>(files: impl IntoIterator<Item = &'a str>, commands_dir: &Path, root: &Path) -> bool {
    let dir = commands_dir.strip_prefix(root).unwrap_or(commands_dir);
    files.into_iter().any(|f| Path::new(f).starts_with(dir))
}

pub fn render_prompt(plan: &UpdatePlan, full: bool) -> String {
    let files = if plan.files.is_empty() {
        "• No files listed in manifest.".to_string()
    } else {
        plan.files
            .iter()
            .map(|f| format!("• {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let comparison = match plan.baseline {
        Baseline::Repo => format!("GitHub repo version detected: v{}", plan.baseline_version),
        Baseline::Local => format!("Current bot version: v{}", plan.baseline_version),
    };
    let changes = if plan.changelog_lines.is_empty() {
        "• No changelog entries.".to_string()
    } else {
        plan.changelog_lines.join("\n")
    };
    format!(
        "🚀 Updates available up to v{}\n({})\n\n📝 Changes since v{}:\n{}\n\n📂 Files to update ({}):\n{}\n\nReply \"yes\" to update runtime files.{}",
        plan.target_version,
        comparison,
        plan.baseline_version,
        changes,
        plan.files.len(),
        files,
        if full { "\n(This will also push changes to your GitHub repo)" } else { "" }
    )
}

impl UpdateCommand {
    fn version_path(services: &Services) -> (String, PathBuf) {
        let file = services.config.read(|c| c.update.version_file.clone());
        let path = services.root.join(&file);
        (file.to_string_lossy().into_owned(), path)
    }

    async fn check(&self, ctx: &CommandContext) -> Result<String, CommandError> {
        let services = &ctx.services;
        let config = services.config.get();
        let Some(client) = services.remote.updates(&config) else {
            return Ok("⚠️ Please configure update.baseUrl in the config first!".to_string());
        };

        let entries = client.fetch_manifest().await?;
        if entries.is_empty() {
            return Ok("❌ Remote manifest does not contain any valid versions.".to_string());
        }

        let (version_file, version_path) = Self::version_path(services);
        let local_version = if version_path.exists() {
            read_local_version(&version_path)?
        } else {
            "0.0.0".to_string()
        };

        let full = ctx
            .arg(0)
            .map(|a| FULL_UPDATE_KEYWORDS.contains(&a.to_lowercase().as_str()))
            .unwrap_or(false);
        let mut baseline = (local_version.clone(), Baseline::Local);
        if full {
            if let Some(github) = services.remote.github(&config) {
                match github.repo_version(&version_file).await {
                    Ok(Some(version)) => baseline = (version, Baseline::Repo),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Unable to fetch GitHub repo version: {}", e),
                }
            }
        }

        let Some(plan) = UpdatePlan::build(&entries, &baseline.0, baseline.1, &version_file) else {
            return Ok(match baseline.1 {
                Baseline::Repo => format!(
                    "✅ GitHub repository is already on the latest version ({}).",
                    baseline.0
                ),
                Baseline::Local => format!("✅ You are already on the latest version ({}).", local_version),
            });
        };

        let prompt = ctx.reply(&render_prompt(&plan, full)).await?;
        let data = serde_json::to_value(PendingUpdate { plan, full })
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
        ctx.expect_reply(prompt, data);
        Ok(String::new())
    }

    async fn apply(ctx: &ReplyContext, pending: PendingUpdate, status: &mut StatusMessage) -> Result<String, CommandError> {
        let services = &ctx.services;
        let config = services.config.get();
        let client = services
            .remote
            .updates(&config)
            .ok_or_else(|| CommandError::ExecutionFailed("update.baseUrl is not configured".to_string()))?;
        let (version_file, version_path) = Self::version_path(services);
        let plan = &pending.plan;

        let mut updated: Vec<(String, Vec<u8>)> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        for file in plan.files.iter().filter(|f| **f != version_file) {
            let Some(target) = resolve_under(&services.root, file) else {
                tracing::warn!("Refusing update path outside the working directory: {}", file);
                failed.push(file.clone());
                continue;
            };
            let result = async {
                let bytes = client.download(file).await?;
                if let Some(dir) = target.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| BotError::Internal(e.to_string()))?;
                }
                tokio::fs::write(&target, &bytes)
                    .await
                    .map_err(|e| BotError::Internal(e.to_string()))?;
                Ok::<_, BotError>(bytes)
            }
            .await;
            match result {
                Ok(bytes) => updated.push((file.clone(), bytes)),
                Err(e) => {
                    tracing::error!("Failed to update {}: {}", file, e);
                    failed.push(file.clone());
                }
            }
        }

        write_local_version(&version_path, &plan.target_version)?;
        let version_bytes = tokio::fs::read(&version_path)
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
        updated.push((version_file.clone(), version_bytes));
        tracing::info!(target: "audit", "{} applied update to v{}", ctx.message.sender_id, plan.target_version);

        let mut report = format!(
            "✅ Runtime Update Complete!\n🆕 Version: {}\n📂 Updated: {}",
            plan.target_version,
            updated.len()
        );
        if !failed.is_empty() {
            report.push_str(&format!("\n⚠️ Failed: {}", failed.len()));
        }

        if touches_commands(updated.iter().map(|(f, _)| f.as_str()), &config.commands_dir, &services.root) {
            match services.registry.load_all().await {
                Ok(loaded) => report.push_str(&format!("\n🔁 Reloaded {} commands", loaded.loaded)),
                Err(e) => report.push_str(&format!("\n⚠️ Command reload failed: {}", e)),
            }
        }

        if pending.full {
            status.show(services, "☁️ Pushing changes to GitHub...").await;
            match services.remote.github(&config).filter(|g| g.can_push()) {
                None => report.push_str("\n\n❌ GitHub Push Failed: Missing or invalid GitHub config."),
                Some(github) => {
                    let message = format!("Auto-update to v{}", plan.target_version);
                    let mut pushed = 0;
                    for (file, bytes) in &updated {
                        if let Err(e) = github.push_file(file, bytes, &message).await {
                            report.push_str(&format!("\n\n❌ GitHub Push Error: {}", e));
                            break;
                        }
                        pushed += 1;
                    }
                    if pushed == updated.len() {
                        report.push_str(&format!("\n\n☁️ GitHub Sync: {} files pushed.", pushed));
                    }
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl CommandHandler for UpdateCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match self.check(ctx).await {
            Ok(body) if body.is_empty() => {}
            Ok(body) => {
                ctx.reply(&body).await?;
            }
            Err(e) => {
                tracing::error!("Update check failed: {}", e);
                ctx.reply(&format!("❌ Check failed: {}", e)).await?;
            }
        }
        Ok(())
    }

    fn handles_replies(&self) -> bool {
        true
    }

    async fn handle_reply(&self, ctx: &ReplyContext) -> Result<(), CommandError> {
        if !ctx.body().eq_ignore_ascii_case("yes") {
            ctx.reply("❌ Update cancelled.").await?;
            return Ok(());
        }
        let pending: PendingUpdate = serde_json::from_value(ctx.data().clone())
            .map_err(|e| CommandError::ExecutionFailed(format!("Invalid update plan: {}", e)))?;

        if let Err(e) = ctx
            .services
            .api
            .unsend_message(&ctx.message.thread_id, &ctx.waiter.message_id)
            .await
        {
            tracing::warn!("Could not unsend update prompt: {}", e);
        }

        let mut status = StatusMessage::new(ctx.message.thread_id.clone(), ctx.message.message_id.clone());
        status
            .show(
                &ctx.services,
                &format!(
                    "🔄 Starting {} update to v{}...",
                    if pending.full { "FULL" } else { "RUNTIME" },
                    pending.plan.target_version
                ),
            )
            .await;

        let report = match Self::apply(ctx, pending, &mut status).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Update execution failed: {}", e);
                format!("❌ Update failed: {}", e)
            }
        };
        status.show(&ctx.services, &report).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::testkit::TestBot;
    use crate::infrastructure::remote::updates::{UpdateManifest, VersionEntry};
    use serde_json::json;

    fn plan() -> UpdatePlan {
        let entries: Vec<VersionEntry> = UpdateManifest::normalize(&json!({
            "version": "1.1.0",
            "files": ["commands/help.yaml"],
            "changelog": "better help"
        }));
        UpdatePlan::build(&entries, "1.0.0", Baseline::Local, "version.json").unwrap()
    }

    #[test]
    fn test_prompt_lists_files() {
        let prompt = render_prompt(&plan(), true);
        assert!(prompt.starts_with("🚀 Updates available up to v1.1.0"));
        assert!(prompt.contains("📂 Files to update (2):\n• commands/help.yaml\n• version.json"));
        assert!(prompt.ends_with("(This will also push changes to your GitHub repo)"));
    }

    #[test]
    fn test_touches_commands_compares_path_components() {
        let root = Path::new("/srv/bot");
        assert!(touches_commands(["version.json", "commands/help.yaml"], Path::new("commands"), root));
        assert!(touches_commands(["commands/help.yaml"], Path::new("commands/"), root));
        assert!(touches_commands(["commands/help.yaml"], Path::new("/srv/bot/commands"), root));
        assert!(!touches_commands(["commands-old/help.yaml"], Path::new("commands"), root));
        assert!(!touches_commands(["version.json"], Path::new("commands"), root));
    }

    #[tokio::test]
    async fn test_version_path_joins_root() {
        let bot = TestBot::new().await;
        let (file, path) = UpdateCommand::version_path(&bot.services);
        assert_eq!(file, "version.json");
        assert_eq!(path, bot.services.root.join("version.json"));
    }

    #[tokio::test]
    async fn test_unconfigured_host() {
        let bot = TestBot::new().await;
        bot.run_as("owner", "update").await;
        assert_eq!(bot.last_body(), "⚠️ Please configure update.baseUrl in the config first!");
    }

    #[tokio::test]
    async fn test_status_message_edits_in_place() {
        let bot = TestBot::new().await;
        let mut status = StatusMessage::new(ThreadId::new(TestBot::THREAD), MessageId::new("in-1"));
        status.show(&bot.services, "step 1").await;
        status.show(&bot.services, "step 2").await;

        let sent = bot.api.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(bot.api.edits(), vec![(sent[0].id.clone(), "step 2".to_string())]);
    }
}
