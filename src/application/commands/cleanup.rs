//! `cleanup`: find stored threads the bot can no longer reach and delete them
//! once the owner replies "confirm".
//!
//! Probes run one at a time with a fixed gap so the platform API is never burst.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler, ReplyContext};
use crate::domain::entities::{ThreadId, UserId};
use crate::domain::traits::ChatApi;

pub const PROBE_GAP: Duration = Duration::from_secs(1);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const REPORT_LIMIT: usize = 10;

pub struct CleanupCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Valid,
    NotMember,
    EmptyResponse,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadThread {
    pub thread_id: ThreadId,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub valid: usize,
    pub not_member: Vec<DeadThread>,
    pub empty_response: Vec<DeadThread>,
    pub errors: usize,
}

impl ScanReport {
    pub fn to_delete(&self) -> Vec<DeadThread> {
        self.not_member
            .iter()
            .chain(self.empty_response.iter())
            .cloned()
            .collect()
    }

    pub fn render(&self) -> String {
        let dead = self.to_delete();
        let mut report = String::from("📋 Cleanup Scan Complete\n\n");
        report.push_str(&format!("✅ Valid threads: {}\n", self.valid));
        report.push_str(&format!("❌ Not member: {}\n", self.not_member.len()));
        report.push_str(&format!("⚠️ Empty response: {}\n", self.empty_response.len()));
        report.push_str(&format!("🔴 Errors (skipped): {}\n\n", self.errors));

        if dead.is_empty() {
            report.push_str("✅ No dead threads found!");
            return report;
        }
        report.push_str("🗑️ Threads to delete:\n");
        for thread in dead.iter().take(REPORT_LIMIT) {
            let name: String = thread.name.chars().take(20).collect();
            report.push_str(&format!("• {} ({}...)\n", thread.thread_id, name));
        }
        if dead.len() > REPORT_LIMIT {
            report.push_str(&format!("... and {} more\n", dead.len() - REPORT_LIMIT));
        }
        report.push_str(&format!(
            "\n💡 Reply \"confirm\" to this message to delete these {} threads.",
            dead.len()
        ));
        report
    }
}

/// Ask the platform about one thread, bounded by [`PROBE_TIMEOUT`]
pub async fn probe(api: &dyn ChatApi, bot_id: &UserId, thread_id: &ThreadId) -> Probe {
    match tokio::time::timeout(PROBE_TIMEOUT, api.thread_info(thread_id)).await {
        Err(_) => {
            tracing::warn!("Probe of {} timed out", thread_id);
            Probe::Error
        }
        Ok(Err(e)) => {
            tracing::warn!("Probe of {} failed: {}", thread_id, e);
            Probe::Error
        }
        Ok(Ok(None)) => Probe::EmptyResponse,
        Ok(Ok(Some(info))) if info.participant_ids.is_empty() => Probe::EmptyResponse,
        Ok(Ok(Some(info))) if info.participant_ids.contains(bot_id) => Probe::Valid,
        Ok(Ok(Some(_))) => Probe::NotMember,
    }
}

impl CleanupCommand {
    async fn scan(&self, ctx: &CommandContext) -> Result<ScanReport, CommandError> {
        let api = ctx.services.api.as_ref();
        let bot_id = api.bot_id();
        let threads = ctx.services.store.list_threads().await?;
        let mut report = ScanReport::default();

        for (i, thread) in threads.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PROBE_GAP).await;
            }
            tracing::debug!("Checking thread {} ({})", thread.thread_id, thread.name);
            let dead = DeadThread {
                name: if thread.name.is_empty() { "Unknown".to_string() } else { thread.name.clone() },
                thread_id: thread.thread_id.clone(),
            };
            match probe(api, &bot_id, &thread.thread_id).await {
                Probe::Valid => report.valid += 1,
                Probe::NotMember => report.not_member.push(dead),
                Probe::EmptyResponse => report.empty_response.push(dead),
                Probe::Error => report.errors += 1,
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl CommandHandler for CleanupCommand {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let count = ctx.services.store.list_threads().await?.len();
        if count == 0 {
            ctx.reply("✅ No threads in database to scan.").await?;
            return Ok(());
        }
        ctx.reply(&format!("🔍 Starting cleanup scan...\n📊 Total threads: {}", count))
            .await?;

        let report = self.scan(ctx).await?;
        let dead = report.to_delete();
        let prompt = ctx.reply(&report.render()).await?;
        if !dead.is_empty() {
            let data = serde_json::to_value(&dead)
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
            ctx.expect_reply(prompt, data);
        }
        Ok(())
    }

    fn handles_replies(&self) -> bool {
        true
    }

    async fn handle_reply(&self, ctx: &ReplyContext) -> Result<(), CommandError> {
        if !ctx.body().eq_ignore_ascii_case("confirm") {
            ctx.reply("❌ Cleanup cancelled. Reply \"confirm\" to delete.").await?;
            return Ok(());
        }
        let dead: Vec<DeadThread> = serde_json::from_value(ctx.data().clone())
            .map_err(|e| CommandError::ExecutionFailed(format!("Invalid cleanup data: {}", e)))?;

        let services = &ctx.services;
        let thread_id = &ctx.message.thread_id;
        let message_id = &ctx.message.message_id;
        if let Err(e) = services.api.set_reaction(thread_id, message_id, "⏳").await {
            tracing::debug!("Could not set progress reaction: {}", e);
        }

        let mut deleted = 0;
        for thread in &dead {
            match services.store.delete_thread(&thread.thread_id).await {
                Ok(true) => {
                    deleted += 1;
                    tracing::info!("Deleted thread {} ({})", thread.thread_id, thread.name);
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to delete {}: {}", thread.thread_id, e),
            }
        }
        tracing::info!(target: "audit", "{} deleted {} dead threads", ctx.message.sender_id, deleted);

        if let Err(e) = services.api.set_reaction(thread_id, message_id, "✅").await {
            tracing::debug!("Could not set done reaction: {}", e);
        }
        ctx.reply(&format!(
            "🎉 Cleanup Complete!\n\nDeleted {} dead threads from database.",
            deleted
        ))
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::testkit::TestBot;
    use crate::domain::entities::ThreadRecord;
    use crate::domain::traits::ThreadInfo;

    #[tokio::test(start_paused = true)]
    async fn test_scan_classifies_threads() {
        let bot = TestBot::new().await;
        for id in ["alive", "left", "gone"] {
            bot.services
                .store
                .save_thread(&ThreadRecord::new(id, format!("{} group", id)))
                .await
                .unwrap();
        }
        bot.api.add_thread(ThreadInfo::new("alive", "alive group").with_participants(vec![
            UserId::new("bot"),
            UserId::new("U1"),
        ]));
        bot.api.add_thread(ThreadInfo::new("left", "left group").with_participants(vec![UserId::new("U1")]));

        bot.run_as("owner", "cleanup").await;
        let report = bot.last_body();
        assert!(report.contains("✅ Valid threads: 1"));
        assert!(report.contains("❌ Not member: 1"));
        assert!(report.contains("⚠️ Empty response: 1"));
        assert!(report.contains("delete these 2 threads"));

        let prompt = bot.api.sent().last().unwrap().id.clone();
        let waiter = bot
            .services
            .interactions
            .take_reply(&ThreadId::new(TestBot::THREAD), &prompt, &UserId::new("owner"))
            .expect("confirmation pending");
        let dead: Vec<DeadThread> = serde_json::from_value(waiter.data).unwrap();
        assert_eq!(dead.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let bot = TestBot::new().await;
        bot.run_as("owner", "cleanup").await;
        assert_eq!(bot.last_body(), "✅ No threads in database to scan.");
    }

    #[test]
    fn test_report_truncates_long_lists() {
        let report = ScanReport {
            valid: 0,
            not_member: (0..12)
                .map(|i| DeadThread {
                    thread_id: ThreadId::new(format!("t{}", i)),
                    name: "a very long thread name indeed".to_string(),
                })
                .collect(),
            empty_response: Vec::new(),
            errors: 0,
        };
        let body = report.render();
        assert!(body.contains("• t0 (a very long thread n...)"));
        assert!(body.contains("... and 2 more"));
    }
}
