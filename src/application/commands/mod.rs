//! Built-in command handlers
//!
//! Units under `commands/` bind to these by kind (`handler: admin`). A unit
//! can instead carry a `reply` template, which is served by [`TemplateHandler`].

pub mod admin;
pub mod cleanup;
pub mod cmd;
pub mod code;
pub mod help;
pub mod loan;
pub mod pastebin;
pub mod update;

#[cfg(test)]
pub(crate) mod testkit;

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::application::handler::{CommandContext, CommandHandler};
use crate::infrastructure::remote::pastebin::extract_raw_link;

pub use admin::AdminCommand;
pub use cleanup::CleanupCommand;
pub use cmd::CmdCommand;
pub use code::CodeCommand;
pub use help::HelpCommand;
pub use loan::LoanCommand;
pub use pastebin::PastebinCommand;
pub use update::UpdateCommand;

/// Every handler kind shipped with the bot
pub fn builtin_handlers() -> Vec<(&'static str, Arc<dyn CommandHandler>)> {
    vec![
        ("admin", Arc::new(AdminCommand) as Arc<dyn CommandHandler>),
        ("cmd", Arc::new(CmdCommand)),
        ("code", Arc::new(CodeCommand)),
        ("pastebin", Arc::new(PastebinCommand)),
        ("update", Arc::new(UpdateCommand)),
        ("cleanup", Arc::new(CleanupCommand)),
        ("loan", Arc::new(LoanCommand)),
        ("help", Arc::new(HelpCommand)),
    ]
}

/// Source text for edit/create style commands: `inline` when given,
/// otherwise the replied-to message, fetching it from pastebin when it holds
/// a paste link. `None` when there is nothing to use.
pub(crate) async fn source_from(ctx: &CommandContext, inline: &str) -> Result<Option<String>, CommandError> {
    if !inline.trim().is_empty() {
        return Ok(Some(inline.to_string()));
    }
    let Some(replied) = ctx.message.message_reply.as_ref().filter(|r| !r.body.trim().is_empty()) else {
        return Ok(None);
    };
    let Some(link) = extract_raw_link(&replied.body) else {
        return Ok(Some(replied.body.clone()));
    };

    ctx.reply("🔄 Fetching code from Pastebin...").await?;
    let client = ctx.services.config.read(|c| ctx.services.remote.pastebin(c));
    let code = client
        .fetch_raw(&link)
        .await
        .map_err(|e| CommandError::ExecutionFailed(format!("Failed to fetch code from Pastebin: {}", e)))?;
    Ok(Some(code))
}

/// Canned reply declared in the unit itself
pub struct TemplateHandler {
    template: String,
}

impl TemplateHandler {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, sender: &str, args: &str, thread: &str) -> String {
        self.template
            .replace("{sender}", sender)
            .replace("{args}", args)
            .replace("{thread}", thread)
    }
}

#[async_trait]
impl CommandHandler for TemplateHandler {
    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let body = self.render(ctx.sender().as_str(), ctx.raw_args.trim(), ctx.thread().as_str());
        ctx.reply(&body).await?;
        Ok(())
    }
}
