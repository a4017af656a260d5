//! Fixture for command tests: a bot with recording chat, in-memory store and units

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::handler::{CommandContext, Services};
use crate::application::messaging::parser::MessageParser;
use crate::application::registry::{CommandRegistry, HandlerCatalog};
use crate::domain::entities::{CurrencyRecord, MessageEvent, ReplyRef, UnitId, UserId, UserRecord};
use crate::infrastructure::adapters::console::ConsoleAdapter;
use crate::infrastructure::config::{BotConfig, ConfigHandle};
use crate::infrastructure::storage::JsonStore;
use crate::infrastructure::units::MemoryUnitStore;

const UNITS: &[(&str, &str)] = &[
    ("admin", "name: admin\naliases: [a, system]\npermission: admin\nhandler: admin\n"),
    ("cmd", "name: cmd\npermission: admin\nhandler: cmd\n"),
    ("code", "name: code\naliases: [codeedit]\npermission: admin\nhandler: code\n"),
    ("pastebin", "name: pastebin\naliases: [pb]\npermission: admin\nhandler: pastebin\n"),
    ("update", "name: update\npermission: owner\nhandler: update\n"),
    ("cleanup", "name: cleanup\npermission: owner\nhandler: cleanup\n"),
    ("loan", "name: loan\nhandler: loan\n"),
    ("help", "name: help\naliases: [h]\nhandler: help\n"),
];

pub struct TestBot {
    pub services: Services,
    pub api: Arc<ConsoleAdapter>,
    pub units: Arc<MemoryUnitStore>,
    next_message: AtomicU64,
}

impl TestBot {
    pub const THREAD: &'static str = "T1";

    pub async fn new() -> Self {
        let config = ConfigHandle::in_memory(BotConfig {
            owner_id: UserId::new("owner"),
            admin_ids: vec![UserId::new("admin1")],
            support_ids: vec![UserId::new("helper")],
            ..BotConfig::default()
        });
        let units = Arc::new(MemoryUnitStore::new());
        for (id, source) in UNITS {
            units.insert(UnitId::parse(id).unwrap(), *source);
        }
        let registry = Arc::new(CommandRegistry::new(
            units.clone(),
            HandlerCatalog::with_builtins(),
            config.clone(),
        ));
        registry.load_all().await.unwrap();

        let api = Arc::new(ConsoleAdapter::new("bot"));
        let services = Services::new(api.clone(), Arc::new(JsonStore::in_memory()), config, registry);
        Self {
            services,
            api,
            units,
            next_message: AtomicU64::new(1),
        }
    }

    pub fn message(&self, sender: &str, body: &str) -> MessageEvent {
        let n = self.next_message.fetch_add(1, Ordering::Relaxed);
        MessageEvent::new(Self::THREAD, format!("in-{}", n), sender, body)
    }

    pub async fn run_message(&self, message: MessageEvent) {
        let parsed = MessageParser::new("")
            .parse(&message.body)
            .expect("test message names a command");
        let command = self
            .services
            .registry
            .get(&parsed.name)
            .expect("command is loaded");
        let ctx = CommandContext {
            services: self.services.clone(),
            message,
            command: command.clone(),
            args: parsed.args,
            raw_args: parsed.raw_args,
        };
        if let Err(e) = command.handler().run(&ctx).await {
            ctx.reply(&format!("❌ {}", e)).await.unwrap();
        }
    }

    /// Run `text` (no prefix) as a command sent by `sender`
    pub async fn run_as(&self, sender: &str, text: &str) {
        let message = self.message(sender, text);
        self.run_message(message).await;
    }

    /// Run `text` as a reply to an earlier message
    pub async fn run_replying(&self, sender: &str, text: &str, replied_body: &str) {
        let message = self.message(sender, text).replying_to(ReplyRef {
            message_id: "earlier".into(),
            sender_id: Some(UserId::new(sender)),
            body: replied_body.to_string(),
        });
        self.run_message(message).await;
    }

    pub fn last_body(&self) -> String {
        self.api.sent().last().map(|m| m.body.clone()).unwrap_or_default()
    }

    pub async fn store_user(&self, id: &str, name: &str) {
        self.services
            .store
            .save_user(&UserRecord::new(id, name))
            .await
            .unwrap();
    }

    pub async fn store_money(&self, id: &str, money: i64) {
        self.services
            .store
            .save_currency(&CurrencyRecord::new(id, money))
            .await
            .unwrap();
    }
}
