//! Platform adapters: each one turns a chat platform into [`ChatApi`] plus a
//! stream of [`InboundEvent`]s.
//!
//! [`ChatApi`]: crate::domain::traits::ChatApi
//! [`InboundEvent`]: crate::domain::entities::InboundEvent

pub mod console;
pub mod telegram;

pub use console::ConsoleAdapter;
pub use telegram::TelegramAdapter;
