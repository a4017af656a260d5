//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod event;
pub mod ids;
pub mod records;

pub use command::{CommandConfig, Permission, UnitId};
pub use event::{InboundEvent, MessageEvent, ReactionEvent, ReplyRef};
pub use ids::{MessageId, ThreadId, UserId};
pub use records::{CurrencyRecord, ThreadRecord, ThreadSettings, UserRecord};
