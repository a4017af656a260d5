//! Domain traits - Abstractions for infrastructure implementations

pub mod chat;
pub mod store;
pub mod units;

pub use chat::{ChatApi, ThreadInfo, UserInfo};
pub use store::Store;
pub use units::UnitStore;
