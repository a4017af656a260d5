//! threadkeeper - a chat automation bot with hot-reloadable commands
//!
//! Layers:
//! - [`domain`]: entities and the capability traits the bot talks through
//! - [`application`]: command registry, pending interactions, dispatcher
//!   and the built-in commands
//! - [`infrastructure`]: config, storage, unit files, platform adapters and
//!   remote HTTP clients

pub mod application;
pub mod domain;
pub mod infrastructure;
