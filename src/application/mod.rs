//! Application layer - registry, correlation state, dispatch and commands
//!
//! This layer contains:
//! - Registry: command units compiled into the live dispatch table
//! - Interactions: pending reaction, reply and loan waiters
//! - Messaging: prefix parsing and the event dispatcher
//! - Commands: the built-in command handlers
//! - Errors: application error taxonomy

pub mod commands;
pub mod errors;
pub mod handler;
pub mod interactions;
pub mod loan;
pub mod messaging;
pub mod registry;
pub mod services;
