//! Application services - access control and rate limiting

pub mod access;
pub mod cooldown;

pub use access::{check_access, denial_message, required_level, user_level};
pub use cooldown::CooldownTracker;
