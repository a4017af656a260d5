//! Domain layer - Core types with no infrastructure dependencies
//!
//! This layer contains:
//! - Entities: identifiers, inbound events, command metadata, stored records
//! - Traits: Abstractions for infrastructure (ChatApi, Store, UnitStore)

pub mod entities;
pub mod traits;
