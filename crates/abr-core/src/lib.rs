//! abr-core: shared types, ids, errors, ladder model, and configuration.
//!
//! This crate is the foundational dependency for the other abr-* crates,
//! providing the item identifier, a unified error type, the rendition
//! ladder model, and the configuration snapshot handed to the packager.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod ladder;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventBus, LibraryEvent};
pub use ids::ItemId;
pub use ladder::{Ladder, LadderProfile};
pub use media::{StreamInfo, StreamKind};
