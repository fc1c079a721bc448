pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::DeckConfig;
pub use error::{DeckError, Result};
pub use events::DomainEvent;
pub use types::*;
