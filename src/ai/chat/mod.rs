pub mod core;
pub use self::core::{Chat, ChatBuilder, Render, Session, TurnError, TurnState};

pub mod models;
pub use models::{ChatMessage, Transcript};

pub mod render;
pub use render::{NullRenderer, TerminalRenderer, format_score};
