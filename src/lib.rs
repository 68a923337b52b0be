// Library exports for the replay binary and tests

pub mod backend;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod dom;
pub mod error;
pub mod lists;
pub mod menu;
pub mod prompt;
pub mod query;
pub mod selection;

// Re-export commonly used types
pub use backend::ChannelObserver;
pub use bridge::{Bridge, Diagnostics};
pub use config::BridgeConfig;
pub use dispatch::{Action, ActionKind, ActionSink, ChannelDispatcher, CommandChannel, Delivery};
pub use dom::Document;
pub use prompt::{Prompter, ScriptedPrompter};
