use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::channel::{ChannelName, ChannelSink};
use crate::error::ActionKindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Open,
    Rename,
    Share,
    Delete,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Open => "open",
            ActionKind::Rename => "rename",
            ActionKind::Share => "share",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "open" => Ok(ActionKind::Open),
            "rename" => Ok(ActionKind::Rename),
            "share" => Ok(ActionKind::Share),
            "delete" => Ok(ActionKind::Delete),
            other => Err(ActionKindError(other.to_string())),
        }
    }
}

/// One user intent, consumed as soon as it is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub target_id: String,
    #[serde(default)]
    pub argument: String,
}

impl Action {
    pub fn new(kind: ActionKind, target_id: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
            argument: argument.into(),
        }
    }

    pub fn open(target_id: impl Into<String>) -> Self {
        Self::new(ActionKind::Open, target_id, "")
    }

    pub fn rename(target_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(ActionKind::Rename, target_id, title)
    }

    pub fn share(target_id: impl Into<String>) -> Self {
        Self::new(ActionKind::Share, target_id, "")
    }

    pub fn delete(target_id: impl Into<String>) -> Self {
        Self::new(ActionKind::Delete, target_id, "")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Nothing on the other side could observe the action.
    Dropped,
}

/// Where user actions go.
pub trait ActionSink {
    /// Runs synchronously right before a deferred [`dispatch`](Self::dispatch).
    fn prepare(&self) {}

    fn dispatch(&self, action: &Action) -> Delivery;
}

/// Encodes actions as writes into the hidden channels.
///
/// The kind channel is cleared before anything else and written last, so the
/// backend sees exactly one transition to a non-empty kind per action even
/// when the same action is repeated.
pub struct ChannelDispatcher<W> {
    writer: W,
}

impl<W: ChannelSink> ChannelDispatcher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: ChannelSink> ActionSink for ChannelDispatcher<W> {
    fn prepare(&self) {
        self.writer.write_value(ChannelName::Kind, "");
    }

    fn dispatch(&self, action: &Action) -> Delivery {
        self.writer.write_value(ChannelName::Kind, "");
        self.writer
            .write_value(ChannelName::Argument, &action.argument);
        self.writer.write_value(ChannelName::Id, &action.target_id);
        let ready = self
            .writer
            .write_value(ChannelName::Kind, action.kind.as_str());

        // The same id/kind pair can repeat; the trigger is observed regardless.
        if action.kind == ActionKind::Open {
            self.writer.fire_trigger(ChannelName::OpenTrigger);
        }

        if ready {
            debug!(
                target = "thread_bridge::dispatch",
                kind = %action.kind,
                target_id = %action.target_id,
                "action written to channels"
            );
            Delivery::Sent
        } else {
            debug!(
                target = "thread_bridge::dispatch",
                kind = %action.kind,
                "kind channel missing, action dropped"
            );
            Delivery::Dropped
        }
    }
}

/// An action posted as a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub seq: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl Command {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Typed command channel: each action travels atomically with a sequence
/// number instead of being spread over several value channels.
pub struct CommandChannel {
    sender: UnboundedSender<Command>,
    next_seq: Cell<u64>,
}

impl CommandChannel {
    pub fn new() -> (Self, UnboundedReceiver<Command>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                next_seq: Cell::new(1),
            },
            receiver,
        )
    }
}

impl ActionSink for CommandChannel {
    fn dispatch(&self, action: &Action) -> Delivery {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let command = Command {
            seq,
            action: action.clone(),
        };
        match self.sender.send(command) {
            Ok(()) => Delivery::Sent,
            Err(_) => {
                info!(
                    target = "thread_bridge::dispatch",
                    kind = %action.kind,
                    "command receiver closed, action dropped"
                );
                Delivery::Dropped
            }
        }
    }
}
