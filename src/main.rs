use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use keyboard_types::Key;
use kuchiki::NodeRef;
use thread_bridge::dispatch::Command;
use thread_bridge::dom::{DomEvent, ElementExt, EventType, MouseButton};
use thread_bridge::menu::MENU_ITEM_CLASS;
use thread_bridge::query::DeepQuery;
use thread_bridge::{
    Bridge, BridgeConfig, ChannelObserver, CommandChannel, Document, ScriptedPrompter,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::LocalSet;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: thread-bridge <page.html> <gestures.txt> [--typed]";

/// Where dispatched actions end up during a replay.
enum Observed {
    Channels(Rc<ChannelObserver>),
    Commands(UnboundedReceiver<Command>),
}

impl Observed {
    fn drain_json(&mut self) -> Result<Vec<String>> {
        match self {
            Observed::Channels(observer) => observer
                .take_actions()
                .iter()
                .map(|action| serde_json::to_string(action).context("failed to encode action"))
                .collect(),
            Observed::Commands(receiver) => {
                let mut lines = Vec::new();
                while let Ok(command) = receiver.try_recv() {
                    lines.push(command.to_json().context("failed to encode command")?);
                }
                Ok(lines)
            }
        }
    }
}

struct Replay {
    bridge: Bridge,
    query: DeepQuery,
    prompter: Rc<ScriptedPrompter>,
    observed: Observed,
}

fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let mut args = std::env::args().skip(1);
    let page = args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?;
    let gestures = args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))?;
    let typed = args.any(|arg| arg == "--typed");

    let config = BridgeConfig::from_env().context("failed to load bridge configuration")?;
    let html = fs::read_to_string(&page)
        .with_context(|| format!("failed to read page {}", page.display()))?;
    let script = fs::read_to_string(&gestures)
        .with_context(|| format!("failed to read gestures {}", gestures.display()))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let local = LocalSet::new();
    local.block_on(&rt, replay(config, &html, &script, typed))
}

async fn replay(config: BridgeConfig, html: &str, script: &str, typed: bool) -> Result<()> {
    let document = Rc::new(Document::parse(html));
    let prompter = Rc::new(ScriptedPrompter::new());
    let query = DeepQuery::new(Rc::clone(&document), config.app_root.clone());

    let (bridge, observed) = if typed {
        let (channel, receiver) = CommandChannel::new();
        let bridge = Bridge::new(
            Rc::clone(&document),
            config,
            Rc::new(channel),
            prompter.clone(),
        );
        (bridge, Observed::Commands(receiver))
    } else {
        let observer = ChannelObserver::attach(Rc::clone(&document), &config);
        let bridge = Bridge::with_hidden_channels(Rc::clone(&document), config, prompter.clone());
        (bridge, Observed::Channels(observer))
    };

    bridge.start();
    tokio::task::spawn_local(bridge.task_driver());
    let mut replay = Replay {
        bridge,
        query,
        prompter,
        observed,
    };

    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        replay
            .step(line)
            .await
            .with_context(|| format!("gesture {} failed: {line}", index + 1))?;
        settle().await;
        for json in replay.observed.drain_json()? {
            println!("{json}");
        }
    }

    info!(
        selected = ?replay.bridge.selection().selected_ids(),
        "replay finished"
    );
    Ok(())
}

impl Replay {
    async fn step(&mut self, line: &str) -> Result<()> {
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        debug!(%verb, %rest, "gesture");

        match verb {
            "click" => {
                let (target_id, copy) = rest.split_once(' ').unwrap_or((rest, "primary"));
                let item = self.item(target_id, copy.trim())?;
                let target = self.title_or_item(&item);
                self.fire(DomEvent::mouse(EventType::Click, target, MouseButton::Main, 0.0, 0.0));
            }
            "context" => {
                let mut parts = rest.split_whitespace();
                let target_id = parts.next().ok_or_else(|| anyhow!("context needs an item id"))?;
                let x = parse_coordinate(parts.next())?;
                let y = parse_coordinate(parts.next())?;
                let item = self.item(target_id, "primary")?;
                self.fire(DomEvent::mouse(
                    EventType::ContextMenu,
                    item,
                    MouseButton::Secondary,
                    x,
                    y,
                ));
            }
            "menu" => {
                let menu = self
                    .bridge
                    .menu()
                    .menu_element()
                    .ok_or_else(|| anyhow!("no context menu open"))?;
                let entry = self
                    .query
                    .find_all_within(&menu, &format!(".{MENU_ITEM_CLASS}"))
                    .into_iter()
                    .find(|entry| entry.attr("data-act").as_deref() == Some(rest))
                    .ok_or_else(|| anyhow!("no menu entry '{rest}'"))?;
                self.fire(DomEvent::mouse(EventType::Click, entry, MouseButton::Main, 0.0, 0.0));
            }
            "key" => {
                let key: Key = rest
                    .parse()
                    .map_err(|_| anyhow!("unrecognized key '{rest}'"))?;
                let target = self.body()?;
                self.fire(DomEvent::key(target, key));
            }
            "outside" => {
                let target = self.body()?;
                self.fire(DomEvent::mouse(EventType::Click, target, MouseButton::Main, 0.0, 0.0));
            }
            "answer" => self.prompter.answer(rest),
            "cancel" => self.prompter.cancel_next(),
            "confirm" => self.prompter.confirm_next(matches!(rest, "yes" | "y" | "true")),
            "mounted" => self.bridge.selection().tabs().notify_mounted(),
            "wait" => {
                let millis: u64 = rest.parse().context("wait needs milliseconds")?;
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            other => bail!("unknown gesture '{other}'"),
        }
        Ok(())
    }

    fn fire(&self, event: DomEvent) {
        self.bridge.document().dispatch_event(&event);
    }

    fn body(&self) -> Result<NodeRef> {
        self.bridge
            .document()
            .body()
            .ok_or_else(|| anyhow!("page has no body"))
    }

    fn item(&self, target_id: &str, copy: &str) -> Result<NodeRef> {
        let lists = self.bridge.lists();
        let root = match copy {
            "primary" => lists.primary_root(),
            "secondary" | "tab" => lists.secondary_root(),
            other => bail!("unknown list copy '{other}'"),
        }
        .ok_or_else(|| anyhow!("list copy '{copy}' not rendered"))?;

        lists
            .items(&root)
            .into_iter()
            .find(|item| lists.item_id(item) == target_id)
            .ok_or_else(|| anyhow!("no item '{target_id}' in {copy} list"))
    }

    fn title_or_item(&self, item: &NodeRef) -> NodeRef {
        let title_class = &self.bridge.lists().markup().title_class;
        self.query
            .find_within(item, &format!(".{title_class}"))
            .unwrap_or_else(|| item.clone())
    }
}

fn parse_coordinate(raw: Option<&str>) -> Result<f64> {
    match raw {
        Some(value) => value.parse().with_context(|| format!("bad coordinate '{value}'")),
        None => Ok(0.0),
    }
}

/// Lets deferred dispatches run before the next gesture.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}
