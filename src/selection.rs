//! Opening items, selection highlighting and switching to the content tab.

use std::rc::Rc;

use kuchiki::NodeRef;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::NavigationConfig;
use crate::dispatch::{Action, ActionSink, Delivery};
use crate::dom::{DomEvent, ElementExt};
use crate::lists::ListCopies;
use crate::query::DeepQuery;

const TAB_SELECTOR: &str = "[role=\"tab\"]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOutcome {
    AlreadyActive,
    Activated { attempts: u32 },
    GaveUp,
}

/// Polls for the content tab and clicks it until it reports itself selected.
pub struct TabSwitcher {
    query: DeepQuery,
    config: NavigationConfig,
    mounted: Notify,
}

impl TabSwitcher {
    pub fn new(query: DeepQuery, config: NavigationConfig) -> Self {
        Self {
            query,
            config,
            mounted: Notify::new(),
        }
    }

    pub fn find_tab(&self) -> Option<NodeRef> {
        self.query
            .find_all(TAB_SELECTOR)
            .into_iter()
            .find(|tab| tab.trimmed_text().contains(&self.config.content_tab_label))
    }

    /// Wakes a retry that is currently waiting; hosts call this once the view
    /// is mounted. With no switch in progress the signal is dropped.
    pub fn notify_mounted(&self) {
        self.mounted.notify_waiters();
    }

    pub async fn activate(&self) -> TabOutcome {
        for attempt in 1..=self.config.attempts {
            match self.find_tab() {
                Some(tab) if is_selected(&tab) => {
                    return if attempt == 1 {
                        TabOutcome::AlreadyActive
                    } else {
                        TabOutcome::Activated { attempts: attempt }
                    };
                }
                Some(tab) => {
                    if let Err(err) = self.query.document().click(&tab) {
                        debug!(target = "thread_bridge::selection", error = %err, "tab click failed");
                    }
                    if is_selected(&tab) {
                        return TabOutcome::Activated { attempts: attempt };
                    }
                }
                None => {
                    debug!(target = "thread_bridge::selection", attempt, "content tab not rendered yet");
                }
            }
            self.wait().await;
        }

        if self.find_tab().map_or(false, |tab| is_selected(&tab)) {
            return TabOutcome::Activated {
                attempts: self.config.attempts,
            };
        }
        info!(
            target = "thread_bridge::selection",
            label = %self.config.content_tab_label,
            attempts = self.config.attempts,
            "gave up switching to content tab"
        );
        TabOutcome::GaveUp
    }

    async fn wait(&self) {
        tokio::select! {
            _ = sleep(self.config.retry_delay()) => {}
            _ = self.mounted.notified() => {}
        }
    }
}

fn is_selected(tab: &NodeRef) -> bool {
    tab.attr("aria-selected").as_deref() == Some("true")
}

/// Deferred work started by [`SelectionController::open`].
pub struct OpenHandle {
    pub dispatch: JoinHandle<Delivery>,
    pub navigation: Option<JoinHandle<TabOutcome>>,
}

pub struct SelectionController {
    lists: ListCopies,
    sink: Rc<dyn ActionSink>,
    tabs: Rc<TabSwitcher>,
    tasks: Rc<LocalSet>,
}

impl SelectionController {
    pub fn new(
        lists: ListCopies,
        sink: Rc<dyn ActionSink>,
        tabs: Rc<TabSwitcher>,
        tasks: Rc<LocalSet>,
    ) -> Self {
        Self {
            lists,
            sink,
            tabs,
            tasks,
        }
    }

    pub fn tabs(&self) -> &Rc<TabSwitcher> {
        &self.tabs
    }

    /// Primary click anywhere in the document.
    pub fn handle_click(&self, event: &DomEvent) -> Option<OpenHandle> {
        if !event.is_primary_click() {
            return None;
        }
        let item = self.lists.item_for_event(event)?;
        let target_id = self.lists.item_id(&item);
        let from_secondary = self.lists.event_in_secondary(event);
        Some(self.open(&target_id, from_secondary))
    }

    /// Deferred parts are queued on `tasks` and run once that set is driven.
    pub fn open(&self, target_id: &str, from_secondary: bool) -> OpenHandle {
        // Clear the kind now; the id/kind writes follow one tick later.
        self.sink.prepare();
        let sink = Rc::clone(&self.sink);
        let action = Action::open(target_id);
        let dispatch = self.tasks.spawn_local(async move {
            tokio::task::yield_now().await;
            sink.dispatch(&action)
        });

        self.lists.mark_selected(target_id);

        let navigation = from_secondary.then(|| {
            let tabs = Rc::clone(&self.tabs);
            self.tasks.spawn_local(async move { tabs.activate().await })
        });

        debug!(
            target = "thread_bridge::selection",
            %target_id,
            from_secondary,
            "opening item"
        );
        OpenHandle {
            dispatch,
            navigation,
        }
    }

    pub fn clear_selection(&self) {
        self.lists.clear_selection();
    }

    pub fn selected_ids(&self) -> Vec<Option<String>> {
        self.lists.selected_ids()
    }
}
