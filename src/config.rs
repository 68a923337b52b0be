use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_ENV_VAR: &str = "THREAD_BRIDGE_CONFIG";

/// Class names of the hidden proxy controls the backend renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelClasses {
    pub id: String,
    pub kind: String,
    pub argument: String,
    pub open_trigger: String,
}

impl Default for ChannelClasses {
    fn default() -> Self {
        Self {
            id: "th_action_id".to_string(),
            kind: "th_action_kind".to_string(),
            argument: "th_action_arg".to_string(),
            open_trigger: "th_open_trigger".to_string(),
        }
    }
}

/// How list items are marked up in each rendered copy of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListMarkup {
    /// Element id of the persistent side panel copy.
    pub primary_list_id: String,
    /// Element id of the full-page tab copy.
    pub secondary_list_id: String,
    pub container_class: String,
    pub item_class: String,
    pub title_class: String,
    pub target_attribute: String,
    pub selected_class: String,
}

impl Default for ListMarkup {
    fn default() -> Self {
        Self {
            primary_list_id: "threads_list".to_string(),
            secondary_list_id: "threads_list_tab".to_string(),
            container_class: "threads-list".to_string(),
            item_class: "thread-link".to_string(),
            title_class: "thread-title".to_string(),
            target_attribute: "data-tid".to_string(),
            selected_class: "selected".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub rename_label: String,
    pub share_label: String,
    pub delete_label: String,
    pub rename_prompt: String,
    /// `{title}` is replaced with the item title.
    pub delete_confirm: String,
    pub untitled: String,
    pub rename_key: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            rename_label: "Rename".to_string(),
            share_label: "Share".to_string(),
            delete_label: "Delete".to_string(),
            rename_prompt: "Enter a new thread name".to_string(),
            delete_confirm: "Delete \"{title}\"?".to_string(),
            untitled: "Untitled".to_string(),
            rename_key: "F2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Text the content tab's label must contain.
    pub content_tab_label: String,
    pub attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            content_tab_label: "Chat".to_string(),
            attempts: 8,
            retry_delay_ms: 80,
        }
    }
}

impl NavigationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Selector of the element the application renders into.
    pub app_root: String,
    pub channels: ChannelClasses,
    pub lists: ListMarkup,
    pub menu: MenuConfig,
    pub navigation: NavigationConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_root: "gradio-app".to_string(),
            channels: ChannelClasses::default(),
            lists: ListMarkup::default(),
            menu: MenuConfig::default(),
            navigation: NavigationConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Defaults when no path is given or the file does not exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }
}
