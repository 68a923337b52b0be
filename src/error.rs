use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("node is not an element")]
    NotAnElement,
    #[error("<{tag}> does not support click()")]
    UnsupportedClick { tag: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown action kind '{0}'")]
pub struct ActionKindError(pub String);
