use std::cell::RefCell;
use std::collections::VecDeque;

/// Blocking user prompts (`window.prompt` / `window.confirm`).
pub trait Prompter {
    /// `None` when the user cancels.
    fn prompt(&self, message: &str, default: &str) -> Option<String>;
    fn confirm(&self, message: &str) -> bool;
}

/// Answers prompts from queued responses. An empty queue cancels.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Option<String>>>,
    confirmations: RefCell<VecDeque<bool>>,
    asked: RefCell<Vec<String>>,
    defaults: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, text: impl Into<String>) {
        self.answers.borrow_mut().push_back(Some(text.into()));
    }

    pub fn cancel_next(&self) {
        self.answers.borrow_mut().push_back(None);
    }

    pub fn confirm_next(&self, accepted: bool) {
        self.confirmations.borrow_mut().push_back(accepted);
    }

    /// Messages shown so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    /// Default texts offered by `prompt` calls.
    pub fn offered_defaults(&self) -> Vec<String> {
        self.defaults.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&self, message: &str, default: &str) -> Option<String> {
        self.asked.borrow_mut().push(message.to_string());
        self.defaults.borrow_mut().push(default.to_string());
        self.answers.borrow_mut().pop_front().flatten()
    }

    fn confirm(&self, message: &str) -> bool {
        self.asked.borrow_mut().push(message.to_string());
        self.confirmations.borrow_mut().pop_front().unwrap_or(false)
    }
}
