//! Matching of gateway responses to previously submitted commands.
//!
//! The gateway answers every command with a line prefixed by the command code.
//! Responses usually arrive in submission order, but nothing guarantees it,
//! so each response is matched against the oldest pending command with the same code.

use crate::command::Command;
use alloc::{collections::VecDeque, string::String};

/// Command awaiting a response.
#[derive(Debug)]
pub struct PendingCommand<C> {
    /// Submitted command.
    pub command: Command,
    /// Submitted value.
    pub value: String,
    /// Completion invoked once the response arrives.
    pub completion: C,
}

/// Response to a submitted command.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    /// Command the response belongs to.
    pub command: Command,
    /// Value echoed by the gateway.
    ///
    /// For responses of the form `key=value`, this is the key.
    pub echo: String,
    /// Answer of the gateway.
    ///
    /// For responses of the form `key=value`, this is the value.
    /// Otherwise, it is identical to the echo.
    pub answer: String,
    /// Whether the echo differs from the submitted value.
    pub mismatch: bool,
}

impl Response {
    fn new(command: Command, submitted: &str, payload: &str) -> Self {
        let (echo, answer) = payload.split_once('=').unwrap_or((payload, payload));

        Self {
            command,
            echo: echo.into(),
            answer: answer.into(),
            mismatch: echo != submitted,
        }
    }
}

/// Ordered collection of pending commands.
#[derive(Debug)]
pub struct CorrelationQueue<C> {
    entries: VecDeque<PendingCommand<C>>,
}

impl<C> CorrelationQueue<C> {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Appends a command to the end of the queue.
    pub fn enqueue(&mut self, command: Command, value: impl Into<String>, completion: C) {
        self.entries.push_back(PendingCommand {
            command,
            value: value.into(),
            completion,
        });
    }

    /// Resolves the oldest pending command with the specified code.
    ///
    /// Returns the completion of the resolved command along with the parsed response,
    /// or `None` if no command with this code is pending.
    pub fn resolve(&mut self, code: &str, payload: &str) -> Option<(C, Response)> {
        let idx = self
            .entries
            .iter()
            .position(|entry| entry.command.code() == code)?;
        let entry = self.entries.remove(idx)?;
        let response = Response::new(entry.command, &entry.value, payload);

        Some((entry.completion, response))
    }

    /// Removes every pending command for which `keep` returns `false`.
    pub fn retain(&mut self, keep: impl FnMut(&PendingCommand<C>) -> bool) {
        self.entries.retain(keep);
    }

    /// Returns an iterator over the pending commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommand<C>> {
        self.entries.iter()
    }

    /// Returns the number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no commands are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for CorrelationQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}
