//! Per-session conversation history under a retention policy.
//!
//! A session picks one [`RetentionMode`] when it is created and keeps it. The agent
//! loop appends one batch of entries per model round and reads a snapshot to build
//! the next request.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::llm::{ChatMessage, ToolCall};

/// One retained entry, tagged with the turn that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub turn: u64,
    #[serde(flatten)]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum EntryKind {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl TurnEntry {
    pub fn user(turn: u64, content: impl Into<String>) -> Self {
        Self {
            turn,
            kind: EntryKind::User {
                content: content.into(),
            },
        }
    }

    pub fn assistant(turn: u64, content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            turn,
            kind: EntryKind::Assistant {
                content: content.into(),
                tool_calls,
            },
        }
    }

    pub fn tool_result(
        turn: u64,
        name: impl Into<String>,
        arguments: serde_json::Value,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            turn,
            kind: EntryKind::ToolResult {
                name: name.into(),
                arguments,
                output: output.into(),
                is_error,
            },
        }
    }

    /// Text of a user entry.
    pub fn user_text(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::User { content } => Some(content),
            _ => None,
        }
    }

    /// The chat message this entry contributes to a model request.
    pub fn to_chat_message(&self) -> ChatMessage {
        match &self.kind {
            EntryKind::User { content } => ChatMessage::user(content.clone()),
            EntryKind::Assistant {
                content,
                tool_calls,
            } => ChatMessage::assistant(content.clone(), tool_calls.clone()),
            EntryKind::ToolResult { name, output, .. } => {
                ChatMessage::tool(name.clone(), output.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RetentionError {
    #[error("fifo retention needs a capacity of at least 1")]
    ZeroCapacity,
}

/// Retention policy for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionMode {
    /// Keep only the latest batch.
    #[default]
    Replace,
    /// Keep everything.
    Accumulate,
    /// Keep at most `capacity` entries, dropping the oldest.
    Fifo { capacity: usize },
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionMode::Replace => f.write_str("replace"),
            RetentionMode::Accumulate => f.write_str("accumulate"),
            RetentionMode::Fifo { capacity } => write!(f, "fifo({})", capacity),
        }
    }
}

impl RetentionMode {
    /// Build the store for this mode.
    pub fn build(self) -> Result<Box<dyn RetentionStore>, RetentionError> {
        Ok(match self {
            RetentionMode::Replace => Box::new(ReplaceStore::default()),
            RetentionMode::Accumulate => Box::new(AccumulateStore::default()),
            RetentionMode::Fifo { capacity } => Box::new(FifoStore::new(capacity)?),
        })
    }
}

/// History store behind one retention policy.
pub trait RetentionStore: Send + Sync + fmt::Debug {
    fn mode(&self) -> RetentionMode;

    /// Record one batch of entries.
    fn append(&mut self, entries: Vec<TurnEntry>);

    /// Retained entries, oldest first.
    fn snapshot(&self) -> Vec<TurnEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

#[derive(Debug, Default)]
struct ReplaceStore {
    latest: Vec<TurnEntry>,
}

impl RetentionStore for ReplaceStore {
    fn mode(&self) -> RetentionMode {
        RetentionMode::Replace
    }

    fn append(&mut self, entries: Vec<TurnEntry>) {
        self.latest = entries;
    }

    fn snapshot(&self) -> Vec<TurnEntry> {
        self.latest.clone()
    }

    fn len(&self) -> usize {
        self.latest.len()
    }

    fn clear(&mut self) {
        self.latest.clear();
    }
}

#[derive(Debug, Default)]
struct AccumulateStore {
    entries: Vec<TurnEntry>,
}

impl RetentionStore for AccumulateStore {
    fn mode(&self) -> RetentionMode {
        RetentionMode::Accumulate
    }

    fn append(&mut self, entries: Vec<TurnEntry>) {
        self.entries.extend(entries);
    }

    fn snapshot(&self) -> Vec<TurnEntry> {
        self.entries.clone()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug)]
struct FifoStore {
    capacity: usize,
    entries: VecDeque<TurnEntry>,
}

impl FifoStore {
    fn new(capacity: usize) -> Result<Self, RetentionError> {
        if capacity == 0 {
            return Err(RetentionError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        })
    }
}

impl RetentionStore for FifoStore {
    fn mode(&self) -> RetentionMode {
        RetentionMode::Fifo {
            capacity: self.capacity,
        }
    }

    fn append(&mut self, entries: Vec<TurnEntry>) {
        self.entries.extend(entries);
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.entries.drain(..excess);
            log::debug!("fifo retention evicted {} entries", excess);
        }
        debug_assert!(self.entries.len() <= self.capacity);
    }

    fn snapshot(&self) -> Vec<TurnEntry> {
        self.entries.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(turn: u64, labels: &[&str]) -> Vec<TurnEntry> {
        labels.iter().map(|l| TurnEntry::user(turn, *l)).collect()
    }

    fn texts(store: &dyn RetentionStore) -> Vec<String> {
        store
            .snapshot()
            .iter()
            .filter_map(|e| e.user_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn fifo_two_plus_two_at_capacity_three() {
        let mut store = RetentionMode::Fifo { capacity: 3 }.build().unwrap();
        store.append(batch(1, &["a", "b"]));
        store.append(batch(2, &["c", "d"]));
        assert_eq!(texts(store.as_ref()), vec!["b", "c", "d"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn fifo_keeps_most_recent_in_order() {
        for capacity in 1..6 {
            let mut store = RetentionMode::Fifo { capacity }.build().unwrap();
            let mut all = Vec::new();
            for (turn, size) in [3usize, 0, 1, 7, 2].iter().enumerate() {
                let labels: Vec<String> = (0..*size).map(|i| format!("{}-{}", turn, i)).collect();
                all.extend(labels.clone());
                store.append(
                    labels
                        .iter()
                        .map(|l| TurnEntry::user(turn as u64, l.clone()))
                        .collect(),
                );
                assert!(store.len() <= capacity);
                let keep = all.len().min(capacity);
                assert_eq!(texts(store.as_ref()), all[all.len() - keep..].to_vec());
            }
        }
    }

    #[test]
    fn fifo_zero_capacity_is_rejected() {
        assert_eq!(
            RetentionMode::Fifo { capacity: 0 }.build().unwrap_err(),
            RetentionError::ZeroCapacity
        );
    }

    #[test]
    fn accumulate_loses_nothing() {
        let mut store = RetentionMode::Accumulate.build().unwrap();
        store.append(batch(1, &["a", "b"]));
        store.append(Vec::new());
        store.append(batch(2, &["c"]));
        store.append(batch(3, &["d", "e", "f"]));
        assert_eq!(store.len(), 6);
        assert_eq!(texts(store.as_ref()), vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn replace_keeps_latest_batch_only() {
        let mut store = RetentionMode::Replace.build().unwrap();
        assert!(store.is_empty());
        store.append(batch(1, &["a", "b"]));
        store.append(batch(2, &["c"]));
        assert_eq!(texts(store.as_ref()), vec!["c"]);
        store.append(Vec::new());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_keeps_mode() {
        let mut store = RetentionMode::Fifo { capacity: 2 }.build().unwrap();
        store.append(batch(1, &["a"]));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.mode(), RetentionMode::Fifo { capacity: 2 });
        assert_eq!(store.mode().to_string(), "fifo(2)");
    }

    #[test]
    fn entries_serialize_tagged_by_role() {
        let e = TurnEntry::tool_result(4, "calculator", json!({"expression": "1/0"}), "error: division by zero", true);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["role"], "tool_result");
        assert_eq!(v["turn"], 4);
        assert_eq!(v["is_error"], true);
        let back: TurnEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);

        let msg = e.to_chat_message();
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_name.as_deref(), Some("calculator"));
    }
}
