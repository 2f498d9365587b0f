use std::collections::HashMap;

use serde_json::Value;

use crate::tools::{ResolvedToolCall, ToolCallDelta};

/// Fragments collected so far for one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// Merges streamed tool-call fragments, keyed by slot, into resolved calls.
///
/// The working set lives for a single model stream. A slot leaves the live
/// set the moment its argument text parses as a complete value.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    live: HashMap<u32, PartialToolCall>,
    observed: Vec<u32>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta into its slot and return the slot.
    ///
    /// Names are last-write-wins, argument text is appended in arrival
    /// order, and ids are recorded whenever they show up.
    pub fn observe(&mut self, delta: ToolCallDelta) -> u32 {
        let ToolCallDelta {
            slot,
            id,
            name,
            arguments,
        } = delta;

        if !self.observed.contains(&slot) {
            self.observed.push(slot);
        }

        let entry = self.live.entry(slot).or_default();

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            entry.id = Some(id);
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            entry.name = name;
        }
        if let Some(arguments) = arguments {
            entry.arguments.push_str(&arguments);
        }

        slot
    }

    pub fn extend<I>(&mut self, deltas: I)
    where
        I: IntoIterator<Item = ToolCallDelta>,
    {
        for delta in deltas {
            self.observe(delta);
        }
    }

    /// Promote the slot to a [`ResolvedToolCall`] if its arguments are complete.
    ///
    /// Returns `None` while the text is empty or an incomplete prefix; the
    /// entry is kept for further accumulation in that case.
    pub fn try_resolve(&mut self, slot: u32) -> Option<ResolvedToolCall> {
        let entry = self.live.get(&slot)?;
        if entry.name.trim().is_empty() || entry.arguments.trim().is_empty() {
            return None;
        }

        let arguments = parse_complete_arguments(&entry.arguments)?;
        let entry = self.live.remove(&slot)?;

        Some(ResolvedToolCall {
            slot,
            id: entry.id.unwrap_or_else(|| synthesize_call_id(slot)),
            name: entry.name,
            arguments,
            raw_arguments: entry.arguments,
        })
    }

    /// Position of `slot` in first-observed order for this stream.
    pub fn observation_index(&self, slot: u32) -> Option<usize> {
        self.observed.iter().position(|observed| *observed == slot)
    }

    pub fn observed_slots(&self) -> &[u32] {
        &self.observed
    }

    pub fn partial(&self, slot: u32) -> Option<&PartialToolCall> {
        self.live.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drop the working set, returning whatever never resolved (slot order).
    pub fn into_unresolved(self) -> Vec<(u32, PartialToolCall)> {
        let mut unresolved: Vec<_> = self.live.into_iter().collect();
        unresolved.sort_by_key(|(slot, _)| *slot);
        unresolved
    }
}

/// Deterministic id for a slot that never received an id delta.
pub fn synthesize_call_id(slot: u32) -> String {
    format!("call_{slot}")
}

/// Parse argument text only if it forms a complete JSON object or array.
///
/// Scalars are rejected because a prefix like `1` may still grow into `12`.
fn parse_complete_arguments(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.ends_with('}') || trimmed.ends_with(']')) {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        Ok(_) => None,
        Err(error) => {
            if !error.is_eof() {
                log::trace!("Argument text not parseable yet: {}", error);
            }
            None
        }
    }
}
