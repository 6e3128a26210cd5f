use std::collections::HashMap;

use bevy::prelude::*;
use serde::Serialize;

/// A named callback requested by the trigger dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScriptCall {
    pub name: String,
    pub primary: u64,
    pub secondary: Option<u64>,
    /// Layer that produced the call.
    pub source_layer: String,
}

pub type ScriptCallKey = (String, u64, Option<u64>);

impl ScriptCall {
    pub fn new(name: impl Into<String>, primary: u64, source_layer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary,
            secondary: None,
            source_layer: source_layer.into(),
        }
    }

    pub fn with_secondary(mut self, secondary: u64) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn key(&self) -> ScriptCallKey {
        (self.name.clone(), self.primary, self.secondary)
    }
}

/// Calls gathered during one frame. Holds at most one call per key; a later
/// call with the same key replaces the earlier one where it stands.
#[derive(Clone, Debug, Default)]
pub struct ScriptCallBatch {
    calls: Vec<ScriptCall>,
    index: HashMap<ScriptCallKey, usize>,
}

impl ScriptCallBatch {
    pub fn add(&mut self, call: ScriptCall) {
        let key = call.key();
        if let Some(&slot) = self.index.get(&key) {
            self.calls[slot] = call;
        } else {
            self.index.insert(key, self.calls.len());
            self.calls.push(call);
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptCall> {
        self.calls.iter()
    }

    pub fn contains(&self, name: &str, primary: u64) -> bool {
        self.calls
            .iter()
            .any(|call| call.name == name && call.primary == primary)
    }

    /// Empties the batch, returning calls in insertion order.
    pub fn take(&mut self) -> Vec<ScriptCall> {
        self.index.clear();
        std::mem::take(&mut self.calls)
    }
}

/// The batch for the frame currently being advanced.
#[derive(Resource, Default)]
pub struct FrameScriptCalls(pub ScriptCallBatch);
