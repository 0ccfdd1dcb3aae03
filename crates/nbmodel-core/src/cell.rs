//! Notebook cell entity.
//!
//! A cell belongs to exactly one [`SharedNotebook`](crate::SharedNotebook)
//! at a time; reparenting requires removal and re-insertion. Content
//! mutation is routed through the owning collection so that every in-cell
//! edit is also observable as a document-level change, but each cell keeps
//! its own listener registry for cell-scoped observers.

use crate::history::UndoHistory;
use nbmodel_nbformat::{CellData, CellType};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Payload of an in-cell content change. `before`/`after` carry the full
/// previous and next values, so a change record doubles as a reversible
/// edit.
#[derive(Debug, Clone, PartialEq)]
pub enum CellChange {
    Source {
        before: String,
        after: String,
    },
    Metadata {
        key: String,
        before: Option<Value>,
        after: Option<Value>,
    },
    Attachments {
        before: Option<Value>,
        after: Option<Value>,
    },
    ExecutionCount {
        before: Option<i64>,
        after: Option<i64>,
    },
    Outputs {
        before: Vec<Value>,
        after: Vec<Value>,
    },
}

impl CellChange {
    /// The same change with `before` and `after` swapped; applying the
    /// inversion undoes the original.
    pub fn inverted(&self) -> CellChange {
        match self {
            CellChange::Source { before, after } => CellChange::Source {
                before: after.clone(),
                after: before.clone(),
            },
            CellChange::Metadata { key, before, after } => CellChange::Metadata {
                key: key.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            CellChange::Attachments { before, after } => CellChange::Attachments {
                before: after.clone(),
                after: before.clone(),
            },
            CellChange::ExecutionCount { before, after } => CellChange::ExecutionCount {
                before: *after,
                after: *before,
            },
            CellChange::Outputs { before, after } => CellChange::Outputs {
                before: after.clone(),
                after: before.clone(),
            },
        }
    }
}

/// Construction specification for a cell: the type plus optional content.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSpec {
    pub cell_type: CellType,
    pub id: Option<String>,
    pub source: String,
    pub metadata: Map<String, Value>,
    pub attachments: Option<Value>,
    pub execution_count: Option<i64>,
    pub outputs: Vec<Value>,
}

impl CellSpec {
    pub fn new(cell_type: CellType) -> Self {
        Self {
            cell_type,
            id: None,
            source: String::new(),
            metadata: Map::new(),
            attachments: None,
            execution_count: None,
            outputs: Vec::new(),
        }
    }

    pub fn code() -> Self {
        Self::new(CellType::Code)
    }

    pub fn markdown() -> Self {
        Self::new(CellType::Markdown)
    }

    pub fn raw() -> Self {
        Self::new(CellType::Raw)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_attachments(mut self, attachments: Value) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_execution_count(mut self, count: i64) -> Self {
        self.execution_count = Some(count);
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Value>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn from_data(data: CellData) -> Self {
        Self {
            cell_type: data.cell_type,
            id: data.id,
            source: data.source,
            metadata: data.metadata,
            attachments: data.attachments,
            execution_count: data.execution_count,
            outputs: data.outputs,
        }
    }
}

type CellListener = Box<dyn FnMut(&CellChange) + Send + Sync>;

/// A single notebook cell: type tag, content buffer, cell-scoped metadata,
/// optional stable identifier, attachments, and (for code cells) opaque
/// execution fields.
pub struct Cell {
    cell_type: CellType,
    id: Option<String>,
    source: String,
    metadata: Map<String, Value>,
    attachments: Option<Value>,
    execution_count: Option<i64>,
    outputs: Vec<Value>,
    history: UndoHistory<CellChange>,
    next_listener_id: u64,
    listeners: BTreeMap<u64, CellListener>,
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("cell_type", &self.cell_type)
            .field("id", &self.id)
            .field("source", &self.source)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Structural equality over content only: two snapshots of a cell taken
/// before deletion and after undo compare equal.
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cell_type == other.cell_type
            && self.id == other.id
            && self.source == other.source
            && self.metadata == other.metadata
            && self.attachments == other.attachments
            && self.execution_count == other.execution_count
            && self.outputs == other.outputs
    }
}

impl Cell {
    pub(crate) fn from_spec(spec: CellSpec) -> Self {
        Self {
            cell_type: spec.cell_type,
            id: spec.id,
            source: spec.source,
            metadata: spec.metadata,
            attachments: spec.attachments,
            execution_count: spec.execution_count,
            outputs: spec.outputs,
            history: UndoHistory::new(),
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }

    pub(crate) fn from_data(data: CellData) -> Self {
        Self::from_spec(CellSpec::from_data(data))
    }

    /// Exchange-format snapshot of this cell.
    pub fn to_data(&self) -> CellData {
        CellData {
            cell_type: self.cell_type,
            id: self.id.clone(),
            source: self.source.clone(),
            metadata: self.metadata.clone(),
            attachments: self.attachments.clone(),
            execution_count: self.execution_count,
            outputs: self.outputs.clone(),
        }
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn attachments(&self) -> Option<&Value> {
        self.attachments.as_ref()
    }

    pub fn execution_count(&self) -> Option<i64> {
        self.execution_count
    }

    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }

    /// Registers a cell-scoped observer. Dispatch is synchronous and in
    /// registration order, before the mutating call returns.
    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&CellChange) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    // Content mutators are crate-internal: edits are routed through the
    // owning collection so document-level observers and undo tracking see
    // every change. Each returns `None` when the new value deep-equals the
    // current one.

    pub(crate) fn set_source(&mut self, source: String) -> Option<CellChange> {
        if self.source == source {
            return None;
        }
        let change = CellChange::Source {
            before: std::mem::replace(&mut self.source, source.clone()),
            after: source,
        };
        self.emit(&change);
        Some(change)
    }

    pub(crate) fn set_metadata(&mut self, key: String, value: Value) -> Option<CellChange> {
        let before = self.metadata.get(&key).cloned();
        if before.as_ref() == Some(&value) {
            return None;
        }
        self.metadata.insert(key.clone(), value.clone());
        let change = CellChange::Metadata {
            key,
            before,
            after: Some(value),
        };
        self.emit(&change);
        Some(change)
    }

    pub(crate) fn delete_metadata(&mut self, key: &str) -> Option<CellChange> {
        let before = self.metadata.remove(key)?;
        let change = CellChange::Metadata {
            key: key.to_owned(),
            before: Some(before),
            after: None,
        };
        self.emit(&change);
        Some(change)
    }

    pub(crate) fn set_attachments(&mut self, attachments: Option<Value>) -> Option<CellChange> {
        if self.cell_type == CellType::Code || self.attachments == attachments {
            return None;
        }
        let change = CellChange::Attachments {
            before: std::mem::replace(&mut self.attachments, attachments.clone()),
            after: attachments,
        };
        self.emit(&change);
        Some(change)
    }

    pub(crate) fn set_execution_count(&mut self, count: Option<i64>) -> Option<CellChange> {
        if self.cell_type != CellType::Code || self.execution_count == count {
            return None;
        }
        let change = CellChange::ExecutionCount {
            before: std::mem::replace(&mut self.execution_count, count),
            after: count,
        };
        self.emit(&change);
        Some(change)
    }

    pub(crate) fn set_outputs(&mut self, outputs: Vec<Value>) -> Option<CellChange> {
        if self.cell_type != CellType::Code || self.outputs == outputs {
            return None;
        }
        let change = CellChange::Outputs {
            before: std::mem::replace(&mut self.outputs, outputs.clone()),
            after: outputs,
        };
        self.emit(&change);
        Some(change)
    }

    /// Replays a change during undo/redo: installs the `after` value and
    /// notifies cell observers, without touching any history.
    pub(crate) fn apply_change(&mut self, change: &CellChange) {
        match change {
            CellChange::Source { after, .. } => {
                self.source = after.clone();
            }
            CellChange::Metadata { key, after, .. } => match after {
                Some(value) => {
                    self.metadata.insert(key.clone(), value.clone());
                }
                None => {
                    self.metadata.remove(key);
                }
            },
            CellChange::Attachments { after, .. } => {
                self.attachments = after.clone();
            }
            CellChange::ExecutionCount { after, .. } => {
                self.execution_count = *after;
            }
            CellChange::Outputs { after, .. } => {
                self.outputs = after.clone();
            }
        }
        self.emit(change);
    }

    pub(crate) fn history_mut(&mut self) -> &mut UndoHistory<CellChange> {
        &mut self.history
    }

    fn emit(&mut self, change: &CellChange) {
        for listener in self.listeners.values_mut() {
            listener(change);
        }
    }
}
