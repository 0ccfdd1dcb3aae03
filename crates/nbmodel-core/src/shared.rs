//! Shared notebook document — the authoritative ordered cell collection.
//!
//! Owns every cell while it is a member, is the unit of undo/redo, and is
//! the source of structural change events. Collaborative use consumes an
//! already-linearized operation stream: every operation here is local,
//! atomic, and dispatches its events synchronously before returning.

use crate::cell::{Cell, CellChange, CellSpec};
use crate::error::NbModelError;
use crate::generate_cell_id;
use crate::history::{Delta, UndoHistory};
use nbmodel_nbformat::{CellData, CELL_ID_MINOR_VERSION, MINOR_VERSION};
use serde_json::Value;
use std::collections::BTreeMap;

/// A structural change to the ordered cell collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellsChange {
    /// `count` cells inserted starting at `index`. Batch insertion emits
    /// one aggregated change, not one per cell.
    Add { index: usize, count: usize },
    Remove { index: usize },
    Move { from: usize, to: usize },
    /// Wholesale repopulation (deserialization path).
    Reset,
}

/// Any observable change to the document: a structural change to the cell
/// list, or a content change inside one cell. A content edit inside a
/// contained cell is indistinguishable, from the outside, from "the
/// document changed".
#[derive(Debug, Clone, PartialEq)]
pub enum NotebookChange {
    Cells(CellsChange),
    Cell { index: usize, change: CellChange },
}

type DocListener = Box<dyn FnMut(&NotebookChange) + Send + Sync>;

pub struct SharedNotebook {
    cells: Vec<Cell>,
    format_minor: i64,
    document_wide_undo: bool,
    history: UndoHistory<Delta>,
    replaying: bool,
    next_listener_id: u64,
    listeners: BTreeMap<u64, DocListener>,
}

impl Default for SharedNotebook {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedNotebook {
    pub fn new() -> Self {
        Self::with_options(MINOR_VERSION, true)
    }

    /// `format_minor` governs identifier assignment for newly created
    /// cells; `document_wide_undo == false` scopes history tracking to
    /// individual cells (structural operations bypass the document-level
    /// history entirely in that mode).
    pub fn with_options(format_minor: i64, document_wide_undo: bool) -> Self {
        Self {
            cells: Vec::new(),
            format_minor,
            document_wide_undo,
            history: UndoHistory::new(),
            replaying: false,
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Mutable cell access is for listener registration; content mutators
    /// on [`Cell`] are crate-internal and only reachable through this
    /// collection's operations.
    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn format_minor(&self) -> i64 {
        self.format_minor
    }

    pub fn set_format_minor(&mut self, format_minor: i64) {
        self.format_minor = format_minor;
    }

    pub fn document_wide_undo(&self) -> bool {
        self.document_wide_undo
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Registers a document-scoped observer; dispatch is synchronous and
    /// in registration order. A handler must not assume it is the only
    /// observer, but it can rely on the collection already reflecting the
    /// change it is told about.
    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&NotebookChange) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    /// Inserts one cell built from `spec` at `index`, clamped to
    /// `[0, len]`. Assigns a fresh identifier when the document's format
    /// revision carries ids and the spec has none.
    pub fn insert_cell(&mut self, index: usize, spec: CellSpec) -> &Cell {
        let index = index.min(self.cells.len());
        let cell = self.build_cell(spec);
        self.record(Delta::Insert {
            index,
            snapshots: vec![cell.to_data()],
        });
        self.cells.insert(index, cell);
        self.emit(&NotebookChange::Cells(CellsChange::Add { index, count: 1 }));
        &self.cells[index]
    }

    /// Batch insertion. Emits ONE aggregated structural change for the
    /// whole batch and records one delta, so a single undo removes the
    /// batch. An empty batch emits nothing.
    pub fn insert_cells(&mut self, index: usize, specs: Vec<CellSpec>) {
        if specs.is_empty() {
            return;
        }
        let index = index.min(self.cells.len());
        let cells: Vec<Cell> = specs.into_iter().map(|s| self.build_cell(s)).collect();
        let count = cells.len();
        self.record(Delta::Insert {
            index,
            snapshots: cells.iter().map(Cell::to_data).collect(),
        });
        for (offset, cell) in cells.into_iter().enumerate() {
            self.cells.insert(index + offset, cell);
        }
        self.emit(&NotebookChange::Cells(CellsChange::Add { index, count }));
    }

    /// Removes and drops the cell at `index`, returning its snapshot.
    pub fn delete_cell(&mut self, index: usize) -> Result<CellData, NbModelError> {
        let len = self.cells.len();
        if index >= len {
            return Err(NbModelError::OutOfRange { index, len });
        }
        let cell = self.cells.remove(index);
        let snapshot = cell.to_data();
        self.record(Delta::Delete {
            index,
            snapshot: snapshot.clone(),
        });
        self.emit(&NotebookChange::Cells(CellsChange::Remove { index }));
        Ok(snapshot)
    }

    /// Relocates the cell at `from` to `to` without dropping it.
    /// `from == to` is legal and still emits (and records) the move.
    pub fn move_cell(&mut self, from: usize, to: usize) -> Result<(), NbModelError> {
        let len = self.cells.len();
        if from >= len {
            return Err(NbModelError::OutOfRange { index: from, len });
        }
        if to >= len {
            return Err(NbModelError::OutOfRange { index: to, len });
        }
        let cell = self.cells.remove(from);
        self.cells.insert(to, cell);
        self.record(Delta::Move { from, to });
        self.emit(&NotebookChange::Cells(CellsChange::Move { from, to }));
        Ok(())
    }

    /// Replaces the source text of the cell at `index`. Returns whether
    /// anything changed (an identical value is a silent no-op).
    pub fn set_source(
        &mut self,
        index: usize,
        source: impl Into<String>,
    ) -> Result<bool, NbModelError> {
        let source = source.into();
        self.edit_cell(index, move |cell| cell.set_source(source))
    }

    pub fn set_cell_metadata(
        &mut self,
        index: usize,
        key: impl Into<String>,
        value: Value,
    ) -> Result<bool, NbModelError> {
        let key = key.into();
        self.edit_cell(index, move |cell| cell.set_metadata(key, value))
    }

    pub fn delete_cell_metadata(
        &mut self,
        index: usize,
        key: &str,
    ) -> Result<bool, NbModelError> {
        let key = key.to_owned();
        self.edit_cell(index, move |cell| cell.delete_metadata(&key))
    }

    pub fn set_attachments(
        &mut self,
        index: usize,
        attachments: Option<Value>,
    ) -> Result<bool, NbModelError> {
        self.edit_cell(index, move |cell| cell.set_attachments(attachments))
    }

    pub fn set_execution_count(
        &mut self,
        index: usize,
        count: Option<i64>,
    ) -> Result<bool, NbModelError> {
        self.edit_cell(index, move |cell| cell.set_execution_count(count))
    }

    pub fn set_outputs(
        &mut self,
        index: usize,
        outputs: Vec<Value>,
    ) -> Result<bool, NbModelError> {
        self.edit_cell(index, move |cell| cell.set_outputs(outputs))
    }

    /// Replays the inverse of the most recently recorded delta. Returns
    /// whether anything was undone; an empty history is a no-op.
    pub fn undo(&mut self) -> bool {
        let Some(delta) = self.history.pop_undo() else {
            return false;
        };
        self.replaying = true;
        self.apply_delta(&delta, true);
        self.replaying = false;
        self.history.stash_redo(delta);
        true
    }

    /// Replays the most recently undone delta forward.
    pub fn redo(&mut self) -> bool {
        let Some(delta) = self.history.pop_redo() else {
            return false;
        };
        self.replaying = true;
        self.apply_delta(&delta, false);
        self.replaying = false;
        self.history.stash_undo(delta);
        true
    }

    /// Per-cell undo, meaningful when document-wide undo is disabled.
    pub fn undo_cell(&mut self, index: usize) -> Result<bool, NbModelError> {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(NbModelError::OutOfRange { index, len })?;
        let Some(change) = cell.history_mut().pop_undo() else {
            return Ok(false);
        };
        let inverted = change.inverted();
        cell.apply_change(&inverted);
        cell.history_mut().stash_redo(change);
        self.emit(&NotebookChange::Cell {
            index,
            change: inverted,
        });
        Ok(true)
    }

    /// Per-cell redo, meaningful when document-wide undo is disabled.
    pub fn redo_cell(&mut self, index: usize) -> Result<bool, NbModelError> {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(NbModelError::OutOfRange { index, len })?;
        let Some(change) = cell.history_mut().pop_redo() else {
            return Ok(false);
        };
        cell.apply_change(&change);
        cell.history_mut().stash_undo(change.clone());
        self.emit(&NotebookChange::Cell { index, change });
        Ok(true)
    }

    /// Discards all recorded reversible deltas, document-wide and
    /// per-cell, without affecting current state.
    pub fn clear_undo_history(&mut self) {
        self.history.clear();
        for cell in &mut self.cells {
            cell.history_mut().clear();
        }
    }

    /// Wholesale repopulation used by deserialization: the previous cells
    /// are dropped, history is discarded, and one `Reset` change is
    /// emitted. Identifiers come from the snapshots as-is; cells loaded
    /// without one stay without one.
    pub fn reset_from(&mut self, cells: Vec<CellData>) {
        self.cells = cells.into_iter().map(Cell::from_data).collect();
        self.history.clear();
        self.emit(&NotebookChange::Cells(CellsChange::Reset));
    }

    /// Exchange-format snapshots of all cells, in order.
    pub fn to_data(&self) -> Vec<CellData> {
        self.cells.iter().map(Cell::to_data).collect()
    }

    pub(crate) fn clear_all(&mut self) {
        self.cells.clear();
        self.history.clear();
        self.listeners.clear();
    }

    fn build_cell(&self, mut spec: CellSpec) -> Cell {
        if spec.id.is_none() && self.format_minor >= CELL_ID_MINOR_VERSION {
            spec.id = Some(generate_cell_id());
        }
        Cell::from_spec(spec)
    }

    fn edit_cell<F>(&mut self, index: usize, edit: F) -> Result<bool, NbModelError>
    where
        F: FnOnce(&mut Cell) -> Option<CellChange>,
    {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(NbModelError::OutOfRange { index, len })?;
        let Some(change) = edit(cell) else {
            return Ok(false);
        };
        self.track_edit(index, change.clone());
        self.emit(&NotebookChange::Cell { index, change });
        Ok(true)
    }

    fn track_edit(&mut self, index: usize, change: CellChange) {
        if self.replaying {
            return;
        }
        if self.document_wide_undo {
            self.history.push(Delta::Edit { index, change });
        } else if let Some(cell) = self.cells.get_mut(index) {
            cell.history_mut().push(change);
        }
    }

    fn record(&mut self, delta: Delta) {
        if self.replaying || !self.document_wide_undo {
            return;
        }
        self.history.push(delta);
    }

    /// Replays a delta. `backward` applies the inverse. Replay never
    /// re-records and dispatches the same change events a fresh mutation
    /// would, so observers track undone state like any other edit.
    fn apply_delta(&mut self, delta: &Delta, backward: bool) {
        match delta {
            Delta::Insert { index, snapshots } => {
                if backward {
                    for _ in 0..snapshots.len() {
                        if *index < self.cells.len() {
                            self.cells.remove(*index);
                            self.emit(&NotebookChange::Cells(CellsChange::Remove {
                                index: *index,
                            }));
                        }
                    }
                } else {
                    let index = (*index).min(self.cells.len());
                    for (offset, snapshot) in snapshots.iter().enumerate() {
                        self.cells
                            .insert(index + offset, Cell::from_data(snapshot.clone()));
                    }
                    self.emit(&NotebookChange::Cells(CellsChange::Add {
                        index,
                        count: snapshots.len(),
                    }));
                }
            }
            Delta::Delete { index, snapshot } => {
                if backward {
                    let index = (*index).min(self.cells.len());
                    self.cells.insert(index, Cell::from_data(snapshot.clone()));
                    self.emit(&NotebookChange::Cells(CellsChange::Add { index, count: 1 }));
                } else if *index < self.cells.len() {
                    self.cells.remove(*index);
                    self.emit(&NotebookChange::Cells(CellsChange::Remove { index: *index }));
                }
            }
            Delta::Move { from, to } => {
                let (from, to) = if backward { (*to, *from) } else { (*from, *to) };
                if from < self.cells.len() && to < self.cells.len() {
                    let cell = self.cells.remove(from);
                    self.cells.insert(to, cell);
                    self.emit(&NotebookChange::Cells(CellsChange::Move { from, to }));
                }
            }
            Delta::Edit { index, change } => {
                if let Some(cell) = self.cells.get_mut(*index) {
                    let oriented = if backward {
                        change.inverted()
                    } else {
                        change.clone()
                    };
                    cell.apply_change(&oriented);
                    self.emit(&NotebookChange::Cell {
                        index: *index,
                        change: oriented,
                    });
                }
            }
        }
    }

    fn emit(&mut self, change: &NotebookChange) {
        for listener in self.listeners.values_mut() {
            listener(change);
        }
    }
}
