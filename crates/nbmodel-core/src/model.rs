//! Notebook document model.
//!
//! Composes the shared cell collection, the document metadata store, and
//! the format-version fields into the externally visible model, and
//! translates low-level structural/content events into the coarse
//! `content_changed` / `state_changed` signal set. Owns the serializer
//! glue to and from the versioned exchange format.

use crate::cell::{Cell, CellChange, CellSpec};
use crate::error::NbModelError;
use crate::metadata::{MetadataChange, MetadataStore};
use crate::shared::SharedNotebook;
use nbmodel_nbformat::{
    decode_notebook, encode_notebook, CellData, NbformatError, NotebookData, MAJOR_VERSION,
    MINOR_VERSION,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Construction-time configuration.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Default kernel language for documents that do not carry one.
    pub language_preference: Option<String>,
    /// Scope undo/redo tracking to individual cells instead of the whole
    /// document; structural operations become untracked.
    pub disable_document_wide_undo_redo: bool,
}

/// Model-level field transition (`dirty`, `nbformat`, `nbformat_minor`).
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub name: &'static str,
    pub old_value: Value,
    pub new_value: Value,
}

/// Emitted when a loaded document recorded an original major format that
/// differs from the supported one. The model upgrades and keeps loading;
/// prompting the user is the collaborator's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMigration {
    pub origin_major: i64,
    pub supported_major: i64,
}

type ContentListener = Box<dyn FnMut() + Send + Sync>;
type StateListener = Box<dyn FnMut(&StateChange) + Send + Sync>;
type MigrationListener = Box<dyn FnMut(&FormatMigration) + Send + Sync>;

pub struct NotebookModel {
    shared: SharedNotebook,
    metadata: MetadataStore,
    nbformat: i64,
    nbformat_minor: i64,
    language_preference: Option<String>,
    dirty: bool,
    disposed: bool,
    next_content_id: u64,
    content_listeners: BTreeMap<u64, ContentListener>,
    next_state_id: u64,
    state_listeners: BTreeMap<u64, StateListener>,
    next_migration_id: u64,
    migration_listeners: BTreeMap<u64, MigrationListener>,
}

impl Default for NotebookModel {
    fn default() -> Self {
        Self::new(ModelOptions::default())
    }
}

impl NotebookModel {
    /// Builds a model with default metadata entries and, via
    /// [`initialize`](Self::initialize), one default code cell. A fresh
    /// model is not dirty.
    pub fn new(options: ModelOptions) -> Self {
        let mut metadata = MetadataStore::new();
        metadata.set("kernelspec", json!({ "name": "", "display_name": "" }));
        metadata.set(
            "language_info",
            json!({ "name": options.language_preference.clone().unwrap_or_default() }),
        );
        let mut model = Self {
            shared: SharedNotebook::with_options(
                MINOR_VERSION,
                !options.disable_document_wide_undo_redo,
            ),
            metadata,
            nbformat: MAJOR_VERSION,
            nbformat_minor: MINOR_VERSION,
            language_preference: options.language_preference,
            dirty: false,
            disposed: false,
            next_content_id: 1,
            content_listeners: BTreeMap::new(),
            next_state_id: 1,
            state_listeners: BTreeMap::new(),
            next_migration_id: 1,
            migration_listeners: BTreeMap::new(),
        };
        model.initialize();
        model
    }

    /// Guarantees a notebook is never persisted with zero cells through
    /// the normal creation path: inserts one default code cell when the
    /// collection is empty, then forgets any recorded history.
    pub fn initialize(&mut self) {
        if self.disposed {
            return;
        }
        if self.shared.is_empty() {
            self.shared.insert_cell(0, CellSpec::code());
        }
        self.shared.clear_undo_history();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Explicitly sets the dirty flag (e.g. cleared after a successful
    /// save). Transitions emit a `dirty` state change.
    pub fn set_dirty(&mut self, dirty: bool) -> Result<(), NbModelError> {
        self.ensure_alive()?;
        if dirty != self.dirty {
            self.dirty = dirty;
            self.emit_state(&StateChange {
                name: "dirty",
                old_value: Value::Bool(!dirty),
                new_value: Value::Bool(dirty),
            });
        }
        Ok(())
    }

    pub fn nbformat(&self) -> i64 {
        self.nbformat
    }

    pub fn nbformat_minor(&self) -> i64 {
        self.nbformat_minor
    }

    pub fn cells(&self) -> &[Cell] {
        self.shared.cells()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.shared.cell(index)
    }

    pub fn shared(&self) -> &SharedNotebook {
        &self.shared
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// `kernelspec.name`, or the empty string when absent.
    pub fn default_kernel_name(&self) -> String {
        self.metadata
            .get("kernelspec")
            .and_then(|spec| spec.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned()
    }

    /// `language_info.name` when present, else the construction-time
    /// language preference, else the empty string.
    pub fn default_kernel_language(&self) -> String {
        match self
            .metadata
            .get("language_info")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
        {
            Some(name) => name.to_owned(),
            None => self.language_preference.clone().unwrap_or_default(),
        }
    }

    /// Mutation surface for the cell collection. Edits made through the
    /// handle fire the model's coarse signals and dirty tracking.
    pub fn shared_mut(&mut self) -> SharedHandle<'_> {
        SharedHandle { model: self }
    }

    /// Mutation surface for the document metadata store.
    pub fn metadata_mut(&mut self) -> MetadataHandle<'_> {
        MetadataHandle { model: self }
    }

    pub fn on_content_changed<F>(&mut self, listener: F) -> u64
    where
        F: FnMut() + Send + Sync + 'static,
    {
        let id = self.next_content_id;
        self.next_content_id = self.next_content_id.saturating_add(1);
        self.content_listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_content_changed(&mut self, listener_id: u64) -> bool {
        self.content_listeners.remove(&listener_id).is_some()
    }

    pub fn on_state_changed<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&StateChange) + Send + Sync + 'static,
    {
        let id = self.next_state_id;
        self.next_state_id = self.next_state_id.saturating_add(1);
        self.state_listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_state_changed(&mut self, listener_id: u64) -> bool {
        self.state_listeners.remove(&listener_id).is_some()
    }

    pub fn on_format_migrated<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&FormatMigration) + Send + Sync + 'static,
    {
        let id = self.next_migration_id;
        self.next_migration_id = self.next_migration_id.saturating_add(1);
        self.migration_listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_format_migrated(&mut self, listener_id: u64) -> bool {
        self.migration_listeners.remove(&listener_id).is_some()
    }

    /// Wholesale replacement from a parsed exchange-format document. On a
    /// decode error the model is left untouched.
    pub fn from_json(&mut self, value: &Value) -> Result<(), NbModelError> {
        self.ensure_alive()?;
        let data = decode_notebook(value)?;
        self.load(data);
        Ok(())
    }

    /// Serializes the model to an exchange-format document. Cell
    /// identifiers appear only when the document's minor revision carries
    /// them.
    pub fn to_json(&self) -> Result<Value, NbModelError> {
        self.ensure_alive()?;
        let metadata = match self.metadata.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let data = NotebookData {
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
            metadata,
            cells: self.shared.to_data(),
        };
        Ok(encode_notebook(&data))
    }

    pub fn from_string(&mut self, text: &str) -> Result<(), NbModelError> {
        self.ensure_alive()?;
        let value: Value = serde_json::from_str(text).map_err(NbformatError::Json)?;
        self.from_json(&value)
    }

    pub fn to_string(&self) -> Result<String, NbModelError> {
        let value = self.to_json()?;
        Ok(serde_json::to_string(&value).map_err(NbformatError::Json)?)
    }

    /// Releases the shared document, all contained cells, and the
    /// metadata store. Safe to invoke multiple times; afterwards `cells()`
    /// reads empty and every operation fails with
    /// [`NbModelError::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.shared.clear_all();
        self.metadata.clear_all();
        self.content_listeners.clear();
        self.state_listeners.clear();
        self.migration_listeners.clear();
        tracing::debug!("notebook model disposed");
    }

    fn load(&mut self, data: NotebookData) {
        let mut nbformat = data.nbformat;
        if let Some(origin) = data.orig_nbformat() {
            if origin != MAJOR_VERSION {
                nbformat = MAJOR_VERSION;
                tracing::warn!(
                    origin,
                    supported = MAJOR_VERSION,
                    "upgrading notebook to the supported major format"
                );
                let migration = FormatMigration {
                    origin_major: origin,
                    supported_major: MAJOR_VERSION,
                };
                self.emit_migration(&migration);
            }
        }
        self.set_nbformat(nbformat);
        self.set_nbformat_minor(data.nbformat_minor);
        self.shared.set_format_minor(data.nbformat_minor);

        self.metadata.replace_all(data.metadata);
        self.ensure_default_metadata();

        let loaded_empty = data.cells.is_empty();
        self.shared.reset_from(data.cells);
        if loaded_empty {
            self.initialize();
        }

        // A load is itself a content-establishing mutation: the flag ends
        // up set no matter what it was before.
        self.after_content_change();
    }

    /// The serialized form always carries `kernelspec` and
    /// `language_info`; loads that lack them get the construction
    /// defaults back.
    fn ensure_default_metadata(&mut self) {
        if !self.metadata.has("kernelspec") {
            self.metadata
                .set("kernelspec", json!({ "name": "", "display_name": "" }));
        }
        if !self.metadata.has("language_info") {
            self.metadata.set(
                "language_info",
                json!({ "name": self.language_preference.clone().unwrap_or_default() }),
            );
        }
    }

    fn set_nbformat(&mut self, value: i64) {
        if value != self.nbformat {
            let old = self.nbformat;
            self.nbformat = value;
            self.emit_state(&StateChange {
                name: "nbformat",
                old_value: Value::from(old),
                new_value: Value::from(value),
            });
        }
    }

    fn set_nbformat_minor(&mut self, value: i64) {
        if value != self.nbformat_minor {
            let old = self.nbformat_minor;
            self.nbformat_minor = value;
            self.emit_state(&StateChange {
                name: "nbformat_minor",
                old_value: Value::from(old),
                new_value: Value::from(value),
            });
        }
    }

    fn ensure_alive(&self) -> Result<(), NbModelError> {
        if self.disposed {
            Err(NbModelError::Disposed)
        } else {
            Ok(())
        }
    }

    /// One coarse `content_changed` per public mutation, then the dirty
    /// flag. Observers of the content signal therefore read the model
    /// pre-dirty-transition state only through `state_changed`.
    fn after_content_change(&mut self) {
        self.emit_content();
        if !self.dirty {
            self.dirty = true;
            self.emit_state(&StateChange {
                name: "dirty",
                old_value: Value::Bool(false),
                new_value: Value::Bool(true),
            });
        }
    }

    fn emit_content(&mut self) {
        for listener in self.content_listeners.values_mut() {
            listener();
        }
    }

    fn emit_state(&mut self, change: &StateChange) {
        for listener in self.state_listeners.values_mut() {
            listener(change);
        }
    }

    fn emit_migration(&mut self, migration: &FormatMigration) {
        for listener in self.migration_listeners.values_mut() {
            listener(migration);
        }
    }
}

/// Routes structural operations and undo/redo through the model so the
/// coarse signals and dirty tracking fire exactly once per operation.
pub struct SharedHandle<'a> {
    model: &'a mut NotebookModel,
}

impl<'a> SharedHandle<'a> {
    pub fn insert_cell(&mut self, index: usize, spec: CellSpec) -> Result<&Cell, NbModelError> {
        self.model.ensure_alive()?;
        let index = index.min(self.model.shared.len());
        self.model.shared.insert_cell(index, spec);
        self.model.after_content_change();
        Ok(&self.model.shared.cells()[index])
    }

    /// Batch insertion: one structural change at the collection level,
    /// exactly one `content_changed` at the model level, regardless of
    /// batch size. An empty batch is a no-op.
    pub fn insert_cells(&mut self, index: usize, specs: Vec<CellSpec>) -> Result<(), NbModelError> {
        self.model.ensure_alive()?;
        if specs.is_empty() {
            return Ok(());
        }
        self.model.shared.insert_cells(index, specs);
        self.model.after_content_change();
        Ok(())
    }

    pub fn delete_cell(&mut self, index: usize) -> Result<CellData, NbModelError> {
        self.model.ensure_alive()?;
        let snapshot = self.model.shared.delete_cell(index)?;
        self.model.after_content_change();
        Ok(snapshot)
    }

    pub fn move_cell(&mut self, from: usize, to: usize) -> Result<(), NbModelError> {
        self.model.ensure_alive()?;
        self.model.shared.move_cell(from, to)?;
        self.model.after_content_change();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool, NbModelError> {
        self.model.ensure_alive()?;
        let replayed = self.model.shared.undo();
        if replayed {
            self.model.after_content_change();
        }
        Ok(replayed)
    }

    pub fn redo(&mut self) -> Result<bool, NbModelError> {
        self.model.ensure_alive()?;
        let replayed = self.model.shared.redo();
        if replayed {
            self.model.after_content_change();
        }
        Ok(replayed)
    }

    pub fn clear_undo_history(&mut self) -> Result<(), NbModelError> {
        self.model.ensure_alive()?;
        self.model.shared.clear_undo_history();
        Ok(())
    }

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&crate::shared::NotebookChange) + Send + Sync + 'static,
    {
        self.model.shared.on_change(listener)
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.model.shared.off_change(listener_id)
    }

    /// Narrows the handle to one cell. The index is validated here; the
    /// cell cannot shift underneath the handle because the handle holds
    /// the model exclusively.
    pub fn cell_mut(self, index: usize) -> Result<CellHandle<'a>, NbModelError> {
        self.model.ensure_alive()?;
        let len = self.model.shared.len();
        if index >= len {
            return Err(NbModelError::OutOfRange { index, len });
        }
        Ok(CellHandle {
            model: self.model,
            index,
        })
    }
}

/// Routes in-cell content edits through the model.
pub struct CellHandle<'a> {
    model: &'a mut NotebookModel,
    index: usize,
}

impl<'a> CellHandle<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_source(&mut self, source: impl Into<String>) -> Result<bool, NbModelError> {
        let changed = self.model.shared.set_source(self.index, source)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<bool, NbModelError> {
        let changed = self.model.shared.set_cell_metadata(self.index, key, value)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    pub fn delete_metadata(&mut self, key: &str) -> Result<bool, NbModelError> {
        let changed = self.model.shared.delete_cell_metadata(self.index, key)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    pub fn set_attachments(&mut self, attachments: Option<Value>) -> Result<bool, NbModelError> {
        let changed = self.model.shared.set_attachments(self.index, attachments)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    pub fn set_execution_count(&mut self, count: Option<i64>) -> Result<bool, NbModelError> {
        let changed = self.model.shared.set_execution_count(self.index, count)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    pub fn set_outputs(&mut self, outputs: Vec<Value>) -> Result<bool, NbModelError> {
        let changed = self.model.shared.set_outputs(self.index, outputs)?;
        if changed {
            self.model.after_content_change();
        }
        Ok(changed)
    }

    /// Per-cell undo; meaningful when the model was constructed with
    /// `disable_document_wide_undo_redo`.
    pub fn undo(&mut self) -> Result<bool, NbModelError> {
        let replayed = self.model.shared.undo_cell(self.index)?;
        if replayed {
            self.model.after_content_change();
        }
        Ok(replayed)
    }

    pub fn redo(&mut self) -> Result<bool, NbModelError> {
        let replayed = self.model.shared.redo_cell(self.index)?;
        if replayed {
            self.model.after_content_change();
        }
        Ok(replayed)
    }

    pub fn on_change<F>(&mut self, listener: F) -> Result<u64, NbModelError>
    where
        F: FnMut(&CellChange) + Send + Sync + 'static,
    {
        let len = self.model.shared.len();
        let cell = self
            .model
            .shared
            .cell_mut(self.index)
            .ok_or(NbModelError::OutOfRange {
                index: self.index,
                len,
            })?;
        Ok(cell.on_change(listener))
    }
}

/// Routes document metadata mutations through the model: the store's own
/// listeners fire first (inside the store), then the model's coarse
/// signals.
pub struct MetadataHandle<'a> {
    model: &'a mut NotebookModel,
}

impl<'a> MetadataHandle<'a> {
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<bool, NbModelError> {
        self.model.ensure_alive()?;
        let change = self.model.metadata.set(key, value);
        if change.is_some() {
            self.model.after_content_change();
        }
        Ok(change.is_some())
    }

    pub fn delete(&mut self, key: &str) -> Result<bool, NbModelError> {
        self.model.ensure_alive()?;
        let change = self.model.metadata.delete(key);
        if change.is_some() {
            self.model.after_content_change();
        }
        Ok(change.is_some())
    }

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(&MetadataChange) + Send + Sync + 'static,
    {
        self.model.metadata.on_change(listener)
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.model.metadata.off_change(listener_id)
    }
}
