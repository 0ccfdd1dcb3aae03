//! Shared notebook document model.
//!
//! The model is an ordered sequence of cells plus document metadata and
//! format-version fields, with synchronous change notification, undo/redo,
//! and lossless round-trip serialization to the versioned exchange format.
//! All mutation is single-writer and fully synchronous: a mutating call
//! finishes its event dispatch before it returns.

pub mod cell;
pub mod error;
pub mod history;
pub mod metadata;
pub mod model;
pub mod shared;

pub use cell::{Cell, CellChange, CellSpec};
pub use error::NbModelError;
pub use metadata::{MetadataChange, MetadataStore};
pub use model::{
    CellHandle, FormatMigration, MetadataHandle, ModelOptions, NotebookModel, SharedHandle,
    StateChange,
};
pub use nbmodel_nbformat::CellType;
pub use shared::{CellsChange, NotebookChange, SharedNotebook};

use rand::Rng;

/// Number of characters in a generated cell identifier.
pub const CELL_ID_LEN: usize = 8;

const CELL_ID_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Generates a fresh random cell identifier.
pub fn generate_cell_id() -> String {
    let mut rng = rand::thread_rng();
    (0..CELL_ID_LEN)
        .map(|_| CELL_ID_ALPHABET[rng.gen_range(0..CELL_ID_ALPHABET.len())] as char)
        .collect()
}

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
