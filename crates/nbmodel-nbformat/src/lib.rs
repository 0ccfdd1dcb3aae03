//! Versioned notebook exchange-format codec.
//!
//! Pure translation between JSON documents and typed notebook data: no
//! model state, no events. The document model layers change tracking and
//! undo on top of the types defined here.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod decode;
mod encode;

pub use decode::{decode_cell, decode_notebook};
pub use encode::{encode_cell, encode_notebook};

/// Latest major format revision this codec produces.
pub const MAJOR_VERSION: i64 = 4;

/// Latest minor format revision this codec produces.
pub const MINOR_VERSION: i64 = 5;

/// Minor revision that introduced stable cell identifiers. Documents below
/// this revision never carry `id` fields on output.
pub const CELL_ID_MINOR_VERSION: i64 = 5;

#[derive(Debug, Error)]
pub enum NbformatError {
    #[error("notebook document is not an object")]
    NotAnObject,
    #[error("notebook document has no `cells` field")]
    CellsMissing,
    #[error("notebook `cells` field is not an array")]
    CellsNotArray,
    #[error("cell at index {0} is not an object")]
    CellNotObject(usize),
    #[error("cell has no `cell_type` field")]
    CellTypeMissing,
    #[error("unrecognized cell type: {0}")]
    UnknownCellType(String),
    #[error("cell `source` is neither a string nor an array of strings")]
    InvalidSource,
    #[error("notebook text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind tag of a notebook cell. Fixed at cell creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Raw => "raw",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = NbformatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(CellType::Code),
            "markdown" => Ok(CellType::Markdown),
            "raw" => Ok(CellType::Raw),
            other => Err(NbformatError::UnknownCellType(other.to_owned())),
        }
    }
}

/// One cell of a notebook document, in exchange-format terms.
///
/// `execution_count` and `outputs` are meaningful for code cells only;
/// `attachments` for markdown and raw cells only. Both are carried opaquely.
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    pub cell_type: CellType,
    pub id: Option<String>,
    pub source: String,
    pub metadata: Map<String, Value>,
    pub attachments: Option<Value>,
    pub execution_count: Option<i64>,
    pub outputs: Vec<Value>,
}

impl CellData {
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
}

/// A whole notebook document, in exchange-format terms.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookData {
    pub nbformat: i64,
    pub nbformat_minor: i64,
    pub metadata: Map<String, Value>,
    pub cells: Vec<CellData>,
}

impl NotebookData {
    /// The `metadata.orig_nbformat` marker left behind by format upgrades,
    /// when present.
    pub fn orig_nbformat(&self) -> Option<i64> {
        self.metadata.get("orig_nbformat").and_then(Value::as_i64)
    }
}

impl Default for NotebookData {
    fn default() -> Self {
        Self {
            nbformat: MAJOR_VERSION,
            nbformat_minor: MINOR_VERSION,
            metadata: Map::new(),
            cells: Vec::new(),
        }
    }
}
