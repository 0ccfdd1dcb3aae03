//! Exchange-format encoder: typed notebook data → JSON value.
//!
//! The encoder emits one consistent representation: `source` is always a
//! single string, and cell `id` fields appear only when the document's
//! minor revision supports them. An elided id is omitted entirely, never
//! emitted as null or empty.

use serde_json::{Map, Value};

use crate::{CellData, CellType, NotebookData, CELL_ID_MINOR_VERSION};

/// Encodes a full notebook document.
pub fn encode_notebook(data: &NotebookData) -> Value {
    let include_ids = data.nbformat_minor >= CELL_ID_MINOR_VERSION;

    let mut doc = Map::new();
    doc.insert("nbformat".into(), Value::from(data.nbformat));
    doc.insert("nbformat_minor".into(), Value::from(data.nbformat_minor));
    doc.insert("metadata".into(), Value::Object(data.metadata.clone()));
    doc.insert(
        "cells".into(),
        Value::Array(
            data.cells
                .iter()
                .map(|cell| encode_cell(cell, include_ids))
                .collect(),
        ),
    );
    Value::Object(doc)
}

/// Encodes a single cell.
pub fn encode_cell(cell: &CellData, include_id: bool) -> Value {
    let mut out = Map::new();
    out.insert("cell_type".into(), Value::from(cell.cell_type.as_str()));
    if include_id {
        if let Some(id) = &cell.id {
            out.insert("id".into(), Value::from(id.clone()));
        }
    }
    out.insert("metadata".into(), Value::Object(cell.metadata.clone()));
    out.insert("source".into(), Value::from(cell.source.clone()));

    match cell.cell_type {
        CellType::Code => {
            out.insert(
                "execution_count".into(),
                cell.execution_count.map_or(Value::Null, Value::from),
            );
            out.insert("outputs".into(), Value::Array(cell.outputs.clone()));
        }
        CellType::Markdown | CellType::Raw => {
            if let Some(attachments) = &cell.attachments {
                out.insert("attachments".into(), attachments.clone());
            }
        }
    }

    Value::Object(out)
}
