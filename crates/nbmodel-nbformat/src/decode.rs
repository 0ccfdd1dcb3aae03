//! Exchange-format decoder: JSON value → typed notebook data.
//!
//! Decoding is strict about the shapes the model depends on (`cells` must
//! be an array of objects with a recognized `cell_type`) and permissive
//! about the rest, matching how real documents in the wild vary: missing
//! version fields fall back to the latest supported revision, and opaque
//! fields (`metadata`, `outputs`, `attachments`) are carried as-is.

use serde_json::{Map, Value};

use crate::{CellData, CellType, NbformatError, NotebookData, MAJOR_VERSION, MINOR_VERSION};

/// Decodes a full notebook document.
pub fn decode_notebook(value: &Value) -> Result<NotebookData, NbformatError> {
    let doc = value.as_object().ok_or(NbformatError::NotAnObject)?;

    let cells_value = doc.get("cells").ok_or(NbformatError::CellsMissing)?;
    let cells_array = cells_value.as_array().ok_or(NbformatError::CellsNotArray)?;

    let mut cells = Vec::with_capacity(cells_array.len());
    for (index, cell) in cells_array.iter().enumerate() {
        if !cell.is_object() {
            return Err(NbformatError::CellNotObject(index));
        }
        cells.push(decode_cell(cell)?);
    }

    Ok(NotebookData {
        nbformat: doc
            .get("nbformat")
            .and_then(Value::as_i64)
            .unwrap_or(MAJOR_VERSION),
        nbformat_minor: doc
            .get("nbformat_minor")
            .and_then(Value::as_i64)
            .unwrap_or(MINOR_VERSION),
        metadata: decode_object(doc.get("metadata")),
        cells,
    })
}

/// Decodes a single cell object.
///
/// An `id` field is preserved whenever present, regardless of the document's
/// format revision; a cell without one is still loadable.
pub fn decode_cell(value: &Value) -> Result<CellData, NbformatError> {
    let cell = value.as_object().ok_or(NbformatError::CellTypeMissing)?;

    let cell_type: CellType = cell
        .get("cell_type")
        .and_then(Value::as_str)
        .ok_or(NbformatError::CellTypeMissing)?
        .parse()?;

    let id = cell
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let source = decode_source(cell.get("source"))?;
    let metadata = decode_object(cell.get("metadata"));

    let mut data = CellData {
        cell_type,
        id,
        source,
        metadata,
        attachments: None,
        execution_count: None,
        outputs: Vec::new(),
    };

    match cell_type {
        CellType::Code => {
            data.execution_count = cell.get("execution_count").and_then(Value::as_i64);
            data.outputs = cell
                .get("outputs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
        }
        CellType::Markdown | CellType::Raw => {
            data.attachments = cell.get("attachments").filter(|v| v.is_object()).cloned();
        }
    }

    Ok(data)
}

/// Accepts the two legal `source` encodings: a single string, or an array
/// of line fragments that concatenate to the full text.
fn decode_source(value: Option<&Value>) -> Result<String, NbformatError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(lines)) => {
            let mut out = String::new();
            for line in lines {
                let fragment = line.as_str().ok_or(NbformatError::InvalidSource)?;
                out.push_str(fragment);
            }
            Ok(out)
        }
        Some(_) => Err(NbformatError::InvalidSource),
    }
}

fn decode_object(value: Option<&Value>) -> Map<String, Value> {
    value
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
