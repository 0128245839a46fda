// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// Mapping/parsing helpers shared by the MCP tool handlers.
fn map_manager_error(err: ManagerError) -> ErrorData {
    match &err {
        ManagerError::DocumentNotFound { .. } | ManagerError::CellNotFound { .. } => {
            ErrorData::resource_not_found(err.to_string(), None)
        }
        ManagerError::Store(_) | ManagerError::Exec(_) | ManagerError::Llm(_) => {
            ErrorData::internal_error(err.to_string(), None)
        }
        ManagerError::Batch(batch) => ErrorData::internal_error(
            err.to_string(),
            Some(serde_json::json!({
                "completed_steps": batch.completed.len() as u64,
                "failed": batch.failed.clone(),
            })),
        ),
        _ => ErrorData::invalid_params(err.to_string(), None),
    }
}

fn parse_document_name(raw: &str) -> Result<DocumentName, ErrorData> {
    DocumentName::new(raw)
        .map_err(|err| ErrorData::invalid_params(format!("invalid document name: {err}"), None))
}

fn parse_document_kind(raw: Option<&str>) -> Result<DocumentKind, ErrorData> {
    match raw {
        None | Some("notebook") => Ok(DocumentKind::Notebook),
        Some("dialog") => Ok(DocumentKind::Dialog),
        Some(other) => Err(ErrorData::invalid_params(
            format!("unknown document kind '{other}' (expected 'notebook' or 'dialog')"),
            None,
        )),
    }
}

fn parse_open_mode(raw: Option<&str>) -> Result<OpenMode, ErrorData> {
    match raw {
        None | Some("connect") => Ok(OpenMode::Connect),
        Some("create") => Ok(OpenMode::Create),
        Some(other) => Err(ErrorData::invalid_params(
            format!("unknown mode '{other}' (expected 'connect' or 'create')"),
            None,
        )),
    }
}

fn parse_cell_kind(raw: Option<&str>) -> Result<CellKind, ErrorData> {
    let Some(raw) = raw else {
        return Ok(CellKind::Code);
    };
    raw.parse()
        .map_err(|err| ErrorData::invalid_params(format!("{err}"), None))
}

fn parse_cell_field(raw: &str) -> Result<CellField, ErrorData> {
    raw.parse()
        .map_err(|err| ErrorData::invalid_params(format!("{err}"), None))
}

fn cell_ref_from(index: Option<u64>, cell_id: Option<String>) -> Result<CellRef, ErrorData> {
    match (index, cell_id) {
        (Some(index), None) => Ok(CellRef::Index(index as usize)),
        (None, Some(raw)) => {
            let cell_id = raw.parse().map_err(|err| {
                ErrorData::invalid_params(format!("invalid cell id: {err}"), None)
            })?;
            Ok(CellRef::Id(cell_id))
        }
        (Some(_), Some(_)) => Err(ErrorData::invalid_params(
            "provide either index or cell_id, not both",
            None,
        )),
        (None, None) => Err(ErrorData::invalid_params(
            "provide index or cell_id",
            None,
        )),
    }
}

fn cell_refs_from(
    indices: Option<Vec<u64>>,
    cell_ids: Option<Vec<String>>,
) -> Result<Vec<CellRef>, ErrorData> {
    let mut targets = Vec::new();
    for index in indices.unwrap_or_default() {
        targets.push(CellRef::Index(index as usize));
    }
    for raw in cell_ids.unwrap_or_default() {
        let cell_id = raw
            .parse()
            .map_err(|err| ErrorData::invalid_params(format!("invalid cell id: {err}"), None))?;
        targets.push(CellRef::Id(cell_id));
    }
    if targets.is_empty() {
        return Err(ErrorData::invalid_params(
            "provide indices and/or cell_ids",
            None,
        ));
    }
    Ok(targets)
}

/// Shape the JSON value for the field it updates.
fn cell_value_from_json(
    field: CellField,
    value: &serde_json::Value,
) -> Result<CellValue, ErrorData> {
    use serde_json::Value;

    let mismatch = |expected: &str| {
        ErrorData::invalid_params(
            format!("field '{field}' takes {expected}, got {value}"),
            None,
        )
    };

    match field {
        CellField::Source | CellField::Output => match value {
            Value::String(text) => Ok(CellValue::Text(text.clone())),
            _ => Err(mismatch("a string")),
        },
        CellField::TimeRun => match value {
            Value::String(text) => Ok(CellValue::OptionalText(Some(text.clone()))),
            Value::Null => Ok(CellValue::OptionalText(None)),
            _ => Err(mismatch("a string or null")),
        },
        CellField::RunResult => {
            let Value::Object(map) = value else {
                return Err(mismatch("an object with 'output' and optional 'time_run'"));
            };
            let Some(Value::String(output)) = map.get("output") else {
                return Err(mismatch("an object with 'output' and optional 'time_run'"));
            };
            let time_run = match map.get("time_run") {
                Some(Value::String(text)) => Some(text.clone()),
                None | Some(Value::Null) => None,
                Some(_) => {
                    return Err(mismatch("an object with 'output' and optional 'time_run'"));
                }
            };
            Ok(CellValue::RunResult {
                output: output.clone(),
                time_run,
            })
        }
        _ => match value {
            Value::Bool(flag) => Ok(CellValue::Flag(*flag)),
            _ => Err(mismatch("a boolean")),
        },
    }
}

fn document_summary(overview: crate::manager::DocumentOverview) -> DocumentSummary {
    DocumentSummary {
        name: overview.name.into_string(),
        kind: overview.kind.as_str().to_owned(),
        path: overview.relative_path,
        cell_count: overview.cell_count as u64,
        code_cells: overview.code_cells as u64,
        note_cells: overview.note_cells as u64,
        prompt_cells: overview.prompt_cells as u64,
        is_active: overview.is_active,
    }
}

fn cell_summary(index: usize, cell: &Cell) -> CellSummary {
    CellSummary {
        index: index as u64,
        cell_id: cell.cell_id().as_str().to_owned(),
        kind: cell.kind().as_str().to_owned(),
        first_line: cell.first_line(50),
        line_count: cell.source().lines().count().max(1) as u64,
        execution_count: cell.execution_count(),
        pinned: cell.pinned(),
        skipped: cell.skipped(),
    }
}

/// Surrounding cells of a freshly inserted index, the new one marked.
fn insert_context(document: &Document, index: usize) -> Vec<String> {
    let start = index.saturating_sub(2);
    let end = (index + 3).min(document.len());

    (start..end)
        .filter_map(|i| {
            document.cell(i).map(|cell| {
                let marker = if i == index { " >>> NEW <<<" } else { "" };
                format!("[{i}] {}: {}{marker}", cell.kind(), cell.first_line(40))
            })
        })
        .collect()
}

fn resolve_read_target(document: &Document, target: &CellRef) -> Result<usize, ErrorData> {
    match target {
        CellRef::Index(index) => {
            if *index >= document.len() {
                return Err(ErrorData::invalid_params(
                    format!(
                        "cell index {index} out of range (len={})",
                        document.len()
                    ),
                    None,
                ));
            }
            Ok(*index)
        }
        CellRef::Id(cell_id) => document.index_of(cell_id).ok_or_else(|| {
            ErrorData::resource_not_found(format!("cell '{cell_id}' not found"), None)
        }),
    }
}

/// Render a cell's stored output for tool consumers.
///
/// Code cells hold nbformat output records as JSON; prompt/note cells hold
/// plain text. Image payloads are passed through only when they decode as
/// base64, otherwise they surface as an error entry.
fn outputs_of(cell: &Cell) -> Vec<McpOutput> {
    if cell.output().is_empty() {
        return Vec::new();
    }

    let Ok(records) = serde_json::from_str::<Vec<OutputRecord>>(cell.output()) else {
        return vec![McpOutput::Text {
            text: cell.output().to_owned(),
        }];
    };

    records.iter().filter_map(render_output_record).collect()
}

fn render_output_record(record: &OutputRecord) -> Option<McpOutput> {
    use base64::Engine;

    match record {
        OutputRecord::Stream { name, text } => Some(McpOutput::Text {
            text: format!("[{name}]\n{text}"),
        }),
        OutputRecord::ExecuteResult { data, .. } | OutputRecord::DisplayData { data } => {
            if let Some(text) = data.get("text/plain") {
                return Some(McpOutput::Text { text: text.clone() });
            }
            for (mime, payload) in data {
                let Some(format) = mime.strip_prefix("image/") else {
                    continue;
                };
                let engine = base64::engine::general_purpose::STANDARD;
                return Some(match engine.decode(payload.trim()) {
                    Ok(_) => McpOutput::Image {
                        format: format.to_owned(),
                        data: payload.clone(),
                    },
                    Err(err) => McpOutput::Error {
                        ename: "InvalidImagePayload".to_owned(),
                        evalue: err.to_string(),
                        text: format!("undecodable {mime} payload"),
                    },
                });
            }
            None
        }
        OutputRecord::Error {
            ename,
            evalue,
            traceback,
        } => Some(McpOutput::Error {
            ename: ename.clone(),
            evalue: evalue.clone(),
            text: traceback.join("\n"),
        }),
    }
}
