// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentSummary {
    pub name: String,
    pub kind: String,
    pub path: Option<String>,
    pub cell_count: u64,
    pub code_cells: u64,
    pub note_cells: u64,
    pub prompt_cells: u64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentSummary>,
    pub active_document: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentOpenParams {
    /// Unique name for the document within this server.
    pub name: String,
    /// Path of the `.ipynb` file, relative to the server root.
    pub path: String,
    /// "notebook" (default) or "dialog".
    pub kind: Option<String>,
    /// "connect" (default) to load an existing file, "create" for a new one.
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentOpenResponse {
    pub document: DocumentSummary,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentCloseParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentCloseResponse {
    pub active_document: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentActivateParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentActivateResponse {
    pub active_document: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DocumentReadParams {
    /// Document to read; defaults to the active one.
    pub name: Option<String>,
    pub start_index: Option<u64>,
    /// 0 means no limit.
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellSummary {
    pub index: u64,
    pub cell_id: String,
    pub kind: String,
    pub first_line: String,
    pub line_count: u64,
    pub execution_count: Option<u64>,
    pub pinned: bool,
    pub skipped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentReadResponse {
    pub name: String,
    pub total_cells: u64,
    pub start_index: u64,
    pub cells: Vec<CellSummary>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellInsertParams {
    /// Target index; omit or pass a negative value to append.
    pub index: Option<i64>,
    /// "code" (default), "note", "prompt" or "raw".
    pub kind: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellInsertResponse {
    pub index: u64,
    pub cell_id: String,
    /// Surrounding cells, the inserted one marked.
    pub context: Vec<String>,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellDeleteParams {
    pub indices: Option<Vec<u64>>,
    pub cell_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellDeleteResponse {
    pub removed: u64,
    pub indices: Vec<u64>,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellUpdateParams {
    pub index: Option<u64>,
    pub cell_id: Option<String>,
    /// One of: source, output, time_run, exported, skipped, pinned,
    /// input_collapsed, output_collapsed, heading_collapsed, use_thinking,
    /// run_result.
    pub field: String,
    /// Value shaped for the field: text fields take a string, flags a
    /// boolean, time_run a string or null, run_result an object with
    /// `output` and optional `time_run`.
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellUpdateResponse {
    pub index: u64,
    pub field: String,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellMoveParams {
    pub from_index: u64,
    pub to_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellMoveResponse {
    pub moved: bool,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellSwapParams {
    pub first: u64,
    pub second: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellSwapResponse {
    pub swapped: bool,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellReorderParams {
    /// Full permutation of the current cell indices: entry `i` is the old
    /// index that ends up at position `i`.
    pub new_order: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellReorderResponse {
    pub cell_count: u64,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellReadParams {
    pub index: Option<u64>,
    pub cell_id: Option<String>,
    pub include_outputs: Option<bool>,
}

/// One rendered output of a cell.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpOutput {
    Text { text: String },
    Image { format: String, data: String },
    Error { ename: String, evalue: String, text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellReadResponse {
    pub index: u64,
    pub cell_id: String,
    pub kind: String,
    pub source: String,
    pub outputs: Vec<McpOutput>,
    pub time_run: Option<String>,
    pub execution_count: Option<u64>,
    pub pinned: bool,
    pub skipped: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HistoryStepsParams {
    /// Number of operations; defaults to 1.
    pub steps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryStepResponse {
    pub results: Vec<String>,
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryGetResponse {
    pub undo_count: u64,
    pub redo_count: u64,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Up to the 10 most recent operations, oldest of those first.
    pub recent: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryClearResponse {
    pub cleared: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FilesListParams {
    /// Directory relative to the server root; omit for the root itself.
    pub path: Option<String>,
    /// Recursion depth, clamped to 3. Defaults to 1.
    pub max_depth: Option<u64>,
    /// Substring filter on relative paths.
    pub pattern: Option<String>,
    pub start_index: Option<u64>,
    /// 0 means no limit. Defaults to 25.
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileEntry {
    pub path: String,
    pub kind: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilesListResponse {
    pub total: u64,
    pub start_index: u64,
    pub entries: Vec<FileEntry>,
}
