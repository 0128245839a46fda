// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tokio::sync::Mutex;

use crate::exec::OutputRecord;
use crate::history::InsertPosition;
use crate::manager::{CellRef, DocumentManager, ManagerError, OpenMode};
use crate::model::{Cell, CellField, CellKind, CellValue, Document, DocumentKind, DocumentName};

use super::types::*;

/// MCP front end over one [`DocumentManager`].
///
/// All tool handlers funnel through a single mutex around the manager, so
/// document lifecycle and mutations are serialized per server.
#[derive(Clone)]
pub struct TritonMcp {
    manager: Arc<Mutex<DocumentManager>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TritonMcp {
    pub fn new(manager: DocumentManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            tool_router: Self::tool_router(),
        }
    }

    pub fn manager(&self) -> Arc<Mutex<DocumentManager>> {
        self.manager.clone()
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// List open documents; start here, then `document.open` or
    /// `document.activate`.
    #[tool(name = "document.list")]
    async fn document_list(&self) -> Result<Json<ListDocumentsResponse>, ErrorData> {
        let manager = self.manager.lock().await;
        let documents = manager
            .overviews()
            .into_iter()
            .map(document_summary)
            .collect();
        Ok(Json(ListDocumentsResponse {
            documents,
            active_document: manager.active_name().map(ToString::to_string),
        }))
    }

    /// Open a notebook or dialog file and make it the active document.
    #[tool(name = "document.open")]
    async fn document_open(
        &self,
        params: Parameters<DocumentOpenParams>,
    ) -> Result<Json<DocumentOpenResponse>, ErrorData> {
        let DocumentOpenParams {
            name,
            path,
            kind,
            mode,
        } = params.0;
        let name = parse_document_name(&name)?;
        let kind = parse_document_kind(kind.as_deref())?;
        let mode = parse_open_mode(mode.as_deref())?;

        let mut manager = self.manager.lock().await;
        let overview = manager
            .open_document(name, &path, kind, mode)
            .map_err(map_manager_error)?;
        Ok(Json(DocumentOpenResponse {
            document: document_summary(overview),
        }))
    }

    /// Save and close a document, releasing its undo history.
    #[tool(name = "document.close")]
    async fn document_close(
        &self,
        params: Parameters<DocumentCloseParams>,
    ) -> Result<Json<DocumentCloseResponse>, ErrorData> {
        let name = parse_document_name(&params.0.name)?;
        let mut manager = self.manager.lock().await;
        manager.close_document(&name).map_err(map_manager_error)?;
        Ok(Json(DocumentCloseResponse {
            active_document: manager.active_name().map(ToString::to_string),
        }))
    }

    /// Make a different open document the target of cell/history tools.
    #[tool(name = "document.activate")]
    async fn document_activate(
        &self,
        params: Parameters<DocumentActivateParams>,
    ) -> Result<Json<DocumentActivateResponse>, ErrorData> {
        let name = parse_document_name(&params.0.name)?;
        let mut manager = self.manager.lock().await;
        manager.activate_document(&name).map_err(map_manager_error)?;
        Ok(Json(DocumentActivateResponse {
            active_document: name.into_string(),
        }))
    }

    /// Page through a document's cells as one-line summaries.
    #[tool(name = "document.read")]
    async fn document_read(
        &self,
        params: Parameters<DocumentReadParams>,
    ) -> Result<Json<DocumentReadResponse>, ErrorData> {
        let DocumentReadParams {
            name,
            start_index,
            limit,
        } = params.0;

        let manager = self.manager.lock().await;
        let (name, document) = match name {
            Some(raw) => {
                let name = parse_document_name(&raw)?;
                let document = manager.document(&name).ok_or_else(|| {
                    ErrorData::resource_not_found(
                        format!("document '{name}' not found"),
                        None,
                    )
                })?;
                (name, document)
            }
            None => {
                let document = manager
                    .active_document()
                    .ok_or_else(|| map_manager_error(ManagerError::NoActiveDocument))?;
                (document.name().clone(), document)
            }
        };

        let total = document.len();
        let start = start_index.unwrap_or(0) as usize;
        let limit = limit.unwrap_or(20) as usize;
        let end = if limit > 0 { (start + limit).min(total) } else { total };

        let cells = if start < total {
            document.cells()[start..end]
                .iter()
                .enumerate()
                .map(|(offset, cell)| cell_summary(start + offset, cell))
                .collect()
        } else {
            Vec::new()
        };

        Ok(Json(DocumentReadResponse {
            name: name.into_string(),
            total_cells: total as u64,
            start_index: start as u64,
            cells,
        }))
    }

    /// Insert a cell into the active document (omit `index` to append).
    #[tool(name = "cell.insert")]
    async fn cell_insert(
        &self,
        params: Parameters<CellInsertParams>,
    ) -> Result<Json<CellInsertResponse>, ErrorData> {
        let CellInsertParams {
            index,
            kind,
            source,
        } = params.0;
        let kind = parse_cell_kind(kind.as_deref())?;
        let position = match index {
            Some(index) if index >= 0 => InsertPosition::At(index as usize),
            _ => InsertPosition::Append,
        };

        let mut manager = self.manager.lock().await;
        let outcome = manager
            .insert_cell(position, kind, source)
            .map_err(map_manager_error)?;

        let context = manager
            .active_document()
            .map(|document| insert_context(document, outcome.index))
            .unwrap_or_default();

        Ok(Json(CellInsertResponse {
            index: outcome.index as u64,
            cell_id: outcome.cell_id.into_string(),
            context,
            persist_error: outcome.persist_error,
        }))
    }

    /// Delete cells from the active document by index and/or id.
    #[tool(name = "cell.delete")]
    async fn cell_delete(
        &self,
        params: Parameters<CellDeleteParams>,
    ) -> Result<Json<CellDeleteResponse>, ErrorData> {
        let CellDeleteParams { indices, cell_ids } = params.0;
        let targets = cell_refs_from(indices, cell_ids)?;

        let mut manager = self.manager.lock().await;
        let outcome = manager
            .delete_cells(&targets)
            .map_err(map_manager_error)?;
        Ok(Json(CellDeleteResponse {
            removed: outcome.removed as u64,
            indices: outcome.indices.into_iter().map(|index| index as u64).collect(),
            persist_error: outcome.persist_error,
        }))
    }

    /// Update one field of a cell addressed by index or id.
    #[tool(name = "cell.update")]
    async fn cell_update(
        &self,
        params: Parameters<CellUpdateParams>,
    ) -> Result<Json<CellUpdateResponse>, ErrorData> {
        let CellUpdateParams {
            index,
            cell_id,
            field,
            value,
        } = params.0;
        let target = cell_ref_from(index, cell_id)?;
        let field = parse_cell_field(&field)?;
        let value = cell_value_from_json(field, &value)?;

        let mut manager = self.manager.lock().await;
        let outcome = manager
            .update_cell(&target, field, value)
            .map_err(map_manager_error)?;
        Ok(Json(CellUpdateResponse {
            index: outcome.index as u64,
            field: outcome.field.as_str().to_owned(),
            persist_error: outcome.persist_error,
        }))
    }

    /// Move a cell; `to_index` addresses the sequence after removal.
    #[tool(name = "cell.move")]
    async fn cell_move(
        &self,
        params: Parameters<CellMoveParams>,
    ) -> Result<Json<CellMoveResponse>, ErrorData> {
        let CellMoveParams {
            from_index,
            to_index,
        } = params.0;
        let mut manager = self.manager.lock().await;
        let outcome = manager
            .move_cell(from_index as usize, to_index as usize)
            .map_err(map_manager_error)?;
        Ok(Json(CellMoveResponse {
            moved: outcome.moved,
            persist_error: outcome.persist_error,
        }))
    }

    /// Exchange two cells.
    #[tool(name = "cell.swap")]
    async fn cell_swap(
        &self,
        params: Parameters<CellSwapParams>,
    ) -> Result<Json<CellSwapResponse>, ErrorData> {
        let CellSwapParams { first, second } = params.0;
        let mut manager = self.manager.lock().await;
        let outcome = manager
            .swap_cells(first as usize, second as usize)
            .map_err(map_manager_error)?;
        Ok(Json(CellSwapResponse {
            swapped: outcome.swapped,
            persist_error: outcome.persist_error,
        }))
    }

    /// Reorder all cells by a full permutation of current indices.
    #[tool(name = "cell.reorder")]
    async fn cell_reorder(
        &self,
        params: Parameters<CellReorderParams>,
    ) -> Result<Json<CellReorderResponse>, ErrorData> {
        let new_order: Vec<usize> = params
            .0
            .new_order
            .into_iter()
            .map(|index| index as usize)
            .collect();
        let mut manager = self.manager.lock().await;
        let outcome = manager
            .reorder_cells(new_order)
            .map_err(map_manager_error)?;
        Ok(Json(CellReorderResponse {
            cell_count: outcome.cell_count as u64,
            persist_error: outcome.persist_error,
        }))
    }

    /// Read one cell in full, outputs included.
    #[tool(name = "cell.read")]
    async fn cell_read(
        &self,
        params: Parameters<CellReadParams>,
    ) -> Result<Json<CellReadResponse>, ErrorData> {
        let CellReadParams {
            index,
            cell_id,
            include_outputs,
        } = params.0;
        let target = cell_ref_from(index, cell_id)?;
        let include_outputs = include_outputs.unwrap_or(true);

        let manager = self.manager.lock().await;
        let document = manager
            .active_document()
            .ok_or_else(|| map_manager_error(ManagerError::NoActiveDocument))?;
        let index = resolve_read_target(document, &target)?;
        let cell = document.cell(index).ok_or_else(|| {
            ErrorData::invalid_params(
                format!("cell index {index} out of range (len={})", document.len()),
                None,
            )
        })?;

        let outputs = if include_outputs {
            outputs_of(cell)
        } else {
            Vec::new()
        };

        Ok(Json(CellReadResponse {
            index: index as u64,
            cell_id: cell.cell_id().as_str().to_owned(),
            kind: cell.kind().as_str().to_owned(),
            source: cell.source().to_owned(),
            outputs,
            time_run: cell.time_run().map(str::to_owned),
            execution_count: cell.execution_count(),
            pinned: cell.pinned(),
            skipped: cell.skipped(),
        }))
    }

    /// Undo the last N operations on the active document.
    #[tool(name = "history.undo")]
    async fn history_undo(
        &self,
        params: Parameters<HistoryStepsParams>,
    ) -> Result<Json<HistoryStepResponse>, ErrorData> {
        let steps = params.0.steps.unwrap_or(1) as usize;
        let mut manager = self.manager.lock().await;
        let outcome = manager.undo(steps).map_err(map_manager_error)?;
        Ok(Json(HistoryStepResponse {
            results: outcome.results,
            persist_error: outcome.persist_error,
        }))
    }

    /// Redo the last N undone operations on the active document.
    #[tool(name = "history.redo")]
    async fn history_redo(
        &self,
        params: Parameters<HistoryStepsParams>,
    ) -> Result<Json<HistoryStepResponse>, ErrorData> {
        let steps = params.0.steps.unwrap_or(1) as usize;
        let mut manager = self.manager.lock().await;
        let outcome = manager.redo(steps).map_err(map_manager_error)?;
        Ok(Json(HistoryStepResponse {
            results: outcome.results,
            persist_error: outcome.persist_error,
        }))
    }

    /// Undo/redo counts plus the most recent operations.
    #[tool(name = "history.get")]
    async fn history_get(&self) -> Result<Json<HistoryGetResponse>, ErrorData> {
        let manager = self.manager.lock().await;
        let summary = manager.history_summary().map_err(map_manager_error)?;
        Ok(Json(HistoryGetResponse {
            undo_count: summary.undo_count as u64,
            redo_count: summary.redo_count as u64,
            can_undo: summary.can_undo,
            can_redo: summary.can_redo,
            recent: summary.recent,
        }))
    }

    /// Drop the active document's entire undo/redo history.
    #[tool(name = "history.clear")]
    async fn history_clear(&self) -> Result<Json<HistoryClearResponse>, ErrorData> {
        let mut manager = self.manager.lock().await;
        manager.clear_history().map_err(map_manager_error)?;
        Ok(Json(HistoryClearResponse { cleared: true }))
    }

    /// List files under the server root (depth-limited, paginated).
    #[tool(name = "files.list")]
    async fn files_list(
        &self,
        params: Parameters<FilesListParams>,
    ) -> Result<Json<FilesListResponse>, ErrorData> {
        let FilesListParams {
            path,
            max_depth,
            pattern,
            start_index,
            limit,
        } = params.0;

        let manager = self.manager.lock().await;
        let listing = manager
            .store()
            .list_dir(
                path.as_deref().unwrap_or(""),
                max_depth.unwrap_or(1) as usize,
                pattern.as_deref().unwrap_or(""),
                start_index.unwrap_or(0) as usize,
                limit.unwrap_or(25) as usize,
            )
            .map_err(|err| ErrorData::invalid_params(err.to_string(), None))?;

        Ok(Json(FilesListResponse {
            total: listing.total as u64,
            start_index: listing.start_index as u64,
            entries: listing
                .entries
                .into_iter()
                .map(|entry| FileEntry {
                    path: entry.path,
                    kind: entry.kind,
                    size: entry.size,
                    modified: entry.modified,
                })
                .collect(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for TritonMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Triton headless notebook/dialog server (tools: document.list, document.open, document.close, document.activate, document.read, cell.insert, cell.delete, cell.update, cell.move, cell.swap, cell.reorder, cell.read, history.undo, history.redo, history.get, history.clear, files.list). Every structural cell mutation is undoable via history.undo."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Extracted mapping/parsing helpers for MCP tool handlers.
include!("server/helpers.rs");

#[cfg(test)]
mod tests;
