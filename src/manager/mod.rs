// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Document lifecycle and mutation routing.
//!
//! The manager owns the open documents, tracks which one is active and runs
//! every structural mutation through the same path: validate, build the
//! command, execute, record it in that document's history, then persist.
//! Persistence failures are reported in the outcome but never roll back the
//! in-memory mutation or its history entry.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::exec::{ExecError, ExecutionBackend, OutputRecord};
use crate::history::{
    BatchError, Command, CommandError, HistorySummary, InsertPosition, OperationHistory,
};
use crate::llm::{self, ContextMessage, LlmClient, LlmError, LlmResponse};
use crate::model::{
    Cell, CellField, CellId, CellKind, CellValue, Document, DocumentKind, DocumentName,
};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug)]
pub enum ManagerError {
    NoActiveDocument,
    DocumentNotFound { name: DocumentName },
    DocumentAlreadyOpen { name: DocumentName },
    DocumentFileExists { relative: String },
    DocumentFileMissing { relative: String },
    CellNotFound { cell_id: CellId },
    NoCellsResolved,
    IndexOutOfRange { index: usize, len: usize },
    InvalidOrder { missing: Vec<usize>, extra: Vec<usize>, expected_len: usize, found_len: usize },
    WrongCellKind { index: usize, expected: CellKind, found: CellKind },
    NoPendingPrompt,
    NothingToUndo,
    NothingToRedo,
    Command(CommandError),
    Batch(BatchError),
    Store(StoreError),
    Exec(ExecError),
    Llm(LlmError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActiveDocument => {
                f.write_str("no active document; open or activate one first")
            }
            Self::DocumentNotFound { name } => write!(f, "document '{name}' not found"),
            Self::DocumentAlreadyOpen { name } => {
                write!(f, "document '{name}' is already in use; close it first")
            }
            Self::DocumentFileExists { relative } => {
                write!(f, "file '{relative}' already exists; connect to it instead")
            }
            Self::DocumentFileMissing { relative } => {
                write!(f, "file '{relative}' not found; create it instead")
            }
            Self::CellNotFound { cell_id } => write!(f, "cell '{cell_id}' not found"),
            Self::NoCellsResolved => f.write_str("no valid cell indices or ids provided"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "cell index {index} out of range (len={len})")
            }
            Self::InvalidOrder {
                missing,
                extra,
                expected_len,
                found_len,
            } => {
                write!(
                    f,
                    "invalid order (expected {expected_len} indices, got {found_len}"
                )?;
                if !missing.is_empty() {
                    write!(f, ", missing {missing:?}")?;
                }
                if !extra.is_empty() {
                    write!(f, ", invalid {extra:?}")?;
                }
                f.write_str(")")
            }
            Self::WrongCellKind {
                index,
                expected,
                found,
            } => write!(
                f,
                "cell [{index}] is a {found} cell, expected {expected}"
            ),
            Self::NoPendingPrompt => f.write_str("no pending prompt cell without output"),
            Self::NothingToUndo => f.write_str("nothing to undo"),
            Self::NothingToRedo => f.write_str("nothing to redo"),
            Self::Command(source) => source.fmt(f),
            Self::Batch(source) => source.fmt(f),
            Self::Store(source) => source.fmt(f),
            Self::Exec(source) => source.fmt(f),
            Self::Llm(source) => source.fmt(f),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Command(source) => Some(source),
            Self::Batch(source) => Some(source),
            Self::Store(source) => Some(source),
            Self::Exec(source) => Some(source),
            Self::Llm(source) => Some(source),
            _ => None,
        }
    }
}

impl From<CommandError> for ManagerError {
    fn from(source: CommandError) -> Self {
        Self::Command(source)
    }
}

impl From<BatchError> for ManagerError {
    fn from(source: BatchError) -> Self {
        Self::Batch(source)
    }
}

impl From<StoreError> for ManagerError {
    fn from(source: StoreError) -> Self {
        Self::Store(source)
    }
}

/// How to open a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Load an existing file.
    Connect,
    /// Create a new, empty file.
    Create,
}

/// Addresses a cell either by index or by stable id.
///
/// Ids resolve to an index at the manager boundary; commands only ever see
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRef {
    Index(usize),
    Id(CellId),
}

/// One open document plus its history and activity metadata.
#[derive(Debug)]
pub struct DocumentEntry {
    document: Document,
    history: OperationHistory,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    run_count: u64,
}

impl DocumentEntry {
    fn new(document: Document) -> Self {
        let now = Utc::now();
        Self {
            document,
            history: OperationHistory::default(),
            created_at: now,
            last_activity: now,
            run_count: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &OperationHistory {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOverview {
    pub name: DocumentName,
    pub kind: DocumentKind,
    pub relative_path: Option<String>,
    pub cell_count: usize,
    pub code_cells: usize,
    pub note_cells: usize,
    pub prompt_cells: usize,
    pub is_active: bool,
}

#[derive(Debug)]
pub struct InsertedCell {
    pub index: usize,
    pub cell_id: CellId,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct DeletedCells {
    pub removed: usize,
    pub indices: Vec<usize>,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct UpdatedCell {
    pub index: usize,
    pub field: CellField,
    pub previous: CellValue,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct MovedCell {
    pub moved: bool,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct SwappedCells {
    pub swapped: bool,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct ReorderedCells {
    pub cell_count: usize,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct HistoryStep {
    pub results: Vec<String>,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct ExecutedCell {
    pub index: usize,
    pub outputs: Vec<OutputRecord>,
    pub persist_error: Option<String>,
}

#[derive(Debug)]
pub struct PromptReply {
    pub index: usize,
    pub response: LlmResponse,
    pub persist_error: Option<String>,
}

/// Owns the open documents and routes every operation.
///
/// The manager is plain data with no interior locking; callers serialize
/// access (the MCP server holds it behind one mutex).
#[derive(Debug)]
pub struct DocumentManager {
    store: DocumentStore,
    documents: BTreeMap<DocumentName, DocumentEntry>,
    active: Option<DocumentName>,
}

impl DocumentManager {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            documents: BTreeMap::new(),
            active: None,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn active_name(&self) -> Option<&DocumentName> {
        self.active.as_ref()
    }

    pub fn active_document(&self) -> Option<&Document> {
        let name = self.active.as_ref()?;
        self.documents.get(name).map(DocumentEntry::document)
    }

    pub fn document(&self, name: &DocumentName) -> Option<&Document> {
        self.documents.get(name).map(DocumentEntry::document)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&DocumentName, &DocumentEntry)> {
        self.documents.iter()
    }

    pub fn overviews(&self) -> Vec<DocumentOverview> {
        self.documents
            .iter()
            .map(|(name, entry)| self.overview_of(name, entry))
            .collect()
    }

    fn overview_of(&self, name: &DocumentName, entry: &DocumentEntry) -> DocumentOverview {
        let document = entry.document();
        DocumentOverview {
            name: name.clone(),
            kind: document.kind(),
            relative_path: document.path().and_then(|path| {
                path.strip_prefix(self.store.root())
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            }),
            cell_count: document.len(),
            code_cells: document.count_of(CellKind::Code),
            note_cells: document.count_of(CellKind::Note),
            prompt_cells: document.count_of(CellKind::Prompt),
            is_active: self.active.as_ref() == Some(name),
        }
    }

    // ----- document lifecycle -----

    /// Open a document and make it active.
    pub fn open_document(
        &mut self,
        name: DocumentName,
        relative: &str,
        kind: DocumentKind,
        mode: OpenMode,
    ) -> Result<DocumentOverview, ManagerError> {
        if self.documents.contains_key(&name) {
            return Err(ManagerError::DocumentAlreadyOpen { name });
        }

        let exists = self.store.exists(relative)?;
        let document = match mode {
            OpenMode::Create => {
                if exists {
                    return Err(ManagerError::DocumentFileExists {
                        relative: relative.to_owned(),
                    });
                }
                self.store.create_document(name.clone(), relative, kind)?
            }
            OpenMode::Connect => {
                if !exists {
                    return Err(ManagerError::DocumentFileMissing {
                        relative: relative.to_owned(),
                    });
                }
                self.store.load_document(name.clone(), relative, kind)?
            }
        };

        let entry = DocumentEntry::new(document);
        self.documents.insert(name.clone(), entry);
        self.active = Some(name.clone());

        let entry = self.documents.get(&name).ok_or(ManagerError::DocumentNotFound {
            name: name.clone(),
        })?;
        Ok(self.overview_of(&name, entry))
    }

    /// Save and close a document, releasing its history.
    ///
    /// If it was active, the first remaining document (by name) becomes
    /// active.
    pub fn close_document(&mut self, name: &DocumentName) -> Result<(), ManagerError> {
        let Some(entry) = self.documents.get(name) else {
            return Err(ManagerError::DocumentNotFound { name: name.clone() });
        };
        self.store.save_document(entry.document())?;
        self.documents.remove(name);

        if self.active.as_ref() == Some(name) {
            self.active = self.documents.keys().next().cloned();
        }
        Ok(())
    }

    pub fn activate_document(&mut self, name: &DocumentName) -> Result<(), ManagerError> {
        if !self.documents.contains_key(name) {
            return Err(ManagerError::DocumentNotFound { name: name.clone() });
        }
        self.active = Some(name.clone());
        Ok(())
    }

    // ----- structural mutations -----

    pub fn insert_cell(
        &mut self,
        position: InsertPosition,
        kind: CellKind,
        source: impl Into<String>,
    ) -> Result<InsertedCell, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        if let InsertPosition::At(index) = position {
            let len = entry.document.len();
            if index > len {
                return Err(ManagerError::IndexOutOfRange { index, len });
            }
        }

        let cell = Cell::new(kind, source);
        let cell_id = cell.cell_id().clone();
        let mut command = Command::insert(position, cell);
        command.execute(&mut entry.document)?;

        let index = match &command {
            Command::Insert {
                position: InsertPosition::At(index),
                ..
            } => *index,
            _ => entry.document.len().saturating_sub(1),
        };
        entry.document.set_current_cell_id(Some(cell_id.clone()));
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(InsertedCell {
            index,
            cell_id,
            persist_error,
        })
    }

    pub fn delete_cells(&mut self, targets: &[CellRef]) -> Result<DeletedCells, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let indices = resolve_refs(&entry.document, targets)?;
        if indices.is_empty() {
            return Err(ManagerError::NoCellsResolved);
        }

        let mut command = Command::delete(indices.clone());
        command.execute(&mut entry.document)?;
        let removed = match &command {
            Command::Delete { removed, .. } => removed.len(),
            _ => indices.len(),
        };
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(DeletedCells {
            removed,
            indices,
            persist_error,
        })
    }

    pub fn update_cell(
        &mut self,
        target: &CellRef,
        field: CellField,
        value: CellValue,
    ) -> Result<UpdatedCell, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let index = resolve_ref(&entry.document, target)?;
        let mut command = Command::update(index, field, value);
        command.execute(&mut entry.document)?;

        let previous = match &command {
            Command::Update {
                prior: Some(prior), ..
            } => prior.clone(),
            _ => CellValue::Text(String::new()),
        };
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(UpdatedCell {
            index,
            field,
            previous,
            persist_error,
        })
    }

    pub fn move_cell(
        &mut self,
        from_index: usize,
        to_index: usize,
    ) -> Result<MovedCell, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let len = entry.document.len();
        if from_index >= len {
            return Err(ManagerError::IndexOutOfRange {
                index: from_index,
                len,
            });
        }
        if to_index >= len {
            return Err(ManagerError::IndexOutOfRange { index: to_index, len });
        }
        if from_index == to_index {
            // No-op: nothing happens and nothing is recorded.
            return Ok(MovedCell {
                moved: false,
                persist_error: None,
            });
        }

        let mut command = Command::move_cell(from_index, to_index);
        command.execute(&mut entry.document)?;
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(MovedCell {
            moved: true,
            persist_error,
        })
    }

    pub fn swap_cells(&mut self, first: usize, second: usize) -> Result<SwappedCells, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let len = entry.document.len();
        if first >= len {
            return Err(ManagerError::IndexOutOfRange { index: first, len });
        }
        if second >= len {
            return Err(ManagerError::IndexOutOfRange { index: second, len });
        }
        if first == second {
            return Ok(SwappedCells {
                swapped: false,
                persist_error: None,
            });
        }

        let mut command = Command::swap(first, second);
        command.execute(&mut entry.document)?;
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(SwappedCells {
            swapped: true,
            persist_error,
        })
    }

    pub fn reorder_cells(&mut self, new_order: Vec<usize>) -> Result<ReorderedCells, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        validate_order(&new_order, entry.document.len())?;

        let mut command = Command::reorder(new_order);
        command.execute(&mut entry.document)?;
        entry.history.record(command);
        entry.touch();

        let cell_count = entry.document.len();
        let persist_error = self.persist(&name);
        Ok(ReorderedCells {
            cell_count,
            persist_error,
        })
    }

    // ----- undo/redo -----

    pub fn undo(&mut self, steps: usize) -> Result<HistoryStep, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        if !entry.history.can_undo() {
            return Err(ManagerError::NothingToUndo);
        }

        let outcome = entry.history.undo(&mut entry.document, steps);
        entry.touch();
        let persist_error = self.persist(&name);
        match outcome {
            Ok(results) => Ok(HistoryStep {
                results,
                persist_error,
            }),
            Err(batch) => {
                if let Some(message) = persist_error {
                    eprintln!("triton: persist after failed undo: {message}");
                }
                Err(ManagerError::Batch(batch))
            }
        }
    }

    pub fn redo(&mut self, steps: usize) -> Result<HistoryStep, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        if !entry.history.can_redo() {
            return Err(ManagerError::NothingToRedo);
        }

        let outcome = entry.history.redo(&mut entry.document, steps);
        entry.touch();
        let persist_error = self.persist(&name);
        match outcome {
            Ok(results) => Ok(HistoryStep {
                results,
                persist_error,
            }),
            Err(batch) => {
                if let Some(message) = persist_error {
                    eprintln!("triton: persist after failed redo: {message}");
                }
                Err(ManagerError::Batch(batch))
            }
        }
    }

    pub fn history_summary(&self) -> Result<HistorySummary, ManagerError> {
        let name = self.require_active()?;
        let entry = self
            .documents
            .get(&name)
            .ok_or(ManagerError::DocumentNotFound { name })?;
        Ok(entry.history.summary())
    }

    pub fn undo_descriptions(&self, count: usize) -> Result<Vec<String>, ManagerError> {
        let name = self.require_active()?;
        let entry = self
            .documents
            .get(&name)
            .ok_or(ManagerError::DocumentNotFound { name })?;
        Ok(entry.history.undo_descriptions(count))
    }

    pub fn redo_descriptions(&self, count: usize) -> Result<Vec<String>, ManagerError> {
        let name = self.require_active()?;
        let entry = self
            .documents
            .get(&name)
            .ok_or(ManagerError::DocumentNotFound { name })?;
        Ok(entry.history.redo_descriptions(count))
    }

    pub fn clear_history(&mut self) -> Result<(), ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;
        entry.history.clear();
        Ok(())
    }

    // ----- execution collaborators -----

    /// Run a code cell through the backend and record its output as a
    /// history-tracked run-result update.
    pub fn execute_cell(
        &mut self,
        target: &CellRef,
        backend: &mut dyn ExecutionBackend,
        timeout: Duration,
    ) -> Result<ExecutedCell, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let index = resolve_ref(&entry.document, target)?;
        let cell = entry
            .document
            .cell(index)
            .ok_or(ManagerError::IndexOutOfRange {
                index,
                len: entry.document.len(),
            })?;
        if cell.kind() != CellKind::Code {
            return Err(ManagerError::WrongCellKind {
                index,
                expected: CellKind::Code,
                found: cell.kind(),
            });
        }

        let source = cell.source().to_owned();
        let outputs = backend
            .run(&source, timeout)
            .map_err(ManagerError::Exec)?;
        let serialized = serde_json::to_string(&outputs).unwrap_or_else(|_| "[]".to_owned());

        let mut command = Command::update(
            index,
            CellField::RunResult,
            CellValue::RunResult {
                output: serialized,
                time_run: Some(clock_time()),
            },
        );
        command.execute(&mut entry.document)?;
        entry.history.record(command);

        entry.run_count += 1;
        let run_count = entry.run_count;
        if let Some(cell) = entry.document.cell_mut(index) {
            cell.set_execution_count(Some(run_count));
        }
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(ExecutedCell {
            index,
            outputs,
            persist_error,
        })
    }

    /// Answer a prompt cell via the LLM client and record the reply as a
    /// history-tracked run-result update.
    ///
    /// With no target, the most recent prompt cell without output is used.
    pub fn execute_prompt(
        &mut self,
        target: Option<&CellRef>,
        client: &mut dyn LlmClient,
        system_prompt: &str,
        max_tokens: u32,
        include_context: bool,
    ) -> Result<PromptReply, ManagerError> {
        let name = self.require_active()?;
        let entry = self.entry_mut(&name)?;

        let index = match target {
            Some(target) => {
                let index = resolve_ref(&entry.document, target)?;
                let cell = entry
                    .document
                    .cell(index)
                    .ok_or(ManagerError::IndexOutOfRange {
                        index,
                        len: entry.document.len(),
                    })?;
                if cell.kind() != CellKind::Prompt {
                    return Err(ManagerError::WrongCellKind {
                        index,
                        expected: CellKind::Prompt,
                        found: cell.kind(),
                    });
                }
                index
            }
            None => entry
                .document
                .cells()
                .iter()
                .rposition(|cell| cell.kind() == CellKind::Prompt && cell.output().is_empty())
                .ok_or(ManagerError::NoPendingPrompt)?,
        };

        let prompt_text = entry
            .document
            .cell(index)
            .map(|cell| cell.source().to_owned())
            .unwrap_or_default();
        let mut context: Vec<ContextMessage> = if include_context {
            llm::build_context(&entry.document.cells()[..index], true)
        } else {
            Vec::new()
        };
        context.push(ContextMessage::user(prompt_text));

        let response = client
            .chat(&context, system_prompt, max_tokens)
            .map_err(ManagerError::Llm)?;

        let mut command = Command::update(
            index,
            CellField::RunResult,
            CellValue::RunResult {
                output: response.content.clone(),
                time_run: Some(clock_time()),
            },
        );
        command.execute(&mut entry.document)?;
        entry.history.record(command);
        entry.touch();

        let persist_error = self.persist(&name);
        Ok(PromptReply {
            index,
            response,
            persist_error,
        })
    }

    // ----- internals -----

    fn require_active(&self) -> Result<DocumentName, ManagerError> {
        self.active.clone().ok_or(ManagerError::NoActiveDocument)
    }

    fn entry_mut(&mut self, name: &DocumentName) -> Result<&mut DocumentEntry, ManagerError> {
        self.documents
            .get_mut(name)
            .ok_or_else(|| ManagerError::DocumentNotFound { name: name.clone() })
    }

    /// Fire-and-forget persistence after a successful mutation.
    fn persist(&self, name: &DocumentName) -> Option<String> {
        let entry = self.documents.get(name)?;
        match self.store.save_document(entry.document()) {
            Ok(()) => None,
            Err(err) => Some(err.to_string()),
        }
    }
}

fn resolve_ref(document: &Document, target: &CellRef) -> Result<usize, ManagerError> {
    match target {
        CellRef::Index(index) => {
            let len = document.len();
            if *index >= len {
                return Err(ManagerError::IndexOutOfRange { index: *index, len });
            }
            Ok(*index)
        }
        CellRef::Id(cell_id) => document
            .index_of(cell_id)
            .ok_or_else(|| ManagerError::CellNotFound {
                cell_id: cell_id.clone(),
            }),
    }
}

fn resolve_refs(document: &Document, targets: &[CellRef]) -> Result<Vec<usize>, ManagerError> {
    let mut indices = Vec::with_capacity(targets.len());
    for target in targets {
        indices.push(resolve_ref(document, target)?);
    }
    Ok(indices)
}

fn validate_order(new_order: &[usize], len: usize) -> Result<(), ManagerError> {
    let mut seen = vec![false; len];
    let mut extra = Vec::new();
    for &index in new_order {
        if index >= len {
            extra.push(index);
        } else {
            seen[index] = true;
        }
    }
    let missing: Vec<usize> = (0..len).filter(|&index| !seen[index]).collect();

    if new_order.len() != len || !missing.is_empty() || !extra.is_empty() {
        return Err(ManagerError::InvalidOrder {
            missing,
            extra,
            expected_len: len,
            found_len: new_order.len(),
        });
    }
    Ok(())
}

/// Wall-clock run timestamp, e.g. `02:30:45pm`.
fn clock_time() -> String {
    Local::now().format("%I:%M:%S%p").to_string().to_lowercase()
}

#[cfg(test)]
mod tests;
