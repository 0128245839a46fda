// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Undo/redo command history for document mutations.
//!
//! Every structural operation (insert, delete, update, move, swap, reorder)
//! is a [`Command`] that stores the minimum state needed to reverse itself.
//! [`OperationHistory`] keeps two bounded stacks per document: new commands
//! land on the undo stack and clear the redo stack; undoing moves commands to
//! the redo stack. Execution and read operations are not tracked.

use std::fmt;

use crate::model::{Cell, CellField, CellId, CellValue, Document, FieldValueMismatch};

/// Default bound on the undo stack; the oldest entry is evicted beyond it.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Where an insert lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Insert before the cell currently at this index.
    At(usize),
    /// Insert at the current end. Resolved to a concrete index at execute
    /// time and stored back, because undo must remove the realized index.
    Append,
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(index) => write!(f, "{index}"),
            Self::Append => f.write_str("end"),
        }
    }
}

/// A cell removed by a delete, with the index it occupied before deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedCell {
    index: usize,
    cell: Cell,
}

impl RemovedCell {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }
}

/// One undoable structural operation.
///
/// `execute` applies the forward effect and must be called exactly once per
/// logical user action; `undo` restores the state from immediately before;
/// `redo` re-runs `execute`. Swap is the named self-inverse special case:
/// its `undo` also re-runs `execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert {
        position: InsertPosition,
        cell: Cell,
    },
    Delete {
        indices: Vec<usize>,
        removed: Vec<RemovedCell>,
    },
    /// `prior` is the two-phase capture: `None` means "cold", read the
    /// current value at first execute; `Some` means the caller supplied it.
    Update {
        index: usize,
        field: CellField,
        prior: Option<CellValue>,
        value: CellValue,
    },
    Move {
        from_index: usize,
        to_index: usize,
    },
    Swap {
        first: usize,
        second: usize,
    },
    /// `new_order[i]` is the old index now occupying position `i`.
    /// `old_order` is captured (as the identity) at first execute if the
    /// caller did not supply it.
    Reorder {
        old_order: Option<Vec<usize>>,
        new_order: Vec<usize>,
    },
}

impl Command {
    pub fn insert(position: InsertPosition, cell: Cell) -> Self {
        Self::Insert { position, cell }
    }

    pub fn delete(indices: Vec<usize>) -> Self {
        Self::Delete {
            indices,
            removed: Vec::new(),
        }
    }

    /// Update with the prior value captured lazily at first execute.
    pub fn update(index: usize, field: CellField, value: CellValue) -> Self {
        Self::Update {
            index,
            field,
            prior: None,
            value,
        }
    }

    /// Update with a caller-supplied prior value (e.g. when the caller
    /// already read it for a diff).
    pub fn update_with_prior(
        index: usize,
        field: CellField,
        prior: CellValue,
        value: CellValue,
    ) -> Self {
        Self::Update {
            index,
            field,
            prior: Some(prior),
            value,
        }
    }

    pub fn move_cell(from_index: usize, to_index: usize) -> Self {
        Self::Move {
            from_index,
            to_index,
        }
    }

    pub fn swap(first: usize, second: usize) -> Self {
        Self::Swap { first, second }
    }

    pub fn reorder(new_order: Vec<usize>) -> Self {
        Self::Reorder {
            old_order: None,
            new_order,
        }
    }

    pub fn reorder_from(old_order: Vec<usize>, new_order: Vec<usize>) -> Self {
        Self::Reorder {
            old_order: Some(old_order),
            new_order,
        }
    }

    /// Apply the forward effect. Validates fully before mutating: on error
    /// the document is unchanged.
    pub fn execute(&mut self, document: &mut Document) -> Result<String, CommandError> {
        match self {
            Self::Insert { position, cell } => execute_insert(document, position, cell),
            Self::Delete { indices, removed } => execute_delete(document, indices, removed),
            Self::Update {
                index,
                field,
                prior,
                value,
            } => execute_update(document, *index, *field, prior, value),
            Self::Move {
                from_index,
                to_index,
            } => execute_move(document, *from_index, *to_index),
            Self::Swap { first, second } => execute_swap(document, *first, *second),
            Self::Reorder {
                old_order,
                new_order,
            } => execute_reorder(document, old_order, new_order),
        }
    }

    /// Apply the exact inverse of `execute`.
    pub fn undo(&mut self, document: &mut Document) -> Result<String, CommandError> {
        match self {
            Self::Insert { position, cell } => undo_insert(document, position, cell),
            Self::Delete { removed, .. } => undo_delete(document, removed),
            Self::Update {
                index,
                field,
                prior,
                ..
            } => undo_update(document, *index, *field, prior),
            Self::Move {
                from_index,
                to_index,
            } => undo_move(document, *from_index, *to_index),
            // Swapping again undoes the swap.
            Self::Swap { .. } => self.execute(document),
            Self::Reorder {
                old_order,
                new_order,
            } => undo_reorder(document, old_order, new_order),
        }
    }

    /// Re-apply after an undo. No command kind needs a replay path distinct
    /// from `execute`.
    pub fn redo(&mut self, document: &mut Document) -> Result<String, CommandError> {
        self.execute(document)
    }

    /// Stable one-line summary for history listings.
    pub fn describe(&self) -> String {
        match self {
            Self::Insert { position, cell } => {
                format!("Insert {} cell at [{position}]", cell.kind())
            }
            Self::Delete { indices, .. } => {
                format!("Delete {} cell(s) at {indices:?}", indices.len())
            }
            Self::Update { index, field, .. } => format!("Update cell [{index}] {field}"),
            Self::Move {
                from_index,
                to_index,
            } => format!("Move cell [{from_index}] -> [{to_index}]"),
            Self::Swap { first, second } => format!("Swap cells [{first}] <-> [{second}]"),
            Self::Reorder { new_order, .. } => format!("Reorder cells: {new_order:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    IndexOutOfRange { index: usize, len: usize },
    DuplicateCellId { cell_id: CellId },
    FieldValue(FieldValueMismatch),
    OrderLengthMismatch { expected: usize, found: usize },
    OrderIndexOutOfRange { index: usize, len: usize },
    OrderDuplicateIndex { index: usize },
    NotExecuted,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "cell index {index} out of range (len={len})")
            }
            Self::DuplicateCellId { cell_id } => {
                write!(f, "cell id '{cell_id}' already present in document")
            }
            Self::FieldValue(mismatch) => mismatch.fmt(f),
            Self::OrderLengthMismatch { expected, found } => {
                write!(f, "order length {found} does not match cell count {expected}")
            }
            Self::OrderIndexOutOfRange { index, len } => {
                write!(f, "order entry {index} out of range (len={len})")
            }
            Self::OrderDuplicateIndex { index } => {
                write!(f, "order lists index {index} more than once")
            }
            Self::NotExecuted => f.write_str("command has not been executed yet"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FieldValue(mismatch) => Some(mismatch),
            _ => None,
        }
    }
}

impl From<FieldValueMismatch> for CommandError {
    fn from(mismatch: FieldValueMismatch) -> Self {
        Self::FieldValue(mismatch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDirection {
    Undo,
    Redo,
}

impl BatchDirection {
    fn verb(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

/// A batched undo/redo stopped partway.
///
/// Steps in `completed` stayed applied; the failing command was pushed back
/// onto the stack it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub direction: BatchDirection,
    pub completed: Vec<String>,
    pub failed: String,
    pub source: CommandError,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to {} '{}' after {} step(s): {}",
            self.direction.verb(),
            self.failed,
            self.completed.len(),
            self.source
        )
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Snapshot of a history's state for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    pub undo_count: usize,
    pub redo_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Up to the 10 most recent undo-stack descriptions, oldest of those
    /// first.
    pub recent: Vec<String>,
}

/// The two-stack undo/redo engine owned by one document.
///
/// Never persisted; history is scoped to the document's lifetime in the
/// current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHistory {
    max_size: usize,
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
}

impl Default for OperationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl OperationHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Record a successfully executed command.
    ///
    /// Clears the redo stack (any new operation invalidates undone history)
    /// and evicts the oldest entry when the undo stack exceeds its bound.
    pub fn record(&mut self, command: Command) {
        self.undo_stack.push(command);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Descriptions of the next up-to-`count` operations that would be
    /// undone, most recent first. Does not mutate either stack.
    pub fn undo_descriptions(&self, count: usize) -> Vec<String> {
        self.undo_stack
            .iter()
            .rev()
            .take(count)
            .map(Command::describe)
            .collect()
    }

    /// Descriptions of the next up-to-`count` operations that would be
    /// redone, most recent first. Does not mutate either stack.
    pub fn redo_descriptions(&self, count: usize) -> Vec<String> {
        self.redo_stack
            .iter()
            .rev()
            .take(count)
            .map(Command::describe)
            .collect()
    }

    /// Undo up to `steps` commands, most recent first.
    ///
    /// Returns the per-step result lines. On a mid-batch failure the failing
    /// command is pushed back onto the undo stack and the error reports the
    /// steps that did succeed; those stay undone.
    pub fn undo(
        &mut self,
        document: &mut Document,
        steps: usize,
    ) -> Result<Vec<String>, BatchError> {
        let steps = steps.min(self.undo_stack.len());
        let mut results = Vec::with_capacity(steps);

        for _ in 0..steps {
            let Some(mut command) = self.undo_stack.pop() else {
                break;
            };
            match command.undo(document) {
                Ok(result) => {
                    results.push(result);
                    self.redo_stack.push(command);
                }
                Err(source) => {
                    let failed = command.describe();
                    self.undo_stack.push(command);
                    return Err(BatchError {
                        direction: BatchDirection::Undo,
                        completed: results,
                        failed,
                        source,
                    });
                }
            }
        }

        Ok(results)
    }

    /// Redo up to `steps` undone commands; symmetric with [`Self::undo`].
    pub fn redo(
        &mut self,
        document: &mut Document,
        steps: usize,
    ) -> Result<Vec<String>, BatchError> {
        let steps = steps.min(self.redo_stack.len());
        let mut results = Vec::with_capacity(steps);

        for _ in 0..steps {
            let Some(mut command) = self.redo_stack.pop() else {
                break;
            };
            match command.redo(document) {
                Ok(result) => {
                    results.push(result);
                    self.undo_stack.push(command);
                }
                Err(source) => {
                    let failed = command.describe();
                    self.redo_stack.push(command);
                    return Err(BatchError {
                        direction: BatchDirection::Redo,
                        completed: results,
                        failed,
                        source,
                    });
                }
            }
        }

        Ok(results)
    }

    /// Drop all history, both stacks. Irreversible.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn summary(&self) -> HistorySummary {
        let recent_start = self.undo_stack.len().saturating_sub(10);
        HistorySummary {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            recent: self.undo_stack[recent_start..]
                .iter()
                .map(Command::describe)
                .collect(),
        }
    }
}

// Extracted per-command implementation used by `Command::{execute,undo}`.
include!("commands_impl.rs");
