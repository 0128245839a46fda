// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Documents (notebooks/dialogs) hold an ordered sequence of cells; a cell's
//! index is its position in that sequence.

pub mod cell;
pub mod document;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod ids;

pub use cell::{
    Cell, CellField, CellKind, CellValue, FieldValueMismatch, ParseCellFieldError,
    ParseCellKindError,
};
pub use document::{Document, DocumentKind};
pub use ids::{generate_cell_id, CellId, DocumentName, Id, IdError};
