// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::cell::{Cell, CellKind};
use super::document::{Document, DocumentKind};
use super::ids::DocumentName;

/// A notebook with one code cell per source, in order.
pub(crate) fn notebook(name: &str, sources: &[&str]) -> Document {
    let name = DocumentName::new(name).expect("fixture document name");
    let mut document = Document::new(name, DocumentKind::Notebook);
    for source in sources {
        document.cells_mut().push(Cell::new(CellKind::Code, *source));
    }
    document
}

pub(crate) fn dialog_small(name: &str) -> Document {
    let name = DocumentName::new(name).expect("fixture document name");
    let mut document = Document::new(name, DocumentKind::Dialog);
    document
        .cells_mut()
        .push(Cell::new(CellKind::Note, "# Analysis"));
    document
        .cells_mut()
        .push(Cell::new(CellKind::Code, "import pandas as pd"));
    document
        .cells_mut()
        .push(Cell::new(CellKind::Prompt, "Explain this import"));
    document
}
