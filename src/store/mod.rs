// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persistence for documents on disk.
//!
//! Documents are stored as nbformat 4.5 JSON (`.ipynb`); dialogs use the same
//! container with prompt content and model output joined by a reply
//! separator inside one markdown cell.

pub mod document_file;

pub use document_file::{
    DirEntryInfo, DirListing, DocumentStore, StoreError, WriteDurability,
};
