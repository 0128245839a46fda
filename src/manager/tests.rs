// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{CellRef, DocumentManager, ManagerError, OpenMode};
use crate::exec::EchoBackend;
use crate::history::InsertPosition;
use crate::llm::MockLlmClient;
use crate::model::{CellField, CellKind, CellValue, DocumentKind, DocumentName};
use crate::store::DocumentStore;

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TempDir {
    path: std::path::PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = env::temp_dir();
        path.push(format!("triton-{prefix}-{}-{nanos}-{counter}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn name(raw: &str) -> DocumentName {
    DocumentName::new(raw).expect("document name")
}

fn manager_with_notebook(tmp: &TempDir) -> DocumentManager {
    let mut manager = DocumentManager::new(DocumentStore::new(tmp.path()));
    manager
        .open_document(name("nb"), "nb.ipynb", DocumentKind::Notebook, OpenMode::Create)
        .expect("open notebook");
    manager
}

fn sources(manager: &DocumentManager) -> Vec<String> {
    manager
        .active_document()
        .expect("active document")
        .cells()
        .iter()
        .map(|cell| cell.source().to_owned())
        .collect()
}

#[test]
fn mutations_require_an_active_document() {
    let tmp = TempDir::new("mgr-inactive");
    let mut manager = DocumentManager::new(DocumentStore::new(tmp.path()));

    let err = manager
        .insert_cell(InsertPosition::Append, CellKind::Code, "x")
        .unwrap_err();
    assert!(matches!(err, ManagerError::NoActiveDocument));
    assert!(matches!(manager.undo(1), Err(ManagerError::NoActiveDocument)));
    assert!(matches!(
        manager.history_summary(),
        Err(ManagerError::NoActiveDocument)
    ));
}

#[test]
fn open_close_activate_lifecycle() {
    let tmp = TempDir::new("mgr-lifecycle");
    let mut manager = DocumentManager::new(DocumentStore::new(tmp.path()));

    let overview = manager
        .open_document(name("a"), "a.ipynb", DocumentKind::Notebook, OpenMode::Create)
        .expect("create a");
    assert!(overview.is_active);
    assert_eq!(overview.cell_count, 0);
    assert_eq!(overview.relative_path.as_deref(), Some("a.ipynb"));

    manager
        .open_document(name("b"), "b.ipynb", DocumentKind::Dialog, OpenMode::Create)
        .expect("create b");
    assert_eq!(manager.active_name(), Some(&name("b")));

    let err = manager
        .open_document(name("b"), "b2.ipynb", DocumentKind::Dialog, OpenMode::Create)
        .unwrap_err();
    assert!(matches!(err, ManagerError::DocumentAlreadyOpen { .. }));

    let err = manager
        .open_document(name("c"), "a.ipynb", DocumentKind::Notebook, OpenMode::Create)
        .unwrap_err();
    assert!(matches!(err, ManagerError::DocumentFileExists { .. }));

    let err = manager
        .open_document(name("c"), "missing.ipynb", DocumentKind::Notebook, OpenMode::Connect)
        .unwrap_err();
    assert!(matches!(err, ManagerError::DocumentFileMissing { .. }));

    manager.activate_document(&name("a")).expect("activate a");
    assert_eq!(manager.active_name(), Some(&name("a")));

    manager.close_document(&name("a")).expect("close a");
    // The first remaining document becomes active.
    assert_eq!(manager.active_name(), Some(&name("b")));

    let err = manager.activate_document(&name("a")).unwrap_err();
    assert!(matches!(err, ManagerError::DocumentNotFound { .. }));

    let overviews = manager.overviews();
    assert_eq!(overviews.len(), 1);
    assert_eq!(overviews[0].name, name("b"));
}

#[test]
fn insert_resolves_append_and_persists() {
    let tmp = TempDir::new("mgr-insert");
    let mut manager = manager_with_notebook(&tmp);

    let first = manager
        .insert_cell(InsertPosition::Append, CellKind::Code, "a")
        .expect("insert a");
    assert_eq!(first.index, 0);
    assert!(first.persist_error.is_none());

    let second = manager
        .insert_cell(InsertPosition::At(0), CellKind::Note, "b")
        .expect("insert b");
    assert_eq!(second.index, 0);
    assert_eq!(sources(&manager), ["b", "a"]);

    // The active document's focus follows the inserted cell.
    assert_eq!(
        manager.active_document().expect("doc").current_cell_id(),
        Some(&second.cell_id)
    );

    let err = manager
        .insert_cell(InsertPosition::At(9), CellKind::Code, "x")
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::IndexOutOfRange { index: 9, len: 2 }
    ));

    // A second store sees the persisted state.
    let reload = DocumentStore::new(tmp.path())
        .load_document(name("nb"), "nb.ipynb", DocumentKind::Notebook)
        .expect("reload");
    assert_eq!(reload.len(), 2);
    assert_eq!(reload.cell(0).expect("cell").source(), "b");
}

#[test]
fn delete_accepts_indices_and_ids_mixed() {
    let tmp = TempDir::new("mgr-delete");
    let mut manager = manager_with_notebook(&tmp);

    for source in ["a", "b", "c", "d"] {
        manager
            .insert_cell(InsertPosition::Append, CellKind::Code, source)
            .expect("insert");
    }
    let id_of_c = manager
        .active_document()
        .expect("doc")
        .cell(2)
        .expect("cell c")
        .cell_id()
        .clone();

    let outcome = manager
        .delete_cells(&[CellRef::Index(0), CellRef::Id(id_of_c.clone())])
        .expect("delete");
    assert_eq!(outcome.removed, 2);
    assert_eq!(sources(&manager), ["b", "d"]);

    let err = manager.delete_cells(&[CellRef::Id(id_of_c)]).unwrap_err();
    assert!(matches!(err, ManagerError::CellNotFound { .. }));

    let err = manager.delete_cells(&[]).unwrap_err();
    assert!(matches!(err, ManagerError::NoCellsResolved));

    manager.undo(1).expect("undo delete");
    assert_eq!(sources(&manager), ["a", "b", "c", "d"]);
}

#[test]
fn update_returns_previous_value_and_rejects_bad_shapes() {
    let tmp = TempDir::new("mgr-update");
    let mut manager = manager_with_notebook(&tmp);
    manager
        .insert_cell(InsertPosition::Append, CellKind::Code, "x = 1")
        .expect("insert");

    let outcome = manager
        .update_cell(
            &CellRef::Index(0),
            CellField::Source,
            CellValue::Text("x = 2".to_owned()),
        )
        .expect("update");
    assert_eq!(outcome.previous, CellValue::Text("x = 1".to_owned()));

    let err = manager
        .update_cell(&CellRef::Index(0), CellField::Pinned, CellValue::Text("y".to_owned()))
        .unwrap_err();
    assert!(matches!(err, ManagerError::Command(_)));

    let err = manager
        .update_cell(
            &CellRef::Index(5),
            CellField::Source,
            CellValue::Text("z".to_owned()),
        )
        .unwrap_err();
    assert!(matches!(err, ManagerError::IndexOutOfRange { index: 5, len: 1 }));
}

#[test]
fn move_and_swap_same_index_are_unrecorded_no_ops() {
    let tmp = TempDir::new("mgr-noop");
    let mut manager = manager_with_notebook(&tmp);
    for source in ["a", "b"] {
        manager
            .insert_cell(InsertPosition::Append, CellKind::Code, source)
            .expect("insert");
    }
    manager.clear_history().expect("clear history");

    let outcome = manager.move_cell(1, 1).expect("no-op move");
    assert!(!outcome.moved);
    let outcome = manager.swap_cells(0, 0).expect("no-op swap");
    assert!(!outcome.swapped);

    // Neither no-op pushed a history entry.
    assert!(matches!(manager.undo(1), Err(ManagerError::NothingToUndo)));

    let outcome = manager.move_cell(0, 1).expect("real move");
    assert!(outcome.moved);
    assert_eq!(sources(&manager), ["b", "a"]);

    let err = manager.move_cell(0, 5).unwrap_err();
    assert!(matches!(err, ManagerError::IndexOutOfRange { index: 5, len: 2 }));
}

#[test]
fn reorder_reports_missing_and_extra_indices() {
    let tmp = TempDir::new("mgr-reorder");
    let mut manager = manager_with_notebook(&tmp);
    for source in ["a", "b", "c"] {
        manager
            .insert_cell(InsertPosition::Append, CellKind::Code, source)
            .expect("insert");
    }

    let err = manager.reorder_cells(vec![0, 1, 5]).unwrap_err();
    let ManagerError::InvalidOrder {
        missing,
        extra,
        expected_len,
        found_len,
    } = err
    else {
        panic!("expected InvalidOrder, got {err:?}");
    };
    assert_eq!(missing, [2]);
    assert_eq!(extra, [5]);
    assert_eq!(expected_len, 3);
    assert_eq!(found_len, 3);

    let outcome = manager.reorder_cells(vec![2, 0, 1]).expect("reorder");
    assert_eq!(outcome.cell_count, 3);
    assert_eq!(sources(&manager), ["c", "a", "b"]);

    manager.undo(1).expect("undo reorder");
    assert_eq!(sources(&manager), ["a", "b", "c"]);
}

#[test]
fn undo_redo_flow_with_invalidation() {
    let tmp = TempDir::new("mgr-undo");
    let mut manager = manager_with_notebook(&tmp);

    for source in ["a", "b", "c"] {
        manager
            .insert_cell(InsertPosition::Append, CellKind::Code, source)
            .expect("insert");
    }

    let undone = manager.undo(2).expect("undo two");
    assert_eq!(undone.results.len(), 2);
    assert_eq!(sources(&manager), ["a"]);

    let summary = manager.history_summary().expect("summary");
    assert_eq!(summary.undo_count, 1);
    assert_eq!(summary.redo_count, 2);

    let redone = manager.redo(1).expect("redo one");
    assert_eq!(redone.results.len(), 1);
    assert_eq!(sources(&manager), ["a", "b"]);

    // A fresh mutation invalidates the remaining redo step.
    manager
        .insert_cell(InsertPosition::Append, CellKind::Note, "n")
        .expect("insert note");
    assert!(matches!(manager.redo(1), Err(ManagerError::NothingToRedo)));

    manager.clear_history().expect("clear");
    assert!(matches!(manager.undo(1), Err(ManagerError::NothingToUndo)));
}

#[test]
fn execute_cell_records_output_through_history() {
    let tmp = TempDir::new("mgr-exec");
    let mut manager = manager_with_notebook(&tmp);
    manager
        .insert_cell(InsertPosition::Append, CellKind::Code, "print(1)")
        .expect("insert code");
    manager
        .insert_cell(InsertPosition::Append, CellKind::Note, "not code")
        .expect("insert note");

    let mut backend = EchoBackend::new();
    let outcome = manager
        .execute_cell(&CellRef::Index(0), &mut backend, Duration::from_secs(30))
        .expect("execute");
    assert_eq!(outcome.index, 0);
    assert_eq!(outcome.outputs.len(), 1);
    assert_eq!(backend.runs(), ["print(1)"]);

    let document = manager.active_document().expect("doc");
    let cell = document.cell(0).expect("cell");
    assert!(cell.output().contains("stdout"));
    assert!(cell.time_run().is_some());
    assert_eq!(cell.execution_count(), Some(1));

    // The run result is one undoable step.
    manager.undo(1).expect("undo run");
    let cell = manager.active_document().expect("doc").cell(0).expect("cell");
    assert_eq!(cell.output(), "");
    assert_eq!(cell.time_run(), None);

    let err = manager
        .execute_cell(&CellRef::Index(1), &mut backend, Duration::from_secs(30))
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::WrongCellKind {
            index: 1,
            expected: CellKind::Code,
            found: CellKind::Note,
        }
    ));
}

#[test]
fn execute_prompt_targets_the_pending_prompt_and_builds_context() {
    let tmp = TempDir::new("mgr-prompt");
    let mut manager = DocumentManager::new(DocumentStore::new(tmp.path()));
    manager
        .open_document(name("dlg"), "dlg.ipynb", DocumentKind::Dialog, OpenMode::Create)
        .expect("open dialog");

    manager
        .insert_cell(InsertPosition::Append, CellKind::Note, "intro")
        .expect("insert note");
    manager
        .insert_cell(InsertPosition::Append, CellKind::Prompt, "What is Rust?")
        .expect("insert prompt");

    let mut client = MockLlmClient::new(vec!["A systems language.".to_owned()]);
    let reply = manager
        .execute_prompt(None, &mut client, "", 4096, true)
        .expect("execute prompt");
    assert_eq!(reply.index, 1);
    assert_eq!(reply.response.content, "A systems language.");
    // Context carried the note plus the prompt itself.
    assert_eq!(client.calls(), [2]);

    let cell = manager.active_document().expect("doc").cell(1).expect("cell");
    assert_eq!(cell.output(), "A systems language.");
    assert!(cell.time_run().is_some());

    // No prompt without output remains.
    let err = manager
        .execute_prompt(None, &mut client, "", 4096, true)
        .unwrap_err();
    assert!(matches!(err, ManagerError::NoPendingPrompt));

    // The reply itself is undoable.
    manager.undo(1).expect("undo reply");
    let cell = manager.active_document().expect("doc").cell(1).expect("cell");
    assert_eq!(cell.output(), "");
}

#[test]
fn dialog_round_trips_through_close_and_reconnect() {
    let tmp = TempDir::new("mgr-reopen");
    let mut manager = DocumentManager::new(DocumentStore::new(tmp.path()));
    manager
        .open_document(name("dlg"), "dlg.ipynb", DocumentKind::Dialog, OpenMode::Create)
        .expect("open");
    manager
        .insert_cell(InsertPosition::Append, CellKind::Prompt, "Q?")
        .expect("insert");
    let mut client = MockLlmClient::new(vec!["A.".to_owned()]);
    manager
        .execute_prompt(None, &mut client, "", 4096, false)
        .expect("prompt");

    manager.close_document(&name("dlg")).expect("close");
    assert!(manager.active_name().is_none());

    manager
        .open_document(name("dlg"), "dlg.ipynb", DocumentKind::Dialog, OpenMode::Connect)
        .expect("reconnect");
    let document = manager.active_document().expect("doc");
    assert_eq!(document.len(), 1);
    let cell = document.cell(0).expect("cell");
    assert_eq!(cell.source(), "Q?");
    assert_eq!(cell.output(), "A.");

    // History does not survive close/reopen.
    assert!(matches!(manager.undo(1), Err(ManagerError::NothingToUndo)));
}
