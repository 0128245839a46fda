// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::*;
use crate::store::DocumentStore;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TempDir {
    path: std::path::PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("triton-mcp-{prefix}-{}-{nanos}-{counter}", std::process::id()));
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

fn mcp_server(prefix: &str) -> (TempDir, TritonMcp) {
    let tmp = TempDir::new(prefix);
    let manager = DocumentManager::new(DocumentStore::new(tmp.path()));
    (tmp, TritonMcp::new(manager))
}

async fn open_notebook(mcp: &TritonMcp, name: &str, path: &str) {
    mcp.document_open(Parameters(DocumentOpenParams {
        name: name.to_owned(),
        path: path.to_owned(),
        kind: None,
        mode: Some("create".to_owned()),
    }))
    .await
    .expect("open document");
}

async fn insert(mcp: &TritonMcp, index: Option<i64>, kind: &str, source: &str) -> CellInsertResponse {
    mcp.cell_insert(Parameters(CellInsertParams {
        index,
        kind: Some(kind.to_owned()),
        source: source.to_owned(),
    }))
    .await
    .expect("insert cell")
    .0
}

async fn read_sources(mcp: &TritonMcp) -> Vec<String> {
    let response = mcp
        .document_read(Parameters(DocumentReadParams {
            name: None,
            start_index: None,
            limit: Some(0),
        }))
        .await
        .expect("read document")
        .0;
    response.cells.into_iter().map(|cell| cell.first_line).collect()
}

#[tokio::test]
async fn document_lifecycle_via_tools() {
    let (_tmp, mcp) = mcp_server("lifecycle");

    let empty = mcp.document_list().await.expect("list").0;
    assert!(empty.documents.is_empty());
    assert!(empty.active_document.is_none());

    open_notebook(&mcp, "a", "a.ipynb").await;
    open_notebook(&mcp, "b", "b.ipynb").await;

    let listed = mcp.document_list().await.expect("list").0;
    assert_eq!(listed.documents.len(), 2);
    assert_eq!(listed.active_document.as_deref(), Some("b"));

    mcp.document_activate(Parameters(DocumentActivateParams {
        name: "a".to_owned(),
    }))
    .await
    .expect("activate");

    let closed = mcp
        .document_close(Parameters(DocumentCloseParams {
            name: "a".to_owned(),
        }))
        .await
        .expect("close")
        .0;
    assert_eq!(closed.active_document.as_deref(), Some("b"));

    let err = mcp
        .document_open(Parameters(DocumentOpenParams {
            name: "b".to_owned(),
            path: "other.ipynb".to_owned(),
            kind: None,
            mode: Some("create".to_owned()),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("already in use"));

    let err = mcp
        .document_activate(Parameters(DocumentActivateParams {
            name: "ghost".to_owned(),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("not found"));
}

#[tokio::test]
async fn mutations_require_an_open_document() {
    let (_tmp, mcp) = mcp_server("no-active");

    let err = mcp
        .cell_insert(Parameters(CellInsertParams {
            index: None,
            kind: None,
            source: "x".to_owned(),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("no active document"));
}

#[tokio::test]
async fn insert_appends_marks_context_and_persists() {
    let (tmp, mcp) = mcp_server("insert");
    open_notebook(&mcp, "nb", "nb.ipynb").await;

    let first = insert(&mcp, None, "code", "a = 1").await;
    assert_eq!(first.index, 0);
    assert!(first.persist_error.is_none());

    let second = insert(&mcp, Some(0), "note", "# intro").await;
    assert_eq!(second.index, 0);
    assert!(second
        .context
        .iter()
        .any(|line| line.starts_with("[0] note") && line.ends_with(">>> NEW <<<")));

    assert_eq!(read_sources(&mcp).await, ["# intro", "a = 1"]);

    // Appending with a negative index works like the original sentinel.
    let appended = insert(&mcp, Some(-1), "code", "b = 2").await;
    assert_eq!(appended.index, 2);

    // The file on disk tracks every mutation.
    let on_disk = std::fs::read_to_string(tmp.path().join("nb.ipynb")).expect("read file");
    assert!(on_disk.contains("b = 2"));

    let err = mcp
        .cell_insert(Parameters(CellInsertParams {
            index: Some(99),
            kind: None,
            source: "x".to_owned(),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("out of range"));
}

#[tokio::test]
async fn delete_by_id_and_index_then_undo() {
    let (_tmp, mcp) = mcp_server("delete");
    open_notebook(&mcp, "nb", "nb.ipynb").await;

    insert(&mcp, None, "code", "a").await;
    let b = insert(&mcp, None, "code", "b").await;
    insert(&mcp, None, "code", "c").await;

    let deleted = mcp
        .cell_delete(Parameters(CellDeleteParams {
            indices: Some(vec![0]),
            cell_ids: Some(vec![b.cell_id.clone()]),
        }))
        .await
        .expect("delete")
        .0;
    assert_eq!(deleted.removed, 2);
    assert_eq!(read_sources(&mcp).await, ["c"]);

    let undone = mcp
        .history_undo(Parameters(HistoryStepsParams { steps: None }))
        .await
        .expect("undo")
        .0;
    assert_eq!(undone.results.len(), 1);
    assert_eq!(read_sources(&mcp).await, ["a", "b", "c"]);

    let err = mcp
        .cell_delete(Parameters(CellDeleteParams {
            indices: None,
            cell_ids: None,
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("indices and/or cell_ids"));

    let err = mcp
        .cell_delete(Parameters(CellDeleteParams {
            indices: None,
            cell_ids: Some(vec!["_deadbeef".to_owned()]),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("not found"));
}

#[tokio::test]
async fn update_parses_typed_values_and_rejects_bad_shapes() {
    let (_tmp, mcp) = mcp_server("update");
    open_notebook(&mcp, "nb", "nb.ipynb").await;
    let cell = insert(&mcp, None, "code", "x = 1").await;

    mcp.cell_update(Parameters(CellUpdateParams {
        index: None,
        cell_id: Some(cell.cell_id.clone()),
        field: "pinned".to_owned(),
        value: serde_json::json!(true),
    }))
    .await
    .expect("update pinned");

    mcp.cell_update(Parameters(CellUpdateParams {
        index: Some(0),
        cell_id: None,
        field: "run_result".to_owned(),
        value: serde_json::json!({"output": "[]", "time_run": "9:00:00am"}),
    }))
    .await
    .expect("update run result");

    let read = mcp
        .cell_read(Parameters(CellReadParams {
            index: Some(0),
            cell_id: None,
            include_outputs: Some(false),
        }))
        .await
        .expect("read cell")
        .0;
    assert!(read.pinned);
    assert_eq!(read.time_run.as_deref(), Some("9:00:00am"));

    let err = mcp
        .cell_update(Parameters(CellUpdateParams {
            index: Some(0),
            cell_id: None,
            field: "idx_".to_owned(),
            value: serde_json::json!(1),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("unknown cell field"));

    let err = mcp
        .cell_update(Parameters(CellUpdateParams {
            index: Some(0),
            cell_id: None,
            field: "pinned".to_owned(),
            value: serde_json::json!("yes"),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("takes a boolean"));

    let err = mcp
        .cell_update(Parameters(CellUpdateParams {
            index: Some(0),
            cell_id: Some(cell.cell_id),
            field: "pinned".to_owned(),
            value: serde_json::json!(true),
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("not both"));
}

#[tokio::test]
async fn move_swap_reorder_and_batched_history() {
    let (_tmp, mcp) = mcp_server("structure");
    open_notebook(&mcp, "nb", "nb.ipynb").await;
    for source in ["A", "B", "C"] {
        insert(&mcp, None, "code", source).await;
    }

    insert(&mcp, Some(1), "code", "X").await;
    assert_eq!(read_sources(&mcp).await, ["A", "X", "B", "C"]);

    let moved = mcp
        .cell_move(Parameters(CellMoveParams {
            from_index: 3,
            to_index: 0,
        }))
        .await
        .expect("move")
        .0;
    assert!(moved.moved);
    assert_eq!(read_sources(&mcp).await, ["C", "A", "X", "B"]);

    mcp.history_undo(Parameters(HistoryStepsParams { steps: Some(1) }))
        .await
        .expect("undo move");
    assert_eq!(read_sources(&mcp).await, ["A", "X", "B", "C"]);

    mcp.history_undo(Parameters(HistoryStepsParams { steps: Some(1) }))
        .await
        .expect("undo insert");
    assert_eq!(read_sources(&mcp).await, ["A", "B", "C"]);

    let redone = mcp
        .history_redo(Parameters(HistoryStepsParams { steps: Some(2) }))
        .await
        .expect("redo both")
        .0;
    assert_eq!(redone.results.len(), 2);
    assert_eq!(read_sources(&mcp).await, ["C", "A", "X", "B"]);

    let swapped = mcp
        .cell_swap(Parameters(CellSwapParams { first: 0, second: 3 }))
        .await
        .expect("swap")
        .0;
    assert!(swapped.swapped);
    assert_eq!(read_sources(&mcp).await, ["B", "A", "X", "C"]);

    let err = mcp
        .cell_reorder(Parameters(CellReorderParams {
            new_order: vec![0, 1],
        }))
        .await
        .err().unwrap();
    assert!(err.message.contains("invalid order"));

    mcp.cell_reorder(Parameters(CellReorderParams {
        new_order: vec![3, 2, 1, 0],
    }))
    .await
    .expect("reorder");
    assert_eq!(read_sources(&mcp).await, ["C", "X", "A", "B"]);

    // A new mutation cleared the redo stack earlier; after the swap and
    // reorder, redo has nothing.
    let err = mcp
        .history_redo(Parameters(HistoryStepsParams { steps: Some(1) }))
        .await
        .err().unwrap();
    assert!(err.message.contains("nothing to redo"));
}

#[tokio::test]
async fn history_get_and_clear() {
    let (_tmp, mcp) = mcp_server("history");
    open_notebook(&mcp, "nb", "nb.ipynb").await;
    for source in ["a", "b"] {
        insert(&mcp, None, "code", source).await;
    }

    let summary = mcp.history_get().await.expect("history get").0;
    assert_eq!(summary.undo_count, 2);
    assert_eq!(summary.redo_count, 0);
    assert!(summary.can_undo);
    assert_eq!(summary.recent.len(), 2);
    assert!(summary.recent[0].starts_with("Insert code cell"));

    mcp.history_clear().await.expect("clear");
    let summary = mcp.history_get().await.expect("history get").0;
    assert_eq!(summary.undo_count, 0);

    let err = mcp
        .history_undo(Parameters(HistoryStepsParams { steps: None }))
        .await
        .err().unwrap();
    assert!(err.message.contains("nothing to undo"));
}

#[tokio::test]
async fn cell_read_renders_typed_outputs_and_validates_images() {
    let (_tmp, mcp) = mcp_server("outputs");
    open_notebook(&mcp, "nb", "nb.ipynb").await;
    let cell = insert(&mcp, None, "code", "plot()").await;

    let output_json = serde_json::json!([
        {"output_type": "stream", "name": "stdout", "text": "drawing\n"},
        {"output_type": "display_data", "data": {"image/png": "aGVsbG8="}},
        {"output_type": "display_data", "data": {"image/png": "!!not-base64!!"}},
        {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": ["t1", "t2"]},
    ])
    .to_string();

    mcp.cell_update(Parameters(CellUpdateParams {
        index: Some(0),
        cell_id: None,
        field: "output".to_owned(),
        value: serde_json::json!(output_json),
    }))
    .await
    .expect("set output");

    let read = mcp
        .cell_read(Parameters(CellReadParams {
            index: None,
            cell_id: Some(cell.cell_id),
            include_outputs: Some(true),
        }))
        .await
        .expect("read")
        .0;
    assert_eq!(read.outputs.len(), 4);
    assert!(matches!(
        &read.outputs[0],
        McpOutput::Text { text } if text == "[stdout]\ndrawing\n"
    ));
    assert!(matches!(
        &read.outputs[1],
        McpOutput::Image { format, data } if format == "png" && data == "aGVsbG8="
    ));
    assert!(matches!(
        &read.outputs[2],
        McpOutput::Error { ename, .. } if ename == "InvalidImagePayload"
    ));
    assert!(matches!(
        &read.outputs[3],
        McpOutput::Error { ename, text, .. } if ename == "ValueError" && text == "t1\nt2"
    ));

    // Non-JSON output (a prompt reply) comes back as plain text.
    insert(&mcp, None, "prompt", "Q?").await;
    mcp.cell_update(Parameters(CellUpdateParams {
        index: Some(1),
        cell_id: None,
        field: "output".to_owned(),
        value: serde_json::json!("Just markdown."),
    }))
    .await
    .expect("set prompt output");
    let read = mcp
        .cell_read(Parameters(CellReadParams {
            index: Some(1),
            cell_id: None,
            include_outputs: Some(true),
        }))
        .await
        .expect("read prompt")
        .0;
    assert!(matches!(
        &read.outputs[0],
        McpOutput::Text { text } if text == "Just markdown."
    ));
}

#[tokio::test]
async fn files_list_reports_notebooks_under_the_root() {
    let (tmp, mcp) = mcp_server("files");
    open_notebook(&mcp, "nb", "sub/nb.ipynb").await;
    std::fs::write(tmp.path().join("notes.txt"), "hi").expect("write");

    let listing = mcp
        .files_list(Parameters(FilesListParams {
            path: None,
            max_depth: Some(2),
            pattern: None,
            start_index: None,
            limit: None,
        }))
        .await
        .expect("list files")
        .0;

    let find = |path: &str| {
        listing
            .entries
            .iter()
            .find(|entry| entry.path == path)
            .unwrap_or_else(|| panic!("missing entry {path}"))
    };
    assert_eq!(find("sub/nb.ipynb").kind, "notebook");
    assert_eq!(find("notes.txt").kind, "file");
    assert_eq!(find("sub").kind, "directory");

    let filtered = mcp
        .files_list(Parameters(FilesListParams {
            path: None,
            max_depth: Some(2),
            pattern: Some(".ipynb".to_owned()),
            start_index: None,
            limit: None,
        }))
        .await
        .expect("filtered")
        .0;
    assert_eq!(filtered.total, 1);
}
