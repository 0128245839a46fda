// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{
    generate_cell_id, Cell, CellId, CellKind, Document, DocumentKind, DocumentName,
};

/// Divides a prompt cell's user content from the model reply in serialized
/// form. The hex token makes accidental collisions with user text unlikely.
const SEPARATOR_REGEX: &str = "##### Reply<!-- TRITON_SEPARATOR_[a-f0-9]+ -->";

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SEPARATOR_REGEX).expect("separator regex compiles"))
}

fn generate_separator() -> String {
    format!(
        "##### Reply<!-- TRITON_SEPARATOR_{:08x} -->",
        rand::random::<u32>()
    )
}

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidRelativePath {
        value: PathBuf,
    },
    SymlinkRefused {
        path: PathBuf,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
            Self::InvalidRelativePath { value } => {
                write!(f, "path {value:?} must be relative and stay inside the root")
            }
            Self::SymlinkRefused { path } => {
                write!(f, "refusing to write through symlink at {path:?}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDurability {
    /// Atomic rename without fsync.
    #[default]
    BestEffort,
    /// Atomic rename plus fsync of file and (on unix) parent directory.
    Durable,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntryInfo {
    pub path: String,
    pub kind: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirListing {
    pub total: usize,
    pub start_index: usize,
    pub entries: Vec<DirEntryInfo>,
}

/// Reads and writes documents under a root directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    durability: WriteDurability,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability: WriteDurability::BestEffort,
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user-supplied relative path against the root, rejecting
    /// absolute paths and any traversal outside the root.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let relative = relative.as_ref();
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::InvalidRelativePath {
                        value: relative.to_path_buf(),
                    });
                }
            }
        }
        if depth == 0 {
            return Err(StoreError::InvalidRelativePath {
                value: relative.to_path_buf(),
            });
        }

        Ok(resolved)
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> Result<bool, StoreError> {
        Ok(self.resolve(relative)?.is_file())
    }

    pub fn load_document(
        &self,
        name: DocumentName,
        relative: impl AsRef<Path>,
        kind: DocumentKind,
    ) -> Result<Document, StoreError> {
        let path = self.resolve(relative)?;
        let contents = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: RawNotebook =
            serde_json::from_str(&contents).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;

        let mut document = raw_to_document(name, kind, &raw);
        document.set_path(Some(path));
        Ok(document)
    }

    /// Write a document back to its path. Documents without a backing path
    /// are in-memory only; saving them is a no-op.
    pub fn save_document(&self, document: &Document) -> Result<(), StoreError> {
        let Some(path) = document.path() else {
            return Ok(());
        };

        let raw = document_to_raw(document);
        let mut json =
            serde_json::to_string_pretty(&raw).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        json.push('\n');

        write_atomic(path, json.as_bytes(), self.durability)
    }

    /// Create an empty document file and return the in-memory document
    /// pointing at it.
    pub fn create_document(
        &self,
        name: DocumentName,
        relative: impl AsRef<Path>,
        kind: DocumentKind,
    ) -> Result<Document, StoreError> {
        let path = self.resolve(relative)?;
        let mut document = Document::new(name, kind);
        document.set_path(Some(path));
        self.save_document(&document)?;
        Ok(document)
    }

    /// List files and directories under `relative` (empty string for the
    /// root), recursing at most `max_depth` levels (clamped to 3). `pattern`
    /// filters by substring match on the relative path; `limit` of 0 means
    /// no limit. Entries are sorted by path.
    pub fn list_dir(
        &self,
        relative: &str,
        max_depth: usize,
        pattern: &str,
        start_index: usize,
        limit: usize,
    ) -> Result<DirListing, StoreError> {
        let start_path = if relative.is_empty() {
            self.root.clone()
        } else {
            self.resolve(relative)?
        };
        let max_depth = max_depth.clamp(1, 3);

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&start_path)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(Result::ok)
        {
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel.to_string_lossy().into_owned();
            if !pattern.is_empty() && !rel.contains(pattern) {
                continue;
            }

            let info = match entry.metadata() {
                Ok(metadata) => {
                    let kind = if metadata.is_dir() {
                        "directory"
                    } else if entry.path().extension().is_some_and(|ext| ext == "ipynb") {
                        "notebook"
                    } else {
                        "file"
                    };
                    let size = metadata.is_file().then(|| metadata.len());
                    let modified = metadata.modified().ok().map(format_modified);
                    DirEntryInfo {
                        path: rel,
                        kind: kind.to_owned(),
                        size,
                        modified,
                    }
                }
                Err(_) => DirEntryInfo {
                    path: rel,
                    kind: "error".to_owned(),
                    size: None,
                    modified: None,
                },
            };
            entries.push(info);
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let total = entries.len();
        let end = if limit > 0 {
            (start_index + limit).min(total)
        } else {
            total
        };
        let entries = if start_index < total {
            entries[start_index..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(DirListing {
            total,
            start_index,
            entries,
        })
    }
}

fn format_modified(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct RawNotebook {
    #[serde(default)]
    cells: Vec<RawCell>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    5
}

#[derive(Debug, Serialize, Deserialize)]
struct RawCell {
    cell_type: String,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    source: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_count: Option<u64>,
}

fn document_to_raw(document: &Document) -> RawNotebook {
    let cells = document.cells().iter().map(cell_to_raw).collect();

    let mut metadata = Map::new();
    metadata.insert(
        "triton_dialog_mode".to_owned(),
        Value::String(document.mode().to_owned()),
    );
    metadata.insert("triton_ver".to_owned(), Value::from(document.version()));
    metadata.insert(
        "kernelspec".to_owned(),
        serde_json::json!({
            "display_name": "Python 3",
            "language": "python",
            "name": "python3",
        }),
    );
    metadata.insert(
        "language_info".to_owned(),
        serde_json::json!({ "name": "python" }),
    );

    RawNotebook {
        cells,
        metadata,
        nbformat: 4,
        nbformat_minor: 5,
    }
}

fn raw_to_document(name: DocumentName, kind: DocumentKind, raw: &RawNotebook) -> Document {
    let mut document = Document::new(name, kind);

    let mode = raw
        .metadata
        .get("triton_dialog_mode")
        .and_then(Value::as_str)
        .unwrap_or("default");
    document.set_mode(mode);
    let version = raw
        .metadata
        .get("triton_ver")
        .and_then(Value::as_u64)
        .unwrap_or(2);
    document.set_version(version as u32);

    for raw_cell in &raw.cells {
        let cell = raw_to_cell(raw_cell);
        // Ids must stay unique within a document; a colliding or missing id
        // on disk gets a fresh one.
        if document.contains_cell_id(cell.cell_id()) {
            let mut replacement =
                Cell::with_id(generate_cell_id(), cell.kind(), cell.source());
            copy_cell_state(&cell, &mut replacement);
            document.cells_mut().push(replacement);
        } else {
            document.cells_mut().push(cell);
        }
    }

    let last_id = document.cells().last().map(|cell| cell.cell_id().clone());
    document.set_current_cell_id(last_id);

    document
}

fn copy_cell_state(from: &Cell, to: &mut Cell) {
    to.set_output(from.output());
    to.set_time_run(from.time_run().map(str::to_owned));
    to.set_exported(from.exported());
    to.set_skipped(from.skipped());
    to.set_pinned(from.pinned());
    to.set_input_collapsed(from.input_collapsed());
    to.set_output_collapsed(from.output_collapsed());
    to.set_heading_collapsed(from.heading_collapsed());
    to.set_use_thinking(from.use_thinking());
    to.set_execution_count(from.execution_count());
}

fn cell_to_raw(cell: &Cell) -> RawCell {
    let mut metadata = Map::new();
    metadata.insert(
        "id".to_owned(),
        Value::String(cell.cell_id().as_str().trim_start_matches('_').to_owned()),
    );

    match cell.kind() {
        CellKind::Code => {
            if let Some(time_run) = cell.time_run() {
                metadata.insert("time_run".to_owned(), Value::String(time_run.to_owned()));
            }
            set_flag(&mut metadata, "exported", cell.exported());
            set_flag(&mut metadata, "skipped", cell.skipped());
            set_flag(&mut metadata, "pinned", cell.pinned());
            set_flag(&mut metadata, "input_collapsed", cell.input_collapsed());
            set_flag(&mut metadata, "output_collapsed", cell.output_collapsed());

            let outputs = if cell.output().is_empty() {
                Value::Array(Vec::new())
            } else {
                serde_json::from_str(cell.output()).unwrap_or_else(|_| Value::Array(Vec::new()))
            };

            RawCell {
                cell_type: "code".to_owned(),
                metadata,
                source: source_lines(cell.source()),
                outputs: Some(outputs),
                execution_count: cell.execution_count(),
            }
        }
        CellKind::Prompt => {
            metadata.insert("triton_ai".to_owned(), Value::Bool(true));
            set_flag(&mut metadata, "use_thinking", cell.use_thinking());
            if let Some(time_run) = cell.time_run() {
                metadata.insert("time_run".to_owned(), Value::String(time_run.to_owned()));
            }
            set_flag(&mut metadata, "collapsed", cell.heading_collapsed());
            set_flag(&mut metadata, "pinned", cell.pinned());
            set_flag(&mut metadata, "skipped", cell.skipped());

            let mut text = cell.source().to_owned();
            if !cell.output().is_empty() {
                text.push_str("\n\n");
                text.push_str(&generate_separator());
                text.push_str("\n\n");
                text.push_str(cell.output());
            }

            RawCell {
                cell_type: "markdown".to_owned(),
                metadata,
                source: source_lines(&text),
                outputs: None,
                execution_count: None,
            }
        }
        CellKind::Note => {
            set_flag(&mut metadata, "collapsed", cell.heading_collapsed());
            set_flag(&mut metadata, "pinned", cell.pinned());
            set_flag(&mut metadata, "skipped", cell.skipped());

            RawCell {
                cell_type: "markdown".to_owned(),
                metadata,
                source: source_lines(cell.source()),
                outputs: None,
                execution_count: None,
            }
        }
        CellKind::Raw => RawCell {
            cell_type: "raw".to_owned(),
            metadata,
            source: source_lines(cell.source()),
            outputs: None,
            execution_count: None,
        },
    }
}

fn raw_to_cell(raw: &RawCell) -> Cell {
    let source = source_text(&raw.source);
    let cell_id = cell_id_from_metadata(&raw.metadata);

    match raw.cell_type.as_str() {
        "code" => {
            let mut cell = Cell::with_id(cell_id, CellKind::Code, source);
            let output = match &raw.outputs {
                Some(Value::Array(outputs)) if outputs.is_empty() => String::new(),
                Some(outputs) => serde_json::to_string(outputs).unwrap_or_default(),
                None => String::new(),
            };
            cell.set_output(output);
            cell.set_time_run(metadata_string(&raw.metadata, "time_run"));
            cell.set_exported(metadata_flag(&raw.metadata, "exported"));
            cell.set_skipped(metadata_flag(&raw.metadata, "skipped"));
            cell.set_pinned(metadata_flag(&raw.metadata, "pinned"));
            cell.set_input_collapsed(metadata_flag(&raw.metadata, "input_collapsed"));
            cell.set_output_collapsed(metadata_flag(&raw.metadata, "output_collapsed"));
            cell.set_execution_count(raw.execution_count);
            cell
        }
        "markdown" => {
            if metadata_flag(&raw.metadata, "triton_ai") {
                let (content, output) = split_prompt_source(&source);
                let mut cell = Cell::with_id(cell_id, CellKind::Prompt, content);
                cell.set_output(output);
                cell.set_use_thinking(metadata_flag(&raw.metadata, "use_thinking"));
                cell.set_time_run(metadata_string(&raw.metadata, "time_run"));
                cell.set_heading_collapsed(metadata_flag(&raw.metadata, "collapsed"));
                cell.set_pinned(metadata_flag(&raw.metadata, "pinned"));
                cell.set_skipped(metadata_flag(&raw.metadata, "skipped"));
                cell
            } else {
                let mut cell = Cell::with_id(cell_id, CellKind::Note, source);
                cell.set_heading_collapsed(metadata_flag(&raw.metadata, "collapsed"));
                cell.set_pinned(metadata_flag(&raw.metadata, "pinned"));
                cell.set_skipped(metadata_flag(&raw.metadata, "skipped"));
                cell
            }
        }
        // Unknown cell types load as raw so nothing on disk is dropped.
        _ => Cell::with_id(cell_id, CellKind::Raw, source),
    }
}

fn split_prompt_source(source: &str) -> (String, String) {
    match separator_pattern().find(source) {
        Some(found) => {
            let content = source[..found.start()].trim().to_owned();
            let output = source[found.end()..].trim().to_owned();
            (content, output)
        }
        None => (source.trim().to_owned(), String::new()),
    }
}

fn cell_id_from_metadata(metadata: &Map<String, Value>) -> CellId {
    let Some(raw) = metadata.get("id").and_then(Value::as_str) else {
        return generate_cell_id();
    };
    let prefixed = if raw.starts_with('_') {
        raw.to_owned()
    } else {
        format!("_{raw}")
    };
    CellId::new(prefixed).unwrap_or_else(|_| generate_cell_id())
}

fn metadata_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Flags on disk may be booleans or 0/1 integers.
fn metadata_flag(metadata: &Map<String, Value>, key: &str) -> bool {
    match metadata.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn set_flag(metadata: &mut Map<String, Value>, key: &str, value: bool) {
    if value {
        metadata.insert(key.to_owned(), Value::Bool(true));
    }
}

/// nbformat stores source as a list of lines, each but the last keeping its
/// trailing newline.
fn source_lines(text: &str) -> Value {
    if text.is_empty() {
        return Value::Array(Vec::new());
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i + 1 < lines.len() {
            out.push(Value::String(format!("{line}\n")));
        } else {
            out.push(Value::String((*line).to_owned()));
        }
    }
    Value::Array(out)
}

fn source_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .concat(),
        _ => String::new(),
    }
}

fn write_atomic(path: &Path, contents: &[u8], durability: WriteDurability) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no parent"),
        });
    };
    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            return Err(StoreError::SymlinkRefused {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    let Some(file_name) = path.file_name() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no file name"),
        });
    };

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".triton.tmp.{}.{}",
        file_name.to_string_lossy(),
        nanos
    ));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;

    file.write_all(contents).map_err(|source| StoreError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    if durability == WriteDurability::Durable {
        file.sync_all().map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
    }
    drop(file);

    if let Err(source) = rename_overwrite(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            let dir = fs::File::open(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            dir.sync_all().map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

#[cfg(not(windows))]
fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

#[cfg(windows)]
fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    match fs::remove_file(to) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::rename(from, to)
}
