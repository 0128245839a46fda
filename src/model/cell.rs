// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use super::ids::{generate_cell_id, CellId};

/// The kind of a cell.
///
/// Notebook persistence maps `Note` to markdown; `Prompt` is markdown with a
/// reply separator between the user text and the model output; anything
/// unrecognized loads as `Raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Code,
    Note,
    Prompt,
    Raw,
}

impl CellKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Note => "note",
            Self::Prompt => "prompt",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCellKindError {
    value: String,
}

impl ParseCellKindError {
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ParseCellKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown cell kind '{}' (expected 'code', 'note', 'prompt' or 'raw')",
            self.value
        )
    }
}

impl std::error::Error for ParseCellKindError {}

impl FromStr for CellKind {
    type Err = ParseCellKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "note" => Ok(Self::Note),
            "prompt" => Ok(Self::Prompt),
            "raw" => Ok(Self::Raw),
            other => Err(ParseCellKindError {
                value: other.to_owned(),
            }),
        }
    }
}

/// The closed set of updatable cell fields.
///
/// Field updates go through an exhaustive match instead of reflection-style
/// attribute access; `RunResult` is the compound output-plus-timestamp field
/// written after a code or prompt run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellField {
    Source,
    Output,
    TimeRun,
    Exported,
    Skipped,
    Pinned,
    InputCollapsed,
    OutputCollapsed,
    HeadingCollapsed,
    UseThinking,
    RunResult,
}

impl CellField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Output => "output",
            Self::TimeRun => "time_run",
            Self::Exported => "exported",
            Self::Skipped => "skipped",
            Self::Pinned => "pinned",
            Self::InputCollapsed => "input_collapsed",
            Self::OutputCollapsed => "output_collapsed",
            Self::HeadingCollapsed => "heading_collapsed",
            Self::UseThinking => "use_thinking",
            Self::RunResult => "run_result",
        }
    }
}

impl fmt::Display for CellField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCellFieldError {
    value: String,
}

impl ParseCellFieldError {
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ParseCellFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cell field '{}'", self.value)
    }
}

impl std::error::Error for ParseCellFieldError {}

impl FromStr for CellField {
    type Err = ParseCellFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Self::Source),
            "output" => Ok(Self::Output),
            "time_run" => Ok(Self::TimeRun),
            "exported" => Ok(Self::Exported),
            "skipped" => Ok(Self::Skipped),
            "pinned" => Ok(Self::Pinned),
            "input_collapsed" => Ok(Self::InputCollapsed),
            "output_collapsed" => Ok(Self::OutputCollapsed),
            "heading_collapsed" => Ok(Self::HeadingCollapsed),
            "use_thinking" => Ok(Self::UseThinking),
            "run_result" => Ok(Self::RunResult),
            other => Err(ParseCellFieldError {
                value: other.to_owned(),
            }),
        }
    }
}

/// A typed cell field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    OptionalText(Option<String>),
    Flag(bool),
    RunResult {
        output: String,
        time_run: Option<String>,
    },
}

impl CellValue {
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::OptionalText(_) => "optional text",
            Self::Flag(_) => "flag",
            Self::RunResult { .. } => "run result",
        }
    }
}

/// A field was written with a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValueMismatch {
    field: CellField,
    expected: &'static str,
    found: &'static str,
}

impl FieldValueMismatch {
    pub fn field(&self) -> CellField {
        self.field
    }
}

impl fmt::Display for FieldValueMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cell field '{}' takes a {} value, got {}",
            self.field, self.expected, self.found
        )
    }
}

impl std::error::Error for FieldValueMismatch {}

/// One addressable unit in a document.
///
/// The id is assigned at creation and immutable for the cell's lifetime;
/// everything else is mutable through the typed field surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    cell_id: CellId,
    kind: CellKind,
    source: String,
    output: String,
    time_run: Option<String>,
    exported: bool,
    skipped: bool,
    pinned: bool,
    input_collapsed: bool,
    output_collapsed: bool,
    heading_collapsed: bool,
    use_thinking: bool,
    execution_count: Option<u64>,
}

impl Cell {
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self::with_id(generate_cell_id(), kind, source)
    }

    pub fn with_id(cell_id: CellId, kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            cell_id,
            kind,
            source: source.into(),
            output: String::new(),
            time_run: None,
            exported: false,
            skipped: false,
            pinned: false,
            input_collapsed: false,
            output_collapsed: false,
            heading_collapsed: false,
            use_thinking: false,
            execution_count: None,
        }
    }

    pub fn cell_id(&self) -> &CellId {
        &self.cell_id
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn set_output(&mut self, output: impl Into<String>) {
        self.output = output.into();
    }

    pub fn time_run(&self) -> Option<&str> {
        self.time_run.as_deref()
    }

    pub fn set_time_run(&mut self, time_run: Option<String>) {
        self.time_run = time_run;
    }

    pub fn exported(&self) -> bool {
        self.exported
    }

    pub fn set_exported(&mut self, exported: bool) {
        self.exported = exported;
    }

    pub fn skipped(&self) -> bool {
        self.skipped
    }

    pub fn set_skipped(&mut self, skipped: bool) {
        self.skipped = skipped;
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    pub fn input_collapsed(&self) -> bool {
        self.input_collapsed
    }

    pub fn set_input_collapsed(&mut self, input_collapsed: bool) {
        self.input_collapsed = input_collapsed;
    }

    pub fn output_collapsed(&self) -> bool {
        self.output_collapsed
    }

    pub fn set_output_collapsed(&mut self, output_collapsed: bool) {
        self.output_collapsed = output_collapsed;
    }

    pub fn heading_collapsed(&self) -> bool {
        self.heading_collapsed
    }

    pub fn set_heading_collapsed(&mut self, heading_collapsed: bool) {
        self.heading_collapsed = heading_collapsed;
    }

    pub fn use_thinking(&self) -> bool {
        self.use_thinking
    }

    pub fn set_use_thinking(&mut self, use_thinking: bool) {
        self.use_thinking = use_thinking;
    }

    pub fn execution_count(&self) -> Option<u64> {
        self.execution_count
    }

    pub fn set_execution_count(&mut self, execution_count: Option<u64>) {
        self.execution_count = execution_count;
    }

    /// First line of the source, truncated, for listings.
    pub fn first_line(&self, max_chars: usize) -> String {
        let line = self.source.lines().next().unwrap_or("");
        if line.is_empty() {
            return "(empty)".to_owned();
        }
        line.chars().take(max_chars).collect()
    }

    /// Read the current value of a field.
    pub fn field(&self, field: CellField) -> CellValue {
        match field {
            CellField::Source => CellValue::Text(self.source.clone()),
            CellField::Output => CellValue::Text(self.output.clone()),
            CellField::TimeRun => CellValue::OptionalText(self.time_run.clone()),
            CellField::Exported => CellValue::Flag(self.exported),
            CellField::Skipped => CellValue::Flag(self.skipped),
            CellField::Pinned => CellValue::Flag(self.pinned),
            CellField::InputCollapsed => CellValue::Flag(self.input_collapsed),
            CellField::OutputCollapsed => CellValue::Flag(self.output_collapsed),
            CellField::HeadingCollapsed => CellValue::Flag(self.heading_collapsed),
            CellField::UseThinking => CellValue::Flag(self.use_thinking),
            CellField::RunResult => CellValue::RunResult {
                output: self.output.clone(),
                time_run: self.time_run.clone(),
            },
        }
    }

    /// Write a field, rejecting values of the wrong shape.
    pub fn set_field(
        &mut self,
        field: CellField,
        value: &CellValue,
    ) -> Result<(), FieldValueMismatch> {
        match (field, value) {
            (CellField::Source, CellValue::Text(text)) => {
                self.source = text.clone();
                Ok(())
            }
            (CellField::Output, CellValue::Text(text)) => {
                self.output = text.clone();
                Ok(())
            }
            (CellField::TimeRun, CellValue::OptionalText(text)) => {
                self.time_run = text.clone();
                Ok(())
            }
            (CellField::Exported, CellValue::Flag(flag)) => {
                self.exported = *flag;
                Ok(())
            }
            (CellField::Skipped, CellValue::Flag(flag)) => {
                self.skipped = *flag;
                Ok(())
            }
            (CellField::Pinned, CellValue::Flag(flag)) => {
                self.pinned = *flag;
                Ok(())
            }
            (CellField::InputCollapsed, CellValue::Flag(flag)) => {
                self.input_collapsed = *flag;
                Ok(())
            }
            (CellField::OutputCollapsed, CellValue::Flag(flag)) => {
                self.output_collapsed = *flag;
                Ok(())
            }
            (CellField::HeadingCollapsed, CellValue::Flag(flag)) => {
                self.heading_collapsed = *flag;
                Ok(())
            }
            (CellField::UseThinking, CellValue::Flag(flag)) => {
                self.use_thinking = *flag;
                Ok(())
            }
            (CellField::RunResult, CellValue::RunResult { output, time_run }) => {
                self.output = output.clone();
                self.time_run = time_run.clone();
                Ok(())
            }
            (field, value) => Err(FieldValueMismatch {
                field,
                expected: expected_shape(field),
                found: value.type_label(),
            }),
        }
    }
}

fn expected_shape(field: CellField) -> &'static str {
    match field {
        CellField::Source | CellField::Output => "text",
        CellField::TimeRun => "optional text",
        CellField::RunResult => "run result",
        _ => "flag",
    }
}
