// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! LLM client interface for prompt cells.
//!
//! Like execution, the LLM is an external collaborator: the manager builds a
//! context from prior cells, asks the client for a reply and writes it back
//! through the history-tracked run-result update. Token budgeting is the
//! client's concern, not the manager's.

use std::fmt;

use crate::model::{Cell, CellKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl ContextMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            stop_reason: Some("end_turn".to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    Backend { message: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { message } => write!(f, "llm backend error: {message}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// Something that answers a prompt given conversation context.
pub trait LlmClient {
    fn chat(
        &mut self,
        messages: &[ContextMessage],
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError>;
}

/// Build LLM context from the cells preceding a prompt.
///
/// Skipped cells are excluded (skipping wins over pinning); everything else
/// is passed through in document order — pinning only matters to clients
/// that budget tokens, which this builder does not. Code cells carry their
/// source fenced plus any output; prompt cells contribute their question
/// and, if present, the earlier reply as an assistant turn.
pub fn build_context(cells: &[Cell], include_outputs: bool) -> Vec<ContextMessage> {
    let mut messages = Vec::new();

    for cell in cells {
        if cell.skipped() {
            continue;
        }
        match cell.kind() {
            CellKind::Code => {
                let mut content = format!("```python\n{}\n```", cell.source());
                if include_outputs && !cell.output().is_empty() {
                    content.push_str("\n\nOutput:\n");
                    content.push_str(cell.output());
                }
                messages.push(ContextMessage::user(content));
            }
            CellKind::Prompt => {
                messages.push(ContextMessage::user(cell.source().to_owned()));
                if include_outputs && !cell.output().is_empty() {
                    messages.push(ContextMessage::assistant(cell.output().to_owned()));
                }
            }
            CellKind::Note => {
                messages.push(ContextMessage::user(cell.source().to_owned()));
            }
            CellKind::Raw => {}
        }
    }

    messages
}

/// Mock client: hands out scripted responses in order, then a default, and
/// records every call for assertions.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Vec<String>,
    next: usize,
    default_response: String,
    calls: Vec<usize>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            next: 0,
            default_response: "Mock response".to_owned(),
            calls: Vec::new(),
        }
    }

    pub fn with_default_response(mut self, default_response: impl Into<String>) -> Self {
        self.default_response = default_response.into();
        self
    }

    /// Message counts of every call made, in order.
    pub fn calls(&self) -> &[usize] {
        &self.calls
    }
}

impl LlmClient for MockLlmClient {
    fn chat(
        &mut self,
        messages: &[ContextMessage],
        _system_prompt: &str,
        _max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        self.calls.push(messages.len());
        let content = match self.responses.get(self.next) {
            Some(content) => {
                self.next += 1;
                content.clone()
            }
            None => self.default_response.clone(),
        };
        Ok(LlmResponse::text(content))
    }
}
