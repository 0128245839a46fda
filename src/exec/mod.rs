// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Execution backend interface.
//!
//! The core never runs code itself. A backend turns source text into typed
//! output records; the manager writes the completed result into the cell
//! through the history-tracked run-result update.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One typed output produced by running a cell, shaped like an nbformat
/// output entry (`data` maps a mime type to its rendered content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum OutputRecord {
    Stream {
        name: String,
        text: String,
    },
    ExecuteResult {
        data: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_count: Option<u64>,
    },
    DisplayData {
        data: BTreeMap<String, String>,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl OutputRecord {
    pub fn stream(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Stream {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn execute_result_text(text: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert("text/plain".to_owned(), text.into());
        Self::ExecuteResult {
            data,
            execution_count: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    Timeout { seconds: u64 },
    Interrupted,
    Backend { message: String },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { seconds } => {
                write!(f, "execution timed out after {seconds} seconds")
            }
            Self::Interrupted => f.write_str("execution was interrupted"),
            Self::Backend { message } => write!(f, "execution backend error: {message}"),
        }
    }
}

impl std::error::Error for ExecError {}

/// Something that can run source text and report typed outputs.
pub trait ExecutionBackend {
    fn run(&mut self, source: &str, timeout: Duration) -> Result<Vec<OutputRecord>, ExecError>;

    /// Stop the current run, if any.
    fn interrupt(&mut self);

    /// Discard interpreter state.
    fn restart(&mut self);
}

/// Test backend: echoes each run back as a stdout stream record and keeps a
/// log of executed sources.
#[derive(Debug, Default)]
pub struct EchoBackend {
    runs: Vec<String>,
    interrupted: bool,
    restarts: usize,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &[String] {
        &self.runs
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }
}

impl ExecutionBackend for EchoBackend {
    fn run(&mut self, source: &str, _timeout: Duration) -> Result<Vec<OutputRecord>, ExecError> {
        if self.interrupted {
            self.interrupted = false;
            return Err(ExecError::Interrupted);
        }
        self.runs.push(source.to_owned());
        Ok(vec![OutputRecord::stream("stdout", source)])
    }

    fn interrupt(&mut self) {
        self.interrupted = true;
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.runs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{EchoBackend, ExecError, ExecutionBackend, OutputRecord};
    use std::time::Duration;

    #[test]
    fn output_records_serialize_in_nbformat_shape() {
        let record = OutputRecord::stream("stdout", "hello\n");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "output_type": "stream",
                "name": "stdout",
                "text": "hello\n",
            })
        );

        let roundtrip: OutputRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(roundtrip, record);
    }

    #[test]
    fn execute_result_text_carries_a_plain_mime_entry() {
        let record = OutputRecord::execute_result_text("42");
        let OutputRecord::ExecuteResult { data, execution_count } = &record else {
            panic!("expected execute_result");
        };
        assert_eq!(data.get("text/plain").map(String::as_str), Some("42"));
        assert_eq!(*execution_count, None);

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["output_type"], "execute_result");
    }

    #[test]
    fn error_record_roundtrips() {
        let record = OutputRecord::Error {
            ename: "ValueError".to_owned(),
            evalue: "bad value".to_owned(),
            traceback: vec!["Traceback (most recent call last):".to_owned()],
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let roundtrip: OutputRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(roundtrip, record);
    }

    #[test]
    fn echo_backend_logs_runs_and_honors_interrupt() {
        let mut backend = EchoBackend::new();
        let outputs = backend
            .run("print(1)", Duration::from_secs(5))
            .expect("run");
        assert_eq!(outputs, vec![OutputRecord::stream("stdout", "print(1)")]);
        assert_eq!(backend.runs(), ["print(1)"]);

        backend.interrupt();
        assert_eq!(
            backend.run("print(2)", Duration::from_secs(5)),
            Err(ExecError::Interrupted)
        );

        backend.restart();
        assert!(backend.runs().is_empty());
        assert_eq!(backend.restarts(), 1);
    }
}
