//! Text and JSON renderings of a ledger, with sensitive values masked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::errors::{AutoconfError, AutoconfResult};
use crate::ledger::ProvenanceLedger;
use crate::sensitive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticLine {
    pub source: String,
    pub key: String,
    pub value: String,
}

/// Summary of resolved keys for logs and structured output
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<DiagnosticLine>,
}

impl DiagnosticsReport {
    /// Build a report from every entry of `ledger` accepted by `filter`
    pub fn from_ledger<F>(title: impl Into<String>, ledger: &ProvenanceLedger, filter: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let entries = ledger
            .iter()
            .filter(|e| filter(&e.key))
            .map(|e| DiagnosticLine {
                source: e.source.to_string(),
                key: e.key.clone(),
                value: sensitive::masked(&e.key, &e.value).into_owned(),
            })
            .collect();

        Self {
            title: title.into(),
            generated_at: Utc::now(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per key, `    [source] key=value`, sources padded to equal width
    pub fn render_text(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|l| l.source.len() + 2)
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        out.push_str(&self.title);
        for line in &self.entries {
            let label = format!("[{}]", line.source);
            out.push_str(&format!("\n    {label:<width$} {}={}", line.key, line.value));
        }
        out
    }

    pub fn to_json(&self) -> AutoconfResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AutoconfError::Internal(format!("Failed to render diagnostics: {e}")))
    }

    /// Log the title and every line at info level
    pub fn log(&self) {
        if self.entries.is_empty() {
            return;
        }
        info!("{}", self.title);
        for line in &self.entries {
            info!("    [{}] {}={}", line.source, line.key, line.value);
        }
    }
}
