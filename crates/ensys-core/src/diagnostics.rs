//! Non-fatal issues found while building and compiling a system.
//!
//! A [`Diagnostics`] value is handed to each stage explicitly, so independent
//! pipeline runs never share state. Stages record issues here and also emit
//! `tracing` events.
//!
//! ```
//! use ensys_core::{Diagnostics, Stage};
//!
//! let mut diag = Diagnostics::new();
//! diag.warn(Stage::Compile, "bus has no attached flows").on("heat");
//! assert_eq!(diag.warnings().count(), 1);
//! assert_eq!(diag.summary(), "1 warning, 0 errors");
//! ```

use crate::error::Stage;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    /// Node or flow the issue refers to, e.g. `heat` or `pv -> electricity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestep: Option<usize>,
}

impl DiagnosticIssue {
    pub fn on(&mut self, entity: impl Into<String>) -> &mut Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn at(&mut self, t: usize) -> &mut Self {
        self.timestep = Some(t);
        self
    }
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} [{}]", severity, self.stage)?;
        if let Some(entity) = &self.entity {
            write!(f, " {}", entity)?;
        }
        if let Some(t) = self.timestep {
            write!(f, " (t={})", t)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, stage: Stage, message: String) -> &mut DiagnosticIssue {
        self.issues.push(DiagnosticIssue {
            severity,
            stage,
            message,
            entity: None,
            timestep: None,
        });
        let last = self.issues.len() - 1;
        &mut self.issues[last]
    }

    /// Record a warning; refine it with [`DiagnosticIssue::on`] and
    /// [`DiagnosticIssue::at`].
    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) -> &mut DiagnosticIssue {
        self.push(Severity::Warning, stage, message.into())
    }

    pub fn error(&mut self, stage: Stage, message: impl Into<String>) -> &mut DiagnosticIssue {
        self.push(Severity::Error, stage, message.into())
    }

    pub fn issues(&self) -> &[DiagnosticIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.with_severity(Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.with_severity(Severity::Error)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// e.g. "2 warnings, 1 error"
    pub fn summary(&self) -> String {
        fn plural(n: usize, word: &str) -> String {
            if n == 1 {
                format!("1 {}", word)
            } else {
                format!("{} {}s", n, word)
            }
        }
        format!(
            "{}, {}",
            plural(self.warnings().count(), "warning"),
            plural(self.errors().count(), "error")
        )
    }
}
