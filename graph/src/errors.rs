use std::fmt;

use colored::Colorize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} failed due to {1} errors")]
    AggregatedErrors(String, usize),
    /// First issue encountered when no diagnostics sink was supplied.
    #[error("{0}")]
    GraphValidity(Diagnostic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One structured validity issue, suitable for display in an editor's
/// issue list as well as on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Short label, e.g. "Infinite feedback loop".
    pub summary: String,
    /// Plain-language explanation shown to the user.
    pub detail: String,
    /// Names of the offending nodes, in deterministic order.
    pub nodes: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (involving {}): {}", self.summary, self.nodes.join(", "), self.detail)
    }
}

// in future we can add a `warnings` field, too.
pub struct Errors {
    diags: Vec<Diagnostic>,
}

impl Default for Errors {
    fn default() -> Self {
        Self {
            // ideally we won't have any,
            // and we don't mind reallocating if we're already in an error state:
            diags: Vec::with_capacity(0),
        }
    }
}

impl Errors {
    pub fn add(&mut self, diag: Diagnostic) {
        log::trace!("diagnostic: {diag}");
        self.diags.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diags.iter()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diags
    }

    /// The first error-severity diagnostic, for callers that abort on it.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diags.iter().find(|d| d.severity == Severity::Error)
    }

    /// Print full list of diagnostics to stderr, fail w/ an aggregated error
    /// if there were one or more errors.
    pub fn print_recap(&self, label: &str) -> Result<(), Error> {
        if self.diags.is_empty() {
            Ok(())
        } else {
            eprintln!("\nEncountered issues while {label}:\n");
            for d in &self.diags {
                let tag = match d.severity {
                    Severity::Error => "ERROR".red(),
                    Severity::Warning => "WARNING".yellow(),
                };
                eprintln!("{tag}: {d}\n");
            }
            if self.has_errors() {
                Err(Error::AggregatedErrors(label.to_owned(), self.len()))
            } else {
                Ok(())
            }
        }
    }
}
