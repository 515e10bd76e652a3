//! Observable record of recoverable failures.
//!
//! # Responsibility
//! - Collect every degraded-but-handled condition so hosts and tests can
//!   assert on failure paths without crashes.
//! - Mirror each condition to the `log` facade as a metadata-only event.
//!
//! # Invariants
//! - Recording a diagnostic never fails and never panics.

use crate::model::record::ObjectId;
use crate::scene::path::ContainerPath;
use log::warn;
use std::fmt::{Display, Formatter};

/// Category of a recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    ResolutionFailure,
    MalformedRecord,
    MissingIdentity,
    StoreUnavailable,
}

/// One recoverable condition observed by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A saved container path did not resolve; the object went to `fallback`.
    ResolutionFailure {
        id: ObjectId,
        path: ContainerPath,
        fallback: ContainerPath,
    },
    /// A stored record could not be decoded and was skipped.
    MalformedRecord { index: usize, reason: String },
    /// An operation referenced an identity that is not tracked.
    MissingIdentity {
        id: ObjectId,
        operation: &'static str,
    },
    /// The key-value store failed; state is kept for this session only.
    StoreUnavailable {
        operation: &'static str,
        message: String,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::ResolutionFailure { .. } => DiagnosticKind::ResolutionFailure,
            Self::MalformedRecord { .. } => DiagnosticKind::MalformedRecord,
            Self::MissingIdentity { .. } => DiagnosticKind::MissingIdentity,
            Self::StoreUnavailable { .. } => DiagnosticKind::StoreUnavailable,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolutionFailure { id, path, fallback } => write!(
                f,
                "event=resolve_container module=placement status=fallback object_id={id} path={path} fallback={fallback}"
            ),
            Self::MalformedRecord { index, reason } => write!(
                f,
                "event=decode_record module=codec status=skipped index={index} reason={reason}"
            ),
            Self::MissingIdentity { id, operation } => write!(
                f,
                "event={operation} module=scene status=noop error_code=missing_identity object_id={id}"
            ),
            Self::StoreUnavailable { operation, message } => write!(
                f,
                "event={operation} module=persist status=degraded error_code=store_unavailable error={message}"
            ),
        }
    }
}

/// Append-only diagnostic log owned by one scene scope.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind() == kind)
            .count()
    }

    /// Returns and clears collected entries.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
