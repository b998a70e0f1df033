//! Non-fatal model contradictions.
//!
//! Conventions report inconsistencies they resolve with a fixed tie-break here instead
//! of failing the build. Every entry is kept for inspection and mirrored to
//! `tracing::warn!`.

use std::collections::BTreeMap;
use std::fmt;

/// Kind of contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// Both reference navigations of a one-to-one are marked non-nullable.
    NonNullableReferenceOnBothNavigations,
    /// Both navigations of a one-to-one carry the required annotation.
    RequiredAttributeOnBothNavigations,
    /// A non-nullable principal-side navigation flipped the relationship.
    NonNullableInverted,
    /// A required principal-side navigation flipped the relationship.
    RequiredAttributeInverted,
    /// A non-nullable principal-side navigation could not flip a relationship whose
    /// principal end was set by a stronger source.
    NonNullableReferenceOnDependent,
    /// A required principal-side navigation could not flip a relationship whose
    /// principal end was set by a stronger source.
    RequiredAttributeOnDependent,
    /// More than one member on the target could be the inverse navigation.
    MultipleInverseCandidates,
    /// Collection navigations on both sides; skipped.
    ManyToManyNotSupported,
}

impl DiagnosticKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::NonNullableReferenceOnBothNavigations => {
                "non_nullable_reference_on_both_navigations"
            }
            DiagnosticKind::RequiredAttributeOnBothNavigations => {
                "required_attribute_on_both_navigations"
            }
            DiagnosticKind::NonNullableInverted => "non_nullable_inverted",
            DiagnosticKind::RequiredAttributeInverted => "required_attribute_inverted",
            DiagnosticKind::NonNullableReferenceOnDependent => "non_nullable_reference_on_dependent",
            DiagnosticKind::RequiredAttributeOnDependent => "required_attribute_on_dependent",
            DiagnosticKind::MultipleInverseCandidates => "multiple_inverse_candidates",
            DiagnosticKind::ManyToManyNotSupported => "many_to_many_not_supported",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded contradiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Collects contradictions for one model build.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a contradiction and log it.
    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = kind.as_str(), "{}", message);
        self.entries.push(Diagnostic { kind, message });
    }

    /// Record a contradiction unless an identical one is already present. Returns
    /// whether it was recorded.
    pub fn record_once(&mut self, kind: DiagnosticKind, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.entries.iter().any(|d| d.kind == kind && d.message == message) {
            return false;
        }
        self.record(kind, message);
        true
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Entry counts per kind.
    pub fn summary(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut summary = BTreeMap::new();
        for entry in &self.entries {
            *summary.entry(entry.kind).or_insert(0) += 1;
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_summary() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.record(DiagnosticKind::ManyToManyNotSupported, "Post.Tags <-> Tag.Posts");
        diagnostics.record(DiagnosticKind::ManyToManyNotSupported, "A.Bs <-> B.As");
        diagnostics.record(DiagnosticKind::NonNullableInverted, "Blog.Head");

        assert_eq!(diagnostics.count(DiagnosticKind::ManyToManyNotSupported), 2);
        assert_eq!(diagnostics.summary().len(), 2);
        assert_eq!(diagnostics.entries()[2].message, "Blog.Head");
    }

    #[test]
    fn test_record_once_skips_duplicates() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.record_once(DiagnosticKind::MultipleInverseCandidates, "Post.Author"));
        assert!(!diagnostics.record_once(DiagnosticKind::MultipleInverseCandidates, "Post.Author"));
        assert!(diagnostics.record_once(DiagnosticKind::NonNullableInverted, "Post.Author"));
        assert_eq!(diagnostics.len(), 2);
    }
}
