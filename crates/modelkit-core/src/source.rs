//! Configuration source precedence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who established a fact in the model.
///
/// Ordered `Convention < DataAnnotation < Explicit`. A fact may only be replaced by a
/// source that is at least as strong as the one that set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationSource {
    /// Inferred by a convention.
    Convention,
    /// Read from an annotation on the runtime type.
    DataAnnotation,
    /// Requested through the builder API.
    Explicit,
}

impl ConfigurationSource {
    /// Whether a fact set by `existing` may be replaced by `self`.
    ///
    /// An absent fact can always be set.
    #[must_use]
    pub fn overrides(self, existing: Option<Self>) -> bool {
        existing.is_none_or(|existing| self >= existing)
    }

    /// Whether `self` is strictly stronger than `existing`.
    #[must_use]
    pub fn overrides_strictly(self, existing: Option<Self>) -> bool {
        existing.is_none_or(|existing| self > existing)
    }

    /// The stronger of `self` and `other`. Sources are upgraded, never downgraded.
    #[must_use]
    pub fn max_with(self, other: Option<Self>) -> Self {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigurationSource::Convention => "convention",
            ConfigurationSource::DataAnnotation => "data_annotation",
            ConfigurationSource::Explicit => "explicit",
        }
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigurationSource::{Convention, DataAnnotation, Explicit};

    #[test]
    fn test_total_order() {
        assert!(Convention < DataAnnotation);
        assert!(DataAnnotation < Explicit);
    }

    #[test]
    fn test_overrides() {
        assert!(Convention.overrides(None));
        assert!(Convention.overrides(Some(Convention)));
        assert!(!Convention.overrides(Some(DataAnnotation)));
        assert!(Explicit.overrides(Some(DataAnnotation)));
        assert!(!DataAnnotation.overrides_strictly(Some(DataAnnotation)));
        assert!(Explicit.overrides_strictly(Some(DataAnnotation)));
    }

    #[test]
    fn test_max_with_never_downgrades() {
        assert_eq!(Convention.max_with(Some(Explicit)), Explicit);
        assert_eq!(Explicit.max_with(Some(Convention)), Explicit);
        assert_eq!(DataAnnotation.max_with(None), DataAnnotation);
    }
}
