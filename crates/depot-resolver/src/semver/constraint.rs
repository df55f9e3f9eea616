//! Declared version constraints turned into selectors.

use depot_core::{DepotResult, VersionConstraint};

use super::VersionSelector;

/// A [`VersionConstraint`] with every version string parsed into a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersionConstraint {
    required: Option<VersionSelector>,
    preferred: Option<VersionSelector>,
    rejected: Option<VersionSelector>,
    strict: bool,
    reject_all: bool,
}

impl ResolvedVersionConstraint {
    /// Parse the declared constraint.
    ///
    /// A strict version takes the place of the required version, and its
    /// complement is added to the rejected versions.
    pub fn new(constraint: &VersionConstraint) -> DepotResult<Self> {
        let strict = !constraint.strict.is_empty();
        let version = if strict {
            &constraint.strict
        } else {
            &constraint.required
        };

        let required = parse_optional(version)?;
        let preferred = parse_optional(&constraint.preferred)?;

        let mut rejects = Vec::with_capacity(constraint.rejected.len() + 1);
        if strict {
            if let Some(required) = &required {
                rejects.push(required.complement_for_rejection()?);
            }
        }
        for rejected in &constraint.rejected {
            rejects.push(VersionSelector::parse(rejected)?);
        }

        let reject_all = version.is_empty()
            && constraint.rejected.len() == 1
            && constraint.rejected[0] == "+";

        Ok(Self {
            required,
            preferred,
            rejected: VersionSelector::union(rejects),
            strict,
            reject_all,
        })
    }

    /// Selector for the required (or strict) version
    pub fn required_selector(&self) -> Option<&VersionSelector> {
        self.required.as_ref()
    }

    /// Selector for the preferred version
    pub fn preferred_selector(&self) -> Option<&VersionSelector> {
        self.preferred.as_ref()
    }

    /// Selector accepting every rejected version
    pub fn rejected_selector(&self) -> Option<&VersionSelector> {
        self.rejected.as_ref()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// No version required and every version rejected
    pub fn is_reject_all(&self) -> bool {
        self.reject_all
    }
}

fn parse_optional(version: &str) -> DepotResult<Option<VersionSelector>> {
    if version.is_empty() {
        Ok(None)
    } else {
        VersionSelector::parse(version).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::DepotError;

    #[test]
    fn test_required_only() {
        let resolved = ResolvedVersionConstraint::new(&VersionConstraint::required("1.0")).unwrap();
        assert_eq!(resolved.required_selector().unwrap().to_string(), "1.0");
        assert!(resolved.preferred_selector().is_none());
        assert!(resolved.rejected_selector().is_none());
        assert!(!resolved.is_strict());
    }

    #[test]
    fn test_empty_constraint() {
        let resolved = ResolvedVersionConstraint::new(&VersionConstraint::default()).unwrap();
        assert!(resolved.required_selector().is_none());
        assert!(!resolved.is_reject_all());
    }

    #[test]
    fn test_strict_adds_complement() {
        let constraint = VersionConstraint::strictly("[1.0,2.0)").reject("1.5");
        let resolved = ResolvedVersionConstraint::new(&constraint).unwrap();
        assert!(resolved.is_strict());

        let rejected = resolved.rejected_selector().unwrap();
        assert!(rejected.accept("1.5"));
        assert!(rejected.accept("2.0"));
        assert!(!rejected.accept("1.4"));
    }

    #[test]
    fn test_strict_dynamic_is_unsupported() {
        let error = ResolvedVersionConstraint::new(&VersionConstraint::strictly("1.+")).unwrap_err();
        assert!(matches!(error, DepotError::UnsupportedStrictVersion { .. }));
    }

    #[test]
    fn test_reject_all() {
        let constraint = VersionConstraint::default().reject("+");
        assert!(ResolvedVersionConstraint::new(&constraint).unwrap().is_reject_all());

        let with_version = VersionConstraint::required("1.0").reject("+");
        assert!(!ResolvedVersionConstraint::new(&with_version).unwrap().is_reject_all());
    }

    #[test]
    fn test_preferred() {
        let resolved = ResolvedVersionConstraint::new(&VersionConstraint::preferred("1.2")).unwrap();
        assert!(resolved.required_selector().is_none());
        assert_eq!(resolved.preferred_selector().unwrap().to_string(), "1.2");
    }
}
