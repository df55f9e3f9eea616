//! Version selectors and resolved version constraints
//!
//! A version selector decides which candidate versions satisfy a declared
//! version string: exact versions, Maven/Ivy style ranges, `1.+` prefixes and
//! `latest.<status>` selectors. Rejections are expressed with inverse and
//! union selectors.

mod constraint;

pub use constraint::ResolvedVersionConstraint;

use std::fmt;

use depot_core::{DepotError, DepotResult, Status, Version};

/// Selects candidate versions for a declared version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Exactly one version
    Exact(Version),
    /// A bounded or half-open version range
    Range {
        lower: Option<Version>,
        lower_inclusive: bool,
        upper: Option<Version>,
        upper_inclusive: bool,
    },
    /// Every version starting with the prefix (`1.+`, or `+` for all)
    Prefix(String),
    /// Highest version with at least the given status
    Latest(Status),
    /// Accepts what the inner selector rejects
    Inverse(Box<VersionSelector>),
    /// Accepts what any of the inner selectors accepts
    Union(Vec<VersionSelector>),
}

impl VersionSelector {
    /// Parse a declared version string into a selector
    pub fn parse(input: &str) -> DepotResult<Self> {
        let selector = input.trim();
        if selector.is_empty() {
            return Err(invalid(input, "selector is empty"));
        }

        if selector.starts_with(['[', ']', '(']) {
            return parse_range(input, selector);
        }

        if let Some(status) = selector.strip_prefix("latest.") {
            return status
                .parse::<Status>()
                .map(VersionSelector::Latest)
                .map_err(|e| invalid(input, &e.to_string()));
        }

        if let Some(prefix) = selector.strip_suffix('+') {
            if prefix.contains(['[', ']', '(', ')', ',', '+']) {
                return Err(invalid(input, "unexpected character in prefix"));
            }
            return Ok(VersionSelector::Prefix(prefix.to_string()));
        }

        if selector.contains(['[', ']', '(', ')', ',']) {
            return Err(invalid(input, "unexpected range character"));
        }

        Ok(VersionSelector::Exact(Version::parse(selector)))
    }

    /// Check if more than one version could be accepted
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, VersionSelector::Exact(_))
    }

    /// Check if candidate metadata (status) is needed to decide acceptance
    pub fn requires_metadata(&self) -> bool {
        match self {
            VersionSelector::Latest(_) => true,
            VersionSelector::Inverse(inner) => inner.requires_metadata(),
            VersionSelector::Union(selectors) => selectors.iter().any(Self::requires_metadata),
            _ => false,
        }
    }

    /// Whether a version already selected for the module can be reused for
    /// this selector without resolving it again
    pub fn can_short_circuit(&self) -> bool {
        matches!(
            self,
            VersionSelector::Exact(_) | VersionSelector::Range { .. } | VersionSelector::Prefix(_)
        )
    }

    /// Check if this is a `latest.<status>` selector
    pub fn is_latest(&self) -> bool {
        matches!(self, VersionSelector::Latest(_))
    }

    /// Check a version string. `latest` selectors never accept on the
    /// version alone.
    pub fn accept(&self, candidate: &str) -> bool {
        match self {
            VersionSelector::Exact(version) => version.source() == candidate,
            VersionSelector::Range { .. } => self.accept_version(&Version::parse(candidate)),
            VersionSelector::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
            VersionSelector::Latest(_) => false,
            VersionSelector::Inverse(inner) => !inner.accept(candidate),
            VersionSelector::Union(selectors) => selectors.iter().any(|s| s.accept(candidate)),
        }
    }

    /// Check a parsed version
    pub fn accept_version(&self, candidate: &Version) -> bool {
        match self {
            VersionSelector::Range {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => {
                let above_lower = match lower {
                    Some(lower) if *lower_inclusive => candidate >= lower,
                    Some(lower) => candidate > lower,
                    None => true,
                };
                let below_upper = match upper {
                    Some(upper) if *upper_inclusive => candidate <= upper,
                    Some(upper) => candidate < upper,
                    None => true,
                };
                above_lower && below_upper
            },
            VersionSelector::Inverse(inner) => !inner.accept_version(candidate),
            VersionSelector::Union(selectors) => {
                selectors.iter().any(|s| s.accept_version(candidate))
            },
            _ => self.accept(candidate.source()),
        }
    }

    /// Check a version together with the status of the component
    pub fn accept_metadata(&self, candidate: &str, status: Status) -> bool {
        match self {
            VersionSelector::Latest(wanted) => status >= *wanted,
            VersionSelector::Inverse(inner) => !inner.accept_metadata(candidate, status),
            VersionSelector::Union(selectors) => {
                selectors.iter().any(|s| s.accept_metadata(candidate, status))
            },
            _ => self.accept(candidate),
        }
    }

    /// Selector rejecting every version a `strictly` declaration excludes.
    ///
    /// Only exact versions and ranges with an upper bound can be turned
    /// into a strict constraint.
    pub fn complement_for_rejection(&self) -> DepotResult<VersionSelector> {
        match self {
            VersionSelector::Exact(_) => Ok(VersionSelector::Inverse(Box::new(self.clone()))),
            VersionSelector::Range {
                upper: Some(upper),
                upper_inclusive,
                ..
            } => Ok(VersionSelector::Range {
                lower: Some(upper.clone()),
                lower_inclusive: !upper_inclusive,
                upper: None,
                upper_inclusive: false,
            }),
            _ => Err(DepotError::UnsupportedStrictVersion {
                selector: self.to_string(),
            }),
        }
    }

    /// Combine several selectors into one accepting any of them
    pub fn union(mut selectors: Vec<VersionSelector>) -> Option<VersionSelector> {
        match selectors.len() {
            0 => None,
            1 => selectors.pop(),
            _ => Some(VersionSelector::Union(selectors)),
        }
    }
}

fn invalid(selector: &str, reason: &str) -> DepotError {
    DepotError::InvalidVersionSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_range(input: &str, selector: &str) -> DepotResult<VersionSelector> {
    let lower_inclusive = selector.starts_with('[');
    let upper_inclusive = match selector.chars().last() {
        Some(']') => true,
        Some('[') | Some(')') => false,
        _ => return Err(invalid(input, "range is not closed")),
    };
    if selector.len() < 2 {
        return Err(invalid(input, "range is not closed"));
    }

    let body = &selector[1..selector.len() - 1];
    let (lower, upper) = match body.split_once(',') {
        Some((lower, upper)) => (lower.trim(), upper.trim()),
        // `[1.0]` pins a single version
        None if lower_inclusive && upper_inclusive && !body.trim().is_empty() => {
            (body.trim(), body.trim())
        },
        None => return Err(invalid(input, "range requires a comma")),
    };
    if upper.contains(',') {
        return Err(invalid(input, "range has more than two bounds"));
    }
    if lower.is_empty() && upper.is_empty() {
        return Err(invalid(input, "range has no bounds"));
    }

    let lower = (!lower.is_empty()).then(|| Version::parse(lower));
    let upper = (!upper.is_empty()).then(|| Version::parse(upper));
    if let (Some(lower), Some(upper)) = (&lower, &upper) {
        if lower > upper {
            return Err(invalid(input, "lower bound is greater than upper bound"));
        }
    }

    Ok(VersionSelector::Range {
        lower,
        lower_inclusive,
        upper,
        upper_inclusive,
    })
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Exact(version) => write!(f, "{}", version),
            VersionSelector::Range {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => {
                let open = if *lower_inclusive { '[' } else { '(' };
                let close = if *upper_inclusive { ']' } else { ')' };
                let lower = lower.as_ref().map(Version::source).unwrap_or_default();
                let upper = upper.as_ref().map(Version::source).unwrap_or_default();
                write!(f, "{}{},{}{}", open, lower, upper, close)
            },
            VersionSelector::Prefix(prefix) => write!(f, "{}+", prefix),
            VersionSelector::Latest(status) => write!(f, "latest.{}", status),
            VersionSelector::Inverse(inner) => write!(f, "!({})", inner),
            VersionSelector::Union(selectors) => {
                let parts: Vec<String> = selectors.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" | "))
            },
        }
    }
}
