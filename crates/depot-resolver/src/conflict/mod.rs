//! Conflict resolution between candidate components of one module
//!
//! When the selectors of a module leave more than one candidate, a
//! [`ConflictResolution`] strategy decides which one is selected.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use depot_core::{DepotError, DepotResult, ModuleIdentifier, Version};

use crate::component::ComponentState;
use crate::selectors::{describe_versions, is_version_allowed_by_platform, SelectionCause, SelectionReason};

/// Strategy for choosing between several candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Highest version wins
    #[default]
    Latest,
    /// Fail on differing versions
    Strict,
    /// Project components win, otherwise the highest version
    PreferProjectModules,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::Latest => "latest",
            ConflictResolution::Strict => "strict",
            ConflictResolution::PreferProjectModules => "prefer-project-modules",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(ConflictResolution::Latest),
            "strict" => Ok(ConflictResolution::Strict),
            "prefer-project-modules" | "prefer-project" => {
                Ok(ConflictResolution::PreferProjectModules)
            },
            _ => Err(DepotError::config(
                "conflict-resolution",
                format!(
                    "unknown strategy '{}', expected one of: latest, strict, prefer-project-modules",
                    s
                ),
            )),
        }
    }
}

/// Picks one component out of several candidates
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    strategy: ConflictResolution,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictResolution) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ConflictResolution {
        self.strategy
    }

    /// Select the winning candidate for `module`
    pub fn select(
        &self,
        module: &ModuleIdentifier,
        candidates: &[Arc<ComponentState>],
    ) -> DepotResult<Arc<ComponentState>> {
        if candidates.is_empty() {
            return Err(DepotError::invalid_state(format!(
                "no candidates to choose from for {}",
                module
            )));
        }

        let selected = match self.strategy {
            ConflictResolution::Latest => select_latest(module, candidates)?,
            ConflictResolution::Strict => select_strict(module, candidates)?,
            ConflictResolution::PreferProjectModules => {
                match candidates.iter().find(|candidate| candidate.is_project()) {
                    Some(project) => Arc::clone(project),
                    None => select_latest(module, candidates)?,
                }
            },
        };

        let versions = versions(candidates);
        debug!(
            "Conflict on {} between {} resolved to {} ({})",
            module,
            versions.join(", "),
            selected.version(),
            self.strategy
        );
        selected.add_selection_reason(
            SelectionReason::new(SelectionCause::ConflictResolution)
                .with_description(describe_versions("between", &versions)),
        );
        Ok(selected)
    }
}

fn versions(candidates: &[Arc<ComponentState>]) -> Vec<String> {
    candidates.iter().map(|c| c.version().to_string()).collect()
}

fn select_latest(
    module: &ModuleIdentifier,
    candidates: &[Arc<ComponentState>],
) -> DepotResult<Arc<ComponentState>> {
    let eligible: Vec<&Arc<ComponentState>> = candidates
        .iter()
        .filter(|candidate| !candidate.is_rejected())
        .collect();
    if eligible.is_empty() {
        return Err(DepotError::AllCandidatesRejected {
            module: module.to_string(),
            versions: versions(candidates),
        });
    }

    let allowed: Vec<&Arc<ComponentState>> = eligible
        .iter()
        .copied()
        .filter(|candidate| is_version_allowed_by_platform(candidate))
        .collect();
    let pool = if allowed.is_empty() { eligible } else { allowed };

    let discarded: Vec<String> = candidates
        .iter()
        .filter(|candidate| !pool.iter().any(|kept| Arc::ptr_eq(kept, candidate)))
        .map(|candidate| candidate.version().to_string())
        .collect();

    let mut best = pool[0];
    let mut best_version = Version::parse(best.version());
    for candidate in &pool[1..] {
        let version = Version::parse(candidate.version());
        if version > best_version {
            best = *candidate;
            best_version = version;
        }
    }
    if !discarded.is_empty() {
        best.add_selection_reason(
            SelectionReason::new(SelectionCause::Rejection)
                .with_description(describe_versions("rejected", &discarded)),
        );
    }
    Ok(Arc::clone(best))
}

fn select_strict(
    module: &ModuleIdentifier,
    candidates: &[Arc<ComponentState>],
) -> DepotResult<Arc<ComponentState>> {
    let mut distinct: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !distinct.iter().any(|v| v == candidate.version()) {
            distinct.push(candidate.version().to_string());
        }
    }
    if distinct.len() > 1 {
        return Err(DepotError::VersionConflict {
            module: module.to_string(),
            versions: distinct,
        });
    }
    Ok(Arc::clone(&candidates[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VirtualPlatformState;
    use depot_core::ComponentIdentifier;

    fn lib() -> ModuleIdentifier {
        ModuleIdentifier::new("org", "lib")
    }

    fn candidate(version: &str) -> Arc<ComponentState> {
        Arc::new(ComponentState::new(
            ComponentIdentifier::module(lib(), version),
            lib().with_version(version),
        ))
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("latest".parse::<ConflictResolution>().unwrap(), ConflictResolution::Latest);
        assert_eq!("STRICT".parse::<ConflictResolution>().unwrap(), ConflictResolution::Strict);
        assert_eq!(
            "prefer-project-modules".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::PreferProjectModules
        );
        assert!("newest".parse::<ConflictResolution>().is_err());
        assert_eq!(ConflictResolution::default().to_string(), "latest");
    }

    #[test]
    fn test_latest_picks_highest() {
        let resolver = ConflictResolver::default();
        let selected = resolver
            .select(&lib(), &[candidate("1.5"), candidate("1.10"), candidate("1.9")])
            .unwrap();
        assert_eq!(selected.version(), "1.10");
    }

    #[test]
    fn test_latest_skips_rejected() {
        let rejected = candidate("2.0");
        rejected.reject();
        let selected = ConflictResolver::default()
            .select(&lib(), &[candidate("1.0"), rejected])
            .unwrap();
        assert_eq!(selected.version(), "1.0");
        let reasons = selected.selection_reasons();
        assert_eq!(reasons[0].describe(), "rejected version 2.0");
        assert_eq!(reasons[1].describe(), "between versions 1.0, 2.0");
    }

    #[test]
    fn test_latest_all_rejected() {
        let a = candidate("1.0");
        let b = candidate("2.0");
        a.reject();
        b.reject();
        assert!(matches!(
            ConflictResolver::default().select(&lib(), &[a, b]),
            Err(DepotError::AllCandidatesRejected { .. })
        ));
    }

    #[test]
    fn test_latest_respects_platform_ceiling() {
        let platform = Arc::new(VirtualPlatformState::new(ModuleIdentifier::new("org", "bom")));
        platform.force_version("1.0");
        let capped = |version: &str| {
            Arc::new(
                ComponentState::new(
                    ComponentIdentifier::module(lib(), version),
                    lib().with_version(version),
                )
                .with_platform_owner(Arc::clone(&platform)),
            )
        };

        let selected = ConflictResolver::default()
            .select(&lib(), &[capped("1.0"), capped("2.0")])
            .unwrap();
        assert_eq!(selected.version(), "1.0");
    }

    #[test]
    fn test_strict_conflict() {
        let resolver = ConflictResolver::new(ConflictResolution::Strict);
        match resolver.select(&lib(), &[candidate("1.0"), candidate("2.0")]) {
            Err(DepotError::VersionConflict { versions, .. }) => {
                assert_eq!(versions, vec!["1.0", "2.0"])
            },
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(resolver.select(&lib(), &[candidate("1.0"), candidate("1.0")]).is_ok());
    }

    #[test]
    fn test_prefer_project_modules() {
        let project = Arc::new(ComponentState::new(
            ComponentIdentifier::project(":", ":lib"),
            lib().with_version("0.1"),
        ));
        let resolver = ConflictResolver::new(ConflictResolution::PreferProjectModules);
        let selected = resolver
            .select(&lib(), &[candidate("5.0"), Arc::clone(&project)])
            .unwrap();
        assert!(selected.is_project());

        let selected = resolver.select(&lib(), &[candidate("1.0"), candidate("3.0")]).unwrap();
        assert_eq!(selected.version(), "3.0");
    }

    #[test]
    fn test_no_candidates() {
        assert!(ConflictResolver::default().select(&lib(), &[]).is_err());
    }
}
