//! depot.lock reading and writing
//!
//! One `group:name:version` line per locked module, sorted, followed by an
//! `empty=` line. Lines starting with `#` are comments.

use std::collections::BTreeMap;
use std::fmt;

use camino::Utf8Path;
use tracing::debug;

use depot_core::{
    ComponentMetadata, DependencyMetadata, DepotError, ModuleIdentifier, ModuleVersionIdentifier,
    VersionConstraint,
};
use depot_resolver::Resolution;

use crate::ConfigResult;

/// Default lock file name next to the manifest
pub const LOCK_FILE_NAME: &str = "depot.lock";

const HEADER: &str = "# This is a depot dependency lock file.\n\
# Manual edits can break the build and are not advised.\n\
# This file is expected to be part of source control.\n";

const EMPTY_MARKER: &str = "empty=";

/// Locked module versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFile {
    entries: BTreeMap<ModuleIdentifier, String>,
}

impl LockFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the module versions selected by a resolution
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let mut lock = Self::new();
        for module_version in resolution.module_versions() {
            lock.insert(module_version);
        }
        lock
    }

    pub fn insert(&mut self, module_version: ModuleVersionIdentifier) {
        self.entries.insert(module_version.module, module_version.version);
    }

    /// Locked version of `module`
    pub fn version(&self, module: &ModuleIdentifier) -> Option<&str> {
        self.entries.get(module).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locked entries, sorted by module
    pub fn entries(&self) -> impl Iterator<Item = ModuleVersionIdentifier> + '_ {
        self.entries
            .iter()
            .map(|(module, version)| module.with_version(version.clone()))
    }

    /// Parse lock file content
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let mut lock = Self::new();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(EMPTY_MARKER) {
                continue;
            }

            let line_number = index + 1;
            let mut parts = line.splitn(3, ':');
            let (Some(group), Some(name), Some(version)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(lock_error(line_number, format!("expected 'group:name:version', got '{}'", line)));
            };
            if group.is_empty() || name.is_empty() || version.is_empty() || version.contains(':') {
                return Err(lock_error(line_number, format!("expected 'group:name:version', got '{}'", line)));
            }

            let module = ModuleIdentifier::new(group, name);
            if let Some(existing) = lock.entries.get(&module) {
                if existing != version {
                    return Err(lock_error(
                        line_number,
                        format!("{} is locked to both {} and {}", module, existing, version),
                    ));
                }
            }
            lock.entries.insert(module, version.to_string());
        }
        Ok(lock)
    }

    /// Strict, from-lock constraints pinning every locked module
    pub fn dependencies(&self) -> Vec<DependencyMetadata> {
        self.entries
            .iter()
            .map(|(module, version)| {
                DependencyMetadata::module(module.clone(), VersionConstraint::strictly(version.clone()))
                    .locked()
                    .as_constraint()
                    .because("dependency locking")
            })
            .collect()
    }

    /// Add the lock constraints to the root component
    pub fn apply_to(&self, root: &mut ComponentMetadata) {
        root.dependencies.extend(self.dependencies());
    }

    /// Read a lock file; a missing file yields `None`
    pub async fn load(path: &Utf8Path) -> ConfigResult<Option<Self>> {
        if !path.exists() {
            debug!("No lock file at {}", path);
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DepotError::io(format!("Failed to read {}", path), e))?;
        let lock = Self::parse(&content)?;
        debug!("Loaded {} locked modules from {}", lock.len(), path);
        Ok(Some(lock))
    }

    /// Write the lock file
    pub async fn write(&self, path: &Utf8Path) -> ConfigResult<()> {
        tokio::fs::write(path, self.to_string())
            .await
            .map_err(|e| DepotError::io(format!("Failed to write {}", path), e))?;
        debug!("Wrote {} locked modules to {}", self.len(), path);
        Ok(())
    }
}

impl fmt::Display for LockFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(HEADER)?;
        for entry in self.entries() {
            writeln!(f, "{}", entry)?;
        }
        writeln!(f, "{}", EMPTY_MARKER)
    }
}

fn lock_error(line: usize, reason: String) -> DepotError {
    DepotError::LockFile { line, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use depot_resolver::{DependencyGraphBuilder, InMemoryRepository};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn module(name: &str) -> ModuleIdentifier {
        ModuleIdentifier::new("org", name)
    }

    #[test]
    fn test_parse_lock_file() {
        let content = "# comment\n\norg:b:2.0\norg:a:1.0\nempty=\n";
        let lock = LockFile::parse(content).unwrap();
        assert_eq!(lock.len(), 2);
        assert_eq!(lock.version(&module("a")), Some("1.0"));
        assert_eq!(lock.version(&module("b")), Some("2.0"));
    }

    #[test]
    fn test_render_sorted() {
        let mut lock = LockFile::new();
        lock.insert(module("b").with_version("2.0"));
        lock.insert(module("a").with_version("1.0"));

        let rendered = lock.to_string();
        assert!(rendered.starts_with("# This is a depot dependency lock file."));
        assert!(rendered.ends_with("org:a:1.0\norg:b:2.0\nempty=\n"));
        assert_eq!(LockFile::parse(&rendered).unwrap(), lock);
    }

    #[test]
    fn test_malformed_line() {
        match LockFile::parse("# header\norg:a\n") {
            Err(DepotError::LockFile { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected lock error, got {:?}", other),
        }
        assert!(LockFile::parse("org::1.0\n").is_err());
        assert!(LockFile::parse("org:a:1.0:extra\n").is_err());
    }

    #[test]
    fn test_conflicting_entries() {
        assert!(LockFile::parse("org:a:1.0\norg:a:1.0\n").is_ok());
        match LockFile::parse("org:a:1.0\norg:a:2.0\n") {
            Err(DepotError::LockFile { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("1.0 and 2.0"));
            },
            other => panic!("expected lock error, got {:?}", other),
        }
    }

    #[test]
    fn test_dependencies_are_strict_locked_constraints() {
        let lock = LockFile::parse("org:a:1.0\n").unwrap();
        let dependencies = lock.dependencies();
        assert_eq!(dependencies.len(), 1);

        let dependency = &dependencies[0];
        assert!(dependency.from_lock);
        assert!(dependency.constraint);
        assert_eq!(dependency.selector.constraint().unwrap().strict, "1.0");
    }

    #[test]
    fn test_lock_pins_resolution() {
        let repository = InMemoryRepository::new()
            .with_component(ComponentMetadata::new(module("a").with_version("1.0")))
            .with_component(ComponentMetadata::new(module("a").with_version("1.5")));
        let mut root = ComponentMetadata::project(":", ":", module("app").with_version("1.0"))
            .with_dependency(DependencyMetadata::requiring(module("a"), "1.+"));

        let builder = DependencyGraphBuilder::new(Arc::new(repository.clone()));
        let resolution = builder.resolve(&root).unwrap();
        assert_eq!(resolution.selected(&module("a")).unwrap().module_version.version, "1.5");

        let mut lock = LockFile::new();
        lock.insert(module("a").with_version("1.0"));
        lock.apply_to(&mut root);

        let resolution = DependencyGraphBuilder::new(Arc::new(repository)).resolve(&root).unwrap();
        assert_eq!(resolution.selected(&module("a")).unwrap().module_version.version, "1.0");
        assert_eq!(LockFile::from_resolution(&resolution), lock);
    }

    #[tokio::test]
    async fn test_write_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join(LOCK_FILE_NAME)).unwrap();

        assert!(LockFile::load(&path).await.unwrap().is_none());

        let mut lock = LockFile::new();
        lock.insert(module("a").with_version("1.0"));
        lock.write(&path).await.unwrap();

        let loaded = LockFile::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, lock);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_errors_point_at_a_real_line(content in "[a-z0-9:#=.\n ]{0,80}") {
            match LockFile::parse(&content) {
                Ok(lock) => prop_assert!(lock.len() <= content.lines().count()),
                Err(DepotError::LockFile { line, .. }) => {
                    prop_assert!(line >= 1 && line <= content.lines().count())
                },
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
