use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::PolicyRegistry;
use crate::store::{PolicyStore, Result};

/// Reloads the registry whenever the store's file changes.
///
/// Parse and validation failures are logged; the previous set stays live.
/// Dropping the watcher stops it.
pub struct PolicyWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl PolicyWatcher {
    pub fn start(
        registry: Arc<PolicyRegistry>,
        store: Arc<dyn PolicyStore>,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let path = path.into();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    handle_fs_event(&event, &target, &registry, store.as_ref());
                }
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        // The file is replaced by rename, so watch its directory.
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "watching policy store for changes");
        Ok(Self { path, _watcher: watcher })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether an event path refers to the watched file.
fn is_target(path: &Path, target: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    // Dotfiles include our own `.tmp` siblings.
    if name.starts_with('.') || name.ends_with(".tmp") {
        return false;
    }
    target.file_name().and_then(|n| n.to_str()) == Some(name)
}

pub(super) fn handle_fs_event(
    event: &Event,
    target: &Path,
    registry: &PolicyRegistry,
    store: &dyn PolicyStore,
) -> bool {
    if !event.paths.iter().any(|p| is_target(p, target)) {
        return false;
    }

    match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any)
        | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any) => {
            match registry.reload(store) {
                Ok(set) => {
                    info!(path = %target.display(), count = set.len(), "hot-reloaded policy set");
                    true
                }
                Err(e) => {
                    warn!(
                        path = %target.display(),
                        error = %e,
                        "failed to reload policies, keeping previous set"
                    );
                    false
                }
            }
        }
        EventKind::Remove(_) => {
            warn!(path = %target.display(), "policy store removed, keeping previous set");
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Level;
    use crate::store::FileStore;
    use notify::event::{DataChange, RemoveKind};

    fn setup() -> (tempfile::TempDir, FileStore, PolicyRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("policies.yml"));
        let registry = PolicyRegistry::open(&store).unwrap();
        (dir, store, registry)
    }

    fn modified(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
    }

    #[test]
    fn modify_event_reloads() {
        let (_dir, store, registry) = setup();
        let mut policies = store.read().unwrap();
        policies.iter_mut().find(|p| p.id == "OPE.DROP.001").unwrap().level = Level::Fatal;
        store.write(&policies).unwrap();

        assert!(handle_fs_event(&modified(store.path().to_path_buf()), store.path(), &registry, &store));
        assert_eq!(registry.snapshot().get("OPE.DROP.001").unwrap().level, Level::Fatal);
    }

    #[test]
    fn invalid_document_keeps_previous_set() {
        let (_dir, store, registry) = setup();
        let before = registry.snapshot();
        std::fs::write(store.path(), "policies:\n  - id: broken\n").unwrap();

        assert!(!handle_fs_event(&modified(store.path().to_path_buf()), store.path(), &registry, &store));
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[test]
    fn unrelated_paths_are_ignored() {
        let (dir, store, registry) = setup();
        for name in [".policies.yml.tmp", "other.yml"] {
            let event = modified(dir.path().join(name));
            assert!(!handle_fs_event(&event, store.path(), &registry, &store));
        }
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(store.path().to_path_buf());
        assert!(!handle_fs_event(&removed, store.path(), &registry, &store));
    }

    #[test]
    fn watcher_starts_on_store_directory() {
        let (_dir, store, registry) = setup();
        let path = store.path().to_path_buf();
        let watcher = PolicyWatcher::start(Arc::new(registry), Arc::new(store), path.clone()).unwrap();
        assert_eq!(watcher.path(), path.as_path());
    }
}
