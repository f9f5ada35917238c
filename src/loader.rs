//! Runtime discovery of plugin modules supplying extra vertex/edge/solver kinds.
//!
//! [`ModuleRegistry`] is an explicit registry object owned by the graph or the
//! application factory; there is no process-wide global state. Loading is
//! deliberately forgiving: each call enumerates the matching files once, skips
//! filenames that are already open, logs and skips individual open failures,
//! and never fails the whole batch because one candidate is bad. Every opened
//! handle is released when the registry is dropped.
//!
//! The dlopen mechanics sit behind the [`ModuleBackend`] seam so the loading
//! policy can be driven in tests (or replaced entirely) without real shared
//! objects; [`DynamicBackend`] is the production implementation on top of
//! `libloading`.

use crate::error::{GraphError, GraphResult};
use glob::Pattern;
use libloading::Library;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Mechanism that turns a module path into an open handle.
pub trait ModuleBackend {
    /// Handle type kept alive for as long as the module must stay loaded.
    type Handle;

    /// Open the module at `path`. Failures are reported per-module and do not
    /// abort a batch load.
    fn open(&self, path: &Path) -> GraphResult<Self::Handle>;
}

/// Production backend: opens shared libraries through `libloading`.
#[derive(Debug, Default)]
pub struct DynamicBackend;

impl ModuleBackend for DynamicBackend {
    type Handle = Library;

    fn open(&self, path: &Path) -> GraphResult<Library> {
        // Loading runs arbitrary initialization code from the library.
        unsafe { Library::new(path) }
            .map_err(|err| GraphError::ModuleLoad(format!("{}: {err}", path.display())))
    }
}

/// One successfully opened module.
struct LoadedModule<H> {
    path: PathBuf,
    // Held only to keep the module resident; dropped on registry teardown.
    _handle: H,
}

/// Registry of dynamically loaded modules.
///
/// # Example
/// ```no_run
/// use hypergraph_solver::loader::ModuleRegistry;
/// use std::path::Path;
///
/// let mut registry = ModuleRegistry::new();
/// let loaded = registry
///     .load_directory(Path::new("/usr/lib/hypergraph-plugins"), "*.so")
///     .unwrap();
/// tracing::info!("{loaded} plugin modules loaded");
/// ```
pub struct ModuleRegistry<B: ModuleBackend = DynamicBackend> {
    backend: B,
    modules: Vec<LoadedModule<B::Handle>>,
}

impl ModuleRegistry<DynamicBackend> {
    /// Registry with the production `libloading` backend.
    pub fn new() -> Self {
        Self::with_backend(DynamicBackend)
    }
}

impl Default for ModuleRegistry<DynamicBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ModuleBackend> ModuleRegistry<B> {
    /// Registry with a custom backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            modules: Vec::new(),
        }
    }

    /// Number of open modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Whether the module at `path` is already open.
    pub fn is_open(&self, path: &Path) -> bool {
        self.modules.iter().any(|module| module.path == path)
    }

    /// Paths of all open modules, in load order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.modules.iter().map(|module| module.path.as_path())
    }

    /// Close every open module. Equivalent to dropping the registry, but keeps
    /// it usable for further loads.
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    /// Load every file in `directory` whose name matches `pattern`.
    ///
    /// An empty pattern matches all entries; otherwise glob semantics apply to
    /// the file name (e.g. `"*.so"`). Files already open by name are skipped,
    /// and a module that fails to open is logged and skipped without aborting
    /// the rest of the batch. Enumeration order is sorted so repeated calls are
    /// deterministic.
    ///
    /// Returns the number of newly opened modules; an identical second call
    /// returns 0.
    pub fn load_directory(&mut self, directory: &Path, pattern: &str) -> GraphResult<usize> {
        info!(
            "loading modules from {} (pattern: {})",
            directory.display(),
            if pattern.is_empty() { "*" } else { pattern }
        );
        let matcher = if pattern.is_empty() {
            None
        } else {
            Some(Pattern::new(pattern).map_err(|err| {
                GraphError::InvalidInput(format!("bad module pattern {pattern:?}: {err}"))
            })?)
        };

        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = match (&matcher, path.file_name().and_then(|name| name.to_str())) {
                (None, _) => true,
                (Some(matcher), Some(name)) => matcher.matches(name),
                (Some(_), None) => false,
            };
            if matches {
                candidates.push(path);
            }
        }
        candidates.sort();

        let mut newly_loaded = 0;
        for path in candidates {
            if self.is_open(&path) {
                debug!("module {} already open, skipping", path.display());
                continue;
            }
            match self.backend.open(&path) {
                Ok(handle) => {
                    debug!("loaded module {}", path.display());
                    self.modules.push(LoadedModule {
                        path,
                        _handle: handle,
                    });
                    newly_loaded += 1;
                }
                Err(err) => {
                    warn!("skipping module that failed to open: {err}");
                }
            }
        }
        Ok(newly_loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs::File;
    use tempfile::TempDir;

    /// Backend that records every open attempt and fails on request.
    struct RecordingBackend {
        opened: RefCell<Vec<PathBuf>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                opened: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(name: &'static str) -> Self {
            Self {
                opened: RefCell::new(Vec::new()),
                fail_on: Some(name),
            }
        }
    }

    impl ModuleBackend for RecordingBackend {
        type Handle = ();

        fn open(&self, path: &Path) -> GraphResult<()> {
            if let Some(bad) = self.fail_on {
                if path.file_name().and_then(|name| name.to_str()) == Some(bad) {
                    return Err(GraphError::ModuleLoad(format!(
                        "{}: not a loadable module",
                        path.display()
                    )));
                }
            }
            self.opened.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn populated_dir(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            File::create(dir.path().join(name)).unwrap();
        }
        dir
    }

    #[test]
    fn test_pattern_loads_matching_files_once() {
        let dir = populated_dir(&["a.so", "b.so", "readme.txt"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::new());

        let first = registry.load_directory(dir.path(), "*.so").unwrap();
        assert_eq!(first, 2);
        assert_eq!(registry.len(), 2);

        // identical second call opens nothing new
        let second = registry.load_directory(dir.path(), "*.so").unwrap();
        assert_eq!(second, 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.backend.opened.borrow().len(), 2);
    }

    #[test]
    fn test_empty_pattern_matches_all_entries() {
        let dir = populated_dir(&["a.so", "readme.txt"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::new());
        assert_eq!(registry.load_directory(dir.path(), "").unwrap(), 2);
    }

    #[test]
    fn test_one_bad_module_does_not_abort_batch() {
        crate::logger::init_logger();
        let dir = populated_dir(&["a.so", "broken.so", "c.so"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::failing_on("broken.so"));

        let loaded = registry.load_directory(dir.path(), "*.so").unwrap();
        assert_eq!(loaded, 2);
        assert!(!registry.is_open(&dir.path().join("broken.so")));
        assert!(registry.is_open(&dir.path().join("a.so")));
        assert!(registry.is_open(&dir.path().join("c.so")));
    }

    #[test]
    fn test_failed_module_retried_on_next_call() {
        let dir = populated_dir(&["flaky.so"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::failing_on("flaky.so"));
        assert_eq!(registry.load_directory(dir.path(), "*.so").unwrap(), 0);

        // failure did not poison the filename bookkeeping
        registry.backend.fail_on = None;
        assert_eq!(registry.load_directory(dir.path(), "*.so").unwrap(), 1);
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let dir = populated_dir(&["a.so"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::new());
        assert!(registry.load_directory(dir.path(), "[").is_err());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::new());
        let result = registry.load_directory(Path::new("/nonexistent/plugins"), "*.so");
        assert!(matches!(result, Err(GraphError::Io(_))));
    }

    #[test]
    fn test_clear_releases_modules() {
        let dir = populated_dir(&["a.so"]);
        let mut registry = ModuleRegistry::with_backend(RecordingBackend::new());
        registry.load_directory(dir.path(), "*.so").unwrap();
        registry.clear();
        assert!(registry.is_empty());
        // cleared names may be re-opened
        assert_eq!(registry.load_directory(dir.path(), "*.so").unwrap(), 1);
    }
}
