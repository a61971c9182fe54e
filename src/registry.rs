use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{MarqueeError, Result};

/// Screenwriter names referenced by stored movies.
/// Counted, so two movies sharing a writer release the name only once both are gone.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    counts: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one use of `name`.
    /// Returns FALSE if the name was already in use.
    pub fn insert(&mut self, name: &str) -> bool {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop one use of `name`. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) {
        if let Some(count) = self.counts.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Script paths currently being executed, shared by every nesting level of a session.
#[derive(Debug, Default, Clone)]
pub struct ActiveScripts {
    paths: Rc<RefCell<HashSet<PathBuf>>>,
}

impl ActiveScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as running until the returned guard is dropped.
    /// Fails if the path is already running.
    pub fn enter(&self, path: PathBuf) -> Result<ScriptGuard> {
        if !self.paths.borrow_mut().insert(path.clone()) {
            return Err(MarqueeError::ScriptRecursion(path));
        }
        Ok(ScriptGuard { paths: Rc::clone(&self.paths), path })
    }

    pub fn is_running(&self, path: &Path) -> bool {
        self.paths.borrow().contains(path)
    }

    pub fn depth(&self) -> usize {
        self.paths.borrow().len()
    }
}

#[derive(Debug)]
pub struct ScriptGuard {
    paths: Rc<RefCell<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for ScriptGuard {
    fn drop(&mut self) {
        self.paths.borrow_mut().remove(&self.path);
    }
}
