//! Hierarchical component-path filtering.
//!
//! A request may name `/`-separated paths. The first segment must match a
//! top-level instance; deeper segments travel down the traversal as a
//! sub-filter the container applies to its own children. Multiple sub-paths
//! under the same instance union.

use std::collections::HashMap;

use crate::provider::Instance;

#[derive(Debug, Clone)]
pub enum ComponentFilter {
    /// Pass everything below this point.
    All,
    Subset(HashMap<String, ComponentFilter>),
}

impl Default for ComponentFilter {
    fn default() -> Self {
        Self::All
    }
}

impl ComponentFilter {
    /// Build a filter from request paths, validated against the root
    /// instances. Any invalid path fails the whole request (no partial
    /// execution); all offenders are reported together.
    pub fn from_paths(paths: &[String], roots: &[Instance]) -> Result<Self, Vec<String>> {
        if paths.is_empty() {
            return Ok(Self::All);
        }

        let mut selected: HashMap<String, ComponentFilter> = HashMap::new();
        let mut invalid = Vec::new();

        for path in paths {
            let mut segments = path.split('/').filter(|s| !s.is_empty());
            let Some(first) = segments.next() else {
                invalid.push(path.clone());
                continue;
            };

            let Some(root) = roots.iter().find(|i| i.name == first) else {
                invalid.push(path.clone());
                continue;
            };

            let rest: Vec<&str> = segments.collect();
            if !rest.is_empty() && !root.is_container() {
                invalid.push(path.clone());
                continue;
            }

            insert_path(&mut selected, first, &rest);
        }

        if invalid.is_empty() {
            Ok(Self::Subset(selected))
        } else {
            Err(invalid)
        }
    }

    /// The filter a child named `name` should apply to its own children, or
    /// `None` when the child is excluded entirely.
    pub fn child(&self, name: &str) -> Option<ComponentFilter> {
        match self {
            Self::All => Some(Self::All),
            Self::Subset(children) => children.get(name).cloned(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.child(name).is_some()
    }
}

fn insert_path(selected: &mut HashMap<String, ComponentFilter>, head: &str, rest: &[&str]) {
    match selected.get_mut(head) {
        // A broader selection already covers this path.
        Some(ComponentFilter::All) => {}
        Some(ComponentFilter::Subset(children)) => {
            if rest.is_empty() {
                selected.insert(head.to_string(), ComponentFilter::All);
            } else {
                insert_path(children, rest[0], &rest[1..]);
            }
        }
        None => {
            if rest.is_empty() {
                selected.insert(head.to_string(), ComponentFilter::All);
            } else {
                let mut children = HashMap::new();
                insert_path(&mut children, rest[0], &rest[1..]);
                selected.insert(head.to_string(), ComponentFilter::Subset(children));
            }
        }
    }
}
