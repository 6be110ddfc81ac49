//! Nested requirement trees and the deep merge that combines them.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Variables a template needs, keyed by name, with the attributes read from
/// each one nested below it.
///
/// An empty subtree means the name is referenced but nothing more is known
/// about its shape. Serializes as a plain nested object:
///
/// ```rust
/// use shimmyvars::RequirementTree;
///
/// let tree = RequirementTree::from_path(["user", "address", "city"]);
/// assert_eq!(tree.to_json(), r#"{"user":{"address":{"city":{}}}}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementTree(BTreeMap<String, RequirementTree>);

impl RequirementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single chain of keys, root first. An empty path gives an empty tree.
    pub fn from_path<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: DoubleEndedIterator,
        S: Into<String>,
    {
        path.into_iter()
            .rev()
            .fold(Self::new(), |inner, key| Self::singleton(key, inner))
    }

    /// `{key: subtree}`
    pub fn singleton(key: impl Into<String>, subtree: RequirementTree) -> Self {
        let mut tree = Self::new();
        tree.0.insert(key.into(), subtree);
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&RequirementTree> {
        self.0.get(key)
    }

    /// Walks `path` from the root, one key per level.
    pub fn get_path<'a, I>(&self, path: I) -> Option<&RequirementTree>
    where
        I: IntoIterator<Item = &'a str>,
    {
        path.into_iter().try_fold(self, |tree, key| tree.get(key))
    }

    /// Recursive union of two trees.
    ///
    /// When a key is present on both sides, an empty subtree never replaces a
    /// non-empty one; two non-empty subtrees are merged recursively. The
    /// result does not depend on argument order.
    pub fn merge(mut self, other: RequirementTree) -> RequirementTree {
        for (key, theirs) in other.0 {
            match self.0.remove(&key) {
                None => {
                    self.0.insert(key, theirs);
                }
                Some(ours) => {
                    let merged = if ours.is_empty() {
                        theirs
                    } else if theirs.is_empty() {
                        ours
                    } else {
                        ours.merge(theirs)
                    };
                    self.0.insert(key, merged);
                }
            }
        }
        self
    }

    /// Dotted paths of every leaf, e.g. `user.address.city`.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths("", &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &str, paths: &mut Vec<String>) {
        for (key, subtree) in &self.0 {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            if subtree.is_empty() {
                paths.push(path);
            } else {
                subtree.collect_paths(&path, paths);
            }
        }
    }

    pub fn to_json(&self) -> String {
        // A map of strings to maps always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for RequirementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl<K: Into<String>> FromIterator<(K, RequirementTree)> for RequirementTree {
    fn from_iter<T: IntoIterator<Item = (K, RequirementTree)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |tree, (key, subtree)| tree.merge(Self::singleton(key, subtree)))
    }
}

impl IntoIterator for RequirementTree {
    type Item = (String, RequirementTree);
    type IntoIter = btree_map::IntoIter<String, RequirementTree>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RequirementTree {
    type Item = (&'a String, &'a RequirementTree);
    type IntoIter = btree_map::Iter<'a, String, RequirementTree>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> RequirementTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_subtree_never_replaces_richer_one() {
        let a = tree(json!({"a": {}}));
        let b = tree(json!({"a": {"b": {}}}));
        assert_eq!(a.clone().merge(b.clone()), b);
        assert_eq!(b.clone().merge(a), b);
    }

    #[test]
    fn merge_unions_recursively() {
        let a = tree(json!({"user": {"name": {}, "address": {"city": {}}}, "x": {}}));
        let b = tree(json!({"user": {"address": {"zip": {}}, "email": {}}, "y": {"z": {}}}));
        let expected = tree(json!({
            "user": {"name": {}, "email": {}, "address": {"city": {}, "zip": {}}},
            "x": {},
            "y": {"z": {}}
        }));
        assert_eq!(a.clone().merge(b.clone()), expected);
        assert_eq!(b.merge(a), expected);
    }

    #[test]
    fn merge_is_associative() {
        let a = tree(json!({"p": {}, "q": {"r": {}}}));
        let b = tree(json!({"p": {"s": {}}, "q": {}}));
        let c = tree(json!({"p": {"s": {"t": {}}}, "u": {}}));
        assert_eq!(
            a.clone().merge(b.clone()).merge(c.clone()),
            a.merge(b.merge(c))
        );
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let a = tree(json!({"p": {"q": {}}}));
        assert_eq!(a.clone().merge(RequirementTree::new()), a);
        assert_eq!(RequirementTree::new().merge(a.clone()), a);
    }

    #[test]
    fn path_helpers() {
        let t = RequirementTree::from_path(["parent", "children", "id"]);
        assert_eq!(t, tree(json!({"parent": {"children": {"id": {}}}})));
        assert!(RequirementTree::from_path(Vec::<String>::new()).is_empty());

        assert_eq!(
            t.get_path(["parent", "children"]),
            Some(&RequirementTree::from_path(["id"]))
        );
        assert_eq!(t.get_path(["parent", "missing"]), None);
        assert_eq!(t.paths(), vec!["parent.children.id".to_string()]);

        let grown = t.merge(RequirementTree::from_path(["other", "x"]));
        assert_eq!(grown.paths(), vec!["other.x".to_string(), "parent.children.id".to_string()]);
    }

    #[test]
    fn serializes_as_nested_object() {
        let t = tree(json!({"b": {}, "a": {"c": {}}}));
        assert_eq!(t.to_json(), r#"{"a":{"c":{}},"b":{}}"#);
        assert_eq!(t.to_string(), t.to_json());
    }
}
