//! Per-template memoization of inferred variables.
//!
//! An [`Analyzer`] owns its parser and a cache keyed by template name. The
//! first request for a name parses the template and runs inference; later
//! requests return the cached tree without touching the parser again.
//!
//! # Thread Safety
//!
//! `Analyzer` is `Sync` whenever its parser is, and can be shared behind an
//! `Arc`. Cached trees live in a [`DashMap`]; concurrent first requests for
//! the same name serialize on a per-name lock so the template is parsed once.
//! Failed parses are not cached.
//!
//! # Examples
//!
//! ```rust
//! use shimmyvars::{Analyzer, Environment, MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with("profile", "{{ user.name }} lives in {{ user.address.city }}");
//! let analyzer = Analyzer::new(Environment::new(loader));
//!
//! let vars = analyzer.variables("profile")?;
//! assert_eq!(vars.paths(), ["user.address.city", "user.name"]);
//!
//! let address = analyzer.lookup("profile", "user.address")?;
//! assert_eq!(address.unwrap().paths(), ["city"]);
//! # Ok::<(), shimmyvars::Error>(())
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::InferOptions;
use crate::infer::Inferrer;
use crate::loader::TemplateParser;
use crate::tree::RequirementTree;

pub struct Analyzer<P> {
    parser: P,
    inferrer: Inferrer,
    trees: DashMap<String, Arc<RequirementTree>>,
    init_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<P: TemplateParser> Analyzer<P> {
    pub fn new(parser: P) -> Self {
        Self::with_options(parser, InferOptions::default())
    }

    pub fn with_options(parser: P, options: InferOptions) -> Self {
        Self {
            parser,
            inferrer: Inferrer::new(options),
            trees: DashMap::new(),
            init_locks: DashMap::new(),
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn options(&self) -> &InferOptions {
        self.inferrer.options()
    }

    /// Every variable the template `name` needs.
    ///
    /// Loader and parser errors are returned unchanged.
    pub fn variables(&self, name: &str) -> Result<Arc<RequirementTree>, P::Error> {
        if let Some(tree) = self.cached(name) {
            trace!("Variables for '{}' served from cache", name);
            return Ok(tree);
        }

        let lock = self
            .init_locks
            .entry(name.to_string())
            .or_default()
            .value()
            .clone();
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        if let Some(tree) = self.cached(name) {
            return Ok(tree);
        }

        debug!("Inferring variables for template '{}'", name);
        let ast = self.parser.parse(name)?;
        let tree = Arc::new(self.inferrer.infer(&ast, None));
        debug!(
            "Template '{}' requires {} top-level variable(s)",
            name,
            tree.len()
        );
        self.trees.insert(name.to_string(), Arc::clone(&tree));
        Ok(tree)
    }

    /// The requirements below `key_path` (dot separated, e.g. `user.address`)
    /// of template `name`, or `None` if the template never reads that path.
    ///
    /// A top-level key spelled exactly like `key_path` wins over the dotted
    /// walk, so keys containing dots (`x['a.b']`) stay reachable.
    pub fn lookup(&self, name: &str, key_path: &str) -> Result<Option<RequirementTree>, P::Error> {
        let tree = self.variables(name)?;
        let found = tree
            .get(key_path)
            .or_else(|| tree.get_path(key_path.split('.')));
        Ok(found.cloned())
    }

    /// Drops the cached tree for `name`; the next request parses it again.
    pub fn forget(&self, name: &str) -> bool {
        self.init_locks.remove(name);
        self.trees.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.trees.clear();
        self.init_locks.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    /// Names with a cached tree, sorted.
    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.trees.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    fn cached(&self, name: &str) -> Option<Arc<RequirementTree>> {
        self.trees.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::error::{Error, LoadError};
    use crate::loader::{Environment, MemoryLoader};

    fn analyzer(templates: &[(&str, &str)]) -> Analyzer<Environment<MemoryLoader>> {
        let loader = templates
            .iter()
            .fold(MemoryLoader::new(), |loader, (name, source)| loader.with(*name, *source));
        Analyzer::new(Environment::new(loader))
    }

    #[test]
    fn lookup_by_top_level_key_and_path() {
        let analyzer = analyzer(&[("t", "{{ a.b.c }}{{ d }}")]);
        assert_eq!(
            analyzer.lookup("t", "a").unwrap(),
            Some(RequirementTree::from_path(["b", "c"]))
        );
        assert_eq!(
            analyzer.lookup("t", "a.b").unwrap(),
            Some(RequirementTree::from_path(["c"]))
        );
        assert_eq!(analyzer.lookup("t", "d").unwrap(), Some(RequirementTree::new()));
        assert_eq!(analyzer.lookup("t", "missing").unwrap(), None);
    }

    #[test]
    fn lookup_of_keys_containing_dots() {
        let analyzer = analyzer(&[("t", "{{ labels['en.title'] }}{{ env['a.b'].c }}{{ a.b.d }}")]);
        assert_eq!(
            analyzer.lookup("t", "labels").unwrap(),
            Some(RequirementTree::from_path(["en.title"]))
        );
        assert_eq!(
            analyzer.lookup("t", "env").unwrap(),
            Some(RequirementTree::from_path(["a.b", "c"]))
        );
        // dotted walk still reaches nested keys
        assert_eq!(
            analyzer.lookup("t", "a.b").unwrap(),
            Some(RequirementTree::from_path(["d"]))
        );
    }

    /// Hands out the same prebuilt tree for every name.
    struct FixedTree(Node);

    impl TemplateParser for FixedTree {
        type Node = Node;
        type Error = std::convert::Infallible;

        fn parse(&self, _name: &str) -> Result<Node, Self::Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn exact_top_level_key_wins_over_dotted_walk() {
        let template = Node::Body(vec![
            Node::Print(Box::new(Node::get_attr(Node::name("a.b"), "x"))),
            Node::Print(Box::new(Node::get_attr(Node::get_attr(Node::name("a"), "b"), "y"))),
        ]);
        let analyzer = Analyzer::new(FixedTree(template));
        assert_eq!(
            analyzer.lookup("t", "a.b").unwrap(),
            Some(RequirementTree::from_path(["x"]))
        );
        assert_eq!(
            analyzer.lookup("t", "a").unwrap(),
            Some(RequirementTree::from_path(["b", "y"]))
        );
    }

    #[test]
    fn errors_propagate_and_are_not_cached() {
        let analyzer = analyzer(&[("bad", "{{ x")]);
        assert!(matches!(analyzer.variables("bad"), Err(Error::Parse { .. })));
        assert!(!analyzer.is_cached("bad"));
        assert!(matches!(
            analyzer.variables("absent"),
            Err(Error::Load(LoadError::NotFound { .. }))
        ));
    }

    #[test]
    fn forget_and_clear() {
        let analyzer = analyzer(&[("a", "{{ x }}"), ("b", "{{ y }}")]);
        analyzer.variables("a").unwrap();
        analyzer.variables("b").unwrap();
        assert_eq!(analyzer.cached_names(), vec!["a".to_string(), "b".to_string()]);

        assert!(analyzer.forget("a"));
        assert!(!analyzer.forget("a"));
        assert_eq!(analyzer.cached_names(), vec!["b".to_string()]);

        analyzer.clear();
        assert!(analyzer.cached_names().is_empty());
    }
}
