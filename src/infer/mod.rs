//! Free-variable inference over a [`SyntaxNode`] tree.
//!
//! [`Inferrer::infer`] walks the tree and returns the [`RequirementTree`] of
//! every name the template reads but does not bind itself. Attribute chains
//! become nested paths (`user.address.city`) and reads of a loop's element
//! variable are attributed to the collection being iterated:
//!
//! ```rust
//! use shimmyvars::{infer::Inferrer, parser::parse};
//!
//! let template = parse("{% for c in parent.children %}{{ c.id }}{% endfor %}")?;
//! let tree = Inferrer::default().infer(&template, None);
//! assert_eq!(tree.to_json(), r#"{"parent":{"children":{"id":{}}}}"#);
//! # Ok::<(), shimmyvars::ParseError>(())
//! ```

mod chain;
mod loops;

use tracing::trace;

use crate::config::InferOptions;
use crate::syntax::{AttrValue, NodeKind, SyntaxNode};
use crate::tree::RequirementTree;

/// The loop whose body is being inferred: the path of the collection it
/// iterates (root first) and the name each element is bound to.
///
/// Contexts nest: a body inside another loop keeps a link to the enclosing
/// context so the outer element name still resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopContext<'a> {
    sequence: Option<&'a [String]>,
    element: Option<&'a str>,
    parent: Option<&'a LoopContext<'a>>,
}

impl<'a> LoopContext<'a> {
    pub fn new(sequence: &'a [String], element: &'a str) -> Self {
        Self::nested(Some(sequence), Some(element), None)
    }

    /// `sequence` is `None` when the collection could not be resolved to a
    /// variable path; reads of the element then contribute nothing.
    pub fn nested(
        sequence: Option<&'a [String]>,
        element: Option<&'a str>,
        parent: Option<&'a LoopContext<'a>>,
    ) -> Self {
        Self {
            sequence,
            element,
            parent,
        }
    }

    pub fn sequence(&self) -> Option<&'a [String]> {
        self.sequence
    }

    pub fn element(&self) -> Option<&'a str> {
        self.element
    }

    /// The collection path of the innermost loop binding `name`, if any loop
    /// does.
    pub fn resolve(&self, name: &str) -> Option<Option<&'a [String]>> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx.element == Some(name) {
                return Some(ctx.sequence);
            }
            current = ctx.parent;
        }
        None
    }
}

/// Where a name or attribute chain landed in the requirement tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChainResolution {
    pub(crate) tree: RequirementTree,
    /// Root-to-leaf keys of the chain inside `tree`. `None` when the chain
    /// contributed no path of its own.
    pub(crate) path: Option<Vec<String>>,
}

impl ChainResolution {
    fn at(path: Vec<String>) -> Self {
        Self {
            tree: RequirementTree::from_path(&path),
            path: Some(path),
        }
    }

    fn unresolved(tree: RequirementTree) -> Self {
        Self { tree, path: None }
    }

    fn with_extra(mut self, extra: RequirementTree) -> Self {
        self.tree = self.tree.merge(extra);
        self
    }
}

/// Runs inference with a fixed set of [`InferOptions`].
#[derive(Debug, Clone, Default)]
pub struct Inferrer {
    options: InferOptions,
}

impl Inferrer {
    pub fn new(options: InferOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InferOptions {
        &self.options
    }

    /// Free variables referenced in `node`'s subtree.
    ///
    /// Never fails: node kinds without special handling are walked child by
    /// child. The tree is only read.
    pub fn infer<N: SyntaxNode>(&self, node: &N, ctx: Option<&LoopContext<'_>>) -> RequirementTree {
        match node.kind() {
            NodeKind::NameReference => self.resolve_name(node, Vec::new(), ctx).tree,
            NodeKind::AttributeAccess => self.resolve_chain(node, Vec::new(), ctx).tree,
            NodeKind::ForLoop => self.resolve_loop(node, ctx),
            NodeKind::AssignName => RequirementTree::new(),
            NodeKind::Filter | NodeKind::Generic => self.infer_children(node, ctx),
        }
    }

    fn infer_children<N: SyntaxNode>(&self, node: &N, ctx: Option<&LoopContext<'_>>) -> RequirementTree {
        node.children()
            .into_iter()
            .fold(RequirementTree::new(), |tree, child| tree.merge(self.infer(child, ctx)))
    }

    /// Resolves a name read, with `path` holding the attributes read from it
    /// (root first).
    fn resolve_name<N: SyntaxNode>(
        &self,
        node: &N,
        path: Vec<String>,
        ctx: Option<&LoopContext<'_>>,
    ) -> ChainResolution {
        let Some(name) = node.attribute("name").and_then(AttrValue::as_str) else {
            return ChainResolution::default();
        };
        if self.options.is_reserved(name) {
            return ChainResolution::default();
        }

        if let Some(binding) = ctx.and_then(|ctx| ctx.resolve(name)) {
            // A loop element: `path` describes one item of the collection.
            return match binding {
                Some(sequence) => {
                    trace!("Redirecting '{}' to sequence '{}'", name, sequence.join("."));
                    ChainResolution::at(sequence.iter().cloned().chain(path).collect())
                }
                None => ChainResolution::default(),
            };
        }

        let always_defined = node
            .attribute("always_defined")
            .and_then(AttrValue::as_bool)
            .unwrap_or(false);
        if always_defined {
            return ChainResolution::default();
        }

        ChainResolution::at(std::iter::once(name.to_string()).chain(path).collect())
    }
}
