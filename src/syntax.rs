//! Generic, read-only view of a template syntax tree.
//!
//! Inference is written against [`SyntaxNode`] only. Any parser can feed the
//! analyzer by implementing it; [`crate::ast::Node`] is the bundled one.

use crate::ast::Node;

/// The node shapes inference distinguishes. Everything else is `Generic` and
/// is walked child by child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A variable read. Attributes: `name`, optional `always_defined`.
    NameReference,
    /// `node.attribute` / `node[attribute]`. Named children: `node`, `attribute`.
    AttributeAccess,
    /// Named children: `value_target`, `key_target`, `seq`, `body`, `else`.
    ForLoop,
    /// Binding site of a loop or assignment target. Attribute: `name`.
    AssignName,
    /// A filter applied to an expression. Named child: `node`.
    Filter,
    Generic,
}

/// Attribute value carried by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue<'a> {
    Bool(bool),
    Str(&'a str),
}

impl<'a> AttrValue<'a> {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(b),
            AttrValue::Str(_) => None,
        }
    }

    pub fn as_str(self) -> Option<&'a str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Bool(_) => None,
        }
    }
}

pub trait SyntaxNode {
    fn kind(&self) -> NodeKind;

    fn attribute(&self, name: &str) -> Option<AttrValue<'_>>;

    fn named_child(&self, name: &str) -> Option<&Self>;

    /// Ordered children, used for generic traversal.
    fn children(&self) -> Vec<&Self>;

    fn child_count(&self) -> usize {
        self.children().len()
    }
}

impl SyntaxNode for Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::Name { .. } => NodeKind::NameReference,
            Node::GetAttr { .. } => NodeKind::AttributeAccess,
            Node::For { .. } => NodeKind::ForLoop,
            Node::AssignName(_) => NodeKind::AssignName,
            Node::Filter { .. } => NodeKind::Filter,
            _ => NodeKind::Generic,
        }
    }

    fn attribute(&self, name: &str) -> Option<AttrValue<'_>> {
        match (self, name) {
            (Node::Name { name, .. } | Node::AssignName(name), "name") => Some(AttrValue::Str(name)),
            (Node::Name { always_defined, .. }, "always_defined") => {
                Some(AttrValue::Bool(*always_defined))
            }
            (Node::StringLit(value) | Node::Number(value), "value") => Some(AttrValue::Str(value)),
            (Node::BoolLit(value), "value") => Some(AttrValue::Bool(*value)),
            (
                Node::Filter { name, .. }
                | Node::Test { name, .. }
                | Node::Call { name, .. }
                | Node::MethodCall { method: name, .. },
                "name",
            ) => Some(AttrValue::Str(name)),
            (Node::Test { negated, .. }, "negated") => Some(AttrValue::Bool(*negated)),
            _ => None,
        }
    }

    fn named_child(&self, name: &str) -> Option<&Self> {
        match (self, name) {
            (Node::Print(expr), "expr") => Some(&**expr),
            (Node::GetAttr { node, .. }, "node")
            | (Node::Filter { node, .. }, "node")
            | (Node::Test { node, .. }, "node")
            | (Node::MethodCall { node, .. }, "node") => Some(&**node),
            (Node::GetAttr { attribute, .. }, "attribute") => Some(&**attribute),
            (Node::For { value_target, .. }, "value_target") => Some(&**value_target),
            (Node::For { key_target, .. }, "key_target") => key_target.as_deref(),
            (Node::For { seq, .. }, "seq") => Some(&**seq),
            (Node::For { body, .. }, "body") => Some(&**body),
            (Node::For { else_body, .. } | Node::If { else_body, .. }, "else") => {
                else_body.as_deref()
            }
            (Node::Set { target, .. }, "target") => Some(&**target),
            (Node::Set { value, .. }, "value") => Some(&**value),
            (Node::Not(operand) | Node::Neg(operand), "node") => Some(&**operand),
            (Node::BinOp(left, _, _), "left") => Some(&**left),
            (Node::BinOp(_, _, right), "right") => Some(&**right),
            _ => None,
        }
    }

    fn children(&self) -> Vec<&Self> {
        match self {
            Node::Body(nodes) | Node::List(nodes) => nodes.iter().collect(),
            Node::Text(_)
            | Node::StringLit(_)
            | Node::Number(_)
            | Node::BoolLit(_)
            | Node::NoneLit
            | Node::Name { .. }
            | Node::AssignName(_) => Vec::new(),
            Node::Print(expr) | Node::Not(expr) | Node::Neg(expr) => vec![&**expr],
            Node::For {
                key_target,
                value_target,
                seq,
                body,
                else_body,
            } => key_target
                .as_deref()
                .into_iter()
                .chain([&**value_target, &**seq, &**body])
                .chain(else_body.as_deref())
                .collect(),
            Node::If { cases, else_body } => cases
                .iter()
                .flat_map(|(condition, body)| [condition, body])
                .chain(else_body.as_deref())
                .collect(),
            Node::Set { target, value } => vec![&**target, &**value],
            Node::GetAttr { node, attribute } => vec![&**node, &**attribute],
            Node::Filter { node, args, .. }
            | Node::Test { node, args, .. }
            | Node::MethodCall { node, args, .. } => {
                std::iter::once(&**node).chain(args).collect()
            }
            Node::Call { args, .. } => args.iter().collect(),
            Node::BinOp(left, _, right) => vec![&**left, &**right],
        }
    }
}
