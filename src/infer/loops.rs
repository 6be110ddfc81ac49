use tracing::trace;

use super::{Inferrer, LoopContext};
use crate::syntax::{AttrValue, NodeKind, SyntaxNode};
use crate::tree::RequirementTree;

impl Inferrer {
    /// A loop requires its sequence, plus whatever the body reads of one
    /// element placed under the sequence's path.
    pub(crate) fn resolve_loop<N: SyntaxNode>(
        &self,
        node: &N,
        outer: Option<&LoopContext<'_>>,
    ) -> RequirementTree {
        let element = node
            .named_child("value_target")
            .filter(|target| target.kind() == NodeKind::AssignName)
            .and_then(|target| target.attribute("name"))
            .and_then(AttrValue::as_str);

        let (sequence, required) = match node.named_child("seq") {
            Some(seq) => self.resolve_sequence(seq, outer),
            None => (None, RequirementTree::new()),
        };

        let ctx = LoopContext::nested(sequence.as_deref(), element, outer);
        let body = node
            .named_child("body")
            .map(|body| self.infer_body(body, &ctx))
            .unwrap_or_default();

        // `{% else %}` runs when the sequence is empty, outside the loop scope.
        let otherwise = node
            .named_child("else")
            .map(|branch| self.infer(branch, outer))
            .unwrap_or_default();

        required.merge(body).merge(otherwise)
    }

    /// Resolves `seq` to the path of the collection it names, unwrapping
    /// filters. The tree holds everything `seq` reads, filter arguments
    /// included.
    fn resolve_sequence<N: SyntaxNode>(
        &self,
        seq: &N,
        outer: Option<&LoopContext<'_>>,
    ) -> (Option<Vec<String>>, RequirementTree) {
        let mut seq = seq;
        let mut extra = RequirementTree::new();
        while seq.kind() == NodeKind::Filter {
            let Some(inner) = seq.named_child("node") else {
                break;
            };
            for argument in seq.children() {
                if !std::ptr::eq(argument, inner) {
                    extra = extra.merge(self.infer(argument, outer));
                }
            }
            seq = inner;
        }

        let resolution = match seq.kind() {
            NodeKind::NameReference => self.resolve_name(seq, Vec::new(), outer),
            NodeKind::AttributeAccess => self.resolve_chain(seq, Vec::new(), outer),
            _ => return (None, extra.merge(self.infer(seq, outer))),
        };
        let path = resolution.path.filter(|path| !path.is_empty());
        (path, extra.merge(resolution.tree))
    }

    fn infer_body<N: SyntaxNode>(&self, body: &N, ctx: &LoopContext<'_>) -> RequirementTree {
        trace!(
            "Inferring loop body: element {:?} over {:?}",
            ctx.element(),
            ctx.sequence()
        );
        self.infer(body, Some(ctx))
    }
}
