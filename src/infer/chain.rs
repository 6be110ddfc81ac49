use super::{ChainResolution, Inferrer, LoopContext};
use crate::syntax::{AttrValue, NodeKind, SyntaxNode};
use crate::tree::RequirementTree;

impl Inferrer {
    /// Resolves `a.b[c].d` into `{a: {b: ...}}`.
    ///
    /// Chains are stored outermost access first, so this walks inward from
    /// `node` collecting attribute names in `outer_keys` until it reaches the
    /// base of the chain.
    pub(crate) fn resolve_chain<N: SyntaxNode>(
        &self,
        node: &N,
        mut outer_keys: Vec<String>,
        ctx: Option<&LoopContext<'_>>,
    ) -> ChainResolution {
        let attribute = node.named_child("attribute");
        let mut extra = RequirementTree::new();
        match attribute.and_then(|a| a.attribute("value")).and_then(AttrValue::as_str) {
            Some(key) => outer_keys.push(key.to_string()),
            None => {
                // Dynamic index: keys read past it are only known at render
                // time, but the index expression itself may read variables.
                outer_keys.clear();
                if let Some(index) = attribute {
                    extra = self.infer(index, ctx);
                }
            }
        }

        let Some(base) = node.named_child("node") else {
            return ChainResolution::unresolved(extra);
        };
        let resolution = match base.kind() {
            NodeKind::AttributeAccess => self.resolve_chain(base, outer_keys, ctx),
            NodeKind::NameReference => {
                outer_keys.reverse();
                self.resolve_name(base, outer_keys, ctx)
            }
            // Rooted in a call, literal or filter: no path of its own.
            _ => ChainResolution::unresolved(self.infer(base, ctx)),
        };
        resolution.with_extra(extra)
    }
}
