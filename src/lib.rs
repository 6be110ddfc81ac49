//! shimmyvars: infer the input variables a Jinja/Twig-style template needs.
//!
//! Templates declare nothing about the data they expect. This crate walks a
//! parsed template and reports every variable it reads from outside, as a
//! nested tree of the attributes used on each one:
//!
//! ```rust
//! let vars = shimmyvars::infer_source(
//!     "{% for item in cart.items %}{{ item.name }}: {{ item.price }} {{ currency }}{% endfor %}",
//! )?;
//! assert_eq!(
//!     vars.to_json(),
//!     r#"{"cart":{"items":{"name":{},"price":{}}},"currency":{}}"#
//! );
//! # Ok::<(), shimmyvars::ParseError>(())
//! ```
//!
//! Rules:
//! - A bare read `{{ x }}` requires `x`.
//! - Attribute and constant-index chains nest: `{{ x.y['z'] }}` requires
//!   `x.y.z`.
//! - Reads of a loop's element variable describe one item of the iterated
//!   collection, so `{% for i in items %}{{ i.sku }}{% endfor %}` requires
//!   `items.sku`, never `i`.
//! - Names bound by the template (`set` targets, loop targets) and loop
//!   metadata (`loop`, `_self`) are never inputs.
//!
//! Not supported:
//! - Type inference; only the shape of each variable is reported.
//! - Template inheritance or includes; each template stands alone.
//! - Rendering.
//!
//! Inference works on any tree implementing [`SyntaxNode`]. The bundled
//! tokenizer and parser cover text, `{{ }}`, `{% for %}` (with `else`),
//! `{% if %}`/`{% elif %}`/`{% else %}`, `{% set %}`, comments, filters,
//! tests, calls and the usual operators. [`Analyzer`] adds per-template
//! caching on top of a [`TemplateParser`] such as [`Environment`].

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod infer;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod syntax;
pub mod tree;

pub use analyzer::Analyzer;
pub use config::InferOptions;
pub use error::{Error, LoadError, ParseError};
pub use infer::{Inferrer, LoopContext};
pub use loader::{Environment, FileSystemLoader, Loader, MemoryLoader, TemplateParser};
pub use syntax::{AttrValue, NodeKind, SyntaxNode};
pub use tree::RequirementTree;

/// Infers the variables read by any syntax tree, with default options.
pub fn infer<N: SyntaxNode>(node: &N) -> RequirementTree {
    Inferrer::default().infer(node, None)
}

/// Parses `source` with the bundled parser and infers its variables.
pub fn infer_source(source: &str) -> Result<RequirementTree, ParseError> {
    let template = parser::parse(source)?;
    Ok(infer(&template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> RequirementTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn chat_template_variables() {
        // HF-style chat template after JSON decoding.
        let template = r#"
{%- for message in messages %}
{%- if message['role'] == 'user' %}
{{- '<|user|>\n' + message['content'] + eos_token }}
{%- elif message['role'] == 'system' %}
{{- '<|system|>\n' + message['content'] + eos_token }}
{%- elif message['role'] == 'assistant' %}
{{- '<|assistant|>\n'  + message['content'] + eos_token }}
{%- endif %}
{%- if loop.last and add_generation_prompt %}
{{- '<|assistant|>' }}
{%- endif %}
{%- endfor %}
"#;
        assert_eq!(
            infer_source(template).unwrap(),
            tree(json!({
                "messages": {"role": {}, "content": {}},
                "eos_token": {},
                "add_generation_prompt": {}
            }))
        );
    }

    #[test]
    fn namespace_pattern() {
        let template = "{% set ns = namespace(found=false) %}\
{% for message in messages %}{% if message.role == 'system' %}{% set ns.found = true %}{% endif %}{% endfor %}\
{% if not ns.found %}{{ default_system_prompt }}{% endif %}";
        assert_eq!(
            infer_source(template).unwrap(),
            tree(json!({"messages": {"role": {}}, "default_system_prompt": {}}))
        );
    }

    #[test]
    fn syntax_errors_surface() {
        assert!(infer_source("{% for %}").is_err());
    }
}
