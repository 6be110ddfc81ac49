#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    Add,
    Sub,
    Concat, // ~
    And,
    Or,
}

/// Syntax tree produced by [`crate::parser::Parser`].
///
/// Statements and expressions share one type so the whole tree can be walked
/// through [`crate::syntax::SyntaxNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered statements: a template root, a loop body, a branch.
    Body(Vec<Node>),
    Text(String),
    Print(Box<Node>), // {{ expr }}
    For {
        key_target: Option<Box<Node>>, // `key` in `for key, value in ...`
        value_target: Box<Node>,
        seq: Box<Node>,
        body: Box<Node>,
        else_body: Option<Box<Node>>,
    },
    If {
        cases: Vec<(Node, Node)>, // (condition, body). Includes if and elifs.
        else_body: Option<Box<Node>>,
    },
    Set {
        target: Box<Node>,
        value: Box<Node>,
    },

    StringLit(String),
    Number(String),
    BoolLit(bool),
    NoneLit,
    List(Vec<Node>),
    /// Variable reference. `always_defined` is set for names bound inside the
    /// template itself (loop targets, `loop`, `set` targets).
    Name {
        name: String,
        always_defined: bool,
    },
    /// Binding site of a `for` or `set` target.
    AssignName(String),
    /// `node.attr` or `node[attribute]`; `attribute` is a literal for static access.
    GetAttr {
        node: Box<Node>,
        attribute: Box<Node>,
    },
    Filter {
        node: Box<Node>,
        name: String,
        args: Vec<Node>,
    },
    /// `node is [not] test(args)`
    Test {
        node: Box<Node>,
        name: String,
        negated: bool,
        args: Vec<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
    /// `node.method(args)`
    MethodCall {
        node: Box<Node>,
        method: String,
        args: Vec<Node>,
    },
    Not(Box<Node>),
    Neg(Box<Node>),
    BinOp(Box<Node>, BinOp, Box<Node>),
}

pub type Template = Node;

impl Node {
    pub fn name(name: impl Into<String>) -> Self {
        Node::Name {
            name: name.into(),
            always_defined: false,
        }
    }

    pub fn get_attr(node: Node, attribute: impl Into<String>) -> Self {
        Node::GetAttr {
            node: Box::new(node),
            attribute: Box::new(Node::StringLit(attribute.into())),
        }
    }
}
