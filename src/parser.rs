use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, Tokenizer};
use std::collections::VecDeque;

pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
    buffer: VecDeque<Token>,
    // Names bound inside the template: one scope per enclosing `for`, plus
    // the template scope at the bottom for `set` targets.
    scopes: Vec<Vec<String>>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Tokenizer::new(input),
            buffer: VecDeque::new(),
            scopes: vec![Vec::new()],
        }
    }

    fn peek(&self, n: usize) -> Option<&Token> {
        self.buffer.get(n)
    }

    fn consume(&mut self) -> Option<Token> {
        self.buffer.pop_front()
    }

    fn unexpected(expected: impl Into<String>, found: Option<Token>) -> ParseError {
        let expected = expected.into();
        match found {
            Some(t) => ParseError::UnexpectedToken {
                expected,
                found: format!("{:?}", t),
            },
            None => ParseError::UnexpectedEof { expected },
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        match self.consume() {
            Some(t) if t == token => Ok(()),
            t => Err(Self::unexpected(format!("{:?}", token), t)),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.consume() {
            Some(Token::Ident(s)) => Ok(s),
            t => Err(Self::unexpected(format!("identifier for {}", what), t)),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.iter().any(|n| n == name))
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    /// Parses the whole input into a [`Template`] rooted at a [`Node::Body`].
    pub fn parse(&mut self) -> Result<Template, ParseError> {
        self.buffer = self.lexer.clone().tokenize()?.into();
        let nodes = self.parse_body()?;
        match self.peek(0) {
            None => Ok(Node::Body(nodes)),
            // A block terminator with no opening tag.
            Some(_) => Err(Self::unexpected("end of template", self.peek(1).cloned())),
        }
    }

    fn parse_body(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            // Lookahead for termination conditions
            if let Some(Token::BlockStart) = self.peek(0) {
                if let Some(Token::EndFor | Token::EndIf | Token::Else | Token::Elif) = self.peek(1) {
                    // Block terminator found; stop parsing this sequence
                    break;
                }
            }

            match self.consume() {
                None => break,
                Some(Token::Text(s)) => nodes.push(Node::Text(s)),
                Some(Token::VarStart) => {
                    let expr = self.parse_expr()?;
                    self.expect(Token::VarEnd)?;
                    nodes.push(Node::Print(Box::new(expr)));
                }
                Some(Token::BlockStart) => match self.consume() {
                    Some(Token::For) => nodes.push(self.parse_for()?),
                    Some(Token::If) => nodes.push(self.parse_if()?),
                    Some(Token::Set) => nodes.push(self.parse_set()?),
                    Some(Token::Ident(tag)) => return Err(ParseError::UnknownTag(tag)),
                    t => return Err(Self::unexpected("tag name", t)),
                },
                t => return Err(Self::unexpected("text or tag", t)),
            }
        }
        Ok(nodes)
    }

    fn parse_for(&mut self) -> Result<Node, ParseError> {
        let first = self.expect_ident("loop target")?;
        let (key, value) = if let Some(Token::Comma) = self.peek(0) {
            self.consume();
            (Some(first), self.expect_ident("loop value target")?)
        } else {
            (None, first)
        };
        self.expect(Token::In)?;
        // The sequence is evaluated outside the loop scope.
        let seq = self.parse_expr()?;
        self.expect(Token::BlockEnd)?;

        let mut scope = vec![value.clone(), "loop".to_string()];
        scope.extend(key.clone());
        self.scopes.push(scope);
        let body = self.parse_body();
        self.scopes.pop();
        let body = body?;

        let mut else_body = None;
        if let (Some(Token::BlockStart), Some(Token::Else)) = (self.peek(0), self.peek(1)) {
            self.consume(); // {%
            self.consume(); // else
            self.expect(Token::BlockEnd)?;
            else_body = Some(Box::new(Node::Body(self.parse_body()?)));
        }

        // Expect endfor
        self.expect(Token::BlockStart)?;
        self.expect(Token::EndFor)?;
        self.expect(Token::BlockEnd)?;

        Ok(Node::For {
            key_target: key.map(|k| Box::new(Node::AssignName(k))),
            value_target: Box::new(Node::AssignName(value)),
            seq: Box::new(seq),
            body: Box::new(Node::Body(body)),
            else_body,
        })
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        let condition = self.parse_expr()?;
        self.expect(Token::BlockEnd)?;

        let body = Node::Body(self.parse_body()?);
        let mut cases = vec![(condition, body)];
        let mut else_body = None;

        loop {
            // Check what comes next: {% elif ... %} or {% else %} or {% endif %}
            self.expect(Token::BlockStart)?;
            match self.consume() {
                Some(Token::Elif) => {
                    let cond = self.parse_expr()?;
                    self.expect(Token::BlockEnd)?;
                    let block = Node::Body(self.parse_body()?);
                    cases.push((cond, block));
                }
                Some(Token::Else) => {
                    self.expect(Token::BlockEnd)?;
                    else_body = Some(Box::new(Node::Body(self.parse_body()?)));
                    // After else, we must see endif
                    self.expect(Token::BlockStart)?;
                    self.expect(Token::EndIf)?;
                    self.expect(Token::BlockEnd)?;
                    break;
                }
                Some(Token::EndIf) => {
                    self.expect(Token::BlockEnd)?;
                    break;
                }
                t => return Err(Self::unexpected("elif, else, or endif", t)),
            }
        }

        Ok(Node::If { cases, else_body })
    }

    fn parse_set(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_ident("set target")?;
        // `{% set ns.found = true %}` assigns into an existing object.
        let mut attribute = None;
        if let Some(Token::Dot) = self.peek(0) {
            self.consume();
            attribute = Some(self.expect_ident("set target attribute")?);
        }
        self.expect(Token::Assign)?;
        let value = self.parse_expr()?;
        self.expect(Token::BlockEnd)?;

        let target = match attribute {
            Some(attr) => {
                let always_defined = self.is_bound(&name);
                Node::GetAttr {
                    node: Box::new(Node::Name {
                        name,
                        always_defined,
                    }),
                    attribute: Box::new(Node::StringLit(attr)),
                }
            }
            None => {
                // Bound after the value so `{% set x = x | default(1) %}` still reads the input.
                self.bind(&name);
                Node::AssignName(name)
            }
        };
        Ok(Node::Set {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_expr(&mut self) -> Result<Node, ParseError> {
        self.parse_or()
    }

    fn binop(lhs: Node, op: BinOp, rhs: Node) -> Node {
        Node::BinOp(Box::new(lhs), op, Box::new(rhs))
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_and()?;
        while let Some(Token::Or) = self.peek(0) {
            self.consume();
            let rhs = self.parse_and()?;
            lhs = Self::binop(lhs, BinOp::Or, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_not()?;
        while let Some(Token::And) = self.peek(0) {
            self.consume();
            let rhs = self.parse_not()?;
            lhs = Self::binop(lhs, BinOp::And, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Node, ParseError> {
        if let Some(Token::Not) = self.peek(0) {
            self.consume();
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::LtEq) => BinOp::LtEq,
                Some(Token::GtEq) => BinOp::GtEq,
                Some(Token::In) => BinOp::In,
                Some(Token::Not) if self.peek(1) == Some(&Token::In) => {
                    self.consume(); // not
                    self.consume(); // in
                    let rhs = self.parse_add()?;
                    lhs = Node::Not(Box::new(Self::binop(lhs, BinOp::In, rhs)));
                    continue;
                }
                _ => break,
            };
            self.consume();
            let rhs = self.parse_add()?;
            lhs = Self::binop(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek(0) {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                Some(Token::Tilde) => BinOp::Concat,
                _ => break,
            };
            self.consume();
            let rhs = self.parse_unary()?;
            lhs = Self::binop(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        if let Some(Token::Minus) = self.peek(0) {
            self.consume();
            return Ok(Node::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_filtered()
    }

    // Filters and tests bind tighter than any binary operator.
    fn parse_filtered(&mut self) -> Result<Node, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek(0) {
                Some(Token::Pipe) => {
                    self.consume();
                    let name = self.expect_ident("filter name")?;
                    let args = self.parse_optional_args()?;
                    expr = Node::Filter {
                        node: Box::new(expr),
                        name,
                        args,
                    };
                }
                Some(Token::Is) => {
                    self.consume();
                    let negated = if let Some(Token::Not) = self.peek(0) {
                        self.consume();
                        true
                    } else {
                        false
                    };
                    let name = match self.consume() {
                        Some(Token::Ident(s)) => s,
                        Some(Token::None) => "none".to_string(),
                        t => return Err(Self::unexpected("test name", t)),
                    };
                    let args = self.parse_optional_args()?;
                    expr = Node::Test {
                        node: Box::new(expr),
                        name,
                        negated,
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_optional_args(&mut self) -> Result<Vec<Node>, ParseError> {
        if let Some(Token::LParen) = self.peek(0) {
            self.consume();
            self.parse_list(Token::RParen)
        } else {
            Ok(Vec::new())
        }
    }

    /// Comma separated expressions up to and including `close`.
    fn parse_list(&mut self, close: Token) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.peek(0) == Some(&close) {
                self.consume();
                return Ok(items);
            }
            // Keyword argument: the name is not a variable read.
            if let (Some(Token::Ident(_)), Some(Token::Assign)) = (self.peek(0), self.peek(1)) {
                self.consume();
                self.consume();
            }
            items.push(self.parse_expr()?);
            match self.consume() {
                Some(Token::Comma) => {}
                Some(t) if t == close => return Ok(items),
                t => return Err(Self::unexpected(format!("Comma or {:?}", close), t)),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let mut expr = match self.consume() {
            Some(Token::StringLit(s)) => Node::StringLit(s),
            Some(Token::Number(n)) => Node::Number(n),
            Some(Token::True) => Node::BoolLit(true),
            Some(Token::False) => Node::BoolLit(false),
            Some(Token::None) => Node::NoneLit,
            Some(Token::Ident(s)) => {
                if let Some(Token::LParen) = self.peek(0) {
                    self.consume();
                    let args = self.parse_list(Token::RParen)?;
                    Node::Call { name: s, args }
                } else {
                    let always_defined = self.is_bound(&s);
                    Node::Name {
                        name: s,
                        always_defined,
                    }
                }
            }
            Some(Token::LParen) => {
                let e = self.parse_expr()?;
                self.expect(Token::RParen)?;
                e
            }
            Some(Token::LBracket) => Node::List(self.parse_list(Token::RBracket)?),
            t => return Err(Self::unexpected("expression", t)),
        };

        // Handle suffixes: .attr, ['key']
        loop {
            match self.peek(0) {
                Some(Token::Dot) => {
                    self.consume(); // .
                    let attribute = match self.consume() {
                        Some(Token::Ident(attr)) => {
                            if let Some(Token::LParen) = self.peek(0) {
                                self.consume();
                                let args = self.parse_list(Token::RParen)?;
                                expr = Node::MethodCall {
                                    node: Box::new(expr),
                                    method: attr,
                                    args,
                                };
                                continue;
                            }
                            Node::StringLit(attr)
                        }
                        Some(Token::Number(n)) => Node::Number(n),
                        t => return Err(Self::unexpected("identifier after dot", t)),
                    };
                    expr = Node::GetAttr {
                        node: Box::new(expr),
                        attribute: Box::new(attribute),
                    };
                }
                Some(Token::LBracket) => {
                    self.consume(); // [
                    let idx = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Node::GetAttr {
                        node: Box::new(expr),
                        attribute: Box::new(idx),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }
}

/// Parses template source into a syntax tree.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(source: &str) -> Vec<Node> {
        match parse(source).unwrap() {
            Node::Body(nodes) => nodes,
            other => panic!("expected body, got {:?}", other),
        }
    }

    #[test]
    fn print_of_attribute_chain() {
        assert_eq!(
            body("{{ user.address['city'] }}"),
            vec![Node::Print(Box::new(Node::get_attr(
                Node::get_attr(Node::name("user"), "address"),
                "city"
            )))]
        );
    }

    #[test]
    fn loop_names_are_marked_always_defined() {
        let nodes = body("{% for k, v in items %}{{ v }}{{ loop }}{% endfor %}{{ v }}");
        let Node::For { body: loop_body, key_target, .. } = &nodes[0] else {
            panic!("expected for loop, got {:?}", nodes[0]);
        };
        assert_eq!(key_target.as_deref(), Some(&Node::AssignName("k".into())));
        let Node::Body(inner) = loop_body.as_ref() else {
            panic!("loop body should be a Body node");
        };
        for print in inner {
            let Node::Print(expr) = print else { panic!("expected print") };
            assert!(matches!(expr.as_ref(), Node::Name { always_defined: true, .. }));
        }
        // Outside the loop `v` is free again.
        assert_eq!(nodes[1], Node::Print(Box::new(Node::name("v"))));
    }

    #[test]
    fn set_binds_after_its_value() {
        let nodes = body("{% set title = title | default('x') %}{{ title }}");
        let Node::Set { value, .. } = &nodes[0] else { panic!("expected set") };
        let Node::Filter { node, name, args } = value.as_ref() else { panic!("expected filter") };
        assert_eq!(node.as_ref(), &Node::name("title"));
        assert_eq!(name, "default");
        assert_eq!(args, &vec![Node::StringLit("x".into())]);
        assert_eq!(
            nodes[1],
            Node::Print(Box::new(Node::Name {
                name: "title".into(),
                always_defined: true
            }))
        );
    }

    #[test]
    fn if_elif_else_and_tests() {
        let nodes = body("{% if a is defined %}1{% elif not b %}2{% else %}3{% endif %}");
        let Node::If { cases, else_body } = &nodes[0] else { panic!("expected if") };
        assert_eq!(cases.len(), 2);
        assert!(matches!(&cases[0].0, Node::Test { name, negated: false, .. } if name == "defined"));
        assert!(matches!(&cases[1].0, Node::Not(_)));
        assert_eq!(else_body.as_deref(), Some(&Node::Body(vec![Node::Text("3".into())])));
    }

    #[test]
    fn for_else_branch() {
        let nodes = body("{% for x in xs %}{{ x }}{% else %}none{% endfor %}");
        assert!(matches!(&nodes[0], Node::For { else_body: Some(_), .. }));
    }

    #[test]
    fn errors_are_reported() {
        assert_eq!(
            parse("{% for x in xs %}"),
            Err(ParseError::UnexpectedEof {
                expected: "BlockStart".into()
            })
        );
        assert_eq!(
            parse("{% include 'x' %}"),
            Err(ParseError::UnknownTag("include".into()))
        );
        assert!(parse("{% endfor %}").is_err());
        assert!(parse("{{ a. }}").is_err());
    }
}
