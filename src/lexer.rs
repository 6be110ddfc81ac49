use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    BlockStart, // {%
    BlockEnd,   // %}
    VarStart,   // {{
    VarEnd,     // }}

    // Keywords
    If,
    Elif,
    Else,
    EndIf,
    For,
    In,
    EndFor,
    Set,
    And,
    Or,
    Not,
    Is,
    True,
    False,
    None,

    // Symbols
    EqEq,     // ==
    NotEq,    // !=
    LtEq,     // <=
    GtEq,     // >=
    Lt,       // <
    Gt,       // >
    Assign,   // =
    Plus,     // +
    Minus,    // -
    Tilde,    // ~
    Pipe,     // |
    Dot,      // .
    Comma,    // ,
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )

    // Data
    Ident(String),
    StringLit(String),
    Number(String),
}

const SYMBOLS: &[(&str, Token)] = &[
    ("==", Token::EqEq),
    ("!=", Token::NotEq),
    ("<=", Token::LtEq),
    (">=", Token::GtEq),
    ("<", Token::Lt),
    (">", Token::Gt),
    ("=", Token::Assign),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("~", Token::Tilde),
    ("|", Token::Pipe),
    (".", Token::Dot),
    (",", Token::Comma),
    ("[", Token::LBracket),
    ("]", Token::RBracket),
    ("(", Token::LParen),
    (")", Token::RParen),
];

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    in_tag: bool,
    trim_blocks: bool,
    // set by a `-%}` / `-}}` marker; strips leading whitespace of the next text
    lstrip_next: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            in_tag: false,
            trim_blocks: true,
            lstrip_next: false,
        }
    }

    /// Runs the tokenizer to the end of the input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        // The scanners return `None` after skipping input that yields no token.
        while !self.remaining().is_empty() {
            let token = if self.in_tag {
                self.next_tag_token()?
            } else {
                self.next_text_token()?
            };
            if token.is_some() {
                return Ok(token);
            }
        }
        Ok(None)
    }

    fn next_text_token(&mut self) -> Result<Option<Token>, ParseError> {
        let rest = self.remaining();
        // Find next `{{`, `{%` or `{#`
        let next_tag = rest
            .match_indices('{')
            .map(|(idx, _)| idx)
            .find(|&idx| matches!(rest.as_bytes().get(idx + 1), Some(b'%' | b'{' | b'#')));

        match next_tag {
            Some(0) => {
                if rest.starts_with("{#") {
                    let close = rest.find("#}").ok_or(ParseError::UnterminatedComment)?;
                    self.advance(close + 2);
                    return Ok(None);
                }
                let token = if rest.starts_with("{%") {
                    Token::BlockStart
                } else {
                    Token::VarStart
                };
                self.advance(2);
                if self.remaining().starts_with('-') {
                    self.advance(1);
                }
                self.in_tag = true;
                self.lstrip_next = false;
                Ok(Some(token))
            }
            Some(idx) => {
                // Text before tag
                let mut text = &rest[..idx];
                if rest[idx + 2..].starts_with('-') {
                    text = text.trim_end();
                }
                self.advance(idx);
                Ok(Some(self.text_token(text)))
            }
            None => {
                // All text
                self.advance(rest.len());
                Ok(Some(self.text_token(rest)))
            }
        }
    }

    fn text_token(&mut self, text: &str) -> Token {
        let text = if std::mem::take(&mut self.lstrip_next) {
            text.trim_start()
        } else {
            text
        };
        Token::Text(text.to_string())
    }

    fn next_tag_token(&mut self) -> Result<Option<Token>, ParseError> {
        // In tag: skip whitespace
        let rest = self.remaining();
        let rest_trimmed = rest.trim_start();
        self.advance(rest.len() - rest_trimmed.len());

        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        // Check tag ends
        for (marker, strip) in [("-%}", true), ("%}", false)] {
            if rest.starts_with(marker) {
                self.advance(marker.len());
                self.in_tag = false;
                self.lstrip_next = strip;

                if self.trim_blocks {
                    let after = self.remaining();
                    if after.starts_with('\n') {
                        self.advance(1);
                    } else if after.starts_with("\r\n") {
                        self.advance(2);
                    }
                }
                return Ok(Some(Token::BlockEnd));
            }
        }
        for (marker, strip) in [("-}}", true), ("}}", false)] {
            if rest.starts_with(marker) {
                self.advance(marker.len());
                self.in_tag = false;
                self.lstrip_next = strip;
                return Ok(Some(Token::VarEnd));
            }
        }

        // Strings
        if first == '\'' || first == '"' {
            return self.string_literal(first).map(Some);
        }

        if first.is_ascii_digit() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            let mut len = digits;
            let after = &rest[digits..];
            if after.starts_with('.') && after[1..].starts_with(|c: char| c.is_ascii_digit()) {
                len += 1 + after[1..].bytes().take_while(u8::is_ascii_digit).count();
            }
            self.advance(len);
            return Ok(Some(Token::Number(rest[..len].to_string())));
        }

        // Identifiers / Keywords
        if first.is_alphabetic() || first == '_' {
            let len: usize = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            let ident = &rest[..len];
            self.advance(len);

            let token = match ident {
                "if" => Token::If,
                "elif" => Token::Elif,
                "else" => Token::Else,
                "endif" => Token::EndIf,
                "for" => Token::For,
                "in" => Token::In,
                "endfor" => Token::EndFor,
                "set" => Token::Set,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "is" => Token::Is,
                "true" | "True" => Token::True,
                "false" | "False" => Token::False,
                "none" | "None" => Token::None,
                _ => Token::Ident(ident.to_string()),
            };
            return Ok(Some(token));
        }

        // Symbols
        for (symbol, token) in SYMBOLS {
            if rest.starts_with(symbol) {
                self.advance(symbol.len());
                return Ok(Some(token.clone()));
            }
        }

        // Unknown char? Skip one.
        self.advance(first.len_utf8());
        Ok(None)
    }

    fn string_literal(&mut self, quote: char) -> Result<Token, ParseError> {
        let rest = self.remaining();
        let mut s = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.advance(idx + c.len_utf8());
                return Ok(Token::StringLit(s));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, esc)) => s.push(esc),
                    None => break,
                }
            } else {
                s.push(c);
            }
        }
        Err(ParseError::UnterminatedString)
    }
}
