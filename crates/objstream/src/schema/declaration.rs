// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Textual class declarations.
//!
//! ```text
//! // comment
//! class Circle : Shape version 2 {
//!     f32 r;
//!     f64 center[2];      /* fixed array */
//!     string label;
//!     Vec3 origin;        // embedded object
//!     Node* next;         // pointer
//!     ref owner;          // cross-graph reference
//!     vec<u16> samples;   // collection
//! }
//! ```
//!
//! Several classes may appear in one document. Whitespace and comments do not
//! affect the resulting descriptor or its checksum.

use super::descriptor::ClassDescriptor;
use super::member::{ElementKind, MemberDescriptor, MemberKind};
use super::primitive::PrimitiveKind;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(u32),
    Punct(char),
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
        }
    }

    fn err(&self, reason: impl Into<String>) -> Error {
        Error::Declaration {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.chars.peek().copied() {
                Some((_, '\n')) => {
                    self.line += 1;
                    self.chars.next();
                }
                Some((_, c)) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some((i, '/')) => {
                    let rest = &self.src[i..];
                    if rest.starts_with("//") {
                        while let Some((_, c)) = self.chars.next() {
                            if c == '\n' {
                                self.line += 1;
                                break;
                            }
                        }
                    } else if rest.starts_with("/*") {
                        self.chars.next();
                        self.chars.next();
                        let mut closed = false;
                        let mut prev = '\0';
                        for (_, c) in self.chars.by_ref() {
                            if c == '\n' {
                                self.line += 1;
                            }
                            if prev == '*' && c == '/' {
                                closed = true;
                                break;
                            }
                            prev = c;
                        }
                        if !closed {
                            return Err(self.err("unterminated block comment"));
                        }
                    } else {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>> {
        self.skip_trivia()?;
        let line = self.line;
        let Some((start, c)) = self.chars.next() else {
            return Ok(None);
        };
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(i, c)) = self.chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == ':' && self.is_path_sep(i) {
                    self.chars.next();
                    end = i + c.len_utf8();
                } else {
                    break;
                }
            }
            return Ok(Some((Token::Ident(self.src[start..end].to_string()), line)));
        }
        if c.is_ascii_digit() {
            let mut end = start + 1;
            while let Some(&(i, c)) = self.chars.peek() {
                if c.is_ascii_digit() {
                    self.chars.next();
                    end = i + 1;
                } else {
                    break;
                }
            }
            let n = self.src[start..end]
                .parse()
                .map_err(|_| self.err("number out of range"))?;
            return Ok(Some((Token::Number(n), line)));
        }
        match c {
            '{' | '}' | '[' | ']' | '<' | '>' | ';' | ':' | ',' | '*' => {
                Ok(Some((Token::Punct(c), line)))
            }
            other => Err(self.err(format!("unexpected character {:?}", other))),
        }
    }

    // `::` inside an identifier is a namespace separator, a lone `:` is not.
    fn is_path_sep(&self, i: usize) -> bool {
        let rest = &self.src[i..];
        rest.starts_with("::") || (i > 0 && self.src[..i].ends_with(':'))
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(1)
    }

    fn err(&self, reason: impl Into<String>) -> Error {
        Error::Declaration {
            line: self.line(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        t
    }

    fn expect_punct(&mut self, p: char) -> Result<()> {
        match self.next() {
            Some(Token::Punct(c)) if c == p => Ok(()),
            other => Err(self.err(format!("expected '{}', found {:?}", p, other))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(self.err(format!("expected identifier, found {:?}", other))),
        }
    }

    fn eat_punct(&mut self, p: char) -> bool {
        if self.peek() == Some(&Token::Punct(p)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn class(&mut self) -> Result<ClassDescriptor> {
        match self.next() {
            Some(Token::Ident(kw)) if kw == "class" => {}
            other => return Err(self.err(format!("expected 'class', found {:?}", other))),
        }
        let name = self.expect_ident()?;
        let mut members = Vec::new();

        if self.eat_punct(':') {
            loop {
                let base = self.expect_ident()?;
                members.push(MemberDescriptor::new(
                    base.clone(),
                    MemberKind::Base { class: base },
                ));
                if !self.eat_punct(',') {
                    break;
                }
            }
        }

        let version = match self.peek() {
            Some(Token::Ident(kw)) if kw == "version" => {
                self.pos += 1;
                match self.next() {
                    Some(Token::Number(n)) => n,
                    other => {
                        return Err(self.err(format!("expected version number, found {:?}", other)))
                    }
                }
            }
            _ => 1,
        };

        self.expect_punct('{')?;
        while !self.eat_punct('}') {
            let line = self.line();
            let member = self.member()?;
            if members.iter().any(|m: &MemberDescriptor| m.name == member.name) {
                return Err(Error::Declaration {
                    line,
                    reason: format!("duplicate member {}", member.name),
                });
            }
            members.push(member);
        }
        self.eat_punct(';');

        Ok(ClassDescriptor::new(name, version, members))
    }

    fn member(&mut self) -> Result<MemberDescriptor> {
        let ty = self.expect_ident()?;
        let kind = if ty == "vec" {
            self.expect_punct('<')?;
            let elem = self.expect_ident()?;
            self.expect_punct('>')?;
            let element = match (elem.as_str(), PrimitiveKind::from_name(&elem)) {
                (_, Some(k)) => ElementKind::Primitive(k),
                ("string", None) => ElementKind::Text,
                (_, None) => ElementKind::Object(elem),
            };
            MemberKind::Collection { element }
        } else if ty == "string" {
            MemberKind::Text
        } else if ty == "ref" {
            MemberKind::Reference
        } else if let Some(k) = PrimitiveKind::from_name(&ty) {
            MemberKind::Primitive(k)
        } else if self.eat_punct('*') {
            MemberKind::Pointer { class: ty }
        } else {
            MemberKind::Object { class: ty }
        };

        let name = self.expect_ident()?;

        let kind = if self.eat_punct('[') {
            let len = match self.next() {
                Some(Token::Number(n)) if n > 0 => n,
                other => return Err(self.err(format!("bad array dimension {:?}", other))),
            };
            self.expect_punct(']')?;
            match kind {
                MemberKind::Primitive(k) => MemberKind::FixedArray { kind: k, len },
                other => {
                    return Err(self.err(format!(
                        "fixed arrays must hold primitives, not {}",
                        other
                    )))
                }
            }
        } else {
            kind
        };

        self.expect_punct(';')?;
        Ok(MemberDescriptor::new(name, kind))
    }
}

impl ClassDescriptor {
    /// Parse every class declared in `src`, in order.
    pub fn parse_all(src: &str) -> Result<Vec<ClassDescriptor>> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while let Some(t) = lexer.next_token()? {
            tokens.push(t);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let mut out = Vec::new();
        while parser.peek().is_some() {
            out.push(parser.class()?);
        }
        Ok(out)
    }

    /// Parse exactly one class declaration.
    pub fn parse(src: &str) -> Result<ClassDescriptor> {
        let mut all = Self::parse_all(src)?;
        if all.len() != 1 {
            return Err(Error::Declaration {
                line: 1,
                reason: format!("expected exactly one class, found {}", all.len()),
            });
        }
        Ok(all.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_declaration() {
        let d = ClassDescriptor::parse(
            "class Circle : Shape version 2 {
                f32 r;
                f64 center[2];
                string label;
                Vec3 origin;
                Node* next;
                ref owner;
                vec<u16> samples;
                vec<string> tags;
                vec<Hit> hits;
            }",
        )
        .unwrap();
        assert_eq!(d.name(), "Circle");
        assert_eq!(d.version(), 2);
        let kinds: Vec<String> = d.members().iter().map(|m| m.kind.to_string()).collect();
        assert_eq!(
            kinds,
            vec![
                "base Shape",
                "f32",
                "f64[2]",
                "string",
                "Vec3",
                "Node*",
                "ref",
                "vec<u16>",
                "vec<string>",
                "vec<Hit>"
            ]
        );
    }

    #[test]
    fn test_formatting_does_not_change_checksum() {
        let compact = ClassDescriptor::parse("class P version 1 { i32 a; f64 b[3]; }").unwrap();
        let noisy = ClassDescriptor::parse(
            "// point type\n\
             class   P\n\
             version 1\n\
             {\n\
                 /* first */ i32   a ;\n\
                 f64 b [ 3 ] ; // trailing\n\
             } ;\n",
        )
        .unwrap();
        assert_eq!(compact.checksum(), noisy.checksum());
        assert_eq!(compact, noisy);
    }

    #[test]
    fn test_version_defaults_to_one_and_namespaces_parse() {
        let d = ClassDescriptor::parse("class ns::Hit { ns::Vec3 pos; }").unwrap();
        assert_eq!(d.version(), 1);
        assert_eq!(d.name(), "ns::Hit");
        assert_eq!(d.members()[0].kind.nested_class(), Some("ns::Vec3"));
    }

    #[test]
    fn test_parse_all_multiple_classes() {
        let all = ClassDescriptor::parse_all(
            "class A { i8 x; }\nclass B : A version 4 { A inner; }",
        )
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].members()[0].kind, MemberKind::Base { class: "A".into() });
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = ClassDescriptor::parse("class A {\n  i32 a;\n  i32 a;\n}").unwrap_err();
        match err {
            Error::Declaration { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert!(ClassDescriptor::parse("class A { string s[2]; }").is_err());
        assert!(ClassDescriptor::parse("class A { i32 a }").is_err());
        assert!(ClassDescriptor::parse("class A { /* open").is_err());
        assert!(ClassDescriptor::parse("").is_err());
    }
}
