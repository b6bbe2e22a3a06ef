use crate::errors::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `/name`
    Child,
    /// `//name`
    Descendant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// `text()`: the element's own text
    Direct,
    /// `.` or `normalize-space(.)`: normalized text content
    Normalized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Index(usize),
    Last,
    HasAttribute(String),
    AttributeEquals(String, String),
    AttributeContains(String, String),
    TextEquals(TextSource, String),
    TextContains(TextSource, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XPathStep {
    pub axis: Axis,
    /// `None` for `*`
    pub name: Option<String>,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XPathExpr {
    pub steps: Vec<XPathStep>,
    /// `(path)[n]`: index into the whole result set
    pub group_index: Option<usize>,
}

pub fn parse(input: &str) -> Result<XPathExpr, TreeError> {
    XPathParser::new(input).parse_expr()
}

enum Subject {
    Attribute(String),
    Text(TextSource),
}

struct XPathParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> XPathParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> TreeError {
        TreeError::invalid(
            self.source,
            format!("{} at offset {}", reason.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TreeError> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn starts_with(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn eat_token(&mut self, token: &str) -> bool {
        if self.starts_with(token) {
            self.pos += token.chars().count();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_expr(&mut self) -> Result<XPathExpr, TreeError> {
        self.skip_ws();
        let expr = if self.eat('(') {
            let mut inner = self.parse_path()?;
            self.expect(')')?;
            self.skip_ws();
            if self.eat('[') {
                self.skip_ws();
                inner.group_index = Some(self.parse_number()?);
                self.expect(']')?;
            }
            inner
        } else {
            self.parse_path()?
        };
        self.skip_ws();
        if self.pos < self.chars.len() {
            return Err(self.error("trailing input"));
        }
        Ok(expr)
    }

    fn parse_path(&mut self) -> Result<XPathExpr, TreeError> {
        let mut steps = Vec::new();
        loop {
            self.skip_ws();
            let axis = if self.eat_token("//") {
                Axis::Descendant
            } else if self.eat('/') {
                Axis::Child
            } else {
                break;
            };
            self.skip_ws();
            let name = if self.eat('*') {
                None
            } else {
                Some(self.parse_name()?.to_ascii_lowercase())
            };
            let mut predicates = Vec::new();
            loop {
                self.skip_ws();
                if !self.eat('[') {
                    break;
                }
                predicates.push(self.parse_predicate()?);
            }
            steps.push(XPathStep {
                axis,
                name,
                predicates,
            });
        }
        if steps.is_empty() {
            return Err(self.error("expected location path"));
        }
        Ok(XPathExpr {
            steps,
            group_index: None,
        })
    }

    fn parse_name(&mut self) -> Result<String, TreeError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected name"));
        }
        Ok(out)
    }

    fn parse_number(&mut self) -> Result<usize, TreeError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.pos += 1;
        }
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.error("expected positive index")),
        }
    }

    fn parse_predicate(&mut self) -> Result<Predicate, TreeError> {
        self.skip_ws();
        let predicate = if self.peek().map_or(false, |c| c.is_ascii_digit()) {
            Predicate::Index(self.parse_number()?)
        } else if self.eat_token("last()") {
            Predicate::Last
        } else if self.eat_token("contains(") {
            self.skip_ws();
            let subject = self.parse_subject()?;
            self.expect(',')?;
            let needle = self.parse_literal()?;
            self.expect(')')?;
            match subject {
                Subject::Attribute(name) => Predicate::AttributeContains(name, needle),
                Subject::Text(source) => Predicate::TextContains(source, needle),
            }
        } else {
            let subject = self.parse_subject()?;
            self.skip_ws();
            if self.eat('=') {
                let value = self.parse_literal()?;
                match subject {
                    Subject::Attribute(name) => Predicate::AttributeEquals(name, value),
                    Subject::Text(source) => Predicate::TextEquals(source, value),
                }
            } else {
                match subject {
                    Subject::Attribute(name) => Predicate::HasAttribute(name),
                    Subject::Text(_) => return Err(self.error("expected '='")),
                }
            }
        };
        self.expect(']')?;
        Ok(predicate)
    }

    fn parse_subject(&mut self) -> Result<Subject, TreeError> {
        if self.eat('@') {
            return Ok(Subject::Attribute(self.parse_name()?.to_ascii_lowercase()));
        }
        if self.eat_token("text()") {
            return Ok(Subject::Text(TextSource::Direct));
        }
        if self.eat_token("normalize-space(") {
            self.skip_ws();
            if !self.eat_token("text()") {
                self.eat('.');
            }
            self.expect(')')?;
            return Ok(Subject::Text(TextSource::Normalized));
        }
        if self.eat('.') {
            return Ok(Subject::Text(TextSource::Normalized));
        }
        Err(self.error("unsupported predicate"))
    }

    fn parse_literal(&mut self) -> Result<String, TreeError> {
        self.skip_ws();
        if self.eat_token("concat(") {
            let mut out = String::new();
            loop {
                self.skip_ws();
                out.push_str(&self.parse_quoted()?);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                if self.eat(')') {
                    return Ok(out);
                }
                return Err(self.error("malformed concat()"));
            }
        }
        self.parse_quoted()
    }

    fn parse_quoted(&mut self) -> Result<String, TreeError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string literal")),
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }
}
