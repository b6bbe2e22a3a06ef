use cssparser::{BasicParseErrorKind, ParseError, ParseErrorKind, Parser, ParserInput, Token};
use thiserror::Error;

use crate::errors::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// Compound selectors joined by combinators.
///
/// `parts[i].0` is the combinator between `parts[i - 1]` and `parts[i]`; the
/// combinator of the first part is unused.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    pub parts: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub pseudos: Vec<PseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub op: AttrOp,
    pub value: String,
    pub case_insensitive: bool,
}

impl AttributeSelector {
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        if self.op == AttrOp::Exists {
            return true;
        }
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), self.value.to_lowercase())
        } else {
            (actual.to_string(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|token| token == expected),
            AttrOp::DashMatch => actual == expected || actual.starts_with(&format!("{expected}-")),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClass {
    NthOfType(usize),
    NthChild(usize),
    FirstChild,
    LastChild,
    /// Case-insensitive substring of the normalized text content
    HasText(String),
}

/// Why a token stream is not a supported selector.
#[derive(Debug, Clone, Error)]
pub enum SyntaxError {
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),
    #[error("index must be positive, got {0}")]
    BadIndex(i32),
}

type SelectorResult<'i, T> = Result<T, ParseError<'i, SyntaxError>>;

/// Parses a selector list on top of the `cssparser` tokenizer.
pub fn parse(input: &str) -> Result<Vec<ComplexSelector>, TreeError> {
    let mut parser_input = ParserInput::new(input);
    let mut parser = Parser::new(&mut parser_input);
    parse_list(&mut parser).map_err(|err| TreeError::invalid(input, describe(err)))
}

fn describe(err: ParseError<'_, SyntaxError>) -> String {
    let at = format!(
        "line {}, column {}",
        err.location.line + 1,
        err.location.column
    );
    match err.kind {
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
            format!("unexpected {:?} at {}", token, at)
        }
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            format!("unexpected end of input at {}", at)
        }
        ParseErrorKind::Basic(other) => format!("{:?} at {}", other, at),
        ParseErrorKind::Custom(reason) => format!("{} at {}", reason, at),
    }
}

fn parse_list<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, Vec<ComplexSelector>> {
    let mut list = Vec::new();
    loop {
        parser.skip_whitespace();
        list.push(parse_complex(parser)?);
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comma => continue,
            other => return Err(parser.new_unexpected_token_error(other)),
        }
    }
    Ok(list)
}

/// Stops before a `,` or at the end of input.
fn parse_complex<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, ComplexSelector> {
    let mut parts = vec![(Combinator::Descendant, parse_compound(parser)?)];
    loop {
        let mut had_whitespace = false;
        let combinator = loop {
            let state = parser.state();
            let token = match parser.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(ComplexSelector { parts }),
            };
            match token {
                Token::WhiteSpace(_) => had_whitespace = true,
                Token::Delim('>') => break Combinator::Child,
                Token::Delim('+') => break Combinator::Adjacent,
                Token::Delim('~') => break Combinator::Sibling,
                Token::Comma => {
                    parser.reset(&state);
                    return Ok(ComplexSelector { parts });
                }
                _ if had_whitespace => {
                    parser.reset(&state);
                    break Combinator::Descendant;
                }
                other => return Err(parser.new_unexpected_token_error(other)),
            }
        };
        parser.skip_whitespace();
        parts.push((combinator, parse_compound(parser)?));
    }
}

fn parse_compound<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, CompoundSelector> {
    let mut compound = CompoundSelector::default();
    let mut any = false;
    loop {
        let state = parser.state();
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Ident(name) if !any => compound.tag = Some(name.to_ascii_lowercase()),
            Token::Delim('*') if !any => {}
            Token::IDHash(id) => compound.ids.push(id.to_string()),
            Token::Delim('.') => compound.classes.push(adjacent_ident(parser)?),
            Token::SquareBracketBlock => compound
                .attributes
                .push(parser.parse_nested_block(|block| parse_attribute(block))?),
            Token::Colon => compound.pseudos.push(parse_pseudo(parser)?),
            _ => {
                parser.reset(&state);
                break;
            }
        }
        any = true;
    }
    if !any {
        return Err(parser.new_custom_error(SyntaxError::Expected("selector")));
    }
    Ok(compound)
}

/// Identifier directly after `.`; whitespace in between is an error.
fn adjacent_ident<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, String> {
    let token = parser.next_including_whitespace()?.clone();
    match token {
        Token::Ident(name) => Ok(name.to_string()),
        other => Err(parser.new_unexpected_token_error(other)),
    }
}

fn parse_attribute<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, AttributeSelector> {
    let name = parser.expect_ident()?.to_ascii_lowercase();
    if parser.is_exhausted() {
        return Ok(AttributeSelector {
            name,
            op: AttrOp::Exists,
            value: String::new(),
            case_insensitive: false,
        });
    }
    let token = parser.next()?.clone();
    let op = match token {
        Token::Delim('=') => AttrOp::Equals,
        Token::IncludeMatch => AttrOp::Includes,
        Token::DashMatch => AttrOp::DashMatch,
        Token::PrefixMatch => AttrOp::Prefix,
        Token::SuffixMatch => AttrOp::Suffix,
        Token::SubstringMatch => AttrOp::Substring,
        other => return Err(parser.new_unexpected_token_error(other)),
    };
    let value = parser.expect_ident_or_string()?.to_string();
    let mut case_insensitive = false;
    if !parser.is_exhausted() {
        let flag = parser.expect_ident()?.to_ascii_lowercase();
        match flag.as_str() {
            "i" => case_insensitive = true,
            "s" => {}
            _ => return Err(parser.new_custom_error(SyntaxError::Expected("attribute flag"))),
        }
    }
    parser.expect_exhausted()?;
    Ok(AttributeSelector {
        name,
        op,
        value,
        case_insensitive,
    })
}

/// Called after the `:` token.
fn parse_pseudo<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, PseudoClass> {
    let token = parser.next_including_whitespace()?.clone();
    match token {
        Token::Ident(name) => match name.to_ascii_lowercase().as_str() {
            "first-child" => Ok(PseudoClass::FirstChild),
            "last-child" => Ok(PseudoClass::LastChild),
            other => Err(parser.new_custom_error(SyntaxError::UnsupportedPseudo(other.to_string()))),
        },
        Token::Function(name) => match name.to_ascii_lowercase().as_str() {
            "nth-of-type" => parser
                .parse_nested_block(|block| parse_index(block))
                .map(PseudoClass::NthOfType),
            "nth-child" => parser
                .parse_nested_block(|block| parse_index(block))
                .map(PseudoClass::NthChild),
            "has-text" => parser
                .parse_nested_block(|block| parse_quoted(block))
                .map(PseudoClass::HasText),
            other => Err(parser.new_custom_error(SyntaxError::UnsupportedPseudo(other.to_string()))),
        },
        other => Err(parser.new_unexpected_token_error(other)),
    }
}

fn parse_index<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, usize> {
    let index = parser.expect_integer()?;
    parser.expect_exhausted()?;
    match usize::try_from(index) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(parser.new_custom_error(SyntaxError::BadIndex(index))),
    }
}

fn parse_quoted<'i>(parser: &mut Parser<'i, '_>) -> SelectorResult<'i, String> {
    let text = parser.expect_string()?.to_string();
    parser.expect_exhausted()?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> ComplexSelector {
        let mut list = parse(input).unwrap();
        assert_eq!(list.len(), 1);
        list.remove(0)
    }

    #[test]
    fn test_compound_parts() {
        let complex = single(r#"button#go.btn.primary[data-testid="submit-btn"]:nth-of-type(2)"#);
        let compound = &complex.parts[0].1;
        assert_eq!(compound.tag.as_deref(), Some("button"));
        assert_eq!(compound.ids, vec!["go".to_string()]);
        assert_eq!(compound.classes, vec!["btn", "primary"]);
        assert_eq!(compound.attributes[0].name, "data-testid");
        assert_eq!(compound.attributes[0].value, "submit-btn");
        assert_eq!(compound.pseudos, vec![PseudoClass::NthOfType(2)]);
    }

    #[test]
    fn test_combinators() {
        let complex = single("#form > div.row  span + a ~ b");
        let combinators: Vec<_> = complex.parts.iter().skip(1).map(|p| p.0).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Child,
                Combinator::Descendant,
                Combinator::Adjacent,
                Combinator::Sibling
            ]
        );
    }

    #[test]
    fn test_escaped_identifiers() {
        let complex = single(r"#\31 23-id");
        assert_eq!(complex.parts[0].1.ids, vec!["123-id".to_string()]);
        let complex = single(r"#a\:b");
        assert_eq!(complex.parts[0].1.ids, vec!["a:b".to_string()]);
    }

    #[test]
    fn test_serialized_identifiers_parse_back() {
        for raw in ["1st", "-9", "a b", "x.y:z", "caf\u{e9}", "tab\there"] {
            let mut id = String::new();
            cssparser::serialize_identifier(raw, &mut id).unwrap();
            let mut value = String::new();
            cssparser::serialize_string(raw, &mut value).unwrap();
            let complex = single(&format!("#{id}[title={value}]"));
            let compound = &complex.parts[0].1;
            assert_eq!(compound.ids, vec![raw.to_string()], "{id}");
            assert_eq!(compound.attributes[0].value, raw);
        }
    }

    #[test]
    fn test_compound_parts_must_be_adjacent() {
        for bad in ["div . row", "a : first-child", "a:nth-of-type(2n)", "a::before"] {
            assert!(parse(bad).is_err(), "{bad} should be rejected");
        }
        assert_eq!(single("div .row").parts.len(), 2);
    }

    #[test]
    fn test_has_text_and_operators() {
        let complex = single(r#"button:has-text("Sign \"In\"")[id*=log i]"#);
        let compound = &complex.parts[0].1;
        assert_eq!(
            compound.pseudos,
            vec![PseudoClass::HasText("Sign \"In\"".to_string())]
        );
        assert_eq!(compound.attributes[0].op, AttrOp::Substring);
        assert!(compound.attributes[0].case_insensitive);
    }

    #[test]
    fn test_selector_list() {
        assert_eq!(parse("a, b ,c").unwrap().len(), 3);
    }

    #[test]
    fn test_malformed_selectors() {
        for bad in ["[data-x=", "div >", "a:unknown", "#", "a:nth-child(0)", "a)b", "..x"] {
            let err = parse(bad).unwrap_err();
            assert!(err.is_invalid_selector(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_attribute_matching() {
        let sel = |op, value: &str| AttributeSelector {
            name: "class".into(),
            op,
            value: value.into(),
            case_insensitive: false,
        };
        assert!(sel(AttrOp::Includes, "btn").matches(Some("btn primary")));
        assert!(!sel(AttrOp::Includes, "bt").matches(Some("btn primary")));
        assert!(sel(AttrOp::Prefix, "btn").matches(Some("btn-x")));
        assert!(sel(AttrOp::Suffix, "x").matches(Some("btn-x")));
        assert!(sel(AttrOp::DashMatch, "en").matches(Some("en-US")));
        assert!(!sel(AttrOp::Substring, "").matches(Some("anything")));
        assert!(!sel(AttrOp::Exists, "").matches(None));
    }
}
