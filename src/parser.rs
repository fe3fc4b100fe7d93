//! The grammar front end: text in the EBNF-superset syntax to a syntax tree.
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::{char, digit1, multispace1};
use nom::combinator::{all_consuming, cut, map, map_res, opt, value};
use nom::error::{convert_error, ErrorKind, ParseError, VerboseError};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::grammar::GrammarError;

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// One expression on the right hand side of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    /// A byte string literal. May be empty, which denotes ε.
    Literal(Vec<u8>),
    /// A regular expression, kept as written.
    Regex(String),
    /// A reference to a nonterminal by name.
    Symbol(String),
    /// `any!`: exactly one arbitrary vocabulary token.
    AnyToken,
    /// `except!(pattern[, max_tokens])`.
    Except {
        pattern: Box<Expr>,
        max_tokens: Option<u32>,
    },
    Concat(Vec<Expr>),
    Alt(Vec<Expr>),
    Optional(Box<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
}

/// One `LHS ::= RHS;` rule as written, before same-LHS merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRule {
    pub(crate) lhs: String,
    pub(crate) rhs: Expr,
}

pub(crate) fn parse(input: &str) -> Result<Vec<RawRule>, GrammarError> {
    match grammar(input) {
        Ok((_, rules)) => Ok(rules),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(GrammarError::Parse(convert_error(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(GrammarError::Parse("unexpected end of input".to_string()))
        }
    }
}

fn comment(input: &str) -> PResult<()> {
    value((), tuple((tag("(*"), take_until("*)"), tag("*)"))))(input)
}

/// Skips whitespace and `(* ... *)` comments.
fn sc(input: &str) -> PResult<()> {
    value((), many0(alt((value((), multispace1), comment))))(input)
}

fn symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> PResult<&str> {
    let (rest, name) = take_while1(symbol_char)(input)?;
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::Alpha,
        )));
    }
    Ok((rest, name))
}

fn hex_value(c: char) -> Option<u32> {
    c.to_digit(16)
}

/// Parses a quoted byte string with `\n`, `\r`, `\t`, `\\`, `\'`, `\"`,
/// `\xHH` and `\uHHHH` escapes. Non-ASCII characters contribute their UTF-8
/// bytes.
fn quoted(delimiter: char) -> impl Fn(&str) -> PResult<Vec<u8>> {
    move |input: &str| {
        let (body, _) = char(delimiter)(input)?;
        let mut bytes = Vec::new();
        let mut chars = body.char_indices();
        while let Some((offset, c)) = chars.next() {
            if c == delimiter {
                return Ok((&body[offset + c.len_utf8()..], bytes));
            }
            if c != '\\' {
                let mut buffer = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
                continue;
            }
            let escape = match chars.next() {
                Some((_, e)) => e,
                None => {
                    return Err(nom::Err::Failure(VerboseError::from_error_kind(
                        body,
                        ErrorKind::Escaped,
                    )))
                }
            };
            match escape {
                'n' => bytes.push(b'\n'),
                'r' => bytes.push(b'\r'),
                't' => bytes.push(b'\t'),
                '0' => bytes.push(0),
                '\\' => bytes.push(b'\\'),
                '\'' => bytes.push(b'\''),
                '"' => bytes.push(b'"'),
                'x' => {
                    let mut v = 0u32;
                    for _ in 0..2 {
                        match chars.next().and_then(|(_, h)| hex_value(h)) {
                            Some(d) => v = v * 16 + d,
                            None => {
                                return Err(nom::Err::Failure(VerboseError::from_error_kind(
                                    body,
                                    ErrorKind::HexDigit,
                                )))
                            }
                        }
                    }
                    bytes.push(v as u8);
                }
                'u' => {
                    let mut v = 0u32;
                    for _ in 0..4 {
                        match chars.next().and_then(|(_, h)| hex_value(h)) {
                            Some(d) => v = v * 16 + d,
                            None => {
                                return Err(nom::Err::Failure(VerboseError::from_error_kind(
                                    body,
                                    ErrorKind::HexDigit,
                                )))
                            }
                        }
                    }
                    match char::from_u32(v) {
                        Some(c) => {
                            let mut buffer = [0u8; 4];
                            bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
                        }
                        None => {
                            return Err(nom::Err::Failure(VerboseError::from_error_kind(
                                body,
                                ErrorKind::Char,
                            )))
                        }
                    }
                }
                _ => {
                    return Err(nom::Err::Failure(VerboseError::from_error_kind(
                        body,
                        ErrorKind::Escaped,
                    )))
                }
            }
        }
        Err(nom::Err::Failure(VerboseError::from_error_kind(
            input,
            ErrorKind::Char,
        )))
    }
}

/// Parses the body of `#'...'` or `#"..."`. The pattern is kept raw; only an
/// escaped delimiter is unescaped so delimiters can occur inside the regex.
fn regex_body(delimiter: char) -> impl Fn(&str) -> PResult<String> {
    move |input: &str| {
        let mut pattern = String::new();
        let mut chars = input.char_indices();
        while let Some((offset, c)) = chars.next() {
            if c == delimiter {
                return Ok((&input[offset + c.len_utf8()..], pattern));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, e)) if e == delimiter => pattern.push(e),
                    Some((_, e)) => {
                        pattern.push('\\');
                        pattern.push(e);
                    }
                    None => {
                        return Err(nom::Err::Failure(VerboseError::from_error_kind(
                            input,
                            ErrorKind::Escaped,
                        )))
                    }
                }
                continue;
            }
            pattern.push(c);
        }
        Err(nom::Err::Failure(VerboseError::from_error_kind(
            input,
            ErrorKind::Char,
        )))
    }
}

fn regex(input: &str) -> PResult<Expr> {
    let (rest, _) = char('#')(input)?;
    let (rest, delimiter) = alt((char('\''), char('"')))(rest)?;
    let (rest, pattern) = regex_body(delimiter)(rest)?;
    Ok((rest, Expr::Regex(pattern)))
}

fn punct<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    preceded(sc, char(c))
}

fn number(input: &str) -> PResult<u32> {
    map_res(preceded(sc, digit1), str::parse::<u32>)(input)
}

fn except(input: &str) -> PResult<Expr> {
    preceded(
        tag("except!"),
        cut(map(
            delimited(
                punct('('),
                pair(alternation, opt(preceded(punct(','), number))),
                punct(')'),
            ),
            |(pattern, max_tokens)| Expr::Except {
                pattern: Box::new(pattern),
                max_tokens,
            },
        )),
    )(input)
}

fn primary(input: &str) -> PResult<Expr> {
    preceded(
        sc,
        alt((
            map(quoted('\''), Expr::Literal),
            map(quoted('"'), Expr::Literal),
            regex,
            value(Expr::AnyToken, tag("any!")),
            except,
            map(identifier, |name| Expr::Symbol(name.to_string())),
            delimited(punct('('), alternation, punct(')')),
        )),
    )(input)
}

fn postfix(input: &str) -> PResult<Expr> {
    let (rest, (mut expr, operators)) = pair(
        primary,
        many0(preceded(sc, alt((char('?'), char('*'), char('+'))))),
    )(input)?;
    for op in operators {
        expr = match op {
            '?' => Expr::Optional(Box::new(expr)),
            '*' => Expr::ZeroOrMore(Box::new(expr)),
            _ => Expr::OneOrMore(Box::new(expr)),
        };
    }
    Ok((rest, expr))
}

fn concatenation(input: &str) -> PResult<Expr> {
    map(many1(postfix), |mut exprs| {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Concat(exprs)
        }
    })(input)
}

fn alternation(input: &str) -> PResult<Expr> {
    map(
        separated_list1(punct('|'), concatenation),
        |mut branches| {
            if branches.len() == 1 {
                branches.remove(0)
            } else {
                Expr::Alt(branches)
            }
        },
    )(input)
}

fn rule(input: &str) -> PResult<RawRule> {
    let (rest, lhs) = preceded(sc, identifier)(input)?;
    let (rest, _) = preceded(sc, tag("::="))(rest)?;
    let (rest, rhs) = cut(terminated(alternation, punct(';')))(rest)?;
    Ok((
        rest,
        RawRule {
            lhs: lhs.to_string(),
            rhs,
        },
    ))
}

fn grammar(input: &str) -> PResult<Vec<RawRule>> {
    all_consuming(terminated(many1(rule), sc))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> Expr {
        let rules = parse(input).unwrap();
        assert_eq!(rules.len(), 1);
        rules.into_iter().next().unwrap().rhs
    }

    #[test]
    fn literals_and_escapes() {
        assert_eq!(
            parse_one(r"start ::= 'a\n\x41B';"),
            Expr::Literal(vec![b'a', b'\n', b'A', b'B'])
        );
        assert_eq!(parse_one(r#"start ::= "say \"hi\"";"#), {
            Expr::Literal(b"say \"hi\"".to_vec())
        });
    }

    #[test]
    fn regex_keeps_pattern_raw() {
        assert_eq!(
            parse_one(r"start ::= #'[0-9]+\n';"),
            Expr::Regex(r"[0-9]+\n".to_string())
        );
        assert_eq!(
            parse_one(r"start ::= #'don\'t';"),
            Expr::Regex("don't".to_string())
        );
    }

    #[test]
    fn operators_and_grouping() {
        let expr = parse_one("start ::= ('a' | b)* c?;");
        assert_eq!(
            expr,
            Expr::Concat(vec![
                Expr::ZeroOrMore(Box::new(Expr::Alt(vec![
                    Expr::Literal(b"a".to_vec()),
                    Expr::Symbol("b".to_string()),
                ]))),
                Expr::Optional(Box::new(Expr::Symbol("c".to_string()))),
            ])
        );
    }

    #[test]
    fn exclusion_forms() {
        assert_eq!(
            parse_one("start ::= except!('a' | 'b', 3);"),
            Expr::Except {
                pattern: Box::new(Expr::Alt(vec![
                    Expr::Literal(b"a".to_vec()),
                    Expr::Literal(b"b".to_vec()),
                ])),
                max_tokens: Some(3),
            }
        );
        assert_eq!(parse_one("start ::= any!;"), Expr::AnyToken);
    }

    #[test]
    fn comments_and_multiple_rules() {
        let rules = parse("(* header *) a ::= b; (* mid *) b ::= 'x';").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].lhs, "a");
        assert_eq!(rules[1].lhs, "b");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("start ::= 'a'").is_err());
        assert!(parse("::= 'a';").is_err());
        assert!(parse("start ::= 'a'; trailing").is_err());
    }
}
