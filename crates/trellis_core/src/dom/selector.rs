//! CSS selector subset
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`
//! (value bare or quoted), descendant and `>` combinators, and `,` lists.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    Finish, IResult,
};

use crate::error::DomError;

/// One simple selector inside a compound
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Simple {
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

/// `tag#id.class[attr]` with every part optional but at least one present
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compound {
    /// `None` for `*` or when omitted
    pub tag: Option<String>,
    pub simple: Vec<Simple>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// Compounds joined by combinators, left to right
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Complex {
    pub head: Compound,
    pub tail: Vec<(Combinator, Compound)>,
}

/// Comma separated selector list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorList(pub Vec<Complex>);

impl SelectorList {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let parsed = all_consuming(delimited(multispace0, selector_list, multispace0))(input)
            .finish()
            .map(|(_, list)| list);

        parsed.map_err(|err: nom::error::Error<&str>| DomError::InvalidSelector {
            selector: input.to_string(),
            message: if err.input.is_empty() {
                "unexpected end of selector".to_string()
            } else {
                format!("unexpected input at `{}`", err.input)
            },
        })
    }
}

type Res<'a, O> = IResult<&'a str, O>;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn ident(input: &str) -> Res<'_, String> {
    map(take_while1(is_ident_char), str::to_string)(input)
}

fn quoted(input: &str) -> Res<'_, String> {
    alt((
        delimited(char('"'), map(take_while(|c| c != '"'), str::to_string), char('"')),
        delimited(char('\''), map(take_while(|c| c != '\''), str::to_string), char('\'')),
    ))(input)
}

fn attribute(input: &str) -> Res<'_, Simple> {
    map(
        delimited(
            pair(char('['), multispace0),
            pair(
                ident,
                opt(preceded(
                    tuple((multispace0, char('='), multispace0)),
                    alt((quoted, ident)),
                )),
            ),
            pair(multispace0, char(']')),
        ),
        |(name, value)| Simple::Attribute { name, value },
    )(input)
}

fn simple(input: &str) -> Res<'_, Simple> {
    alt((
        map(preceded(char('#'), ident), Simple::Id),
        map(preceded(char('.'), ident), Simple::Class),
        attribute,
    ))(input)
}

fn compound(input: &str) -> Res<'_, Compound> {
    let (rest, tag) = opt(alt((value(None, char('*')), map(ident, Some))))(input)?;
    let (rest, simple) = many0(simple)(rest)?;
    if tag.is_none() && simple.is_empty() && rest.len() == input.len() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Many1,
        )));
    }
    Ok((
        rest,
        Compound {
            tag: tag.flatten().map(|t| t.to_ascii_lowercase()),
            simple,
        },
    ))
}

fn combinator(input: &str) -> Res<'_, Combinator> {
    alt((
        value(
            Combinator::Child,
            tuple((multispace0, char('>'), multispace0)),
        ),
        value(Combinator::Descendant, multispace1),
    ))(input)
}

fn complex(input: &str) -> Res<'_, Complex> {
    map(
        pair(compound, many0(pair(combinator, compound))),
        |(head, tail)| Complex { head, tail },
    )(input)
}

fn selector_list(input: &str) -> Res<'_, SelectorList> {
    map(
        separated_list1(delimited(multispace0, char(','), multispace0), complex),
        SelectorList,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        let list = SelectorList::parse("button.go#main[data-x='1']").unwrap();
        let complex = &list.0[0];
        assert_eq!(complex.head.tag.as_deref(), Some("button"));
        assert_eq!(
            complex.head.simple,
            vec![
                Simple::Class("go".into()),
                Simple::Id("main".into()),
                Simple::Attribute {
                    name: "data-x".into(),
                    value: Some("1".into())
                },
            ]
        );
        assert!(complex.tail.is_empty());
    }

    #[test]
    fn test_parse_combinators_and_lists() {
        let list = SelectorList::parse(" ul > li .label , .other ").unwrap();
        assert_eq!(list.0.len(), 2);
        let first = &list.0[0];
        assert_eq!(first.tail.len(), 2);
        assert_eq!(first.tail[0].0, Combinator::Child);
        assert_eq!(first.tail[1].0, Combinator::Descendant);
    }

    #[test]
    fn test_universal() {
        let list = SelectorList::parse("*").unwrap();
        assert_eq!(list.0[0].head, Compound::default());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse(".").is_err());
        assert!(SelectorList::parse("a >").is_err());
        assert!(SelectorList::parse("[open").is_err());
    }
}
