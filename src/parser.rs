use std::path::PathBuf;
use std::str::FromStr;

use nom::{
    bytes::complete::{take_till1, take_until},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{delimited, pair},
    IResult,
};
use strum::VariantNames;

use crate::error::{MarqueeError, Result};
use crate::model::MpaaRating;

/// One input line split into the command token and its raw parameters.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CommandLine<'a> {
    pub name: &'a str,
    pub params: &'a str,
}

// --- BASIC PARSERS ---

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn parse_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

fn parse_i64(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i64>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn snippet(input: &str) -> String {
    if input.chars().count() > 20 {
        format!("{}...", input.chars().take(20).collect::<String>())
    } else {
        input.to_string()
    }
}

// --- PUBLIC ENTRY POINTS ---

/// Splits a line into command and parameters. Blank lines yield `None`.
pub fn split_command(line: &str) -> Option<CommandLine<'_>> {
    let line = line.trim();
    let (rest, name) = token(line).ok()?;
    Some(CommandLine { name, params: rest.trim() })
}

/// A single unsigned id, nothing else.
pub fn parse_id(params: &str) -> Result<u64> {
    if params.trim().is_empty() {
        return Err(MarqueeError::MissingParam("id"));
    }
    all_consuming(ws(parse_u64))(params)
        .map(|(_, id)| id)
        .map_err(|_| MarqueeError::Parse(format!("'{}' is not a valid id", snippet(params))))
}

/// A signed integer, as typed at a numeric prompt.
pub fn parse_integer(input: &str) -> Result<i64> {
    all_consuming(ws(parse_i64))(input)
        .map(|(_, n)| n)
        .map_err(|_| MarqueeError::Parse(format!("'{}' is not an integer", snippet(input))))
}

pub fn parse_rating(params: &str) -> Result<MpaaRating> {
    if params.trim().is_empty() {
        return Err(MarqueeError::MissingParam("mpaa rating"));
    }
    let (_, name) = all_consuming(ws(token))(params)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            MarqueeError::Parse(format!("expected one rating, got '{}'", snippet(params)))
        })?;
    MpaaRating::from_str(name).map_err(|_| {
        MarqueeError::Parse(format!(
            "unknown rating '{}', expected one of: {}",
            name,
            MpaaRating::VARIANTS.join(", ")
        ))
    })
}

/// A script path, optionally wrapped in double quotes.
pub fn parse_path(params: &str) -> Result<PathBuf> {
    let params = params.trim();
    if params.is_empty() {
        return Err(MarqueeError::MissingParam("file name"));
    }
    if params.starts_with('"') {
        return all_consuming(ws(parse_quoted_string))(params)
            .map(|(_, path)| PathBuf::from(path))
            .map_err(|_| MarqueeError::Parse(format!("Invalid syntax near: '{}'", snippet(params))));
    }
    Ok(PathBuf::from(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_params() {
        let cmd = split_command("  update   42  \n").unwrap();
        assert_eq!(cmd, CommandLine { name: "update", params: "42" });

        let cmd = split_command("show").unwrap();
        assert_eq!(cmd.params, "");

        assert!(split_command("   \t ").is_none());
    }

    #[test]
    fn ids_must_be_a_single_number() {
        assert_eq!(parse_id(" 17 ").unwrap(), 17);
        assert!(matches!(parse_id(""), Err(MarqueeError::MissingParam(_))));
        assert!(parse_id("-3").is_err());
        assert!(parse_id("4 5").is_err());
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn integers_accept_a_sign() {
        assert_eq!(parse_integer("-161").unwrap(), -161);
        assert_eq!(parse_integer(" 232 ").unwrap(), 232);
        assert!(parse_integer("1.5").is_err());
        assert!(parse_integer("").is_err());
    }

    #[test]
    fn ratings_parse_by_name() {
        assert_eq!(parse_rating("PG_13").unwrap(), MpaaRating::Pg13);
        assert!(parse_rating("PG 13").is_err());
        let err = parse_rating("X").unwrap_err().to_string();
        assert!(err.contains("NC_17"));
    }

    #[test]
    fn paths_may_be_quoted() {
        assert_eq!(parse_path("scripts/a.txt").unwrap(), PathBuf::from("scripts/a.txt"));
        assert_eq!(parse_path("\"my script.txt\"").unwrap(), PathBuf::from("my script.txt"));
        assert!(parse_path("\"unterminated").is_err());
        assert!(parse_path("").is_err());
    }
}
