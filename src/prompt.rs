use std::io::{BufRead, Write};
use std::str::FromStr;

use strum::VariantNames;

use crate::config::SessionConfig;
use crate::error::{MarqueeError, Result};
use crate::model::{check_name, check_positive, Color, Coordinates, Country, MovieFields, MpaaRating, Person};
use crate::parser::parse_integer;

/// Reads a record field by field from the active input source.
///
/// Every field goes through [`Prompter::ask`], which re-asks on invalid input
/// until the configured attempt bound is hit.
pub struct Prompter<'a, W: Write> {
    input: &'a mut dyn BufRead,
    out: &'a mut W,
    max_attempts: Option<u32>,
    show_hints: bool,
}

impl<'a, W: Write> Prompter<'a, W> {
    pub fn new(input: &'a mut dyn BufRead, out: &'a mut W, config: &SessionConfig) -> Self {
        Self {
            input,
            out,
            max_attempts: config.max_attempts,
            show_hints: config.show_hints,
        }
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text).map_err(|e| MarqueeError::io("<output>", e))
    }

    fn read_line(&mut self, field: &'static str) -> Result<String> {
        match read_text_line(&mut *self.input)? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(MarqueeError::InputClosed(field)),
        }
    }

    /// Asks for `field` until `parse` accepts the answer.
    pub fn ask<T, F>(&mut self, field: &'static str, hint: &str, parse: F) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        let mut failures = 0u32;
        loop {
            if self.show_hints {
                self.say(&format!("Enter {} {}", field, hint))?;
            }
            let answer = self.read_line(field)?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    match self.max_attempts {
                        Some(max) if failures >= max => {
                            self.say(&format!("[\u{2717}] {}", e))?;
                            return Err(MarqueeError::AttemptsExhausted(field));
                        }
                        Some(max) => {
                            self.say(&format!("[\u{2717}] {}. Attempts left: {}", e, max - failures))?
                        }
                        None => self.say(&format!("[\u{2717}] {}. Try again.", e))?,
                    }
                }
            }
        }
    }

    pub fn read_movie(&mut self) -> Result<MovieFields> {
        let name = self.ask("movie name", "(cannot be empty)", |s| check_name("name", s))?;
        let x = self.ask("x coordinate", "(must be greater than -162)", |s| {
            let n = parse_integer(s)?;
            let x = i32::try_from(n).map_err(|_| MarqueeError::validation("x", "out of range"))?;
            Coordinates::check_x(x)
        })?;
        let y = self.ask("y coordinate", "(must be at most 232)", |s| {
            parse_integer(s).and_then(Coordinates::check_y)
        })?;
        let coordinates = Coordinates::new(x, y)?;

        let oscars_count = self.ask("oscars count", "(greater than 0, empty line for none)", |s| {
            optional(s, |s| parse_integer(s).and_then(|n| check_positive::<u32>("oscarsCount", n)))
        })?;
        let golden_palm_count = self.ask("golden palm count", "(greater than 0)", |s| {
            parse_integer(s).and_then(|n| check_positive::<u32>("goldenPalmCount", n))
        })?;
        let length = self.ask("length", "(greater than 0)", |s| {
            parse_integer(s).and_then(|n| check_positive::<u64>("length", n))
        })?;

        let rating_hint = format!("({}, empty line for none)", MpaaRating::VARIANTS.join(", "));
        let mpaa_rating = self.ask("mpaa rating", &rating_hint, |s| {
            optional(s, |s| parse_enum::<MpaaRating>("mpaaRating", MpaaRating::VARIANTS, s))
        })?;

        let screenwriter = self.read_person()?;

        Ok(MovieFields {
            name,
            coordinates,
            oscars_count,
            golden_palm_count,
            length,
            mpaa_rating,
            screenwriter,
        })
    }

    /// Asks whether there is a screenwriter first; `None` if the answer is no.
    pub fn read_person(&mut self) -> Result<Option<Person>> {
        let wanted = self.ask("screenwriter", "[Y/N]", parse_yes_no)?;
        if !wanted {
            return Ok(None);
        }

        let name = self.ask("person name", "(cannot be empty)", |s| check_name("person name", s))?;
        let weight = self.ask("person weight", "(greater than 0, empty line for none)", |s| {
            optional(s, |s| parse_integer(s).and_then(|n| check_positive::<u32>("weight", n)))
        })?;
        let colors = format!("({})", Color::VARIANTS.join(", "));
        let eye_color = self.ask("eye color", &colors, |s| parse_enum::<Color>("eyeColor", Color::VARIANTS, s))?;
        let hair_color = self.ask("hair color", &colors, |s| parse_enum::<Color>("hairColor", Color::VARIANTS, s))?;
        let countries = format!("({}, empty line for none)", Country::VARIANTS.join(", "));
        let nationality = self.ask("nationality", &countries, |s| {
            optional(s, |s| parse_enum::<Country>("nationality", Country::VARIANTS, s))
        })?;

        Person::new(&name, weight, eye_color, hair_color, nationality).map(Some)
    }
}

/// Reads one line, `None` at end of input.
/// Bytes that are not UTF-8 are replaced, so a garbled line fails as a bad
/// value instead of ending the input.
pub(crate) fn read_text_line(input: &mut dyn BufRead) -> Result<Option<String>> {
    let mut bytes = Vec::new();
    let read = input
        .read_until(b'\n', &mut bytes)
        .map_err(|e| MarqueeError::io("<input>", e))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Empty answer means "unset".
fn optional<T>(raw: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        parse(raw).map(Some)
    }
}

fn parse_enum<T: FromStr>(field: &'static str, names: &[&str], raw: &str) -> Result<T> {
    T::from_str(raw).map_err(|_| {
        MarqueeError::validation(field, format!("'{}' is not one of {}", raw, names.join(", ")))
    })
}

fn parse_yes_no(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(MarqueeError::validation("answer", "expected Y or N")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter_run<T>(
        script: &str,
        max_attempts: u32,
        f: impl FnOnce(&mut Prompter<'_, Vec<u8>>) -> Result<T>,
    ) -> (Result<T>, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let config = SessionConfig::default().with_max_attempts(max_attempts);
        let result = {
            let mut prompter = Prompter::new(&mut input, &mut out, &config);
            f(&mut prompter)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn reads_a_full_movie_without_screenwriter() {
        let (fields, _) = prompter_run("Nope\n10\n20\n3\n1\n90\n\nN\n", 5, |p| p.read_movie());
        let fields = fields.unwrap();
        assert_eq!(fields.name, "Nope");
        assert_eq!(fields.coordinates, Coordinates::new(10, 20).unwrap());
        assert_eq!(fields.oscars_count, Some(3));
        assert_eq!(fields.mpaa_rating, None);
        assert!(fields.screenwriter.is_none());
    }

    #[test]
    fn retries_invalid_fields() {
        let input = "\nNope\n-500\n10\n20\n0\n3\n1\n90\nPG\nY\nPeele\n\nBROWN\nBLACK\n\n";
        let (fields, out) = prompter_run(input, 5, |p| p.read_movie());
        let fields = fields.unwrap();
        assert_eq!(fields.name, "Nope");
        assert_eq!(fields.coordinates.x(), 10);
        assert_eq!(fields.mpaa_rating, Some(MpaaRating::Pg));
        let writer = fields.screenwriter.unwrap();
        assert_eq!(writer.name(), "Peele");
        assert_eq!(writer.weight(), None);
        assert_eq!(writer.eye_color(), Color::Brown);
        assert!(out.contains("Attempts left: 4"));
    }

    #[test]
    fn gives_up_after_the_attempt_bound() {
        let (result, _) = prompter_run("\n\n\nNope\n", 3, |p| p.read_movie());
        assert!(matches!(result, Err(MarqueeError::AttemptsExhausted("movie name"))));
    }

    #[test]
    fn garbled_number_is_retried() {
        let mut script = b"Nope\n\xff\xfe\n".to_vec();
        script.extend_from_slice(b"10\n20\n\n1\n90\n\nN\n");
        let mut input = Cursor::new(script);
        let mut out = Vec::new();
        let config = SessionConfig::default().quiet();

        let fields = Prompter::new(&mut input, &mut out, &config).read_movie().unwrap();
        assert_eq!(fields.coordinates.x(), 10);
        assert!(String::from_utf8(out).unwrap().contains("is not an integer"));
    }

    #[test]
    fn screenwriter_gate_needs_an_answer() {
        let (person, out) = prompter_run("\nmaybe\nn\n", 5, |p| p.read_person());
        assert!(person.unwrap().is_none());
        assert!(out.contains("Attempts left: 3"));
    }

    #[test]
    fn end_of_input_aborts_entry() {
        let (result, _) = prompter_run("Nope\n10\n", 0, |p| p.read_movie());
        assert!(matches!(result, Err(MarqueeError::InputClosed("y coordinate"))));
    }
}
