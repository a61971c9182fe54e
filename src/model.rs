use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use strum::{Display, EnumString, VariantNames};

use crate::error::{MarqueeError, Result};

/// `x` must be strictly greater than this.
pub const X_LOWER_BOUND: i32 = -162;
/// `y` may not exceed this.
pub const Y_UPPER_BOUND: i64 = 232;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[strum(ascii_case_insensitive)]
pub enum MpaaRating {
    #[strum(serialize = "G")]
    #[serde(rename = "G")]
    G,
    #[strum(serialize = "PG")]
    #[serde(rename = "PG")]
    Pg,
    #[strum(serialize = "PG_13")]
    #[serde(rename = "PG_13")]
    Pg13,
    #[strum(serialize = "R")]
    #[serde(rename = "R")]
    R,
    #[strum(serialize = "NC_17")]
    #[serde(rename = "NC_17")]
    Nc17,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Green,
    Red,
    Black,
    Blue,
    Yellow,
    Brown,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Country {
    Russia,
    UnitedKingdom,
    Germany,
    Italy,
    NorthKorea,
}

// --- FIELD CHECKS ---

/// Non-empty after trimming.
pub fn check_name(field: &'static str, raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(MarqueeError::validation(field, "must not be empty"));
    }
    Ok(name.to_string())
}

/// Strictly positive and representable as `T`.
pub fn check_positive<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T> {
    if value <= 0 {
        return Err(MarqueeError::validation(field, format!("must be greater than 0, got {}", value)));
    }
    T::try_from(value).map_err(|_| MarqueeError::validation(field, format!("{} is out of range", value)))
}

/// XY position of a movie. Both bounds are enforced on construction.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinates {
    x: i32,
    y: i64,
}

impl Coordinates {
    pub fn new(x: i32, y: i64) -> Result<Self> {
        Ok(Self { x: Self::check_x(x)?, y: Self::check_y(y)? })
    }

    pub fn check_x(x: i32) -> Result<i32> {
        if x > X_LOWER_BOUND {
            Ok(x)
        } else {
            Err(MarqueeError::validation("x", format!("must be greater than {}, got {}", X_LOWER_BOUND, x)))
        }
    }

    pub fn check_y(y: i64) -> Result<i64> {
        if y <= Y_UPPER_BOUND {
            Ok(y)
        } else {
            Err(MarqueeError::validation("y", format!("must be at most {}, got {}", Y_UPPER_BOUND, y)))
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={}, y={}", self.x, self.y)
    }
}

/// A screenwriter.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<u32>,
    eye_color: Color,
    hair_color: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    nationality: Option<Country>,
}

impl Person {
    pub fn new(
        name: &str,
        weight: Option<u32>,
        eye_color: Color,
        hair_color: Color,
        nationality: Option<Country>,
    ) -> Result<Self> {
        let name = check_name("person name", name)?;
        if weight == Some(0) {
            return Err(MarqueeError::validation("weight", "must be greater than 0"));
        }
        Ok(Self { name, weight, eye_color, hair_color, nationality })
    }

    /// Replaces every field. Runs the same checks as `new` and leaves `self`
    /// untouched when they fail.
    pub fn update(
        &mut self,
        name: &str,
        weight: Option<u32>,
        eye_color: Color,
        hair_color: Color,
        nationality: Option<Country>,
    ) -> Result<()> {
        *self = Self::new(name, weight, eye_color, hair_color, nationality)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> Option<u32> {
        self.weight
    }

    pub fn eye_color(&self) -> Color {
        self.eye_color
    }

    pub fn hair_color(&self) -> Color {
        self.hair_color
    }

    pub fn nationality(&self) -> Option<Country> {
        self.nationality
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Screenwriter: {}", self.name)?;
        if let Some(weight) = self.weight {
            write!(f, ", weight: {}", weight)?;
        }
        write!(f, ", eye color: {}, hair color: {}", self.eye_color, self.hair_color)?;
        if let Some(nationality) = self.nationality {
            write!(f, ", nationality: {}", nationality)?;
        }
        Ok(())
    }
}

/// Everything about a movie the operator can set: all fields except the id
/// and the creation date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFields {
    pub name: String,
    pub coordinates: Coordinates,
    pub oscars_count: Option<u32>,
    pub golden_palm_count: u32,
    pub length: u64,
    pub mpaa_rating: Option<MpaaRating>,
    pub screenwriter: Option<Person>,
}

impl MovieFields {
    pub fn validate(&self) -> Result<()> {
        check_name("name", &self.name)?;
        if self.oscars_count == Some(0) {
            return Err(MarqueeError::validation("oscarsCount", "must be greater than 0"));
        }
        if self.golden_palm_count == 0 {
            return Err(MarqueeError::validation("goldenPalmCount", "must be greater than 0"));
        }
        if self.length == 0 {
            return Err(MarqueeError::validation("length", "must be greater than 0"));
        }
        Ok(())
    }
}

/// The record held by the store. Field order here is the document order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    id: u64,
    name: String,
    coordinates: Coordinates,
    creation_date: NaiveDate,
    oscars_count: Option<u32>,
    golden_palm_count: u32,
    length: u64,
    mpaa_rating: Option<MpaaRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screenwriter: Option<Person>,
}

impl Movie {
    /// Builds an unstored movie. The id stays 0 until the store assigns one.
    pub fn new(fields: MovieFields, creation_date: NaiveDate) -> Result<Self> {
        fields.validate()?;
        let MovieFields {
            name,
            coordinates,
            oscars_count,
            golden_palm_count,
            length,
            mpaa_rating,
            screenwriter,
        } = fields;
        Ok(Self {
            id: 0,
            name: name.trim().to_string(),
            coordinates,
            creation_date,
            oscars_count,
            golden_palm_count,
            length,
            mpaa_rating,
            screenwriter,
        })
    }

    /// Replaces everything except `id` and `creation_date`. Nothing changes if
    /// validation fails.
    pub fn update(&mut self, fields: MovieFields) -> Result<()> {
        fields.validate()?;
        self.name = fields.name.trim().to_string();
        self.coordinates = fields.coordinates;
        self.oscars_count = fields.oscars_count;
        self.golden_palm_count = fields.golden_palm_count;
        self.length = fields.length;
        self.mpaa_rating = fields.mpaa_rating;
        self.screenwriter = fields.screenwriter;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn fields(&self) -> MovieFields {
        MovieFields {
            name: self.name.clone(),
            coordinates: self.coordinates,
            oscars_count: self.oscars_count,
            golden_palm_count: self.golden_palm_count,
            length: self.length,
            mpaa_rating: self.mpaa_rating,
            screenwriter: self.screenwriter.clone(),
        }
    }

    /// Priority ordering: oscars count ascending, a missing count first.
    pub fn compare_priority(&self, other: &Movie) -> Ordering {
        self.oscars_count.cmp(&other.oscars_count)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn creation_date(&self) -> NaiveDate {
        self.creation_date
    }

    pub fn oscars_count(&self) -> Option<u32> {
        self.oscars_count
    }

    pub fn golden_palm_count(&self) -> u32 {
        self.golden_palm_count
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn mpaa_rating(&self) -> Option<MpaaRating> {
        self.mpaa_rating
    }

    pub fn screenwriter(&self) -> Option<&Person> {
        self.screenwriter.as_ref()
    }
}

impl fmt::Display for Movie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Movie #{}: '{}'", self.id, self.name)?;
        writeln!(f, "  coordinates: {}", self.coordinates)?;
        writeln!(f, "  creation date: {}", self.creation_date)?;
        match self.oscars_count {
            Some(count) => writeln!(f, "  oscars count: {}", count)?,
            None => writeln!(f, "  oscars count: -")?,
        }
        writeln!(f, "  golden palm count: {}", self.golden_palm_count)?;
        writeln!(f, "  length: {}", self.length)?;
        match self.mpaa_rating {
            Some(rating) => write!(f, "  mpaa rating: {}", rating)?,
            None => write!(f, "  mpaa rating: -")?,
        }
        if let Some(person) = &self.screenwriter {
            write!(f, "\n  {}", person)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    pub(crate) fn fields(name: &str, oscars: Option<u32>) -> MovieFields {
        MovieFields {
            name: name.to_string(),
            coordinates: Coordinates::new(0, 0).unwrap(),
            oscars_count: oscars,
            golden_palm_count: 1,
            length: 90,
            mpaa_rating: None,
            screenwriter: None,
        }
    }

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn coordinates_bounds() {
        assert!(Coordinates::new(-161, 232).is_ok());
        assert!(Coordinates::new(-162, 0).is_err());
        assert!(Coordinates::new(0, 233).is_err());
        assert!(Coordinates::new(i32::MAX, i64::MIN).is_ok());
    }

    #[test]
    fn person_rejects_empty_name_and_zero_weight() {
        assert!(Person::new("  ", None, Color::Red, Color::Black, None).is_err());
        assert!(Person::new("Jordan", Some(0), Color::Red, Color::Black, None).is_err());
        let person = Person::new(" Jordan ", Some(70), Color::Red, Color::Black, None).unwrap();
        assert_eq!(person.name(), "Jordan");
    }

    #[test]
    fn person_update_is_validated_and_atomic() {
        let mut person = Person::new("Jordan", Some(70), Color::Red, Color::Black, None).unwrap();
        assert!(person.update("", Some(80), Color::Blue, Color::Blue, None).is_err());
        assert_eq!(person.weight(), Some(70));
        person
            .update("Peele", None, Color::Blue, Color::Brown, Some(Country::Italy))
            .unwrap();
        assert_eq!(person.name(), "Peele");
        assert_eq!(person.nationality(), Some(Country::Italy));
    }

    #[test]
    fn movie_requires_positive_counts() {
        let mut bad = fields("Nope", Some(0));
        assert!(Movie::new(bad.clone(), date(2024, 1, 1)).is_err());
        bad.oscars_count = None;
        assert!(Movie::new(bad.clone(), date(2024, 1, 1)).is_ok());
        bad.golden_palm_count = 0;
        assert!(Movie::new(bad.clone(), date(2024, 1, 1)).is_err());
        bad.golden_palm_count = 1;
        bad.length = 0;
        assert!(Movie::new(bad, date(2024, 1, 1)).is_err());
    }

    #[test]
    fn failed_update_leaves_movie_untouched() {
        let mut movie = Movie::new(fields("Nope", Some(3)), date(2022, 7, 22)).unwrap();
        let before = movie.clone();

        let mut patch = fields("", Some(5));
        assert!(movie.update(patch.clone()).is_err());
        assert_eq!(movie, before);

        patch.name = "Us".to_string();
        movie.update(patch).unwrap();
        assert_eq!(movie.name(), "Us");
        assert_eq!(movie.oscars_count(), Some(5));
        assert_eq!(movie.creation_date(), before.creation_date());
    }

    #[test]
    fn priority_orders_missing_count_first() {
        let none = Movie::new(fields("a", None), date(2020, 1, 1)).unwrap();
        let one = Movie::new(fields("b", Some(1)), date(2020, 1, 1)).unwrap();
        assert_eq!(none.compare_priority(&one), Ordering::Less);
        assert_eq!(one.compare_priority(&one), Ordering::Equal);
    }

    #[test]
    fn enum_names_round_trip_through_strings() {
        assert_eq!(MpaaRating::from_str("PG_13").unwrap(), MpaaRating::Pg13);
        assert_eq!(MpaaRating::from_str("nc_17").unwrap(), MpaaRating::Nc17);
        assert_eq!(MpaaRating::Pg13.to_string(), "PG_13");
        assert_eq!(Country::UnitedKingdom.to_string(), "UNITED_KINGDOM");
        assert!(Color::from_str("PURPLE").is_err());
        assert_eq!(MpaaRating::VARIANTS, &["G", "PG", "PG_13", "R", "NC_17"]);
    }
}
