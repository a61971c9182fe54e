use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use nom::{
    bytes::complete::{tag, take_until},
    character::complete::{char, multispace0},
    sequence::delimited,
    IResult,
};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{MarqueeError, Result};
use crate::model::{check_positive, Color, Coordinates, Country, Movie, MovieFields, MpaaRating, Person};
use crate::MovieStore;

/// Written when the backing file does not exist yet.
pub const EMPTY_DOCUMENT: &str = "{\n  \"movies\": []\n}\n";
const ROOT: &str = "movies";
const ROOT_KEY: &str = "\"movies\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    /// The document was not valid JSON; elements were cut out one by one.
    pub salvaged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: usize,
    /// Where the previous document was copied before being replaced.
    pub backup: Option<PathBuf>,
}

/// The file the collection is loaded from and saved to.
///
/// A document that failed to load, or lost elements while loading, is copied
/// aside before the first save replaces it.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    path: PathBuf,
    keep_previous: bool,
}

impl DocumentFile {
    /// Creates the empty template if `path` is missing, then checks that the
    /// file can be both read and written.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, EMPTY_DOCUMENT).map_err(|e| MarqueeError::io(path, e))?;
            info!("Created empty collection file {}", path.display());
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| MarqueeError::io(path, e))?;

        Ok(Self { path: path.to_path_buf(), keep_previous: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file>.bak` next to the document.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Adds every valid movie in the document to `store`, in document order.
    pub fn load_into(&mut self, store: &mut MovieStore) -> Result<LoadReport> {
        let text = fs::read(&self.path).map_err(|e| MarqueeError::io(&self.path, e))?;
        let parsed = parse_document(&String::from_utf8_lossy(&text));
        let (movies, report) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                self.keep_previous = true;
                return Err(e);
            }
        };
        if report.skipped > 0 {
            self.keep_previous = true;
        }
        for movie in movies {
            store.add(movie);
        }
        info!(
            "Loaded {} movies from {} ({} skipped)",
            report.loaded,
            self.path.display(),
            report.skipped
        );
        Ok(report)
    }

    /// Writes the whole store, sorted by oscars count.
    ///
    /// The document goes to a temporary file in the same directory first and
    /// replaces the target only once fully written, so a failed save leaves
    /// the previous document intact.
    pub fn save(&mut self, store: &MovieStore) -> Result<SaveReport> {
        let backup = if self.keep_previous && self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).map_err(|e| MarqueeError::io(&backup, e))?;
            warn!("Previous document kept as {}", backup.display());
            Some(backup)
        } else {
            None
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staged = NamedTempFile::new_in(&dir).map_err(|e| MarqueeError::io(&dir, e))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            write_document(&mut writer, store)?;
            writer.flush().map_err(|e| MarqueeError::io(&self.path, e))?;
        }
        staged
            .as_file()
            .sync_all()
            .map_err(|e| MarqueeError::io(&self.path, e))?;
        staged
            .persist(&self.path)
            .map_err(|e| MarqueeError::io(&self.path, e.error))?;

        self.keep_previous = false;
        debug!("Saved {} movies to {}", store.size(), self.path.display());
        Ok(SaveReport { saved: store.size(), backup })
    }
}

// --- WRITE PATH ---

#[derive(Serialize)]
struct DocumentView<'a> {
    movies: Vec<&'a Movie>,
}

pub fn write_document<W: Write>(writer: W, store: &MovieStore) -> Result<()> {
    let view = DocumentView { movies: store.sorted_snapshot() };
    serde_json::to_writer_pretty(writer, &view)?;
    Ok(())
}

pub fn render_document(store: &MovieStore) -> Result<String> {
    let mut buffer = Vec::new();
    write_document(&mut buffer, store)?;
    String::from_utf8(buffer).map_err(|e| MarqueeError::Parse(e.to_string()))
}

// --- READ PATH ---

/// Parses every movie element. Malformed elements are logged and counted as
/// skipped. If the text is not valid JSON, the `movies` array is cut into
/// elements and each one is parsed on its own; only a document with no
/// recognizable array fails the whole parse.
pub fn parse_document(text: &str) -> Result<(Vec<Movie>, LoadReport)> {
    let mut report = LoadReport::default();
    let elements: Vec<std::result::Result<Value, String>> = match serde_json::from_str::<Value>(text) {
        Ok(mut root) => match root.get_mut(ROOT).map(Value::take) {
            Some(Value::Array(items)) => items.into_iter().map(Ok).collect(),
            _ => return Err(MarqueeError::Parse(format!("document has no '{}' array", ROOT))),
        },
        Err(e) => {
            let pieces = split_elements(text).ok_or(e)?;
            warn!("Document is not valid JSON, reading {} elements one by one", pieces.len());
            report.salvaged = true;
            pieces
                .into_iter()
                .map(|piece| serde_json::from_str::<Value>(piece).map_err(|e| e.to_string()))
                .collect()
        }
    };

    let mut movies = Vec::with_capacity(elements.len());
    let mut seen_ids = HashSet::new();

    for (position, element) in elements.into_iter().enumerate() {
        let parsed = element
            .map_err(MarqueeError::Parse)
            .and_then(|element| parse_movie(&element));
        match parsed {
            Ok((document_id, movie)) => {
                if let Some(id) = document_id {
                    if !seen_ids.insert(id) {
                        warn!("Movie id {} appears more than once in the document", id);
                    }
                }
                movies.push(movie);
                report.loaded += 1;
            }
            Err(e) => {
                warn!("Skipping movie element {}: {}", position + 1, e);
                report.skipped += 1;
            }
        }
    }
    Ok((movies, report))
}

fn movies_array_start(input: &str) -> IResult<&str, ()> {
    let (input, _) = take_until(ROOT_KEY)(input)?;
    let (input, _) = tag(ROOT_KEY)(input)?;
    let (input, _) = delimited(multispace0, char(':'), multispace0)(input)?;
    let (input, _) = char('[')(input)?;
    Ok((input, ()))
}

/// Cuts the body of the `movies` array into top-level element slices.
/// A document truncated inside the array yields the elements before the cut
/// plus the incomplete tail.
fn split_elements(text: &str) -> Option<Vec<&str>> {
    let (body, _) = movies_array_start(text).ok()?;

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    let mut end = body.len();

    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' if depth > 0 => depth -= 1,
            ']' => {
                end = i;
                break;
            }
            ',' if depth == 0 => {
                pieces.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&body[start..end]);

    Some(pieces.into_iter().map(str::trim).filter(|piece| !piece.is_empty()).collect())
}

type Setter<B> = fn(&mut B, &Value) -> Result<()>;

/// Walks the object's fields and feeds the known ones through `table`.
/// Unknown field names are ignored.
fn apply_fields<B: Default>(element: &Value, what: &str, table: &[(&str, Setter<B>)]) -> Result<B> {
    let object = element
        .as_object()
        .ok_or_else(|| MarqueeError::Parse(format!("{} must be an object", what)))?;

    let mut builder = B::default();
    for (name, value) in object {
        if let Some((_, setter)) = table.iter().find(|(field, _)| field == name) {
            setter(&mut builder, value)?;
        }
    }
    Ok(builder)
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or_else(|| MarqueeError::Parse(format!("missing field '{}'", field)))
}

fn integer(field: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| MarqueeError::Parse(format!("'{}' must be an integer, got {}", field, value)))
}

fn text<'v>(field: &str, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| MarqueeError::Parse(format!("'{}' must be a string, got {}", field, value)))
}

/// `null` and `""` both mean unset.
fn is_unset(value: &Value) -> bool {
    value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty())
}

fn enum_value<T: FromStr>(field: &str, value: &Value) -> Result<T> {
    let name = text(field, value)?;
    T::from_str(name.trim()).map_err(|_| MarqueeError::Parse(format!("'{}' has unknown value '{}'", field, name)))
}

// Movie

#[derive(Default)]
struct MovieBuilder {
    id: Option<u64>,
    name: Option<String>,
    coordinates: Option<Coordinates>,
    creation_date: Option<NaiveDate>,
    oscars_count: Option<u32>,
    golden_palm_count: Option<u32>,
    length: Option<u64>,
    mpaa_rating: Option<MpaaRating>,
    screenwriter: Option<Person>,
}

const MOVIE_FIELDS: &[(&str, Setter<MovieBuilder>)] = &[
    ("id", set_movie_id),
    ("name", set_movie_name),
    ("coordinates", set_movie_coordinates),
    ("creationDate", set_movie_creation_date),
    ("oscarsCount", set_movie_oscars_count),
    ("goldenPalmCount", set_movie_golden_palm_count),
    ("length", set_movie_length),
    ("mpaaRating", set_movie_mpaa_rating),
    ("screenwriter", set_movie_screenwriter),
];

fn set_movie_id(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.id = Some(check_positive("id", integer("id", v)?)?);
    Ok(())
}

fn set_movie_name(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.name = Some(text("name", v)?.to_string());
    Ok(())
}

fn set_movie_coordinates(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.coordinates = Some(parse_coordinates(v)?);
    Ok(())
}

fn set_movie_creation_date(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    let raw = text("creationDate", v)?;
    let date = NaiveDate::from_str(raw.trim())
        .map_err(|e| MarqueeError::Parse(format!("'creationDate' is not a date ({}): {}", raw, e)))?;
    b.creation_date = Some(date);
    Ok(())
}

fn set_movie_oscars_count(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.oscars_count = if is_unset(v) {
        None
    } else {
        Some(check_positive("oscarsCount", integer("oscarsCount", v)?)?)
    };
    Ok(())
}

fn set_movie_golden_palm_count(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.golden_palm_count = Some(check_positive("goldenPalmCount", integer("goldenPalmCount", v)?)?);
    Ok(())
}

fn set_movie_length(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.length = Some(check_positive("length", integer("length", v)?)?);
    Ok(())
}

fn set_movie_mpaa_rating(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.mpaa_rating = if is_unset(v) { None } else { Some(enum_value("mpaaRating", v)?) };
    Ok(())
}

fn set_movie_screenwriter(b: &mut MovieBuilder, v: &Value) -> Result<()> {
    b.screenwriter = if v.is_null() { None } else { Some(parse_person(v)?) };
    Ok(())
}

/// Returns the id found in the document (informational only) and the movie.
fn parse_movie(element: &Value) -> Result<(Option<u64>, Movie)> {
    let b: MovieBuilder = apply_fields(element, "movie", MOVIE_FIELDS)?;
    let fields = MovieFields {
        name: required(b.name, "name")?,
        coordinates: required(b.coordinates, "coordinates")?,
        oscars_count: b.oscars_count,
        golden_palm_count: required(b.golden_palm_count, "goldenPalmCount")?,
        length: required(b.length, "length")?,
        mpaa_rating: b.mpaa_rating,
        screenwriter: b.screenwriter,
    };
    let movie = Movie::new(fields, required(b.creation_date, "creationDate")?)?;
    Ok((b.id, movie))
}

// Coordinates

#[derive(Default)]
struct CoordinatesBuilder {
    x: Option<i32>,
    y: Option<i64>,
}

const COORDINATE_FIELDS: &[(&str, Setter<CoordinatesBuilder>)] = &[("x", set_x), ("y", set_y)];

fn set_x(b: &mut CoordinatesBuilder, v: &Value) -> Result<()> {
    let x = integer("x", v)?;
    b.x = Some(i32::try_from(x).map_err(|_| MarqueeError::Parse(format!("'x' is out of range: {}", x)))?);
    Ok(())
}

fn set_y(b: &mut CoordinatesBuilder, v: &Value) -> Result<()> {
    b.y = Some(integer("y", v)?);
    Ok(())
}

fn parse_coordinates(element: &Value) -> Result<Coordinates> {
    let b: CoordinatesBuilder = apply_fields(element, "coordinates", COORDINATE_FIELDS)?;
    Coordinates::new(required(b.x, "x")?, required(b.y, "y")?)
}

// Person

#[derive(Default)]
struct PersonBuilder {
    name: Option<String>,
    weight: Option<u32>,
    eye_color: Option<Color>,
    hair_color: Option<Color>,
    nationality: Option<Country>,
}

const PERSON_FIELDS: &[(&str, Setter<PersonBuilder>)] = &[
    ("name", set_person_name),
    ("weight", set_person_weight),
    ("eyeColor", set_person_eye_color),
    ("hairColor", set_person_hair_color),
    ("nationality", set_person_nationality),
];

fn set_person_name(b: &mut PersonBuilder, v: &Value) -> Result<()> {
    b.name = Some(text("name", v)?.to_string());
    Ok(())
}

fn set_person_weight(b: &mut PersonBuilder, v: &Value) -> Result<()> {
    b.weight = if is_unset(v) {
        None
    } else {
        Some(check_positive("weight", integer("weight", v)?)?)
    };
    Ok(())
}

fn set_person_eye_color(b: &mut PersonBuilder, v: &Value) -> Result<()> {
    b.eye_color = Some(enum_value("eyeColor", v)?);
    Ok(())
}

fn set_person_hair_color(b: &mut PersonBuilder, v: &Value) -> Result<()> {
    b.hair_color = Some(enum_value("hairColor", v)?);
    Ok(())
}

fn set_person_nationality(b: &mut PersonBuilder, v: &Value) -> Result<()> {
    b.nationality = if is_unset(v) { None } else { Some(enum_value("nationality", v)?) };
    Ok(())
}

fn parse_person(element: &Value) -> Result<Person> {
    let b: PersonBuilder = apply_fields(element, "screenwriter", PERSON_FIELDS)?;
    Person::new(
        &required(b.name, "name")?,
        b.weight,
        required(b.eye_color, "eyeColor")?,
        required(b.hair_color, "hairColor")?,
        b.nationality,
    )
}
