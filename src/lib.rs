pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod storage;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::error::{MarqueeError, Result};
use crate::model::{Movie, MovieFields, MpaaRating};
use crate::registry::NameRegistry;

pub use crate::config::SessionConfig;
pub use crate::error::MarqueeError as Error;
pub use crate::session::{Flow, Session};
pub use crate::storage::{DocumentFile, LoadReport, SaveReport};

/// Priority key: oscars count first, id to keep keys unique.
type Key = (Option<u32>, u64);

/// The in-memory movie collection.
///
/// Movies live in a map ordered by oscars count, so iteration is always the
/// priority order. `index` resolves an id to its current key.
pub struct MovieStore {
    movies: BTreeMap<Key, Movie>,
    index: HashMap<u64, Key>,
    names: NameRegistry,
    last_id: u64,
    initialized_at: DateTime<Local>,
}

impl fmt::Debug for MovieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovieStore")
            .field("movie_count", &self.movies.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}

impl Default for MovieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieStore {
    pub fn new() -> Self {
        Self {
            movies: BTreeMap::new(),
            index: HashMap::new(),
            names: NameRegistry::new(),
            last_id: 0,
            initialized_at: Local::now(),
        }
    }

    /// Stores `movie` under a fresh id and returns that id.
    /// Ids are never handed out twice, even after removal or `clear`.
    pub fn add(&mut self, mut movie: Movie) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        movie.assign_id(id);

        if let Some(writer) = movie.screenwriter() {
            if !self.names.insert(writer.name()) {
                warn!("Screenwriter name '{}' is already in use", writer.name());
            }
        }

        let key = (movie.oscars_count(), id);
        self.index.insert(id, key);
        self.movies.insert(key, movie);
        debug!("Added movie #{}", id);
        id
    }

    pub fn get(&self, id: u64) -> Option<&Movie> {
        let key = self.index.get(&id)?;
        self.movies.get(key)
    }

    pub fn remove_by_id(&mut self, id: u64) -> Result<Movie> {
        let key = self.index.remove(&id).ok_or(MarqueeError::NotFound(id))?;
        let movie = self.movies.remove(&key).ok_or(MarqueeError::NotFound(id))?;
        self.release_name(&movie);
        debug!("Removed movie #{}", id);
        Ok(movie)
    }

    /// Replaces every field of movie `id` except the id and creation date.
    /// On a validation failure the stored movie is left as it was.
    pub fn update(&mut self, id: u64, fields: MovieFields) -> Result<()> {
        let key = *self.index.get(&id).ok_or(MarqueeError::NotFound(id))?;
        let movie = self.movies.get_mut(&key).ok_or(MarqueeError::NotFound(id))?;

        let old_writer = movie.screenwriter().map(|p| p.name().to_string());
        movie.update(fields)?;
        let new_writer = movie.screenwriter().map(|p| p.name().to_string());
        let new_key = (movie.oscars_count(), id);

        if old_writer != new_writer {
            if let Some(name) = old_writer {
                self.names.remove(&name);
            }
            if let Some(name) = new_writer {
                if !self.names.insert(&name) {
                    warn!("Screenwriter name '{}' is already in use", name);
                }
            }
        }

        // Oscars count changed: move the movie to its new slot.
        if new_key != key {
            if let Some(movie) = self.movies.remove(&key) {
                self.movies.insert(new_key, movie);
                self.index.insert(id, new_key);
            }
        }
        debug!("Updated movie #{}", id);
        Ok(())
    }

    /// Removes every movie ranked strictly above `reference`. Returns how many went.
    pub fn remove_greater(&mut self, reference: &Movie) -> usize {
        self.remove_where(|movie| movie.compare_priority(reference).is_gt())
    }

    /// Removes every movie ranked strictly below `reference`. Returns how many went.
    pub fn remove_lower(&mut self, reference: &Movie) -> usize {
        self.remove_where(|movie| movie.compare_priority(reference).is_lt())
    }

    fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Movie) -> bool,
    {
        // Collect first, then remove: never mutate the map mid-scan.
        let doomed: Vec<Key> = self
            .movies
            .iter()
            .filter(|(_, movie)| predicate(movie))
            .map(|(key, _)| *key)
            .collect();

        for key in &doomed {
            if let Some(movie) = self.movies.remove(key) {
                self.index.remove(&movie.id());
                self.release_name(&movie);
            }
        }
        doomed.len()
    }

    /// Empties the collection. The id counter keeps going.
    pub fn clear(&mut self) {
        self.movies.clear();
        self.index.clear();
        self.names.clear();
    }

    pub fn size(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Front of the priority order (fewest oscars).
    pub fn head(&self) -> Result<&Movie> {
        self.movies.values().next().ok_or(MarqueeError::EmptyCollection)
    }

    pub fn max_by_creation_date(&self) -> Result<&Movie> {
        self.movies
            .values()
            .max_by_key(|movie| movie.creation_date())
            .ok_or(MarqueeError::EmptyCollection)
    }

    /// Movies without a rating never match.
    pub fn filter_by_mpaa_rating(&self, rating: MpaaRating) -> Vec<&Movie> {
        self.movies
            .values()
            .filter(|movie| movie.mpaa_rating() == Some(rating))
            .collect()
    }

    pub fn count_by_mpaa_rating(&self, rating: MpaaRating) -> usize {
        self.filter_by_mpaa_rating(rating).len()
    }

    /// All movies in ascending oscars-count order.
    pub fn sorted_snapshot(&self) -> Vec<&Movie> {
        self.movies.values().collect()
    }

    pub fn initialized_at(&self) -> DateTime<Local> {
        self.initialized_at
    }

    pub fn person_names(&self) -> &NameRegistry {
        &self.names
    }

    fn release_name(&mut self, movie: &Movie) {
        if let Some(writer) = movie.screenwriter() {
            self.names.remove(writer.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{date, fields};
    use crate::model::{Color, Person};

    fn movie(name: &str, oscars: Option<u32>) -> Movie {
        Movie::new(fields(name, oscars), date(2024, 3, 1)).unwrap()
    }

    fn rated(name: &str, oscars: u32, rating: Option<MpaaRating>) -> Movie {
        let mut f = fields(name, Some(oscars));
        f.mpaa_rating = rating;
        Movie::new(f, date(2024, 3, 1)).unwrap()
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut store = MovieStore::new();
        let a = store.add(movie("a", Some(1)));
        let b = store.add(movie("b", Some(2)));
        assert!(b > a);

        store.remove_by_id(b).unwrap();
        let c = store.add(movie("c", Some(3)));
        assert!(c > b);

        store.clear();
        let d = store.add(movie("d", Some(4)));
        assert!(d > c);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn snapshot_is_sorted_by_oscars() {
        let mut store = MovieStore::new();
        for (name, oscars) in [("x", Some(5)), ("y", Some(1)), ("z", None), ("w", Some(3)), ("v", Some(1))] {
            store.add(movie(name, oscars));
        }
        let counts: Vec<_> = store.sorted_snapshot().iter().map(|m| m.oscars_count()).collect();
        assert_eq!(counts, vec![None, Some(1), Some(1), Some(3), Some(5)]);
        assert_eq!(store.head().unwrap().name(), "z");
    }

    #[test]
    fn threshold_deletion_keeps_equal_counts() {
        let mut store = MovieStore::new();
        for oscars in [1, 2, 2, 3, 4] {
            store.add(movie("m", Some(oscars)));
        }
        let reference = movie("ref", Some(2));

        assert_eq!(store.remove_greater(&reference), 2);
        assert!(store.sorted_snapshot().iter().all(|m| m.oscars_count() <= Some(2)));

        assert_eq!(store.remove_lower(&reference), 1);
        let left: Vec<_> = store.sorted_snapshot().iter().map(|m| m.oscars_count()).collect();
        assert_eq!(left, vec![Some(2), Some(2)]);
    }

    #[test]
    fn update_moves_movie_and_keeps_identity() {
        let mut store = MovieStore::new();
        let id = store.add(movie("a", Some(1)));
        store.add(movie("b", Some(2)));
        let created = store.get(id).unwrap().creation_date();

        store.update(id, fields("a2", Some(9))).unwrap();
        let updated = store.get(id).unwrap();
        assert_eq!(updated.name(), "a2");
        assert_eq!(updated.creation_date(), created);
        assert_eq!(store.sorted_snapshot().last().unwrap().id(), id);
    }

    #[test]
    fn update_and_remove_report_missing_ids() {
        let mut store = MovieStore::new();
        assert!(matches!(store.update(7, fields("a", Some(1))), Err(MarqueeError::NotFound(7))));
        assert!(matches!(store.remove_by_id(7), Err(MarqueeError::NotFound(7))));
    }

    #[test]
    fn invalid_update_changes_nothing() {
        let mut store = MovieStore::new();
        let id = store.add(movie("a", Some(1)));
        assert!(store.update(id, fields("", Some(4))).is_err());
        assert_eq!(store.get(id).unwrap().oscars_count(), Some(1));
        assert_eq!(store.head().unwrap().id(), id);
    }

    #[test]
    fn rating_filter_skips_unrated_movies() {
        let mut store = MovieStore::new();
        store.add(rated("a", 1, Some(MpaaRating::R)));
        store.add(rated("b", 2, None));
        store.add(rated("c", 3, Some(MpaaRating::R)));
        store.add(rated("d", 4, Some(MpaaRating::G)));

        for rating in [MpaaRating::G, MpaaRating::Pg, MpaaRating::Pg13, MpaaRating::R, MpaaRating::Nc17] {
            let filtered = store.filter_by_mpaa_rating(rating);
            assert!(filtered.iter().all(|m| m.mpaa_rating() == Some(rating)));
            assert_eq!(store.count_by_mpaa_rating(rating), filtered.len());
        }
        assert_eq!(store.count_by_mpaa_rating(MpaaRating::R), 2);
    }

    #[test]
    fn empty_store_queries_are_errors() {
        let store = MovieStore::new();
        assert!(matches!(store.head(), Err(MarqueeError::EmptyCollection)));
        assert!(matches!(store.max_by_creation_date(), Err(MarqueeError::EmptyCollection)));
    }

    #[test]
    fn latest_creation_date_wins() {
        let mut store = MovieStore::new();
        store.add(Movie::new(fields("old", Some(5)), date(2001, 1, 1)).unwrap());
        store.add(Movie::new(fields("new", Some(1)), date(2023, 6, 1)).unwrap());
        assert_eq!(store.max_by_creation_date().unwrap().name(), "new");
    }

    #[test]
    fn screenwriter_names_follow_the_collection() {
        let mut store = MovieStore::new();
        let mut f = fields("a", Some(1));
        f.screenwriter = Some(Person::new("Peele", None, Color::Brown, Color::Black, None).unwrap());
        let id = store.add(Movie::new(f, date(2024, 1, 1)).unwrap());
        assert!(store.person_names().contains("Peele"));

        store.update(id, fields("a", Some(1))).unwrap();
        assert!(!store.person_names().contains("Peele"));
    }
}
