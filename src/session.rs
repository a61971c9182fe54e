use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::Local;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{MarqueeError, Result};
use crate::model::Movie;
use crate::parser::{parse_id, parse_path, parse_rating, split_command};
use crate::prompt::{read_text_line, Prompter};
use crate::registry::ActiveScripts;
use crate::storage::DocumentFile;
use crate::MovieStore;

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

type Handler<W> = fn(&mut Session<W>, &str, &mut dyn BufRead) -> Result<Flow>;

const HELP: &[(&str, &str)] = &[
    ("help", "show this list"),
    ("info", "print collection type, initialization time and size"),
    ("show", "print every movie, fewest oscars first"),
    ("add", "add a movie (fields are prompted for)"),
    ("update <id>", "replace every field of movie <id>"),
    ("remove_by_id <id>", "remove movie <id>"),
    ("clear", "remove every movie"),
    ("save", "write the collection to its file"),
    ("execute_script <file>", "run the commands in <file>"),
    ("exit", "quit without saving"),
    ("head", "print the movie with the fewest oscars"),
    ("remove_greater", "remove every movie with more oscars than the one entered"),
    ("remove_lower", "remove every movie with fewer oscars than the one entered"),
    ("max_by_creation_date", "print the most recently created movie"),
    ("count_by_mpaa_rating <rating>", "count movies with this rating"),
    ("filter_by_mpaa_rating <rating>", "print movies with this rating"),
];

/// One operator session: the store, its backing document and the command table.
///
/// Commands come from any `BufRead`; record-bearing commands prompt on the
/// same source, so a script can carry the field values for its own `add`s.
pub struct Session<W: Write> {
    store: MovieStore,
    document: DocumentFile,
    config: SessionConfig,
    scripts: ActiveScripts,
    commands: HashMap<&'static str, Handler<W>>,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(store: MovieStore, document: DocumentFile, config: SessionConfig, out: W) -> Self {
        Self {
            store,
            document,
            config,
            scripts: ActiveScripts::new(),
            commands: Self::command_table(),
            out,
        }
    }

    fn command_table() -> HashMap<&'static str, Handler<W>> {
        let table: [(&'static str, Handler<W>); 16] = [
            ("help", Self::help),
            ("info", Self::info),
            ("show", Self::show),
            ("add", Self::add),
            ("update", Self::update),
            ("remove_by_id", Self::remove_by_id),
            ("clear", Self::clear),
            ("save", Self::save),
            ("execute_script", Self::execute_script),
            ("exit", Self::exit),
            ("head", Self::head),
            ("remove_greater", Self::remove_greater),
            ("remove_lower", Self::remove_lower),
            ("max_by_creation_date", Self::max_by_creation_date),
            ("count_by_mpaa_rating", Self::count_by_mpaa_rating),
            ("filter_by_mpaa_rating", Self::filter_by_mpaa_rating),
        ];
        table.into_iter().collect()
    }

    pub fn store(&self) -> &MovieStore {
        &self.store
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    // --- LOOP ---

    /// Reads the console until `exit` or end of input.
    pub fn run_console(&mut self, input: &mut dyn BufRead) -> Result<Flow> {
        let show_prompt = self.config.show_prompt;
        self.run_lines(input, show_prompt)
    }

    /// Runs every line of `input` without a prompt.
    pub fn run(&mut self, input: &mut dyn BufRead) -> Result<Flow> {
        self.run_lines(input, false)
    }

    fn run_lines(&mut self, input: &mut dyn BufRead, show_prompt: bool) -> Result<Flow> {
        loop {
            if show_prompt {
                write!(self.out, "marquee> ").map_err(output_error)?;
                self.out.flush().map_err(output_error)?;
            }

            let Some(line) = read_text_line(&mut *input)? else {
                return Ok(Flow::Continue);
            };

            match self.execute_line(&line, input) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(Flow::Exit),
                Err(e) => self.report(&e)?,
            }
        }
    }

    /// Parses and runs one command line. Blank lines are a no-op.
    pub fn execute_line(&mut self, line: &str, input: &mut dyn BufRead) -> Result<Flow> {
        let Some(command) = split_command(line) else {
            return Ok(Flow::Continue);
        };
        let handler = *self
            .commands
            .get(command.name)
            .ok_or_else(|| MarqueeError::UnknownCommand(command.name.to_string()))?;

        debug!(command = command.name, params = command.params, "dispatch");
        handler(self, command.params, input)
    }

    fn report(&mut self, error: &MarqueeError) -> Result<()> {
        debug!("Command failed: {}", error);
        writeln!(self.out, "[\u{26a0}\u{fe0f} Error] {}", error).map_err(output_error)
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text).map_err(output_error)
    }

    fn read_reference(&mut self, input: &mut dyn BufRead) -> Result<Movie> {
        let fields = Prompter::new(input, &mut self.out, &self.config).read_movie()?;
        Movie::new(fields, Local::now().date_naive())
    }

    fn run_script(&mut self, path: &Path) -> Result<Flow> {
        let canonical = fs::canonicalize(path).map_err(|e| MarqueeError::io(path, e))?;
        let _guard = self.scripts.enter(canonical.clone())?;

        let file = File::open(&canonical).map_err(|e| MarqueeError::io(path, e))?;
        let mut reader = BufReader::new(file);

        info!("Running script {} (depth {})", canonical.display(), self.scripts.depth());
        let flow = self.run_lines(&mut reader, false)?;
        info!("Finished script {}", canonical.display());
        Ok(flow)
    }

    // --- HANDLERS ---

    fn help(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        for (usage, summary) in HELP {
            self.say(&format!("  {:<32} {}", usage, summary))?;
        }
        Ok(Flow::Continue)
    }

    fn info(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let text = format!(
            "Collection: priority queue of movies, ordered by oscars count\nInitialized: {}\nMovies: {}\nFile: {}",
            self.store.initialized_at().format("%Y-%m-%d %H:%M:%S"),
            self.store.size(),
            self.document.path().display()
        );
        self.say(&text)?;
        Ok(Flow::Continue)
    }

    fn show(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        if self.store.is_empty() {
            self.say("The collection is empty.")?;
            return Ok(Flow::Continue);
        }
        let listing: Vec<String> = self.store.sorted_snapshot().iter().map(|m| m.to_string()).collect();
        self.say(&listing.join("\n\n"))?;
        Ok(Flow::Continue)
    }

    fn add(&mut self, params: &str, input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let movie = self.read_reference(input)?;
        let id = self.store.add(movie);
        self.say(&format!("[\u{2713} OK] Added movie #{}", id))?;
        Ok(Flow::Continue)
    }

    fn update(&mut self, params: &str, input: &mut dyn BufRead) -> Result<Flow> {
        let id = parse_id(params)?;
        if self.store.get(id).is_none() {
            return Err(MarqueeError::NotFound(id));
        }
        let fields = Prompter::new(input, &mut self.out, &self.config).read_movie()?;
        self.store.update(id, fields)?;
        self.say(&format!("[\u{2713} OK] Updated movie #{}", id))?;
        Ok(Flow::Continue)
    }

    fn remove_by_id(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        let id = parse_id(params)?;
        self.store.remove_by_id(id)?;
        self.say(&format!("[\u{2713} OK] Removed movie #{}", id))?;
        Ok(Flow::Continue)
    }

    fn clear(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let count = self.store.size();
        self.store.clear();
        self.say(&format!("[\u{2713} OK] Removed {} movies", count))?;
        Ok(Flow::Continue)
    }

    fn save(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let report = self.document.save(&self.store)?;
        if let Some(backup) = &report.backup {
            self.say(&format!("[\u{26a0}\u{fe0f}] Previous file kept as {}", backup.display()))?;
        }
        let text = format!("[\u{2713} OK] Saved {} movies to {}", report.saved, self.document.path().display());
        self.say(&text)?;
        Ok(Flow::Continue)
    }

    fn execute_script(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        let path = parse_path(params)?;
        self.run_script(&path)
    }

    fn exit(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        Ok(Flow::Exit)
    }

    fn head(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let text = self.store.head()?.to_string();
        self.say(&text)?;
        Ok(Flow::Continue)
    }

    fn remove_greater(&mut self, params: &str, input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let reference = self.read_reference(input)?;
        let removed = self.store.remove_greater(&reference);
        self.say(&format!("[\u{2713} OK] Removed {} movies", removed))?;
        Ok(Flow::Continue)
    }

    fn remove_lower(&mut self, params: &str, input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let reference = self.read_reference(input)?;
        let removed = self.store.remove_lower(&reference);
        self.say(&format!("[\u{2713} OK] Removed {} movies", removed))?;
        Ok(Flow::Continue)
    }

    fn max_by_creation_date(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        no_params(params)?;
        let text = self.store.max_by_creation_date()?.to_string();
        self.say(&text)?;
        Ok(Flow::Continue)
    }

    fn count_by_mpaa_rating(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        let rating = parse_rating(params)?;
        let count = self.store.count_by_mpaa_rating(rating);
        self.say(&count.to_string())?;
        Ok(Flow::Continue)
    }

    fn filter_by_mpaa_rating(&mut self, params: &str, _input: &mut dyn BufRead) -> Result<Flow> {
        let rating = parse_rating(params)?;
        let listing: Vec<String> = self
            .store
            .filter_by_mpaa_rating(rating)
            .iter()
            .map(|m| m.to_string())
            .collect();
        if listing.is_empty() {
            self.say(&format!("No movies rated {}.", rating))?;
        } else {
            self.say(&listing.join("\n\n"))?;
        }
        Ok(Flow::Continue)
    }
}

fn no_params(params: &str) -> Result<()> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(MarqueeError::UnexpectedParams)
    }
}

fn output_error(e: std::io::Error) -> MarqueeError {
    MarqueeError::io("<output>", e)
}
