use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const MAX_ATTEMPTS_ENV: &str = "MARQUEE_MAX_ATTEMPTS";
pub const FILE_ENV: &str = "MARQUEE_FILE";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Attempts per field during interactive entry. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Print the `marquee>` prompt before each console line.
    pub show_prompt: bool,
    /// Print field hints while reading a record.
    pub show_hints: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            show_prompt: true,
            show_hints: true,
        }
    }
}

impl SessionConfig {
    /// Defaults, overridden by `MARQUEE_MAX_ATTEMPTS` when it is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_ATTEMPTS_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(n) => config = config.with_max_attempts(n),
                Err(_) => warn!(
                    "Ignoring {}={:?}: expected a non-negative integer",
                    MAX_ATTEMPTS_ENV, raw
                ),
            }
        }
        config
    }

    /// 0 means unlimited.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 { None } else { Some(attempts) };
        self
    }

    /// No console prompt and no field hints; used for piped input and tests.
    pub fn quiet(mut self) -> Self {
        self.show_prompt = false;
        self.show_hints = false;
        self
    }
}
