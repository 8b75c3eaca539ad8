use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};

/// Format used for date keys in completion records and activity history.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// A simple clock abstraction for deterministic local time in services and tests.
///
/// Progress is bucketed by the user's *local* calendar date, so the clock hands
/// out naive local timestamps rather than UTC instants.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(NaiveDateTime),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given local timestamp.
    #[must_use]
    pub fn fixed(at: NaiveDateTime) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current local time according to the clock.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::Default => Local::now().naive_local(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Returns the current local calendar date.
    ///
    /// This is re-derived on every call; callers must not cache it across a
    /// long-running session or midnight rollovers will be missed.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Returns the current local date formatted as a `YYYY-MM-DD` key.
    #[must_use]
    pub fn date_key(&self) -> String {
        self.today().format(DATE_KEY_FORMAT).to_string()
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Parse a `YYYY-MM-DD` date key.
///
/// # Errors
///
/// Returns `chrono::ParseError` if the key is not a valid calendar date.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20, a Tuesday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic local timestamp for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> NaiveDateTime {
    DateTime::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
        .naive_utc()
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
