use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of one screening.
///
/// Every field is compared with plain string equality. An omitted city is
/// stored as the empty string so it still takes part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShowKey {
    pub movie: String,
    pub theatre: String,
    #[serde(default)]
    pub city: String,
    pub date: String,
    pub time: String,
}

impl ShowKey {
    pub fn new(
        movie: impl Into<String>,
        theatre: impl Into<String>,
        city: Option<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            movie: movie.into(),
            theatre: theatre.into(),
            city: city.unwrap_or_default(),
            date: date.into(),
            time: time.into(),
        }
    }

    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("movie", &self.movie),
            ("theatre", &self.theatre),
            ("date", &self.date),
            ("time", &self.time),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
    }
}

impl fmt::Display for ShowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.movie, self.theatre)?;
        if !self.city.is_empty() {
            write!(f, ", {}", self.city)?;
        }
        write!(f, " on {} {}", self.date, self.time)
    }
}
