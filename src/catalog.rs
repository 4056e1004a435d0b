//! Read-only reference data: where each movie is screening, when, and its poster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_SEATS_PER_THEATRE: u32 = 50;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub cities: Vec<City>,
    pub posters: BTreeMap<String, String>,
    pub show_dates: Vec<String>,
    pub timings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub localities: Vec<Locality>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub theatres: Vec<Theatre>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theatre {
    pub name: String,
    pub movies: Vec<String>,
    #[serde(default = "default_total_seats")]
    pub total_seats: u32,
}

fn default_total_seats() -> u32 {
    DEFAULT_SEATS_PER_THEATRE
}

fn theatre(name: &str, movies: &[&str]) -> Theatre {
    Theatre {
        name: name.to_string(),
        movies: movies.iter().map(|m| m.to_string()).collect(),
        total_seats: DEFAULT_SEATS_PER_THEATRE,
    }
}

fn locality(name: &str, theatres: Vec<Theatre>) -> Locality {
    Locality { name: name.to_string(), theatres }
}

impl Catalog {
    pub fn builtin() -> Self {
        let cities = vec![
            City {
                name: "Chennai".to_string(),
                localities: vec![
                    locality(
                        "Velachery",
                        vec![
                            theatre("AGS Cinemas", &["Amaran", "Pushpa 2", "Vidaamuyarchi", "Kanguva"]),
                            theatre("PVR Grand Mall", &["Greatest of All Time", "Amaran", "Leo", "Jailer"]),
                        ],
                    ),
                    locality("Anna Nagar", vec![theatre("PVR Cinemas", &["Amaran", "Kanguva"])]),
                ],
            },
            City {
                name: "Coimbatore".to_string(),
                localities: vec![
                    locality(
                        "Gandhipuram",
                        vec![
                            theatre("KG Cinemas", &["Pushpa 2", "Leo", "Vikram", "Kanguva"]),
                            theatre("Cinepolis", &["Amaran", "Jailer", "Baahubali", "Vidaamuyarchi"]),
                        ],
                    ),
                    locality(
                        "RS Puram",
                        vec![theatre("Brookefields PVR", &["Amaran", "Pushpa 2", "Vidaamuyarchi"])],
                    ),
                    locality("Avinashi Road", vec![theatre("Broadway Cinemas", &["Pushpa 2", "Kanguva"])]),
                ],
            },
        ];

        let posters = [
            ("Amaran", "amaran.jpg"),
            ("Pushpa 2", "pushpa2.jpg"),
            ("Vidaamuyarchi", "vidamuyarchi.jpg"),
            ("Kanguva", "kanguva.jpg"),
            ("Greatest of All Time", "goat.jpg"),
            ("Leo", "leo.jpg"),
            ("Jailer", "jailer.jpg"),
            ("Baahubali", "baahubali.jpg"),
            ("Vikram", "vikram.jpg"),
        ]
        .into_iter()
        .map(|(movie, file)| (movie.to_string(), format!("static/images/{}", file)))
        .collect();

        Catalog {
            cities,
            posters,
            show_dates: vec!["4 Feb".into(), "5 Feb".into(), "6 Feb".into()],
            timings: vec!["10:30 AM".into(), "02:45 PM".into(), "06:15 PM".into()],
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    /// Looks a theatre up by name, within one city if given.
    pub fn theatre(&self, city: Option<&str>, name: &str) -> Option<&Theatre> {
        self.cities
            .iter()
            .filter(|c| city.map_or(true, |wanted| c.name == wanted))
            .flat_map(|c| c.localities.iter())
            .flat_map(|l| l.theatres.iter())
            .find(|t| t.name == name)
    }

    pub fn poster(&self, movie: &str) -> Option<&str> {
        self.posters.get(movie).map(String::as_str)
    }

    /// Date a booking page opens on when none is picked.
    pub fn default_date(&self) -> &str {
        self.show_dates.first().map(String::as_str).unwrap_or("Today")
    }

    pub fn default_time(&self) -> &str {
        self.timings.first().map(String::as_str).unwrap_or("10:30 AM")
    }
}

impl Theatre {
    pub fn screens(&self, movie: &str) -> bool {
        self.movies.iter().any(|m| m == movie)
    }
}
