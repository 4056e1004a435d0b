use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ShowKey;

/// Occupant category recorded against each booked seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            "o" | "other" => Ok(Gender::Other),
            _ => Err(format!("unknown gender category '{s}' (expected M, F or O)")),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gender> for &'static str {
    fn from(value: Gender) -> Self {
        value.as_str()
    }
}

/// One seat asked for in a booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRequest {
    #[serde(rename = "id")]
    pub seat_id: String,
    pub gender: Gender,
}

impl SeatRequest {
    pub fn new(seat_id: impl Into<String>, gender: Gender) -> Self {
        Self { seat_id: seat_id.into(), gender }
    }
}

/// A seat claimed for a show. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub show: ShowKey,
    pub seat_id: String,
    pub gender: Gender,
    pub booking_id: Uuid,
    pub user_email: Option<String>,
    pub booked_at: DateTime<Utc>,
}

/// Seat id → gender for every seat already taken in a show.
pub type Occupancy = BTreeMap<String, Gender>;
