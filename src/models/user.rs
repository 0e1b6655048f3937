use serde::{Deserialize, Serialize};

/// Stable key of a user
pub type UserId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    /// Any other token, kept verbatim
    Other(String),
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "F" | "f" => Gender::Female,
            "M" | "m" => Gender::Male,
            other => Gender::Other(other.to_string()),
        }
    }

    /// Single-letter code used by the dataset and the import tables
    pub fn code(&self) -> &str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
            Gender::Other(token) => token,
        }
    }
}

/// A user with demographic attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub gender: Gender,
    pub age: u32,
    pub occupation: u32,
    pub zip: String,
}
