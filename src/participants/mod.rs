//! Participants are the students and teachers a secretary registers for the
//! competitions.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{error::BackendResult, schema::participants};

pub mod code;
pub mod form;

/// Every competition a participant can enter, in display order.
pub const COMPETITIONS: [&str; 5] = [
    "memory verse",
    "speech competition",
    "singing competition",
    "quiz",
    "musical instrumental",
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Student, Role::Teacher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Nursery,
    Beginner,
    Primary,
    Junior,
    Senior,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Nursery,
        Section::Beginner,
        Section::Primary,
        Section::Junior,
        Section::Senior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Nursery => "nursery",
            Section::Beginner => "beginner",
            Section::Primary => "primary",
            Section::Junior => "junior",
            Section::Senior => "senior",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown section {s:?}"))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(Sqlite))]
pub struct Participant {
    pub id: String,
    pub participant_id: String,
    pub name: String,
    pub role: String,
    pub section: Option<String>,
    /// JSON array of competition names.
    pub competitions: String,
    pub secretary_id: String,
    pub created_at: NaiveDateTime,
}

impl Participant {
    /// Rows written by hand (or by older versions) may hold anything here;
    /// unparseable values read as no competitions at all.
    pub fn competitions(&self) -> Vec<String> {
        parse_competitions(&self.competitions)
    }

    /// Fetches a row owned by `secretary_id`. Rows belonging to somebody
    /// else are indistinguishable from missing ones.
    pub fn fetch_owned(
        id: &str,
        secretary_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Option<Participant>> {
        Ok(participants::table
            .filter(participants::id.eq(id))
            .filter(participants::secretary_id.eq(secretary_id))
            .select(Participant::as_select())
            .first(conn)
            .optional()?)
    }
}

pub fn parse_competitions(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{Role, Section, parse_competitions};

    #[test]
    fn roles_and_sections_parse_case_insensitively() {
        assert_eq!("Teacher".parse::<Role>(), Ok(Role::Teacher));
        assert_eq!(" junior ".parse::<Section>(), Ok(Section::Junior));
        assert!("elder".parse::<Section>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn malformed_competitions_read_as_empty() {
        assert_eq!(
            parse_competitions(r#"["quiz","memory verse"]"#),
            vec!["quiz".to_string(), "memory verse".to_string()]
        );
        assert!(parse_competitions("quiz").is_empty());
    }
}
