//! Allocation of participant codes.
//!
//! A code is a prefix letter followed by a three digit number, e.g. `J004`.
//! The prefix is `T` for teachers, and otherwise the first letter of the
//! student's section. The number is the lowest one not yet used with that
//! prefix, so gaps left by deleted participants are filled before the
//! sequence is extended.
//!
//! Nothing in the database enforces uniqueness: two secretaries adding
//! participants with the same prefix at the same moment can be handed the
//! same code.

use std::{collections::BTreeSet, fmt};

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use rand::Rng;

use crate::{
    error::BackendResult,
    participants::{Role, Section},
    schema::participants,
};

const MAX_NUMBER: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantCode(String);

impl ParticipantCode {
    fn new(prefix: char, number: u32) -> Self {
        Self(format!("{prefix}{number:03}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ParticipantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("every participant code starting with {0} is already taken")]
pub struct CodeSpaceExhausted(pub char);

/// Somewhere existing codes can be read from.
pub trait CodeSource {
    /// All stored codes beginning with `prefix`. These may include codes
    /// that are not well formed.
    fn codes_with_prefix(&mut self, prefix: char) -> BackendResult<Vec<String>>;
}

/// Reads codes from the `participants` table.
pub struct StoredCodes<'c, C>(pub &'c mut C);

impl<C> CodeSource for StoredCodes<'_, C>
where
    C: LoadConnection<Backend = Sqlite>,
{
    fn codes_with_prefix(&mut self, prefix: char) -> BackendResult<Vec<String>> {
        Ok(participants::table
            .filter(participants::participant_id.like(format!("{prefix}%")))
            .select(participants::participant_id)
            .load::<String>(self.0)?)
    }
}

/// Students without a section share the `S` prefix with seniors.
pub fn prefix_for(role: Role, section: Option<Section>) -> char {
    match (role, section) {
        (Role::Teacher, _) => 'T',
        (Role::Student, Some(section)) => section
            .as_str()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('S'),
        (Role::Student, None) => 'S',
    }
}

/// The well formed suffix of `code`, if it carries `prefix`.
fn number_of(code: &str, prefix: char) -> Option<u32> {
    let mut chars = code.chars();
    if chars.next()? != prefix {
        return None;
    }
    let suffix = chars.as_str();
    if suffix.len() != 3 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// The smallest positive number not used by any of `existing`.
pub fn next_free_number<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    prefix: char,
) -> Option<u32> {
    let taken: BTreeSet<u32> = existing
        .into_iter()
        .filter_map(|code| number_of(code, prefix))
        .collect();

    (1..=MAX_NUMBER).find(|n| !taken.contains(n))
}

pub fn generate_unique_participant_id(
    source: &mut impl CodeSource,
    role: Role,
    section: Option<Section>,
) -> Result<ParticipantCode, CodeSpaceExhausted> {
    let prefix = prefix_for(role, section);

    match source.codes_with_prefix(prefix) {
        Ok(existing) => {
            next_free_number(existing.iter().map(String::as_str), prefix)
                .map(|n| ParticipantCode::new(prefix, n))
                .ok_or(CodeSpaceExhausted(prefix))
        }
        Err(e) => {
            let n = rand::rng().random_range(1..=MAX_NUMBER);
            tracing::warn!(
                "Could not read existing {prefix} codes ({e}); falling back \
                 to random number {n}, which may collide"
            );
            Ok(ParticipantCode::new(prefix, n))
        }
    }
}

/// Whether `current` no longer matches the role and section it belongs to.
pub fn should_update_participant_id(
    current: &str,
    role: Role,
    section: Option<Section>,
) -> bool {
    if current.chars().count() != 4 {
        return true;
    }
    current.chars().next() != Some(prefix_for(role, section))
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use regex::Regex;

    use super::*;
    use crate::error::BackendError;

    struct FixedCodes(Vec<&'static str>);

    impl CodeSource for FixedCodes {
        fn codes_with_prefix(
            &mut self,
            prefix: char,
        ) -> BackendResult<Vec<String>> {
            Ok(self
                .0
                .iter()
                .filter(|c| c.starts_with(prefix))
                .map(|c| c.to_string())
                .collect())
        }
    }

    struct BrokenStore;

    impl CodeSource for BrokenStore {
        fn codes_with_prefix(&mut self, _: char) -> BackendResult<Vec<String>> {
            Err(BackendError::Transient("database is locked".to_string()))
        }
    }

    static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\d{3}$").unwrap());

    #[test]
    fn every_role_and_section_yields_a_well_formed_code() {
        let mut cases = vec![(Role::Teacher, None, 'T'), (Role::Student, None, 'S')];
        for section in Section::ALL {
            let prefix = section.as_str().chars().next().unwrap().to_ascii_uppercase();
            cases.push((Role::Student, Some(section), prefix));
        }
        // a teacher's section is ignored
        cases.push((Role::Teacher, Some(Section::Junior), 'T'));

        for (role, section, prefix) in cases {
            let code = generate_unique_participant_id(
                &mut FixedCodes(vec!["T001", "N001", "J007"]),
                role,
                section,
            )
            .unwrap();
            assert!(CODE.is_match(code.as_str()), "{code}");
            assert!(code.as_str().starts_with(prefix), "{code}");
        }
    }

    #[test]
    fn gaps_are_filled_first() {
        let code = generate_unique_participant_id(
            &mut FixedCodes(vec!["N001", "N002", "N004"]),
            Role::Student,
            Some(Section::Nursery),
        )
        .unwrap();
        assert_eq!(code.as_str(), "N003");
    }

    #[test]
    fn first_code_is_one() {
        let code = generate_unique_participant_id(
            &mut FixedCodes(vec![]),
            Role::Teacher,
            None,
        )
        .unwrap();
        assert_eq!(code.as_str(), "T001");
    }

    #[test]
    fn malformed_codes_are_ignored() {
        assert_eq!(
            next_free_number(["P001", "P1", "P0002", "P00x", "PÄ02", "Q002"], 'P'),
            Some(2)
        );
    }

    struct FullStore;

    impl CodeSource for FullStore {
        fn codes_with_prefix(
            &mut self,
            prefix: char,
        ) -> BackendResult<Vec<String>> {
            Ok((1..=999).map(|n| format!("{prefix}{n:03}")).collect())
        }
    }

    #[test]
    fn exhausted_prefix_is_an_error() {
        assert_eq!(
            generate_unique_participant_id(
                &mut FullStore,
                Role::Student,
                Some(Section::Beginner)
            ),
            Err(CodeSpaceExhausted('B'))
        );
    }

    #[test]
    fn store_failure_falls_back_to_a_random_code() {
        let code = generate_unique_participant_id(
            &mut BrokenStore,
            Role::Student,
            Some(Section::Primary),
        )
        .unwrap();
        assert!(CODE.is_match(code.as_str()));
        assert!(code.as_str().starts_with('P'));
        assert_ne!(code.as_str(), "P000");
    }

    #[test]
    fn codes_are_regenerated_when_the_prefix_changes() {
        assert!(should_update_participant_id("N001", Role::Teacher, None));
        assert!(!should_update_participant_id("T001", Role::Teacher, None));
        assert!(should_update_participant_id(
            "J001",
            Role::Student,
            Some(Section::Senior)
        ));
        assert!(!should_update_participant_id(
            "S010",
            Role::Student,
            Some(Section::Senior)
        ));
        assert!(should_update_participant_id("T0001", Role::Teacher, None));
        assert!(should_update_participant_id("", Role::Teacher, None));
    }
}
