//! The participant list pipeline: sort, then filter, then paginate.
//!
//! Both dashboards fetch their rows once per request and run them through
//! [`build_view`]. The CSV export uses [`sorted_filtered`], which is the same
//! pipeline without the final pagination step.

use std::{cmp::Ordering, collections::HashSet, str::FromStr};

use chrono::NaiveDateTime;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::BackendResult,
    participants::{COMPETITIONS, Participant, Role, Section},
    schema::{churches, participants, profiles},
};

pub mod export;
pub mod table;

pub const PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// One participant, joined with the secretary who registered them and that
/// secretary's church.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: String,
    pub participant_id: String,
    pub name: String,
    pub role: String,
    pub section: Option<String>,
    pub competitions: Vec<String>,
    pub secretary_id: String,
    pub secretary: Option<String>,
    pub church_id: Option<String>,
    /// "Name, Place"
    pub church: Option<String>,
    pub registered: NaiveDateTime,
}

type RosterRow = (
    Participant,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Loads every participant, or only those registered by `secretary_id`.
pub fn load_roster(
    secretary_id: Option<&str>,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> BackendResult<Vec<RosterEntry>> {
    let mut query = participants::table
        .left_join(profiles::table.left_join(churches::table))
        .select((
            Participant::as_select(),
            profiles::name.nullable(),
            profiles::church_id.nullable(),
            churches::church_name.nullable(),
            churches::church_place.nullable(),
        ))
        .into_boxed();

    if let Some(secretary_id) = secretary_id {
        query = query.filter(participants::secretary_id.eq(secretary_id.to_string()));
    }

    let rows = query.load::<RosterRow>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(p, secretary, church_id, church_name, church_place)| {
            let competitions = p.competitions();
            let church = match (church_name, church_place) {
                (Some(name), Some(place)) => Some(format!("{name}, {place}")),
                (name, _) => name,
            };
            RosterEntry {
                id: p.id,
                participant_id: p.participant_id,
                name: p.name,
                role: p.role,
                section: p.section,
                competitions,
                secretary_id: p.secretary_id,
                secretary,
                church_id,
                church,
                registered: p.created_at,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    ParticipantId,
    Name,
    Role,
    Section,
    Church,
    Secretary,
    Registered,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::ParticipantId => "participant_id",
            SortKey::Name => "name",
            SortKey::Role => "role",
            SortKey::Section => "section",
            SortKey::Church => "church",
            SortKey::Secretary => "secretary",
            SortKey::Registered => "registered",
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "participant_id" => SortKey::ParticipantId,
            "name" => SortKey::Name,
            "role" => SortKey::Role,
            "section" => SortKey::Section,
            "church" => SortKey::Church,
            "secretary" => SortKey::Secretary,
            "registered" => SortKey::Registered,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(()),
        }
    }
}

/// Query string accepted by both dashboards and the export.
///
/// Everything is kept as raw text: blank values mean "no filter", and
/// values that do not parse fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secretary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ListQuery {
    pub fn search(&self) -> Option<&str> {
        active(&self.search)
    }

    pub fn role(&self) -> Option<&str> {
        active(&self.role)
    }

    pub fn section(&self) -> Option<&str> {
        active(&self.section)
    }

    pub fn competition(&self) -> Option<&str> {
        active(&self.competition)
    }

    pub fn church(&self) -> Option<&str> {
        active(&self.church)
    }

    pub fn secretary(&self) -> Option<&str> {
        active(&self.secretary)
    }

    /// Without an explicit key the newest registrations come first; an
    /// explicit key without a direction sorts ascending.
    pub fn sort_spec(&self) -> (SortKey, SortDirection) {
        let key = active(&self.sort).and_then(|s| s.parse().ok());
        let dir = active(&self.dir).and_then(|d| d.parse().ok());
        match (key, dir) {
            (Some(key), Some(dir)) => (key, dir),
            (Some(key), None) => (key, SortDirection::Asc),
            (None, dir) => {
                (SortKey::Registered, dir.unwrap_or(SortDirection::Desc))
            }
        }
    }

    pub fn page_size(&self) -> usize {
        active(&self.page_size)
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|size| PAGE_SIZES.contains(size))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// 1-based. Zero and garbage both mean the first page.
    pub fn page(&self) -> usize {
        active(&self.page)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1)
    }

    pub fn has_filters(&self) -> bool {
        self.search().is_some()
            || self.role().is_some()
            || self.section().is_some()
            || self.competition().is_some()
            || self.church().is_some()
            || self.secretary().is_some()
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page: Some(page.to_string()),
            ..self.clone()
        }
    }

    /// Clicking the current sort column flips the direction; any other
    /// column starts ascending. Either way we go back to the first page.
    pub fn with_sort(&self, key: SortKey) -> Self {
        let (current, dir) = self.sort_spec();
        let dir = if current == key {
            dir.flip()
        } else {
            SortDirection::Asc
        };
        Self {
            sort: Some(key.as_str().to_string()),
            dir: Some(dir.as_str().to_string()),
            page: None,
            ..self.clone()
        }
    }

    /// Only the filters and the sort order, without pagination. This is what
    /// the export link carries.
    pub fn without_page(&self) -> Self {
        Self {
            page: None,
            page_size: None,
            ..self.clone()
        }
    }

    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Missing values come first.
fn cmp_opt_text(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp_text(a, b),
    }
}

fn compare(a: &RosterEntry, b: &RosterEntry, key: SortKey) -> Ordering {
    match key {
        SortKey::ParticipantId => cmp_text(&a.participant_id, &b.participant_id),
        SortKey::Name => cmp_text(&a.name, &b.name),
        SortKey::Role => cmp_text(&a.role, &b.role),
        SortKey::Section => cmp_opt_text(&a.section, &b.section),
        SortKey::Church => cmp_opt_text(&a.church, &b.church),
        SortKey::Secretary => cmp_opt_text(&a.secretary, &b.secretary),
        SortKey::Registered => a.registered.cmp(&b.registered),
    }
}

/// Stable. Descending reverses the comparison, so missing values end up
/// last.
pub fn sort_entries(entries: &mut [RosterEntry], key: SortKey, dir: SortDirection) {
    entries.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match dir {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

pub fn matches(entry: &RosterEntry, query: &ListQuery) -> bool {
    let search = query.search().map(str::to_lowercase);
    let search_ok = search.is_none_or(|needle| {
        entry.name.to_lowercase().contains(&needle)
            || entry.participant_id.to_lowercase().contains(&needle)
            || entry.role.to_lowercase().contains(&needle)
    });

    search_ok
        && query.role().is_none_or(|role| entry.role == role)
        && query
            .section()
            .is_none_or(|section| entry.section.as_deref() == Some(section))
        && query
            .competition()
            .is_none_or(|c| entry.competitions.iter().any(|have| have == c))
        && query
            .church()
            .is_none_or(|church| entry.church_id.as_deref() == Some(church))
        && query
            .secretary()
            .is_none_or(|secretary| entry.secretary_id == secretary)
}

pub fn sorted_filtered(
    mut entries: Vec<RosterEntry>,
    query: &ListQuery,
) -> Vec<RosterEntry> {
    let (key, dir) = query.sort_spec();
    sort_entries(&mut entries, key, dir);
    entries.retain(|entry| matches(entry, query));
    entries
}

#[derive(Debug, Clone)]
pub struct RosterView {
    pub rows: Vec<RosterEntry>,
    /// Rows before filtering.
    pub total: usize,
    /// Rows after filtering, across all pages.
    pub matching: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub query: ListQuery,
}

pub fn build_view(entries: Vec<RosterEntry>, query: &ListQuery) -> RosterView {
    let total = entries.len();
    let filtered = sorted_filtered(entries, query);
    let matching = filtered.len();

    let page_size = query.page_size();
    let page = query.page();
    let page_count = matching.div_ceil(page_size);

    let rows = filtered
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    RosterView {
        rows,
        total,
        matching,
        page,
        page_size,
        page_count,
        query: query.clone(),
    }
}

/// `(value, label)` pairs for the filter drop-downs, built from the rows
/// that are actually present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub churches: Vec<(String, String)>,
    pub secretaries: Vec<(String, String)>,
    pub roles: Vec<String>,
    pub sections: Vec<String>,
    pub competitions: Vec<String>,
}

pub fn filter_options(entries: &[RosterEntry]) -> FilterOptions {
    let churches = entries
        .iter()
        .filter_map(|e| Some((e.church_id.clone()?, e.church.clone()?)))
        .unique_by(|(id, _)| id.clone())
        .sorted_by(|a, b| cmp_text(&a.1, &b.1))
        .collect();

    let secretaries = entries
        .iter()
        .map(|e| {
            let label = e.secretary.clone().unwrap_or_else(|| e.secretary_id.clone());
            (e.secretary_id.clone(), label)
        })
        .unique_by(|(id, _)| id.clone())
        .sorted_by(|a, b| cmp_text(&a.1, &b.1))
        .collect();

    let present_roles: HashSet<&str> = entries.iter().map(|e| e.role.as_str()).collect();
    let roles = Role::ALL
        .iter()
        .map(Role::as_str)
        .filter(|r| present_roles.contains(r))
        .map(str::to_string)
        .collect();

    let present_sections: HashSet<&str> =
        entries.iter().filter_map(|e| e.section.as_deref()).collect();
    let sections = Section::ALL
        .iter()
        .map(Section::as_str)
        .filter(|s| present_sections.contains(s))
        .map(str::to_string)
        .collect();

    let present_competitions: HashSet<&str> = entries
        .iter()
        .flat_map(|e| e.competitions.iter().map(String::as_str))
        .collect();
    let competitions = COMPETITIONS
        .iter()
        .filter(|c| present_competitions.contains(*c))
        .map(|c| c.to_string())
        .collect();

    FilterOptions {
        churches,
        secretaries,
        roles,
        sections,
        competitions,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStats {
    pub participants: usize,
    pub churches: usize,
    pub students: usize,
    pub teachers: usize,
}

pub fn stats(entries: &[RosterEntry]) -> RosterStats {
    RosterStats {
        participants: entries.len(),
        churches: entries
            .iter()
            .filter_map(|e| e.church_id.as_deref())
            .unique()
            .count(),
        students: entries.iter().filter(|e| e.role == Role::Student.as_str()).count(),
        teachers: entries.iter().filter(|e| e.role == Role::Teacher.as_str()).count(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;

    pub(crate) fn at(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + TimeDelta::minutes(minutes)
    }

    pub(crate) fn entry(code: &str, name: &str, minutes: i64) -> RosterEntry {
        let (role, section) = if code.starts_with('T') {
            ("teacher", None)
        } else {
            ("student", Some("junior".to_string()))
        };
        RosterEntry {
            id: format!("row-{code}"),
            participant_id: code.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            section,
            competitions: vec!["quiz".to_string()],
            secretary_id: "sec-1".to_string(),
            secretary: Some("Samuel".to_string()),
            church_id: Some("church-1".to_string()),
            church: Some("Grace, Kochi".to_string()),
            registered: at(minutes),
        }
    }

    fn many(n: usize) -> Vec<RosterEntry> {
        (0..n)
            .map(|i| entry(&format!("J{:03}", i + 1), &format!("Child {i}"), i as i64))
            .collect()
    }

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        serde_urlencoded::from_str(&serde_urlencoded::to_string(pairs).unwrap())
            .unwrap()
    }

    #[test]
    fn pages_split_forty_seven_rows() {
        let page = |n: &str| {
            build_view(many(47), &query(&[("page", n), ("page_size", "25")]))
        };
        assert_eq!(page("1").rows.len(), 25);
        assert_eq!(page("2").rows.len(), 22);
        assert!(page("3").rows.is_empty());
        assert_eq!(page("1").page_count, 2);
        assert_eq!(page("3").matching, 47);
    }

    #[test]
    fn bad_paging_values_fall_back() {
        let view = build_view(many(47), &query(&[("page", "0"), ("page_size", "7")]));
        assert_eq!(view.page, 1);
        assert_eq!(view.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(view.rows.len(), 25);

        let view = build_view(many(47), &query(&[("page", "x"), ("page_size", "10")]));
        assert_eq!(view.page, 1);
        assert_eq!(view.rows.len(), 10);
    }

    #[test]
    fn default_order_is_newest_first() {
        // inserted out of order on purpose
        let rows = vec![
            entry("J001", "Old", 0),
            entry("J002", "Newest", 30),
            entry("J003", "Middle", 10),
        ];
        let view = build_view(rows, &ListQuery::default());
        let names: Vec<_> = view.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Newest", "Middle", "Old"]);
    }

    #[test]
    fn names_sort_case_insensitively_and_stably() {
        let rows = vec![
            entry("J001", "bob", 0),
            entry("J002", "Alice", 1),
            entry("J003", "Bob", 2),
        ];
        let sorted = sorted_filtered(rows, &query(&[("sort", "name")]));
        let codes: Vec<_> = sorted.iter().map(|r| r.participant_id.as_str()).collect();
        assert_eq!(codes, vec!["J002", "J001", "J003"]);
    }

    #[test]
    fn missing_sections_sort_first_ascending_and_last_descending() {
        let rows = vec![entry("J001", "Kid", 0), entry("T001", "Teacher", 1)];

        let asc = sorted_filtered(rows.clone(), &query(&[("sort", "section"), ("dir", "asc")]));
        assert_eq!(asc[0].participant_id, "T001");

        let desc = sorted_filtered(rows, &query(&[("sort", "section"), ("dir", "desc")]));
        assert_eq!(desc[1].participant_id, "T001");
    }

    #[test]
    fn church_and_secretary_sort_with_missing_values_at_the_edges() {
        let mut orphan = entry("J001", "Orphan", 0);
        orphan.church = None;
        orphan.church_id = None;
        orphan.secretary = None;
        let mut bethel = entry("J002", "Bethel kid", 1);
        bethel.church = Some("bethel, Thrissur".to_string());
        bethel.secretary = Some("mary".to_string());
        let grace = entry("J003", "Grace kid", 2);
        let rows = vec![grace, orphan, bethel];

        let codes = |sorted: Vec<RosterEntry>| -> Vec<String> {
            sorted.into_iter().map(|r| r.participant_id).collect()
        };

        let asc = sorted_filtered(rows.clone(), &query(&[("sort", "church"), ("dir", "asc")]));
        assert_eq!(codes(asc), vec!["J001", "J002", "J003"]);
        let desc = sorted_filtered(rows.clone(), &query(&[("sort", "church"), ("dir", "desc")]));
        assert_eq!(codes(desc), vec!["J003", "J002", "J001"]);

        let asc = sorted_filtered(rows.clone(), &query(&[("sort", "secretary")]));
        assert_eq!(codes(asc), vec!["J001", "J002", "J003"]);
        let desc =
            sorted_filtered(rows, &query(&[("sort", "secretary"), ("dir", "desc")]));
        assert_eq!(codes(desc), vec!["J003", "J002", "J001"]);
    }

    #[test]
    fn unmatched_competition_yields_nothing_and_clearing_restores() {
        let rows = many(12);
        let filtered =
            build_view(rows.clone(), &query(&[("competition", "musical instrumental")]));
        assert_eq!(filtered.matching, 0);
        assert!(filtered.rows.is_empty());

        let cleared = build_view(
            rows,
            &query(&[("competition", ""), ("role", ""), ("search", "  ")]),
        );
        assert_eq!(cleared.matching, 12);
        assert_eq!(cleared.total, 12);
    }

    #[test]
    fn filters_are_combined() {
        let mut rows = many(3);
        rows.push(entry("T001", "Mr Child", 5));
        rows[0].church_id = Some("church-2".to_string());

        let by_search = sorted_filtered(rows.clone(), &query(&[("search", "CHILD")]));
        assert_eq!(by_search.len(), 4);

        let teachers = sorted_filtered(rows.clone(), &query(&[("search", "child"), ("role", "teacher")]));
        assert_eq!(teachers.len(), 1);

        let by_church = sorted_filtered(rows.clone(), &query(&[("church", "church-2")]));
        assert_eq!(by_church.len(), 1);

        let by_code = sorted_filtered(rows.clone(), &query(&[("search", "t00")]));
        assert_eq!(by_code[0].participant_id, "T001");

        rows[1].section = Some("senior".to_string());
        rows[2].secretary_id = "sec-2".to_string();

        let seniors = sorted_filtered(rows.clone(), &query(&[("section", "senior")]));
        assert_eq!(seniors.len(), 1);
        assert_eq!(seniors[0].participant_id, "J002");

        let juniors = sorted_filtered(rows.clone(), &query(&[("section", "junior")]));
        let codes: Vec<_> = juniors.iter().map(|r| r.participant_id.as_str()).collect();
        assert_eq!(codes, vec!["J003", "J001"]);

        let by_secretary = sorted_filtered(rows.clone(), &query(&[("secretary", "sec-2")]));
        assert_eq!(by_secretary.len(), 1);
        assert_eq!(by_secretary[0].participant_id, "J003");

        let none = sorted_filtered(
            rows,
            &query(&[("secretary", "sec-2"), ("section", "senior")]),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn sort_links_toggle_direction() {
        let q = ListQuery::default();
        assert_eq!(q.sort_spec(), (SortKey::Registered, SortDirection::Desc));

        let by_name = q.with_sort(SortKey::Name);
        assert_eq!(by_name.sort_spec(), (SortKey::Name, SortDirection::Asc));
        assert_eq!(
            by_name.with_sort(SortKey::Name).sort_spec(),
            (SortKey::Name, SortDirection::Desc)
        );
        assert_eq!(by_name.to_query_string(), "sort=name&dir=asc");
    }

    #[test]
    fn options_and_stats_reflect_present_rows() {
        let mut rows = many(2);
        rows.push(entry("T001", "Teacher", 3));
        rows[1].church_id = Some("church-2".to_string());
        rows[1].church = Some("Bethel, Thrissur".to_string());
        rows[1].competitions = vec!["memory verse".to_string()];

        let options = filter_options(&rows);
        assert_eq!(
            options.churches,
            vec![
                ("church-2".to_string(), "Bethel, Thrissur".to_string()),
                ("church-1".to_string(), "Grace, Kochi".to_string()),
            ]
        );
        assert_eq!(options.roles, vec!["student", "teacher"]);
        assert_eq!(options.sections, vec!["junior"]);
        assert_eq!(options.competitions, vec!["memory verse", "quiz"]);

        let stats = stats(&rows);
        assert_eq!(stats.participants, 3);
        assert_eq!(stats.churches, 2);
        assert_eq!(stats.students, 2);
        assert_eq!(stats.teachers, 1);
    }
}
