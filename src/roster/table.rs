use hypertext::prelude::*;
use serde::Deserialize;

use crate::roster::{
    FilterOptions, ListQuery, PAGE_SIZES, RosterView, SortDirection, SortKey,
};

/// `?tableonly=1` asks a dashboard for just the roster table, which is how
/// htmx refreshes it after a filter or sort change.
#[derive(Deserialize, Default)]
pub struct TableOnly {
    #[serde(default)]
    pub tableonly: Option<String>,
}

impl TableOnly {
    pub fn requested(&self) -> bool {
        self.tableonly.as_deref().is_some_and(|v| !v.is_empty() && v != "0")
    }
}

pub struct RosterTable<'r> {
    pub view: &'r RosterView,
    /// Path of the page the table lives on.
    pub base: &'r str,
    /// Church and secretary columns (organizers only).
    pub show_owner: bool,
    /// Edit/delete buttons (secretaries only).
    pub row_actions: bool,
    /// Where the CSV export lives, if the viewer may export. The link
    /// carries the current filters and sort order.
    pub export: Option<&'r str>,
}

impl RosterTable<'_> {
    fn href(&self, query: &ListQuery) -> String {
        let qs = query.to_query_string();
        if qs.is_empty() {
            self.base.to_string()
        } else {
            format!("{}?{qs}", self.base)
        }
    }

    fn fragment_href(&self, query: &ListQuery) -> String {
        let qs = query.to_query_string();
        if qs.is_empty() {
            format!("{}?tableonly=1", self.base)
        } else {
            format!("{}?{qs}&tableonly=1", self.base)
        }
    }

    fn columns(&self) -> Vec<(&'static str, Option<SortKey>)> {
        let mut columns = vec![
            ("ID", Some(SortKey::ParticipantId)),
            ("Name", Some(SortKey::Name)),
            ("Role", Some(SortKey::Role)),
            ("Section", Some(SortKey::Section)),
            ("Competitions", None),
        ];
        if self.show_owner {
            columns.push(("Church", Some(SortKey::Church)));
            columns.push(("Secretary", Some(SortKey::Secretary)));
        }
        columns.push(("Registered", Some(SortKey::Registered)));
        if self.row_actions {
            columns.push(("", None));
        }
        columns
    }
}

impl Renderable for RosterTable<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let view = self.view;
        let (sort_key, sort_dir) = view.query.sort_spec();
        let first = if view.rows.is_empty() {
            0
        } else {
            (view.page - 1) * view.page_size + 1
        };
        let last = first + view.rows.len().saturating_sub(1);

        maud! {
            div id="roster" {
                div class="d-flex justify-content-between align-items-center mb-2" {
                    p class="text-muted small mb-0" {
                        @if view.rows.is_empty() {
                            "Showing 0"
                        } @else {
                            "Showing " (first) "–" (last)
                        }
                        " of " (view.matching) " matching (" (view.total) " total)"
                    }
                    @if let Some(export) = self.export {
                        @let qs = view.query.without_page().to_query_string();
                        a class="btn btn-sm btn-success"
                            href=(if qs.is_empty() { export.to_string() } else { format!("{export}?{qs}") }) {
                            "Export CSV"
                        }
                    }
                }
                @if view.matching == 0 {
                    div class="alert alert-secondary" {
                        @if view.total == 0 {
                            "No participants found."
                        } @else {
                            "No participants match your search or filters."
                        }
                    }
                } @else {
                    div class="table-responsive" {
                        table class="table table-striped table-hover align-middle" {
                            thead {
                                tr {
                                    @for (label, key) in self.columns() {
                                        th scope="col" {
                                            @if let Some(key) = key {
                                                @let next = view.query.with_sort(key);
                                                a href=(self.href(&next))
                                                    hx-get=(self.fragment_href(&next))
                                                    hx-target="#roster"
                                                    hx-swap="outerHTML"
                                                    hx-push-url=(self.href(&next))
                                                    class="link-dark text-decoration-none" {
                                                    (label)
                                                    @if key == sort_key {
                                                        @match sort_dir {
                                                            SortDirection::Asc => { " ▲" }
                                                            SortDirection::Desc => { " ▼" }
                                                        }
                                                    }
                                                }
                                            } @else {
                                                (label)
                                            }
                                        }
                                    }
                                }
                            }
                            tbody {
                                @for row in &view.rows {
                                    tr {
                                        td { code { (&row.participant_id) } }
                                        td { (&row.name) }
                                        td { (&row.role) }
                                        td { (row.section.as_deref().unwrap_or("—")) }
                                        td { (row.competitions.join(", ")) }
                                        @if self.show_owner {
                                            td { (row.church.as_deref().unwrap_or("—")) }
                                            td { (row.secretary.as_deref().unwrap_or("—")) }
                                        }
                                        td { (row.registered.format("%-m/%-d/%Y").to_string()) }
                                        @if self.row_actions {
                                            td class="text-end text-nowrap" {
                                                a class="btn btn-sm btn-outline-primary me-1"
                                                    href=(format!("/secretary/participants/{}/edit", row.id)) {
                                                    "Edit"
                                                }
                                                form method="post"
                                                    class="d-inline"
                                                    action=(format!("/secretary/participants/{}/delete", row.id))
                                                    onsubmit="return confirm('Delete this participant?');" {
                                                    button type="submit" class="btn btn-sm btn-outline-danger" {
                                                        "Delete"
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                @if view.page_count > 1 {
                    nav aria-label="Roster pages" {
                        ul class="pagination" {
                            @for page in 1..=view.page_count {
                                @let target = view.query.with_page(page);
                                li class=(if page == view.page { "page-item active" } else { "page-item" }) {
                                    a class="page-link"
                                        href=(self.href(&target))
                                        hx-get=(self.fragment_href(&target))
                                        hx-target="#roster"
                                        hx-swap="outerHTML"
                                        hx-push-url=(self.href(&target)) {
                                        (page)
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

/// `<select>` for the page size, to sit inside a filter form.
pub struct PageSizeSelect<'r> {
    pub query: &'r ListQuery,
}

impl Renderable for PageSizeSelect<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let current = self.query.page_size();
        maud! {
            select class="form-select" name="page_size" aria-label="Rows per page" {
                @for size in PAGE_SIZES {
                    option value=(size.to_string()) selected[size == current] {
                        (size) " per page"
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

/// The search box and drop-downs above the table. Works as a plain GET
/// form, and with htmx swaps just the table on every change.
pub struct FilterBar<'r> {
    pub query: &'r ListQuery,
    pub options: &'r FilterOptions,
    pub base: &'r str,
    /// Church and secretary filters (organizers only).
    pub show_owner: bool,
}

impl Renderable for FilterBar<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let q = self.query;
        let (sort, dir) = q.sort_spec();
        maud! {
            form method="get"
                action=(self.base)
                class="row g-2 align-items-end mb-3"
                hx-get=(format!("{}?tableonly=1", self.base))
                hx-trigger="change, input delay:400ms"
                hx-target="#roster"
                hx-swap="outerHTML" {
                input type="hidden" name="sort" value=(sort.as_str());
                input type="hidden" name="dir" value=(dir.as_str());
                div class="col-md-3" {
                    label for="search" class="form-label small" { "Search" }
                    input type="search" class="form-control" id="search" name="search"
                        value=(q.search().unwrap_or(""))
                        placeholder="Name, ID or role";
                }
                div class="col-md" {
                    label for="role-filter" class="form-label small" { "Role" }
                    select class="form-select" id="role-filter" name="role" {
                        option value="" { "All roles" }
                        @for role in &self.options.roles {
                            option value=(role) selected[q.role() == Some(role.as_str())] { (role) }
                        }
                    }
                }
                div class="col-md" {
                    label for="section-filter" class="form-label small" { "Section" }
                    select class="form-select" id="section-filter" name="section" {
                        option value="" { "All sections" }
                        @for section in &self.options.sections {
                            option value=(section) selected[q.section() == Some(section.as_str())] { (section) }
                        }
                    }
                }
                div class="col-md" {
                    label for="competition-filter" class="form-label small" { "Competition" }
                    select class="form-select" id="competition-filter" name="competition" {
                        option value="" { "All competitions" }
                        @for competition in &self.options.competitions {
                            option value=(competition) selected[q.competition() == Some(competition.as_str())] { (competition) }
                        }
                    }
                }
                @if self.show_owner {
                    div class="col-md" {
                        label for="church-filter" class="form-label small" { "Church" }
                        select class="form-select" id="church-filter" name="church" {
                            option value="" { "All churches" }
                            @for (id, label) in &self.options.churches {
                                option value=(id) selected[q.church() == Some(id.as_str())] { (label) }
                            }
                        }
                    }
                    div class="col-md" {
                        label for="secretary-filter" class="form-label small" { "Secretary" }
                        select class="form-select" id="secretary-filter" name="secretary" {
                            option value="" { "All secretaries" }
                            @for (id, label) in &self.options.secretaries {
                                option value=(id) selected[q.secretary() == Some(id.as_str())] { (label) }
                            }
                        }
                    }
                }
                div class="col-md-auto" {
                    PageSizeSelect query=(q);
                }
                div class="col-md-auto" {
                    button type="submit" class="btn btn-outline-primary" { "Apply" }
                    @if q.has_filters() {
                        a href=(self.base) class="btn btn-link" { "Clear" }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

#[cfg(test)]
mod tests {
    use hypertext::prelude::*;

    use super::{RosterTable, TableOnly};
    use crate::roster::{ListQuery, build_view, tests::entry};

    #[test]
    fn table_only_flag() {
        assert!(!TableOnly::default().requested());
        let t = TableOnly { tableonly: Some("1".to_string()) };
        assert!(t.requested());
        let t = TableOnly { tableonly: Some("0".to_string()) };
        assert!(!t.requested());
    }

    #[test]
    fn owner_columns_are_optional() {
        let view = &build_view(vec![entry("J001", "Anna", 0)], &ListQuery::default());

        let organizer = maud! {
            RosterTable view=(view) base=("/organizer/dashboard") show_owner=(true) row_actions=(false) export=(Some("/organizer/export.csv"));
        }
        .render()
        .into_inner();
        assert!(organizer.contains("Grace, Kochi"));
        assert!(!organizer.contains("/delete"));
        assert!(organizer.contains("/organizer/export.csv"));

        let secretary = maud! {
            RosterTable view=(view) base=("/secretary/dashboard") show_owner=(false) row_actions=(true) export=(None);
        }
        .render()
        .into_inner();
        assert!(!secretary.contains("Grace, Kochi"));
        assert!(secretary.contains("/secretary/participants/row-J001/delete"));
    }
}
