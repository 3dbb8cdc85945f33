use axum::{
    extract::Query,
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use hypertext::prelude::*;

use crate::{
    auth::{OrganizerSession, Session},
    roster::{
        ListQuery, build_view,
        export::{export_filename, to_csv},
        filter_options, load_roster, sorted_filtered, stats,
        table::{FilterBar, RosterTable, TableOnly},
    },
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, StandardResponse, success},
};

const DASHBOARD: &str = "/organizer/dashboard";
const EXPORT: &str = "/organizer/export.csv";

pub async fn organizer_dashboard(
    _session: Session<OrganizerSession>,
    Query(query): Query<ListQuery>,
    Query(table_only): Query<TableOnly>,
    mut conn: Conn<false>,
) -> StandardResponse {
    let entries = load_roster(None, &mut *conn)?;
    let options = filter_options(&entries);
    let totals = stats(&entries);
    let view = build_view(entries, &query);

    if table_only.requested() {
        return success(
            maud! {
                RosterTable view=(&view) base=(DASHBOARD) show_owner=(true) row_actions=(false) export=(Some(EXPORT));
            }
            .render(),
        );
    }

    let cards = [
        ("Participants", totals.participants),
        ("Churches", totals.churches),
        ("Students", totals.students),
        ("Teachers", totals.teachers),
    ];

    success(
        Page::new()
            .organizer()
            .body(maud! {
                div class="container-fluid py-4 px-md-5" {
                    h1 class="mb-4" { "Organizer dashboard" }
                    div class="row g-3 mb-4" {
                        @for (label, value) in cards {
                            div class="col-6 col-md-3" {
                                div class="card text-center" {
                                    div class="card-body" {
                                        div class="display-6" { (value) }
                                        div class="text-muted" { (label) }
                                    }
                                }
                            }
                        }
                    }
                    FilterBar query=(&view.query) options=(&options) base=(DASHBOARD) show_owner=(true);
                    RosterTable view=(&view) base=(DASHBOARD) show_owner=(true) row_actions=(false) export=(Some(EXPORT));
                }
            })
            .render(),
    )
}

/// The filtered and sorted roster, every page of it, as a CSV download.
#[tracing::instrument(skip_all)]
pub async fn export_roster_csv(
    _session: Session<OrganizerSession>,
    Query(query): Query<ListQuery>,
    mut conn: Conn<false>,
) -> Result<impl IntoResponse, FailureResponse> {
    let entries = sorted_filtered(load_roster(None, &mut *conn)?, &query);
    let csv = to_csv(&entries)?;
    let filename = export_filename(Utc::now().date_naive());
    tracing::info!("Exporting {} participants", entries.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}
