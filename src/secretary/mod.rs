//! The secretary dashboard: a secretary's own participants, and the forms to
//! add, edit and remove them.

use axum::{
    extract::{Path, Query},
    response::Redirect,
};
use axum_extra::extract::Form;
use chrono::Utc;
use diesel::prelude::*;
use hypertext::prelude::*;
use uuid::Uuid;

use crate::{
    auth::{SecretarySession, Session},
    error::BackendError,
    participants::{
        Participant,
        code::{
            StoredCodes, generate_unique_participant_id,
            should_update_participant_id,
        },
        form::{ParticipantForm, ParticipantFormView, ValidParticipant},
    },
    roster::{
        ListQuery, build_view, filter_options, load_roster, stats,
        table::{FilterBar, RosterTable, TableOnly},
    },
    schema::participants,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, err_not_found, see_other_ok, success,
    },
    validation::FieldErrors,
    widgets::alert::InfoAlert,
};

pub mod profile;

const DASHBOARD: &str = "/secretary/dashboard";

pub async fn secretary_dashboard(
    Session(session): Session<SecretarySession>,
    Query(query): Query<ListQuery>,
    Query(table_only): Query<TableOnly>,
    mut conn: Conn<false>,
) -> StandardResponse {
    let entries = load_roster(Some(&session.id), &mut *conn)?;
    let options = filter_options(&entries);
    let totals = stats(&entries);
    let view = build_view(entries, &query);

    if table_only.requested() {
        return success(
            maud! {
                RosterTable view=(&view) base=(DASHBOARD) show_owner=(false) row_actions=(true) export=(None);
            }
            .render(),
        );
    }

    let church = format!("{}, {}", session.church_name, session.church_place);
    let greeting = if session.is_returning {
        format!("Welcome back, {}.", session.name)
    } else {
        format!("Welcome, {}.", session.name)
    };
    let blank = ParticipantForm::blank();
    let no_errors = FieldErrors::new();

    success(
        Page::new()
            .secretary(&session)
            .body(maud! {
                div class="container py-4" {
                    h1 class="mb-1" { (church) }
                    InfoAlert msg=(&greeting);
                    div class="row g-3 mb-4" {
                        div class="col-sm-4" {
                            div class="card text-center" {
                                div class="card-body" {
                                    div class="display-6" { (totals.participants) }
                                    div class="text-muted" { "Participants" }
                                }
                            }
                        }
                        div class="col-sm-4" {
                            div class="card text-center" {
                                div class="card-body" {
                                    div class="display-6" { (totals.students) }
                                    div class="text-muted" { "Students" }
                                }
                            }
                        }
                        div class="col-sm-4" {
                            div class="card text-center" {
                                div class="card-body" {
                                    div class="display-6" { (totals.teachers) }
                                    div class="text-muted" { "Teachers" }
                                }
                            }
                        }
                    }
                    ParticipantFormView
                        action=("/secretary/participants")
                        title=("Add participant")
                        submit_label=("Add participant")
                        values=(&blank)
                        errors=(&no_errors);
                    h2 class="h4" { "Your participants" }
                    FilterBar query=(&view.query) options=(&options) base=(DASHBOARD) show_owner=(false);
                    RosterTable view=(&view) base=(DASHBOARD) show_owner=(false) row_actions=(true) export=(None);
                }
            })
            .render(),
    )
}

fn form_page(
    session: &SecretarySession,
    action: &str,
    title: &str,
    values: &ParticipantForm,
    errors: &FieldErrors,
) -> hypertext::Rendered<String> {
    Page::new()
        .secretary(session)
        .body(maud! {
            div class="container py-4" style="max-width: 44rem;" {
                a href=(DASHBOARD) class="btn btn-link px-0 mb-2" { "← Back to dashboard" }
                ParticipantFormView
                    action=(action)
                    title=(title)
                    submit_label=("Save")
                    values=(values)
                    errors=(errors);
            }
        })
        .render()
}

/// Allocates a code, turning an exhausted prefix into a form error.
fn allocate_code(
    conn: &mut Conn<true>,
    valid: &ValidParticipant,
) -> Result<String, FieldErrors> {
    generate_unique_participant_id(
        &mut StoredCodes(&mut **conn),
        valid.role,
        valid.section,
    )
    .map(|code| code.into_string())
    .map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.insert("code", e.to_string());
        errors
    })
}

#[tracing::instrument(skip_all, fields(secretary = %session.id))]
pub async fn do_add_participant(
    Session(session): Session<SecretarySession>,
    mut conn: Conn<true>,
    Form(form): Form<ParticipantForm>,
) -> StandardResponse {
    let retry = |errors: &FieldErrors| -> StandardResponse {
        Err(FailureResponse::BadRequest(form_page(
            &session,
            "/secretary/participants",
            "Add participant",
            &form,
            errors,
        )))
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return retry(&errors),
    };
    let code = match allocate_code(&mut conn, &valid) {
        Ok(code) => code,
        Err(errors) => return retry(&errors),
    };

    let participant = Participant {
        id: Uuid::now_v7().to_string(),
        participant_id: code,
        name: valid.name.clone(),
        role: valid.role.as_str().to_string(),
        section: valid.section.map(|s| s.as_str().to_string()),
        competitions: valid.competitions_json(),
        secretary_id: session.id.clone(),
        created_at: Utc::now().naive_utc(),
    };
    diesel::insert_into(participants::table)
        .values(&participant)
        .execute(&mut *conn)
        .map_err(BackendError::from)?;
    tracing::info!(
        "Registered participant {} ({})",
        participant.participant_id,
        participant.id
    );

    see_other_ok(Redirect::to(DASHBOARD))
}

pub async fn edit_participant_page(
    Session(session): Session<SecretarySession>,
    Path(id): Path<String>,
    mut conn: Conn<false>,
) -> StandardResponse {
    let Some(participant) = Participant::fetch_owned(&id, &session.id, &mut *conn)?
    else {
        return err_not_found();
    };

    success(form_page(
        &session,
        &format!("/secretary/participants/{id}/edit"),
        &format!("Edit {}", participant.participant_id),
        &ParticipantForm::from_participant(&participant),
        &FieldErrors::new(),
    ))
}

#[tracing::instrument(skip_all, fields(secretary = %session.id))]
pub async fn do_edit_participant(
    Session(session): Session<SecretarySession>,
    Path(id): Path<String>,
    mut conn: Conn<true>,
    Form(form): Form<ParticipantForm>,
) -> StandardResponse {
    let Some(participant) = Participant::fetch_owned(&id, &session.id, &mut *conn)?
    else {
        return err_not_found();
    };

    let action = format!("/secretary/participants/{id}/edit");
    let title = format!("Edit {}", participant.participant_id);
    let retry = |errors: &FieldErrors| -> StandardResponse {
        Err(FailureResponse::BadRequest(form_page(
            &session, &action, &title, &form, errors,
        )))
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return retry(&errors),
    };

    let code = if should_update_participant_id(
        &participant.participant_id,
        valid.role,
        valid.section,
    ) {
        match allocate_code(&mut conn, &valid) {
            Ok(code) => {
                tracing::info!(
                    "Participant {} changes code from {} to {code}",
                    participant.id,
                    participant.participant_id
                );
                code
            }
            Err(errors) => return retry(&errors),
        }
    } else {
        participant.participant_id.clone()
    };

    diesel::update(
        participants::table
            .filter(participants::id.eq(&participant.id))
            .filter(participants::secretary_id.eq(&session.id)),
    )
    .set((
        participants::participant_id.eq(&code),
        participants::name.eq(&valid.name),
        participants::role.eq(valid.role.as_str()),
        participants::section.eq(valid.section.map(|s| s.as_str())),
        participants::competitions.eq(valid.competitions_json()),
    ))
    .execute(&mut *conn)
    .map_err(BackendError::from)?;

    see_other_ok(Redirect::to(DASHBOARD))
}

#[tracing::instrument(skip_all, fields(secretary = %session.id, participant = %id))]
pub async fn delete_participant(
    Session(session): Session<SecretarySession>,
    Path(id): Path<String>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let n = diesel::delete(
        participants::table
            .filter(participants::id.eq(&id))
            .filter(participants::secretary_id.eq(&session.id)),
    )
    .execute(&mut *conn)
    .map_err(BackendError::from)?;

    if n == 0 {
        return err_not_found();
    }
    tracing::info!("Deleted participant {id}");

    see_other_ok(Redirect::to(DASHBOARD))
}
