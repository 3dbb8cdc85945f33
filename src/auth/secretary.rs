//! Secretary login.
//!
//! Secretaries have no password: a name, a phone number and a church are
//! enough. The phone number identifies a returning secretary, and each
//! church may only have one secretary. That rule is checked here before
//! writing, and nothing in the database backs it up.

use axum::{
    extract::{Form, Query},
    response::Redirect,
};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use hypertext::prelude::*;
use serde::Deserialize;

use crate::{
    auth::{SecretarySession, clear_marker, clear_role_markers, session_expiry, set_marker},
    churches::{Church, ChurchSelect},
    secretary::profile::{LoginPlan, Profile, plan_login},
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, JarResponse, SuccessResponse},
    validation::{FieldErrors, is_valid_person_name, is_valid_phone},
    widgets::alert::{ErrorAlert, FieldError, InfoAlert},
};

#[derive(Deserialize, Default, Debug, Clone)]
pub struct SecretaryLoginForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub church_id: String,
}

fn login_form(
    values: &SecretaryLoginForm,
    errors: &FieldErrors,
    churches: &[Church],
    alert: Option<String>,
) -> Rendered<String> {
    let selected = Some(values.church_id.as_str()).filter(|c| !c.is_empty());
    Page::new()
        .body(maud! {
            div class="container py-4" style="max-width: 36rem;" {
                h1 class="mb-2" { "Secretary login" }
                p class="text-muted mb-4" {
                    "Each church has a single secretary, identified by their phone number."
                }
                @if let Some(alert) = &alert {
                    ErrorAlert msg=(alert);
                }
                form method="post" action="/secretary-login" {
                    div class="mb-3" {
                        label for="phone" class="form-label" { "Mobile number" }
                        input type="tel" class="form-control" id="phone" name="phone"
                            value=(&values.phone)
                            placeholder="10 digit number"
                            hx-get="/secretary-login/lookup"
                            hx-trigger="keyup changed delay:300ms"
                            hx-target="#returning"
                            required;
                        FieldError msg=(errors.get("phone"));
                    }
                    div id="returning" {}
                    div class="mb-3" {
                        label for="name" class="form-label" { "Your name" }
                        input type="text" class="form-control" id="name" name="name"
                            value=(&values.name) required;
                        FieldError msg=(errors.get("name"));
                    }
                    div class="mb-3" {
                        label for="church_id" class="form-label" { "Church" }
                        ChurchSelect name=("church_id") churches=(churches) selected=(selected) by_label=(false);
                        FieldError msg=(errors.get("church_id"));
                    }
                    button type="submit" class="btn btn-primary" { "Continue" }
                }
            }
        })
        .render()
}

/// Visiting this page logs out both secretaries and organizers.
pub async fn secretary_login_page(
    jar: PrivateCookieJar,
    mut conn: Conn<false>,
) -> JarResponse {
    let churches = Church::fetch_all(&mut *conn)?;
    Ok((
        clear_role_markers(jar),
        SuccessResponse::Success(login_form(
            &SecretaryLoginForm::default(),
            &FieldErrors::new(),
            &churches,
            None,
        )),
    ))
}

#[tracing::instrument(skip_all)]
pub async fn do_secretary_login(
    jar: PrivateCookieJar,
    mut conn: Conn<true>,
    Form(form): Form<SecretaryLoginForm>,
) -> JarResponse {
    let churches = Church::fetch_all(&mut *conn)?;
    let mut errors = FieldErrors::new();

    if let Err(e) = is_valid_person_name(&form.name) {
        errors.insert("name", e);
    }
    let phone = match is_valid_phone(&form.phone) {
        Ok(phone) => Some(phone),
        Err(e) => {
            errors.insert("phone", e);
            None
        }
    };
    let church = churches.iter().find(|c| c.id == form.church_id).cloned();
    if church.is_none() {
        errors.insert("church_id", "Please select a church".to_string());
    }

    let (Some(phone), Some(church), true) = (phone, church, errors.is_empty())
    else {
        return Err(FailureResponse::BadRequest(login_form(
            &form, &errors, &churches, None,
        )));
    };
    let name = form.name.trim().to_string();

    let by_phone = Profile::by_phone(&phone, &mut *conn)?;
    let is_returning = by_phone.is_some();
    let plan = plan_login(by_phone, &phone, &church.id, || {
        Profile::secretary_of_church(&church.id, &mut *conn)
    })?;

    let profile = match plan {
        LoginPlan::Update(profile) => profile.update(&name, &church.id, &mut *conn)?,
        LoginPlan::Create => Profile::create(&name, &phone, &church.id, &mut *conn)?,
        LoginPlan::Refuse { existing } => {
            tracing::info!(
                "Refused secretary login for church {}: already registered to {}",
                church.id,
                existing.id
            );
            return Err(FailureResponse::Conflict(login_form(
                &form,
                &errors,
                &churches,
                Some(format!(
                    "{} already has a registered secretary ({}). Only one \
                     secretary per church is allowed; please contact the \
                     organizers if this is wrong.",
                    church.label(),
                    existing.name
                )),
            )));
        }
    };

    let now = Utc::now().naive_utc();
    let session = SecretarySession {
        id: profile.id.clone(),
        name: profile.name.clone(),
        phone: profile.phone.clone(),
        church_id: church.id.clone(),
        church_name: church.church_name.clone(),
        church_place: church.church_place.clone(),
        login_time: now,
        expiry: session_expiry(now),
        is_returning,
    };
    let jar = set_marker(clear_role_markers(jar), &session)?;
    tracing::info!("Secretary {} logged in for church {}", profile.id, church.id);

    Ok((
        jar,
        SuccessResponse::SeeOther(Box::new(Redirect::to("/secretary/dashboard"))),
    ))
}

#[derive(Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    phone: String,
}

/// htmx fragment greeting a secretary whose number we already know.
pub async fn lookup_returning_secretary(
    Query(query): Query<LookupQuery>,
    mut conn: Conn<false>,
) -> Result<SuccessResponse, FailureResponse> {
    let Ok(phone) = is_valid_phone(&query.phone) else {
        return Ok(SuccessResponse::Success(maud! { "" }.render()));
    };

    let church = match Profile::by_phone(&phone, &mut *conn)? {
        Some(profile) => match &profile.church_id {
            Some(church_id) => Church::fetch(church_id, &mut *conn)?
                .map(|church| (profile.name.clone(), church.label())),
            None => None,
        },
        None => None,
    };

    Ok(SuccessResponse::Success(
        maud! {
            @if let Some((name, church)) = &church {
                InfoAlert msg=(format!("Welcome back, {name} ({church})."));
            }
        }
        .render(),
    ))
}

pub async fn secretary_logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (
        clear_marker::<SecretarySession>(jar),
        Redirect::to("/secretary-login"),
    )
}
