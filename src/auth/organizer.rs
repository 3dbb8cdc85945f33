//! The organizer "login" is a shared passkey. It keeps casual visitors out
//! of the dashboard and nothing more.

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    response::Redirect,
};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use hypertext::prelude::*;
use serde::Deserialize;

use crate::{
    auth::{OrganizerSession, clear_marker, clear_role_markers, set_marker},
    config::Settings,
    template::Page,
    util_resp::{FailureResponse, JarResponse, SuccessResponse},
    widgets::alert::ErrorAlert,
};

fn passkey_form(error: Option<&str>) -> Rendered<String> {
    Page::new()
        .body(maud! {
            div class="container py-4" style="max-width: 28rem;" {
                h1 class="mb-4" { "Organizer access" }
                @if let Some(error) = error {
                    ErrorAlert msg=(error);
                }
                form method="post" action="/organizer-login" {
                    div class="mb-3" {
                        label for="passkey" class="form-label" { "Passkey" }
                        input type="password" class="form-control" id="passkey"
                            name="passkey" autocomplete="off" required;
                    }
                    button type="submit" class="btn btn-primary" { "Enter" }
                }
            }
        })
        .render()
}

pub async fn organizer_index() -> Redirect {
    Redirect::to("/organizer-login")
}

/// Visiting this page logs out both secretaries and organizers.
pub async fn organizer_login_page(jar: PrivateCookieJar) -> JarResponse {
    Ok((
        clear_role_markers(jar),
        SuccessResponse::Success(passkey_form(None)),
    ))
}

#[derive(Deserialize)]
pub struct PasskeyForm {
    #[serde(default)]
    passkey: String,
}

#[tracing::instrument(skip_all)]
pub async fn do_organizer_login(
    State(settings): State<Arc<Settings>>,
    jar: PrivateCookieJar,
    Form(form): Form<PasskeyForm>,
) -> JarResponse {
    if form.passkey.trim() != settings.organizer_passkey {
        tracing::info!("Rejected organizer passkey");
        return Err(FailureResponse::BadRequest(passkey_form(Some(
            "That passkey is not correct.",
        ))));
    }

    let jar = set_marker(
        clear_role_markers(jar),
        &OrganizerSession::new(Utc::now().naive_utc()),
    )?;
    tracing::info!("Organizer logged in");

    Ok((
        jar,
        SuccessResponse::SeeOther(Box::new(Redirect::to("/organizer/dashboard"))),
    ))
}

pub async fn organizer_logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (
        clear_marker::<OrganizerSession>(jar),
        Redirect::to("/organizer-login"),
    )
}
