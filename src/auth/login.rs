use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::{Form, Query};
use axum::response::Redirect;
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;
use url::Url;

use crate::{
    auth::{MaybeMember, MemberSession, clear_marker, session_expiry, set_marker},
    error::BackendError,
    members::Member,
    schema::members,
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, JarResponse, StandardResponse, SuccessResponse, see_other_ok},
    widgets::alert::ErrorAlert,
};

#[derive(Deserialize, Default)]
pub struct NextPage {
    pub next: Option<String>,
}

/// Where to go after logging in. Only paths on this site are honoured.
pub fn safe_next(next: Option<&str>) -> String {
    const FALLBACK: &str = "/dashboard";

    let Some(next) = next.filter(|n| !n.is_empty()) else {
        return FALLBACK.to_string();
    };
    let Ok(base) = Url::parse("http://portal.invalid/") else {
        return FALLBACK.to_string();
    };
    match base.join(next) {
        Ok(url) if url.origin() == base.origin() => match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        },
        _ => FALLBACK.to_string(),
    }
}

fn login_form(email: &str, error: Option<&str>) -> Rendered<String> {
    Page::new()
        .body(maud! {
            div class="container py-4" style="max-width: 32rem;" {
                h1 class="mb-4" { "Member login" }
                @if let Some(error) = error {
                    ErrorAlert msg=(error);
                }
                form method="post" {
                    div class="mb-3" {
                        label for="email" class="form-label" { "Email address" }
                        input type="email" class="form-control" id="email" name="email"
                            value=(email) placeholder="Enter email" required;
                    }
                    div class="mb-3" {
                        label for="password" class="form-label" { "Password" }
                        input type="password" class="form-control" id="password"
                            name="password" placeholder="Password" required;
                    }
                    button type="submit" class="btn btn-primary" { "Log in" }
                }
                p class="mt-3" {
                    "No account yet? " a href="/register" { "Register" }
                }
            }
        })
        .render()
}

pub async fn login_page(member: MaybeMember) -> StandardResponse {
    if member.0.is_some() {
        return see_other_ok(Redirect::to("/dashboard"));
    }

    Ok(SuccessResponse::Success(login_form("", None)))
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[tracing::instrument(skip_all)]
pub async fn do_login(
    member: MaybeMember,
    Query(next): Query<NextPage>,
    jar: PrivateCookieJar,
    mut conn: Conn<false>,
    Form(form): Form<LoginForm>,
) -> JarResponse {
    if member.0.is_some() {
        return Ok((jar, SuccessResponse::SeeOther(Box::new(Redirect::to("/dashboard")))));
    }

    let email = form.email.trim().to_lowercase();
    let found = members::table
        .filter(members::email.eq(&email))
        .select(Member::as_select())
        .first::<Member>(&mut *conn)
        .optional()
        .map_err(BackendError::from)?;

    let failed = || -> JarResponse {
        Err(FailureResponse::BadRequest(login_form(
            &email,
            Some("Incorrect email or password."),
        )))
    };

    let Some(found) = found else {
        tracing::info!("Login attempt for unknown email");
        return failed();
    };

    let parsed_hash = PasswordHash::new(&found.password_hash).map_err(|e| {
        BackendError::Unknown(format!("stored password hash is invalid: {e}"))
    })?;
    if Argon2::default()
        .verify_password(form.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::info!("Incorrect password for member {}", found.id);
        return failed();
    }

    let session = MemberSession {
        id: found.id.clone(),
        expiry: session_expiry(Utc::now().naive_utc()),
    };
    let jar = set_marker(jar, &session)?;
    tracing::info!("Member {} logged in", found.id);

    Ok((
        jar,
        SuccessResponse::SeeOther(Box::new(Redirect::to(&safe_next(
            next.next.as_deref(),
        )))),
    ))
}

pub async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (clear_marker::<MemberSession>(jar), Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::safe_next;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(None), "/dashboard");
        assert_eq!(safe_next(Some("")), "/dashboard");
        assert_eq!(safe_next(Some("/secretary/dashboard")), "/secretary/dashboard");
        assert_eq!(safe_next(Some("/dashboard?tab=1")), "/dashboard?tab=1");
        assert_eq!(safe_next(Some("https://evil.example/")), "/dashboard");
        assert_eq!(safe_next(Some("//evil.example/x")), "/dashboard");
    }
}
