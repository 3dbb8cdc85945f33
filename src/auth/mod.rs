//! Session markers and the route access gate.
//!
//! Each role keeps a small typed marker in an encrypted (private) cookie. A
//! protected route extracts [`Session<T>`]; while the extractor runs the
//! request is "checking", and it ends up either authorized (the handler runs
//! with the decoded marker) or redirected to the role's login page. A marker
//! which is present but cannot be decoded, is incomplete, or has expired is
//! treated exactly like a missing one, except that it is also cleared.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar, PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use chrono::{NaiveDateTime, TimeDelta, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::BackendError,
    members::Member,
    schema::members,
    state::{DbPool, ThreadSafeConn},
};

pub mod login;
pub mod organizer;
pub mod register;
pub mod secretary;

/// How long any marker stays valid after login.
pub const SESSION_DAYS: i64 = 7;

pub trait Marker: Serialize + DeserializeOwned + Send {
    const COOKIE: &'static str;
    const LOGIN_ROUTE: &'static str;

    fn is_well_formed(&self) -> bool;

    fn expiry(&self) -> NaiveDateTime;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SecretarySession {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub church_id: String,
    pub church_name: String,
    pub church_place: String,
    pub login_time: NaiveDateTime,
    pub expiry: NaiveDateTime,
    pub is_returning: bool,
}

impl Marker for SecretarySession {
    const COOKIE: &'static str = "secretary_login";
    const LOGIN_ROUTE: &'static str = "/secretary-login";

    fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }

    fn expiry(&self) -> NaiveDateTime {
        self.expiry
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OrganizerSession {
    pub role: String,
    pub login_time: NaiveDateTime,
    pub expiry: NaiveDateTime,
    pub authorized: bool,
}

impl OrganizerSession {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            role: "organizer".to_string(),
            login_time: now,
            expiry: session_expiry(now),
            authorized: true,
        }
    }
}

impl Marker for OrganizerSession {
    const COOKIE: &'static str = "organizer_login";
    const LOGIN_ROUTE: &'static str = "/organizer-login";

    fn is_well_formed(&self) -> bool {
        self.authorized && self.role == "organizer"
    }

    fn expiry(&self) -> NaiveDateTime {
        self.expiry
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MemberSession {
    pub id: String,
    pub expiry: NaiveDateTime,
}

impl Marker for MemberSession {
    const COOKIE: &'static str = "member_login";
    const LOGIN_ROUTE: &'static str = "/login";

    fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
    }

    fn expiry(&self) -> NaiveDateTime {
        self.expiry
    }
}

pub fn session_expiry(now: NaiveDateTime) -> NaiveDateTime {
    now + TimeDelta::days(SESSION_DAYS)
}

/// Outcome of checking a marker.
#[derive(Debug, PartialEq, Eq)]
pub enum Gate<T> {
    Authorized(T),
    RedirectToLogin { clear_marker: bool },
}

pub fn check_marker<T: Marker>(raw: Option<&str>, now: NaiveDateTime) -> Gate<T> {
    let Some(raw) = raw else {
        return Gate::RedirectToLogin {
            clear_marker: false,
        };
    };

    match serde_json::from_str::<T>(raw) {
        Ok(marker) if marker.is_well_formed() && now < marker.expiry() => {
            Gate::Authorized(marker)
        }
        _ => Gate::RedirectToLogin { clear_marker: true },
    }
}

/// Like [`check_marker`], but also knows whether the browser sent the cookie
/// at all. A cookie that was sent but could not be decrypted is malformed.
pub fn check_cookie<T: Marker>(
    present: bool,
    decrypted: Option<&str>,
    now: NaiveDateTime,
) -> Gate<T> {
    match decrypted {
        None if present => Gate::RedirectToLogin { clear_marker: true },
        decrypted => check_marker(decrypted, now),
    }
}

/// Rejection produced when the gate sends the user back to a login page.
pub struct GateRedirect {
    jar: PrivateCookieJar,
    to: &'static str,
    clear: Option<&'static str>,
}

impl IntoResponse for GateRedirect {
    fn into_response(self) -> Response {
        let jar = match self.clear {
            Some(name) => remove_cookie(self.jar, name),
            None => self.jar,
        };
        (jar, Redirect::to(self.to)).into_response()
    }
}

pub fn set_marker<T: Marker>(
    jar: PrivateCookieJar,
    marker: &T,
) -> Result<PrivateCookieJar, BackendError> {
    let value = serde_json::to_string(marker)?;
    Ok(jar.add(
        Cookie::build((T::COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    ))
}

pub fn clear_marker<T: Marker>(jar: PrivateCookieJar) -> PrivateCookieJar {
    remove_cookie(jar, T::COOKIE)
}

/// Visiting either role's login page forgets both roles.
pub fn clear_role_markers(jar: PrivateCookieJar) -> PrivateCookieJar {
    let jar = clear_marker::<SecretarySession>(jar);
    clear_marker::<OrganizerSession>(jar)
}

fn remove_cookie(jar: PrivateCookieJar, name: &'static str) -> PrivateCookieJar {
    jar.remove(Cookie::build(name).path("/"))
}

/// An authorized session of role `T`.
pub struct Session<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Session<T>
where
    T: Marker,
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = GateRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let present = CookieJar::from_headers(&parts.headers)
            .get(T::COOKIE)
            .is_some();
        let raw = jar.get(T::COOKIE).map(|c| c.value().to_string());
        match check_cookie::<T>(present, raw.as_deref(), Utc::now().naive_utc()) {
            Gate::Authorized(marker) => Ok(Session(marker)),
            Gate::RedirectToLogin { clear_marker } => {
                if clear_marker {
                    tracing::info!(
                        "Clearing malformed or expired {} marker",
                        T::COOKIE
                    );
                }
                Err(GateRedirect {
                    jar,
                    to: T::LOGIN_ROUTE,
                    clear: clear_marker.then_some(T::COOKIE),
                })
            }
        }
    }
}

async fn load_member<S>(
    parts: &mut Parts,
    state: &S,
    session: &MemberSession,
) -> Result<Option<Member>, BackendError>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    let conn = ThreadSafeConn::<false>::from_request_parts(parts, state)
        .await
        .map_err(|_| BackendError::Transient("no connection".to_string()))?;
    let mut conn = conn.inner.lock().await;

    members::table
        .filter(members::id.eq(&session.id))
        .select(Member::as_select())
        .first::<Member>(&mut *conn)
        .optional()
        .map_err(BackendError::from)
}

#[async_trait]
impl<S> FromRequestParts<S> for Member
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Session(session) =
            Session::<MemberSession>::from_request_parts(parts, state)
                .await
                .map_err(IntoResponse::into_response)?;

        match load_member(parts, state, &session).await {
            Ok(Some(member)) => Ok(member),
            // the account is gone, so the marker is stale
            Ok(None) => {
                let jar =
                    PrivateCookieJar::<Key>::from_request_parts(parts, state)
                        .await
                        .unwrap_or_else(|never| match never {});
                Err(GateRedirect {
                    jar,
                    to: MemberSession::LOGIN_ROUTE,
                    clear: Some(MemberSession::COOKIE),
                }
                .into_response())
            }
            Err(e) => Err(crate::util_resp::FailureResponse::from(e)
                .into_response()),
        }
    }
}

/// The logged in member, if there is one. Never rejects.
pub struct MaybeMember(pub Option<Member>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeMember
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeMember(
            Member::from_request_parts(parts, state).await.ok(),
        ))
    }
}
