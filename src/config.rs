use std::{path::Path, sync::Arc};

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    r2d2::{ConnectionManager, Pool},
};
use diesel_migrations::MigrationHarness;
use hypertext::prelude::*;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    MIGRATIONS,
    auth::{
        MaybeMember,
        login::{do_login, login_page, logout},
        organizer::{
            do_organizer_login, organizer_index, organizer_login_page,
            organizer_logout,
        },
        register::{do_register, register_page},
        secretary::{
            do_secretary_login, lookup_returning_secretary,
            secretary_login_page, secretary_logout,
        },
    },
    error::BackendError,
    members::member_dashboard,
    organizer::{export_roster_csv, organizer_dashboard},
    secretary::{
        delete_participant, do_add_participant, do_edit_participant,
        edit_participant_page, secretary_dashboard,
    },
    state::{AppState, DbPool, tx_commit},
    template::Page,
    util_resp::{StandardResponse, success},
};

pub const DEFAULT_ORGANIZER_PASSKEY: &str = "CHURCH2025ADMIN";

/// Runtime settings. These are read from an (optional) TOML file, and then
/// overridden by environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub secret_key: Option<String>,
    /// Compared in plain text against what organizers type in. This is a
    /// UI lock, not real access control.
    pub organizer_passkey: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "registrar.db".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            secret_key: None,
            organizer_passkey: DEFAULT_ORGANIZER_PASSKEY.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("SECRET_KEY must be at least 64 bytes long")]
    ShortSecretKey,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str::<Settings>(&raw)?
            }
            None => Settings::default(),
        };

        Ok(settings.with_env_overrides(|name| std::env::var(name).ok()))
    }

    fn with_env_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Self {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(secret) = var("SECRET_KEY") {
            self.secret_key = Some(secret);
        }
        if let Some(passkey) = var("ORGANIZER_PASSKEY") {
            self.organizer_passkey = passkey;
        }
        self
    }

    pub fn cookie_key(&self) -> Result<Key, SettingsError> {
        match &self.secret_key {
            Some(secret) if secret.len() >= 64 => {
                Ok(Key::from(secret.as_bytes()))
            }
            Some(_) => Err(SettingsError::ShortSecretKey),
            None => {
                tracing::warn!(
                    "SECRET_KEY is not set; using a random key. Sessions will \
                     not survive a restart."
                );
                Ok(Key::generate())
            }
        }
    }
}

pub fn make_pool(db_url: &str) -> Result<DbPool, BackendError> {
    tracing::info!("Using database at {db_url}");

    Pool::builder()
        .max_size(if db_url == ":memory:" { 1 } else { 10 })
        .build(ConnectionManager::<SqliteConnection>::new(db_url))
        .map_err(BackendError::from)
}

pub async fn home(member: MaybeMember) -> StandardResponse {
    success(
        Page::new()
            .member_opt(member.0)
            .body(maud! {
                div class="container py-5" {
                    h1 class="mb-4" { "Church Competition Registration" }
                    div class="row g-4" {
                        div class="col-md-4" {
                            div class="card h-100" {
                                div class="card-body" {
                                    h5 class="card-title" { "Secretaries" }
                                    p class="card-text" {
                                        "Register the participants from your church."
                                    }
                                    a href="/secretary-login" class="btn btn-primary" {
                                        "Secretary login"
                                    }
                                }
                            }
                        }
                        div class="col-md-4" {
                            div class="card h-100" {
                                div class="card-body" {
                                    h5 class="card-title" { "Organizers" }
                                    p class="card-text" {
                                        "View every registration across all churches."
                                    }
                                    a href="/organizer-login" class="btn btn-primary" {
                                        "Organizer access"
                                    }
                                }
                            }
                        }
                        div class="col-md-4" {
                            div class="card h-100" {
                                div class="card-body" {
                                    h5 class="card-title" { "Members" }
                                    p class="card-text" {
                                        "Create an account or sign in to the member portal."
                                    }
                                    a href="/login" class="btn btn-primary" {
                                        "Member login"
                                    }
                                }
                            }
                        }
                    }
                }
            })
            .render(),
    )
}

pub fn run_migrations(pool: &DbPool) -> Result<(), BackendError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| BackendError::Unknown(format!("migrations failed: {e}")))?;
    Ok(())
}

/// The app with default settings and a fixed cookie key.
pub fn create_app(pool: DbPool) -> Router {
    let key = Key::from(&[0u8; 64][..]);
    create_app_with_settings(pool, Settings::default(), key)
}

pub fn create_app_with_settings(
    pool: DbPool,
    settings: Settings,
    key: Key,
) -> Router {
    let state = AppState {
        pool,
        key,
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(do_login))
        .route("/register", get(register_page).post(do_register))
        .route("/logout", post(logout))
        .route("/dashboard", get(member_dashboard))
        .route(
            "/secretary-login",
            get(secretary_login_page).post(do_secretary_login),
        )
        .route("/secretary-login/lookup", get(lookup_returning_secretary))
        .route(
            "/secretary",
            get(|| async { Redirect::to("/secretary/dashboard") }),
        )
        .route("/secretary/dashboard", get(secretary_dashboard))
        .route("/secretary/participants", post(do_add_participant))
        .route(
            "/secretary/participants/:id/edit",
            get(edit_participant_page).post(do_edit_participant),
        )
        .route(
            "/secretary/participants/:id/delete",
            post(delete_participant),
        )
        .route("/secretary/logout", post(secretary_logout))
        .route("/organizer", get(organizer_index))
        .route(
            "/organizer-login",
            get(organizer_login_page).post(do_organizer_login),
        )
        .route("/organizer/dashboard", get(organizer_dashboard))
        .route("/organizer/export.csv", get(export_roster_csv))
        .route("/organizer/logout", post(organizer_logout))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(tx_commit)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_ORGANIZER_PASSKEY, Settings, SettingsError};

    #[test]
    fn env_overrides_file_values() {
        let from_file: Settings = toml::from_str(
            r#"
            database_url = "file.db"
            organizer_passkey = "from-file"
            "#,
        )
        .unwrap();
        assert_eq!(from_file.bind_addr, "0.0.0.0:8000");

        let settings = from_file.with_env_overrides(|name| match name {
            "DATABASE_URL" => Some("env.db".to_string()),
            _ => None,
        });
        assert_eq!(settings.database_url, "env.db");
        assert_eq!(settings.organizer_passkey, "from-file");
    }

    #[test]
    fn defaults_use_the_builtin_passkey() {
        let settings = Settings::default().with_env_overrides(|_| None);
        assert_eq!(settings.organizer_passkey, DEFAULT_ORGANIZER_PASSKEY);
        assert!(settings.secret_key.is_none());
    }

    #[test]
    fn short_secret_keys_are_rejected() {
        let settings = Settings {
            secret_key: Some("too short".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.cookie_key(),
            Err(SettingsError::ShortSecretKey)
        ));
    }
}
