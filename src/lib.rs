use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod auth;
pub mod churches;
pub mod config;
pub mod error;
pub mod members;
pub mod organizer;
pub mod participants;
pub mod roster;
pub mod schema;
pub mod secretary;
pub mod state;
pub mod template;
pub mod util_resp;
pub mod validation;
pub mod widgets;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[cfg(test)]
mod test;
