use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    schema::members,
    template::Page,
    util_resp::{StandardResponse, success},
    widgets::actions::Actions,
};

#[derive(
    Debug, Queryable, Selectable, Insertable, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub church: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl Member {
    pub fn validate_password(password: &str) -> bool {
        password.len() >= 6
    }
}

pub async fn member_dashboard(member: Member) -> StandardResponse {
    success(
        Page::new()
            .member(member.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Welcome, " (member.name) }
                    p class="text-muted" { (member.church) }
                    dl class="row mt-4" {
                        dt class="col-sm-3" { "Email" }
                        dd class="col-sm-9" { (member.email) }
                        dt class="col-sm-3" { "Phone" }
                        dd class="col-sm-9" { (member.phone) }
                        dt class="col-sm-3" { "Date of birth" }
                        dd class="col-sm-9" {
                            (member.date_of_birth.format("%-d %B %Y").to_string())
                        }
                        dt class="col-sm-3" { "Member since" }
                        dd class="col-sm-9" {
                            (member.created_at.format("%-d %B %Y").to_string())
                        }
                    }
                    Actions options=(&[("/", "Home"), ("post:/logout", "Log out")]);
                }
            })
            .render(),
    )
}
