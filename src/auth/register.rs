use argon2::Argon2;
use argon2::PasswordHasher;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use axum::{extract::Form, response::Redirect};
use axum_extra::extract::PrivateCookieJar;
use chrono::{NaiveDate, Utc};
use diesel::{insert_into, prelude::*};
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{MaybeMember, MemberSession, session_expiry, set_marker},
    churches::{Church, ChurchSelect},
    error::BackendError,
    members::Member,
    schema::members,
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, JarResponse, StandardResponse, SuccessResponse, see_other_ok},
    validation::{FieldErrors, is_valid_email, is_valid_person_name, is_valid_phone},
    widgets::alert::FieldError,
};

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub church: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub church: String,
}

impl RegisterForm {
    /// Checks everything that does not need the database, apart from the
    /// church, which must be one of `church_labels`.
    pub fn validate(
        &self,
        church_labels: &[String],
        today: NaiveDate,
    ) -> Result<NewMember, FieldErrors> {
        let mut errors = FieldErrors::new();

        if let Err(e) = is_valid_person_name(&self.name) {
            errors.insert("name", e);
        }

        let email = self.email.trim().to_lowercase();
        if let Err(e) = is_valid_email(&email) {
            errors.insert("email", e);
        }

        let phone = match is_valid_phone(&self.phone) {
            Ok(phone) => Some(phone),
            Err(e) => {
                errors.insert("phone", e);
                None
            }
        };

        let date_of_birth =
            match NaiveDate::parse_from_str(self.date_of_birth.trim(), "%Y-%m-%d") {
                Ok(date) if date < today => Some(date),
                Ok(_) => {
                    errors.insert(
                        "date_of_birth",
                        "Date of birth must be in the past".to_string(),
                    );
                    None
                }
                Err(_) => {
                    errors.insert(
                        "date_of_birth",
                        "Please enter your date of birth".to_string(),
                    );
                    None
                }
            };

        if !church_labels.iter().any(|label| label == &self.church) {
            errors.insert("church", "Please select your church".to_string());
        }

        if !Member::validate_password(&self.password) {
            errors.insert(
                "password",
                "Password must be at least 6 characters".to_string(),
            );
        } else if self.password != self.password2 {
            errors.insert("password2", "Passwords do not match".to_string());
        }

        match (phone, date_of_birth) {
            (Some(phone), Some(date_of_birth)) if errors.is_empty() => {
                Ok(NewMember {
                    name: self.name.trim().to_string(),
                    email,
                    phone,
                    date_of_birth,
                    church: self.church.clone(),
                })
            }
            _ => Err(errors),
        }
    }
}

fn register_form(
    values: &RegisterForm,
    errors: &FieldErrors,
    churches: &[Church],
) -> Rendered<String> {
    let selected = Some(values.church.as_str()).filter(|c| !c.is_empty());
    Page::new()
        .body(maud! {
            div class="container py-4" style="max-width: 40rem;" {
                h1 class="mb-4" { "Create an account" }
                form method="post" {
                    div class="mb-3" {
                        label for="name" class="form-label" { "Full name" }
                        input type="text" class="form-control" id="name" name="name"
                            value=(&values.name) required;
                        FieldError msg=(errors.get("name"));
                    }
                    div class="mb-3" {
                        label for="email" class="form-label" { "Email" }
                        input type="email" class="form-control" id="email" name="email"
                            value=(&values.email) required;
                        FieldError msg=(errors.get("email"));
                    }
                    div class="row" {
                        div class="col-md-6 mb-3" {
                            label for="phone" class="form-label" { "Phone" }
                            input type="tel" class="form-control" id="phone" name="phone"
                                value=(&values.phone) placeholder="10 digit number" required;
                            FieldError msg=(errors.get("phone"));
                        }
                        div class="col-md-6 mb-3" {
                            label for="date_of_birth" class="form-label" { "Date of birth" }
                            input type="date" class="form-control" id="date_of_birth"
                                name="date_of_birth" value=(&values.date_of_birth) required;
                            FieldError msg=(errors.get("date_of_birth"));
                        }
                    }
                    div class="mb-3" {
                        label for="church" class="form-label" { "Church" }
                        ChurchSelect name=("church") churches=(churches) selected=(selected) by_label=(true);
                        FieldError msg=(errors.get("church"));
                    }
                    div class="row" {
                        div class="col-md-6 mb-3" {
                            label for="password" class="form-label" { "Password" }
                            input type="password" class="form-control" id="password"
                                name="password" minlength="6" required;
                            FieldError msg=(errors.get("password"));
                        }
                        div class="col-md-6 mb-3" {
                            label for="password2" class="form-label" { "Confirm password" }
                            input type="password" class="form-control" id="password2"
                                name="password2" required;
                            FieldError msg=(errors.get("password2"));
                        }
                    }
                    button type="submit" class="btn btn-primary" { "Register" }
                }
                p class="mt-3" {
                    "Already registered? " a href="/login" { "Log in" }
                }
            }
        })
        .render()
}

pub async fn register_page(
    member: MaybeMember,
    mut conn: Conn<false>,
) -> StandardResponse {
    if member.0.is_some() {
        return see_other_ok(Redirect::to("/dashboard"));
    }

    let churches = Church::fetch_all(&mut *conn)?;
    Ok(SuccessResponse::Success(register_form(
        &RegisterForm::default(),
        &FieldErrors::new(),
        &churches,
    )))
}

#[tracing::instrument(skip_all)]
pub async fn do_register(
    member: MaybeMember,
    jar: PrivateCookieJar,
    mut conn: Conn<true>,
    Form(form): Form<RegisterForm>,
) -> JarResponse {
    if member.0.is_some() {
        return Ok((
            jar,
            SuccessResponse::SeeOther(Box::new(Redirect::to("/dashboard"))),
        ));
    }

    let churches = Church::fetch_all(&mut *conn)?;
    let labels: Vec<String> = churches.iter().map(Church::label).collect();

    let retry = |errors: &FieldErrors| -> JarResponse {
        let mut values = form.clone();
        values.password.clear();
        values.password2.clear();
        Err(FailureResponse::BadRequest(register_form(
            &values, errors, &churches,
        )))
    };

    let new_member = match form.validate(&labels, Utc::now().date_naive()) {
        Ok(new_member) => new_member,
        Err(errors) => return retry(&errors),
    };

    let taken = members::table
        .filter(members::email.eq(&new_member.email))
        .select(members::id)
        .first::<String>(&mut *conn)
        .optional()
        .map_err(BackendError::from)?
        .is_some();
    if taken {
        let mut errors = FieldErrors::new();
        errors.insert(
            "email",
            "An account with this email already exists".to_string(),
        );
        return retry(&errors);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(form.password.as_bytes(), &salt)
        .map_err(|e| BackendError::Unknown(format!("could not hash password: {e}")))?
        .to_string();

    let member = Member {
        id: Uuid::now_v7().to_string(),
        name: new_member.name,
        email: new_member.email,
        phone: new_member.phone,
        date_of_birth: new_member.date_of_birth,
        church: new_member.church,
        password_hash,
        created_at: Utc::now().naive_utc(),
    };
    insert_into(members::table)
        .values(&member)
        .execute(&mut *conn)
        .map_err(BackendError::from)?;
    tracing::info!("Registered member {}", member.id);

    let jar = set_marker(
        jar,
        &MemberSession {
            id: member.id,
            expiry: session_expiry(member.created_at),
        },
    )?;

    Ok((
        jar,
        SuccessResponse::SeeOther(Box::new(Redirect::to("/dashboard"))),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::RegisterForm;

    fn valid() -> RegisterForm {
        RegisterForm {
            name: "Ruth Mathew".to_string(),
            email: " Ruth@Example.com ".to_string(),
            phone: "98765-43210".to_string(),
            date_of_birth: "2001-04-12".to_string(),
            church: "Grace, Kochi".to_string(),
            password: "secret1".to_string(),
            password2: "secret1".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn labels() -> Vec<String> {
        vec!["Grace, Kochi".to_string()]
    }

    #[test]
    fn valid_form_is_normalised() {
        let member = valid().validate(&labels(), today()).unwrap();
        assert_eq!(member.email, "ruth@example.com");
        assert_eq!(member.phone, "9876543210");
    }

    #[test]
    fn passwords_must_match_and_be_long_enough() {
        let mut form = valid();
        form.password2 = "secret2".to_string();
        let errors = form.validate(&labels(), today()).unwrap_err();
        assert!(errors.contains_key("password2"));

        let mut form = valid();
        form.password = "short".to_string();
        form.password2 = "short".to_string();
        let errors = form.validate(&labels(), today()).unwrap_err();
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn unknown_church_and_future_birthday_are_rejected() {
        let mut form = valid();
        form.church = "Somewhere else".to_string();
        form.date_of_birth = "2030-01-01".to_string();
        let errors = form.validate(&labels(), today()).unwrap_err();
        let fields: Vec<_> = errors.keys().copied().collect();
        assert_eq!(fields, vec!["date_of_birth", "church"]);
    }
}
