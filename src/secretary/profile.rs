use chrono::{NaiveDateTime, Utc};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::BackendResult, schema::profiles};

pub const SECRETARY_ROLE: &str = "secretary";

#[derive(
    Queryable, Selectable, Insertable, Serialize, Deserialize, Debug, Clone,
    PartialEq, Eq,
)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(Sqlite))]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub church_id: Option<String>,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl Profile {
    /// The oldest profile with this (normalized) phone number.
    pub fn by_phone(
        phone: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Option<Profile>> {
        Ok(profiles::table
            .filter(profiles::phone.eq(phone))
            .order_by(profiles::created_at.asc())
            .select(Profile::as_select())
            .first(conn)
            .optional()?)
    }

    /// The church's secretary. Nothing stops a church from having several,
    /// in which case the first one to register wins.
    pub fn secretary_of_church(
        church_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Option<Profile>> {
        Ok(profiles::table
            .filter(profiles::church_id.eq(church_id))
            .filter(profiles::role.eq(SECRETARY_ROLE))
            .order_by(profiles::created_at.asc())
            .select(Profile::as_select())
            .first(conn)
            .optional()?)
    }

    pub fn create(
        name: &str,
        phone: &str,
        church_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Profile> {
        let profile = Profile {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            church_id: Some(church_id.to_string()),
            role: SECRETARY_ROLE.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        diesel::insert_into(profiles::table)
            .values(&profile)
            .execute(conn)?;
        Ok(profile)
    }

    /// Renames the profile and moves it to `church_id`.
    pub fn update(
        mut self,
        name: &str,
        church_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Profile> {
        diesel::update(profiles::table.filter(profiles::id.eq(&self.id)))
            .set((
                profiles::name.eq(name),
                profiles::church_id.eq(Some(church_id)),
            ))
            .execute(conn)?;
        self.name = name.to_string();
        self.church_id = Some(church_id.to_string());
        Ok(self)
    }
}

/// What to do with a secretary's login attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginPlan {
    /// The phone number is known: refresh the name and church.
    Update(Profile),
    Create,
    /// The church already has a secretary with another phone number.
    Refuse { existing: Profile },
}

/// `church_secretary` is only looked up when the phone number is unknown or
/// belongs to a different church.
pub fn plan_login(
    by_phone: Option<Profile>,
    phone: &str,
    church_id: &str,
    church_secretary: impl FnOnce() -> BackendResult<Option<Profile>>,
) -> BackendResult<LoginPlan> {
    let same_church = by_phone
        .as_ref()
        .is_some_and(|p| p.church_id.as_deref() == Some(church_id));

    if !same_church {
        if let Some(existing) = church_secretary()? {
            if existing.phone != phone {
                return Ok(LoginPlan::Refuse { existing });
            }
        }
    }

    Ok(match by_phone {
        Some(profile) => LoginPlan::Update(profile),
        None => LoginPlan::Create,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::BackendError;

    fn profile(id: &str, phone: &str, church: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: format!("Secretary {id}"),
            phone: phone.to_string(),
            church_id: Some(church.to_string()),
            role: SECRETARY_ROLE.to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn new_secretary_for_an_empty_church_is_created() {
        let plan = plan_login(None, "1111111111", "c1", || Ok(None)).unwrap();
        assert_eq!(plan, LoginPlan::Create);
    }

    #[test]
    fn second_secretary_for_a_church_is_refused() {
        let existing = profile("a", "1111111111", "c1");
        let plan = plan_login(None, "2222222222", "c1", || Ok(Some(existing.clone())))
            .unwrap();
        assert_eq!(plan, LoginPlan::Refuse { existing });
    }

    #[test]
    fn returning_secretary_skips_the_church_check() {
        let me = profile("a", "1111111111", "c1");
        let plan = plan_login(Some(me.clone()), "1111111111", "c1", || {
            Err(BackendError::Unknown("should not be called".to_string()))
        })
        .unwrap();
        assert_eq!(plan, LoginPlan::Update(me));
    }

    #[test]
    fn switching_churches_respects_the_other_secretary() {
        let me = profile("a", "1111111111", "c1");
        let other = profile("b", "2222222222", "c2");

        let plan = plan_login(Some(me.clone()), "1111111111", "c2", || {
            Ok(Some(other.clone()))
        })
        .unwrap();
        assert_eq!(plan, LoginPlan::Refuse { existing: other });

        let plan =
            plan_login(Some(me.clone()), "1111111111", "c3", || Ok(None)).unwrap();
        assert_eq!(plan, LoginPlan::Update(me));
    }
}
