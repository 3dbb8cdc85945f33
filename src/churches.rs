//! Churches are created by administrators (see the `add-church` command) and
//! only ever read by the portal.

use chrono::{NaiveDateTime, Utc};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::BackendResult, schema::churches};

#[derive(
    Queryable, Selectable, Insertable, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = churches)]
#[diesel(check_for_backend(Sqlite))]
pub struct Church {
    pub id: String,
    pub church_name: String,
    pub church_place: String,
    pub created_at: NaiveDateTime,
}

impl Church {
    pub fn fetch_all(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Vec<Church>> {
        Ok(churches::table
            .order_by((churches::church_name.asc(), churches::church_place.asc()))
            .select(Church::as_select())
            .load(conn)?)
    }

    pub fn fetch(
        id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Option<Church>> {
        Ok(churches::table
            .filter(churches::id.eq(id))
            .select(Church::as_select())
            .first(conn)
            .optional()?)
    }

    pub fn create(
        name: &str,
        place: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> BackendResult<Church> {
        let church = Church {
            id: Uuid::now_v7().to_string(),
            church_name: name.trim().to_string(),
            church_place: place.trim().to_string(),
            created_at: Utc::now().naive_utc(),
        };
        diesel::insert_into(churches::table)
            .values(&church)
            .execute(conn)?;
        Ok(church)
    }

    /// "Name, Place", as shown in drop-downs and exports.
    pub fn label(&self) -> String {
        format!("{}, {}", self.church_name, self.church_place)
    }
}

/// A `<select>` listing every church.
pub struct ChurchSelect<'r> {
    pub name: &'r str,
    pub churches: &'r [Church],
    /// Which option is pre-selected, matched against `value_of`.
    pub selected: Option<&'r str>,
    /// Members store the church as free text, secretaries by id.
    pub by_label: bool,
}

impl ChurchSelect<'_> {
    fn value_of(&self, church: &Church) -> String {
        if self.by_label {
            church.label()
        } else {
            church.id.clone()
        }
    }
}

impl Renderable for ChurchSelect<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            select class="form-select" id=(self.name) name=(self.name) required {
                option value="" selected[self.selected.is_none()] {
                    "Select your church"
                }
                @for church in self.churches {
                    @let value = self.value_of(church);
                    option
                        value=(&value)
                        selected[self.selected == Some(value.as_str())] {
                        (church.label())
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

#[cfg(test)]
mod tests {
    use diesel::{Connection, SqliteConnection};
    use diesel_migrations::MigrationHarness;

    use super::Church;
    use crate::MIGRATIONS;

    #[test]
    fn churches_are_listed_by_name() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.run_pending_migrations(MIGRATIONS).unwrap();

        Church::create("St. Thomas", "Kottayam", &mut conn).unwrap();
        let grace = Church::create(" Grace ", "Kochi", &mut conn).unwrap();

        let all = Church::fetch_all(&mut conn).unwrap();
        let names: Vec<_> = all.iter().map(|c| c.church_name.as_str()).collect();
        assert_eq!(names, vec!["Grace", "St. Thomas"]);

        let fetched = Church::fetch(&grace.id, &mut conn).unwrap().unwrap();
        assert_eq!(fetched.label(), "Grace, Kochi");
        assert!(Church::fetch("missing", &mut conn).unwrap().is_none());
    }
}
