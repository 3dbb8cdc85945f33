//! End-to-end tests. These drive the whole router (cookies, extractors and
//! the commit middleware included) against an in-memory database.

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestResponse, TestServer, TestServerConfig};
use diesel::prelude::*;

use crate::{
    churches::Church,
    config::{create_app, make_pool, run_migrations},
    schema::{members, participants, profiles},
    state::DbPool,
};


pub(crate) struct Portal {
    pub server: TestServer,
    pub pool: DbPool,
    pub grace: Church,
    pub bethel: Church,
}

impl Portal {
    pub fn new() -> Self {
        let pool = make_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();

        let (grace, bethel) = {
            let mut conn = pool.get().unwrap();
            (
                Church::create("Grace", "Kochi", &mut conn).unwrap(),
                Church::create("Bethel", "Thrissur", &mut conn).unwrap(),
            )
        };

        let server = TestServerConfig::builder()
            .save_cookies()
            .build_server(create_app(pool.clone()))
            .unwrap();

        Portal {
            server,
            pool,
            grace,
            bethel,
        }
    }

    pub async fn secretary_login(
        &self,
        name: &str,
        phone: &str,
        church: &Church,
    ) -> TestResponse {
        self.server
            .post("/secretary-login")
            .form(&[("name", name), ("phone", phone), ("church_id", church.id.as_str())])
            .await
    }

    pub async fn add_participant(&self, fields: &[(&str, &str)]) -> TestResponse {
        self.server.post("/secretary/participants").form(&fields).await
    }

    /// Participant codes and names, oldest first.
    pub fn participants(&self) -> Vec<(String, String)> {
        let mut conn = self.pool.get().unwrap();
        participants::table
            .order_by(participants::created_at.asc())
            .select((participants::participant_id, participants::name))
            .load(&mut conn)
            .unwrap()
    }

    pub fn participant_row_id(&self, code: &str) -> String {
        let mut conn = self.pool.get().unwrap();
        participants::table
            .filter(participants::participant_id.eq(code))
            .select(participants::id)
            .first(&mut conn)
            .unwrap()
    }

    pub fn profile_count(&self) -> i64 {
        let mut conn = self.pool.get().unwrap();
        profiles::table.count().get_result(&mut conn).unwrap()
    }

    pub fn member_count(&self) -> i64 {
        let mut conn = self.pool.get().unwrap();
        members::table.count().get_result(&mut conn).unwrap()
    }
}

pub(crate) fn assert_redirect(res: &TestResponse, to: &str) {
    assert_eq!(
        res.status_code(),
        StatusCode::SEE_OTHER,
        "expected a redirect to {to}, got: {}",
        res.text()
    );
    assert_eq!(res.header(header::LOCATION), HeaderValue::from_str(to).unwrap());
}

pub(crate) fn set_cookies(res: &TestResponse) -> Vec<String> {
    res.headers()
        .get_all(HeaderName::from_static("set-cookie"))
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}
