use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex as StdMutex},
};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    connection::TransactionManager,
    r2d2::{ConnectionManager, Pool, PooledConnection},
};

use crate::{config::Settings, error::BackendError, util_resp::FailureResponse};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

type TxManager = <PooledConn as diesel::Connection>::TransactionManager;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub key: Key,
    pub settings: Arc<Settings>,
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

struct SlotState {
    conn: Arc<tokio::sync::Mutex<PooledConn>>,
    in_tx: bool,
}

/// Holds the connection checked out for the current request, so that every
/// extractor in the request shares a single connection (and transaction).
#[derive(Clone, Default)]
pub struct TxSlot {
    inner: Arc<StdMutex<Option<SlotState>>>,
}

impl TxSlot {
    fn get(&self) -> Option<Arc<tokio::sync::Mutex<PooledConn>>> {
        let slot = self.inner.lock().ok()?;
        slot.as_ref().map(|state| state.conn.clone())
    }

    fn store(&self, conn: Arc<tokio::sync::Mutex<PooledConn>>) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(SlotState { conn, in_tx: false });
        }
    }

    fn in_tx(&self) -> bool {
        self.inner
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|state| state.in_tx))
            .unwrap_or(false)
    }

    fn mark_tx(&self) {
        if let Ok(mut slot) = self.inner.lock() {
            if let Some(state) = slot.as_mut() {
                state.in_tx = true;
            }
        }
    }

    fn take(&self) -> Option<SlotState> {
        self.inner.lock().ok()?.take()
    }
}

/// This middleware commits the transaction opened during the request (if
/// there is one) after the handler has produced a response. Anything other
/// than an informational, success or redirect status rolls it back.
pub async fn tx_commit(mut req: Request, next: Next) -> Response {
    let slot = TxSlot::default();
    req.extensions_mut().insert(slot.clone());

    let res = next.run(req).await;

    let Some(state) = slot.take() else {
        return res;
    };
    if !state.in_tx {
        return res;
    }

    let status = res.status();
    let keep = status.is_success()
        || status.is_redirection()
        || status.is_informational();

    let mut conn = state.conn.lock().await;
    if keep {
        if let Err(e) = TxManager::commit_transaction(&mut *conn) {
            tracing::error!("Failed to commit request transaction: {e}");
            return FailureResponse::from(BackendError::from(e))
                .into_response();
        }
    } else if let Err(e) = TxManager::rollback_transaction(&mut *conn) {
        tracing::error!("Failed to roll back request transaction: {e}");
    }

    res
}

pub struct Conn<const TX: bool> {
    inner: tokio::sync::OwnedMutexGuard<PooledConn>,
}

impl<const TX: bool> Deref for Conn<TX> {
    type Target = PooledConn;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl<const TX: bool> DerefMut for Conn<TX> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.deref_mut()
    }
}

#[async_trait]
impl<S, const TX: bool> FromRequestParts<S> for Conn<TX>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let conn = ThreadSafeConn::<TX>::from_request_parts(parts, state).await?;
        Ok(Conn {
            inner: conn.inner.lock_owned().await,
        })
    }
}

#[derive(Clone)]
pub struct ThreadSafeConn<const TX: bool> {
    pub inner: Arc<tokio::sync::Mutex<PooledConn>>,
}

#[async_trait]
impl<S, const TX: bool> FromRequestParts<S> for ThreadSafeConn<TX>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let slot = parts.extensions.get::<TxSlot>().cloned();

        let inner = match slot.as_ref().and_then(TxSlot::get) {
            Some(conn) => conn,
            None => {
                let pool = DbPool::from_ref(state);
                let conn = tokio::task::spawn_blocking(move || pool.get())
                    .await
                    .map_err(|e| {
                        tracing::error!("Connection checkout panicked: {e}");
                        FailureResponse::ServerError(())
                    })?
                    .map_err(BackendError::from)?;
                let conn = Arc::new(tokio::sync::Mutex::new(conn));
                if let Some(slot) = &slot {
                    slot.store(conn.clone());
                }
                conn
            }
        };

        // only the commit middleware can finish a transaction
        if TX {
            if let Some(slot) = &slot {
                if !slot.in_tx() {
                    let mut conn = inner.lock().await;
                    TxManager::begin_transaction(&mut *conn)
                        .map_err(BackendError::from)?;
                    slot.mark_tx();
                }
            }
        }

        Ok(ThreadSafeConn { inner })
    }
}
