//! One reusable database handle per process.
//!
//! The manager cycles between `Uninitialized`, `Connected` and `Failed`.
//! A handle is opened lazily on the first `acquire()`, kept while statements
//! succeed, and thrown away on the first failure so the next `acquire()`
//! signs a new token and reconnects.

use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::credentials::CredentialProvider;
use crate::error::RecordError;
use crate::record::Record;

/// An open, authenticated channel to the store.
#[async_trait]
pub trait Session: Send {
    async fn insert(&mut self, record: &Record) -> Result<(), RecordError>;

    async fn fetch(&mut self, id: &uuid::Uuid) -> Result<Option<Record>, RecordError>;

    /// Best-effort shutdown.
    async fn close(self) -> Result<(), RecordError>;
}

/// Opens sessions with a freshly issued password.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(&self, password: &str) -> Result<Self::Session, RecordError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Connected,
    Failed,
}

enum Slot<S> {
    Uninitialized,
    Connected(S),
    Failed,
}

impl<S> Slot<S> {
    fn state(&self) -> State {
        match self {
            Slot::Uninitialized => State::Uninitialized,
            Slot::Connected(_) => State::Connected,
            Slot::Failed => State::Failed,
        }
    }
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    credentials: Arc<dyn CredentialProvider>,
    slot: Mutex<Slot<C::Session>>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            connector,
            credentials,
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    pub async fn state(&self) -> State {
        self.slot.lock().await.state()
    }

    /// Returns the live handle, connecting first if there is none.
    ///
    /// The lease holds the manager's lock, so concurrent callers queue up
    /// behind it instead of racing to replace the handle. The handle goes
    /// back to the manager only through [`Lease::release`] or
    /// [`Lease::settle`]; a lease dropped any other way leaves the manager
    /// `Failed`.
    pub async fn acquire(&self) -> Result<Lease<'_, C::Session>, RecordError> {
        let mut slot = self.slot.lock().await;

        let session = match std::mem::replace(&mut *slot, Slot::Failed) {
            Slot::Connected(session) => session,
            Slot::Uninitialized | Slot::Failed => match self.open().await {
                Ok(session) => {
                    info!("database connection established");
                    session
                }
                Err(e) => {
                    warn!(error = %e, "database connection failed");
                    return Err(e);
                }
            },
        };

        Ok(Lease { slot, session })
    }

    async fn open(&self) -> Result<C::Session, RecordError> {
        let token = self.credentials.token().await?;
        self.connector.connect(&token).await.map_err(|e| match e {
            RecordError::Execution(msg) => RecordError::Connectivity(msg),
            other => other,
        })
    }
}

/// Exclusive access to the connected handle.
pub struct Lease<'a, S> {
    slot: MutexGuard<'a, Slot<S>>,
    session: S,
}

impl<S: Session> Lease<'_, S> {
    /// Hands the handle back for the next caller.
    pub fn release(self) {
        let Lease { mut slot, session } = self;
        *slot = Slot::Connected(session);
    }

    /// Drops the handle after a failure; the next `acquire()` reconnects.
    pub async fn invalidate(self) {
        let Lease { slot, session } = self;
        drop(slot);
        if let Err(e) = session.close().await {
            warn!(error = %e, "ignoring error while closing failed connection");
        }
    }

    /// Runs `result` through the failure rule: any connectivity or execution
    /// error discards the handle.
    pub async fn settle<T>(self, result: Result<T, RecordError>) -> Result<T, RecordError> {
        let discard = matches!(&result, Err(e) if e.invalidates_handle());
        if discard {
            self.invalidate().await;
        } else {
            self.release();
        }
        result
    }
}

impl<S> Deref for Lease<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S> DerefMut for Lease<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn manager() -> (ConnectionManager<MemoryConnector>, Arc<CountingCredentials>) {
        let credentials = Arc::new(CountingCredentials::default());
        let manager = ConnectionManager::new(MemoryConnector::default(), credentials.clone());
        (manager, credentials)
    }

    #[tokio::test]
    async fn connects_lazily_and_reuses_handle() {
        let (manager, credentials) = manager();
        assert_eq!(manager.state().await, State::Uninitialized);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 0);

        let mut lease = manager.acquire().await.unwrap();
        lease.insert(&Record::new()).await.unwrap();
        lease.release();

        let mut lease = manager.acquire().await.unwrap();
        lease.insert(&Record::new()).await.unwrap();
        lease.release();

        assert_eq!(manager.state().await, State::Connected);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn execution_failure_forces_full_reconnect() {
        let (manager, credentials) = manager();

        manager.acquire().await.unwrap().release();

        manager.connector.fail_next_statement.store(true, Ordering::SeqCst);
        let mut lease = manager.acquire().await.unwrap();
        let result = lease.insert(&Record::new()).await;
        let err = lease.settle(result).await.unwrap_err();
        assert!(matches!(err, RecordError::Execution(_)));
        assert_eq!(manager.state().await, State::Failed);
        assert_eq!(manager.connector.closed.load(Ordering::SeqCst), 1);

        manager.acquire().await.unwrap().release();

        assert_eq!(manager.state().await, State::Connected);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *manager.connector.passwords.lock().unwrap(),
            vec!["token-1".to_string(), "token-2".to_string()]
        );
    }

    #[tokio::test]
    async fn credential_failure_leaves_manager_failed() {
        let (manager, credentials) = manager();
        credentials.fail.store(true, Ordering::SeqCst);

        let err = manager.acquire().await.err().unwrap();
        assert!(matches!(err, RecordError::Connectivity(_)));
        assert_eq!(manager.state().await, State::Failed);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 1);

        credentials.fail.store(false, Ordering::SeqCst);
        manager.acquire().await.unwrap().release();
        assert_eq!(manager.state().await, State::Connected);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_login_is_a_connectivity_failure() {
        let (manager, credentials) = manager();
        manager.connector.fail_connect.store(true, Ordering::SeqCst);

        let err = manager.acquire().await.err().unwrap();
        assert!(matches!(err, RecordError::Connectivity(msg) if msg.contains("authentication")));
        assert_eq!(manager.state().await, State::Failed);

        manager.connector.fail_connect.store(false, Ordering::SeqCst);
        manager.acquire().await.unwrap().release();
        assert_eq!(manager.state().await, State::Connected);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.connector.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abandoned_lease_forces_reconnect() {
        let (manager, credentials) = manager();

        let lease = manager.acquire().await.unwrap();
        drop(lease);

        assert_eq!(manager.state().await, State::Failed);
        manager.acquire().await.unwrap().release();
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_keeps_handle() {
        let (manager, credentials) = manager();

        let mut lease = manager.acquire().await.unwrap();
        let result = lease.fetch(&uuid::Uuid::new_v4()).await;
        assert_eq!(lease.settle(result).await.unwrap(), None);

        manager.acquire().await.unwrap().release();
        assert_eq!(manager.state().await, State::Connected);
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 1);
    }
}
