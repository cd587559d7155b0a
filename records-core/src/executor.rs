use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::connection::{ConnectionManager, Connector, Session};
use crate::credentials::IamTokenProvider;
use crate::data_api::DataApiExecutor;
use crate::error::RecordError;
use crate::postgres::PgConnector;
use crate::record::Record;

/// Runs the two record statements against whichever store access the
/// deployment was configured with.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn insert(&self, record: &Record) -> Result<(), RecordError>;

    async fn fetch(&self, id: &Uuid) -> Result<Option<Record>, RecordError>;
}

/// Direct mode: statements go over the process-wide reusable connection.
pub struct ReusableExecutor<C: Connector> {
    manager: ConnectionManager<C>,
}

impl<C: Connector> ReusableExecutor<C> {
    pub fn new(manager: ConnectionManager<C>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }
}

#[async_trait]
impl<C: Connector> Executor for ReusableExecutor<C> {
    async fn insert(&self, record: &Record) -> Result<(), RecordError> {
        let mut lease = self.manager.acquire().await?;
        let result = lease.insert(record).await;
        lease.settle(result).await
    }

    async fn fetch(&self, id: &Uuid) -> Result<Option<Record>, RecordError> {
        let mut lease = self.manager.acquire().await?;
        let result = lease.fetch(id).await;
        lease.settle(result).await
    }
}

/// Builds the executor selected by `DB_MODE`. Nothing connects yet; the
/// direct-mode handle is opened by the first statement.
pub async fn from_settings(settings: &Settings) -> Result<Arc<dyn Executor>, RecordError> {
    info!(mode = ?settings.mode(), "configuring record executor");
    match settings {
        Settings::Direct(direct) => {
            let credentials = Arc::new(IamTokenProvider::new(direct).await?);
            let connector = PgConnector::new(direct)?;
            let manager = ConnectionManager::new(connector, credentials);
            Ok(Arc::new(ReusableExecutor::new(manager)))
        }
        Settings::DataApi(data_api) => Ok(Arc::new(DataApiExecutor::new(data_api).await)),
    }
}
