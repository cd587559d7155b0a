use async_trait::async_trait;
use chrono::NaiveDateTime;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::DirectSettings;
use crate::connection::{Connector, Session};
use crate::error::RecordError;
use crate::record::Record;

const INSERT_SQL: &str = "INSERT INTO records (id, created_at) VALUES ($1, $2)";
const SELECT_SQL: &str = "SELECT id, created_at FROM records WHERE id = $1 LIMIT 1";

/// Where certificate verification looks for trust anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchors {
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

impl TrustAnchors {
    /// The configured CA bundle, or whatever the host's trust store offers.
    ///
    /// The vendored OpenSSL only knows its own build prefix, so the system
    /// locations are looked up explicitly.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, RecordError> {
        if let Some(file) = explicit {
            return Ok(Self {
                file: Some(file.to_path_buf()),
                dir: None,
            });
        }

        let found = openssl_probe::probe();
        if found.cert_file.is_none() && found.cert_dir.is_none() {
            return Err(RecordError::Config(
                "no CA certificates found on this host; set DB_SSL_ROOT_CERT".to_string(),
            ));
        }
        Ok(Self {
            file: found.cert_file,
            dir: found.cert_dir,
        })
    }
}

fn tls_connector(anchors: &TrustAnchors) -> Result<SslConnector, RecordError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| RecordError::Config(format!("TLS setup failed: {e}")))?;
    builder.set_verify(SslVerifyMode::PEER);
    builder
        .load_verify_locations(anchors.file.as_deref(), anchors.dir.as_deref())
        .map_err(|e| {
            RecordError::Config(format!("cannot load CA certificates {anchors:?}: {e}"))
        })?;
    Ok(builder.build())
}

/// Opens TLS connections to PostgreSQL with certificate verification on.
pub struct PgConnector {
    config: tokio_postgres::Config,
    tls: MakeTlsConnector,
}

impl PgConnector {
    pub fn new(settings: &DirectSettings) -> Result<Self, RecordError> {
        let anchors = TrustAnchors::resolve(settings.ssl_root_cert.as_deref())?;
        debug!(?anchors, "loading trust anchors");
        let tls = MakeTlsConnector::new(tls_connector(&anchors)?);

        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .dbname(&settings.database)
            .ssl_mode(SslMode::Require);

        Ok(Self { config, tls })
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, password: &str) -> Result<PgSession, RecordError> {
        let mut config = self.config.clone();
        config.password(password);

        let (client, connection) = config
            .connect(self.tls.clone())
            .await
            .map_err(|e| RecordError::Connectivity(e.to_string()))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "connection error");
            }
        });

        Ok(PgSession { client, driver })
    }
}

/// A connected client plus the task driving its socket. Statements run in
/// autocommit mode.
pub struct PgSession {
    client: tokio_postgres::Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl Session for PgSession {
    async fn insert(&mut self, record: &Record) -> Result<(), RecordError> {
        self.client
            .execute(INSERT_SQL, &[&record.id, &record.created_at])
            .await?;
        Ok(())
    }

    async fn fetch(&mut self, id: &Uuid) -> Result<Option<Record>, RecordError> {
        let rows = self.client.query(SELECT_SQL, &[id]).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let id: Uuid = row.try_get(0)?;
        let created_at: NaiveDateTime = row.try_get(1)?;
        Ok(Some(Record { id, created_at }))
    }

    async fn close(self) -> Result<(), RecordError> {
        drop(self.client);
        self.driver.abort();
        Ok(())
    }
}
