use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_rdsdata::error::{DisplayErrorContext, SdkError};
use aws_sdk_rdsdata::types::{Field, SqlParameter, TypeHint};
use aws_sdk_rdsdata::Client;
use tracing::debug;
use uuid::Uuid;

use crate::config::DataApiSettings;
use crate::error::RecordError;
use crate::executor::Executor;
use crate::record::{parse_id, parse_timestamp, Record};

const INSERT_SQL: &str = "INSERT INTO records (id, created_at) VALUES (:id, :created_at)";
const SELECT_SQL: &str = "SELECT id, created_at FROM records WHERE id = :id LIMIT 1";

/// Stateless mode: every statement is a separate RDS Data API call,
/// authorised by the function role and the cluster secret.
pub struct DataApiExecutor {
    client: Client,
    settings: DataApiSettings,
}

impl DataApiExecutor {
    pub async fn new(settings: &DataApiSettings) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::with_client(Client::new(&sdk_config), settings.clone())
    }

    pub fn with_client(client: Client, settings: DataApiSettings) -> Self {
        Self { client, settings }
    }

    async fn execute(
        &self,
        sql: &str,
        parameters: Vec<SqlParameter>,
    ) -> Result<Vec<Vec<Field>>, RecordError> {
        let output = self
            .client
            .execute_statement()
            .resource_arn(&self.settings.cluster_arn)
            .secret_arn(&self.settings.secret_arn)
            .database(&self.settings.database)
            .sql(sql)
            .set_parameters(Some(parameters))
            .send()
            .await
            .map_err(map_sdk_error)?;

        debug!(rows = output.records().len(), "data api statement executed");
        Ok(output.records().to_vec())
    }
}

/// A rejected statement is an execution failure; anything that never got a
/// service answer (timeouts, dispatch, construction) is connectivity.
fn map_sdk_error<E, R>(err: SdkError<E, R>) -> RecordError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ServiceError(_) => RecordError::Execution(detail),
        _ => RecordError::Connectivity(detail),
    }
}

fn param(name: &str, value: String, hint: TypeHint) -> SqlParameter {
    SqlParameter::builder()
        .name(name)
        .value(Field::StringValue(value))
        .type_hint(hint)
        .build()
}

fn string_field<'a>(row: &'a [Field], index: usize) -> Result<&'a str, RecordError> {
    row.get(index)
        .and_then(|field| field.as_string_value().ok())
        .map(String::as_str)
        .ok_or_else(|| RecordError::Execution(format!("column {index} is not a string")))
}

/// Maps the positional `(id, created_at)` columns of a result row.
pub fn record_from_row(row: &[Field]) -> Result<Record, RecordError> {
    Ok(Record {
        id: parse_id(string_field(row, 0)?)?,
        created_at: parse_timestamp(string_field(row, 1)?)?,
    })
}

#[async_trait]
impl Executor for DataApiExecutor {
    async fn insert(&self, record: &Record) -> Result<(), RecordError> {
        let parameters = vec![
            param("id", record.id_string(), TypeHint::Uuid),
            param(
                "created_at",
                record.created_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                TypeHint::Timestamp,
            ),
        ];
        self.execute(INSERT_SQL, parameters).await?;
        Ok(())
    }

    async fn fetch(&self, id: &Uuid) -> Result<Option<Record>, RecordError> {
        let rows = self
            .execute(
                SELECT_SQL,
                vec![param("id", id.hyphenated().to_string(), TypeHint::Uuid)],
            )
            .await?;

        rows.first().map(|row| record_from_row(row)).transpose()
    }
}
