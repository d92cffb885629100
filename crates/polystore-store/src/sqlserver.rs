//! SQL Server storage backend
//!
//! Identifiers are NVARCHAR string GUIDs, array fields are JSON text, and
//! pagination uses `OFFSET ... FETCH NEXT`. There is no `RETURNING`
//! clause, so writes are followed by a read of the affected row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tiberius::{AuthMethod, ColumnData, ColumnType, Config, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use polystore_types::record::ID_FIELD;
use polystore_types::{Backend, Filter, Page, Record, StoreError, StoreResult, Value};

use crate::factory::ConnectionSettings;
use crate::retry::retry_with_backoff;
use crate::translate::{check_identifier, to_native_patch, translator_for};
use crate::{Result, StorageAdapter};

type MssqlClient = tiberius::Client<Compat<TcpStream>>;

/// SQL Server adapter over a single tiberius client
pub struct SqlServerAdapter {
    settings: ConnectionSettings,
    client: Mutex<Option<MssqlClient>>,
}

/// Owned parameter wrapper for heterogeneous record values
#[derive(Debug)]
enum MsParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl ToSql for MsParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            MsParam::Null => ColumnData::String(None),
            MsParam::Bool(v) => v.to_sql(),
            MsParam::Int(v) => v.to_sql(),
            MsParam::Float(v) => v.to_sql(),
            MsParam::Text(v) => v.to_sql(),
            MsParam::Timestamp(v) => v.to_sql(),
        }
    }
}

fn ms_err(err: tiberius::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Convert a record value into a bindable parameter. Arrays and maps are
/// JSON-encoded; translation normally does this before values reach here.
fn ms_param(value: &Value) -> StoreResult<MsParam> {
    Ok(match value {
        Value::Null => MsParam::Null,
        Value::Bool(b) => MsParam::Bool(*b),
        Value::Int(i) => MsParam::Int(*i),
        Value::Float(f) => MsParam::Float(*f),
        Value::Timestamp(ts) => MsParam::Timestamp(*ts),
        Value::String(s) => MsParam::Text(s.clone()),
        Value::StringArray(items) => MsParam::Text(serde_json::to_string(items)?),
        Value::Map(map) => MsParam::Text(serde_json::to_string(map)?),
    })
}

fn row_to_record(row: &tiberius::Row) -> StoreResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = match column.column_type() {
            ColumnType::Bit | ColumnType::Bitn => row
                .try_get::<bool, _>(idx)
                .map_err(ms_err)?
                .map(Value::Bool),
            ColumnType::Int1 => row
                .try_get::<u8, _>(idx)
                .map_err(ms_err)?
                .map(|i| Value::Int(i64::from(i))),
            ColumnType::Int2 => row
                .try_get::<i16, _>(idx)
                .map_err(ms_err)?
                .map(|i| Value::Int(i64::from(i))),
            ColumnType::Int4 => row
                .try_get::<i32, _>(idx)
                .map_err(ms_err)?
                .map(|i| Value::Int(i64::from(i))),
            ColumnType::Int8 | ColumnType::Intn => row
                .try_get::<i64, _>(idx)
                .map_err(ms_err)?
                .map(Value::Int),
            ColumnType::Float4 => row
                .try_get::<f32, _>(idx)
                .map_err(ms_err)?
                .map(|f| Value::Float(f64::from(f))),
            ColumnType::Float8 | ColumnType::Floatn => row
                .try_get::<f64, _>(idx)
                .map_err(ms_err)?
                .map(Value::Float),
            ColumnType::Datetime
            | ColumnType::Datetime4
            | ColumnType::Datetimen
            | ColumnType::Datetime2 => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .map_err(ms_err)?
                .map(|naive| Value::Timestamp(naive.and_utc())),
            ColumnType::Guid => row
                .try_get::<uuid::Uuid, _>(idx)
                .map_err(ms_err)?
                .map(|u| Value::String(u.to_string())),
            _ => row
                .try_get::<&str, _>(idx)
                .map_err(ms_err)?
                .map(|s| Value::String(s.to_string())),
        };
        record.set(name, value.unwrap_or(Value::Null));
    }
    Ok(record)
}

impl SqlServerAdapter {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    fn config(&self) -> StoreResult<Config> {
        if let Some(ado) = self.settings.connection_string.as_deref() {
            return Config::from_ado_string(ado).map_err(|e| StoreError::Configuration(e.to_string()));
        }
        let mut config = Config::new();
        config.host(&self.settings.host);
        config.port(self.settings.port);
        config.database(&self.settings.database);
        config.authentication(AuthMethod::sql_server(
            &self.settings.username,
            &self.settings.password,
        ));
        config.trust_cert();
        Ok(config)
    }

    /// Single-key SELECT with the string-cast fallback: when the typed
    /// comparison fails server-side, retry once comparing through TRY_CAST.
    async fn select_one(
        &self,
        client: &mut MssqlClient,
        collection: &str,
        key: &str,
        key_field: &str,
    ) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT TOP 1 * FROM {} WHERE {} = @P1",
            collection, key_field
        );
        let param = MsParam::Text(key.to_string());

        // The typed attempt must be fully consumed before the fallback query
        // can re-borrow the client.
        let typed = match client.query(sql.as_str(), &[&param as &dyn ToSql]).await {
            Ok(stream) => Some(stream.into_first_result().await.map_err(ms_err)?),
            Err(err) => {
                warn!(key, key_field, error = %err, "typed comparison failed, retrying as text");
                None
            }
        };
        let rows = match typed {
            Some(rows) => rows,
            None => {
                let fallback = format!(
                    "SELECT TOP 1 * FROM {} WHERE TRY_CAST({} AS NVARCHAR(255)) = @P1",
                    collection, key_field
                );
                client
                    .query(fallback.as_str(), &[&param as &dyn ToSql])
                    .await
                    .map_err(ms_err)?
                    .into_first_result()
                    .await
                    .map_err(ms_err)?
            }
        };

        match rows.first() {
            Some(row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageAdapter for SqlServerAdapter {
    fn backend(&self) -> Backend {
        Backend::SqlServer
    }

    async fn connect(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let config = self.config()?;
        let client = retry_with_backoff(self.settings.retry, "sqlserver connect", || {
            let config = config.clone();
            async move {
                let tcp = TcpStream::connect(config.get_addr())
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                tcp.set_nodelay(true)
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                tiberius::Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))
            }
        })
        .await?;

        debug!(host = %self.settings.host, "sqlserver connected");
        *guard = Some(client);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(client) = self.client.lock().await.take() {
            client.close().await.map_err(ms_err)?;
        }
        Ok(())
    }

    async fn create(&self, collection: &str, record: &Record) -> Result<Record> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::SqlServer)?;
        let native = translator.to_native(record)?;
        let id = native
            .id()
            .ok_or_else(|| StoreError::Translation("insert produced no identifier".into()))?;

        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut params = Vec::new();
        for (idx, (field, value)) in native.fields().enumerate() {
            check_identifier(field)?;
            columns.push(field.to_string());
            placeholders.push(format!("@P{}", idx + 1));
            params.push(ms_param(value)?);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection,
            columns.join(", "),
            placeholders.join(", ")
        );

        {
            let mut guard = self.client.lock().await;
            let client = guard
                .as_mut()
                .ok_or_else(|| StoreError::Connection("not connected".into()))?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            client.execute(sql.as_str(), &refs).await.map_err(ms_err)?;
        }

        self.read_by_id(collection, &id).await?.ok_or_else(|| {
            StoreError::Backend(format!("inserted row {} not found on readback", id))
        })
    }

    async fn read(&self, collection: &str, key: &str, key_field: &str) -> Result<Option<Record>> {
        check_identifier(collection)?;
        check_identifier(key_field)?;
        let translator = translator_for(collection, Backend::SqlServer)?;

        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;

        match self.select_one(client, collection, key, key_field).await? {
            Some(native) => Ok(Some(translator.from_native(&native)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<Option<Record>> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::SqlServer)?;
        let native = to_native_patch(translator.as_ref(), patch)?;
        if native.is_empty() {
            return self.read_by_id(collection, id).await;
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (idx, (field, value)) in native.fields().enumerate() {
            check_identifier(field)?;
            assignments.push(format!("{} = @P{}", field, idx + 1));
            params.push(ms_param(value)?);
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = @P{}",
            collection,
            assignments.join(", "),
            ID_FIELD,
            params.len() + 1
        );
        params.push(MsParam::Text(id.to_string()));

        let affected = {
            let mut guard = self.client.lock().await;
            let client = guard
                .as_mut()
                .ok_or_else(|| StoreError::Connection("not connected".into()))?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            client
                .execute(sql.as_str(), &refs)
                .await
                .map_err(ms_err)?
                .total()
        };

        if affected == 0 {
            return Ok(None);
        }
        self.read_by_id(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        check_identifier(collection)?;
        let sql = format!("DELETE FROM {} WHERE {} = @P1", collection, ID_FIELD);
        let param = MsParam::Text(id.to_string());

        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let affected = client
            .execute(sql.as_str(), &[&param as &dyn ToSql])
            .await
            .map_err(ms_err)?
            .total();
        Ok(affected > 0)
    }

    async fn list(&self, collection: &str, page: Page, filter: &Filter) -> Result<Vec<Record>> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::SqlServer)?;

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for (key, value) in filter.conditions() {
            let field = Filter::target_field(key);
            check_identifier(field)?;
            if Filter::is_containment(key) {
                // JSON-encoded array column: match the quoted element
                clauses.push(format!("{} LIKE @P{}", field, params.len() + 1));
                let tag = value.as_str().unwrap_or_default();
                params.push(MsParam::Text(format!("%\"{}\"%", tag)));
            } else {
                clauses.push(format!("{} = @P{}", field, params.len() + 1));
                params.push(ms_param(value)?);
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY created_at, id OFFSET @P{} ROWS FETCH NEXT @P{} ROWS ONLY",
            collection,
            where_clause,
            params.len() + 1,
            params.len() + 2
        );
        params.push(MsParam::Int(page.skip() as i64));
        params.push(MsParam::Int(i64::from(page.limit())));

        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let rows = client
            .query(sql.as_str(), &refs)
            .await
            .map_err(ms_err)?
            .into_first_result()
            .await
            .map_err(ms_err)?;

        rows.iter()
            .map(|row| translator.from_native(&row_to_record(row)?))
            .collect()
    }

    async fn ensure_collection(&self, model: &str, statement: &str) -> Result<()> {
        check_identifier(model)?;
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        client.execute(statement, &[]).await.map_err(ms_err)?;
        debug!(model, "sqlserver collection ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_param_json_encodes_arrays() {
        let param = ms_param(&Value::from(vec!["a", "b"])).unwrap();
        match param {
            MsParam::Text(json) => assert_eq!(json, r#"["a","b"]"#),
            other => panic!("expected text param, got {:?}", other),
        }
    }

    #[test]
    fn test_ms_param_scalars() {
        assert!(matches!(ms_param(&Value::Bool(true)).unwrap(), MsParam::Bool(true)));
        assert!(matches!(ms_param(&Value::Int(3)).unwrap(), MsParam::Int(3)));
        assert!(matches!(ms_param(&Value::Null).unwrap(), MsParam::Null));
    }
}
