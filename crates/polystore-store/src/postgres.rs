//! PostgreSQL storage backend
//!
//! Uses native UUID and `TEXT[]` columns, `$n` placeholders and
//! `RETURNING *`. Identifier lookups that are not valid UUIDs fall back to
//! a string-typed `id::text` comparison instead of failing the cast.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, warn};
use uuid::Uuid;

use polystore_types::record::ID_FIELD;
use polystore_types::{Backend, Filter, Page, Record, StoreError, StoreResult, Value};

use crate::factory::ConnectionSettings;
use crate::retry::retry_with_backoff;
use crate::translate::{check_identifier, to_native_patch, translator_for};
use crate::{Result, StorageAdapter};

/// PostgreSQL adapter over a single tokio-postgres client
pub struct PostgresAdapter {
    settings: ConnectionSettings,
    client: Mutex<Option<Client>>,
}

/// Owned parameter wrapper so heterogeneous record values can share one
/// `&[&(dyn ToSql + Sync)]` slice
#[derive(Debug)]
enum PgParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    Json(serde_json::Value),
}

impl ToSql for PgParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgParam::Null => Ok(IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::Int(v) => v.to_sql(ty, out),
            PgParam::Float(v) => v.to_sql(ty, out),
            PgParam::Text(v) => v.to_sql(ty, out),
            PgParam::Uuid(v) => v.to_sql(ty, out),
            PgParam::Timestamp(v) => v.to_sql(ty, out),
            PgParam::TextArray(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn pg_err(err: tokio_postgres::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_identifier_field(field: &str) -> bool {
    field == ID_FIELD || field.ends_with("_id")
}

/// Convert a record value into a bindable parameter. Identifier fields
/// holding valid UUIDs bind natively; everything else binds by its own type.
fn pg_param(field: &str, value: &Value) -> PgParam {
    match value {
        Value::Null => PgParam::Null,
        Value::Bool(b) => PgParam::Bool(*b),
        Value::Int(i) => PgParam::Int(*i),
        Value::Float(f) => PgParam::Float(*f),
        Value::Timestamp(ts) => PgParam::Timestamp(*ts),
        Value::String(s) => {
            if is_identifier_field(field) {
                if let Ok(parsed) = Uuid::parse_str(s) {
                    return PgParam::Uuid(parsed);
                }
            }
            PgParam::Text(s.clone())
        }
        Value::StringArray(items) => PgParam::TextArray(items.clone()),
        Value::Map(map) => {
            PgParam::Json(serde_json::to_value(map).unwrap_or(serde_json::Value::Null))
        }
    }
}

/// The WHERE clause and parameter for a single-key lookup, applying the
/// string-cast fallback when an identifier key is not a valid UUID
fn key_clause(key: &str, key_field: &str, position: usize) -> (String, PgParam) {
    if is_identifier_field(key_field) {
        match Uuid::parse_str(key) {
            Ok(parsed) => (
                format!("{} = ${}", key_field, position),
                PgParam::Uuid(parsed),
            ),
            Err(_) => {
                warn!(key, key_field, "key is not a UUID, comparing as text");
                (
                    format!("{}::text = ${}", key_field, position),
                    PgParam::Text(key.to_string()),
                )
            }
        }
    } else {
        (
            format!("{} = ${}", key_field, position),
            PgParam::Text(key.to_string()),
        )
    }
}

fn row_to_record(row: &Row) -> StoreResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::UUID {
            row.try_get::<_, Option<Uuid>>(idx)
                .map_err(pg_err)?
                .map(|u| Value::String(u.to_string()))
        } else if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)
                .map_err(pg_err)?
                .map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)
                .map_err(pg_err)?
                .map(|i| Value::Int(i64::from(i)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map_err(pg_err)?
                .map(|i| Value::Int(i64::from(i)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)
                .map_err(pg_err)?
                .map(Value::Int)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)
                .map_err(pg_err)?
                .map(|f| Value::Float(f64::from(f)))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)
                .map_err(pg_err)?
                .map(Value::Float)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(idx)
                .map_err(pg_err)?
                .map(Value::Timestamp)
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(idx)
                .map_err(pg_err)?
                .map(|naive| Value::Timestamp(naive.and_utc()))
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            row.try_get::<_, Option<Vec<String>>>(idx)
                .map_err(pg_err)?
                .map(Value::StringArray)
        } else {
            row.try_get::<_, Option<String>>(idx)
                .map_err(pg_err)?
                .map(Value::String)
        };
        record.set(column.name(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

impl PostgresAdapter {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    fn connection_string(&self) -> String {
        self.settings.connection_string.clone().unwrap_or_else(|| {
            format!(
                "host={} port={} user={} password={} dbname={}",
                self.settings.host,
                self.settings.port,
                self.settings.username,
                self.settings.password,
                self.settings.database
            )
        })
    }
}

#[async_trait]
impl StorageAdapter for PostgresAdapter {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn connect(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let conn_str = self.connection_string();
        let client = retry_with_backoff(self.settings.retry, "postgres connect", || {
            let conn_str = conn_str.clone();
            async move {
                let (client, connection) = tokio_postgres::connect(&conn_str, NoTls)
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        error!(error = %err, "postgres connection task ended");
                    }
                });
                Ok(client)
            }
        })
        .await?;

        debug!(host = %self.settings.host, "postgres connected");
        *guard = Some(client);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // Dropping the client ends the spawned connection task
        self.client.lock().await.take();
        Ok(())
    }

    async fn create(&self, collection: &str, record: &Record) -> Result<Record> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::Postgres)?;
        let native = translator.to_native(record)?;

        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut params = Vec::new();
        for (idx, (field, value)) in native.fields().enumerate() {
            check_identifier(field)?;
            columns.push(field.to_string());
            placeholders.push(format!("${}", idx + 1));
            params.push(pg_param(field, value));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            collection,
            columns.join(", "),
            placeholders.join(", ")
        );

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let row = client.query_one(sql.as_str(), &refs).await.map_err(pg_err)?;

        translator.from_native(&row_to_record(&row)?)
    }

    async fn read(&self, collection: &str, key: &str, key_field: &str) -> Result<Option<Record>> {
        check_identifier(collection)?;
        check_identifier(key_field)?;
        let translator = translator_for(collection, Backend::Postgres)?;

        let (clause, param) = key_clause(key, key_field, 1);
        let sql = format!("SELECT * FROM {} WHERE {} LIMIT 1", collection, clause);

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let rows = client
            .query(sql.as_str(), &[&param as &(dyn ToSql + Sync)])
            .await
            .map_err(pg_err)?;

        match rows.first() {
            Some(row) => Ok(Some(translator.from_native(&row_to_record(row)?)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<Option<Record>> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::Postgres)?;
        let native = to_native_patch(translator.as_ref(), patch)?;
        if native.is_empty() {
            return self.read_by_id(collection, id).await;
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (idx, (field, value)) in native.fields().enumerate() {
            check_identifier(field)?;
            assignments.push(format!("{} = ${}", field, idx + 1));
            params.push(pg_param(field, value));
        }

        let (clause, key_param) = key_clause(id, ID_FIELD, params.len() + 1);
        params.push(key_param);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURNING *",
            collection,
            assignments.join(", "),
            clause
        );

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = client.query(sql.as_str(), &refs).await.map_err(pg_err)?;

        match rows.first() {
            Some(row) => Ok(Some(translator.from_native(&row_to_record(row)?)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        check_identifier(collection)?;
        let (clause, param) = key_clause(id, ID_FIELD, 1);
        let sql = format!("DELETE FROM {} WHERE {}", collection, clause);

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let affected = client
            .execute(sql.as_str(), &[&param as &(dyn ToSql + Sync)])
            .await
            .map_err(pg_err)?;
        Ok(affected > 0)
    }

    async fn list(&self, collection: &str, page: Page, filter: &Filter) -> Result<Vec<Record>> {
        check_identifier(collection)?;
        let translator = translator_for(collection, Backend::Postgres)?;

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for (key, value) in filter.conditions() {
            let field = Filter::target_field(key);
            check_identifier(field)?;
            if Filter::is_containment(key) {
                clauses.push(format!("{} @> ${}", field, params.len() + 1));
                let tag = value.as_str().unwrap_or_default().to_string();
                params.push(PgParam::TextArray(vec![tag]));
            } else {
                clauses.push(format!("{} = ${}", field, params.len() + 1));
                params.push(pg_param(field, value));
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY created_at, id LIMIT ${} OFFSET ${}",
            collection,
            where_clause,
            params.len() + 1,
            params.len() + 2
        );
        params.push(PgParam::Int(i64::from(page.limit())));
        params.push(PgParam::Int(page.skip() as i64));

        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = client.query(sql.as_str(), &refs).await.map_err(pg_err)?;

        rows.iter()
            .map(|row| translator.from_native(&row_to_record(row)?))
            .collect()
    }

    async fn ensure_collection(&self, model: &str, statement: &str) -> Result<()> {
        check_identifier(model)?;
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| StoreError::Connection("not connected".into()))?;
        client.batch_execute(statement).await.map_err(pg_err)?;
        debug!(model, "postgres collection ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_clause_native_uuid() {
        let id = Uuid::new_v4().to_string();
        let (clause, param) = key_clause(&id, "id", 1);
        assert_eq!(clause, "id = $1");
        assert!(matches!(param, PgParam::Uuid(_)));
    }

    #[test]
    fn test_key_clause_falls_back_to_text() {
        let (clause, param) = key_clause("not-a-uuid", "id", 2);
        assert_eq!(clause, "id::text = $2");
        assert!(matches!(param, PgParam::Text(_)));
    }

    #[test]
    fn test_key_clause_plain_field() {
        let (clause, param) = key_clause("alice", "username", 1);
        assert_eq!(clause, "username = $1");
        assert!(matches!(param, PgParam::Text(_)));
    }

    #[test]
    fn test_pg_param_binds_arrays_natively() {
        let value = Value::from(vec!["a", "b"]);
        assert!(matches!(pg_param("tags", &value), PgParam::TextArray(_)));
    }

    #[test]
    fn test_pg_param_widens_uuid_identifiers() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            pg_param("user_id", &Value::from(id.as_str())),
            PgParam::Uuid(_)
        ));
        assert!(matches!(
            pg_param("title", &Value::from(id.as_str())),
            PgParam::Text(_)
        ));
    }
}
