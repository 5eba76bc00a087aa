//! SQL Server connection over TDS.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, ColumnData, EncryptionLevel, FromSql, SqlBrowser};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::schema::{self, COLUMNS_QUERY, FOREIGN_KEYS_QUERY, TABLES_QUERY};
use super::{DbError, QueryOutput, QueryRunner};
use crate::config::DatabaseConfig;

type TdsClient = Client<Compat<TcpStream>>;

/// Rows fetched per statement before the rest is dropped.
const FETCH_LIMIT: usize = 10_000;

const APPLICATION_NAME: &str = "sqlchat";

impl From<tiberius::error::Error> for DbError {
    fn from(e: tiberius::error::Error) -> Self {
        DbError::Query(e.to_string())
    }
}

/// A single SQL Server connection.
pub struct SqlServer {
    client: Mutex<TdsClient>,
    database: String,
    sample_rows: usize,
}

impl SqlServer {
    /// Connect using the given settings.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let tds = tds_config(config)?;
        info!(
            "Connecting to {}",
            config
                .redacted_connection_string()
                .map_err(|e| DbError::Config(e.to_string()))?
        );

        let client = match open(tds.clone()).await {
            Ok(client) => client,
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!("Server redirected connection to {}:{}", host, port);
                let mut routed = tds;
                routed.host(host);
                routed.port(port);
                open(routed).await.map_err(connection_error)?
            }
            Err(e) => return Err(connection_error(e)),
        };

        Ok(Self {
            client: Mutex::new(client),
            database: config.database_name().unwrap_or_default().to_string(),
            sample_rows: config.sample_rows,
        })
    }

    /// Name of the connected database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Schema text for prompts: table definitions, sample rows and foreign keys.
    pub async fn schema_info(&self) -> Result<String, DbError> {
        let columns = self.fetch(COLUMNS_QUERY, FETCH_LIMIT).await?;
        let tables = schema::tables_from_columns(&columns);
        info!("Loaded schema for {} tables", tables.len());

        let mut samples = Vec::with_capacity(tables.len());
        for table in &tables {
            let sample = if self.sample_rows == 0 {
                None
            } else {
                match self
                    .fetch(&table.sample_query(self.sample_rows), self.sample_rows)
                    .await
                {
                    Ok(rows) => Some(rows),
                    Err(e) => {
                        debug!("Skipping sample rows for {}: {}", table.display_name(), e);
                        None
                    }
                }
            };
            samples.push(sample);
        }

        let foreign_keys = match self.fetch(FOREIGN_KEYS_QUERY, FETCH_LIMIT).await {
            Ok(rows) => schema::foreign_keys_from(&rows),
            Err(e) => {
                debug!("Foreign key lookup failed: {}", e);
                Vec::new()
            }
        };

        Ok(schema::render_schema(&tables, &samples, &foreign_keys))
    }

    /// Run a statement, keeping at most `limit` rows of the first result set.
    async fn fetch(&self, sql: &str, limit: usize) -> Result<QueryOutput, DbError> {
        let mut client = self.client.lock().await;
        let mut stream = client.simple_query(sql).await?;

        let columns = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut output = QueryOutput::new(columns, Vec::new());
        let mut rows = stream.into_row_stream();
        while let Some(row) = rows.try_next().await? {
            if output.rows.len() >= limit {
                output.truncated = true;
                break;
            }
            output
                .rows
                .push(row.into_iter().map(|data| cell_to_string(&data)).collect());
        }

        debug!("Fetched {} rows", output.row_count());
        Ok(output)
    }
}

#[async_trait]
impl QueryRunner for SqlServer {
    async fn run(&self, sql: &str) -> Result<QueryOutput, DbError> {
        debug!("Executing: {}", sql);
        self.fetch(sql, FETCH_LIMIT).await
    }

    async fn table_names(&self) -> Result<Vec<String>, DbError> {
        let output = self.fetch(TABLES_QUERY, FETCH_LIMIT).await?;
        Ok(schema::table_names_from(&output))
    }
}

async fn open(tds: tiberius::Config) -> Result<TdsClient, tiberius::error::Error> {
    let tcp = TcpStream::connect_named(&tds).await?;
    tcp.set_nodelay(true)?;
    Client::connect(tds, tcp.compat_write()).await
}

fn connection_error(e: tiberius::error::Error) -> DbError {
    DbError::Connection(e.to_string())
}

/// Build the driver configuration from connection settings.
fn tds_config(config: &DatabaseConfig) -> Result<tiberius::Config, DbError> {
    let database = config
        .database_name()
        .ok_or_else(|| DbError::Config("SQL_DATABASE must be set".to_string()))?;
    let address = config
        .server_address()
        .map_err(|e| DbError::Config(e.to_string()))?;

    let mut tds = tiberius::Config::new();
    tds.host(&address.host);
    if let Some(port) = address.port {
        tds.port(port);
    }
    if let Some(ref instance) = address.instance {
        tds.instance_name(instance);
    }
    tds.database(database);
    tds.application_name(APPLICATION_NAME);

    match config.credentials() {
        Some((user, pass)) => tds.authentication(AuthMethod::sql_server(user, pass)),
        None => tds.authentication(integrated_auth()?),
    }

    if config.trust_server_certificate {
        tds.trust_cert();
    }
    tds.encryption(if config.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });

    Ok(tds)
}

#[cfg(windows)]
fn integrated_auth() -> Result<AuthMethod, DbError> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthMethod, DbError> {
    Err(DbError::Config(
        "integrated authentication is only available on Windows; set SQL_USERNAME and SQL_PASSWORD"
            .to_string(),
    ))
}

/// Render one cell as text; `None` is NULL.
fn cell_to_string(data: &ColumnData<'static>) -> Option<String> {
    #[allow(unreachable_patterns)]
    match data {
        ColumnData::U8(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::I16(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::I32(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::I64(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::F32(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::F64(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::Bit(v) => v.as_ref().map(|v| v.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.as_ref().map(|g| g.to_string()),
        ColumnData::Numeric(v) => v.as_ref().map(|n| n.to_string()),
        ColumnData::Xml(v) => v.as_ref().map(|x| x.clone().into_owned().into_string()),
        ColumnData::Binary(v) => v.as_ref().map(|bytes| {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("0x{}", hex)
        }),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .ok()
                .flatten()
                .map(|d| d.to_string())
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .ok()
            .flatten()
            .map(|d| d.to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .ok()
            .flatten()
            .map(|t| t.to_string()),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .ok()
            .flatten()
            .map(|d| d.to_string()),
        other => Some(format!("{:?}", other)),
    }
}
