/// PostgreSQL record store.
///
/// One table, `water_quality_readings`, indexed on `(device_id,
/// recorded_at DESC)` so "latest" and "latest N" are index scans. Labels
/// are rewritten in place by primary key.
///
/// Hosted databases need TLS. The connector is rustls with the Mozilla
/// root set, chosen by `TlsMode`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use postgres::config::SslMode;
use postgres::{Client, NoTls, Row};
use serde::Deserialize;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::model::{Reading, StoredReading, StoreError, Tier};
use crate::store::ReadingStore;

/// Idempotent schema setup, also usable directly with `psql -f`.
const SCHEMA_SQL: &str = include_str!("../../sql/001_water_quality_readings.sql");

const SELECT_COLUMNS: &str = "id, device_id, temperature, ph, turbidity, conductivity, tds, \
                              status, raw_data, water_label, recorded_at, created_at";

impl From<postgres::Error> for StoreError {
    fn from(err: postgres::Error) -> Self {
        if err.as_db_error().is_some() {
            return StoreError::Query(err.to_string());
        }
        let io_failure = std::error::Error::source(&err)
            .map(|s| s.is::<std::io::Error>())
            .unwrap_or(false);
        if err.is_closed() || io_failure {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Query(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TLS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain TCP.
    Disable,
    /// TLS when the server offers it, plain TCP otherwise.
    Prefer,
    /// TLS or no connection.
    Require,
}

impl TlsMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disable" => Some(TlsMode::Disable),
            "prefer" => Some(TlsMode::Prefer),
            "require" => Some(TlsMode::Require),
            _ => None,
        }
    }

    /// The configured mode if any, else the URL's `sslmode`, else plain TCP.
    pub fn select(configured: Option<TlsMode>, database_url: &str) -> TlsMode {
        configured
            .or_else(|| sslmode_in_url(database_url))
            .unwrap_or(TlsMode::Disable)
    }

    fn ssl_mode(self) -> SslMode {
        match self {
            TlsMode::Disable => SslMode::Disable,
            TlsMode::Prefer => SslMode::Prefer,
            TlsMode::Require => SslMode::Require,
        }
    }
}

/// `sslmode` from either URL (`...?sslmode=require`) or key/value
/// (`host=db sslmode=require`) connection strings.
fn sslmode_in_url(database_url: &str) -> Option<TlsMode> {
    database_url
        .split(|c: char| c == '?' || c == '&' || c.is_whitespace())
        .find_map(|part| part.strip_prefix("sslmode="))
        .and_then(TlsMode::parse)
}

/// rustls connector trusting the webpki (Mozilla) roots.
pub fn rustls_connector() -> Result<MakeRustlsConnect, StoreError> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| StoreError::Unavailable(format!("tls setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PgReadingStore {
    client: Client,
}

impl PgReadingStore {
    /// Connects with the TLS mode named by the URL's `sslmode`, plain TCP
    /// when it has none.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with_tls(database_url, TlsMode::select(None, database_url))
    }

    pub fn connect_with_tls(database_url: &str, tls: TlsMode) -> Result<Self, StoreError> {
        let mut config: postgres::Config = database_url
            .parse()
            .map_err(|e| StoreError::Unavailable(format!("invalid database url: {}", e)))?;
        config.ssl_mode(tls.ssl_mode());

        let client = match tls {
            TlsMode::Disable => config.connect(NoTls),
            TlsMode::Prefer | TlsMode::Require => config.connect(rustls_connector()?),
        }
        .map_err(|e| StoreError::Unavailable(format!("connect failed: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Connects and makes sure the schema exists.
    pub fn connect_and_prepare(database_url: &str, tls: TlsMode) -> Result<Self, StoreError> {
        let mut store = Self::connect_with_tls(database_url, tls)?;
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute(SCHEMA_SQL)?;
        Ok(())
    }

    /// Direct access for test cleanup and ad hoc queries.
    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

fn row_to_stored(row: &Row) -> StoredReading {
    let status: Option<String> = row.get(7);
    let raw: Option<serde_json::Value> = row.get(8);
    StoredReading {
        id: row.get(0),
        status: status.as_deref().map(Tier::from_status).unwrap_or(Tier::Unknown),
        created_at: row.get::<_, DateTime<Utc>>(11),
        reading: Reading {
            device_id: row.get(1),
            temperature: row.get::<_, Option<f64>>(2).unwrap_or(0.0),
            ph: row.get::<_, Option<f64>>(3).unwrap_or(7.0),
            turbidity: row.get::<_, Option<f64>>(4).unwrap_or(0.0),
            conductivity: row.get::<_, Option<f64>>(5).unwrap_or(0.0),
            tds: row.get::<_, Option<f64>>(6).unwrap_or(0.0),
            label: row.get(9),
            recorded_at: row.get::<_, DateTime<Utc>>(10),
            raw_payload: raw.unwrap_or(serde_json::Value::Null),
        },
    }
}

impl ReadingStore for PgReadingStore {
    fn append(&mut self, reading: &Reading, status: Tier) -> Result<i32, StoreError> {
        let row = self.client.query_one(
            "INSERT INTO water_quality_readings
                (device_id, temperature, ph, turbidity, conductivity, tds,
                 status, raw_data, water_label, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
            &[
                &reading.device_id,
                &reading.temperature,
                &reading.ph,
                &reading.turbidity,
                &reading.conductivity,
                &reading.tds,
                &status.as_str(),
                &reading.raw_payload,
                &reading.label,
                &reading.recorded_at,
            ],
        )?;
        Ok(row.get(0))
    }

    fn latest(&mut self, device_id: &str) -> Result<Option<StoredReading>, StoreError> {
        let query = format!(
            "SELECT {} FROM water_quality_readings
             WHERE device_id = $1
             ORDER BY recorded_at DESC, id DESC
             LIMIT 1",
            SELECT_COLUMNS
        );
        let row = self.client.query_opt(query.as_str(), &[&device_id])?;
        Ok(row.as_ref().map(row_to_stored))
    }

    fn latest_n(&mut self, device_id: &str, n: usize) -> Result<Vec<StoredReading>, StoreError> {
        let query = format!(
            "SELECT {} FROM water_quality_readings
             WHERE device_id = $1
             ORDER BY recorded_at DESC, id DESC
             LIMIT $2",
            SELECT_COLUMNS
        );
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows = self.client.query(query.as_str(), &[&device_id, &limit])?;
        Ok(rows.iter().map(row_to_stored).collect())
    }

    fn update_label(&mut self, id: i32, label: &str) -> Result<StoredReading, StoreError> {
        let query = format!(
            "UPDATE water_quality_readings
             SET water_label = $1, updated_at = now()
             WHERE id = $2
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = self.client.query_opt(query.as_str(), &[&label, &id])?;
        row.as_ref()
            .map(row_to_stored)
            .ok_or(StoreError::RecordNotFound(id))
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        self.client.simple_query("SELECT 1")?;
        Ok(())
    }
}
