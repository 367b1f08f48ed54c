//! # Postgres
//!
//! Relational store for submissions.
//!
//! Core purpose is to durably keep one row per submission and one row per answer, written together or not at all.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE submissions (
//!     id           UUID PRIMARY KEY,
//!     user_id      TEXT NOT NULL,
//!     repeat_count INTEGER NOT NULL CHECK (repeat_count >= 1),
//!     created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//!
//! CREATE TABLE submission_answers (
//!     submission_id UUID NOT NULL REFERENCES submissions (id),
//!     question_id   TEXT NOT NULL,
//!     value         DOUBLE PRECISION NOT NULL
//! );
//! ```
//!
//! ## Connections
//!
//! - No pool: the password arrives with each request, so every request opens its own connection
//! - Connect, use, release: the [`Session`] is closed on every exit path and dropping it also tears the connection down
//! - One transaction per session, `BEGIN` / `COMMIT` / `ROLLBACK` issued explicitly
//! - Default isolation level of the server
//! - `DB_SSLMODE=require` wraps the connection in rustls, trusting the webpki roots
use std::sync::Arc;

use async_trait::async_trait;
use rustls::{ClientConfig, RootCertStore, crypto::ring};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
};
use tokio_postgres::{Client, Connection, NoTls, Row, config::SslMode, types::ToSql};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    config::{Config, DbSslMode},
    error::DatabaseError,
    models::{Answer, Credential, ExportRow, NewSubmission},
};

/// Opens credential-scoped sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn Session>, DatabaseError>;
}

/// A single database connection owned by one request.
#[async_trait]
pub trait Session: Send {
    async fn begin(&mut self) -> Result<(), DatabaseError>;

    async fn insert_submission(&mut self, submission: &NewSubmission) -> Result<(), DatabaseError>;

    /// Inserts every answer in one statement.
    async fn insert_answers(
        &mut self,
        submission_id: Uuid,
        answers: &[Answer],
    ) -> Result<(), DatabaseError>;

    /// Every submission joined with its answers, oldest first.
    async fn fetch_rows(&mut self) -> Result<Vec<ExportRow>, DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;

    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    async fn close(self: Box<Self>);
}

pub const INSERT_SUBMISSION: &str =
    "INSERT INTO submissions (id, user_id, repeat_count) VALUES ($1, $2, $3)";

pub const SELECT_EXPORT: &str = "SELECT s.id, s.user_id, s.repeat_count, a.question_id, a.value \
     FROM submissions s \
     LEFT JOIN submission_answers a ON a.submission_id = s.id \
     ORDER BY s.created_at, s.id";

pub fn insert_answers_statement(count: usize) -> String {
    let placeholders: Vec<String> = (0..count)
        .map(|idx| {
            let base = idx * 3;
            format!("(${}, ${}, ${})", base + 1, base + 2, base + 3)
        })
        .collect();

    format!(
        "INSERT INTO submission_answers (submission_id, question_id, value) VALUES {}",
        placeholders.join(", ")
    )
}

pub struct PostgresConnector {
    host: Option<String>,
    port: u16,
    user: Option<String>,
    dbname: Option<String>,
    ssl_mode: DbSslMode,
}

impl PostgresConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.db_host.clone(),
            port: config.db_port,
            user: config.db_user.clone(),
            dbname: config.db_name.clone(),
            ssl_mode: config.db_ssl_mode,
        }
    }

    fn pg_config(&self, credential: &Credential) -> Result<tokio_postgres::Config, DatabaseError> {
        let (Some(host), Some(user), Some(dbname)) = (&self.host, &self.user, &self.dbname) else {
            let missing: Vec<&str> = [
                (self.host.is_none(), "DB_HOST"),
                (self.user.is_none(), "DB_USER"),
                (self.dbname.is_none(), "DB_NAME"),
            ]
            .into_iter()
            .filter_map(|(missing, key)| missing.then_some(key))
            .collect();

            return Err(DatabaseError::NotConfigured(missing.join(", ")));
        };

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(host)
            .port(self.port)
            .user(user)
            .dbname(dbname)
            .password(credential.expose());

        Ok(pg_config)
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn Session>, DatabaseError> {
        let mut pg_config = self.pg_config(credential)?;

        let (client, driver) = match self.ssl_mode {
            DbSslMode::Disable => {
                let (client, connection) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

                (client, spawn_driver(connection))
            }
            DbSslMode::Require => {
                pg_config.ssl_mode(SslMode::Require);

                let (client, connection) = pg_config
                    .connect(tls_connector()?)
                    .await
                    .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

                (client, spawn_driver(connection))
            }
        };

        debug!("Postgres session opened ({})", self.ssl_mode);

        Ok(Box::new(PostgresSession {
            client: Some(client),
            driver,
        }))
    }
}

pub fn tls_connector() -> Result<MakeRustlsConnect, DatabaseError> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.into(),
    };

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

fn spawn_driver<S, T>(connection: Connection<S, T>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Postgres connection error: {e}");
        }
    })
}

fn export_row(row: &Row) -> ExportRow {
    ExportRow {
        submission_id: row.get(0),
        user_id: row.get(1),
        repeat_count: row.get(2),
        question_id: row.get(3),
        value: row.get(4),
    }
}

pub struct PostgresSession {
    client: Option<Client>,
    driver: JoinHandle<()>,
}

impl PostgresSession {
    fn client(&self) -> Result<&Client, DatabaseError> {
        self.client
            .as_ref()
            .ok_or_else(|| DatabaseError::ConnectionFailed("Session already closed".to_string()))
    }

    async fn batch(&self, statement: &str) -> Result<(), DatabaseError> {
        self.client()?
            .batch_execute(statement)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn begin(&mut self) -> Result<(), DatabaseError> {
        self.batch("BEGIN").await
    }

    async fn insert_submission(&mut self, submission: &NewSubmission) -> Result<(), DatabaseError> {
        self.client()?
            .execute(
                INSERT_SUBMISSION,
                &[
                    &submission.id,
                    &submission.user_id,
                    &submission.repeat_count,
                ],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn insert_answers(
        &mut self,
        submission_id: Uuid,
        answers: &[Answer],
    ) -> Result<(), DatabaseError> {
        let statement = insert_answers_statement(answers.len());

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(answers.len() * 3);
        for answer in answers {
            params.push(&submission_id);
            params.push(&answer.question_id);
            params.push(&answer.value);
        }

        self.client()?
            .execute(statement.as_str(), &params)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn fetch_rows(&mut self) -> Result<Vec<ExportRow>, DatabaseError> {
        let rows = self
            .client()?
            .query(SELECT_EXPORT, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(rows.iter().map(export_row).collect())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.batch("ROLLBACK").await
    }

    async fn close(mut self: Box<Self>) {
        // Dropping the client sends Terminate, which lets the driver finish.
        drop(self.client.take());

        if let Err(e) = (&mut self.driver).await {
            error!("Postgres driver task failed: {e}");
        }

        debug!("Postgres session closed");
    }
}

impl Drop for PostgresSession {
    fn drop(&mut self) {
        if self.client.is_some() {
            self.driver.abort();
        }
    }
}
