use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

use crate::config::DbConnConfig;
use crate::error::{RepoError, Result};

/// Open a SeaORM connection pool from config.
pub async fn connect(cfg: &DbConnConfig) -> Result<DatabaseConnection> {
    if cfg.dsn.trim().is_empty() {
        return Err(RepoError::Config("dsn must not be empty".to_string()));
    }

    let mut opts = ConnectOptions::new(cfg.dsn.trim().to_string());
    opts.sqlx_logging(cfg.sqlx_logging);
    if let Some(pool) = &cfg.pool {
        pool.apply(&mut opts);
    }
    if cfg.is_sqlite_memory() {
        // Pin a single long-lived connection so the schema survives.
        opts.max_connections(1).min_connections(1);
    }

    let conn = Database::connect(opts).await?;

    tracing::info!(
        backend = ?conn.get_database_backend(),
        dsn = %redact_credentials_in_dsn(Some(&cfg.dsn)),
        "Connected to database"
    );

    Ok(conn)
}

/// Mask the password part of a DSN for logging.
pub fn redact_credentials_in_dsn(dsn: Option<&str>) -> String {
    match dsn {
        Some(dsn) if dsn.contains('@') => match url::Url::parse(dsn) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "***".to_string(),
        },
        Some(dsn) => dsn.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_password() {
        let redacted = redact_credentials_in_dsn(Some("postgres://app:secret@db:5432/app"));
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("app:***@db"));
    }

    #[test]
    fn test_redact_passthrough() {
        assert_eq!(
            redact_credentials_in_dsn(Some("sqlite::memory:")),
            "sqlite::memory:"
        );
        assert_eq!(redact_credentials_in_dsn(None), "none");
        assert_eq!(redact_credentials_in_dsn(Some("not a url@all")), "***");
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_dsn() {
        let err = connect(&DbConnConfig::new("  ")).await.unwrap_err();
        assert!(matches!(err, RepoError::Config(_)));
    }
}
