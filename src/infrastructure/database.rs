use crate::domain::{
    AnchoringStatus, ArchiveRefs, CertificateId, CertificateLogEntry, CertificateRecord,
    ContentFingerprint,
};
use chrono::{TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Certificate not found")]
    NotFound,

    #[error("Duplicate certificate id")]
    DuplicateCertificate,

    #[error("Corrupt certificate row: {0}")]
    Corrupt(String),

    #[error("Database connection poisoned")]
    Poisoned,
}

/// Append-only log of issued certificates.
pub trait CertificateRepository: Send + Sync {
    fn save_certificate(&self, entry: &CertificateLogEntry) -> Result<(), DatabaseError>;
    fn find_by_id(&self, certificate_id: &str) -> Result<CertificateLogEntry, DatabaseError>;
    /// All certificates for a piece of content, newest first.
    fn find_by_fingerprint(
        &self,
        fingerprint: &ContentFingerprint,
    ) -> Result<Vec<CertificateLogEntry>, DatabaseError>;
    fn count_certificates(&self) -> Result<usize, DatabaseError>;
}

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "SELECT certificate_id, fingerprint, proof, anchoring_status,
        user_name, email, title, file_name, blockchain, verification_url, calendar_url,
        issued_at, ipfs_cid, ipfs_url, ipfs_metadata_url
     FROM certificates";

impl SqliteRepository {
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS certificates (
                certificate_id TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                proof BLOB,
                anchoring_status TEXT NOT NULL,
                user_name TEXT NOT NULL,
                email TEXT,
                title TEXT NOT NULL,
                file_name TEXT NOT NULL,
                blockchain TEXT NOT NULL,
                verification_url TEXT NOT NULL,
                calendar_url TEXT,
                issued_at INTEGER NOT NULL,
                ipfs_cid TEXT,
                ipfs_url TEXT,
                ipfs_metadata_url TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fingerprint ON certificates(fingerprint)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_issued_at ON certificates(issued_at)",
            [],
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    fn row_to_entry(row: &rusqlite::Row) -> Result<CertificateLogEntry, rusqlite::Error> {
        let fingerprint: String = row.get(1)?;
        let fingerprint = ContentFingerprint::parse(&fingerprint)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        let status: String = row.get(3)?;
        let anchoring_status = AnchoringStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                Box::new(DatabaseError::Corrupt(format!("unknown status {}", status))),
            )
        })?;

        let issued_millis: i64 = row.get(11)?;
        let issued_at = Utc
            .timestamp_millis_opt(issued_millis)
            .single()
            .ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    Type::Integer,
                    Box::new(DatabaseError::Corrupt(format!(
                        "timestamp out of range {}",
                        issued_millis
                    ))),
                )
            })?;

        let certificate_id: String = row.get(0)?;

        Ok(CertificateLogEntry {
            record: CertificateRecord {
                certificate_id: CertificateId::from(certificate_id),
                fingerprint,
                proof: row.get(2)?,
                anchoring_status,
                user_name: row.get(4)?,
                email: row.get(5)?,
                title: row.get(6)?,
                file_name: row.get(7)?,
                blockchain: row.get(8)?,
                verification_url: row.get(9)?,
                calendar_url: row.get(10)?,
                issued_at,
            },
            archive: ArchiveRefs {
                ipfs_cid: row.get(12)?,
                ipfs_url: row.get(13)?,
                ipfs_metadata_url: row.get(14)?,
            },
        })
    }
}

impl CertificateRepository for SqliteRepository {
    fn save_certificate(&self, entry: &CertificateLogEntry) -> Result<(), DatabaseError> {
        let record = &entry.record;
        let conn = self.lock()?;

        match conn.execute(
            "INSERT INTO certificates (certificate_id, fingerprint, proof, anchoring_status,
                user_name, email, title, file_name, blockchain, verification_url, calendar_url,
                issued_at, ipfs_cid, ipfs_url, ipfs_metadata_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.certificate_id.as_str(),
                record.fingerprint.as_str(),
                &record.proof,
                record.anchoring_status.as_str(),
                &record.user_name,
                &record.email,
                &record.title,
                &record.file_name,
                &record.blockchain,
                &record.verification_url,
                &record.calendar_url,
                record.issued_at.timestamp_millis(),
                &entry.archive.ipfs_cid,
                &entry.archive.ipfs_url,
                &entry.archive.ipfs_metadata_url,
            ],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg)) => {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    Err(DatabaseError::DuplicateCertificate)
                } else {
                    Err(rusqlite::Error::SqliteFailure(err, msg).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_id(&self, certificate_id: &str) -> Result<CertificateLogEntry, DatabaseError> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                &format!("{} WHERE certificate_id = ?1", SELECT_COLUMNS),
                params![certificate_id],
                Self::row_to_entry,
            )
            .optional()?;

        entry.ok_or(DatabaseError::NotFound)
    }

    fn find_by_fingerprint(
        &self,
        fingerprint: &ContentFingerprint,
    ) -> Result<Vec<CertificateLogEntry>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE fingerprint = ?1 ORDER BY issued_at DESC, rowid DESC",
            SELECT_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![fingerprint.as_str()], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn count_certificates(&self) -> Result<usize, DatabaseError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}
