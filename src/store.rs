use crate::error::StoreError;
use crate::models::{BadgeFlags, ListingId, ListingRecord};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = include_str!("../sql/schema.sql");

const SELECT_COLUMNS: &str = "id, price_local, price_reference, year, mileage, engine_volume, \
     horsepower, transmission_code, drive_wheels, fuel_type, is_market_price, is_only_on_source, \
     is_owner_listed, is_damaged, description, location, source_url, observed_at";

/// Durable collection of listings keyed by id.
pub trait RecordStore {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError>;

    /// No-op when the id is not stored.
    fn delete(&mut self, id: &ListingId) -> Result<(), StoreError>;

    /// Inserts all records or none. Fails on an id that is already stored.
    fn bulk_insert(&mut self, records: &[ListingRecord]) -> Result<(), StoreError>;

    /// All stored records ordered by id.
    fn all(&self) -> Result<Vec<ListingRecord>, StoreError>;

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.all()?.len())
    }

    /// Replaces any stored record sharing an id with the given ones.
    /// Record ids must be unique within `records`.
    fn replace_batch(&mut self, records: &[ListingRecord]) -> Result<(), StoreError> {
        for record in records {
            self.delete(&record.id)?;
        }
        self.bulk_insert(records)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<ListingId, ListingRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn delete(&mut self, id: &ListingId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    fn bulk_insert(&mut self, records: &[ListingRecord]) -> Result<(), StoreError> {
        let mut seen = std::collections::HashSet::new();
        for record in records {
            if self.records.contains_key(&record.id) || !seen.insert(&record.id) {
                return Err(StoreError::Duplicate {
                    id: record.id.to_string(),
                });
            }
        }
        for record in records {
            self.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<ListingRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}

/// SQLite-backed store. Batches are written inside one transaction.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened record store {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn insert_record(tx: &Transaction<'_>, record: &ListingRecord) -> Result<(), StoreError> {
    tx.execute(
        r#"
        INSERT INTO listings (
            id, price_local, price_reference, year,
            mileage, engine_volume, horsepower,
            transmission_code, drive_wheels, fuel_type,
            is_market_price, is_only_on_source, is_owner_listed, is_damaged,
            description, location, source_url, observed_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18
        )
        "#,
        params![
            record.id,
            record.price_local,
            record.price_reference,
            record.year,
            record.mileage,
            record.engine_volume,
            record.horsepower,
            record.transmission_code,
            record.drive_wheels,
            record.fuel_type,
            record.flags.is_market_price,
            record.flags.is_only_on_source,
            record.flags.is_owner_listed,
            record.flags.is_damaged,
            record.description,
            record.location,
            record.source_url,
            record.observed_at,
        ],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Duplicate {
            id: record.id.to_string(),
        },
        _ => StoreError::Unavailable(e),
    })?;
    Ok(())
}

impl ToSql for ListingId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.as_str().to_sql()
    }
}

impl FromSql for ListingId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        ListingId::new(raw).ok_or_else(|| FromSqlError::Other("empty listing id".into()))
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    Ok(ListingRecord {
        id: row.get(0)?,
        price_local: row.get(1)?,
        price_reference: row.get(2)?,
        year: row.get(3)?,
        mileage: row.get(4)?,
        engine_volume: row.get(5)?,
        horsepower: row.get(6)?,
        transmission_code: row.get(7)?,
        drive_wheels: row.get(8)?,
        fuel_type: row.get(9)?,
        flags: BadgeFlags {
            is_market_price: row.get(10)?,
            is_only_on_source: row.get(11)?,
            is_owner_listed: row.get(12)?,
            is_damaged: row.get(13)?,
        },
        description: row.get(14)?,
        location: row.get(15)?,
        source_url: row.get(16)?,
        observed_at: row.get(17)?,
    })
}

/// Values that cannot be read back as a record mean the row itself is bad.
fn row_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::InvalidColumnType(..) => StoreError::CorruptRow {
            reason: e.to_string(),
        },
        other => StoreError::Unavailable(other),
    }
}

impl RecordStore for SqliteStore {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        let sql = format!("SELECT {} FROM listings WHERE id = ?1", SELECT_COLUMNS);
        self.conn
            .query_row(&sql, params![id], read_row)
            .optional()
            .map_err(row_error)
    }

    fn delete(&mut self, id: &ListingId) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM listings WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn bulk_insert(&mut self, records: &[ListingRecord]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<ListingRecord>, StoreError> {
        let sql = format!("SELECT {} FROM listings ORDER BY id", SELECT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(row_error)?);
        }
        Ok(records)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| StoreError::CorruptRow {
            reason: format!("negative row count {}", count),
        })
    }

    /// Delete and insert for every id happen in one transaction, so an
    /// interrupted run never loses a record it was replacing.
    fn replace_batch(&mut self, records: &[ListingRecord]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute("DELETE FROM listings WHERE id = ?1", params![record.id])?;
            insert_record(&tx, record)?;
        }
        tx.commit()?;
        debug!("Committed {} records", records.len());
        Ok(())
    }
}
