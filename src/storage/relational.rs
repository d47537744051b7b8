//! `SQLite`-backed storage engine.
//!
//! Every operation opens its own connection, configures it, runs on the
//! blocking pool and drops the connection when done. No connection outlives
//! a call, so the engine holds nothing but the database path.

use super::PersistenceMode;
use super::dataset::parse_cards_csv;
use super::metrics::observe;
use super::traits::{CardFilter, StorageEngine};
use crate::models::{Card, CardId};
use crate::{Error, Result, current_timestamp};
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "relational";

const CARD_COLUMNS: &str = "id, name, mana_cost, card_type, rarity, set_name, text, power, \
                            toughness, image_url, multiverse_id, created_at, updated_at";

const UPSERT_SQL: &str = "INSERT INTO cards (id, name, mana_cost, card_type, rarity, set_name, text, \
                          power, toughness, image_url, multiverse_id, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL)
     ON CONFLICT(id) DO UPDATE SET
         name = excluded.name,
         mana_cost = excluded.mana_cost,
         card_type = excluded.card_type,
         rarity = excluded.rarity,
         set_name = excluded.set_name,
         text = excluded.text,
         power = excluded.power,
         toughness = excluded.toughness,
         image_url = excluded.image_url,
         multiverse_id = excluded.multiverse_id,
         updated_at = excluded.created_at";

/// Storage engine backed by a `SQLite` database file.
#[derive(Debug, Clone)]
pub struct RelationalEngine {
    db_path: PathBuf,
}

impl RelationalEngine {
    /// Opens the database and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
        }

        let conn = connect(&db_path)?;
        initialize(&conn).map_err(|e| unavailable(&e))?;
        tracing::info!(path = %db_path.display(), "Relational engine ready");

        Ok(Self { db_path })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `f` with a fresh connection on the blocking pool.
    async fn with_connection<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        })?
    }
}

/// Opens and configures a connection.
fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| unavailable(&e))?;
    configure_connection(&conn).map_err(|e| unavailable(&e))?;
    Ok(conn)
}

/// Applies WAL journaling, NORMAL synchronous mode and a 5 second busy timeout,
/// and registers [`FOLD_CASE`].
fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns a row, so pragma_update is used instead of execute_batch
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    register_fold_case(conn)
}

/// SQL function lowercasing like `str::to_lowercase`. The built-in `lower()`
/// only folds ASCII.
const FOLD_CASE: &str = "fold_case";

fn register_fold_case(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}

fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            mana_cost TEXT,
            card_type TEXT,
            rarity TEXT,
            set_name TEXT,
            text TEXT,
            power TEXT,
            toughness TEXT,
            image_url TEXT,
            multiverse_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
        CREATE INDEX IF NOT EXISTS idx_cards_type ON cards(card_type);
        CREATE INDEX IF NOT EXISTS idx_cards_rarity ON cards(rarity);",
    )
}

fn unavailable(e: &dyn std::fmt::Display) -> Error {
    Error::StorageUnavailable {
        backend: BACKEND.to_string(),
        cause: e.to_string(),
    }
}

fn failed(operation: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

// rusqlite has no ToSql for u64
#[allow(clippy::cast_possible_wrap)]
const fn to_db_time(ts: u64) -> i64 {
    ts as i64
}

#[allow(clippy::cast_sign_loss)]
const fn from_db_time(ts: i64) -> u64 {
    ts as u64
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let mut card = Card::new(row.get::<_, String>(1)?);
    card.id = CardId::new(row.get::<_, String>(0)?);
    card.mana_cost = row.get(2)?;
    card.card_type = row.get(3)?;
    card.rarity = row.get(4)?;
    card.set_name = row.get(5)?;
    card.text = row.get(6)?;
    card.power = row.get(7)?;
    card.toughness = row.get(8)?;
    card.image_url = row.get(9)?;
    card.multiverse_id = row.get(10)?;
    card.created_at = from_db_time(row.get(11)?);
    card.updated_at = row.get::<_, Option<i64>>(12)?.map(from_db_time);
    Ok(card)
}

/// Builds the WHERE clause and bound values for a filter.
///
/// Case-insensitive comparisons go through [`FOLD_CASE`] so they agree with
/// [`CardFilter::matches`].
fn filter_clause(filter: &CardFilter) -> (String, Vec<String>) {
    let contains = |column: &str, param: usize| {
        format!("instr({FOLD_CASE}({column}), {FOLD_CASE}(?{param})) > 0")
    };
    match filter {
        CardFilter::All => ("1 = 1".to_string(), Vec::new()),
        CardFilter::NameContains(term) => (contains("name", 1), vec![term.clone()]),
        CardFilter::NameContainsAny(terms) if terms.is_empty() => ("0 = 1".to_string(), Vec::new()),
        CardFilter::NameContainsAny(terms) => {
            let clause = (1..=terms.len())
                .map(|i| contains("name", i))
                .collect::<Vec<_>>()
                .join(" OR ");
            (clause, terms.clone())
        },
        CardFilter::ManaSymbol(symbol) => (
            "instr(mana_cost, ?1) > 0".to_string(),
            vec![symbol.clone()],
        ),
        CardFilter::Rarity(rarity) => (
            format!("{FOLD_CASE}(rarity) = {FOLD_CASE}(?1)"),
            vec![rarity.clone()],
        ),
        CardFilter::TypeContains(term) => (contains("card_type", 1), vec![term.clone()]),
        CardFilter::SetContains(term) => (contains("set_name", 1), vec![term.clone()]),
    }
}

fn select_cards(conn: &Connection, filter: &CardFilter, limit: Option<usize>) -> Result<Vec<Card>> {
    let (clause, values) = filter_clause(filter);
    let limit_sql = limit.map_or_else(String::new, |l| format!(" LIMIT {l}"));
    let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE {clause} ORDER BY name, id{limit_sql}");

    let mut stmt = conn.prepare(&sql).map_err(failed("prepare_select"))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), card_from_row)
        .map_err(failed("query_cards"))?;
    let cards = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(failed("read_card_row"))?;
    Ok(cards)
}

fn upsert_cards(conn: &mut Connection, cards: &[Card]) -> Result<usize> {
    let now = to_db_time(current_timestamp());
    let tx = conn.transaction().map_err(failed("begin_transaction"))?;
    {
        let mut stmt = tx.prepare(UPSERT_SQL).map_err(failed("prepare_upsert"))?;
        for card in cards {
            stmt.execute(params![
                card.id.as_str(),
                card.name,
                card.mana_cost,
                card.card_type,
                card.rarity,
                card.set_name,
                card.text,
                card.power,
                card.toughness,
                card.image_url,
                card.multiverse_id,
                now,
            ])
            .map_err(|e| Error::OperationFailed {
                operation: "upsert_card".to_string(),
                cause: format!("card '{}': {e}", card.id),
            })?;
        }
    }
    // Dropping an uncommitted transaction rolls it back
    tx.commit().map_err(failed("commit_transaction"))?;
    Ok(cards.len())
}

#[async_trait]
impl StorageEngine for RelationalEngine {
    #[instrument(skip(self), fields(operation = "get_all", backend = BACKEND))]
    async fn get_all(&self) -> Result<Vec<Card>> {
        let start = Instant::now();
        let result = self
            .with_connection("get_all", |conn| select_cards(conn, &CardFilter::All, None))
            .await;
        observe(BACKEND, "get_all", start, result)
    }

    #[instrument(skip(self), fields(operation = "get_by_id", backend = BACKEND, card.id = %id))]
    async fn get_by_id(&self, id: &CardId) -> Result<Option<Card>> {
        let start = Instant::now();
        let id = id.clone();
        let result = self
            .with_connection("get_by_id", move |conn| {
                conn.query_row(
                    &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                    params![id.as_str()],
                    card_from_row,
                )
                .optional()
                .map_err(failed("get_card"))
            })
            .await;
        observe(BACKEND, "get_by_id", start, result)
    }

    #[instrument(skip(self, card), fields(operation = "add", backend = BACKEND, card.id = %card.id))]
    async fn add(&self, mut card: Card) -> Result<Card> {
        let start = Instant::now();
        if let Err(e) = card.validate() {
            return observe(BACKEND, "add", start, Err(e));
        }
        if card.id.is_blank() {
            card.id = CardId::generate();
        }
        card.created_at = current_timestamp();
        card.updated_at = None;

        let result = self
            .with_connection("add", move |conn| {
                let inserted = conn.execute(
                    &format!(
                        "INSERT INTO cards ({CARD_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL)"
                    ),
                    params![
                        card.id.as_str(),
                        card.name,
                        card.mana_cost,
                        card.card_type,
                        card.rarity,
                        card.set_name,
                        card.text,
                        card.power,
                        card.toughness,
                        card.image_url,
                        card.multiverse_id,
                        to_db_time(card.created_at),
                    ],
                );
                match inserted {
                    Ok(_) => Ok(card),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        Err(Error::InvalidInput(format!(
                            "card '{}' already exists",
                            card.id
                        )))
                    },
                    Err(e) => Err(failed("insert_card")(e)),
                }
            })
            .await;
        observe(BACKEND, "add", start, result)
    }

    #[instrument(skip(self, card), fields(operation = "update", backend = BACKEND, card.id = %card.id))]
    async fn update(&self, mut card: Card) -> Result<Card> {
        let start = Instant::now();
        if let Err(e) = card.validate() {
            return observe(BACKEND, "update", start, Err(e));
        }

        let result = self
            .with_connection("update", move |conn| {
                let tx = conn.transaction().map_err(failed("begin_transaction"))?;
                let created_at: Option<i64> = tx
                    .query_row(
                        "SELECT created_at FROM cards WHERE id = ?1",
                        params![card.id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(failed("get_card"))?;
                let Some(created_at) = created_at else {
                    return Err(Error::card_not_found(card.id.as_str()));
                };

                card.created_at = from_db_time(created_at);
                card.updated_at = Some(current_timestamp());
                tx.execute(
                    "UPDATE cards SET name = ?2, mana_cost = ?3, card_type = ?4, rarity = ?5,
                         set_name = ?6, text = ?7, power = ?8, toughness = ?9, image_url = ?10,
                         multiverse_id = ?11, updated_at = ?12
                     WHERE id = ?1",
                    params![
                        card.id.as_str(),
                        card.name,
                        card.mana_cost,
                        card.card_type,
                        card.rarity,
                        card.set_name,
                        card.text,
                        card.power,
                        card.toughness,
                        card.image_url,
                        card.multiverse_id,
                        card.updated_at.map(to_db_time),
                    ],
                )
                .map_err(failed("update_card"))?;
                tx.commit().map_err(failed("commit_transaction"))?;
                Ok(card)
            })
            .await;
        observe(BACKEND, "update", start, result)
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND, card.id = %id))]
    async fn delete(&self, id: &CardId) -> Result<()> {
        let start = Instant::now();
        let id = id.clone();
        let result = self
            .with_connection("delete", move |conn| {
                let removed = conn
                    .execute("DELETE FROM cards WHERE id = ?1", params![id.as_str()])
                    .map_err(failed("delete_card"))?;
                if removed == 0 {
                    return Err(Error::card_not_found(id.as_str()));
                }
                Ok(())
            })
            .await;
        observe(BACKEND, "delete", start, result)
    }

    #[instrument(skip(self), fields(operation = "clear", backend = BACKEND))]
    async fn clear(&self) -> Result<()> {
        let start = Instant::now();
        let result = self
            .with_connection("clear", |conn| {
                let removed = conn
                    .execute("DELETE FROM cards", [])
                    .map_err(failed("clear_cards"))?;
                tracing::info!(removed, "Cleared relational catalog");
                Ok(())
            })
            .await;
        observe(BACKEND, "clear", start, result)
    }

    #[instrument(skip(self), fields(operation = "bulk_load", backend = BACKEND, path = %path.display()))]
    async fn bulk_load(&self, path: &Path) -> Result<usize> {
        let start = Instant::now();
        let source = path.to_path_buf();
        let result = self
            .with_connection("bulk_load", move |conn| {
                let parsed = parse_cards_csv(&source)?;
                let loaded = upsert_cards(conn, &parsed.cards)?;
                tracing::info!(loaded, skipped = parsed.skipped, "Loaded dataset into relational store");
                Ok(loaded)
            })
            .await;
        observe(BACKEND, "bulk_load", start, result)
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    async fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let result = self
            .with_connection("count", |conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
                    .map_err(failed("count_cards"))?;
                Ok(usize::try_from(count).unwrap_or(0))
            })
            .await;
        observe(BACKEND, "count", start, result)
    }

    #[instrument(skip(self), fields(operation = "find", backend = BACKEND))]
    async fn find(&self, filter: &CardFilter, limit: Option<usize>) -> Result<Vec<Card>> {
        let start = Instant::now();
        let filter = filter.clone();
        let result = self
            .with_connection("find", move |conn| select_cards(conn, &filter, limit))
            .await;
        observe(BACKEND, "find", start, result)
    }

    fn mode(&self) -> PersistenceMode {
        PersistenceMode::Relational
    }
}
