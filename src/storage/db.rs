//! SQLite database with thread-safe access.
//!
//! The connection lives behind a mutex and every query runs on the blocking
//! thread pool, so a multi-row write always runs to completion even when the
//! calling task is cancelled.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::blockchain::types::{ChainTag, RawTransaction, TokenInfo};
use crate::providers::ProviderHost;
use crate::storage::models::{InsertOutcome, TransactionDetails, Wallet};
use crate::storage::schema::SCHEMA;
use crate::storage::{StorageError, StorageResult};

/// Handle to the tracker database.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open or create the database at `path`.
    pub fn open(path: &str) -> StorageResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create tables and indexes that do not exist yet.
    pub fn migrate(&self) -> StorageResult<()> {
        let conn = self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Database schema up to date");
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| StorageError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
    }

    /// Insert a wallet or refresh its host, name and refresh time.
    pub async fn upsert_wallet(&self, wallet: &Wallet) -> StorageResult<()> {
        let wallet = wallet.clone();
        self.blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO wallets (address, host, name, refreshed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(address) DO UPDATE SET
                    host = excluded.host,
                    name = excluded.name,
                    refreshed_at = excluded.refreshed_at
                "#,
                params![
                    wallet.address,
                    wallet.host.as_str(),
                    wallet.name,
                    wallet.refreshed_at.timestamp(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Every known wallet, ordered by address.
    pub async fn list_wallets(&self) -> StorageResult<Vec<Wallet>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT address, host, name, refreshed_at FROM wallets ORDER BY address",
            )?;
            let wallets = stmt
                .query_map([], |row| row_to_wallet(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(wallets)
        })
        .await
    }

    /// Most recent refresh of any wallet listed under `host`.
    pub async fn last_refreshed_at(&self, host: ProviderHost) -> StorageResult<Option<DateTime<Utc>>> {
        self.blocking(move |conn| {
            let secs: Option<i64> = conn.query_row(
                "SELECT MAX(refreshed_at) FROM wallets WHERE host = ?1",
                params![host.as_str()],
                |row| row.get(0),
            )?;
            secs.map(|secs| {
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| StorageError::Corrupt(format!("refreshed_at {}", secs)))
            })
            .transpose()
        })
        .await
    }

    /// Timestamp of the newest stored transaction of `wallet`.
    pub async fn latest_transaction_timestamp(&self, wallet: &str) -> StorageResult<Option<i64>> {
        let wallet = wallet.to_string();
        self.blocking(move |conn| {
            let latest = conn.query_row(
                "SELECT MAX(timestamp) FROM transactions WHERE wallet_address = ?1",
                params![wallet],
                |row| row.get(0),
            )?;
            Ok(latest)
        })
        .await
    }

    /// Insert transactions of `wallet` in one database transaction.
    ///
    /// Each transaction, its token and its amounts are written inside a
    /// savepoint. A hash that already exists rolls back only its own
    /// savepoint and is reported as a duplicate.
    pub async fn insert_transactions(
        &self,
        wallet: &str,
        transactions: Vec<RawTransaction>,
    ) -> StorageResult<Vec<(String, InsertOutcome)>> {
        let wallet = wallet.to_string();
        self.blocking(move |conn| {
            let mut tx = conn.transaction()?;
            let mut outcomes = Vec::with_capacity(transactions.len());

            for item in &transactions {
                let sp = tx.savepoint()?;
                upsert_token(&sp, &item.token)?;

                let inserted = sp.execute(
                    r#"
                    INSERT INTO transactions (hash, wallet_address, from_address, token_address, timestamp)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![item.hash, wallet, item.from_address, item.token.address, item.timestamp],
                );
                match inserted {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => {
                        drop(sp);
                        outcomes.push((item.hash.clone(), InsertOutcome::Duplicate));
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }

                for (to_address, amount) in &item.amounts {
                    sp.execute(
                        "INSERT INTO transaction_amounts (transaction_hash, to_address, amount) VALUES (?1, ?2, ?3)",
                        params![item.hash, to_address, amount.to_string()],
                    )?;
                }
                sp.commit()?;
                outcomes.push((item.hash.clone(), InsertOutcome::Inserted));
            }

            tx.commit()?;
            Ok(outcomes)
        })
        .await
    }

    /// Whether a notification was already recorded for `hash`.
    pub async fn has_delivery(&self, hash: &str) -> StorageResult<bool> {
        let hash = hash.to_string();
        self.blocking(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM deliveries WHERE transaction_hash = ?1",
                    params![hash],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    /// Load a transaction with its wallet, token and amounts.
    pub async fn load_transaction(&self, hash: &str) -> StorageResult<Option<TransactionDetails>> {
        let hash = hash.to_string();
        self.blocking(move |conn| {
            let head = conn
                .query_row(
                    r#"
                    SELECT w.address, w.host, w.name, w.refreshed_at,
                           t.from_address, t.timestamp,
                           k.address, k.symbol, k.name, k.chain, k.decimals
                    FROM transactions t
                    JOIN wallets w ON w.address = t.wallet_address
                    JOIN tokens k ON k.address = t.token_address
                    WHERE t.hash = ?1
                    "#,
                    params![hash],
                    |row| {
                        let wallet = row_to_wallet(row, 0)?;
                        let chain: String = row.get(9)?;
                        let token = TokenInfo {
                            address: row.get(6)?,
                            symbol: row.get(7)?,
                            name: row.get(8)?,
                            chain: chain
                                .parse::<ChainTag>()
                                .map_err(|e| conversion_error(9, e))?,
                            decimals: row.get(10)?,
                        };
                        Ok((wallet, row.get::<_, String>(4)?, row.get::<_, i64>(5)?, token))
                    },
                )
                .optional()?;

            let Some((wallet, from_address, timestamp, token)) = head else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT to_address, amount FROM transaction_amounts WHERE transaction_hash = ?1 ORDER BY rowid",
            )?;
            let amounts = stmt
                .query_map(params![hash], |row| {
                    let amount: String = row.get(1)?;
                    let amount = amount.parse::<u128>().map_err(|e| conversion_error(1, e))?;
                    Ok((row.get::<_, String>(0)?, amount))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(Some(TransactionDetails {
                hash,
                wallet,
                from_address,
                token,
                amounts,
                timestamp,
            }))
        })
        .await
    }

    /// Record that `hash` was announced as `message_id` in `chat_id`.
    pub async fn record_delivery(
        &self,
        chat_id: i64,
        message_id: i64,
        hash: &str,
    ) -> StorageResult<InsertOutcome> {
        let hash = hash.to_string();
        self.blocking(move |conn| {
            let result = conn.execute(
                r#"
                INSERT INTO deliveries (chat_id, message_id, transaction_hash, delivered_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![chat_id, message_id, hash, Utc::now().timestamp()],
            );
            match result {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

fn upsert_token(conn: &Connection, token: &TokenInfo) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO tokens (address, symbol, name, chain, decimals)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(address) DO UPDATE SET
            symbol = excluded.symbol,
            name = excluded.name,
            chain = excluded.chain,
            decimals = excluded.decimals
        "#,
        params![token.address, token.symbol, token.name, token.chain.as_str(), token.decimals],
    )?;
    Ok(())
}

fn row_to_wallet(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Wallet> {
    let host: String = row.get(offset + 1)?;
    let refreshed_at: i64 = row.get(offset + 3)?;
    Ok(Wallet {
        address: row.get(offset)?,
        host: host
            .parse::<ProviderHost>()
            .map_err(|e| conversion_error(offset + 1, e))?,
        name: row.get(offset + 2)?,
        refreshed_at: Utc
            .timestamp_opt(refreshed_at, 0)
            .single()
            .ok_or_else(|| {
                rusqlite::Error::IntegralValueOutOfRange(offset + 3, refreshed_at)
            })?,
    })
}

fn conversion_error<E>(index: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC_WALLET: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const SENDER: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";

    async fn storage_with_wallet() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage.migrate().unwrap();
        storage.upsert_wallet(&wallet(BTC_WALLET, 1_700_000_000)).await.unwrap();
        storage
    }

    fn wallet(address: &str, refreshed_at: i64) -> Wallet {
        Wallet {
            address: address.to_string(),
            host: ProviderHost::Whitetrade,
            name: "Bitcoin".to_string(),
            refreshed_at: Utc.timestamp_opt(refreshed_at, 0).unwrap(),
        }
    }

    fn btc_tx(hash: &str, timestamp: i64) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            from_address: SENDER.to_string(),
            token: TokenInfo::native(ChainTag::Bitcoin),
            amounts: vec![
                (BTC_WALLET.to_string(), 150_000_000),
                (SENDER.to_string(), 1_000),
            ],
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let storage = Storage::open_in_memory().unwrap();
        storage.migrate().unwrap();
        storage.migrate().unwrap();
        assert!(storage.list_wallets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_wallet_updates_existing_row() {
        let storage = storage_with_wallet().await;
        let mut renamed = wallet(BTC_WALLET, 1_700_000_600);
        renamed.name = "BTC deposits".to_string();
        storage.upsert_wallet(&renamed).await.unwrap();

        let wallets = storage.list_wallets().await.unwrap();
        assert_eq!(wallets, vec![renamed]);
        assert_eq!(
            storage.last_refreshed_at(ProviderHost::Whitetrade).await.unwrap(),
            Some(Utc.timestamp_opt(1_700_000_600, 0).unwrap())
        );
        assert_eq!(storage.last_refreshed_at(ProviderHost::Fianit).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_hash_does_not_abort_batch() {
        let storage = storage_with_wallet().await;
        let first = storage
            .insert_transactions(BTC_WALLET, vec![btc_tx("a", 10)])
            .await
            .unwrap();
        assert_eq!(first, vec![("a".to_string(), InsertOutcome::Inserted)]);

        let second = storage
            .insert_transactions(BTC_WALLET, vec![btc_tx("a", 10), btc_tx("b", 20)])
            .await
            .unwrap();
        assert_eq!(
            second,
            vec![
                ("a".to_string(), InsertOutcome::Duplicate),
                ("b".to_string(), InsertOutcome::Inserted),
            ]
        );
        assert_eq!(
            storage.latest_transaction_timestamp(BTC_WALLET).await.unwrap(),
            Some(20)
        );
    }

    #[tokio::test]
    async fn test_load_transaction_joins_everything() {
        let storage = storage_with_wallet().await;
        storage
            .insert_transactions(BTC_WALLET, vec![btc_tx("a", 10)])
            .await
            .unwrap();

        let details = storage.load_transaction("a").await.unwrap().unwrap();
        assert_eq!(details.wallet.address, BTC_WALLET);
        assert_eq!(details.token, TokenInfo::native(ChainTag::Bitcoin));
        assert_eq!(details.amounts[0], (BTC_WALLET.to_string(), 150_000_000));
        assert_eq!(details.amounts[1], (SENDER.to_string(), 1_000));
        assert_eq!(details.timestamp, 10);

        assert!(storage.load_transaction("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_large_amounts_survive_storage() {
        let storage = storage_with_wallet().await;
        let mut tx = btc_tx("big", 1);
        tx.amounts = vec![(BTC_WALLET.to_string(), u128::MAX)];
        storage.insert_transactions(BTC_WALLET, vec![tx]).await.unwrap();

        let details = storage.load_transaction("big").await.unwrap().unwrap();
        assert_eq!(details.amounts, vec![(BTC_WALLET.to_string(), u128::MAX)]);
    }

    #[tokio::test]
    async fn test_invalid_decimals_rejected() {
        let storage = storage_with_wallet().await;
        let mut tx = btc_tx("bad", 1);
        tx.token.decimals = 19;
        let result = storage.insert_transactions(BTC_WALLET, vec![tx]).await;
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
        assert!(storage.load_transaction("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_delivery_per_transaction() {
        let storage = storage_with_wallet().await;
        storage
            .insert_transactions(BTC_WALLET, vec![btc_tx("a", 10)])
            .await
            .unwrap();

        assert!(!storage.has_delivery("a").await.unwrap());
        assert_eq!(
            storage.record_delivery(42, 1, "a").await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            storage.record_delivery(42, 2, "a").await.unwrap(),
            InsertOutcome::Duplicate
        );
        assert!(storage.has_delivery("a").await.unwrap());
    }
}
