//! Schema and fixture writers for store-backed tests
//!
//! Ingestion is not part of this crate; these helpers exist so tests can build
//! an in-memory store in either asset-schema generation.

use crate::asset::{Asset, AssetCodec};
use crate::db::DbPool;
use crate::error::Result;
use crate::toid::TotalOrderId;
use crate::types::Offer;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;

const HISTORY_DDL: &[&str] = &[
    "CREATE TABLE history_ledgers (
        sequence INTEGER PRIMARY KEY,
        ledger_hash TEXT NOT NULL,
        closed_at INTEGER NOT NULL
    )",
    "CREATE TABLE history_accounts (
        id INTEGER PRIMARY KEY,
        address TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE history_transactions (
        id INTEGER PRIMARY KEY,
        transaction_hash TEXT NOT NULL,
        ledger_sequence INTEGER NOT NULL,
        application_order INTEGER NOT NULL,
        account TEXT NOT NULL,
        account_sequence INTEGER NOT NULL,
        fee_paid INTEGER NOT NULL,
        operation_count INTEGER NOT NULL,
        tx_envelope TEXT NOT NULL,
        tx_result TEXT NOT NULL,
        tx_meta TEXT NOT NULL,
        tx_fee_meta TEXT NOT NULL,
        successful BOOLEAN,
        signatures TEXT NOT NULL,
        memo_type TEXT NOT NULL,
        memo TEXT,
        valid_after INTEGER,
        valid_before INTEGER
    )",
    "CREATE TABLE history_transaction_participants (
        history_transaction_id INTEGER NOT NULL,
        history_account_id INTEGER NOT NULL
    )",
    "CREATE TABLE history_operations (
        id INTEGER PRIMARY KEY,
        transaction_id INTEGER NOT NULL,
        application_order INTEGER NOT NULL,
        type INTEGER NOT NULL,
        details TEXT,
        source_account TEXT NOT NULL
    )",
    "CREATE TABLE history_operation_participants (
        history_operation_id INTEGER NOT NULL,
        history_account_id INTEGER NOT NULL
    )",
];

const DECOMPOSED_OFFERS_DDL: &str = "CREATE TABLE offers (
    sellerid TEXT NOT NULL,
    offerid INTEGER PRIMARY KEY,
    sellingassettype INTEGER NOT NULL,
    sellingassetcode TEXT,
    sellingissuer TEXT,
    buyingassettype INTEGER NOT NULL,
    buyingassetcode TEXT,
    buyingissuer TEXT,
    amount INTEGER NOT NULL,
    pricen INTEGER NOT NULL,
    priced INTEGER NOT NULL,
    price REAL NOT NULL,
    flags INTEGER NOT NULL,
    lastmodified INTEGER NOT NULL
)";

const ENCODED_OFFERS_DDL: &str = "CREATE TABLE offers (
    sellerid TEXT NOT NULL,
    offerid INTEGER PRIMARY KEY,
    sellingasset TEXT NOT NULL,
    buyingasset TEXT NOT NULL,
    amount INTEGER NOT NULL,
    pricen INTEGER NOT NULL,
    priced INTEGER NOT NULL,
    price REAL NOT NULL,
    flags INTEGER NOT NULL,
    lastmodified INTEGER NOT NULL
)";

/// A single-connection in-memory store that lives as long as the pool
pub async fn memory_pool() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// In-memory store with history tables and core tables at `schema_version`
pub async fn store(schema_version: u32) -> Result<DbPool> {
    let pool = memory_pool().await?;
    create_history_schema(&pool).await?;
    create_core_schema(&pool, schema_version).await?;
    Ok(pool)
}

/// Create the history tables
pub async fn create_history_schema(pool: &DbPool) -> Result<()> {
    for ddl in HISTORY_DDL {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

/// Create the core tables in the shape `schema_version` uses
pub async fn create_core_schema(pool: &DbPool, schema_version: u32) -> Result<()> {
    sqlx::query("CREATE TABLE storestate (statename TEXT PRIMARY KEY, state TEXT NOT NULL)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE TABLE ledgerheaders (ledgerseq INTEGER PRIMARY KEY, ledgerhash TEXT NOT NULL)")
        .execute(pool)
        .await?;

    let offers = if AssetCodec::new(schema_version).is_encoded() {
        ENCODED_OFFERS_DDL
    } else {
        DECOMPOSED_OFFERS_DDL
    };
    sqlx::query(offers).execute(pool).await?;
    set_schema_version(pool, schema_version).await
}

/// Overwrite the recorded schema version
pub async fn set_schema_version(pool: &DbPool, schema_version: u32) -> Result<()> {
    sqlx::query(
        "INSERT INTO storestate (statename, state) VALUES ('databaseschema', ?)
         ON CONFLICT(statename) DO UPDATE SET state = excluded.state",
    )
    .bind(schema_version.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Rewrite a decomposed offers table into the encoded shape, as the
/// version 9 migration does, and bump the schema version
pub async fn migrate_offers_to_encoded(pool: &DbPool) -> Result<()> {
    let codec = AssetCodec::new(8);
    let rows = sqlx::query("SELECT * FROM offers").fetch_all(pool).await?;

    let mut offers = Vec::with_capacity(rows.len());
    for row in &rows {
        offers.push(Offer {
            offer_id: row.try_get("offerid")?,
            seller_id: row.try_get("sellerid")?,
            selling: codec.decode(row, "selling")?,
            buying: codec.decode(row, "buying")?,
            amount: row.try_get("amount")?,
            price: crate::types::Price {
                n: row.try_get("pricen")?,
                d: row.try_get("priced")?,
            },
            flags: row.try_get("flags")?,
            last_modified_ledger: row.try_get("lastmodified")?,
        });
    }

    sqlx::query("DROP TABLE offers").execute(pool).await?;
    sqlx::query(ENCODED_OFFERS_DDL).execute(pool).await?;
    for offer in &offers {
        insert_offer(pool, 9, offer).await?;
    }
    set_schema_version(pool, 9).await
}

/// Record a closed ledger in both history and core
pub async fn insert_ledger(pool: &DbPool, sequence: i32, closed_at: i64) -> Result<()> {
    sqlx::query("INSERT INTO history_ledgers (sequence, ledger_hash, closed_at) VALUES (?, ?, ?)")
        .bind(sequence)
        .bind(format!("{:064x}", sequence))
        .bind(closed_at)
        .execute(pool)
        .await?;
    insert_core_ledger(pool, sequence).await
}

/// Record a ledger closed by core only
pub async fn insert_core_ledger(pool: &DbPool, sequence: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO ledgerheaders (ledgerseq, ledgerhash) VALUES (?, ?)")
        .bind(sequence)
        .bind(format!("{:064x}", sequence))
        .execute(pool)
        .await?;
    Ok(())
}

/// Look up or create the history account id for `address`
pub async fn account_id(pool: &DbPool, address: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO history_accounts (address) VALUES (?)")
        .bind(address)
        .execute(pool)
        .await?;
    let id: i64 = sqlx::query_scalar("SELECT id FROM history_accounts WHERE address = ?")
        .bind(address)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Transaction fixture
#[derive(Debug, Clone)]
pub struct TransactionFixture {
    /// Ledger the transaction closed in
    pub ledger: i32,
    /// Order within the ledger (1-based)
    pub order: i32,
    /// Source account
    pub account: String,
    /// Success flag; `None` models legacy rows
    pub successful: Option<bool>,
    /// Extra participant accounts
    pub participants: Vec<String>,
}

impl TransactionFixture {
    /// Successful transaction from `account` at (`ledger`, `order`)
    pub fn new(ledger: i32, order: i32, account: impl Into<String>) -> Self {
        Self {
            ledger,
            order,
            account: account.into(),
            successful: Some(true),
            participants: Vec::new(),
        }
    }

    /// Override the success flag
    pub fn successful(self, successful: Option<bool>) -> Self {
        Self { successful, ..self }
    }

    /// Deterministic hash for this fixture
    pub fn hash(&self) -> String {
        format!("{:032x}{:032x}", self.ledger, self.order)
    }

    /// Total order id of this fixture
    pub fn id(&self) -> i64 {
        TotalOrderId::ledger_start(self.ledger).to_i64() + ((self.order as i64) << 12)
    }
}

/// Insert a transaction and its participant rows; returns its id
pub async fn insert_transaction(pool: &DbPool, tx: &TransactionFixture) -> Result<i64> {
    let id = tx.id();
    sqlx::query(
        "INSERT INTO history_transactions (id, transaction_hash, ledger_sequence, application_order,
            account, account_sequence, fee_paid, operation_count, tx_envelope, tx_result, tx_meta,
            tx_fee_meta, successful, signatures, memo_type, memo, valid_after, valid_before)
         VALUES (?, ?, ?, ?, ?, ?, 100, 1, 'AAAA', 'AAAB', 'AAAC', 'AAAD', ?, 'sig', 'none', NULL, NULL, NULL)",
    )
    .bind(id)
    .bind(tx.hash())
    .bind(tx.ledger)
    .bind(tx.order)
    .bind(&tx.account)
    .bind(id)
    .bind(tx.successful)
    .execute(pool)
    .await?;

    let mut accounts = vec![tx.account.clone()];
    accounts.extend(tx.participants.iter().cloned());
    accounts.dedup();
    for address in accounts {
        let account = account_id(pool, &address).await?;
        sqlx::query(
            "INSERT INTO history_transaction_participants (history_transaction_id, history_account_id)
             VALUES (?, ?)",
        )
        .bind(id)
        .bind(account)
        .execute(pool)
        .await?;
    }
    Ok(id)
}

/// Insert operation number `order` (1-based) of transaction `tx`; returns its id
pub async fn insert_operation(
    pool: &DbPool,
    tx: &TransactionFixture,
    order: i32,
    type_code: i32,
    details: &str,
) -> Result<i64> {
    let id = tx.id() + order as i64;
    sqlx::query(
        "INSERT INTO history_operations (id, transaction_id, application_order, type, details, source_account)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(tx.id())
    .bind(order)
    .bind(type_code)
    .bind(details)
    .bind(&tx.account)
    .execute(pool)
    .await?;

    let account = account_id(pool, &tx.account).await?;
    sqlx::query(
        "INSERT INTO history_operation_participants (history_operation_id, history_account_id)
         VALUES (?, ?)",
    )
    .bind(id)
    .bind(account)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Insert an offer using the column shape of `schema_version`
pub async fn insert_offer(pool: &DbPool, schema_version: u32, offer: &Offer) -> Result<()> {
    let price = offer.price.n as f64 / offer.price.d as f64;

    if AssetCodec::new(schema_version).is_encoded() {
        sqlx::query(
            "INSERT INTO offers (sellerid, offerid, sellingasset, buyingasset, amount, pricen, priced,
                price, flags, lastmodified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&offer.seller_id)
        .bind(offer.offer_id)
        .bind(offer.selling.to_xdr_base64()?)
        .bind(offer.buying.to_xdr_base64()?)
        .bind(offer.amount)
        .bind(offer.price.n)
        .bind(offer.price.d)
        .bind(price)
        .bind(offer.flags)
        .bind(offer.last_modified_ledger)
        .execute(pool)
        .await?;
        return Ok(());
    }

    fn part(asset: &Asset, value: &str) -> Option<String> {
        (!asset.is_native()).then(|| value.to_string())
    }

    sqlx::query(
        "INSERT INTO offers (sellerid, offerid, sellingassettype, sellingassetcode, sellingissuer,
            buyingassettype, buyingassetcode, buyingissuer, amount, pricen, priced, price, flags,
            lastmodified)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&offer.seller_id)
    .bind(offer.offer_id)
    .bind(offer.selling.asset_type().code())
    .bind(part(&offer.selling, offer.selling.code()))
    .bind(part(&offer.selling, offer.selling.issuer()))
    .bind(offer.buying.asset_type().code())
    .bind(part(&offer.buying, offer.buying.code()))
    .bind(part(&offer.buying, offer.buying.issuer()))
    .bind(offer.amount)
    .bind(offer.price.n)
    .bind(offer.price.d)
    .bind(price)
    .bind(offer.flags)
    .bind(offer.last_modified_ledger)
    .execute(pool)
    .await?;
    Ok(())
}

/// A valid account address derived from `seed`
pub fn address(seed: u8) -> String {
    stellar_strkey::ed25519::PublicKey([seed; 32]).to_string()
}
