//! Database schema.

/// Idempotent schema creation, applied on every start.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    address TEXT PRIMARY KEY CHECK (address <> ''),
    host TEXT NOT NULL,
    name TEXT NOT NULL CHECK (name <> ''),
    refreshed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallets_host ON wallets(host);

CREATE TABLE IF NOT EXISTS tokens (
    address TEXT PRIMARY KEY CHECK (address <> ''),
    symbol TEXT NOT NULL CHECK (symbol <> ''),
    name TEXT NOT NULL,
    chain TEXT NOT NULL,
    decimals INTEGER NOT NULL CHECK (decimals BETWEEN 0 AND 18)
);

CREATE TABLE IF NOT EXISTS transactions (
    hash TEXT PRIMARY KEY CHECK (hash <> ''),
    wallet_address TEXT NOT NULL REFERENCES wallets(address),
    from_address TEXT NOT NULL CHECK (from_address <> ''),
    token_address TEXT NOT NULL REFERENCES tokens(address),
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_wallet ON transactions(wallet_address, timestamp);

CREATE TABLE IF NOT EXISTS transaction_amounts (
    transaction_hash TEXT NOT NULL REFERENCES transactions(hash),
    to_address TEXT NOT NULL CHECK (to_address <> ''),
    amount TEXT NOT NULL,
    PRIMARY KEY (transaction_hash, to_address)
);

CREATE TABLE IF NOT EXISTS deliveries (
    chat_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL CHECK (message_id > 0),
    transaction_hash TEXT NOT NULL UNIQUE REFERENCES transactions(hash),
    delivered_at INTEGER NOT NULL,
    PRIMARY KEY (chat_id, message_id)
);
"#;
