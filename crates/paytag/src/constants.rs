use std::time::Duration;

/// Default delay between ledger polls while a payment request is outstanding.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Decimal places of the ledger's native unit (1 coin = 10^9 units).
pub const NATIVE_DECIMALS: u32 = 9;

/// URI scheme for payment requests.
pub const REQUEST_URI_SCHEME: &str = "pay";

/// Key under which the transaction history is persisted.
pub const HISTORY_STORE_KEY: &str = "transactions";

/// Sentinel value for reserved passthrough fields on history records.
pub const PASSTHROUGH_SENTINEL: &str = "_";

/// Runtime ledger configuration. Decouples the engine from compile-time
/// constants so it can run against ledgers with other unit scales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Decimal places of the native unit.
    pub native_decimals: u32,
    /// Scheme of the request URI handed to the scannable-code renderer.
    pub uri_scheme: String,
    /// Key the transaction history is persisted under.
    pub history_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            native_decimals: NATIVE_DECIMALS,
            uri_scheme: REQUEST_URI_SCHEME.to_string(),
            history_key: HISTORY_STORE_KEY.to_string(),
        }
    }
}
