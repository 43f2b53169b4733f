pub mod auth;
pub mod ledger;
pub mod order_validator;
pub mod price_generator;
pub mod sqlite_store;
pub mod trade_recorder;
pub mod trading;
pub mod valuator;

pub use auth::{AuthError, AuthService};
pub use ledger::{apply_order, LedgerUpdate};
pub use order_validator::validate_order;
pub use price_generator::PriceGenerator;
pub use sqlite_store::{PersistOutcome, SqliteStore, StoreError};
pub use trade_recorder::{compute_stats, TradeRecorder};
pub use trading::{ExecutionStage, TradingConfig, TradingError, TradingService};
