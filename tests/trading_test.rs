//! Integration tests for the trading engine
//!
//! Tests cover:
//! - Portfolio lifecycle against a file-backed store
//! - Order execution and valuation
//! - Concurrent orders for one user
//! - Trade history and statistics

use rust_decimal_macros::dec;
use simtrade::services::{
    PersistOutcome, PriceGenerator, SqliteStore, TradingConfig, TradingError, TradingService,
};
use simtrade::types::*;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("simtrade-test-{}.db", uuid::Uuid::new_v4()))
}

fn service_on(store: Arc<SqliteStore>) -> TradingService {
    let prices = Arc::new(PriceGenerator::with_seed(&["AAPL", "MSFT", "NVDA"], 9));
    TradingService::new(store, prices)
}

fn in_memory_service() -> TradingService {
    service_on(Arc::new(SqliteStore::new_in_memory().unwrap()))
}

fn order(symbol: &str, side: OrderSide, quantity: i64) -> PlaceOrderRequest {
    PlaceOrderRequest {
        symbol: symbol.to_string(),
        side,
        quantity,
        algorithm: None,
    }
}

// =============================================================================
// Persistence Tests
// =============================================================================

mod persistence_tests {
    use super::*;

    #[test]
    fn test_portfolio_survives_reopen() {
        let path = temp_db_path();

        {
            let service = service_on(Arc::new(SqliteStore::new(&path).unwrap()));
            service.create_portfolio("alice").unwrap();
            service.prices().set_price("AAPL", dec!(150));
            service
                .execute_order("alice", order("AAPL", OrderSide::Buy, 10))
                .unwrap();
        }

        let store = Arc::new(SqliteStore::new(&path).unwrap());
        let portfolio = store.get_portfolio("alice").unwrap().unwrap();
        assert_eq!(portfolio.cash, dec!(98500));
        assert_eq!(portfolio.holdings, vec![Holding::new("AAPL", 10, dec!(150))]);
        assert_eq!(store.list_trades("alice", None).unwrap().len(), 1);

        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_persisting_same_snapshot_is_idempotent() {
        let service = in_memory_service();
        service.create_portfolio("bob").unwrap();
        let holdings = vec![Holding::new("MSFT", 3, dec!(310.25))];

        let first = service
            .persist_portfolio("bob", dec!(5000), dec!(5930.75), &holdings)
            .unwrap();
        let second = service
            .persist_portfolio("bob", dec!(5000), dec!(5930.75), &holdings)
            .unwrap();

        assert_eq!(first, PersistOutcome::Updated);
        assert_eq!(second, PersistOutcome::Unchanged);

        let view = service.get_or_create_portfolio("bob").unwrap();
        assert_eq!(view.cash(), dec!(5000));
        assert_eq!(view.holdings(), holdings.as_slice());
    }

    #[test]
    fn test_persist_without_portfolio_is_skipped() {
        let service = in_memory_service();

        let outcome = service
            .persist_portfolio("ghost", dec!(1), dec!(1), &[])
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Missing);
        assert!(!service.get_or_create_portfolio("ghost").unwrap().is_materialized());
    }
}

// =============================================================================
// Execution Tests
// =============================================================================

mod execution_tests {
    use super::*;

    #[test]
    fn test_full_round_trip() {
        let service = in_memory_service();
        service.create_portfolio("carol").unwrap();

        service.prices().set_price("NVDA", dec!(400));
        service
            .execute_order("carol", order("NVDA", OrderSide::Buy, 5))
            .unwrap();
        service.prices().set_price("NVDA", dec!(420));

        // Unrealized gain shows up in the revalued total
        let view = service.get_or_create_portfolio("carol").unwrap();
        assert_eq!(view.cash(), dec!(98000));
        assert_eq!(view.total_value(), dec!(100100));

        let report = service
            .execute_order("carol", order("NVDA", OrderSide::Sell, 5))
            .unwrap();
        assert_eq!(report.portfolio.cash, dec!(100100));
        assert!(report.portfolio.holdings.is_empty());
        assert_eq!(report.trade.profit, dec!(100));
    }

    #[test]
    fn test_rejection_does_not_record_trade() {
        let service = in_memory_service();
        service.create_portfolio("dave").unwrap();
        service.prices().set_price("AAPL", dec!(200));

        let err = service
            .execute_order("dave", order("AAPL", OrderSide::Buy, 1_000))
            .unwrap_err();
        assert!(matches!(
            err,
            TradingError::InsufficientBalance { needed, available }
                if needed == dec!(200000) && available == dec!(100000)
        ));

        let view = service.get_or_create_portfolio("dave").unwrap();
        assert_eq!(view.cash(), DEFAULT_STARTING_CASH);
        assert_eq!(service.get_stats("dave").unwrap().total_trades, 0);
    }

    #[test]
    fn test_concurrent_orders_are_serialized() {
        let service = Arc::new(in_memory_service());
        service.create_portfolio("erin").unwrap();
        service.prices().set_price("MSFT", dec!(100));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let service = service.clone();
                scope.spawn(move || {
                    for _ in 0..5 {
                        service
                            .execute_order("erin", order("MSFT", OrderSide::Buy, 1))
                            .unwrap();
                    }
                });
            }
        });

        let portfolio = service
            .get_or_create_portfolio("erin")
            .unwrap()
            .into_portfolio()
            .unwrap();
        assert_eq!(portfolio.quantity_of("MSFT"), 40);
        assert_eq!(portfolio.cash, dec!(96000));
        assert_eq!(service.list_trades("erin", None).unwrap().len(), 40);
    }

    #[test]
    fn test_users_are_isolated() {
        let service = in_memory_service();
        service.create_portfolio("frank").unwrap();
        service.create_portfolio("grace").unwrap();

        service
            .execute_order("frank", order("AAPL", OrderSide::Buy, 2))
            .unwrap();

        assert!(service.get_or_create_portfolio("grace").unwrap().holdings().is_empty());
        assert!(service.list_trades("grace", None).unwrap().is_empty());
    }
}

// =============================================================================
// Statistics Tests
// =============================================================================

mod stats_tests {
    use super::*;

    #[test]
    fn test_stats_and_history_order() {
        let service = TradingService::with_config(
            Arc::new(SqliteStore::new_in_memory().unwrap()),
            Arc::new(PriceGenerator::with_seed(&["AAPL"], 1)),
            TradingConfig {
                recent_trades_limit: 2,
                ..TradingConfig::default()
            },
        );
        service.create_portfolio("heidi").unwrap();

        let fills = [
            (OrderSide::Buy, 10, dec!(100)),
            (OrderSide::Sell, 4, dec!(110)),
            (OrderSide::Sell, 6, dec!(90)),
        ];
        let mut ids = Vec::new();
        for (side, qty, price) in fills {
            service.prices().set_price("AAPL", price);
            ids.push(service.execute_order("heidi", order("AAPL", side, qty)).unwrap().trade_id);
        }

        let trades = service.list_trades("heidi", None).unwrap();
        let listed: Vec<String> = trades.iter().map(|t| t.id.clone()).collect();
        assert_eq!(listed, ids.iter().rev().cloned().collect::<Vec<_>>());
        assert_eq!(service.list_trades("heidi", Some(1)).unwrap().len(), 1);

        let stats = service.get_stats("heidi").unwrap();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.total_profit, dec!(40) + dec!(-60));
        assert!((stats.win_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.recent_trades.len(), 2);
        assert_eq!(stats.recent_trades[0].id, ids[2]);
        assert_eq!(stats.recent_trades[1].profit, dec!(40));
    }
}
