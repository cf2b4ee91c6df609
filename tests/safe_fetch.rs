//! Cache tiering, validation fallback and defaults through safe fetch.

use data_gateway::{FetchOutcome, UpstreamError};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

#[tokio::test(start_paused = true)]
async fn test_live_tier_expires_before_stale_tier() {
    let ctx = common::context_with(common::upstream(0, 5));
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = Arc::new(common::counting_fetch(calls.clone(), |n| async move {
        if n == 0 {
            Ok(json!({ "price": 2.5 }))
        } else {
            Err(UpstreamError::Network("connection reset".into()))
        }
    }));

    // token-price lives for 300 s, its stale shadow for 1200 s.
    let f = fetch.clone();
    let first = ctx.safe_fetch("defillama", "coins:price:eth", "token-price", move |t| f(t)).await;
    assert_eq!(first, FetchOutcome::Fresh(json!({ "price": 2.5 })));

    let f = fetch.clone();
    let second = ctx.safe_fetch("defillama", "coins:price:eth", "token-price", move |t| f(t)).await;
    assert_eq!(second, FetchOutcome::Cached(json!({ "price": 2.5 })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(301)).await;
    let f = fetch.clone();
    let third = ctx.safe_fetch("defillama", "coins:price:eth", "token-price", move |t| f(t)).await;
    let rendered = third.into_json();
    assert_eq!(rendered["price"], json!(2.5));
    assert_eq!(rendered["_stale"], json!(true));
    assert!(rendered["_stale_reason"].as_str().unwrap().contains("connection reset"));

    tokio::time::advance(Duration::from_secs(900)).await;
    let f = fetch.clone();
    let fourth = ctx.safe_fetch("defillama", "coins:price:eth", "token-price", move |t| f(t)).await;
    let rendered = fourth.into_json();
    assert_eq!(rendered["_unavailable"], json!(true));
    assert_eq!(rendered["price"], json!(0));
}

#[tokio::test(start_paused = true)]
async fn test_suspicious_drop_serves_previous_value() {
    let ctx = common::context_with(common::upstream(0, 5));
    ctx.cache()
        .set("coingecko:markets:bitcoin", &json!({ "current_price": 60_000.0, "market_cap": 1.2e12 }), 60)
        .await;
    tokio::time::advance(Duration::from_secs(61)).await;

    let outcome = ctx
        .safe_fetch("defillama", "coingecko:markets:bitcoin", "market-data", |_| async {
            Ok(json!({ "current_price": 60_100.0, "market_cap": 1.0e9 }))
        })
        .await;

    match outcome {
        FetchOutcome::Stale { value, reason, .. } => {
            assert_eq!(value["market_cap"], json!(1.2e12));
            assert!(reason.contains("suspicious drop in market_cap"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_adapter_marked_unavailable_is_not_cached() {
    let ctx = common::context_with(common::upstream(0, 5));

    let outcome = ctx
        .safe_fetch("defillama", "defillama:tvl:gone", "protocol-tvl", |_| async {
            Ok(json!({ "error": "protocol not found", "_unavailable": true }))
        })
        .await;

    assert_eq!(
        outcome,
        FetchOutcome::Unavailable {
            value: json!({ "tvl": 0 }),
            reason: "validation failed: upstream reported error: protocol not found".into(),
        }
    );
    assert!(ctx.cache().get("defillama:tvl:gone").await.is_none());
    assert!(ctx.cache().get_stale("defillama:tvl:gone").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_permanent_errors_are_not_retried() {
    let ctx = common::context_with(common::upstream(3, 5));
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = common::counting_fetch(calls.clone(), |_| async {
        Err(UpstreamError::http(404, "no such coin"))
    });

    let outcome = ctx.safe_fetch("defillama", "coins:price:nope", "token-price", fetch).await;

    assert!(matches!(outcome, FetchOutcome::Unavailable { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_removes_both_tiers() {
    let ctx = common::context_with(common::upstream(0, 5));
    let outcome = ctx
        .safe_fetch("defillama", "defillama:tvl:aave", "protocol-tvl", |_| async {
            Ok(json!({ "tvl": 9_000_000 }))
        })
        .await;
    assert!(!outcome.is_degraded());

    assert!(ctx.cache().invalidate("defillama:tvl:aave").await);
    assert!(ctx.cache().get("defillama:tvl:aave").await.is_none());
    assert!(ctx.cache().get_stale("defillama:tvl:aave").await.is_none());
    assert!(!ctx.cache().invalidate("defillama:tvl:aave").await);
}
