use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use gymintel_scraper::coordinator::{
    wait_for_outcome, FetchCoordinator, FetchHandle, SharedFetchError,
};
use gymintel_scraper::domain::SearchResult;
use gymintel_scraper::types::Coordinates;

fn result_for(location_key: &str, total: usize) -> Arc<SearchResult> {
    Arc::new(SearchResult {
        location_key: location_key.to_string(),
        coordinates: Coordinates::new(39.7392, -104.9903).unwrap(),
        radius_miles: 10.0,
        timestamp: Utc::now(),
        gyms: vec![],
        total_results: total,
        per_provider_counts: vec![],
        merged_count: 0,
        avg_confidence: 0.0,
        execution_time_seconds: 0.5,
    })
}

#[tokio::test]
async fn test_many_waiters_share_one_owner_result() -> Result<()> {
    let coordinator = FetchCoordinator::new();

    let owner = match coordinator.acquire_or_join("denver, colorado") {
        FetchHandle::Owner(guard) => guard,
        FetchHandle::Joined(_) => panic!("first caller must own the fetch"),
    };

    // Ten concurrent waiters across tasks
    let mut waiters = Vec::new();
    for _ in 0..10 {
        let rx = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("only one owner per key"),
        };
        waiters.push(tokio::spawn(async move {
            wait_for_outcome(rx, Duration::from_secs(2)).await
        }));
    }

    // Owner finishes its fetch in the background
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        owner.complete(Ok(result_for("denver, colorado", 7)));
    });

    for waiter in waiters {
        let result = waiter.await??;
        assert_eq!(result.total_results, 7);
    }

    // Key freed: the next caller owns a fresh fetch
    assert_eq!(coordinator.in_flight_count(), 0);
    assert!(matches!(
        coordinator.acquire_or_join("denver, colorado"),
        FetchHandle::Owner(_)
    ));

    Ok(())
}

#[tokio::test]
async fn test_distinct_keys_fetch_independently() {
    let coordinator = FetchCoordinator::new();

    let denver = coordinator.acquire_or_join("denver, colorado");
    let austin = coordinator.acquire_or_join("austin, texas");

    assert!(matches!(denver, FetchHandle::Owner(_)));
    assert!(matches!(austin, FetchHandle::Owner(_)));
    assert_eq!(coordinator.in_flight_count(), 2);
}

#[tokio::test]
async fn test_owner_error_reaches_every_waiter() -> Result<()> {
    let coordinator = FetchCoordinator::new();

    let owner = match coordinator.acquire_or_join("austin, texas") {
        FetchHandle::Owner(guard) => guard,
        FetchHandle::Joined(_) => panic!("first caller must own the fetch"),
    };

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let rx = match coordinator.acquire_or_join("austin, texas") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("only one owner per key"),
        };
        waiters.push(tokio::spawn(async move {
            wait_for_outcome(rx, Duration::from_secs(2)).await
        }));
    }

    owner.complete(Err(SharedFetchError::new("all providers unavailable")));

    for waiter in waiters {
        let err = waiter.await?.unwrap_err();
        assert!(err.to_string().contains("all providers unavailable"));
    }

    // A failed fetch frees the key for an immediate retry
    assert!(matches!(
        coordinator.acquire_or_join("austin, texas"),
        FetchHandle::Owner(_)
    ));

    Ok(())
}

#[tokio::test]
async fn test_panicking_owner_task_never_strands_waiters() -> Result<()> {
    let coordinator = FetchCoordinator::new();

    let owner = match coordinator.acquire_or_join("denver, colorado") {
        FetchHandle::Owner(guard) => guard,
        FetchHandle::Joined(_) => panic!("first caller must own the fetch"),
    };
    let rx = match coordinator.acquire_or_join("denver, colorado") {
        FetchHandle::Joined(rx) => rx,
        FetchHandle::Owner(_) => panic!("only one owner per key"),
    };

    // Simulate the owning task dying mid-fetch: the guard drops without
    // completing and must release the waiters
    let owner_task = tokio::spawn(async move {
        let _guard = owner;
        panic!("provider exploded");
    });
    assert!(owner_task.await.is_err());

    let err = wait_for_outcome(rx, Duration::from_secs(2)).await.unwrap_err();
    assert!(err.to_string().contains("abandoned"));
    assert_eq!(coordinator.in_flight_count(), 0);

    Ok(())
}
