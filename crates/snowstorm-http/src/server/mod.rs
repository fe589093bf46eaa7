//! HTTP surface over [`IdFactory`].
//!
//! Every route answers `GET` with a JSON array of ids. The optional query
//! parameter `n` sets the count (default 1, first value wins when repeated);
//! a non-numeric `n` or one above the configured maximum is rejected with
//! `400 {"error": "..."}`.
//!
//! | Path              | Layout                                        |
//! |-------------------|-----------------------------------------------|
//! | `/`               | 10 server bits, 12 sequence bits              |
//! | `/{srv}/{seq}`    | `srv` in 1..=13, `seq` in 0..=13, if they fit |
//! | `/internal/stats` | `{"server-id": N}`                            |
//!
//! Any other path is a 404.

pub mod config;


use crate::ApiError;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Serialize;
use snowstorm::{IdFactory, Layout, TimeSource, WallClock};
use std::sync::Arc;

/// Largest server field exposed as a route.
pub const MAX_ROUTE_SERVER_BITS: u32 = 13;

/// Largest sequence field exposed as a route.
pub const MAX_ROUTE_SEQUENCE_BITS: u32 = 13;

struct Endpoint<T> {
    factory: IdFactory<T>,
    max_n: usize,
}

#[derive(Serialize)]
struct Stats {
    #[serde(rename = "server-id")]
    server_id: i64,
}

/// Builds the router for one server identity on the wall clock.
pub fn router(server_id: i64, max_n: usize) -> Router {
    router_with_time(server_id, max_n, WallClock::default())
}

/// Builds the router with every route sharing a copy of `time`.
pub fn router_with_time<T>(server_id: i64, max_n: usize, time: T) -> Router
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    let mut router = Router::new();

    for server_bits in 1..=MAX_ROUTE_SERVER_BITS {
        for sequence_bits in 0..=MAX_ROUTE_SEQUENCE_BITS {
            let Ok(layout) = Layout::new(server_bits, sequence_bits) else {
                continue;
            };
            router = router.route(
                &format!("/{server_bits}/{sequence_bits}"),
                endpoint(server_id, layout, max_n, time.clone()),
            );
        }
    }

    router
        .route(
            "/",
            endpoint(server_id, Layout::default(), max_n, time.clone()),
        )
        .route(
            "/internal/stats",
            get(move || async move { Json(Stats { server_id }) }),
        )
}

fn endpoint<T>(
    server_id: i64,
    layout: Layout,
    max_n: usize,
    time: T,
) -> axum::routing::MethodRouter
where
    T: TimeSource + Send + Sync + 'static,
{
    let endpoint = Arc::new(Endpoint {
        factory: IdFactory::with_time(server_id, layout, time),
        max_n,
    });
    get(ids::<T>).with_state(endpoint)
}

async fn ids<T>(
    State(endpoint): State<Arc<Endpoint<T>>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<i64>>, ApiError>
where
    T: TimeSource + Send + Sync + 'static,
{
    let Query(params) = query?;
    let first_n = params.iter().find(|(key, _)| key == "n");
    let n = match first_n.map(|(_, value)| value.as_str()) {
        None | Some("") => 1,
        Some(raw) => raw.parse::<usize>()?,
    };
    if n > endpoint.max_n {
        return Err(ApiError::TooMany {
            max: endpoint.max_n,
        });
    }
    Ok(Json(endpoint.factory.id_n(n)))
}
