//! Coordinator service for the place-order transaction.
//!
//! Exposes the same order placement through two protocols, two-phase commit
//! and saga, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Resource;
use metrics_exporter_prometheus::PrometheusHandle;
use participants::{
    CoordinatorConfig, HttpSagaParticipant, HttpTwoPhaseParticipant, InMemorySagaParticipant,
    InMemoryTwoPhaseParticipant, SagaParticipant, TwoPhaseParticipant,
};
use saga::SagaOrchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use two_phase::TwoPhaseCoordinator;

use config::Config;
use error::ConfigError;
pub use routes::transaction::AppState;

/// State talking to real resource managers over HTTP.
pub type HttpAppState = AppState<HttpTwoPhaseParticipant, HttpSagaParticipant>;

/// State backed by in-process resource managers.
pub type InMemoryAppState = AppState<InMemoryTwoPhaseParticipant, InMemorySagaParticipant>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<T, S>(state: Arc<AppState<T, S>>, metrics_handle: PrometheusHandle) -> Router
where
    T: TwoPhaseParticipant + 'static,
    S: SagaParticipant + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/transaction/2pc/order",
            post(routes::transaction::two_phase_order::<T, S>),
        )
        .route(
            "/transaction/saga/order",
            post(routes::transaction::saga_order::<T, S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds HTTP clients for every resource manager named in `config`.
pub fn create_state(config: &Config) -> Result<Arc<HttpAppState>, ConfigError> {
    let timeout = config.resource_manager_timeout;
    let two_phase = |resource: Resource| {
        HttpTwoPhaseParticipant::new(resource, &config.two_phase_url(resource), timeout)
    };
    let saga =
        |resource: Resource| HttpSagaParticipant::new(resource, &config.saga_url(resource), timeout);

    for resource in Resource::ALL {
        tracing::info!(
            %resource,
            two_phase_url = %config.two_phase_url(resource),
            saga_url = %config.saga_url(resource),
            "resource manager configured"
        );
    }

    Ok(Arc::new(AppState {
        two_phase: TwoPhaseCoordinator::with_config(
            two_phase(Resource::Order)?,
            two_phase(Resource::Inventory)?,
            two_phase(Resource::Payment)?,
            config.coordinator_config(),
        ),
        saga: SagaOrchestrator::with_config(
            saga(Resource::Order)?,
            saga(Resource::Inventory)?,
            saga(Resource::Payment)?,
            config.coordinator_config(),
        ),
    }))
}

/// In-process resource managers, returned alongside the state so callers can
/// inject failures and inspect what the coordinators did.
pub struct InMemoryResources {
    pub two_phase: [InMemoryTwoPhaseParticipant; 3],
    pub saga: [InMemorySagaParticipant; 3],
}

/// Creates state backed by in-memory resource managers, indexed in
/// [`Resource::ALL`] order.
pub fn create_in_memory_state(
    config: CoordinatorConfig,
) -> (Arc<InMemoryAppState>, InMemoryResources) {
    let two_phase = Resource::ALL.map(InMemoryTwoPhaseParticipant::new);
    let saga = Resource::ALL.map(InMemorySagaParticipant::new);

    let [order, inventory, payment] = two_phase.clone();
    let two_phase_coordinator =
        TwoPhaseCoordinator::with_config(order, inventory, payment, config);
    let [order, inventory, payment] = saga.clone();
    let saga_orchestrator = SagaOrchestrator::with_config(order, inventory, payment, config);

    let state = Arc::new(AppState {
        two_phase: two_phase_coordinator,
        saga: saga_orchestrator,
    });
    (state, InMemoryResources { two_phase, saga })
}
