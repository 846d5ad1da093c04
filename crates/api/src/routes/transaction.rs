//! Place-order endpoints for both coordination protocols.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::TransactionRequest;
use participants::{SagaParticipant, TwoPhaseParticipant};
use saga::SagaOrchestrator;
use two_phase::TwoPhaseCoordinator;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// All three resource managers of a protocol use the same client type.
pub struct AppState<T, S>
where
    T: TwoPhaseParticipant,
    S: SagaParticipant,
{
    pub two_phase: TwoPhaseCoordinator<T, T, T>,
    pub saga: SagaOrchestrator<S, S, S>,
}

fn validate(
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<TransactionRequest, ApiError> {
    let checked = payload.map_err(ApiError::from).and_then(|Json(request)| {
        if request.quantity <= 0 {
            return Err(ApiError::BadRequest("quantity must be positive".into()));
        }
        if !request.amount.is_positive() {
            return Err(ApiError::BadRequest("amount must be positive".into()));
        }
        Ok(request)
    });
    if let Err(err) = &checked {
        metrics::counter!("transaction_requests_rejected_total").increment(1);
        tracing::warn!(error = %err, "transaction request rejected");
    }
    checked
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// POST /transaction/2pc/order: place an order with two-phase commit.
pub async fn two_phase_order<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    T: TwoPhaseParticipant + 'static,
    S: SagaParticipant + 'static,
{
    let request = validate(payload)?;
    tracing::info!(
        user_id = request.user_id,
        product_id = request.product_id,
        quantity = request.quantity,
        amount = %request.amount,
        "2pc order requested"
    );

    let outcome = state.two_phase.place_order(&request).await;
    Ok((status_of(outcome.status_code), Json(outcome)).into_response())
}

/// POST /transaction/saga/order: place an order with the saga pattern.
pub async fn saga_order<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    T: TwoPhaseParticipant + 'static,
    S: SagaParticipant + 'static,
{
    let request = validate(payload)?;
    tracing::info!(
        user_id = request.user_id,
        product_id = request.product_id,
        quantity = request.quantity,
        amount = %request.amount,
        "saga order requested"
    );

    let run = state.saga.place_order(&request).await;
    Ok((status_of(run.outcome.status_code), Json(run)).into_response())
}
