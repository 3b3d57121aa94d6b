//! Create-and-confirm saga endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use saga::{CreateAndConfirmOrder, CustomerDirectory, OrderGateway, SagaOrchestrator, SagaOutcome};

use crate::error::ApiError;

/// POST /orchestrator/create-and-confirm-order
#[tracing::instrument(skip(orchestrator, payload))]
pub async fn create_and_confirm<C, O>(
    State(orchestrator): State<Arc<SagaOrchestrator<C, O>>>,
    payload: Result<Json<CreateAndConfirmOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<SagaOutcome>), ApiError>
where
    C: CustomerDirectory + 'static,
    O: OrderGateway + 'static,
{
    let Json(request) = payload?;
    let outcome = orchestrator.create_and_confirm_order(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
