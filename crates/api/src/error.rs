//! API error types with HTTP response mapping.
//!
//! Every error body carries a machine-readable `error` code and a
//! human-readable `detail`. Stock failures add `available_stock` (and the
//! item at fault when checkout fails).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, InventoryError, OrderError};
use payments::PaymentError;
use projections::ProjectionError;
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No caller identity on the request.
    #[error("Caller identity is required")]
    Unauthorized,

    /// The caller is not an administrator.
    #[error("Administrator role is required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_stock: Option<u32>,
}

impl ErrorBody {
    fn new(error: &'static str, detail: impl ToString) -> Self {
        Self {
            error,
            detail: detail.to_string(),
            item_id: None,
            available_stock: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            err @ ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("unauthorized", err))
            }
            err @ ApiError::Forbidden => (StatusCode::FORBIDDEN, ErrorBody::new("forbidden", err)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new("not_found", msg)),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("validation_error", msg),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Projection(err) => internal(err),
        };

        (status, Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, ErrorBody) {
    let detail = err.to_string();
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidStatus { .. } | OrderError::InvalidTransition { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("invalid_status", detail),
            ),
            OrderError::NotCancellable { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("not_cancellable", detail),
            ),
            OrderError::NotPayable { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("not_payable", detail),
            ),
            OrderError::AlreadyPlaced => {
                (StatusCode::CONFLICT, ErrorBody::new("conflict", detail))
            }
            OrderError::NoLines
            | OrderError::MissingShippingAddress
            | OrderError::TotalOverflow => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("validation_error", detail),
            ),
        },
        DomainError::Cart(cart_err) => match cart_err {
            CartError::ExceedsAvailableStock { available, .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    available_stock: Some(available),
                    ..ErrorBody::new("insufficient_stock", detail)
                },
            ),
            CartError::LineNotFound { .. } => {
                (StatusCode::NOT_FOUND, ErrorBody::new("not_found", detail))
            }
            CartError::InvalidQuantity { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("validation_error", detail),
            ),
            CartError::Empty => (StatusCode::BAD_REQUEST, ErrorBody::new("empty_cart", detail)),
        },
        DomainError::Inventory(inventory_err) => match inventory_err {
            InventoryError::InsufficientStock {
                product_id,
                available,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    item_id: Some(product_id.to_string()),
                    available_stock: Some(available),
                    ..ErrorBody::new("insufficient_stock", detail)
                },
            ),
            InventoryError::NotListed { .. } => {
                (StatusCode::NOT_FOUND, ErrorBody::new("not_found", detail))
            }
            InventoryError::AlreadyListed { .. } => {
                (StatusCode::CONFLICT, ErrorBody::new("conflict", detail))
            }
            InventoryError::InvalidQuantity { .. }
            | InventoryError::InvalidPrice { .. }
            | InventoryError::QuantityOverflow { .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("validation_error", detail),
            ),
        },
        DomainError::EmptyCart => (StatusCode::BAD_REQUEST, ErrorBody::new("empty_cart", detail)),
        DomainError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, ErrorBody::new("not_found", detail))
        }
        DomainError::Conflict { .. } => {
            tracing::warn!(error = %detail, "unit of work gave up after repeated conflicts");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("conflict", detail),
            )
        }
        err @ (DomainError::EventStore(_) | DomainError::Serialization(_)) => internal(err),
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, ErrorBody) {
    let detail = err.to_string();
    match err {
        PaymentError::MissingSecret => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("missing_secret", detail),
        ),
        PaymentError::InvalidSignature { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("invalid_signature", detail),
        ),
        PaymentError::MalformedPayload(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("validation_error", detail),
        ),
        PaymentError::Gateway(_) => {
            tracing::error!(error = %detail, "payment gateway failed");
            (
                StatusCode::BAD_GATEWAY,
                ErrorBody::new("payment_gateway_error", detail),
            )
        }
        PaymentError::Domain(err) => domain_error_to_response(err),
    }
}

fn internal(err: impl std::fmt::Display) -> (StatusCode, ErrorBody) {
    tracing::error!(error = %err, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody::new("internal", "Internal server error"),
    )
}
