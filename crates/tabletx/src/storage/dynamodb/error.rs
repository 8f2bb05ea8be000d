//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `tabletx_core::store`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use tabletx_core::store::{CancellationReason, StoreError};

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StoreError {
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("table").to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled("Throughput exceeded, please retry".to_string())
        }
        GetItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled("Request limit exceeded, please retry".to_string())
        }
        GetItemError::InternalServerError(_) => {
            StoreError::Transport("DynamoDB internal server error".to_string())
        }
        err => StoreError::Transport(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a BatchGetItem SDK error to StoreError.
pub fn map_batch_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> StoreError {
    match err.into_service_error() {
        BatchGetItemError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("table").to_string())
        }
        BatchGetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled("Throughput exceeded, please retry".to_string())
        }
        BatchGetItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled("Request limit exceeded, please retry".to_string())
        }
        BatchGetItemError::InternalServerError(_) => {
            StoreError::Transport("DynamoDB internal server error".to_string())
        }
        err => StoreError::Transport(format!("BatchGetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StoreError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("table").to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled("Throughput exceeded, please retry".to_string())
        }
        QueryError::RequestLimitExceeded(_) => {
            StoreError::Throttled("Request limit exceeded, please retry".to_string())
        }
        QueryError::InternalServerError(_) => {
            StoreError::Transport("DynamoDB internal server error".to_string())
        }
        err => StoreError::Transport(format!("Query failed: {:?}", err)),
    }
}

/// Map a Scan SDK error to StoreError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
) -> StoreError {
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("table").to_string())
        }
        ScanError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled("Throughput exceeded, please retry".to_string())
        }
        ScanError::RequestLimitExceeded(_) => {
            StoreError::Throttled("Request limit exceeded, please retry".to_string())
        }
        ScanError::InternalServerError(_) => {
            StoreError::Transport("DynamoDB internal server error".to_string())
        }
        err => StoreError::Transport(format!("Scan failed: {:?}", err)),
    }
}

/// Map a TransactWriteItems SDK error to StoreError.
///
/// Cancellations keep their per-operation reasons, in request order.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
) -> StoreError {
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => {
            StoreError::TransactionCanceled {
                reasons: e
                    .cancellation_reasons()
                    .iter()
                    .map(|reason| CancellationReason {
                        code: reason.code().map(str::to_string),
                        message: reason.message().map(str::to_string),
                    })
                    .collect(),
            }
        }
        TransactWriteItemsError::ResourceNotFoundException(e) => {
            StoreError::ResourceNotFound(e.message().unwrap_or("table").to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled("Throughput exceeded, please retry".to_string())
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => {
            StoreError::Throttled("Request limit exceeded, please retry".to_string())
        }
        TransactWriteItemsError::TransactionInProgressException(_) => {
            StoreError::Throttled("Transaction in progress, please retry".to_string())
        }
        TransactWriteItemsError::InternalServerError(_) => {
            StoreError::Transport("DynamoDB internal server error".to_string())
        }
        err => StoreError::Transport(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Map a request builder error to StoreError.
pub fn map_build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::Validation(err.to_string())
}
