use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The response was empty")]
    EmptyResponse,
    #[error("Product {0} has no external mapping on the platform")]
    UnmappedProduct(i64),
}
