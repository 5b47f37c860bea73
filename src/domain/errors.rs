use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Order store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Order store must contain a JSON array of orders")]
    NotAnArray,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Request timed out after {0} seconds. The server is taking too long to respond.")]
    Timeout(u64),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("API Error: Status code {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("No orders found")]
    NoOrdersFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether the failure came from the remote API rather than local state.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, SyncError::NoOrdersFound | SyncError::Store(_))
    }
}
