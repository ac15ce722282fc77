use thiserror::Error;

/// Spreadsheet decode/encode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to parse spreadsheet: {0}")]
    Decode(#[from] calamine::Error),
    #[error("failed to write spreadsheet: {0}")]
    Encode(#[from] rust_xlsxwriter::XlsxError),
}

/// Failures talking to the remote document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote write rejected: {0}")]
    Rejected(String),
}

/// A pipeline run failure. Validation errors abort before any remote call;
/// a store error aborts the remaining rows but leaves completed inserts in
/// place.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}
