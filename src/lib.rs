/*!
# Intern Token Uploader

A browser-based form application for issuing verification tokens to intern
records, built in Rust.

## Overview

A user uploads a spreadsheet of intern records, the app previews the rows,
generates a random verification token per row, writes each row plus its
token to a hosted document database (Cloud Firestore), and then offers a
spreadsheet download containing the original data augmented with tokens and
verification links.

## Architecture

The application is a single axum server in front of a small library:

### Web Layer
- **Technologies**: axum, tokio, one static HTML page
- **Endpoints**:
  - `GET /` - Upload page
  - `POST /api/file` - Decode an uploaded workbook and preview its rows
  - `POST /api/upload` - Run the upload pipeline; responds with the export
    workbook as a file download
  - `GET /api/state` - Current session snapshot

### Pipeline Layer
- Token Generator - Fixed-length random alphanumeric strings
- Spreadsheet Codec - XLSX decode (calamine) and encode (rust_xlsxwriter)
- Row Upload Pipeline - Sequential per-row inserts, abort on first failure
- Export Assembler - Identity/token join plus verification links

### Store Layer
- `DocumentStore` trait with a Cloud Firestore REST implementation and an
  in-memory store for tests and dry runs

## Data Flow

file input → codec decode → preview → pipeline (token + insert per row) →
export assemble → codec encode → file download

## Modules

- **token**: Random token generation
- **codec**: Workbook decode/encode on byte buffers
- **store**: Document store trait and implementations
- **pipeline**: The per-row upload pipeline
- **export**: Token join, verification links, export workbook
- **app**: Routing, session state, handlers
- **config**: Environment-driven runtime configuration
- **error**: Error taxonomy (codec, store, upload)
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod store;
pub mod token;

/// Re-export the core types to make the library easier to use
pub use codec::Row;
pub use error::{CodecError, StoreError, UploadError};
pub use pipeline::TokenRecord;
pub use store::{DocumentStore, FirestoreStore, MemoryStore};
