//! BRAIN platform client: session management and resilient catalog access.
//!
//! This crate provides:
//! - Cookie-session authentication with a bounded login retry loop
//! - A two-tier retrying request executor (local retries, then re-login)
//! - Paginated draining of the `/data-fields` catalog
//!
//! Used by `brain-gen` to feed the alpha expression generator.

pub mod executor;
pub mod fields;
pub mod session;

// Re-export main types and clients
pub use executor::{RequestError, RequestExecutor, RetryPolicy};
pub use fields::{
    DataField, DataFieldQuery, DatasetRef, FieldFetcher, DEFAULT_PAGE_SIZE,
    DEFAULT_SEARCH_RESULT_CAP,
};
pub use session::{
    AuthError, Credentials, Session, SessionManager, SessionProvider, DEFAULT_BASE_URL,
};
