//! Object store boundary.
//!
//! The relay keeps no state of its own: jobs and notifications live in an
//! external document store reached over JSON/HTTP, one client per collection
//! ("bucket"). This module defines the client contract, the filter documents
//! used to query it, a typed wrapper, and the HTTP and in-memory clients.

pub mod collection;
pub mod http;
pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use collection::{Collection, Stored};
pub use http::HttpStoreClient;
pub use in_memory::{InMemoryStoreClient, StoreCalls};
pub use query::{Condition, Query, ID_FIELD};
pub use r#trait::{StoreClient, StoreError, StoreOperation, StoredObject};
