//! Storage backends.
//!
//! [`InMemoryStore`] implements both [`AccountStore`](crate::accounts::AccountStore)
//! and [`BillingStore`](crate::billing::BillingStore). Clones share state.

mod in_memory;

pub use in_memory::InMemoryStore;
