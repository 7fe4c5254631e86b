//! Request validation using the `validator` crate.
//!
//! [`ValidatedJson`] deserializes a JSON body and runs its `Validate` rules;
//! failures become [`EshtarekError::Validation`](crate::EshtarekError) with
//! per-field messages.

mod extractor;
pub mod validators;

pub use extractor::ValidatedJson;
pub use validators::{validate_email_or_blank, validate_features, validate_tenant_id};
