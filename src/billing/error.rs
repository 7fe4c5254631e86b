//! Billing-specific error types.

use crate::error::{EshtarekError, FieldErrors};
use std::fmt;
use uuid::Uuid;

/// Billing-specific errors.
///
/// Converted to [`EshtarekError`] at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Plan errors
    /// The specified plan was not found.
    PlanNotFound { plan_id: i64 },
    /// The plan exists but is not offered anymore.
    PlanInactive { plan_id: i64 },
    /// The plan is referenced by subscriptions and cannot be deleted.
    PlanInUse { plan_id: i64 },
    /// Another plan already uses this name.
    PlanNameTaken { name: String },

    // Subscription errors
    /// Subscription not found or not visible to the caller.
    SubscriptionNotFound { subscription_id: i64 },
    /// The tenant already has an active subscription.
    ActiveSubscriptionExists { tenant_id: Uuid },
    /// The tenant named in a request does not exist.
    TenantNotFound { tenant_id: Uuid },
    /// The caller may not act on behalf of this tenant.
    TenantNotAllowed { tenant_id: Uuid },
    /// The operation needs a tenant admin or platform admin.
    TenantAdminRequired,

    // Invoice errors
    /// Invoice not found or not visible to the caller.
    InvoiceNotFound { invoice_id: i64 },
    /// The invoice has already been settled.
    InvoiceAlreadyPaid { invoice_id: i64 },
    /// The invoice was voided.
    InvoiceVoid { invoice_id: i64 },
    /// The payment amount does not match the invoice amount.
    AmountMismatch { expected: i64, actual: i64 },
    /// The payment attempt was declined.
    PaymentDeclined { invoice_id: i64 },

    // Idempotency errors
    /// The idempotency key was already used for a different invoice.
    IdempotencyKeyReused { key: String, invoice_id: i64 },
    /// The idempotency key is malformed.
    InvalidIdempotencyKey { reason: String },

    // Webhook errors
    /// The webhook event type is not understood.
    UnknownWebhookEvent { event_type: String },

    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanNotFound { plan_id } => write!(f, "Plan not found: {}", plan_id),
            Self::PlanInactive { plan_id } => write!(f, "Plan {} is not active", plan_id),
            Self::PlanInUse { plan_id } => {
                write!(f, "Plan {} is in use by subscriptions and cannot be deleted", plan_id)
            }
            Self::PlanNameTaken { .. } => write!(f, "plan with this name already exists."),
            Self::SubscriptionNotFound { subscription_id } => {
                write!(f, "Subscription not found: {}", subscription_id)
            }
            Self::ActiveSubscriptionExists { .. } => {
                write!(f, "This tenant already has an active subscription.")
            }
            Self::TenantNotFound { tenant_id } => write!(f, "Tenant not found: {}", tenant_id),
            Self::TenantNotAllowed { .. } => write!(f, "Not allowed for this tenant"),
            Self::TenantAdminRequired => {
                write!(f, "You do not have permission to perform this action.")
            }
            Self::InvoiceNotFound { invoice_id } => write!(f, "Invoice not found: {}", invoice_id),
            Self::InvoiceAlreadyPaid { .. } => write!(f, "Invoice already paid"),
            Self::InvoiceVoid { .. } => write!(f, "Invoice is void"),
            Self::AmountMismatch { expected, actual } => write!(
                f,
                "Payment amount {} does not match invoice amount {}",
                actual, expected
            ),
            Self::PaymentDeclined { .. } => write!(f, "Payment declined (simulated)"),
            Self::IdempotencyKeyReused { invoice_id, .. } => write!(
                f,
                "Idempotency key was already used for invoice {}",
                invoice_id
            ),
            Self::InvalidIdempotencyKey { reason } => {
                write!(f, "Invalid Idempotency-Key: {}", reason)
            }
            Self::UnknownWebhookEvent { event_type } => {
                write!(f, "Unsupported webhook event type: {}", event_type)
            }
            Self::Internal { message } => write!(f, "Internal billing error: {}", message),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for EshtarekError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::PlanNotFound { .. }
            | BillingError::SubscriptionNotFound { .. }
            | BillingError::InvoiceNotFound { .. } => EshtarekError::NotFound(err.to_string()),

            BillingError::PlanNameTaken { .. } => {
                EshtarekError::Validation(FieldErrors::single("name", err.to_string()))
            }
            BillingError::ActiveSubscriptionExists { .. } | BillingError::TenantNotFound { .. } => {
                EshtarekError::Validation(FieldErrors::single("tenant", err.to_string()))
            }
            BillingError::PlanInactive { .. } => {
                EshtarekError::Validation(FieldErrors::single("plan", err.to_string()))
            }

            BillingError::TenantNotAllowed { .. } | BillingError::TenantAdminRequired => {
                EshtarekError::Forbidden(err.to_string())
            }

            BillingError::PlanInUse { .. } | BillingError::IdempotencyKeyReused { .. } => {
                EshtarekError::Conflict(err.to_string())
            }

            BillingError::PaymentDeclined { .. } => EshtarekError::PaymentRequired(err.to_string()),

            BillingError::InvoiceAlreadyPaid { .. }
            | BillingError::InvoiceVoid { .. }
            | BillingError::AmountMismatch { .. }
            | BillingError::InvalidIdempotencyKey { .. }
            | BillingError::UnknownWebhookEvent { .. } => EshtarekError::BadRequest(err.to_string()),

            BillingError::Internal { .. } => EshtarekError::Internal(err.to_string()),
        }
    }
}

impl BillingError {
    /// Errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BillingError::InvoiceAlreadyPaid { invoice_id: 3 }.to_string(),
            "Invoice already paid"
        );
        assert_eq!(
            BillingError::ActiveSubscriptionExists { tenant_id: Uuid::nil() }.to_string(),
            "This tenant already has an active subscription."
        );
        assert_eq!(
            BillingError::IdempotencyKeyReused { key: "k".into(), invoice_id: 9 }.to_string(),
            "Idempotency key was already used for invoice 9"
        );
    }

    #[test]
    fn test_convert_to_http_error() {
        let cases = [
            (BillingError::InvoiceNotFound { invoice_id: 1 }, StatusCode::NOT_FOUND),
            (BillingError::InvoiceAlreadyPaid { invoice_id: 1 }, StatusCode::BAD_REQUEST),
            (BillingError::PaymentDeclined { invoice_id: 1 }, StatusCode::PAYMENT_REQUIRED),
            (
                BillingError::IdempotencyKeyReused { key: "k".into(), invoice_id: 1 },
                StatusCode::CONFLICT,
            ),
            (BillingError::PlanInUse { plan_id: 1 }, StatusCode::CONFLICT),
            (BillingError::TenantAdminRequired, StatusCode::FORBIDDEN),
            (
                BillingError::Internal { message: "x".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(EshtarekError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_active_subscription_is_a_tenant_field_error() {
        let err: EshtarekError = BillingError::ActiveSubscriptionExists { tenant_id: Uuid::nil() }.into();
        match err {
            EshtarekError::Validation(fields) => assert!(fields.get("tenant").is_some()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(BillingError::PaymentDeclined { invoice_id: 1 }.is_client_error());
        assert!(BillingError::Internal { message: "x".into() }.is_server_error());
    }
}
