//! Typed error hierarchy for the site back end.
//!
//! Three top-level enums cover the three subsystems:
//! - `EnrollmentError`: plan validation, gateway and pending-store failures
//! - `MailError`: contact form delivery failures
//! - `ImageError`: kitchen image generation failures

use thiserror::Error;

/// Errors from the enrollment subsystem (initiator, simulator, store).
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Subscription end date overflows for period '{period}'")]
    DateOverflow { period: String },

    #[error("Plan '{name}' not found in catalog")]
    UnknownPlan { name: String },

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Pending enrollment store error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Failed to build redirect URL: {0}")]
    RedirectUrl(#[from] url::ParseError),
}

/// Errors from the contact mailer.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the kitchen image generator.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image generation token not configured")]
    MissingToken,

    #[error("Image API returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Image API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_error_invalid_plan_carries_message() {
        let err = EnrollmentError::InvalidPlan("price must be positive".to_string());
        match &err {
            EnrollmentError::InvalidPlan(msg) => assert_eq!(msg, "price must be positive"),
            _ => panic!("Expected InvalidPlan"),
        }
        assert!(err.to_string().contains("price must be positive"));
    }

    #[test]
    fn enrollment_error_converts_from_url_parse_error() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: EnrollmentError = parse_err.into();
        assert!(matches!(err, EnrollmentError::RedirectUrl(_)));
    }

    #[test]
    fn enrollment_error_storage_keeps_source() {
        use std::error::Error as _;
        let err = EnrollmentError::Storage(anyhow::anyhow!("disk full"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn mail_error_invalid_address_names_address() {
        let err = MailError::InvalidAddress {
            address: "nobody".to_string(),
            message: "missing domain".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid address 'nobody': missing domain");
    }

    #[test]
    fn image_error_upstream_status_carries_code() {
        let err = ImageError::UpstreamStatus { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&EnrollmentError::Gateway("x".into()));
        assert_std_error(&MailError::Delivery("x".into()));
        assert_std_error(&ImageError::MissingToken);
    }
}
