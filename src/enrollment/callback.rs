//! The return leg: deciding how an enrollment attempt ended.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use super::gateway::{EnrollmentGateway, Verdict};
use super::simulator::SUCCESS_REDIRECT_MESSAGE;
use super::store::{PendingEnrollment, PendingStore};

pub const NO_TRANSACTION_MESSAGE: &str = "no transaction data found";
pub const RETRY_MESSAGE: &str = "enrollment could not be completed, retry";
pub const PROCESSING_ERROR_MESSAGE: &str = "error processing the payment system response";
pub const LANDING_ERROR_MESSAGE: &str = "enrollment error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDetails {
    pub plan: String,
    pub amount: i64,
    pub buy_order: String,
    pub session_id: String,
}

impl From<&PendingEnrollment> for EnrollmentDetails {
    fn from(p: &PendingEnrollment) -> Self {
        Self {
            plan: p.plan.clone(),
            amount: p.amount,
            buy_order: p.buy_order.clone(),
            session_id: p.session_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EnrollmentDetails>,
}

impl EnrollmentResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn succeeded(pending: &PendingEnrollment) -> Self {
        Self {
            success: true,
            message: format!("enrollment succeeded for plan {}", pending.plan),
            details: Some(EnrollmentDetails::from(pending)),
        }
    }
}

pub struct CallbackProcessor {
    gateway: Arc<dyn EnrollmentGateway>,
    store: Arc<dyn PendingStore>,
}

impl CallbackProcessor {
    pub fn new(gateway: Arc<dyn EnrollmentGateway>, store: Arc<dyn PendingStore>) -> Self {
        Self { gateway, store }
    }

    /// Interpret one return from the payment enabler.
    ///
    /// Never fails: every problem becomes a non-success result. A rejected
    /// attempt leaves the pending record in place for a retry.
    pub async fn process(&self, token: &str, tbk_token: &str) -> EnrollmentResult {
        let pending = match self.store.get().await {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                warn!(%token, "callback without pending enrollment");
                return EnrollmentResult::failure(NO_TRANSACTION_MESSAGE);
            }
            Err(e) => {
                error!(error = %e, "failed to read pending enrollment");
                return EnrollmentResult::failure(PROCESSING_ERROR_MESSAGE);
            }
        };

        match self.gateway.confirm(token, tbk_token, &pending).await {
            Ok(Verdict::Confirmed) => {
                match self.store.clear_if(&pending.buy_order).await {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        buy_order = %pending.buy_order,
                        "pending enrollment replaced before it could be cleared"
                    ),
                    Err(e) => error!(error = %e, "failed to clear pending enrollment"),
                }
                info!(plan = %pending.plan, buy_order = %pending.buy_order, "enrollment confirmed");
                EnrollmentResult::succeeded(&pending)
            }
            Ok(Verdict::Rejected) => {
                info!(buy_order = %pending.buy_order, "enrollment rejected");
                EnrollmentResult::failure(RETRY_MESSAGE)
            }
            Err(e) => {
                error!(error = %e, buy_order = %pending.buy_order, "gateway confirmation failed");
                EnrollmentResult::failure(PROCESSING_ERROR_MESSAGE)
            }
        }
    }
}

/// Query parameters the payment enabler sends to the return URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnParams {
    pub token: Option<String>,
    pub tbk_token: Option<String>,
    pub tbk_orden_compra: Option<String>,
    pub tbk_id_sesion: Option<String>,
}

/// Where the return URL forwards the browser: the landing page, tagged with
/// the outcome the presentation layer looks for.
pub fn landing_redirect(landing: &Url, params: &ReturnParams) -> Url {
    let mut url = landing.clone();
    {
        let mut query = url.query_pairs_mut();
        match (non_empty(&params.token), non_empty(&params.tbk_token)) {
            (Some(token), Some(tbk_token)) => {
                query
                    .append_pair("status", "success")
                    .append_pair("token", token)
                    .append_pair("tbk_token", tbk_token)
                    .append_pair("message", SUCCESS_REDIRECT_MESSAGE);
            }
            _ => {
                query
                    .append_pair("status", "error")
                    .append_pair("message", LANDING_ERROR_MESSAGE);
            }
        }
    }
    url
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
