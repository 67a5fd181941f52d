use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use super::clock::Delay;
use super::gateway::{EnrollmentGateway, GatewayInit};
use super::initiator::{EnrollmentInitiator, EnrollmentRequest};
use super::plans::Plan;
use super::store::{PendingEnrollment, PendingStore};
use crate::errors::EnrollmentError;

/// `message` query value on the simulated return leg.
pub const SUCCESS_REDIRECT_MESSAGE: &str = "enrollment completed successfully";

#[derive(Debug, Clone, Copy)]
pub struct SimulatorTiming {
    /// Stand-in for the init call's network latency.
    pub init_delay: Duration,
    /// Stand-in for the cardholder filling in the enabler's form.
    pub confirm_delay: Duration,
}

impl Default for SimulatorTiming {
    fn default() -> Self {
        Self {
            init_delay: Duration::from_millis(1000),
            confirm_delay: Duration::from_millis(2000),
        }
    }
}

/// Outcome of a simulated enrollment: where to send the browser next.
#[derive(Debug, Clone)]
pub struct SimulatedRedirect {
    pub request: EnrollmentRequest,
    pub init: GatewayInit,
    pub location: Url,
}

/// Plays both sides of the redirect out to the payment enabler.
pub struct EnrollmentSimulator {
    initiator: EnrollmentInitiator,
    gateway: Arc<dyn EnrollmentGateway>,
    store: Arc<dyn PendingStore>,
    delay: Arc<dyn Delay>,
    callback_url: Url,
    timing: SimulatorTiming,
}

impl EnrollmentSimulator {
    pub fn new(
        initiator: EnrollmentInitiator,
        gateway: Arc<dyn EnrollmentGateway>,
        store: Arc<dyn PendingStore>,
        delay: Arc<dyn Delay>,
        callback_url: Url,
        timing: SimulatorTiming,
    ) -> Self {
        Self {
            initiator,
            gateway,
            store,
            delay,
            callback_url,
            timing,
        }
    }

    /// Run one enrollment attempt. Single shot: errors are returned and no
    /// redirect is produced.
    pub async fn simulate(&self, plan: &Plan) -> Result<SimulatedRedirect, EnrollmentError> {
        let request = self.initiator.build(plan)?;
        info!(
            plan = %plan.name,
            buy_order = %request.buy_order,
            amount = request.amount,
            "starting PatPass enrollment"
        );
        tracing::debug!(payload = ?request.to_init_payload(), "init payload");

        self.delay.sleep(self.timing.init_delay).await;
        let init = self.gateway.init(&request).await?;

        let pending = PendingEnrollment {
            plan: plan.name.clone(),
            amount: plan.price,
            buy_order: request.buy_order.clone(),
            session_id: request.session_id.clone(),
            timestamp: self.initiator.ids().clock().now_millis(),
        };
        let replaced = self
            .store
            .set(pending)
            .await
            .map_err(EnrollmentError::Storage)?;
        if let Some(previous) = replaced {
            warn!(
                orphaned_buy_order = %previous.buy_order,
                buy_order = %request.buy_order,
                "pending enrollment overwritten by a newer attempt"
            );
        }

        self.delay.sleep(self.timing.confirm_delay).await;

        let mut location = self.callback_url.clone();
        location
            .query_pairs_mut()
            .append_pair("status", "success")
            .append_pair("token", &init.token)
            .append_pair("tbk_token", &self.initiator.ids().tbk_token())
            .append_pair("message", SUCCESS_REDIRECT_MESSAGE);

        info!(buy_order = %request.buy_order, location = %location, "redirecting to callback");
        Ok(SimulatedRedirect {
            request,
            init,
            location,
        })
    }
}
