//! Seam between the enrollment flow and the payment enabler.
//!
//! Only [`MockGateway`] exists today: it synthesizes the init response and
//! decides confirmations with a weighted coin flip. A client for the real
//! PatPass API would implement the same trait.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ids::IdGenerator;
use super::initiator::EnrollmentRequest;
use super::store::PendingEnrollment;
use crate::errors::EnrollmentError;

pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// Response of the init call: where the cardholder signs the mandate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayInit {
    pub token: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirmed,
    Rejected,
}

#[async_trait]
pub trait EnrollmentGateway: Send + Sync {
    async fn init(&self, request: &EnrollmentRequest) -> Result<GatewayInit, EnrollmentError>;

    async fn confirm(
        &self,
        token: &str,
        tbk_token: &str,
        pending: &PendingEnrollment,
    ) -> Result<Verdict, EnrollmentError>;
}

/// Test-environment stand-in for the payment enabler.
///
/// Confirms with probability `success_rate`; this is a fixture, not a model
/// of the real service.
pub struct MockGateway {
    ids: Arc<IdGenerator>,
    base_url: String,
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl MockGateway {
    pub fn new(ids: Arc<IdGenerator>, base_url: impl Into<String>, success_rate: f64) -> Self {
        Self::with_rng(ids, base_url, success_rate, StdRng::from_os_rng())
    }

    pub fn seeded(
        ids: Arc<IdGenerator>,
        base_url: impl Into<String>,
        success_rate: f64,
        seed: u64,
    ) -> Self {
        Self::with_rng(ids, base_url, success_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        ids: Arc<IdGenerator>,
        base_url: impl Into<String>,
        success_rate: f64,
        rng: StdRng,
    ) -> Self {
        let success_rate = if success_rate.is_finite() {
            success_rate.clamp(0.0, 1.0)
        } else {
            warn!(success_rate, "non-finite success rate, using default");
            DEFAULT_SUCCESS_RATE
        };
        Self {
            ids,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            success_rate,
            rng: Mutex::new(rng),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    fn draw(&self) -> Result<f64, EnrollmentError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| EnrollmentError::Gateway("mock gateway rng lock poisoned".to_string()))?;
        Ok(rng.random::<f64>())
    }
}

#[async_trait]
impl EnrollmentGateway for MockGateway {
    async fn init(&self, request: &EnrollmentRequest) -> Result<GatewayInit, EnrollmentError> {
        let token = self.ids.gateway_token();
        let url = format!(
            "{}/webpay/patpass/init?token={}",
            self.base_url,
            self.ids.clock().now_millis()
        );
        debug!(buy_order = %request.buy_order, %token, "mock gateway init");
        Ok(GatewayInit { token, url })
    }

    async fn confirm(
        &self,
        token: &str,
        tbk_token: &str,
        pending: &PendingEnrollment,
    ) -> Result<Verdict, EnrollmentError> {
        let confirmed = self.draw()? < self.success_rate;
        debug!(
            %token,
            %tbk_token,
            buy_order = %pending.buy_order,
            confirmed,
            "mock gateway confirm"
        );
        Ok(if confirmed {
            Verdict::Confirmed
        } else {
            Verdict::Rejected
        })
    }
}
