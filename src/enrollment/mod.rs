//! Simulated PatPass (Webpay recurring payments) enrollment.
//!
//! ## Overview
//!
//! A visitor picks a plan; the site pretends to hand them to the payment
//! enabler and back. Nothing leaves the process: the gateway is a mock, the
//! latency is a configured delay, and the only state is a single pending
//! record bridging the two redirects.
//!
//! ```text
//!  POST /api/patpass/enroll
//!        │
//!        v
//!  simulator.rs ── initiator.rs  (Plan → EnrollmentRequest, ids.rs)
//!        │     ├── gateway.rs    (EnrollmentGateway::init)
//!        │     └── store.rs      (PendingStore::set)
//!        │ 303
//!        v
//!  GET /api/patpass/callback ── callback::landing_redirect ── 307 → landing page
//!        │
//!        v
//!  GET /api/patpass/result ── presentation::present
//!                               └── callback.rs (EnrollmentGateway::confirm,
//!                                               PendingStore::clear_if)
//! ```
//!
//! Time is injected through `clock.rs` so tests run the whole flow without
//! sleeping.

pub mod callback;
pub mod clock;
pub mod gateway;
pub mod ids;
pub mod initiator;
pub mod plans;
pub mod presentation;
pub mod simulator;
pub mod store;

use std::sync::Arc;

use url::Url;

use crate::errors::EnrollmentError;
use crate::site_config::PatPassSection;
use callback::CallbackProcessor;
use clock::{Clock, Delay};
use gateway::{EnrollmentGateway, MockGateway};
use ids::IdGenerator;
use initiator::{EnrollmentInitiator, MerchantProfile};
use simulator::{EnrollmentSimulator, SimulatorTiming};
use store::PendingStore;

/// Everything the HTTP layer needs to run the enrollment flow.
pub struct EnrollmentService {
    pub simulator: EnrollmentSimulator,
    pub processor: CallbackProcessor,
    pub store: Arc<dyn PendingStore>,
    /// Absolute URL of the page the callback route forwards to.
    pub landing_url: Url,
    pub public_base_url: Url,
}

impl EnrollmentService {
    /// Wire the flow with the mock gateway described by `config`.
    pub fn from_config(
        config: &PatPassSection,
        store: Arc<dyn PendingStore>,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, EnrollmentError> {
        let ids = Arc::new(IdGenerator::new(clock));
        let gateway: Arc<dyn EnrollmentGateway> = Arc::new(MockGateway::new(
            ids.clone(),
            config.gateway_base_url.clone(),
            config.success_rate,
        ));
        Self::with_gateway(config, ids, gateway, store, delay)
    }

    pub fn with_gateway(
        config: &PatPassSection,
        ids: Arc<IdGenerator>,
        gateway: Arc<dyn EnrollmentGateway>,
        store: Arc<dyn PendingStore>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, EnrollmentError> {
        let public_base_url = Url::parse(&config.public_base_url)?;
        let callback_url = public_base_url.join(&config.return_path)?;
        let landing_url = public_base_url.join(&config.landing_path)?;
        let logo_url = public_base_url.join(&config.logo_path)?;

        let initiator = EnrollmentInitiator::new(
            ids,
            MerchantProfile {
                commerce_code: config.commerce_code.clone(),
                commerce_name: config.commerce_name.clone(),
                return_url: callback_url.to_string(),
                logo_url: Some(logo_url.to_string()),
            },
        );
        let simulator = EnrollmentSimulator::new(
            initiator,
            gateway.clone(),
            store.clone(),
            delay,
            callback_url,
            SimulatorTiming {
                init_delay: config.init_delay(),
                confirm_delay: config.confirm_delay(),
            },
        );
        let processor = CallbackProcessor::new(gateway, store.clone());

        Ok(Self {
            simulator,
            processor,
            store,
            landing_url,
            public_base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::callback::NO_TRANSACTION_MESSAGE;
    use crate::enrollment::clock::{FixedClock, NoDelay};
    use crate::enrollment::plans::{PeriodicityUnit, find_plan};
    use crate::enrollment::store::MemoryPendingStore;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;

    fn service(success_rate: f64) -> (EnrollmentService, Arc<MemoryPendingStore>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()));
        let ids = Arc::new(IdGenerator::seeded(clock, 99));
        let store = Arc::new(MemoryPendingStore::new());
        let config = PatPassSection::default();
        let gateway = Arc::new(MockGateway::seeded(
            ids.clone(),
            config.gateway_base_url.clone(),
            success_rate,
            99,
        ));
        let svc = EnrollmentService::with_gateway(
            &config,
            ids,
            gateway,
            store.clone(),
            Arc::new(NoDelay::new()),
        )
        .unwrap();
        (svc, store)
    }

    #[test]
    fn test_from_config_builds_urls() {
        let svc = EnrollmentService::from_config(
            &PatPassSection::default(),
            Arc::new(MemoryPendingStore::new()),
            Arc::new(clock::SystemClock),
            Arc::new(NoDelay::new()),
        )
        .unwrap();
        assert_eq!(svc.landing_url.as_str(), "http://localhost:3000/Services");
        assert_eq!(svc.public_base_url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_from_config_rejects_relative_base_url() {
        let config = PatPassSection {
            public_base_url: "localhost:3000/x".to_string(),
            ..Default::default()
        };
        let result = EnrollmentService::from_config(
            &config,
            Arc::new(MemoryPendingStore::new()),
            Arc::new(clock::SystemClock),
            Arc::new(NoDelay::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_premium_end_to_end() {
        let (svc, store) = service(1.0);
        let premium = find_plan("Premium").unwrap();

        let redirect = svc.simulator.simulate(&premium).await.unwrap();
        assert_eq!(redirect.request.amount, 10000);
        assert_eq!(redirect.request.periodicity.number, 1);
        assert_eq!(redirect.request.periodicity.unit, PeriodicityUnit::Month);
        assert_eq!(redirect.request.end_date, NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        assert!(store.get().await.unwrap().is_some());

        let q: HashMap<String, String> = redirect.location.query_pairs().into_owned().collect();
        assert_eq!(q["status"], "success");

        let result = svc.processor.process(&q["token"], &q["tbk_token"]).await;
        assert!(result.success);
        assert!(result.message.contains("Premium"));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_callback_with_empty_storage() {
        let (svc, _) = service(1.0);
        let result = svc.processor.process("TOKEN_1_abc", "TBK_1").await;
        assert!(!result.success);
        assert_eq!(result.message, NO_TRANSACTION_MESSAGE);
    }
}
