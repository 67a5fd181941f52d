use std::time::Duration;

use serde::Serialize;
use url::Url;

use super::callback::{CallbackProcessor, EnrollmentResult};

/// How long the banner stays up.
pub const BANNER_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters the callback leaves on the landing URL.
pub const CALLBACK_PARAMS: [&str; 4] = ["status", "token", "tbk_token", "message"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
    pub dismiss_after_ms: u64,
}

impl From<&EnrollmentResult> for Banner {
    fn from(result: &EnrollmentResult) -> Self {
        Self {
            kind: if result.success {
                BannerKind::Success
            } else {
                BannerKind::Error
            },
            message: result.message.clone(),
            dismiss_after_ms: BANNER_TIMEOUT.as_millis() as u64,
        }
    }
}

/// What the landing page shows after a callback, and the URL it should
/// display in place of the one carrying the callback parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub banner: Banner,
    pub result: EnrollmentResult,
    pub clean_url: String,
}

/// Drop the callback parameters from `url`, keeping any others in order.
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !CALLBACK_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut clean = url.clone();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept);
    }
    clean
}

/// Present the outcome of a callback found on `page_url`, if any.
///
/// Nothing is shown unless `status`, `token` and `tbk_token` are all present.
pub async fn present(processor: &CallbackProcessor, page_url: &Url) -> Option<Presentation> {
    let mut status = None;
    let mut token = None;
    let mut tbk_token = None;
    for (key, value) in page_url.query_pairs() {
        match key.as_ref() {
            "status" => status = Some(value.into_owned()),
            "token" => token = Some(value.into_owned()),
            "tbk_token" => tbk_token = Some(value.into_owned()),
            _ => {}
        }
    }

    let (_status, token, tbk_token) = (
        status.filter(|s| !s.is_empty())?,
        token.filter(|t| !t.is_empty())?,
        tbk_token.filter(|t| !t.is_empty())?,
    );

    let result = processor.process(&token, &tbk_token).await;
    Some(Presentation {
        banner: Banner::from(&result),
        clean_url: strip_callback_params(page_url).to_string(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::callback::NO_TRANSACTION_MESSAGE;
    use crate::enrollment::clock::SystemClock;
    use crate::enrollment::gateway::MockGateway;
    use crate::enrollment::ids::IdGenerator;
    use crate::enrollment::store::{MemoryPendingStore, PendingEnrollment, PendingStore};
    use std::sync::Arc;

    fn processor(success_rate: f64) -> (CallbackProcessor, Arc<MemoryPendingStore>) {
        let ids = Arc::new(IdGenerator::seeded(Arc::new(SystemClock), 1));
        let store = Arc::new(MemoryPendingStore::new());
        (
            CallbackProcessor::new(
                Arc::new(MockGateway::seeded(ids, "https://g", success_rate, 1)),
                store.clone(),
            ),
            store,
        )
    }

    #[test]
    fn test_strip_callback_params_keeps_others() {
        let url = Url::parse(
            "http://localhost:3000/Services?ref=ad&status=success&token=T&tbk_token=K&message=ok&lang=es",
        )
        .unwrap();
        let clean = strip_callback_params(&url);
        assert_eq!(clean.as_str(), "http://localhost:3000/Services?ref=ad&lang=es");
    }

    #[test]
    fn test_strip_callback_params_drops_empty_query() {
        let url = Url::parse("http://localhost:3000/Services?status=error&message=x").unwrap();
        assert_eq!(strip_callback_params(&url).as_str(), "http://localhost:3000/Services");
    }

    #[test]
    fn test_banner_kind_follows_result() {
        let ok = EnrollmentResult {
            success: true,
            message: "yes".into(),
            details: None,
        };
        let banner = Banner::from(&ok);
        assert_eq!(banner.kind, BannerKind::Success);
        assert_eq!(banner.dismiss_after_ms, 5000);
        assert_eq!(Banner::from(&EnrollmentResult::failure("no")).kind, BannerKind::Error);
    }

    #[tokio::test]
    async fn test_present_requires_all_three_params() {
        let (processor, _) = processor(1.0);
        for raw in [
            "http://localhost/Services",
            "http://localhost/Services?status=success&token=T",
            "http://localhost/Services?token=T&tbk_token=K",
            "http://localhost/Services?status=error&message=enrollment+error",
        ] {
            assert!(present(&processor, &Url::parse(raw).unwrap()).await.is_none(), "{}", raw);
        }
    }

    #[tokio::test]
    async fn test_present_success_consumes_pending() {
        let (processor, store) = processor(1.0);
        store
            .set(PendingEnrollment {
                plan: "Premium".into(),
                amount: 10000,
                buy_order: "ORDER_1_1".into(),
                session_id: "SESSION_1_a".into(),
                timestamp: 1,
            })
            .await
            .unwrap();

        let url = Url::parse("http://localhost/Services?status=success&token=T&tbk_token=K&message=m").unwrap();
        let presentation = present(&processor, &url).await.unwrap();
        assert_eq!(presentation.banner.kind, BannerKind::Success);
        assert!(presentation.banner.message.contains("Premium"));
        assert_eq!(presentation.clean_url, "http://localhost/Services");
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_present_without_pending_shows_error_banner() {
        let (processor, _) = processor(1.0);
        let url = Url::parse("http://localhost/Services?status=success&token=T&tbk_token=K").unwrap();
        let presentation = present(&processor, &url).await.unwrap();
        assert_eq!(presentation.banner.kind, BannerKind::Error);
        assert_eq!(presentation.banner.message, NO_TRANSACTION_MESSAGE);
    }
}
