use std::sync::Arc;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::IdGenerator;
use super::plans::{Period, Periodicity, Plan};
use crate::errors::EnrollmentError;

/// Credit card, in the payment enabler's numbering.
pub const PAYMENT_METHOD_CREDIT_CARD: u32 = 101;
pub const PAYMENT_TYPE_DEBIT_SALE: &str = "VD";
/// Subscriptions are never split into installments.
pub const MAX_INSTALLMENTS: u32 = 1;

/// Merchant data stamped on every enrollment request.
#[derive(Debug, Clone)]
pub struct MerchantProfile {
    pub commerce_code: String,
    pub commerce_name: String,
    pub return_url: String,
    pub logo_url: Option<String>,
}

/// One enrollment attempt for one plan.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRequest {
    pub plan_name: String,
    pub buy_order: String,
    pub session_id: String,
    pub amount: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub periodicity: Periodicity,
    pub commerce_code: String,
    pub commerce_name: String,
    pub commerce_logo_url: Option<String>,
    pub return_url: String,
}

/// Wire shape of the payment enabler's init call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitPayload {
    pub commerce_code: String,
    pub buy_order: String,
    pub session_id: String,
    pub amount: i64,
    pub return_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commerce_logo_url: Option<String>,
    pub commerce_name: String,
    pub payment_method: u32,
    pub payment_type: String,
    pub subscription_start_date: String,
    pub subscription_end_date: String,
    pub max_installments_number: u32,
    pub periodicity: u32,
    pub periodicity_type: String,
}

impl EnrollmentRequest {
    pub fn to_init_payload(&self) -> InitPayload {
        InitPayload {
            commerce_code: self.commerce_code.clone(),
            buy_order: self.buy_order.clone(),
            session_id: self.session_id.clone(),
            amount: self.amount,
            return_url: self.return_url.clone(),
            commerce_logo_url: self.commerce_logo_url.clone(),
            commerce_name: self.commerce_name.clone(),
            payment_method: PAYMENT_METHOD_CREDIT_CARD,
            payment_type: PAYMENT_TYPE_DEBIT_SALE.to_string(),
            subscription_start_date: iso_date(self.start_date),
            subscription_end_date: iso_date(self.end_date),
            max_installments_number: MAX_INSTALLMENTS,
            periodicity: self.periodicity.number,
            periodicity_type: self.periodicity.unit.as_str().to_string(),
        }
    }
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Reject plans the payment enabler could never accept.
pub fn validate_plan(plan: &Plan) -> Result<(), EnrollmentError> {
    if plan.price <= 0 {
        return Err(EnrollmentError::InvalidPlan(format!(
            "price must be a positive integer amount, got {}",
            plan.price
        )));
    }
    if plan.period.as_str().trim().is_empty() {
        return Err(EnrollmentError::InvalidPlan(format!(
            "plan '{}' has an empty period",
            plan.name
        )));
    }
    Ok(())
}

/// Last day of the mandate. Days past the end of the target month clamp to its last day.
pub fn end_date(start: NaiveDate, period: &Period) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(period.months()))
}

pub struct EnrollmentInitiator {
    ids: Arc<IdGenerator>,
    merchant: MerchantProfile,
}

impl EnrollmentInitiator {
    pub fn new(ids: Arc<IdGenerator>, merchant: MerchantProfile) -> Self {
        Self { ids, merchant }
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    pub fn build(&self, plan: &Plan) -> Result<EnrollmentRequest, EnrollmentError> {
        validate_plan(plan)?;

        let start_date = self.ids.clock().now().date_naive();
        let end_date = end_date(start_date, &plan.period).ok_or_else(|| {
            EnrollmentError::DateOverflow {
                period: plan.period.to_string(),
            }
        })?;

        Ok(EnrollmentRequest {
            plan_name: plan.name.clone(),
            buy_order: self.ids.buy_order(),
            session_id: self.ids.session_id(),
            amount: plan.price,
            start_date,
            end_date,
            periodicity: plan.period.periodicity(),
            commerce_code: self.merchant.commerce_code.clone(),
            commerce_name: self.merchant.commerce_name.clone(),
            commerce_logo_url: self.merchant.logo_url.clone(),
            return_url: self.merchant.return_url.clone(),
        })
    }
}
