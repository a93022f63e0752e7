//! Common fixtures
//!
//! Frozen dates and amounts so tests stay deterministic, plus a scripted
//! insurer gateway double.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{
    BatchSubmission, GatewayError, GatewayReceipt, InsurerGateway, Money,
};

/// A mid-month service date inside every fixture rule's effective window
pub fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

/// Start of the fixture rules' effective window
pub fn window_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

/// The frozen instant used with `FixedClock`
pub fn frozen_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).single().expect("valid timestamp")
}

pub fn money(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount)
}

pub fn twenty() -> Money {
    Money::new(dec!(20))
}

/// Insurer gateway double that plays back scripted results and records
/// every submission it receives. When the script runs out it accepts.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<GatewayReceipt, GatewayError>>>,
    submissions: Mutex<Vec<BatchSubmission>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<GatewayReceipt, GatewayError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn failing_once(error: GatewayError) -> Self {
        let gateway = Self::default();
        gateway.push(Err(error));
        gateway
    }

    pub fn submissions(&self) -> Vec<BatchSubmission> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InsurerGateway for ScriptedGateway {
    async fn submit_batch(
        &self,
        submission: BatchSubmission,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(submission);
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GatewayReceipt {
                    accepted: true,
                    reference: "NHIA-REF-0001".to_string(),
                })
            })
    }
}
