use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use payouts::workflows::payouts::{
    Account, AccountId, BookingRecord, BookingStatus, Dispute, DisputeStatus, InMemoryLedgerStore,
    PayoutRequest, PayoutRequestId, ProcessorAccount, StoreError,
};
use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// One seeded hubber with a single pending request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DemoHubber {
    pub(crate) account: &'static str,
    pub(crate) name: &'static str,
    pub(crate) request: &'static str,
    /// Amounts in cents.
    pub(crate) balance: i64,
    pub(crate) amount: i64,
    pub(crate) tenure_days: i64,
    pub(crate) completed_bookings: u32,
    pub(crate) open_disputes: u32,
    pub(crate) payouts_enabled: bool,
    pub(crate) expectation: &'static str,
}

pub(crate) const DEMO_HUBBERS: [DemoHubber; 5] = [
    DemoHubber {
        account: "hub-anna",
        name: "Anna Rossi",
        request: "po-a",
        balance: 10_000,
        amount: 5_000,
        tenure_days: 60,
        completed_bookings: 6,
        open_disputes: 0,
        payouts_enabled: true,
        expectation: "paid automatically",
    },
    DemoHubber {
        account: "hub-bruno",
        name: "Bruno Sala",
        request: "po-b",
        balance: 100_000,
        amount: 50_000,
        tenure_days: 60,
        completed_bookings: 6,
        open_disputes: 0,
        payouts_enabled: true,
        expectation: "above the automatic ceiling",
    },
    DemoHubber {
        account: "hub-chiara",
        name: "Chiara Neri",
        request: "po-c",
        balance: 10_000,
        amount: 3_000,
        tenure_days: 60,
        completed_bookings: 6,
        open_disputes: 0,
        payouts_enabled: true,
        expectation: "below the minimum amount",
    },
    DemoHubber {
        account: "hub-dario",
        name: "Dario Fontana",
        request: "po-d",
        balance: 10_000,
        amount: 5_000,
        tenure_days: 60,
        completed_bookings: 6,
        open_disputes: 1,
        payouts_enabled: true,
        expectation: "open dispute on file",
    },
    DemoHubber {
        account: "hub-elena",
        name: "Elena Greco",
        request: "po-e",
        balance: 10_000,
        amount: 6_000,
        tenure_days: 3,
        completed_bookings: 0,
        open_disputes: 2,
        payouts_enabled: false,
        expectation: "processor account cannot receive payouts",
    },
];

/// Seeds the in-memory ledger with the demo hubbers and returns their request ids.
pub(crate) fn seed_demo_ledger(
    store: &InMemoryLedgerStore,
    now: DateTime<Utc>,
) -> Result<Vec<PayoutRequestId>, StoreError> {
    let mut requests = Vec::with_capacity(DEMO_HUBBERS.len());
    for (position, hubber) in DEMO_HUBBERS.iter().enumerate() {
        let account_id = AccountId(hubber.account.to_string());
        store.insert_account(Account {
            id: account_id.clone(),
            display_name: hubber.name.to_string(),
            balance: Decimal::new(hubber.balance, 2),
            processor: ProcessorAccount {
                account_id: Some(format!("acct_{}", hubber.account.trim_start_matches("hub-"))),
                charges_enabled: true,
                payouts_enabled: hubber.payouts_enabled,
            },
            created_at: now - Duration::days(hubber.tenure_days + 90),
            became_hubber_at: Some(now - Duration::days(hubber.tenure_days)),
        })?;

        for index in 0..hubber.completed_bookings {
            store.insert_booking(BookingRecord {
                id: format!("{}-booking-{index}", hubber.account),
                hubber_id: account_id.clone(),
                status: BookingStatus::Completed,
            })?;
        }
        for index in 0..hubber.open_disputes {
            store.insert_dispute(Dispute {
                id: format!("{}-dispute-{index}", hubber.account),
                account_id: account_id.clone(),
                status: DisputeStatus::Open,
            })?;
        }

        let id = PayoutRequestId(hubber.request.to_string());
        let offset = Duration::minutes((DEMO_HUBBERS.len() - position) as i64);
        store.insert_request(PayoutRequest::new(
            id.clone(),
            account_id,
            Decimal::new(hubber.amount, 2),
            now - offset,
        ))?;
        requests.push(id);
    }
    Ok(requests)
}
