use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    AgreementId, AgreementStatus, CaseId, InstallmentId, PaymentId, PaymentMethod,
};

/// all events emitted by the ledger engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // agreement lifecycle events
    AgreementCreated {
        agreement_id: AgreementId,
        case_id: CaseId,
        total_value: Money,
        entry_value: Money,
        installment_count: u32,
        timestamp: DateTime<Utc>,
    },
    AgreementRenegotiated {
        agreement_id: AgreementId,
        successor_id: AgreementId,
        renegotiation_count: u32,
        total_value: Money,
        timestamp: DateTime<Utc>,
    },
    JudicialReleaseCreated {
        agreement_id: AgreementId,
        case_id: CaseId,
        value: Money,
        timestamp: DateTime<Utc>,
    },
    AgreementCompleted {
        agreement_id: AgreementId,
        paid_amount: Money,
        timestamp: DateTime<Utc>,
    },
    AgreementDefaulted {
        agreement_id: AgreementId,
        days_overdue: u32,
        remaining_balance: Money,
        timestamp: DateTime<Utc>,
    },
    AgreementRemoved {
        agreement_id: AgreementId,
        case_id: CaseId,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        agreement_id: AgreementId,
        old_status: AgreementStatus,
        new_status: AgreementStatus,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        installment_id: InstallmentId,
        agreement_id: AgreementId,
        amount: Money,
        late_fee: Money,
        interest: Money,
        method: PaymentMethod,
        payment_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    InstallmentSettled {
        installment_id: InstallmentId,
        agreement_id: AgreementId,
        installment_number: u32,
        paid_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // case automation events
    CaseArchivalRequested {
        case_id: CaseId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
