use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AgreementTerms;
use crate::decimal::{days_past_due, Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{
    AgreementId, AgreementKind, AgreementStatus, AgreementType, CaseId, EntityId, InstallmentId,
    InstallmentStatus, PaymentId, PaymentMethod,
};

/// a negotiated settlement of a case's monetary claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAgreement {
    // identification
    pub id: AgreementId,
    pub case_id: CaseId,
    pub debtor_id: EntityId,
    pub creditor_id: EntityId,
    pub guarantor_id: Option<EntityId>,
    pub kind: AgreementKind,

    // terms
    pub agreement_type: AgreementType,
    pub total_value: Money,
    pub entry_value: Money,
    pub installment_count: u32,
    /// base per-installment amount; the last installment absorbs the rounding remainder
    pub installment_value: Money,
    pub late_fee_pct: Rate,
    pub daily_interest_pct: Rate,
    pub notes: Option<String>,

    // lifecycle
    pub status: AgreementStatus,
    pub renegotiation_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // derived, written only by derive_state
    pub paid_amount: Money,
    pub remaining_balance: Money,
    pub completion_percentage: Decimal,
    pub next_due_date: Option<NaiveDate>,
    pub days_overdue: u32,
}

impl FinancialAgreement {
    /// create a standard agreement from validated terms
    pub fn from_terms(
        terms: &AgreementTerms,
        debtor_id: EntityId,
        creditor_id: EntityId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id: terms.case_id,
            debtor_id,
            creditor_id,
            guarantor_id: terms.guarantor_id,
            kind: AgreementKind::Standard,
            agreement_type: terms.agreement_type,
            total_value: terms.total_value,
            entry_value: terms.entry_value,
            installment_count: terms.installment_count,
            installment_value: terms.financed_value().split_even(terms.installment_count),
            late_fee_pct: terms.late_fee_pct,
            daily_interest_pct: terms.daily_interest_pct,
            notes: terms.notes.clone(),
            status: AgreementStatus::Active,
            renegotiation_count: 0,
            created_at: now,
            updated_at: now,
            paid_amount: terms.entry_value,
            remaining_balance: terms.financed_value(),
            completion_percentage: Decimal::ZERO,
            next_due_date: None,
            days_overdue: 0,
        }
    }

    /// create a judicial-release agreement, settled in a single cash installment
    pub fn judicial_release(
        case_id: CaseId,
        value: Money,
        debtor_id: EntityId,
        creditor_id: EntityId,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            debtor_id,
            creditor_id,
            guarantor_id: None,
            kind: AgreementKind::JudicialRelease,
            agreement_type: AgreementType::CashInFull,
            total_value: value,
            entry_value: Money::ZERO,
            installment_count: 1,
            installment_value: value,
            late_fee_pct: Rate::ZERO,
            daily_interest_pct: Rate::ZERO,
            notes: reference,
            status: AgreementStatus::Active,
            renegotiation_count: 0,
            created_at: now,
            updated_at: now,
            paid_amount: Money::ZERO,
            remaining_balance: value,
            completion_percentage: Decimal::ZERO,
            next_due_date: None,
            days_overdue: 0,
        }
    }

    /// a live standard agreement counts against the one-per-case limit
    pub fn is_live_standard(&self) -> bool {
        self.kind == AgreementKind::Standard && self.status.is_live()
    }
}

/// one scheduled payment obligation within an agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub agreement_id: AgreementId,
    /// 1..=N, unique within the agreement, defines due-date ordering
    pub installment_number: u32,
    pub due_date: NaiveDate,
    /// original principal owed
    pub amount: Money,
    pub status: InstallmentStatus,

    // payment tracking, running sums across partial payments
    pub paid_date: Option<NaiveDate>,
    pub amount_paid: Money,
    pub late_fee_paid: Money,
    pub interest_paid: Money,
    pub discount_granted: Money,
}

impl Installment {
    pub fn new(
        agreement_id: AgreementId,
        installment_number: u32,
        due_date: NaiveDate,
        amount: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agreement_id,
            installment_number,
            due_date,
            amount,
            status: InstallmentStatus::Pending,
            paid_date: None,
            amount_paid: Money::ZERO,
            late_fee_paid: Money::ZERO,
            interest_paid: Money::ZERO,
            discount_granted: Money::ZERO,
        }
    }

    /// principal still owed, shrinking with payments and granted discounts
    pub fn outstanding(&self) -> Money {
        (self.amount - self.amount_paid - self.discount_granted).max(Money::ZERO)
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.status == InstallmentStatus::Pending && self.due_date < as_of
    }

    /// status with the derived Overdue view applied
    pub fn effective_status(&self, as_of: NaiveDate) -> InstallmentStatus {
        if self.is_overdue(as_of) {
            InstallmentStatus::Overdue
        } else {
            self.status
        }
    }
}

/// append-only ledger row for one payment applied to an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub installment_id: InstallmentId,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    /// free-text proof identifier
    pub reference: Option<String>,
    /// portion of amount attributed to the flat late fee
    pub late_fee: Money,
    /// portion of amount attributed to daily interest
    pub interest: Money,
    /// principal forgiven, reduces what is owed without being paid
    pub discount: Money,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

/// recompute the agreement's derived fields from its full installment set
///
/// Pending-but-past-due state is evaluated against `as_of`, so overdue and
/// defaulted detection stays lazy; nothing here touches storage.
pub fn derive_state(
    agreement: &mut FinancialAgreement,
    installments: &[Installment],
    as_of: NaiveDate,
    overdue_threshold_days: u32,
) -> Result<()> {
    let counted: Vec<&Installment> = installments
        .iter()
        .filter(|i| i.status != InstallmentStatus::Cancelled)
        .collect();

    let gross_paid: Money = counted.iter().map(|i| i.amount_paid).sum();
    let penalties_paid: Money = counted
        .iter()
        .map(|i| i.late_fee_paid + i.interest_paid)
        .sum();

    let paid_amount = agreement.entry_value + gross_paid;

    // one cent of rounding slack per installment, anything past that is a defect
    let tolerance = Money::CENT * Decimal::from(counted.len().max(1) as u32);
    let bound = agreement.total_value + penalties_paid + tolerance;
    if paid_amount > bound {
        return Err(LedgerError::InvariantViolation {
            message: format!(
                "agreement {}: paid amount {} exceeds total {} plus penalties {}",
                agreement.id, paid_amount, agreement.total_value, penalties_paid
            ),
        });
    }

    agreement.paid_amount = paid_amount;
    agreement.remaining_balance = (agreement.total_value - paid_amount).max(Money::ZERO);
    agreement.completion_percentage = if agreement.total_value.is_zero() {
        Decimal::ZERO
    } else {
        (paid_amount.as_decimal() / agreement.total_value.as_decimal() * Decimal::from(100))
            .round_dp(2)
            .min(Decimal::from(100))
    };

    let pending: Vec<&&Installment> = counted
        .iter()
        .filter(|i| i.status == InstallmentStatus::Pending)
        .collect();

    agreement.next_due_date = pending.iter().map(|i| i.due_date).min();
    agreement.days_overdue = pending
        .iter()
        .filter(|i| i.due_date < as_of)
        .map(|i| i.due_date)
        .min()
        .map(|due| days_past_due(due, as_of))
        .unwrap_or(0);

    // Cancelled and Renegotiated are set by case automation, never inferred here
    if agreement.status.is_derivable() {
        agreement.status = if !counted.is_empty()
            && counted.iter().all(|i| i.status == InstallmentStatus::Paid)
        {
            AgreementStatus::Completed
        } else if agreement.days_overdue > overdue_threshold_days {
            AgreementStatus::Defaulted
        } else {
            AgreementStatus::Active
        };
    }

    Ok(())
}
