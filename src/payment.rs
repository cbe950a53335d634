use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accrual::accrue;
use crate::agreement::{Installment, PaymentRecord};
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{InstallmentStatus, PaymentMethod};

/// one payment submitted against an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    /// portion attributed to the flat late fee; accrual fills this when omitted
    pub late_fee: Option<Money>,
    /// portion attributed to daily interest; accrual fills this when omitted
    pub interest: Option<Money>,
    /// principal forgiven on this payment
    pub discount: Option<Money>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl PaymentInput {
    pub fn new(amount: Money, payment_date: NaiveDate, method: PaymentMethod) -> Self {
        Self {
            amount,
            payment_date,
            method,
            late_fee: None,
            interest: None,
            discount: None,
            reference: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount {
                amount: self.amount,
            });
        }
        for part in [self.late_fee, self.interest, self.discount].into_iter().flatten() {
            if part.is_negative() {
                return Err(LedgerError::InvalidPaymentAmount { amount: part });
            }
        }
        Ok(())
    }
}

/// outcome of applying one payment to one installment
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPayment {
    pub installment: Installment,
    pub record: PaymentRecord,
    /// true when this payment flipped the installment to Paid
    pub settled: bool,
}

/// apply a payment to an installment, producing the updated copy and the
/// ledger row
///
/// Pure with respect to storage: the caller persists both outputs or
/// neither. Penalty portions default to the accrual for the payment date.
/// The installment settles once gross paid plus granted discounts cover the
/// original principal.
pub fn apply_payment(
    installment: &Installment,
    late_fee_pct: Rate,
    daily_interest_pct: Rate,
    input: &PaymentInput,
    recorded_by: &str,
    now: DateTime<Utc>,
) -> Result<AppliedPayment> {
    input.validate()?;

    match installment.status {
        InstallmentStatus::Paid => {
            return Err(LedgerError::AlreadyPaid {
                installment_id: installment.id,
            });
        }
        InstallmentStatus::Cancelled => {
            return Err(LedgerError::InstallmentNotPayable {
                installment_id: installment.id,
                status: installment.status,
            });
        }
        InstallmentStatus::Pending | InstallmentStatus::Overdue => {}
    }

    let accrual = accrue(installment, input.payment_date, late_fee_pct, daily_interest_pct);
    let late_fee = input.late_fee.unwrap_or(accrual.late_fee);
    let interest = input.interest.unwrap_or(accrual.interest);
    let discount = input.discount.unwrap_or(Money::ZERO);

    let record = PaymentRecord {
        id: Uuid::new_v4(),
        installment_id: installment.id,
        amount: input.amount,
        payment_date: input.payment_date,
        payment_method: input.method,
        reference: input.reference.clone(),
        late_fee,
        interest,
        discount,
        notes: input.notes.clone(),
        recorded_by: recorded_by.to_string(),
        created_at: now,
    };

    let mut updated = installment.clone();
    updated.amount_paid += input.amount;
    updated.late_fee_paid += late_fee;
    updated.interest_paid += interest;
    updated.discount_granted += discount;

    let settled = updated.amount_paid + updated.discount_granted >= updated.amount;
    if settled {
        updated.status = InstallmentStatus::Paid;
        updated.paid_date = Some(input.payment_date);
    }

    Ok(AppliedPayment {
        installment: updated,
        record,
        settled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn installment(amount: i64) -> Installment {
        Installment::new(Uuid::new_v4(), 1, date(2024, 3, 10), Money::from_major(amount))
    }

    fn fee() -> Rate {
        Rate::from_percentage(dec!(2))
    }

    fn daily() -> Rate {
        Rate::from_percentage(dec!(0.033))
    }

    #[test]
    fn test_partial_then_settling_payment() {
        let inst = installment(600);

        let first = apply_payment(
            &inst,
            fee(),
            daily(),
            &PaymentInput::new(Money::from_major(400), date(2024, 3, 5), PaymentMethod::Pix),
            "clerk",
            Utc::now(),
        )
        .unwrap();

        assert!(!first.settled);
        assert_eq!(first.installment.status, InstallmentStatus::Pending);
        assert_eq!(first.installment.amount_paid, Money::from_major(400));
        assert_eq!(first.installment.paid_date, None);

        let second = apply_payment(
            &first.installment,
            fee(),
            daily(),
            &PaymentInput::new(Money::from_major(200), date(2024, 3, 8), PaymentMethod::Cash),
            "clerk",
            Utc::now(),
        )
        .unwrap();

        assert!(second.settled);
        assert_eq!(second.installment.status, InstallmentStatus::Paid);
        assert_eq!(second.installment.amount_paid, Money::from_major(600));
        assert_eq!(second.installment.paid_date, Some(date(2024, 3, 8)));
    }

    #[test]
    fn test_paid_installment_rejects_repayment() {
        let inst = installment(600);
        let settled = apply_payment(
            &inst,
            fee(),
            daily(),
            &PaymentInput::new(Money::from_major(600), date(2024, 3, 5), PaymentMethod::Pix),
            "clerk",
            Utc::now(),
        )
        .unwrap();

        let err = apply_payment(
            &settled.installment,
            fee(),
            daily(),
            &PaymentInput::new(Money::from_major(1), date(2024, 3, 6), PaymentMethod::Pix),
            "clerk",
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::AlreadyPaid { .. }));
    }

    #[test]
    fn test_penalties_prefilled_from_accrual() {
        let inst = installment(900);

        let applied = apply_payment(
            &inst,
            fee(),
            daily(),
            &PaymentInput::new(money("920.97"), date(2024, 3, 20), PaymentMethod::BankTransfer),
            "clerk",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(applied.record.late_fee, money("18.00"));
        assert_eq!(applied.record.interest, money("2.97"));
        assert!(applied.settled);
    }

    #[test]
    fn test_caller_overrides_win_over_accrual() {
        let inst = installment(900);
        let mut input = PaymentInput::new(money("910.00"), date(2024, 3, 20), PaymentMethod::Check);
        input.late_fee = Some(money("10.00"));
        input.interest = Some(Money::ZERO);

        let applied = apply_payment(&inst, fee(), daily(), &input, "clerk", Utc::now()).unwrap();

        assert_eq!(applied.record.late_fee, money("10.00"));
        assert_eq!(applied.record.interest, Money::ZERO);
        assert_eq!(applied.installment.late_fee_paid, money("10.00"));
    }

    #[test]
    fn test_discount_counts_toward_settlement() {
        let inst = installment(600);
        let mut input = PaymentInput::new(Money::from_major(550), date(2024, 3, 5), PaymentMethod::Pix);
        input.discount = Some(Money::from_major(50));

        let applied = apply_payment(&inst, fee(), daily(), &input, "clerk", Utc::now()).unwrap();

        assert!(applied.settled);
        assert_eq!(applied.installment.discount_granted, Money::from_major(50));
        assert_eq!(applied.installment.outstanding(), Money::ZERO);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let inst = installment(600);
        let err = apply_payment(
            &inst,
            fee(),
            daily(),
            &PaymentInput::new(Money::ZERO, date(2024, 3, 5), PaymentMethod::Pix),
            "clerk",
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn test_cancelled_installment_not_payable() {
        let mut inst = installment(600);
        inst.status = InstallmentStatus::Cancelled;

        let err = apply_payment(
            &inst,
            fee(),
            daily(),
            &PaymentInput::new(Money::from_major(100), date(2024, 3, 5), PaymentMethod::Pix),
            "clerk",
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::InstallmentNotPayable { .. }));
    }
}
