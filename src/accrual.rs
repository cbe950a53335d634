use chrono::NaiveDate;

use crate::agreement::Installment;
use crate::decimal::{days_past_due, Money, Rate};

/// late fee and daily interest owed on an installment as of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub days_overdue: u32,
    /// flat fee, applied once per overdue installment
    pub late_fee: Money,
    /// simple daily interest, not compounded
    pub interest: Money,
    /// principal base the penalties were computed on
    pub outstanding: Money,
    pub total_due: Money,
}

/// compute what is owed on an installment, without side effects
///
/// The base is the outstanding principal, so partial payments reduce what
/// accrues from here on. An installment that is not pending, or not yet past
/// due, owes its outstanding principal and nothing else.
pub fn accrue(
    installment: &Installment,
    as_of: NaiveDate,
    late_fee_pct: Rate,
    daily_interest_pct: Rate,
) -> Accrual {
    let outstanding = installment.outstanding();
    let days_overdue = if installment.is_overdue(as_of) {
        days_past_due(installment.due_date, as_of)
    } else {
        0
    };

    if days_overdue == 0 {
        return Accrual {
            days_overdue: 0,
            late_fee: Money::ZERO,
            interest: Money::ZERO,
            outstanding,
            total_due: outstanding,
        };
    }

    let late_fee = late_fee_pct.of(outstanding);
    let interest = daily_interest_pct.of_per_day(outstanding, days_overdue);

    Accrual {
        days_overdue,
        late_fee,
        interest,
        outstanding,
        total_due: outstanding + late_fee + interest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn overdue_installment(amount: i64) -> Installment {
        Installment::new(Uuid::new_v4(), 1, date(2024, 3, 10), Money::from_major(amount))
    }

    #[test]
    fn test_worked_example() {
        let inst = overdue_installment(900);
        let accrual = accrue(
            &inst,
            date(2024, 3, 20),
            Rate::from_percentage(dec!(2)),
            Rate::from_percentage(dec!(0.033)),
        );

        assert_eq!(accrual.days_overdue, 10);
        assert_eq!(accrual.late_fee, money("18.00"));
        assert_eq!(accrual.interest, money("2.97"));
        assert_eq!(accrual.total_due, money("920.97"));
    }

    #[test]
    fn test_on_time_owes_principal_only() {
        let inst = overdue_installment(900);
        let accrual = accrue(
            &inst,
            date(2024, 3, 10),
            Rate::from_percentage(dec!(2)),
            Rate::from_percentage(dec!(0.033)),
        );

        assert_eq!(accrual.days_overdue, 0);
        assert_eq!(accrual.late_fee, Money::ZERO);
        assert_eq!(accrual.interest, Money::ZERO);
        assert_eq!(accrual.total_due, Money::from_major(900));
    }

    #[test]
    fn test_fee_flat_and_interest_linear() {
        let inst = overdue_installment(900);
        let fee_pct = Rate::from_percentage(dec!(2));
        let daily_pct = Rate::from_percentage(dec!(0.033));

        let mut previous = Money::ZERO;
        for days in 1..=60u32 {
            let as_of = date(2024, 3, 10) + chrono::Duration::days(days as i64);
            let accrual = accrue(&inst, as_of, fee_pct, daily_pct);

            // flat fee never grows, interest grows linearly
            assert_eq!(accrual.late_fee, money("18.00"));
            assert_eq!(accrual.interest, daily_pct.of_per_day(inst.amount, days));
            assert!(accrual.interest >= previous);
            previous = accrual.interest;
        }
    }

    #[test]
    fn test_partial_payment_shrinks_the_base() {
        let mut inst = overdue_installment(600);
        inst.amount_paid = Money::from_major(400);

        let accrual = accrue(
            &inst,
            date(2024, 3, 20),
            Rate::from_percentage(dec!(2)),
            Rate::from_percentage(dec!(0.033)),
        );

        assert_eq!(accrual.outstanding, Money::from_major(200));
        assert_eq!(accrual.late_fee, money("4.00"));
        assert_eq!(accrual.total_due, accrual.outstanding + accrual.late_fee + accrual.interest);
    }

    #[test]
    fn test_paid_installment_accrues_nothing() {
        let mut inst = overdue_installment(900);
        inst.amount_paid = inst.amount;
        inst.status = crate::types::InstallmentStatus::Paid;
        inst.paid_date = Some(date(2024, 3, 9));

        let accrual = accrue(
            &inst,
            date(2024, 4, 20),
            Rate::from_percentage(dec!(2)),
            Rate::from_percentage(dec!(0.033)),
        );

        assert_eq!(accrual.days_overdue, 0);
        assert_eq!(accrual.total_due, Money::ZERO);
    }
}
