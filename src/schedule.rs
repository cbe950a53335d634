use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use crate::agreement::Installment;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::AgreementId;

/// materialize the installment set for an agreement
///
/// Monthly cadence starting at `first_due_date`, rolled forward month by
/// month while it lies before `today`. Each installment carries the financed
/// value split evenly and truncated to cents; the last one absorbs the
/// remainder so that `entry_value + sum(amounts) == total_value` exactly.
pub fn generate_schedule(
    agreement_id: AgreementId,
    total_value: Money,
    entry_value: Money,
    installment_count: u32,
    first_due_date: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<Installment>> {
    if installment_count < 1 {
        return Err(LedgerError::InvalidTerms {
            message: format!("installment count must be at least 1, got {installment_count}"),
        });
    }
    if entry_value > total_value {
        return Err(LedgerError::InvalidTerms {
            message: format!("entry value {entry_value} exceeds total value {total_value}"),
        });
    }

    let financed = total_value - entry_value;
    let base = financed.split_even(installment_count);

    let mut start = first_due_date;
    while start < today {
        start = next_month(start)?;
    }

    let mut installments = Vec::with_capacity(installment_count as usize);
    let mut due = start;
    for number in 1..=installment_count {
        let amount = if number == installment_count {
            financed - base * Decimal::from(installment_count - 1)
        } else {
            base
        };
        installments.push(Installment::new(agreement_id, number, due, amount));
        if number < installment_count {
            due = next_month(due)?;
        }
    }

    Ok(installments)
}

fn next_month(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(1))
        .ok_or_else(|| LedgerError::InvalidTerms {
            message: format!("due date out of range after {date}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_even_split_no_remainder() {
        let schedule = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(1_000),
            Money::from_major(100),
            3,
            date(2024, 2, 10),
            date(2024, 1, 1),
        )
        .unwrap();

        assert_eq!(schedule.len(), 3);
        for inst in &schedule {
            assert_eq!(inst.amount, Money::from_major(300));
        }
    }

    #[test]
    fn test_remainder_lands_in_last_installment() {
        let schedule = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(1_000),
            Money::ZERO,
            3,
            date(2024, 2, 10),
            date(2024, 1, 1),
        )
        .unwrap();

        assert_eq!(schedule[0].amount, money("333.33"));
        assert_eq!(schedule[1].amount, money("333.33"));
        assert_eq!(schedule[2].amount, money("333.34"));

        let total: Money = schedule.iter().map(|i| i.amount).sum();
        assert_eq!(total, Money::from_major(1_000));
    }

    #[test]
    fn test_sum_invariant_holds_across_awkward_splits() {
        for (total_cents, entry_cents, count) in [
            (100_000_i64, 0_i64, 7_u32),
            (99_999, 1, 13),
            (55_501, 10_000, 6),
            (1, 0, 1),
        ] {
            let total = Money::from_minor(total_cents);
            let entry = Money::from_minor(entry_cents);
            let schedule = generate_schedule(
                Uuid::new_v4(),
                total,
                entry,
                count,
                date(2024, 2, 10),
                date(2024, 1, 1),
            )
            .unwrap();

            let sum: Money = schedule.iter().map(|i| i.amount).sum();
            assert_eq!(entry + sum, total, "total {total} entry {entry} count {count}");

            // remainder never exceeds count - 1 cents
            let base = schedule[0].amount;
            let last = schedule.last().unwrap().amount;
            assert!(last - base <= Money::CENT * rust_decimal::Decimal::from(count - 1).max(rust_decimal::Decimal::ONE));
        }
    }

    #[test]
    fn test_monthly_cadence_with_clamped_month_ends() {
        let schedule = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(900),
            Money::ZERO,
            3,
            date(2024, 1, 31),
            date(2024, 1, 1),
        )
        .unwrap();

        assert_eq!(schedule[0].due_date, date(2024, 1, 31));
        assert_eq!(schedule[1].due_date, date(2024, 2, 29));
        assert_eq!(schedule[2].due_date, date(2024, 3, 29));
    }

    #[test]
    fn test_past_start_date_rolls_forward() {
        let schedule = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(900),
            Money::ZERO,
            2,
            date(2024, 1, 10),
            date(2024, 3, 15),
        )
        .unwrap();

        assert_eq!(schedule[0].due_date, date(2024, 4, 10));
        assert_eq!(schedule[1].due_date, date(2024, 5, 10));
    }

    #[test]
    fn test_numbering_is_ordered_from_one() {
        let schedule = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(600),
            Money::ZERO,
            4,
            date(2024, 2, 10),
            date(2024, 1, 1),
        )
        .unwrap();

        let numbers: Vec<u32> = schedule.iter().map(|i| i.installment_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        for pair in schedule.windows(2) {
            assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn test_invalid_terms_rejected() {
        let zero_count = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(900),
            Money::ZERO,
            0,
            date(2024, 2, 10),
            date(2024, 1, 1),
        );
        assert!(matches!(zero_count, Err(LedgerError::InvalidTerms { .. })));

        let entry_over_total = generate_schedule(
            Uuid::new_v4(),
            Money::from_major(900),
            Money::from_major(901),
            3,
            date(2024, 2, 10),
            date(2024, 1, 1),
        );
        assert!(matches!(entry_over_total, Err(LedgerError::InvalidTerms { .. })));
    }
}
