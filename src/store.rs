use std::collections::HashMap;

use crate::agreement::{FinancialAgreement, Installment, PaymentRecord};
use crate::errors::{LedgerError, Result};
use crate::types::{AgreementId, CaseId, InstallmentId};

/// transactional store boundary for the ledger
///
/// Implementations must be atomic at single-aggregate granularity: one
/// agreement plus its installment set is the unit of mutual exclusion.
/// Payment records are append-only and are never deleted, not even when
/// their agreement is removed. A store that detects a concurrent writer on
/// the same agreement reports `Contention` and the caller retries the whole
/// operation.
pub trait LedgerStore {
    fn insert_agreement(&mut self, agreement: &FinancialAgreement) -> Result<()>;
    fn update_agreement(&mut self, agreement: &FinancialAgreement) -> Result<()>;
    fn agreement(&self, id: AgreementId) -> Result<Option<FinancialAgreement>>;
    fn agreements_for_case(&self, case_id: CaseId) -> Result<Vec<FinancialAgreement>>;
    /// remove an agreement and, through exclusive ownership, its installments
    fn remove_agreement(&mut self, id: AgreementId) -> Result<()>;

    fn insert_installments(&mut self, installments: &[Installment]) -> Result<()>;
    fn update_installment(&mut self, installment: &Installment) -> Result<()>;
    fn installment(&self, id: InstallmentId) -> Result<Option<Installment>>;
    /// the agreement's installments ordered by installment number
    fn installments_for_agreement(&self, agreement_id: AgreementId) -> Result<Vec<Installment>>;
    fn delete_installments(&mut self, agreement_id: AgreementId) -> Result<()>;

    fn append_payment(&mut self, record: &PaymentRecord) -> Result<()>;
    fn payments_for_installment(&self, installment_id: InstallmentId) -> Result<Vec<PaymentRecord>>;
    /// every payment across the agreement's installments, ordered by payment date
    fn payments_for_agreement(&self, agreement_id: AgreementId) -> Result<Vec<PaymentRecord>>;
    fn agreement_has_payments(&self, agreement_id: AgreementId) -> Result<bool>;
}

/// in-memory store, the reference semantics of the trait and the test double
#[derive(Debug, Default)]
pub struct MemoryStore {
    agreements: HashMap<AgreementId, FinancialAgreement>,
    installments: HashMap<InstallmentId, Installment>,
    payments: Vec<PaymentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn installment_ids_for(&self, agreement_id: AgreementId) -> Vec<InstallmentId> {
        self.installments
            .values()
            .filter(|i| i.agreement_id == agreement_id)
            .map(|i| i.id)
            .collect()
    }
}

impl LedgerStore for MemoryStore {
    fn insert_agreement(&mut self, agreement: &FinancialAgreement) -> Result<()> {
        if self.agreements.contains_key(&agreement.id) {
            return Err(LedgerError::Storage {
                message: format!("agreement {} already exists", agreement.id),
            });
        }
        self.agreements.insert(agreement.id, agreement.clone());
        Ok(())
    }

    fn update_agreement(&mut self, agreement: &FinancialAgreement) -> Result<()> {
        match self.agreements.get_mut(&agreement.id) {
            Some(slot) => {
                *slot = agreement.clone();
                Ok(())
            }
            None => Err(LedgerError::AgreementNotFound { id: agreement.id }),
        }
    }

    fn agreement(&self, id: AgreementId) -> Result<Option<FinancialAgreement>> {
        Ok(self.agreements.get(&id).cloned())
    }

    fn agreements_for_case(&self, case_id: CaseId) -> Result<Vec<FinancialAgreement>> {
        let mut found: Vec<FinancialAgreement> = self
            .agreements
            .values()
            .filter(|a| a.case_id == case_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    fn remove_agreement(&mut self, id: AgreementId) -> Result<()> {
        if self.agreements.remove(&id).is_none() {
            return Err(LedgerError::AgreementNotFound { id });
        }
        self.installments.retain(|_, i| i.agreement_id != id);
        Ok(())
    }

    fn insert_installments(&mut self, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            self.installments.insert(installment.id, installment.clone());
        }
        Ok(())
    }

    fn update_installment(&mut self, installment: &Installment) -> Result<()> {
        match self.installments.get_mut(&installment.id) {
            Some(slot) => {
                *slot = installment.clone();
                Ok(())
            }
            None => Err(LedgerError::InstallmentNotFound { id: installment.id }),
        }
    }

    fn installment(&self, id: InstallmentId) -> Result<Option<Installment>> {
        Ok(self.installments.get(&id).cloned())
    }

    fn installments_for_agreement(&self, agreement_id: AgreementId) -> Result<Vec<Installment>> {
        let mut found: Vec<Installment> = self
            .installments
            .values()
            .filter(|i| i.agreement_id == agreement_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.installment_number);
        Ok(found)
    }

    fn delete_installments(&mut self, agreement_id: AgreementId) -> Result<()> {
        self.installments.retain(|_, i| i.agreement_id != agreement_id);
        Ok(())
    }

    fn append_payment(&mut self, record: &PaymentRecord) -> Result<()> {
        self.payments.push(record.clone());
        Ok(())
    }

    fn payments_for_installment(&self, installment_id: InstallmentId) -> Result<Vec<PaymentRecord>> {
        let mut found: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|p| p.installment_id == installment_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| (p.payment_date, p.created_at));
        Ok(found)
    }

    fn payments_for_agreement(&self, agreement_id: AgreementId) -> Result<Vec<PaymentRecord>> {
        let ids = self.installment_ids_for(agreement_id);
        let mut found: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|p| ids.contains(&p.installment_id))
            .cloned()
            .collect();
        found.sort_by_key(|p| (p.payment_date, p.created_at));
        Ok(found)
    }

    fn agreement_has_payments(&self, agreement_id: AgreementId) -> Result<bool> {
        let ids = self.installment_ids_for(agreement_id);
        Ok(self.payments.iter().any(|p| ids.contains(&p.installment_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgreementTerms;
    use crate::decimal::{Money, Rate};
    use crate::types::{AgreementType, PaymentMethod};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_agreement(store: &mut MemoryStore) -> (FinancialAgreement, Vec<Installment>) {
        let terms = AgreementTerms {
            case_id: Uuid::new_v4(),
            agreement_type: AgreementType::Judicial,
            total_value: Money::from_major(900),
            entry_value: Money::ZERO,
            installment_count: 3,
            first_due_date: date(2024, 2, 10),
            late_fee_pct: Rate::from_percentage(dec!(2)),
            daily_interest_pct: Rate::from_percentage(dec!(0.033)),
            guarantor_id: None,
            notes: None,
        };
        let agreement =
            FinancialAgreement::from_terms(&terms, Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let installments = crate::schedule::generate_schedule(
            agreement.id,
            terms.total_value,
            terms.entry_value,
            terms.installment_count,
            terms.first_due_date,
            date(2024, 1, 1),
        )
        .unwrap();

        store.insert_agreement(&agreement).unwrap();
        store.insert_installments(&installments).unwrap();
        (agreement, installments)
    }

    fn payment_for(installment: &Installment, cents: i64) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            installment_id: installment.id,
            amount: Money::from_minor(cents),
            payment_date: installment.due_date,
            payment_method: PaymentMethod::Pix,
            reference: None,
            late_fee: Money::ZERO,
            interest: Money::ZERO,
            discount: Money::ZERO,
            notes: None,
            recorded_by: "clerk".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_roundtrip_and_ordering() {
        let mut store = MemoryStore::new();
        let (agreement, installments) = seeded_agreement(&mut store);

        let fetched = store.agreement(agreement.id).unwrap().unwrap();
        assert_eq!(fetched, agreement);

        let listed = store.installments_for_agreement(agreement.id).unwrap();
        let numbers: Vec<u32> = listed.iter().map(|i| i.installment_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(listed.len(), installments.len());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = MemoryStore::new();
        let (agreement, _) = seeded_agreement(&mut store);
        assert!(store.insert_agreement(&agreement).is_err());
    }

    #[test]
    fn test_remove_cascades_to_installments_only() {
        let mut store = MemoryStore::new();
        let (agreement, installments) = seeded_agreement(&mut store);
        store
            .append_payment(&payment_for(&installments[0], 100_00))
            .unwrap();

        store.remove_agreement(agreement.id).unwrap();

        assert!(store.agreement(agreement.id).unwrap().is_none());
        assert!(store.installments_for_agreement(agreement.id).unwrap().is_empty());
        // ledger rows survive removal
        assert_eq!(store.payments.len(), 1);
    }

    #[test]
    fn test_payment_history_ordered_by_date() {
        let mut store = MemoryStore::new();
        let (agreement, installments) = seeded_agreement(&mut store);

        let mut late = payment_for(&installments[1], 200_00);
        late.payment_date = date(2024, 3, 15);
        let mut early = payment_for(&installments[0], 100_00);
        early.payment_date = date(2024, 2, 9);

        store.append_payment(&late).unwrap();
        store.append_payment(&early).unwrap();

        let history = store.payments_for_agreement(agreement.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, early.id);
        assert_eq!(history[1].id, late.id);

        assert!(store.agreement_has_payments(agreement.id).unwrap());
    }

    #[test]
    fn test_unknown_agreement_reads_as_none() {
        let store = MemoryStore::new();
        assert!(store.agreement(Uuid::new_v4()).unwrap().is_none());
        assert!(!store.agreement_has_payments(Uuid::new_v4()).unwrap());
    }
}
