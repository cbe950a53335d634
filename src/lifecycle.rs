use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::agreement::FinancialAgreement;
use crate::config::{AgreementTerms, ReleaseTerms};
use crate::engine::LedgerEngine;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::schedule::generate_schedule;
use crate::store::LedgerStore;
use crate::types::{AgreementId, AgreementStatus, CaseId, CaseStatus, InstallmentStatus};

/// one observed transition of the owning case's status machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub case_id: CaseId,
    pub previous_status: CaseStatus,
    pub new_status: CaseStatus,
    /// standard agreement terms, present when the case moved into Agreement
    pub terms: Option<AgreementTerms>,
    /// judicial-release value, independent of the standard terms
    pub release: Option<ReleaseTerms>,
}

/// what the automation did in response to a case transition
///
/// Agreement-side failures are collected in `errors` rather than failing the
/// case update itself; the caller surfaces them for manual retry.
#[derive(Debug)]
pub struct CaseUpdateOutcome {
    pub case_id: CaseId,
    pub new_status: CaseStatus,
    pub standard: Option<FinancialAgreement>,
    pub release: Option<FinancialAgreement>,
    pub removed: Option<AgreementId>,
    pub errors: Vec<LedgerError>,
}

impl CaseUpdateOutcome {
    fn new(case_id: CaseId, new_status: CaseStatus) -> Self {
        Self {
            case_id,
            new_status,
            standard: None,
            release: None,
            removed: None,
            errors: Vec::new(),
        }
    }
}

impl<'t, S: LedgerStore> LedgerEngine<'t, S> {
    /// react to a case status transition
    ///
    /// The transition table:
    /// - `* -> Agreement` with terms: create the standard agreement, or fold
    ///   the new terms into the existing one (renegotiating when the financed
    ///   shape changed);
    /// - `* -> Agreement` with a release value: additionally create the
    ///   independent alvara agreement;
    /// - `Agreement -> *`: retire the standard agreement, deleting it only
    ///   when no payment was ever recorded;
    /// - `* -> Extinguished`: request document archival, best effort.
    pub fn update_case(&mut self, actor: &str, update: &CaseUpdate) -> Result<CaseUpdateOutcome> {
        if let Some(terms) = &update.terms {
            if terms.case_id != update.case_id {
                return Err(LedgerError::InvalidTerms {
                    message: format!(
                        "terms reference case {} but the update targets case {}",
                        terms.case_id, update.case_id
                    ),
                });
            }
        }

        let mut outcome = CaseUpdateOutcome::new(update.case_id, update.new_status);

        if update.new_status == CaseStatus::Agreement {
            if let Some(terms) = &update.terms {
                match self.upsert_standard(actor, terms) {
                    Ok(agreement) => outcome.standard = Some(agreement),
                    Err(err) => {
                        warn!(
                            "case {} moved to Agreement but the standard agreement failed: {}",
                            update.case_id, err
                        );
                        outcome.errors.push(err);
                    }
                }
            }
            if let Some(release) = &update.release {
                match self.create_release_agreement(actor, update.case_id, release) {
                    Ok(agreement) => outcome.release = Some(agreement),
                    Err(err) => {
                        warn!(
                            "case {} moved to Agreement but the release agreement failed: {}",
                            update.case_id, err
                        );
                        outcome.errors.push(err);
                    }
                }
            }
        } else {
            if update.previous_status == CaseStatus::Agreement {
                match self.retire_standard(actor, update.case_id) {
                    Ok(removed) => outcome.removed = removed,
                    Err(err) => {
                        warn!(
                            "failed to retire the standard agreement of case {}: {}",
                            update.case_id, err
                        );
                        outcome.errors.push(err);
                    }
                }
            }
            if update.new_status == CaseStatus::Extinguished {
                let timestamp = self.time.now();
                self.events.emit(Event::CaseArchivalRequested {
                    case_id: update.case_id,
                    timestamp,
                });
                if let Err(message) = self.archive.archive_case_documents(update.case_id) {
                    warn!("document archival failed for case {}: {}", update.case_id, message);
                    outcome.errors.push(LedgerError::Archive { message });
                }
            }
        }

        self.record_audit(
            "case.updated",
            actor,
            json!({
                "case_id": update.case_id,
                "previous_status": update.previous_status,
                "new_status": update.new_status,
                "deferred_errors": outcome.errors.len(),
            }),
        );

        Ok(outcome)
    }

    /// create or fold terms into the case's standard agreement
    fn upsert_standard(
        &mut self,
        actor: &str,
        terms: &AgreementTerms,
    ) -> Result<FinancialAgreement> {
        terms.validate()?;

        let live = self
            .store
            .agreements_for_case(terms.case_id)?
            .into_iter()
            .find(|a| a.is_live_standard());

        let existing = match live {
            None => return self.create_standard(actor, terms, 0),
            Some(existing) => existing,
        };

        // the schedule only has to move when the financed shape moved
        let reschedule = existing.installment_count != terms.installment_count
            || existing.total_value != terms.total_value
            || existing.entry_value != terms.entry_value;

        if !reschedule {
            return self.amend_in_place(actor, existing, terms);
        }

        if self.store.agreement_has_payments(existing.id)? {
            self.supersede(actor, existing, terms)
        } else {
            self.regenerate_in_place(actor, existing, terms)
        }
    }

    /// non-structural terms change: same row, same schedule
    fn amend_in_place(
        &mut self,
        actor: &str,
        existing: FinancialAgreement,
        terms: &AgreementTerms,
    ) -> Result<FinancialAgreement> {
        let now = self.time.now();
        let old_status = existing.status;

        let mut updated = existing;
        updated.agreement_type = terms.agreement_type;
        updated.late_fee_pct = terms.late_fee_pct;
        updated.daily_interest_pct = terms.daily_interest_pct;
        updated.guarantor_id = terms.guarantor_id;
        updated.notes = terms.notes.clone();
        updated.status = AgreementStatus::Active;
        updated.updated_at = now;

        let installments = self.store.installments_for_agreement(updated.id)?;
        crate::agreement::derive_state(
            &mut updated,
            &installments,
            self.today(),
            self.config.overdue_threshold_days,
        )?;
        self.store.update_agreement(&updated)?;

        info!("amended agreement {} terms in place", updated.id);
        self.emit_status_events(old_status, &updated);
        self.record_audit(
            "agreement.terms_updated",
            actor,
            json!({
                "agreement_id": updated.id,
                "case_id": updated.case_id,
            }),
        );
        Ok(updated)
    }

    /// structural change with a clean ledger: same row, regenerated schedule
    fn regenerate_in_place(
        &mut self,
        actor: &str,
        existing: FinancialAgreement,
        terms: &AgreementTerms,
    ) -> Result<FinancialAgreement> {
        let now = self.time.now();
        let today = self.today();
        let old_status = existing.status;

        let mut updated = existing;
        updated.agreement_type = terms.agreement_type;
        updated.total_value = terms.total_value;
        updated.entry_value = terms.entry_value;
        updated.installment_count = terms.installment_count;
        updated.installment_value = terms.financed_value().split_even(terms.installment_count);
        updated.late_fee_pct = terms.late_fee_pct;
        updated.daily_interest_pct = terms.daily_interest_pct;
        updated.guarantor_id = terms.guarantor_id;
        updated.notes = terms.notes.clone();
        updated.status = AgreementStatus::Active;
        updated.renegotiation_count += 1;
        updated.updated_at = now;

        let installments = generate_schedule(
            updated.id,
            terms.total_value,
            terms.entry_value,
            terms.installment_count,
            terms.first_due_date,
            today,
        )?;
        crate::agreement::derive_state(
            &mut updated,
            &installments,
            today,
            self.config.overdue_threshold_days,
        )?;

        self.store.delete_installments(updated.id)?;
        self.store.insert_installments(&installments)?;
        self.store.update_agreement(&updated)?;

        info!(
            "renegotiated agreement {} in place ({} installments of {})",
            updated.id, updated.installment_count, updated.installment_value
        );
        self.events.emit(Event::AgreementRenegotiated {
            agreement_id: updated.id,
            successor_id: updated.id,
            renegotiation_count: updated.renegotiation_count,
            total_value: updated.total_value,
            timestamp: now,
        });
        self.emit_status_events(old_status, &updated);
        self.record_audit(
            "agreement.renegotiated",
            actor,
            json!({
                "agreement_id": updated.id,
                "case_id": updated.case_id,
                "renegotiation_count": updated.renegotiation_count,
            }),
        );
        Ok(updated)
    }

    /// structural change with payments on the books: retire the old row as
    /// Renegotiated and create a successor
    fn supersede(
        &mut self,
        actor: &str,
        existing: FinancialAgreement,
        terms: &AgreementTerms,
    ) -> Result<FinancialAgreement> {
        let now = self.time.now();

        let mut retired = existing;
        for mut installment in self.store.installments_for_agreement(retired.id)? {
            if installment.status == InstallmentStatus::Pending {
                installment.status = InstallmentStatus::Cancelled;
                self.store.update_installment(&installment)?;
            }
        }
        let old_status = retired.status;
        retired.status = AgreementStatus::Renegotiated;
        retired.updated_at = now;
        self.store.update_agreement(&retired)?;

        let successor = self.create_standard(actor, terms, retired.renegotiation_count + 1)?;

        info!(
            "superseded agreement {} with {} after renegotiation",
            retired.id, successor.id
        );
        self.events.emit(Event::StatusChanged {
            agreement_id: retired.id,
            old_status,
            new_status: AgreementStatus::Renegotiated,
            timestamp: now,
        });
        self.events.emit(Event::AgreementRenegotiated {
            agreement_id: retired.id,
            successor_id: successor.id,
            renegotiation_count: successor.renegotiation_count,
            total_value: successor.total_value,
            timestamp: now,
        });
        self.record_audit(
            "agreement.renegotiated",
            actor,
            json!({
                "agreement_id": retired.id,
                "successor_id": successor.id,
                "case_id": successor.case_id,
                "renegotiation_count": successor.renegotiation_count,
            }),
        );
        Ok(successor)
    }

    /// retire the standard agreement when the case leaves Agreement
    ///
    /// Deleted only when its ledger is empty; with payments on the books it
    /// stays untouched as historical record.
    fn retire_standard(&mut self, actor: &str, case_id: CaseId) -> Result<Option<AgreementId>> {
        let live = self
            .store
            .agreements_for_case(case_id)?
            .into_iter()
            .find(|a| a.is_live_standard());

        let agreement = match live {
            None => return Ok(None),
            Some(agreement) => agreement,
        };

        if self.store.agreement_has_payments(agreement.id)? {
            info!(
                "keeping agreement {} of case {} as history, payments recorded",
                agreement.id, case_id
            );
            return Ok(None);
        }

        self.store.remove_agreement(agreement.id)?;
        info!("removed agreement {} of case {}", agreement.id, case_id);
        self.events.emit(Event::AgreementRemoved {
            agreement_id: agreement.id,
            case_id,
            timestamp: self.time.now(),
        });
        self.record_audit(
            "agreement.removed",
            actor,
            json!({
                "agreement_id": agreement.id,
                "case_id": case_id,
            }),
        );
        Ok(Some(agreement.id))
    }
}
