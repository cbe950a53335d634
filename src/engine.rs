use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde_json::json;
use tracing::{error, info, warn};

use crate::accrual::{accrue, Accrual};
use crate::agreement::{derive_state, FinancialAgreement, Installment, PaymentRecord};
use crate::collaborators::{AuditEntry, AuditSink, CaseDirectory, DocumentArchive};
use crate::config::{AgreementTerms, EngineConfig, ReleaseTerms};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::payment::{apply_payment, PaymentInput};
use crate::schedule::generate_schedule;
use crate::store::LedgerStore;
use crate::types::{AgreementId, AgreementStatus, CaseId, InstallmentId};

/// result of recording one payment, reflecting post-derive state
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub agreement: FinancialAgreement,
    pub installment: Installment,
    pub record: PaymentRecord,
}

/// the financial agreement and installment ledger engine
///
/// Owns the store and the collaborator seams; one engine serializes all
/// mutations, and the store contract keeps the agreement aggregate as the
/// unit of mutual exclusion for implementations that go further.
pub struct LedgerEngine<'t, S: LedgerStore> {
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
    pub(crate) directory: Box<dyn CaseDirectory>,
    pub(crate) archive: Box<dyn DocumentArchive>,
    pub(crate) audit: Box<dyn AuditSink>,
    pub(crate) time: &'t SafeTimeProvider,
    pub(crate) events: EventStore,
}

impl<'t, S: LedgerStore> LedgerEngine<'t, S> {
    pub fn new(
        store: S,
        config: EngineConfig,
        directory: Box<dyn CaseDirectory>,
        archive: Box<dyn DocumentArchive>,
        audit: Box<dyn AuditSink>,
        time: &'t SafeTimeProvider,
    ) -> Self {
        Self {
            store,
            config,
            directory,
            archive,
            audit,
            time,
            events: EventStore::new(),
        }
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// create the standard agreement for a case and materialize its schedule
    pub fn create_agreement(
        &mut self,
        actor: &str,
        terms: &AgreementTerms,
    ) -> Result<FinancialAgreement> {
        let existing = self.store.agreements_for_case(terms.case_id)?;
        if existing.iter().any(|a| a.is_live_standard()) {
            return Err(LedgerError::DuplicateStandardAgreement {
                case_id: terms.case_id,
            });
        }
        self.create_standard(actor, terms, 0)
    }

    pub(crate) fn create_standard(
        &mut self,
        actor: &str,
        terms: &AgreementTerms,
        renegotiation_count: u32,
    ) -> Result<FinancialAgreement> {
        terms.validate()?;
        let parties = self.directory.case_parties(terms.case_id)?;
        let now = self.time.now();
        let today = self.today();

        let mut agreement =
            FinancialAgreement::from_terms(terms, parties.executed, parties.client, now);
        agreement.renegotiation_count = renegotiation_count;

        let installments = generate_schedule(
            agreement.id,
            terms.total_value,
            terms.entry_value,
            terms.installment_count,
            terms.first_due_date,
            today,
        )?;
        derive_state(
            &mut agreement,
            &installments,
            today,
            self.config.overdue_threshold_days,
        )?;

        self.store.insert_agreement(&agreement)?;
        if let Err(err) = self.store.insert_installments(&installments) {
            // compensate so a half-written aggregate never survives
            let _ = self.store.remove_agreement(agreement.id);
            return Err(err);
        }

        info!(
            "created agreement {} for case {} ({} installments of {})",
            agreement.id, agreement.case_id, agreement.installment_count, agreement.installment_value
        );
        self.events.emit(Event::AgreementCreated {
            agreement_id: agreement.id,
            case_id: agreement.case_id,
            total_value: agreement.total_value,
            entry_value: agreement.entry_value,
            installment_count: agreement.installment_count,
            timestamp: now,
        });
        self.record_audit(
            "agreement.created",
            actor,
            json!({
                "agreement_id": agreement.id,
                "case_id": agreement.case_id,
                "total_value": agreement.total_value,
                "entry_value": agreement.entry_value,
                "installment_count": agreement.installment_count,
            }),
        );

        Ok(agreement)
    }

    /// create a judicial-release agreement, additive to the standard one
    pub fn create_release_agreement(
        &mut self,
        actor: &str,
        case_id: CaseId,
        terms: &ReleaseTerms,
    ) -> Result<FinancialAgreement> {
        terms.validate()?;
        let parties = self.directory.case_parties(case_id)?;
        let now = self.time.now();
        let today = self.today();

        let mut agreement = FinancialAgreement::judicial_release(
            case_id,
            terms.value,
            parties.executed,
            parties.client,
            terms.reference.clone(),
            now,
        );
        let installments =
            generate_schedule(agreement.id, terms.value, crate::decimal::Money::ZERO, 1, today, today)?;
        derive_state(
            &mut agreement,
            &installments,
            today,
            self.config.overdue_threshold_days,
        )?;

        self.store.insert_agreement(&agreement)?;
        if let Err(err) = self.store.insert_installments(&installments) {
            let _ = self.store.remove_agreement(agreement.id);
            return Err(err);
        }

        info!(
            "created judicial release agreement {} for case {} worth {}",
            agreement.id, case_id, terms.value
        );
        self.events.emit(Event::JudicialReleaseCreated {
            agreement_id: agreement.id,
            case_id,
            value: terms.value,
            timestamp: now,
        });
        self.record_audit(
            "agreement.release_created",
            actor,
            json!({
                "agreement_id": agreement.id,
                "case_id": case_id,
                "value": terms.value,
            }),
        );

        Ok(agreement)
    }

    /// record a payment against an installment
    ///
    /// Atomic: every check and the aggregate recompute run on copies, and
    /// nothing is persisted unless all of them pass.
    pub fn record_installment_payment(
        &mut self,
        actor: &str,
        installment_id: InstallmentId,
        input: &PaymentInput,
    ) -> Result<PaymentOutcome> {
        let installment = self
            .store
            .installment(installment_id)?
            .ok_or(LedgerError::InstallmentNotFound { id: installment_id })?;
        let mut agreement = self
            .store
            .agreement(installment.agreement_id)?
            .ok_or(LedgerError::AgreementNotFound {
                id: installment.agreement_id,
            })?;

        // an installment of a cancelled agreement is gone as far as payers are concerned
        if agreement.status == AgreementStatus::Cancelled {
            return Err(LedgerError::InstallmentNotFound { id: installment_id });
        }

        let now = self.time.now();
        let today = self.today();
        let applied = apply_payment(
            &installment,
            agreement.late_fee_pct,
            agreement.daily_interest_pct,
            input,
            actor,
            now,
        )?;

        let mut installments = self.store.installments_for_agreement(agreement.id)?;
        for slot in installments.iter_mut() {
            if slot.id == applied.installment.id {
                *slot = applied.installment.clone();
            }
        }

        let old_status = agreement.status;
        if let Err(err) = derive_state(
            &mut agreement,
            &installments,
            today,
            self.config.overdue_threshold_days,
        ) {
            error!(
                "aborting payment on installment {}: {}",
                installment_id, err
            );
            return Err(err);
        }
        agreement.updated_at = now;

        self.store.update_installment(&applied.installment)?;
        self.store.append_payment(&applied.record)?;
        self.store.update_agreement(&agreement)?;

        info!(
            "recorded payment of {} against installment {} of agreement {}",
            applied.record.amount, installment_id, agreement.id
        );
        self.events.emit(Event::PaymentRecorded {
            payment_id: applied.record.id,
            installment_id,
            agreement_id: agreement.id,
            amount: applied.record.amount,
            late_fee: applied.record.late_fee,
            interest: applied.record.interest,
            method: applied.record.payment_method,
            payment_date: applied.record.payment_date,
            timestamp: now,
        });
        if applied.settled {
            self.events.emit(Event::InstallmentSettled {
                installment_id,
                agreement_id: agreement.id,
                installment_number: applied.installment.installment_number,
                paid_date: applied.record.payment_date,
                timestamp: now,
            });
        }
        self.emit_status_events(old_status, &agreement);
        self.record_audit(
            "payment.recorded",
            actor,
            json!({
                "payment_id": applied.record.id,
                "installment_id": installment_id,
                "agreement_id": agreement.id,
                "amount": applied.record.amount,
                "late_fee": applied.record.late_fee,
                "interest": applied.record.interest,
                "discount": applied.record.discount,
                "method": applied.record.payment_method,
            }),
        );

        Ok(PaymentOutcome {
            agreement,
            installment: applied.installment,
            record: applied.record,
        })
    }

    /// preview what an installment owes as of a date, defaulting to today
    pub fn preview_accrual(
        &self,
        installment_id: InstallmentId,
        as_of: Option<NaiveDate>,
    ) -> Result<Accrual> {
        let installment = self
            .store
            .installment(installment_id)?
            .ok_or(LedgerError::InstallmentNotFound { id: installment_id })?;
        let agreement = self
            .store
            .agreement(installment.agreement_id)?
            .ok_or(LedgerError::AgreementNotFound {
                id: installment.agreement_id,
            })?;

        Ok(accrue(
            &installment,
            as_of.unwrap_or_else(|| self.today()),
            agreement.late_fee_pct,
            agreement.daily_interest_pct,
        ))
    }

    /// fetch an agreement with derived state recomputed as of today
    ///
    /// Overdue and defaulted detection is lazy; this is the read path that
    /// realizes it, persisting the refreshed aggregate when it moved.
    pub fn refresh_agreement(&mut self, agreement_id: AgreementId) -> Result<FinancialAgreement> {
        let mut agreement = self
            .store
            .agreement(agreement_id)?
            .ok_or(LedgerError::AgreementNotFound { id: agreement_id })?;
        let installments = self.store.installments_for_agreement(agreement_id)?;

        let before = agreement.clone();
        derive_state(
            &mut agreement,
            &installments,
            self.today(),
            self.config.overdue_threshold_days,
        )?;

        if agreement != before {
            agreement.updated_at = self.time.now();
            self.store.update_agreement(&agreement)?;
            self.emit_status_events(before.status, &agreement);
        }
        Ok(agreement)
    }

    /// the agreement's installments, ordered, with the overdue view applied
    pub fn agreement_installments(&self, agreement_id: AgreementId) -> Result<Vec<Installment>> {
        self.require_agreement(agreement_id)?;
        let today = self.today();
        let installments = self
            .store
            .installments_for_agreement(agreement_id)?
            .into_iter()
            .map(|mut installment| {
                installment.status = installment.effective_status(today);
                installment
            })
            .collect();
        Ok(installments)
    }

    /// full payment history of an agreement, ordered by payment date
    pub fn agreement_payment_history(
        &self,
        agreement_id: AgreementId,
    ) -> Result<Vec<PaymentRecord>> {
        self.require_agreement(agreement_id)?;
        self.store.payments_for_agreement(agreement_id)
    }

    /// every agreement attached to a case, standard and release alike
    pub fn case_agreements(&self, case_id: CaseId) -> Result<Vec<FinancialAgreement>> {
        self.store.agreements_for_case(case_id)
    }

    /// drain the events collected since the last call
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    fn require_agreement(&self, agreement_id: AgreementId) -> Result<FinancialAgreement> {
        self.store
            .agreement(agreement_id)?
            .ok_or(LedgerError::AgreementNotFound { id: agreement_id })
    }

    pub(crate) fn emit_status_events(
        &mut self,
        old_status: AgreementStatus,
        agreement: &FinancialAgreement,
    ) {
        if old_status == agreement.status {
            return;
        }
        let timestamp = self.time.now();
        self.events.emit(Event::StatusChanged {
            agreement_id: agreement.id,
            old_status,
            new_status: agreement.status,
            timestamp,
        });
        match agreement.status {
            AgreementStatus::Completed => {
                info!("agreement {} completed", agreement.id);
                self.events.emit(Event::AgreementCompleted {
                    agreement_id: agreement.id,
                    paid_amount: agreement.paid_amount,
                    timestamp,
                });
            }
            AgreementStatus::Defaulted => {
                warn!(
                    "agreement {} defaulted, {} days overdue",
                    agreement.id, agreement.days_overdue
                );
                self.events.emit(Event::AgreementDefaulted {
                    agreement_id: agreement.id,
                    days_overdue: agreement.days_overdue,
                    remaining_balance: agreement.remaining_balance,
                    timestamp,
                });
            }
            _ => {}
        }
    }

    pub(crate) fn record_audit(&self, action: &str, actor: &str, payload: serde_json::Value) {
        let entry = AuditEntry {
            action: action.to_string(),
            actor: actor.to_string(),
            payload,
            recorded_at: self.time.now(),
        };
        if let Err(message) = self.audit.record(entry) {
            warn!("audit sink failed for {action}: {message}");
        }
    }
}
