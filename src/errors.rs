use thiserror::Error;

use crate::decimal::Money;
use crate::types::{AgreementId, CaseId, InstallmentId, InstallmentStatus};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid terms: {message}")]
    InvalidTerms {
        message: String,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("agreement not found: {id}")]
    AgreementNotFound {
        id: AgreementId,
    },

    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: InstallmentId,
    },

    #[error("case has no registered parties: {id}")]
    CaseUnknown {
        id: CaseId,
    },

    #[error("installment already paid: {installment_id}")]
    AlreadyPaid {
        installment_id: InstallmentId,
    },

    #[error("installment not payable: {installment_id} is {status:?}")]
    InstallmentNotPayable {
        installment_id: InstallmentId,
        status: InstallmentStatus,
    },

    #[error("case already has a live standard agreement: {case_id}")]
    DuplicateStandardAgreement {
        case_id: CaseId,
    },

    #[error("concurrent mutation on agreement {agreement_id}, retry the operation")]
    Contention {
        agreement_id: AgreementId,
    },

    #[error("invariant violation: {message}")]
    InvariantViolation {
        message: String,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },

    #[error("document archival failed: {message}")]
    Archive {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
