use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a financial agreement
pub type AgreementId = Uuid;

/// unique identifier for an installment
pub type InstallmentId = Uuid;

/// unique identifier for a payment record
pub type PaymentId = Uuid;

/// unique identifier for a legal case
pub type CaseId = Uuid;

/// unique identifier for a registered party (client, executed, guarantor)
pub type EntityId = Uuid;

/// how the settlement was negotiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementType {
    /// homologated in court
    Judicial,
    /// negotiated out of court
    Extrajudicial,
    /// closed during a hearing
    InHearing,
    /// negotiated at the creditor's store
    AtStore,
    /// single payment, no installment plan
    CashInFull,
}

/// role of the agreement within its case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementKind {
    /// the primary installment-based settlement, at most one live per case
    Standard,
    /// judicial release of funds (alvara), additive to the standard agreement
    JudicialRelease,
}

/// agreement lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// installments outstanding and performing
    Active,
    /// every installment settled
    Completed,
    /// an installment overdue past the configured threshold
    Defaulted,
    /// retired by case automation, history preserved
    Cancelled,
    /// superseded by an agreement with renegotiated terms
    Renegotiated,
}

impl AgreementStatus {
    /// statuses the state deriver may overwrite
    pub fn is_derivable(&self) -> bool {
        matches!(self, Self::Active | Self::Completed | Self::Defaulted)
    }

    /// a live agreement counts against the one-standard-per-case limit
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Renegotiated)
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    /// awaiting payment
    Pending,
    /// settled, immutable apart from corrective reversal
    Paid,
    /// pending and past due, derived view only
    Overdue,
    /// retired together with a renegotiated schedule
    Cancelled,
}

/// accepted payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    BankTransfer,
    Check,
    Cash,
    CreditCard,
    DebitCard,
}

/// status of the owning legal case, as observed by the automation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    InProgress,
    Agreement,
    Extinguished,
    Paid,
}
