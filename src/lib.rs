pub mod accrual;
pub mod agreement;
pub mod collaborators;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod payment;
pub mod schedule;
pub mod store;
pub mod types;

// re-export key types
pub use accrual::{accrue, Accrual};
pub use agreement::{derive_state, FinancialAgreement, Installment, PaymentRecord};
pub use collaborators::{AuditEntry, AuditSink, CaseDirectory, CaseParties, DocumentArchive};
pub use config::{AgreementTerms, EngineConfig, ReleaseTerms};
pub use decimal::{days_past_due, Money, Rate};
pub use engine::{LedgerEngine, PaymentOutcome};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use lifecycle::{CaseUpdate, CaseUpdateOutcome};
pub use payment::{apply_payment, AppliedPayment, PaymentInput};
pub use schedule::generate_schedule;
pub use store::{LedgerStore, MemoryStore};
pub use types::{
    AgreementId, AgreementKind, AgreementStatus, AgreementType, CaseId, CaseStatus, EntityId,
    InstallmentId, InstallmentStatus, PaymentId, PaymentMethod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
