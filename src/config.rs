use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{AgreementType, CaseId, EntityId};

/// engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// days past due before a pending installment marks the agreement Defaulted
    pub overdue_threshold_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overdue_threshold_days: 30,
        }
    }
}

/// negotiated terms of a standard agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementTerms {
    pub case_id: CaseId,
    pub agreement_type: AgreementType,
    pub total_value: Money,
    /// paid up front at signing, may be zero
    pub entry_value: Money,
    pub installment_count: u32,
    pub first_due_date: NaiveDate,
    /// flat fee applied once per overdue installment
    pub late_fee_pct: Rate,
    /// simple interest accrued per overdue day
    pub daily_interest_pct: Rate,
    pub guarantor_id: Option<EntityId>,
    pub notes: Option<String>,
}

impl AgreementTerms {
    pub fn validate(&self) -> Result<()> {
        if self.installment_count < 1 {
            return Err(LedgerError::InvalidTerms {
                message: format!("installment count must be at least 1, got {}", self.installment_count),
            });
        }
        if !self.total_value.is_positive() {
            return Err(LedgerError::InvalidTerms {
                message: format!("total value must be positive, got {}", self.total_value),
            });
        }
        if self.entry_value.is_negative() {
            return Err(LedgerError::InvalidTerms {
                message: format!("entry value must not be negative, got {}", self.entry_value),
            });
        }
        if self.entry_value > self.total_value {
            return Err(LedgerError::InvalidTerms {
                message: format!(
                    "entry value {} exceeds total value {}",
                    self.entry_value, self.total_value
                ),
            });
        }
        if self.late_fee_pct.is_negative() || self.daily_interest_pct.is_negative() {
            return Err(LedgerError::InvalidTerms {
                message: "penalty percentages must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// the amount financed through the schedule
    pub fn financed_value(&self) -> Money {
        self.total_value - self.entry_value
    }
}

/// terms of a judicial release (alvara), settled as a single cash installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseTerms {
    pub value: Money,
    pub reference: Option<String>,
}

impl ReleaseTerms {
    pub fn validate(&self) -> Result<()> {
        if !self.value.is_positive() {
            return Err(LedgerError::InvalidTerms {
                message: format!("release value must be positive, got {}", self.value),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn terms() -> AgreementTerms {
        AgreementTerms {
            case_id: Uuid::new_v4(),
            agreement_type: AgreementType::Judicial,
            total_value: Money::from_major(1_000),
            entry_value: Money::from_major(100),
            installment_count: 3,
            first_due_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            late_fee_pct: Rate::from_percentage(dec!(2)),
            daily_interest_pct: Rate::from_percentage(dec!(0.033)),
            guarantor_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_valid_terms() {
        assert!(terms().validate().is_ok());
    }

    #[test]
    fn test_zero_installments_rejected() {
        let mut t = terms();
        t.installment_count = 0;
        assert!(matches!(
            t.validate(),
            Err(LedgerError::InvalidTerms { .. })
        ));
    }

    #[test]
    fn test_entry_over_total_rejected() {
        let mut t = terms();
        t.entry_value = Money::from_major(1_001);
        assert!(matches!(
            t.validate(),
            Err(LedgerError::InvalidTerms { .. })
        ));
    }

    #[test]
    fn test_release_value_must_be_positive() {
        let release = ReleaseTerms {
            value: Money::ZERO,
            reference: None,
        };
        assert!(release.validate().is_err());
    }
}
