//! Per-hub expense configuration.

use serde::{Deserialize, Serialize};

use hubledger_core::{Currency, DomainError, DomainResult, TaxRate, ValueObject};

/// Per-hub expense configuration (singleton per hub).
///
/// `next_number_seq` is owned by the expense engine's settings store: no
/// other writer may touch it, and increments are serialized per hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSettings {
    pub require_approval: bool,
    /// Auto-approval cutoff in minor units; ignored when `require_approval`
    /// is false.
    pub approval_threshold: u64,
    pub default_tax_rate: TaxRate,
    pub currency: Currency,
    /// When false, callers provide expense numbers themselves (still unique
    /// per hub).
    pub auto_numbering: bool,
    pub number_prefix: String,
    /// Next sequence value to assign, starting at 1.
    pub next_number_seq: u64,
}

impl Default for ExpenseSettings {
    fn default() -> Self {
        Self {
            require_approval: false,
            approval_threshold: 0,
            default_tax_rate: TaxRate::from_percent(21).expect("21% is a valid rate"),
            currency: Currency::eur(),
            auto_numbering: true,
            number_prefix: "EXP".to_string(),
            next_number_seq: 1,
        }
    }
}

impl ExpenseSettings {
    pub fn validate(&self) -> DomainResult<()> {
        if self.number_prefix.trim().is_empty() {
            return Err(DomainError::validation("number prefix cannot be empty"));
        }
        if self.number_prefix.len() > 10 {
            return Err(DomainError::validation(
                "number prefix must be at most 10 characters",
            ));
        }
        if self.next_number_seq == 0 {
            return Err(DomainError::validation("number sequence must start at 1"));
        }
        Ok(())
    }

    /// Snapshot of the approval rule, taken once at operation start.
    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            require_approval: self.require_approval,
            threshold: self.approval_threshold,
        }
    }
}

impl ValueObject for ExpenseSettings {}

/// The approval rule evaluated against an expense total (gross, minor units).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub require_approval: bool,
    pub threshold: u64,
}

impl ApprovalPolicy {
    /// Inclusive comparison: a total exactly at the threshold auto-approves.
    pub fn auto_approves(&self, total: u64) -> bool {
        !self.require_approval || total <= self.threshold
    }
}

impl ValueObject for ApprovalPolicy {}

/// Compose an expense number from prefix and sequence, e.g. `EXP-0042`.
///
/// Zero-padded to four digits; wider sequences keep all digits.
pub fn compose_number(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = ExpenseSettings::default();
        settings.validate().unwrap();
        assert!(settings.auto_numbering);
        assert_eq!(settings.number_prefix, "EXP");
        assert_eq!(settings.next_number_seq, 1);
        assert_eq!(settings.default_tax_rate.basis_points(), 2100);
        assert_eq!(settings.currency.code(), "EUR");
    }

    #[test]
    fn validate_rejects_bad_prefix_and_seq() {
        let mut settings = ExpenseSettings::default();
        settings.number_prefix = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = ExpenseSettings::default();
        settings.number_prefix = "TOOLONGPREFIX".to_string();
        assert!(settings.validate().is_err());

        let mut settings = ExpenseSettings::default();
        settings.next_number_seq = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn policy_without_required_approval_always_approves() {
        let policy = ApprovalPolicy {
            require_approval: false,
            threshold: 0,
        };
        assert!(policy.auto_approves(0));
        assert!(policy.auto_approves(u64::MAX));
    }

    #[test]
    fn policy_threshold_is_inclusive() {
        let policy = ApprovalPolicy {
            require_approval: true,
            threshold: 10_000,
        };
        assert!(policy.auto_approves(9_999));
        assert!(policy.auto_approves(10_000));
        assert!(!policy.auto_approves(10_001));
    }

    #[test]
    fn numbers_are_zero_padded_and_grow() {
        assert_eq!(compose_number("EXP", 1), "EXP-0001");
        assert_eq!(compose_number("EXP", 42), "EXP-0042");
        assert_eq!(compose_number("GAS", 12345), "GAS-12345");
    }
}
