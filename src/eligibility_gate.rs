//! Decides when eligibility data must be collected before a category can
//! complete.
//!
//! Rules are keyed to cursor positions, not category identity: with a
//! reordered journey the prompts still appear on the 2nd and 3rd category.

use crate::models::{Eligibility, EligibilityRequirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRule {
    /// Zero-based cursor position the rule fires at.
    pub cursor: usize,
    pub requirement: EligibilityRequirement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityGate {
    rules: Vec<GateRule>,
}

impl EligibilityGate {
    pub fn new(rules: Vec<GateRule>) -> Self {
        Self { rules }
    }

    /// Income on the second category, pincode on the third.
    pub fn standard() -> Self {
        Self::new(vec![
            GateRule {
                cursor: 1,
                requirement: EligibilityRequirement::Income,
            },
            GateRule {
                cursor: 2,
                requirement: EligibilityRequirement::Pincode,
            },
        ])
    }

    /// Never requires collection.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// The first unmet requirement for this cursor position, if any.
    pub fn evaluate(&self, cursor: usize, eligibility: &Eligibility) -> Option<EligibilityRequirement> {
        self.rules
            .iter()
            .filter(|rule| rule.cursor == cursor)
            .map(|rule| rule.requirement)
            .find(|requirement| !is_satisfied(*requirement, eligibility))
    }
}

impl Default for EligibilityGate {
    fn default() -> Self {
        Self::standard()
    }
}

fn is_satisfied(requirement: EligibilityRequirement, eligibility: &Eligibility) -> bool {
    match requirement {
        EligibilityRequirement::Income => eligibility.has_income(),
        EligibilityRequirement::Pincode => eligibility.has_pincode(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_category_never_gated() {
        let gate = EligibilityGate::standard();
        assert_eq!(gate.evaluate(0, &Eligibility::default()), None);
    }

    #[test]
    fn test_second_category_requires_income() {
        let gate = EligibilityGate::standard();
        assert_eq!(
            gate.evaluate(1, &Eligibility::default()),
            Some(EligibilityRequirement::Income)
        );

        let with_income = Eligibility {
            inhand_income: Some(40_000),
            ..Default::default()
        };
        assert_eq!(gate.evaluate(1, &with_income), None);
    }

    #[test]
    fn test_third_category_requires_pincode_only() {
        let gate = EligibilityGate::standard();
        let with_income = Eligibility {
            inhand_income: Some(40_000),
            ..Default::default()
        };
        assert_eq!(
            gate.evaluate(2, &with_income),
            Some(EligibilityRequirement::Pincode)
        );

        let with_pincode = Eligibility {
            pincode: Some("560001".to_string()),
            ..Default::default()
        };
        assert_eq!(gate.evaluate(2, &with_pincode), None);
    }

    #[test]
    fn test_later_positions_and_disabled_gate() {
        let gate = EligibilityGate::standard();
        assert_eq!(gate.evaluate(3, &Eligibility::default()), None);
        assert_eq!(gate.evaluate(4, &Eligibility::default()), None);
        assert_eq!(EligibilityGate::disabled().evaluate(1, &Eligibility::default()), None);
    }
}
