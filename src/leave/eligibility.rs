use std::collections::HashSet;

use crate::model::leave_request::LeaveType;

/// Precondition for restricted leave categories (parental, childcare).
pub trait EligibilityPolicy: Send + Sync {
    fn is_eligible(&self, employee_name: &str, leave_type: &LeaveType) -> bool;
}

/// Allow-list read from `FAMILY_LEAVE_ELIGIBLE`. Unrestricted categories are
/// always allowed.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredEligibility {
    eligible: HashSet<String>,
}

impl ConfiguredEligibility {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            eligible: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

impl EligibilityPolicy for ConfiguredEligibility {
    fn is_eligible(&self, employee_name: &str, leave_type: &LeaveType) -> bool {
        !leave_type.is_restricted() || self.eligible.contains(&employee_name.trim().to_lowercase())
    }
}
