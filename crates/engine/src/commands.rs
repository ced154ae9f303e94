//! Command structs for engine operations.
//!
//! These types group the parameters of write operations, keeping call sites
//! readable and avoiding long argument lists.

/// Credit a user's wallet.
///
/// `owner_id` is the authenticated caller identity; the engine trusts it.
/// A non-blank `reference` makes the call idempotent: repeating it with the
/// same amount returns the wallet unchanged.
#[derive(Clone, Debug)]
pub struct FundCmd {
    pub owner_id: String,
    pub amount_minor: i64,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl FundCmd {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            owner_id: owner_id.into(),
            amount_minor,
            reference: None,
            description: None,
        }
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
