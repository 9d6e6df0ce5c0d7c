use thiserror::Error;

/// The only way a deferred value can fail: its producer rejected it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("settlement failed: {reason}")]
pub struct SettlementFailure {
    pub reason: String,
}

impl SettlementFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        SettlementFailure {
            reason: reason.into(),
        }
    }
}

/// A group strategy stopped because member `index` was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("member {index} of the group failed")]
pub struct GroupFailure {
    pub index: usize,
    #[source]
    pub source: SettlementFailure,
}
