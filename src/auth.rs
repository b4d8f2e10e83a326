//! Authorization token granting the compiler access to raw condition definitions.

use std::sync::OnceLock;

/// Opaque value shared between a model and the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionToken(u64);

impl ConditionToken {
    fn generate() -> Self {
        ConditionToken(rand::random())
    }
}

/// A token generated once on first use and kept for the cell's lifetime.
#[derive(Debug, Default)]
pub struct TokenCell(OnceLock<ConditionToken>);

impl TokenCell {
    pub const fn new() -> Self {
        TokenCell(OnceLock::new())
    }

    pub fn get(&self) -> ConditionToken {
        *self.0.get_or_init(ConditionToken::generate)
    }

    pub fn verify(&self, token: &ConditionToken) -> bool {
        self.get() == *token
    }
}
