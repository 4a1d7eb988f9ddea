//! Operator confirmation before destructive or bulk operations.

/// Asks an operator to approve an action.
///
/// Repair actions call this once before touching the remote collection. A
/// `false` answer turns the action into a no-op.
pub trait Confirm: Send + Sync {
    /// Returns `true` if the operator approved `prompt`.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt with a fixed value. Used for `--yes` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        log::debug!("Auto-answering {:?} with {}", prompt, self.0);
        self.0
    }
}
