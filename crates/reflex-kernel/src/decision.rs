//! The [`DecisionEngine`] seam between the control loop and whatever picks
//! the next actions.

use reflex_types::{ActionToken, Context, ReflexError};

/// Maps one cycle's facts to the actions to execute, in order.
///
/// Implementations are `Send + Sync` so a loop running on its own thread can
/// own one while clones (for rule edits, `explain` queries) live elsewhere.
pub trait DecisionEngine: Send + Sync {
    /// Short identifier used in logs, e.g. `"rule_based"`.
    fn name(&self) -> &str;

    /// Decide the actions for `context`. An empty list means "do nothing
    /// this cycle".
    ///
    /// # Errors
    ///
    /// An `Err` marks the decide phase of the cycle as failed. Engines that
    /// can degrade (a reasoner whose backend is down) should return an empty
    /// list instead.
    fn evaluate(&self, context: &Context) -> Result<Vec<ActionToken>, ReflexError>;

    /// Human readable account of the most recent or the would-be decision
    /// for `context`.
    fn explain(&self, context: &Context) -> String;
}
