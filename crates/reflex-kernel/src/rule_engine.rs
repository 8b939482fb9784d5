//! [`RuleEngine`] – prioritized condition→action arbitration.
//!
//! A [`Rule`] pairs an ordered set of fact predicates with an ordered list
//! of [`ActionToken`]s. Rules are kept sorted by priority, highest first,
//! with ties resolved by insertion order. [`RuleEngine::evaluate`] walks that
//! order and returns the actions of the **first** enabled rule whose
//! predicates all hold. Lower-priority rules never contribute, even when
//! they also match.
//!
//! The rule set lives behind `RwLock<Arc<Vec<Rule>>>`. Evaluation clones the
//! `Arc` and iterates without holding the lock; edits build a new vector and
//! swap it in, so a cycle always sees one consistent rule set.
//!
//! # Example
//!
//! ```
//! use reflex_kernel::rule_engine::{Predicate, Rule, RuleEngine};
//! use reflex_types::{ActionToken, Context};
//!
//! let engine = RuleEngine::new(vec![
//!     Rule::new("avoid", 1.0)
//!         .when("obstacle_distance", Predicate::lt(20.0))
//!         .then(ActionToken::Stop),
//!     Rule::new("wander", 0.1).then(ActionToken::MoveForward),
//! ]);
//!
//! let near = Context::new().with("obstacle_distance", 5.0);
//! assert_eq!(engine.evaluate(&near), vec![ActionToken::Stop]);
//!
//! let clear = Context::new().with("obstacle_distance", 80.0);
//! assert_eq!(engine.evaluate(&clear), vec![ActionToken::MoveForward]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use reflex_types::{ActionToken, Context, FactValue, ReflexError};
use tracing::{debug, info, warn};

use crate::decision::DecisionEngine;

// ────────────────────────────────────────────────────────────────────────────
// Predicates
// ────────────────────────────────────────────────────────────────────────────

/// Comparison operator used by [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            Comparator::Gt => ord == Ordering::Greater,
            Comparator::Lt => ord == Ordering::Less,
            Comparator::Ge => ord != Ordering::Less,
            Comparator::Le => ord != Ordering::Greater,
            Comparator::Eq => ord == Ordering::Equal,
            Comparator::Ne => ord != Ordering::Equal,
        }
    }
}

/// A test applied to a single fact.
///
/// A predicate against a missing fact never matches. Values of different
/// kinds never match each other, whatever the operator. Booleans only
/// support `==` and `!=`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(FactValue),
    Compare(Comparator, FactValue),
}

impl Predicate {
    pub fn equals(value: impl Into<FactValue>) -> Self {
        Predicate::Equals(value.into())
    }

    pub fn gt(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Gt, value.into())
    }

    pub fn lt(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Lt, value.into())
    }

    pub fn ge(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Ge, value.into())
    }

    pub fn le(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Le, value.into())
    }

    pub fn eq(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Eq, value.into())
    }

    pub fn ne(value: impl Into<FactValue>) -> Self {
        Predicate::Compare(Comparator::Ne, value.into())
    }

    /// Whether `fact` satisfies this predicate.
    pub fn matches(&self, fact: Option<&FactValue>) -> bool {
        let Some(actual) = fact else {
            return false;
        };
        match self {
            Predicate::Equals(expected) => compare(actual, expected) == Some(Ordering::Equal),
            Predicate::Compare(op, expected) => match (actual, expected) {
                (FactValue::Bool(_), FactValue::Bool(_))
                    if !matches!(op, Comparator::Eq | Comparator::Ne) =>
                {
                    false
                }
                _ => compare(actual, expected).is_some_and(|ord| op.accepts(ord)),
            },
        }
    }
}

/// Ordering between two facts of the same kind; `None` across kinds or
/// against NaN.
fn compare(a: &FactValue, b: &FactValue) -> Option<Ordering> {
    match (a, b) {
        (FactValue::Number(x), FactValue::Number(y)) => x.partial_cmp(y),
        (FactValue::Text(x), FactValue::Text(y)) => Some(x.cmp(y)),
        (FactValue::Bool(x), FactValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(v) => write!(f, "is {v}"),
            Predicate::Compare(op, v) => write!(f, "{} {v}", op.symbol()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule
// ────────────────────────────────────────────────────────────────────────────

/// A named, prioritized condition→actions mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub enabled: bool,
    pub priority: f64,
    /// Fact predicates, all of which must hold. Empty means "always".
    pub conditions: Vec<(String, Predicate)>,
    pub actions: Vec<ActionToken>,
}

impl Rule {
    pub fn new(name: impl Into<String>, priority: f64) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Add a condition on `fact`, replacing any earlier condition on the
    /// same fact.
    pub fn when(mut self, fact: impl Into<String>, predicate: Predicate) -> Self {
        let fact = fact.into();
        match self.conditions.iter_mut().find(|(name, _)| *name == fact) {
            Some(slot) => slot.1 = predicate,
            None => self.conditions.push((fact, predicate)),
        }
        self
    }

    pub fn then(mut self, action: ActionToken) -> Self {
        self.actions.push(action);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether every condition holds in `ctx`.
    pub fn matches(&self, ctx: &Context) -> bool {
        self.conditions
            .iter()
            .all(|(fact, predicate)| predicate.matches(ctx.get(fact)))
    }

    /// Conditions rendered as `fact op value`.
    pub fn describe_conditions(&self) -> Vec<String> {
        self.conditions
            .iter()
            .map(|(fact, predicate)| format!("{fact} {predicate}"))
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Explanation
// ────────────────────────────────────────────────────────────────────────────

/// Why [`RuleEngine::evaluate`] would return what it returns for a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub rule: Option<String>,
    pub priority: f64,
    pub conditions: Vec<String>,
    pub actions: Vec<ActionToken>,
}

impl Explanation {
    fn none() -> Self {
        Self {
            rule: None,
            priority: 0.0,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn from_rule(rule: &Rule) -> Self {
        Self {
            rule: Some(rule.name.clone()),
            priority: rule.priority,
            conditions: rule.describe_conditions(),
            actions: rule.actions.clone(),
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = &self.rule else {
            return f.write_str("no rule matched the current context");
        };
        let conditions = if self.conditions.is_empty() {
            "always".to_string()
        } else {
            self.conditions.join(" and ")
        };
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(
            f,
            "rule '{name}' (priority {}) matched: {conditions} -> [{}]",
            self.priority,
            actions.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RuleEngine
// ────────────────────────────────────────────────────────────────────────────

/// Winner-take-all arbitration over a shared, copy-on-write rule set.
///
/// Cloning a `RuleEngine` yields another handle onto the **same** rule set,
/// so edits made through one clone are seen by the next evaluation of every
/// other.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Arc<RwLock<Arc<Vec<Rule>>>>,
}

/// A cloneable handle for editing a running engine's rule set.
pub type RuleSetHandle = RuleEngine;

impl RuleEngine {
    /// Create an engine over `rules`, sorted by priority.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        sort_rules(&mut rules);
        Self {
            rules: Arc::new(RwLock::new(Arc::new(rules))),
        }
    }

    /// Engine loaded with [`default_rules`][crate::behaviors::default_rules].
    pub fn with_default_rules() -> Self {
        Self::new(crate::behaviors::default_rules())
    }

    pub fn handle(&self) -> RuleSetHandle {
        self.clone()
    }

    /// Published snapshot of the rule set, in evaluation order.
    pub fn rules(&self) -> Arc<Vec<Rule>> {
        Arc::clone(&*self.rules.read())
    }

    /// Actions of the highest-priority enabled rule that matches `ctx`, or
    /// an empty list.
    pub fn evaluate(&self, ctx: &Context) -> Vec<ActionToken> {
        match self.winner(ctx) {
            Some(rule) => {
                debug!(rule = %rule.name, priority = rule.priority, "rule matched");
                rule.actions.clone()
            }
            None => Vec::new(),
        }
    }

    pub fn explain(&self, ctx: &Context) -> Explanation {
        self.winner(ctx)
            .map_or_else(Explanation::none, |rule| Explanation::from_rule(&rule))
    }

    fn winner(&self, ctx: &Context) -> Option<Rule> {
        let snapshot = self.rules();
        snapshot
            .iter()
            .find(|rule| rule.enabled && rule.matches(ctx))
            .cloned()
    }

    /// Insert `rule`, replacing any rule with the same name.
    pub fn add_rule(&self, rule: Rule) {
        info!(rule = %rule.name, priority = rule.priority, "rule added");
        self.update(|rules| {
            rules.retain(|r| r.name != rule.name);
            rules.push(rule);
            sort_rules(rules);
            true
        });
    }

    /// Remove the rule called `name`. Returns `false` (and logs a warning)
    /// when there is no such rule.
    pub fn remove_rule(&self, name: &str) -> bool {
        let removed = self.update(|rules| {
            let before = rules.len();
            rules.retain(|r| r.name != name);
            rules.len() != before
        });
        if removed {
            info!(rule = name, "rule removed");
        } else {
            warn!(rule = name, "remove_rule: no such rule");
        }
        removed
    }

    /// Enable or disable the rule called `name`. Returns `false` (and logs a
    /// warning) when there is no such rule.
    pub fn enable_rule(&self, name: &str, enabled: bool) -> bool {
        let found = self.update(|rules| match rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        });
        if found {
            info!(rule = name, enabled, "rule toggled");
        } else {
            warn!(rule = name, "enable_rule: no such rule");
        }
        found
    }

    /// Like [`enable_rule`][Self::enable_rule] but reports an unknown name as
    /// [`ReflexError::UnknownRule`].
    pub fn try_enable_rule(&self, name: &str, enabled: bool) -> Result<(), ReflexError> {
        if self.enable_rule(name, enabled) {
            Ok(())
        } else {
            Err(ReflexError::UnknownRule(name.to_string()))
        }
    }

    /// Names of the enabled rules, in evaluation order.
    pub fn active_rules(&self) -> Vec<String> {
        self.rules()
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Apply `edit` to a private copy of the rule set and publish it when
    /// `edit` reports a change.
    fn update<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Vec<Rule>) -> bool,
    {
        let mut guard = self.rules.write();
        let mut next: Vec<Rule> = (**guard).clone();
        let changed = edit(&mut next);
        if changed {
            *guard = Arc::new(next);
        }
        changed
    }
}

/// Stable sort, highest priority first.
fn sort_rules(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.total_cmp(&a.priority));
}

impl DecisionEngine for RuleEngine {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn evaluate(&self, context: &Context) -> Result<Vec<ActionToken>, ReflexError> {
        Ok(RuleEngine::evaluate(self, context))
    }

    fn explain(&self, context: &Context) -> String {
        RuleEngine::explain(self, context).to_string()
    }
}
