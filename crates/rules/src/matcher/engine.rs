use serde::Serialize;
use tracing::debug;

use super::order::ConflictOrder;
use crate::expr::{EnvValue, Environment, EvalError, ExprEvaluator};
use crate::schema::{Dimension, Operator, Policy};
use crate::set::PolicySet;

/// Decision failures. None of these may be downgraded to a risk level.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("no basic policy matched the statement")]
    NoBasicPolicyMatched,

    #[error("no aggregate policy matched basic policies [{}]", .matched.join(", "))]
    NoAggregatePolicyMatched { matched: Vec<String> },

    #[error("policy {policy_id}: {source}")]
    Evaluation {
        policy_id: String,
        #[source]
        source: EvalError,
    },
}

/// Everything the two matching phases produced for one statement.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    /// Basic policies that matched, in catalog order.
    pub matched_basic: Vec<Policy>,
    /// Aggregate policies that matched, in conflict order.
    pub matched_aggregate: Vec<Policy>,
    /// The aggregate policy that decided the verdict.
    pub decisive: Policy,
    /// The binding policy for the statement.
    pub verdict: Policy,
}

/// Runs a policy set against fact environments.
pub struct Matcher<'a> {
    set: &'a PolicySet,
    evaluator: &'a dyn ExprEvaluator,
}

impl<'a> Matcher<'a> {
    pub fn new(set: &'a PolicySet, evaluator: &'a dyn ExprEvaluator) -> Self {
        Self { set, evaluator }
    }

    /// Basic phase, aggregate phase, then resolution.
    pub fn evaluate(&self, facts: &Environment) -> Result<MatchOutcome, MatchError> {
        let matched_basic = self.match_basic(facts)?;
        let matched_aggregate = self.match_aggregate(&matched_basic)?;
        let (decisive, verdict) = resolve(&matched_basic, &matched_aggregate)?;
        let (decisive, verdict) = (decisive.clone(), verdict.clone());
        debug!(
            decisive = %decisive.id,
            verdict = %verdict.id,
            level = %verdict.level,
            special = verdict.special,
            "resolved verdict"
        );
        Ok(MatchOutcome { matched_basic, matched_aggregate, decisive, verdict })
    }

    /// Every enabled basic policy whose expression holds for `facts`.
    pub fn match_basic(&self, facts: &Environment) -> Result<Vec<Policy>, MatchError> {
        let mut matched = Vec::new();
        for policy in self.set.basic() {
            if self.holds(policy, facts)? {
                debug!(policy_id = %policy.id, expr = %policy.expr, "basic policy matched");
                matched.push(policy.clone());
            }
        }
        if matched.is_empty() {
            return Err(MatchError::NoBasicPolicyMatched);
        }
        Ok(matched)
    }

    /// Every enabled aggregate policy that holds over the matched basic ids,
    /// sorted by [`ConflictOrder::Priority`].
    pub fn match_aggregate(&self, matched_basic: &[Policy]) -> Result<Vec<Policy>, MatchError> {
        let ids: Vec<String> = matched_basic.iter().map(|p| p.id.clone()).collect();
        let env = Environment::aggregate(ids.clone());
        let mut matched = Vec::new();
        for policy in self.set.aggregate() {
            if self.holds(policy, &env)? {
                debug!(policy_id = %policy.id, expr = %policy.expr, "aggregate policy matched");
                matched.push(policy.clone());
            }
        }
        if matched.is_empty() {
            return Err(MatchError::NoAggregatePolicyMatched { matched: ids });
        }
        ConflictOrder::Priority.sort(&mut matched);
        Ok(matched)
    }

    fn holds(&self, policy: &Policy, env: &Environment) -> Result<bool, MatchError> {
        self.evaluator
            .evaluate(&policy.expr, env)
            .map_err(|source| MatchError::Evaluation { policy_id: policy.id.clone(), source })
    }
}

/// Pick the decisive aggregate and the verdict.
///
/// `matched_aggregate` must already be in conflict order. A `RuleMatch`
/// aggregate is its own verdict; `RulePriority`/`RuleLevel` select the
/// first (highest) or last (lowest) basic policy under the matching order.
pub fn resolve<'p>(
    matched_basic: &'p [Policy],
    matched_aggregate: &'p [Policy],
) -> Result<(&'p Policy, &'p Policy), MatchError> {
    let decisive = matched_aggregate.first().ok_or_else(|| MatchError::NoAggregatePolicyMatched {
        matched: matched_basic.iter().map(|p| p.id.clone()).collect(),
    })?;

    let order = match decisive.rule_id {
        Dimension::RulePriority => ConflictOrder::Priority,
        Dimension::RuleLevel => ConflictOrder::Level,
        _ => return Ok((decisive, decisive)),
    };

    let mut ranked: Vec<&Policy> = matched_basic.iter().collect();
    order.sort(&mut ranked);
    let pick = match decisive.operator {
        Operator::Lowest => ranked.last(),
        _ => ranked.first(),
    };
    let verdict = pick.copied().ok_or(MatchError::NoBasicPolicyMatched)?;
    Ok((decisive, verdict))
}

/// Convenience for building a fact environment from pairs.
pub fn facts<I, K, V>(pairs: I) -> Environment
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<EnvValue>,
{
    let mut env = Environment::new();
    for (k, v) in pairs {
        env.set(k, v);
    }
    env
}
