//! Expression evaluation boundary.
//!
//! Compiled policies are plain expression strings. The [`ExprEvaluator`]
//! trait evaluates one against an [`Environment`] of variables and matcher
//! functions; [`EvalexprEvaluator`] is the `evalexpr`-backed implementation.

use std::fmt;

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, EvalexprResult,
    Function, HashMapContext, Value,
};
use indexmap::IndexMap;
use serde::Serialize;

use crate::compiler::{DIRECTION_FUNCTIONS, FN_ALL, FN_ANY, MATCHED_BASIC_IDS, WILDCARD};

/// A concrete fact or variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Int(i64),
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Int(n) => write!(f, "{}", n),
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Str(s) => write!(f, "{}", s),
            EnvValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<i64> for EnvValue {
    fn from(n: i64) -> Self {
        EnvValue::Int(n)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Bool(b)
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Str(s)
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Str(s.to_string())
    }
}

impl From<Vec<String>> for EnvValue {
    fn from(items: Vec<String>) -> Self {
        EnvValue::List(items)
    }
}

/// Named matcher: `(matched ids, requested ids) -> bool`.
pub type MatcherFn = fn(&[String], &[String]) -> bool;

/// Variable and function bindings for one evaluation.
#[derive(Clone, Default)]
pub struct Environment {
    vars: IndexMap<String, EnvValue>,
    functions: IndexMap<String, MatcherFn>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment for the aggregate phase: the matched basic ids plus the
    /// `ALL`/`ANY` membership functions and the four direction functions.
    pub fn aggregate(matched_basic_ids: Vec<String>) -> Self {
        let mut env = Self::new();
        env.set(MATCHED_BASIC_IDS, matched_basic_ids);
        env.define(FN_ALL, all_of);
        env.define(FN_ANY, any_of);
        for name in DIRECTION_FUNCTIONS {
            env.define(name, allow);
        }
        env
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<EnvValue>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn define(&mut self, name: impl Into<String>, function: MatcherFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, MatcherFn)> {
        self.functions.iter().map(|(k, f)| (k.as_str(), *f))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("vars", &self.vars)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── Matcher functions ─────────────────────────────────────────

fn contains_id(matched: &[String], id: &str) -> bool {
    if id == WILDCARD {
        return !matched.is_empty();
    }
    matched.iter().any(|m| m == id)
}

/// Every requested id matched.
pub fn all_of(matched: &[String], wanted: &[String]) -> bool {
    wanted.iter().all(|w| contains_id(matched, w))
}

/// At least one requested id matched.
pub fn any_of(matched: &[String], wanted: &[String]) -> bool {
    wanted.iter().any(|w| contains_id(matched, w))
}

/// Direction functions always allow; selection happens after evaluation.
pub fn allow(_matched: &[String], _wanted: &[String]) -> bool {
    true
}

// ── Evaluator ─────────────────────────────────────────────────

/// Failure to evaluate a compiled expression (syntax, missing variable,
/// type mismatch).
#[derive(Debug, Clone, thiserror::Error)]
#[error("evaluating `{expr}`: {message}")]
pub struct EvalError {
    pub expr: String,
    pub message: String,
}

impl EvalError {
    fn new(expr: &str, message: impl fmt::Display) -> Self {
        Self { expr: expr.to_string(), message: message.to_string() }
    }
}

/// Evaluates a compiled policy expression to a boolean.
pub trait ExprEvaluator: Send + Sync {
    fn evaluate(&self, expr: &str, env: &Environment) -> Result<bool, EvalError>;
}

/// [`ExprEvaluator`] backed by the `evalexpr` interpreter.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvalexprEvaluator;

impl EvalexprEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExprEvaluator for EvalexprEvaluator {
    fn evaluate(&self, expr: &str, env: &Environment) -> Result<bool, EvalError> {
        let ctx = build_context(env).map_err(|e| EvalError::new(expr, e))?;
        evalexpr::eval_boolean_with_context(expr, &ctx).map_err(|e| EvalError::new(expr, e))
    }
}

fn to_value(v: &EnvValue) -> Value {
    match v {
        EnvValue::Int(n) => Value::Int(*n),
        EnvValue::Bool(b) => Value::Boolean(*b),
        EnvValue::Str(s) => Value::String(s.clone()),
        EnvValue::List(items) => Value::Tuple(items.iter().cloned().map(Value::String).collect()),
    }
}

fn build_context(env: &Environment) -> EvalexprResult<HashMapContext> {
    let mut ctx = HashMapContext::new();
    for (name, value) in env.vars() {
        ctx.set_value(name.to_string(), to_value(value))?;
    }
    for (name, matcher) in env.functions() {
        ctx.set_function(
            name.to_string(),
            Function::new(move |arg: &Value| call_matcher(matcher, arg)),
        )?;
    }
    Ok(ctx)
}

/// Unpack `f(list, "id", ...)` arguments and run the matcher.
fn call_matcher(matcher: MatcherFn, arg: &Value) -> EvalexprResult<Value> {
    let args = arg.as_tuple()?;
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| EvalexprError::CustomMessage("matcher called without arguments".into()))?;
    let matched = string_list(first)?;
    let wanted = rest.iter().map(Value::as_string).collect::<EvalexprResult<Vec<_>>>()?;
    Ok(Value::Boolean(matcher(&matched, &wanted)))
}

fn string_list(v: &Value) -> EvalexprResult<Vec<String>> {
    match v {
        Value::Tuple(items) => items.iter().map(Value::as_string).collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Empty => Ok(Vec::new()),
        other => Err(EvalexprError::expected_tuple(other.clone())),
    }
}
