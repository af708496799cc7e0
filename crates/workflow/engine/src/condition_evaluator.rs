//! Condition evaluator: decides whether a transition may fire
//!
//! Declarative conditions are evaluated against the attributes of the
//! source detail's reference object. Callables are asked once per bucket.
//! The evaluator never mutates workflow state.

use std::cmp::Ordering;
use workflow_types::{
    AttrValue, CompareOp, Condition, DecisionContext, DomainObject, Expr, Expression,
    FireDecision, ObjectRef, WorkflowError, WorkflowResult,
};

/// Evaluates transition conditions
#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch on the condition's tag
    ///
    /// An expression yields `All` or `Veto`; a callable answers for itself.
    pub fn evaluate(
        &self,
        condition: Condition<'_>,
        ctx: &DecisionContext<'_>,
        object: &ObjectRef,
    ) -> WorkflowResult<FireDecision> {
        match condition {
            Condition::Expression(expr) => Ok(self.holds(expr, object)?.into()),
            Condition::Callable(callable) => {
                callable.decide(ctx).map_err(WorkflowError::ConditionFailed)
            }
        }
    }

    /// Whether an expression holds for a referenced object
    ///
    /// Trivial expressions hold without touching the object. Otherwise the
    /// object must still be alive.
    pub fn holds(&self, expr: Option<&Expression>, object: &ObjectRef) -> WorkflowResult<bool> {
        let expr = match expr {
            Some(expr) if !expr.is_trivial() => expr,
            _ => return Ok(true),
        };
        let target = object
            .upgrade()
            .ok_or_else(|| WorkflowError::ObjectReleased(object.id.clone()))?;
        let result = self.test(expr.root(), target.as_ref());
        tracing::trace!(
            object = %object.id,
            condition = %expr,
            result,
            "Condition evaluated"
        );
        Ok(result)
    }

    /// Truth of an expression tree for an object
    pub fn test(&self, expr: &Expr, object: &dyn DomainObject) -> bool {
        self.value(expr, object).is_truthy()
    }

    fn value(&self, expr: &Expr, object: &dyn DomainObject) -> AttrValue {
        match expr {
            Expr::Always => AttrValue::Bool(true),
            Expr::Literal(value) => value.clone(),
            Expr::Attribute(name) => object.attribute(name).unwrap_or(AttrValue::Null),
            Expr::Not(inner) => AttrValue::Bool(!self.test(inner, object)),
            Expr::And(left, right) => {
                AttrValue::Bool(self.test(left, object) && self.test(right, object))
            }
            Expr::Or(left, right) => {
                AttrValue::Bool(self.test(left, object) || self.test(right, object))
            }
            Expr::Compare { left, op, right } => {
                let left = self.value(left, object);
                let right = self.value(right, object);
                AttrValue::Bool(compare(&left, *op, &right))
            }
        }
    }
}

fn compare(left: &AttrValue, op: CompareOp, right: &AttrValue) -> bool {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return match op {
            CompareOp::Eq => both,
            CompareOp::Ne => !both,
            _ => false,
        };
    }

    let ordering = match (left, right) {
        (AttrValue::Text(a), AttrValue::Text(b)) => Some(a.cmp(b)),
        (AttrValue::Bool(a), AttrValue::Bool(b)) => Some(a.cmp(b)),
        (AttrValue::Bool(_), _) | (_, AttrValue::Bool(_)) => None,
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };

    match (ordering, op) {
        (Some(o), CompareOp::Eq) => o == Ordering::Equal,
        (Some(o), CompareOp::Ne) => o != Ordering::Equal,
        (Some(o), CompareOp::Lt) => o == Ordering::Less,
        (Some(o), CompareOp::Le) => o != Ordering::Greater,
        (Some(o), CompareOp::Gt) => o == Ordering::Greater,
        (Some(o), CompareOp::Ge) => o != Ordering::Less,
        // Incomparable values are only ever unequal
        (None, CompareOp::Ne) => true,
        (None, _) => false,
    }
}
