//! Trigger evaluation.
//!
//! Categories are ANDed, patterns within a category are ORed, and exclusion
//! categories reject on a match.

use crate::event::{Dimension, Event};
use crate::pattern::matches_any;
use crate::pipeline::{Constraint, TriggerPredicate};

const DIMENSIONS: [Dimension; 4] = [
    Dimension::Branch,
    Dimension::Ref,
    Dimension::Event,
    Dimension::Status,
];

/// Result of evaluating a predicate against an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject { dimension: Dimension, reason: RejectReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The event carries no value for a constrained dimension.
    MissingValue,
    /// The value matched none of the included patterns.
    NotIncluded,
    /// The value matched an excluded pattern.
    Excluded,
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit)
    }
}

/// Stateless evaluator for trigger predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether the predicate admits the event.
    pub fn admits(&self, predicate: &TriggerPredicate, event: &Event) -> bool {
        self.evaluate(predicate, event).is_admit()
    }

    /// Evaluate every category and report the first one that rejects.
    pub fn evaluate(&self, predicate: &TriggerPredicate, event: &Event) -> Verdict {
        for dimension in DIMENSIONS {
            let Some(constraint) = predicate.constraint(dimension) else {
                continue;
            };
            if let Some(reason) = check(constraint, event.value(dimension)) {
                return Verdict::Reject { dimension, reason };
            }
        }
        Verdict::Admit
    }
}

fn check(constraint: &Constraint, value: Option<&str>) -> Option<RejectReason> {
    if constraint.is_empty() {
        return None;
    }

    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Some(RejectReason::MissingValue);
    };

    match constraint {
        Constraint::Include(patterns) if !matches_any(patterns, Some(value)) => {
            Some(RejectReason::NotIncluded)
        }
        Constraint::Exclude(patterns) if matches_any(patterns, Some(value)) => {
            Some(RejectReason::Excluded)
        }
        _ => None,
    }
}

/// Convenience wrapper around [`TriggerEvaluator::admits`].
pub fn admits(predicate: &TriggerPredicate, event: &Event) -> bool {
    TriggerEvaluator.admits(predicate, event)
}
