//! Decision engine: lifetime value, action thresholds, and expected gain.
//!
//! Pure functions over a [`DecisionPolicy`]. No state and no I/O, so the same
//! inputs always produce the same outputs.

use crate::config::DecisionPolicy;
use crate::schema::RecommendedAction;

/// Heuristic customer lifetime value from balance, tenure, and salary.
///
/// Negative inputs are clamped to zero before use. Independent of the churn
/// probability, so it stays computable when the scorer yields none.
pub fn estimate_lifetime_value(balance: f64, tenure: f64, salary: f64) -> f64 {
    let balance = balance.max(0.0);
    let tenure = tenure.max(0.0);
    let salary = salary.max(0.0);
    balance * (1.0 + tenure / 10.0) + 0.05 * salary
}

/// Map a churn probability onto the action bands configured in `policy`.
///
/// Probabilities below the email threshold recommend nothing; at or above it
/// but below the escalation threshold, an email; at or above escalation, a
/// discount call.
pub fn recommended_action(p_churn: f64, policy: &DecisionPolicy) -> RecommendedAction {
    if p_churn < policy.email_threshold {
        RecommendedAction::None
    } else if p_churn < policy.escalate_threshold {
        RecommendedAction::Email
    } else {
        RecommendedAction::DiscountCall
    }
}

/// Expected monetary gain of acting: `p_churn * lifetime_value - action_cost`.
pub fn expected_net_gain(p_churn: f64, lifetime_value: f64, action_cost: f64) -> f64 {
    p_churn * lifetime_value - action_cost
}
