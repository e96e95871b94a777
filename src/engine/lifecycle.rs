//! Legal status edges for orders and agents.

use crate::error::AppError;
use crate::models::agent::AgentStatus;
use crate::models::order::OrderStatus;

pub fn can_transition_order(current: OrderStatus, next: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (current, next),
        (Pending, InTransit)
            | (Pending, Cancelled)
            | (Pending, Rejected)
            | (InTransit, Delivered)
            | (InTransit, Cancelled)
    )
}

pub fn can_transition_agent(current: AgentStatus, next: AgentStatus) -> bool {
    use AgentStatus::*;

    matches!(
        (current, next),
        (Available, Assigned)
            | (Assigned, InTransit)
            | (InTransit, Delivered)
            | (Delivered, Available)
            | (_, Unavailable)
    )
}

pub fn validate_order_transition(current: OrderStatus, next: OrderStatus) -> Result<(), AppError> {
    if can_transition_order(current, next) {
        Ok(())
    } else {
        Err(AppError::invalid_transition(current, next))
    }
}

pub fn validate_agent_transition(current: AgentStatus, next: AgentStatus) -> Result<(), AppError> {
    if can_transition_agent(current, next) {
        Ok(())
    } else {
        Err(AppError::invalid_transition(current, next))
    }
}

/// Legal path that takes an agent bound to a job to `Delivered`.
///
/// Returns `None` when the agent is not in a state from which the job can be
/// concluded.
pub fn agent_completion_path(current: AgentStatus) -> Option<&'static [AgentStatus]> {
    match current {
        AgentStatus::Assigned => Some(&[AgentStatus::InTransit, AgentStatus::Delivered]),
        AgentStatus::InTransit => Some(&[AgentStatus::Delivered]),
        AgentStatus::Delivered => Some(&[]),
        AgentStatus::Available | AgentStatus::Unavailable => None,
    }
}
