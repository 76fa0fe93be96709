/// Vendor pipeline stage rules
///
/// Three kinds of actor move vendors, each with its own table:
///
/// - staff editing a vendor in the dashboard
/// - the background pipeline service (contact, retry, give up)
/// - an inbound SMS reply from the vendor
///
/// Reopening a `lost` or `unresponsive` vendor is an admin decision.

use super::WorkflowError;
use crate::models::user::UserRole;
use crate::models::vendor::PipelineStage;

/// Who is asking for a stage change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Staff(UserRole),
    System,
    VendorReply,
}

fn staff_targets(from: PipelineStage) -> &'static [PipelineStage] {
    use PipelineStage::*;

    match from {
        NewLead => &[Contacted, Responded, Qualified, Lost],
        Contacted => &[NewLead, Responded, Qualified, Unresponsive, Lost],
        Responded => &[Contacted, Qualified, Lost],
        Qualified => &[ViewingBooked, OfferMade, Lost],
        ViewingBooked => &[Qualified, OfferMade, Lost],
        OfferMade => &[ViewingBooked, UnderOffer, Lost],
        UnderOffer => &[OfferMade, Completed, Lost],
        Completed => &[],
        Unresponsive => &[NewLead, Contacted, Responded],
        Lost => &[NewLead, Qualified],
    }
}

fn system_targets(from: PipelineStage) -> &'static [PipelineStage] {
    use PipelineStage::*;

    match from {
        NewLead => &[Contacted],
        // a failed first send goes back to the queue
        Contacted => &[NewLead, Unresponsive],
        _ => &[],
    }
}

fn reply_targets(from: PipelineStage) -> &'static [PipelineStage] {
    use PipelineStage::*;

    match from {
        NewLead | Contacted | Unresponsive => &[Responded],
        _ => &[],
    }
}

/// Stages reachable from `from` for `actor`, ignoring the admin-only rule
pub fn allowed_targets(actor: Actor, from: PipelineStage) -> &'static [PipelineStage] {
    match actor {
        Actor::Staff(_) => staff_targets(from),
        Actor::System => system_targets(from),
        Actor::VendorReply => reply_targets(from),
    }
}

/// Moving out of `lost` or `unresponsive` reopens the vendor
pub fn is_reopen(from: PipelineStage) -> bool {
    matches!(from, PipelineStage::Lost | PipelineStage::Unresponsive)
}

pub fn check_stage_transition(
    actor: Actor,
    from: PipelineStage,
    to: PipelineStage,
) -> Result<(), WorkflowError> {
    if let Actor::Staff(role) = actor {
        if !role.is_staff() {
            return Err(WorkflowError::NotPermitted);
        }
    }

    if !allowed_targets(actor, from).contains(&to) {
        return Err(WorkflowError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        });
    }

    if let Actor::Staff(role) = actor {
        if is_reopen(from) && role != UserRole::Admin {
            return Err(WorkflowError::AdminRequired {
                from: from.as_str(),
                to: to.as_str(),
            });
        }
    }

    Ok(())
}

/// Stages from which an inbound reply moves a vendor to `responded`
pub fn reply_source_stages() -> Vec<PipelineStage> {
    PipelineStage::ALL
        .into_iter()
        .filter(|stage| reply_targets(*stage).contains(&PipelineStage::Responded))
        .collect()
}
