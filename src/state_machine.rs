//! Return request state machine.
//!
//! One explicit edge table is the single source of truth for transition
//! legality, the side effect each edge implies, and the out-edges offered to
//! clients as `available_transitions`. Re-drivable loops (`pickup_failed ->
//! approved`, `more_info_needed -> pending`) are ordinary edges here, not a
//! separate retry mechanism.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::services::collaborators::RbacService;

/// Enum representing the possible statuses of a return request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "more_info_needed")]
    MoreInfoNeeded,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "pickup_scheduled")]
    PickupScheduled,
    #[sea_orm(string_value = "picked_up")]
    PickedUp,
    #[sea_orm(string_value = "pickup_failed")]
    PickupFailed,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "inspecting")]
    Inspecting,
    #[sea_orm(string_value = "inspection_passed")]
    InspectionPassed,
    #[sea_orm(string_value = "inspection_failed")]
    InspectionFailed,
    #[sea_orm(string_value = "refund_initiated")]
    RefundInitiated,
    #[sea_orm(string_value = "refund_partial")]
    RefundPartial,
    #[sea_orm(string_value = "replacement_initiated")]
    ReplacementInitiated,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl ReturnStatus {
    /// Terminal statuses accept no further transitions and are retained for audit.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReturnStatus::Rejected | ReturnStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::MoreInfoNeeded => "more_info_needed",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::PickupScheduled => "pickup_scheduled",
            ReturnStatus::PickedUp => "picked_up",
            ReturnStatus::PickupFailed => "pickup_failed",
            ReturnStatus::InTransit => "in_transit",
            ReturnStatus::Received => "received",
            ReturnStatus::Inspecting => "inspecting",
            ReturnStatus::InspectionPassed => "inspection_passed",
            ReturnStatus::InspectionFailed => "inspection_failed",
            ReturnStatus::RefundInitiated => "refund_initiated",
            ReturnStatus::RefundPartial => "refund_partial",
            ReturnStatus::ReplacementInitiated => "replacement_initiated",
            ReturnStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use sea_orm::Iterable;
        ReturnStatus::iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown return status '{}'", s)))
    }
}

/// The role on whose behalf a transition is requested. Always passed
/// explicitly into service calls; the engine carries no ambient session state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Agent,
    Manager,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The side effect an edge implies. Edges carrying anything but `None` are
/// routed through the orchestrator: the collaborator call must yield a durable
/// reference before the status commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    None,
    SchedulePickup,
    CreateRefund,
    CreateReplacement,
}

/// The complete transition graph. `(from, to, implied side effect)`.
const EDGES: &[(ReturnStatus, ReturnStatus, TransitionAction)] = {
    use ReturnStatus::*;
    use TransitionAction::*;
    &[
        (Pending, MoreInfoNeeded, None),
        (Pending, Approved, SchedulePickup),
        (Pending, Rejected, None),
        (MoreInfoNeeded, Pending, None),
        (Approved, PickupScheduled, None),
        (PickupScheduled, PickedUp, None),
        (PickupScheduled, PickupFailed, None),
        (PickupFailed, Approved, SchedulePickup),
        (PickedUp, InTransit, None),
        (InTransit, Received, None),
        (Received, Inspecting, None),
        (Inspecting, InspectionPassed, None),
        (Inspecting, InspectionFailed, None),
        (InspectionPassed, RefundInitiated, CreateRefund),
        (InspectionPassed, RefundPartial, CreateRefund),
        (InspectionPassed, ReplacementInitiated, CreateReplacement),
        (InspectionPassed, Completed, None),
        (InspectionFailed, Completed, None),
        (RefundInitiated, Completed, None),
        (RefundPartial, Completed, None),
        (ReplacementInitiated, Completed, None),
    ]
};

/// Looks up the edge `(from, to)`, returning its implied side effect.
pub fn action_for(from: ReturnStatus, to: ReturnStatus) -> Option<TransitionAction> {
    EDGES
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, action)| *action)
}

pub fn is_edge(from: ReturnStatus, to: ReturnStatus) -> bool {
    action_for(from, to).is_some()
}

/// Out-edges of `from`, unfiltered.
pub fn successors(from: ReturnStatus) -> Vec<ReturnStatus> {
    EDGES
        .iter()
        .filter(|(f, _, _)| *f == from)
        .map(|(_, t, _)| *t)
        .collect()
}

/// Out-edges of `from` the given role may request. This is what detail
/// responses expose as `available_transitions`.
pub fn available_transitions(
    from: ReturnStatus,
    role: ActorRole,
    rbac: &dyn RbacService,
) -> Vec<ReturnStatus> {
    successors(from)
        .into_iter()
        .filter(|to| rbac.can_transition(role, from, *to))
        .collect()
}

/// Field requirements a transition request must satisfy before any write.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPayload<'a> {
    pub notes: Option<&'a str>,
    pub has_pickup_date: bool,
    pub customer_ships: bool,
}

/// Validates a requested transition: edge membership, role capability, and
/// payload requirements, in that order. Returns the side effect the edge
/// implies. Performs no I/O and no writes.
pub fn validate(
    from: ReturnStatus,
    to: ReturnStatus,
    role: ActorRole,
    payload: TransitionPayload<'_>,
    rbac: &dyn RbacService,
) -> Result<TransitionAction, ServiceError> {
    let action = action_for(from, to).ok_or_else(|| ServiceError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    })?;

    if !rbac.can_transition(role, from, to) {
        return Err(ServiceError::Forbidden(format!(
            "role '{}' may not move a return from '{}' to '{}'",
            role, from, to
        )));
    }

    match to {
        ReturnStatus::Rejected => {
            if payload.notes.map_or(true, |n| n.trim().is_empty()) {
                return Err(ServiceError::ValidationError(
                    "A rejection requires a non-empty reason".to_string(),
                ));
            }
        }
        ReturnStatus::Approved => {
            if !payload.has_pickup_date && !payload.customer_ships {
                return Err(ServiceError::ValidationError(
                    "Approval requires a scheduled pickup date or the customer-ships flag"
                        .to_string(),
                ));
            }
        }
        _ => {}
    }

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::collaborators::StaticRbac;
    use assert_matches::assert_matches;
    use sea_orm::Iterable;

    fn payload_ok() -> TransitionPayload<'static> {
        TransitionPayload {
            notes: Some("ok"),
            has_pickup_date: true,
            customer_ships: false,
        }
    }

    #[test]
    fn every_non_edge_pair_is_rejected() {
        let rbac = StaticRbac::default();
        for from in ReturnStatus::iter() {
            for to in ReturnStatus::iter() {
                let expected = is_edge(from, to);
                let result = validate(from, to, ActorRole::Manager, payload_ok(), &rbac);
                if expected {
                    assert!(result.is_ok(), "edge {} -> {} should validate", from, to);
                } else {
                    assert_matches!(
                        result,
                        Err(ServiceError::InvalidTransition { .. }),
                        "non-edge {} -> {} must be invalid",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(successors(ReturnStatus::Rejected).is_empty());
        assert!(successors(ReturnStatus::Completed).is_empty());
        assert!(ReturnStatus::Rejected.is_terminal());
        assert!(ReturnStatus::Completed.is_terminal());
    }

    #[rstest::rstest]
    #[case(ReturnStatus::PickupFailed, ReturnStatus::Approved)]
    #[case(ReturnStatus::MoreInfoNeeded, ReturnStatus::Pending)]
    fn redrivable_loops_are_ordinary_edges(
        #[case] from: ReturnStatus,
        #[case] to: ReturnStatus,
    ) {
        assert!(is_edge(from, to));
    }

    #[test]
    fn rejection_without_notes_fails_validation() {
        let rbac = StaticRbac::default();
        let payload = TransitionPayload {
            notes: Some("   "),
            ..Default::default()
        };
        assert_matches!(
            validate(
                ReturnStatus::Pending,
                ReturnStatus::Rejected,
                ActorRole::Manager,
                payload,
                &rbac
            ),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn approval_requires_pickup_or_customer_ships() {
        let rbac = StaticRbac::default();
        let bare = TransitionPayload::default();
        assert_matches!(
            validate(
                ReturnStatus::Pending,
                ReturnStatus::Approved,
                ActorRole::Manager,
                bare,
                &rbac
            ),
            Err(ServiceError::ValidationError(_))
        );

        let ships = TransitionPayload {
            customer_ships: true,
            ..Default::default()
        };
        assert_matches!(
            validate(
                ReturnStatus::Pending,
                ReturnStatus::Approved,
                ActorRole::Manager,
                ships,
                &rbac
            ),
            Ok(TransitionAction::SchedulePickup)
        );
    }

    #[test]
    fn customers_cannot_drive_staff_edges() {
        let rbac = StaticRbac::default();
        assert_matches!(
            validate(
                ReturnStatus::Pending,
                ReturnStatus::Approved,
                ActorRole::Customer,
                payload_ok(),
                &rbac
            ),
            Err(ServiceError::Forbidden(_))
        );
        // The customer re-drive after a request for more information is allowed.
        assert_matches!(
            validate(
                ReturnStatus::MoreInfoNeeded,
                ReturnStatus::Pending,
                ActorRole::Customer,
                TransitionPayload::default(),
                &rbac
            ),
            Ok(TransitionAction::None)
        );
    }

    #[test]
    fn financial_edges_need_manager_capability() {
        let rbac = StaticRbac::default();
        let agent = available_transitions(ReturnStatus::InspectionPassed, ActorRole::Agent, &rbac);
        assert!(!agent.contains(&ReturnStatus::RefundInitiated));
        assert!(agent.contains(&ReturnStatus::Completed));

        let manager =
            available_transitions(ReturnStatus::InspectionPassed, ActorRole::Manager, &rbac);
        assert!(manager.contains(&ReturnStatus::RefundInitiated));
        assert!(manager.contains(&ReturnStatus::RefundPartial));
        assert!(manager.contains(&ReturnStatus::ReplacementInitiated));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in ReturnStatus::iter() {
            assert_eq!(status.as_str().parse::<ReturnStatus>().unwrap(), status);
        }
    }
}
