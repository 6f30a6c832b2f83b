use tracing::{debug, warn};

use notification_cell::NotificationKind;

use crate::models::{AppointmentError, AppointmentStatus};

/// Which side of an appointment the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Doctor,
    Farmer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Doctor,
    Farmer,
}

/// Work that follows a committed status change. None of it can undo the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    IncrementDoctorConsultations,
    Notify {
        recipient: Recipient,
        kind: NotificationKind,
    },
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    /// Farmers may only cancel; every other move belongs to the doctor.
    pub fn authorize_transition(
        &self,
        actor: Actor,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        match (actor, new_status) {
            (Actor::Doctor, _) => Ok(()),
            (Actor::Farmer, AppointmentStatus::Cancelled) => Ok(()),
            (Actor::Farmer, _) => Err(AppointmentError::Forbidden(
                "Only the doctor can change the appointment to this status".to_string(),
            )),
        }
    }

    /// Side effects owed once `new_status` has been committed by `actor`.
    pub fn side_effects(&self, actor: Actor, new_status: &AppointmentStatus) -> Vec<SideEffect> {
        match (new_status, actor) {
            (AppointmentStatus::Confirmed, _) => vec![SideEffect::Notify {
                recipient: Recipient::Farmer,
                kind: NotificationKind::AppointmentConfirmed,
            }],
            (AppointmentStatus::Cancelled, Actor::Doctor) => vec![SideEffect::Notify {
                recipient: Recipient::Farmer,
                kind: NotificationKind::AppointmentCancelled,
            }],
            (AppointmentStatus::Cancelled, Actor::Farmer) => vec![SideEffect::Notify {
                recipient: Recipient::Doctor,
                kind: NotificationKind::AppointmentCancelled,
            }],
            // Completion bumps the counter and stays silent
            (AppointmentStatus::Completed, _) => vec![SideEffect::IncrementDoctorConsultations],
            (AppointmentStatus::Pending, _) => vec![],
        }
    }
}
