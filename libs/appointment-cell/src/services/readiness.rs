use chrono::{DateTime, Duration, Utc};

use crate::models::{Appointment, AppointmentStatus, ReadinessReport, ReadinessState};

/// Window around the scheduled start during which the meeting link is usable.
/// Both ends are inclusive.
#[derive(Debug, Clone, Copy)]
pub struct ConsultationWindow {
    pub opens_minutes_before: i64,
    pub closes_minutes_after: i64,
}

impl Default for ConsultationWindow {
    fn default() -> Self {
        Self {
            opens_minutes_before: 15,
            closes_minutes_after: 120,
        }
    }
}

impl ConsultationWindow {
    pub fn opens_at(&self, appointment: &Appointment) -> DateTime<Utc> {
        appointment.scheduled_at() - Duration::minutes(self.opens_minutes_before)
    }

    pub fn closes_at(&self, appointment: &Appointment) -> DateTime<Utc> {
        appointment.scheduled_at() + Duration::minutes(self.closes_minutes_after)
    }

    /// Stateless; evaluate on every read, never persist the result.
    pub fn is_joinable(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        self.state(appointment, now) == ReadinessState::Open
    }

    pub fn state(&self, appointment: &Appointment, now: DateTime<Utc>) -> ReadinessState {
        match appointment.status {
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => return ReadinessState::Finished,
            AppointmentStatus::Pending => return ReadinessState::AwaitingConfirmation,
            AppointmentStatus::Confirmed => {}
        }

        if !appointment.has_meeting_link() {
            return ReadinessState::NoMeetingLink;
        }

        if now < self.opens_at(appointment) {
            ReadinessState::TooEarly
        } else if now > self.closes_at(appointment) {
            ReadinessState::Closed
        } else {
            ReadinessState::Open
        }
    }

    pub fn report(&self, appointment: &Appointment, now: DateTime<Utc>) -> ReadinessReport {
        let state = self.state(appointment, now);

        ReadinessReport {
            appointment_id: appointment.id,
            can_join: state == ReadinessState::Open,
            state,
            opens_at: self.opens_at(appointment),
            closes_at: self.closes_at(appointment),
        }
    }
}

/// `is_joinable` with the default 15 minutes before / 120 minutes after window.
pub fn is_joinable(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    ConsultationWindow::default().is_joinable(appointment, now)
}
