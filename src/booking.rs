use thiserror::Error;

/// A slot the client has picked but not yet paid for. Held in memory for the
/// duration of one booking flow; it either becomes an appointment row or is
/// dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAppointment {
    pub establishment_id: String,
    pub service_id: String,
    pub service_name: String,
    pub price: f64,
    pub duration_min: i64,
    pub professional_id: String,
    pub professional_name: String,
    pub scheduled_for: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Booking flow: Selecting → Confirming → AwaitingPayment → Booked, with a
/// failed payment returning to Confirming so the same pending appointment
/// can be retried without re-selecting a slot.
#[derive(Clone, Debug, PartialEq)]
pub enum BookingFlow {
    Selecting,
    Confirming(PendingAppointment),
    AwaitingPayment(PendingAppointment),
    Booked { appointment_id: String },
}

impl BookingFlow {
    pub fn new() -> Self {
        BookingFlow::Selecting
    }

    fn state_name(&self) -> &'static str {
        match self {
            BookingFlow::Selecting => "selecting",
            BookingFlow::Confirming(_) => "confirming",
            BookingFlow::AwaitingPayment(_) => "awaiting payment",
            BookingFlow::Booked { .. } => "booked",
        }
    }

    /// The previous pending appointment must be consumed or discarded before
    /// a new slot can be selected.
    pub fn select(self, pending: PendingAppointment) -> Result<Self, FlowError> {
        match self {
            BookingFlow::Selecting => Ok(BookingFlow::Confirming(pending)),
            other => Err(FlowError::InvalidTransition {
                action: "select a slot",
                state: other.state_name(),
            }),
        }
    }

    pub fn submit_payment(self) -> Result<Self, FlowError> {
        match self {
            BookingFlow::Confirming(pending) => Ok(BookingFlow::AwaitingPayment(pending)),
            other => Err(FlowError::InvalidTransition {
                action: "submit payment",
                state: other.state_name(),
            }),
        }
    }

    pub fn payment_succeeded(self, appointment_id: String) -> Result<Self, FlowError> {
        match self {
            BookingFlow::AwaitingPayment(_) => Ok(BookingFlow::Booked { appointment_id }),
            other => Err(FlowError::InvalidTransition {
                action: "record payment success",
                state: other.state_name(),
            }),
        }
    }

    /// Keeps the pending appointment so the user can retry.
    pub fn payment_failed(self) -> Result<Self, FlowError> {
        match self {
            BookingFlow::AwaitingPayment(pending) => Ok(BookingFlow::Confirming(pending)),
            other => Err(FlowError::InvalidTransition {
                action: "record payment failure",
                state: other.state_name(),
            }),
        }
    }

    pub fn pending(&self) -> Option<&PendingAppointment> {
        match self {
            BookingFlow::Confirming(pending) | BookingFlow::AwaitingPayment(pending) => {
                Some(pending)
            }
            _ => None,
        }
    }
}

impl Default for BookingFlow {
    fn default() -> Self {
        BookingFlow::new()
    }
}
