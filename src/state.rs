use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{models::AppointmentRow, payments::PaymentConfig};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub http: reqwest::Client,
    pub payments: PaymentConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub appointment_id: Option<String>,
    pub establishment_id: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub service_name: Option<String>,
    pub professional_name: Option<String>,
    pub scheduled_for: Option<String>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: AppointmentRow) -> Self {
        Self {
            kind: kind.to_string(),
            appointment_id: Some(row.id),
            establishment_id: Some(row.establishment_id),
            status: Some(row.status),
            client_name: Some(row.client_name),
            service_name: Some(row.service_name),
            professional_name: Some(row.professional_name),
            scheduled_for: Some(row.scheduled_for),
        }
    }
}
