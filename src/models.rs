use serde::Serialize;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_CLIENT: &str = "client";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_CANCELLED: &str = "cancelled";

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub display_name: String,
    pub phone: String,
    pub tax_id: String,
    pub profile_complete: i64,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EstablishmentRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub payment_account_id: Option<String>,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    pub price: f64,
    pub duration_min: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProfessionalRow {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub establishment_id: String,
    pub service_id: String,
    pub service_name: String,
    pub price: f64,
    pub duration_min: i64,
    pub professional_id: String,
    pub professional_name: String,
    pub client_id: String,
    pub client_name: String,
    pub scheduled_for: String,
    pub status: String,
    pub created_at: String,
}
