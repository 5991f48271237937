use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    auth::{hash_password, new_id},
    db::run_migrations,
    payments::PaymentConfig,
    state::AppState,
};

/// Fresh in-memory database with the full schema. A single connection keeps
/// every query on the same memory database.
pub async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");

    let (events, _) = broadcast::channel(8);
    AppState {
        db: pool,
        events,
        http: reqwest::Client::new(),
        payments: PaymentConfig::default(),
    }
}

pub async fn create_user(
    state: &AppState,
    email: &str,
    role: &str,
    profile_complete: bool,
) -> (String, String) {
    let user_id = new_id();
    let password_hash = hash_password("password123").expect("hash");
    sqlx::query(
        r#"INSERT INTO users (id, email, password_hash, role, display_name, phone, tax_id, profile_complete, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, '', ?, 1, ?)"#,
    )
    .bind(&user_id)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .bind(if profile_complete { "Test User" } else { "" })
    .bind(if profile_complete { "+55 11 91234-5678" } else { "" })
    .bind(i64::from(profile_complete))
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .expect("insert user");

    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(&user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&state.db)
        .await
        .expect("insert session");

    (user_id, token)
}

pub async fn create_establishment(
    state: &AppState,
    owner_id: &str,
    hours: Option<(&str, &str)>,
) -> String {
    let establishment_id = new_id();
    let (open, close) = match hours {
        Some((open, close)) => (Some(open), Some(close)),
        None => (None, None),
    };
    sqlx::query(
        r#"INSERT INTO establishments (id, owner_id, name, payment_account_id, open_time, close_time, created_at)
           VALUES (?, ?, 'Test Salon', NULL, ?, ?, ?)"#,
    )
    .bind(&establishment_id)
    .bind(owner_id)
    .bind(open)
    .bind(close)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .expect("insert establishment");
    establishment_id
}

pub async fn create_service(
    state: &AppState,
    establishment_id: &str,
    name: &str,
    price: f64,
    duration_min: i64,
) -> String {
    let service_id = new_id();
    sqlx::query(
        "INSERT INTO services (id, establishment_id, name, price, duration_min) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&service_id)
    .bind(establishment_id)
    .bind(name)
    .bind(price)
    .bind(duration_min)
    .execute(&state.db)
    .await
    .expect("insert service");
    service_id
}

pub async fn create_professional(
    state: &AppState,
    establishment_id: &str,
    name: &str,
    service_ids: &[&str],
) -> String {
    let professional_id = new_id();
    sqlx::query("INSERT INTO professionals (id, establishment_id, name) VALUES (?, ?, ?)")
        .bind(&professional_id)
        .bind(establishment_id)
        .bind(name)
        .execute(&state.db)
        .await
        .expect("insert professional");
    for service_id in service_ids {
        sqlx::query(
            "INSERT INTO professional_services (professional_id, service_id) VALUES (?, ?)",
        )
        .bind(&professional_id)
        .bind(service_id)
        .execute(&state.db)
        .await
        .expect("link service");
    }
    professional_id
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_appointment(
    state: &AppState,
    establishment_id: &str,
    service_id: &str,
    professional_id: &str,
    client_id: &str,
    scheduled_for: &str,
    duration_min: i64,
    status: &str,
) -> Result<String, sqlx::Error> {
    let appointment_id = new_id();
    sqlx::query(
        r#"INSERT INTO appointments
           (id, establishment_id, service_id, service_name, price, duration_min,
            professional_id, professional_name, client_id, client_name,
            scheduled_for, status, created_at)
           VALUES (?, ?, ?, 'Corte', 49.90, ?, ?, 'Ana', ?, 'Test Client', ?, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(establishment_id)
    .bind(service_id)
    .bind(duration_min)
    .bind(professional_id)
    .bind(client_id)
    .bind(scheduled_for)
    .bind(status)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;
    Ok(appointment_id)
}
