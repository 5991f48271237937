use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{AppointmentRow, ROLE_OWNER},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    appointment_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, appointment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(appointment_id)
    .execute(pool)
    .await;
}

pub async fn fetch_appointment(pool: &SqlitePool, appointment_id: &str) -> Option<AppointmentRow> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, establishment_id, service_id, service_name, price, duration_min,
                  professional_id, professional_name, client_id, client_name,
                  scheduled_for, status, created_at
           FROM appointments
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

/// Seeds a demo owner with an establishment and a small catalog when
/// SEED_DEMO=true. Intended for local development only.
pub async fn seed_demo(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if env::var("SEED_DEMO").unwrap_or_default() != "true" {
        return Ok(());
    }

    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_OWNER)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("DEMO_OWNER_EMAIL").unwrap_or_else(|_| "owner@example.com".to_string());
    let password = env::var("DEMO_OWNER_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    if password == "change-me" {
        log::warn!("DEMO_OWNER_PASSWORD not set. Using default password 'change-me'.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let owner_id = new_id();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, email, password_hash, role, display_name, phone, tax_id, profile_complete, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, '', 1, 1, ?)"#,
    )
    .bind(&owner_id)
    .bind(email)
    .bind(password_hash)
    .bind(ROLE_OWNER)
    .bind("Demo Owner")
    .bind("+55 11 90000-0000")
    .bind(&now)
    .execute(pool)
    .await?;

    let establishment_id = new_id();
    sqlx::query(
        r#"INSERT INTO establishments (id, owner_id, name, payment_account_id, open_time, close_time, created_at)
           VALUES (?, ?, ?, NULL, '09:00', '18:00', ?)"#,
    )
    .bind(&establishment_id)
    .bind(&owner_id)
    .bind("Estúdio Demo")
    .bind(&now)
    .execute(pool)
    .await?;

    let services = [("Corte", 49.90_f64, 30_i64), ("Coloração", 120.0, 60)];
    let professional_id = new_id();
    sqlx::query("INSERT INTO professionals (id, establishment_id, name) VALUES (?, ?, ?)")
        .bind(&professional_id)
        .bind(&establishment_id)
        .bind("Ana")
        .execute(pool)
        .await?;

    for (name, price, duration) in services {
        let service_id = new_id();
        sqlx::query(
            "INSERT INTO services (id, establishment_id, name, price, duration_min) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&service_id)
        .bind(&establishment_id)
        .bind(name)
        .bind(price)
        .bind(duration)
        .execute(pool)
        .await?;

        sqlx::query("INSERT INTO professional_services (professional_id, service_id) VALUES (?, ?)")
            .bind(&professional_id)
            .bind(&service_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}
