use actix_web::{web, HttpResponse};
use actix_web_httpauth::{extractors::bearer::BearerAuth, middleware::HttpAuthentication};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{bearer_validator, new_id, AuthUser},
    availability::{free_slots, BookedSlot, OperatingHours},
    booking::{BookingFlow, PendingAppointment},
    db::{fetch_appointment, log_activity},
    error::ApiError,
    models::{AppointmentRow, ROLE_OWNER, STATUS_CANCELLED, STATUS_CONFIRMED, STATUS_PENDING},
    payments::{self, AppointmentDetails, CreatePaymentIntent},
    routes::catalog::{fetch_establishment, fetch_professional, fetch_service},
    state::{AppState, ServerEvent},
};

#[derive(Deserialize)]
struct AvailabilityQuery {
    date: String,
    service_id: String,
}

#[derive(Deserialize)]
struct CreateAppointmentForm {
    establishment_id: String,
    service_id: String,
    professional_id: String,
    /// RFC 3339 timestamp of the chosen slot.
    scheduled_for: String,
    payment_method_id: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/establishments/{id}/professionals/{professional_id}/availability")
            .route(web::get().to(availability)),
    )
    .service(
        web::scope("/api/appointments")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(
                web::resource("")
                    .route(web::get().to(list_appointments))
                    .route(web::post().to(create_appointment)),
            )
            .service(web::resource("/{id}/cancel").route(web::post().to(cancel_appointment))),
    );
}

async fn availability(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let (establishment_id, professional_id) = path.into_inner();
    let establishment = fetch_establishment(&state, &establishment_id).await?;
    fetch_professional(&state, &establishment_id, &professional_id).await?;
    let service = fetch_service(&state, &establishment_id, &query.service_id).await?;

    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid("Date must be in YYYY-MM-DD format."))?;
    if date < Utc::now().date_naive() {
        return Err(ApiError::invalid("Date must be today or later."));
    }

    let hours = OperatingHours::from_columns(
        establishment.open_time.as_deref(),
        establishment.close_time.as_deref(),
    )?;
    let booked = booked_slots(&state, &professional_id, date).await?;
    let slots = free_slots(hours, &booked, service.duration_min)?;

    let rendered: Vec<String> = slots
        .iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "date": query.date, "slots": rendered })))
}

async fn create_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    credentials: BearerAuth,
    form: web::Json<CreateAppointmentForm>,
) -> Result<HttpResponse, ApiError> {
    if !auth.profile_complete {
        return Err(ApiError::invalid(
            "Complete your profile before booking an appointment.",
        ));
    }

    let form = form.into_inner();
    let scheduled = DateTime::parse_from_rfc3339(&form.scheduled_for)
        .map_err(|_| ApiError::invalid("scheduled_for must be an RFC 3339 timestamp."))?
        .with_timezone(&Utc);
    let date = scheduled.date_naive();
    let start = scheduled.time();
    if scheduled < Utc::now() {
        return Err(ApiError::invalid("The appointment time must be in the future."));
    }

    let establishment = fetch_establishment(&state, &form.establishment_id).await?;
    let service = fetch_service(&state, &establishment.id, &form.service_id).await?;
    let professional = fetch_professional(&state, &establishment.id, &form.professional_id).await?;

    let offers: Option<(String,)> = sqlx::query_as(
        "SELECT professional_id FROM professional_services WHERE professional_id = ? AND service_id = ? LIMIT 1",
    )
    .bind(&professional.id)
    .bind(&service.id)
    .fetch_optional(&state.db)
    .await?;
    if offers.is_none() {
        return Err(ApiError::invalid(
            "This professional does not offer the selected service.",
        ));
    }

    // Re-check availability at write time; the unique index below is the
    // final arbiter for concurrent bookings.
    let hours = OperatingHours::from_columns(
        establishment.open_time.as_deref(),
        establishment.close_time.as_deref(),
    )?;
    let booked = booked_slots(&state, &professional.id, date).await?;
    let slots = free_slots(hours, &booked, service.duration_min)?;
    if !slots.contains(&start) {
        return Err(ApiError::conflict("The requested time is not available."));
    }

    let scheduled_for = scheduled.to_rfc3339();
    let pending = PendingAppointment {
        establishment_id: establishment.id.clone(),
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        price: service.price,
        duration_min: service.duration_min,
        professional_id: professional.id.clone(),
        professional_name: professional.name.clone(),
        scheduled_for: scheduled_for.clone(),
    };
    let flow = BookingFlow::new()
        .select(pending.clone())
        .and_then(BookingFlow::submit_payment)
        .map_err(|err| {
            log::error!("Booking flow error: {err}");
            ApiError::Internal
        })?;

    let payment_request = CreatePaymentIntent {
        payment_method_id: Some(form.payment_method_id),
        appointment_details: Some(AppointmentDetails {
            establishment_id: pending.establishment_id.clone(),
            service_id: pending.service_id.clone(),
            service_name: pending.service_name.clone(),
            price: pending.price,
            duration: pending.duration_min,
            professional_id: pending.professional_id.clone(),
            professional_name: pending.professional_name.clone(),
            booking_timestamp: scheduled_for.clone(),
        }),
    };

    if let Err(err) = payments::authorize(
        &state.payments,
        &state.http,
        credentials.token(),
        &payment_request,
    )
    .await
    {
        // The pending appointment survives so the client can retry.
        return match flow.payment_failed() {
            Ok(BookingFlow::Confirming(_)) => Err(err),
            _ => Err(ApiError::Internal),
        };
    }

    let appointment_id = new_id();
    sqlx::query(
        r#"INSERT INTO appointments
           (id, establishment_id, service_id, service_name, price, duration_min,
            professional_id, professional_name, client_id, client_name,
            scheduled_for, status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(&pending.establishment_id)
    .bind(&pending.service_id)
    .bind(&pending.service_name)
    .bind(pending.price)
    .bind(pending.duration_min)
    .bind(&pending.professional_id)
    .bind(&pending.professional_name)
    .bind(&auth.id)
    .bind(&auth.display_name)
    .bind(&scheduled_for)
    .bind(STATUS_CONFIRMED)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(|err| match ApiError::from(err) {
        ApiError::Conflict(_) => {
            ApiError::conflict("The slot was just booked by someone else.")
        }
        other => other,
    })?;

    match flow.payment_succeeded(appointment_id.clone()) {
        Ok(BookingFlow::Booked { .. }) => {}
        _ => return Err(ApiError::Internal),
    }

    log_activity(
        &state.db,
        "appointment_created",
        &format!(
            "{} booked {} with {} at {}.",
            auth.display_name, pending.service_name, pending.professional_name, scheduled_for
        ),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    if let Some(row) = fetch_appointment(&state.db, &appointment_id).await {
        let _ = state
            .events
            .send(ServerEvent::from_row("appointment_created", row.clone()));
        Ok(HttpResponse::Created().json(row))
    } else {
        Ok(HttpResponse::Created().json(json!({ "id": appointment_id })))
    }
}

async fn list_appointments(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let rows = if auth.role == ROLE_OWNER {
        sqlx::query_as::<_, AppointmentRow>(
            r#"SELECT a.id, a.establishment_id, a.service_id, a.service_name, a.price, a.duration_min,
                      a.professional_id, a.professional_name, a.client_id, a.client_name,
                      a.scheduled_for, a.status, a.created_at
               FROM appointments a
               JOIN establishments e ON e.id = a.establishment_id
               WHERE e.owner_id = ?
               ORDER BY a.scheduled_for"#,
        )
        .bind(&auth.id)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, AppointmentRow>(
            r#"SELECT id, establishment_id, service_id, service_name, price, duration_min,
                      professional_id, professional_name, client_id, client_name,
                      scheduled_for, status, created_at
               FROM appointments
               WHERE client_id = ?
               ORDER BY scheduled_for"#,
        )
        .bind(&auth.id)
        .fetch_all(&state.db)
        .await?
    };

    Ok(HttpResponse::Ok().json(rows))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let appointment = fetch_appointment(&state.db, &appointment_id)
        .await
        .ok_or(ApiError::NotFound)?;

    let is_client = appointment.client_id == auth.id;
    let is_owner = if auth.role == ROLE_OWNER {
        let establishment = fetch_establishment(&state, &appointment.establishment_id).await?;
        establishment.owner_id == auth.id
    } else {
        false
    };
    if !is_client && !is_owner {
        return Err(ApiError::Unauthorized);
    }

    // Cancellation is terminal; only pending and confirmed bookings move.
    if appointment.status != STATUS_CONFIRMED && appointment.status != STATUS_PENDING {
        return Err(ApiError::conflict("The appointment is already cancelled."));
    }

    sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
        .bind(STATUS_CANCELLED)
        .bind(&appointment_id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        "appointment_cancelled",
        &format!("{} cancelled appointment {}.", auth.display_name, appointment_id),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    let row = fetch_appointment(&state.db, &appointment_id)
        .await
        .ok_or(ApiError::NotFound)?;
    let _ = state
        .events
        .send(ServerEvent::from_row("appointment_cancelled", row.clone()));

    Ok(HttpResponse::Ok().json(row))
}

async fn booked_slots(
    state: &AppState,
    professional_id: &str,
    date: NaiveDate,
) -> Result<Vec<BookedSlot>, ApiError> {
    let prefix = format!("{}%", date.format("%Y-%m-%d"));
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"SELECT scheduled_for, duration_min
           FROM appointments
           WHERE professional_id = ? AND status = ? AND scheduled_for LIKE ?"#,
    )
    .bind(professional_id)
    .bind(STATUS_CONFIRMED)
    .bind(&prefix)
    .fetch_all(&state.db)
    .await?;

    let mut booked = Vec::with_capacity(rows.len());
    for (scheduled_for, duration_min) in rows {
        let start: NaiveTime = DateTime::parse_from_rfc3339(&scheduled_for)
            .map(|dt| dt.with_timezone(&Utc).time())
            .map_err(|err| {
                log::error!("Unparseable scheduled_for '{scheduled_for}': {err}");
                ApiError::Internal
            })?;
        booked.push(BookedSlot {
            start,
            duration_min,
        });
    }
    Ok(booked)
}
