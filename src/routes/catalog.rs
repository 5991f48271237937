use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{new_id, owner_validator, AuthUser},
    error::ApiError,
    models::{EstablishmentRow, ProfessionalRow, ServiceRow},
    state::AppState,
};

#[derive(Deserialize)]
struct EstablishmentForm {
    name: String,
    payment_account_id: Option<String>,
    open_time: Option<String>,
    close_time: Option<String>,
}

#[derive(Deserialize)]
struct ServiceForm {
    name: String,
    price: f64,
    duration_min: i64,
}

#[derive(Deserialize)]
struct ProfessionalForm {
    name: String,
    #[serde(default)]
    service_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ProfessionalFilter {
    service_id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/establishments").route(web::get().to(list_establishments)))
        .service(web::resource("/api/establishments/{id}").route(web::get().to(get_establishment)))
        .service(
            web::resource("/api/establishments/{id}/services").route(web::get().to(list_services)),
        )
        .service(
            web::resource("/api/establishments/{id}/professionals")
                .route(web::get().to(list_professionals)),
        )
        .service(
            web::scope("/api/owner")
                .wrap(HttpAuthentication::bearer(owner_validator))
                .service(
                    web::resource("/establishment").route(web::put().to(upsert_establishment)),
                )
                .service(web::resource("/services").route(web::post().to(create_service)))
                .service(
                    web::resource("/services/{id}")
                        .route(web::put().to(update_service))
                        .route(web::delete().to(delete_service)),
                )
                .service(
                    web::resource("/professionals").route(web::post().to(create_professional)),
                )
                .service(
                    web::resource("/professionals/{id}")
                        .route(web::delete().to(delete_professional)),
                )
                .service(
                    web::resource("/professionals/{id}/services")
                        .route(web::put().to(assign_services)),
                ),
        );
}

async fn list_establishments(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, EstablishmentRow>(
        "SELECT id, owner_id, name, payment_account_id, open_time, close_time FROM establishments ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get_establishment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let establishment_id = path.into_inner();
    let establishment = fetch_establishment(&state, &establishment_id).await?;
    let services = fetch_services(&state, &establishment_id).await?;
    let professionals = fetch_professionals(&state, &establishment_id, None).await?;

    Ok(HttpResponse::Ok().json(json!({
        "establishment": establishment,
        "services": services,
        "professionals": professionals,
    })))
}

async fn list_services(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let establishment_id = path.into_inner();
    fetch_establishment(&state, &establishment_id).await?;
    let services = fetch_services(&state, &establishment_id).await?;
    Ok(HttpResponse::Ok().json(services))
}

async fn list_professionals(
    state: web::Data<AppState>,
    path: web::Path<String>,
    filter: web::Query<ProfessionalFilter>,
) -> Result<HttpResponse, ApiError> {
    let establishment_id = path.into_inner();
    fetch_establishment(&state, &establishment_id).await?;
    let professionals =
        fetch_professionals(&state, &establishment_id, filter.service_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(professionals))
}

async fn upsert_establishment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Json<EstablishmentForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("Establishment name is required."));
    }

    let open = parse_time(form.open_time.as_deref())?;
    let close = parse_time(form.close_time.as_deref())?;
    if let (Some(open), Some(close)) = (open, close) {
        if close <= open {
            return Err(ApiError::invalid("Closing time must be after opening time."));
        }
    }
    if open.is_some() != close.is_some() {
        return Err(ApiError::invalid(
            "Both opening and closing times must be provided together.",
        ));
    }
    // Stored zero-padded so availability reads a canonical column.
    let open_time = open.map(|t| t.format("%H:%M").to_string());
    let close_time = close.map(|t| t.format("%H:%M").to_string());

    let existing = sqlx::query_as::<_, (String,)>(
        "SELECT id FROM establishments WHERE owner_id = ? LIMIT 1",
    )
    .bind(&auth.id)
    .fetch_optional(&state.db)
    .await?;

    let establishment_id = match existing {
        Some((id,)) => {
            sqlx::query(
                "UPDATE establishments SET name = ?, payment_account_id = ?, open_time = ?, close_time = ? WHERE id = ?",
            )
            .bind(&name)
            .bind(&form.payment_account_id)
            .bind(&open_time)
            .bind(&close_time)
            .bind(&id)
            .execute(&state.db)
            .await?;
            id
        }
        None => {
            let id = new_id();
            sqlx::query(
                r#"INSERT INTO establishments (id, owner_id, name, payment_account_id, open_time, close_time, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(&auth.id)
            .bind(&name)
            .bind(&form.payment_account_id)
            .bind(&open_time)
            .bind(&close_time)
            .bind(Utc::now().to_rfc3339())
            .execute(&state.db)
            .await?;
            id
        }
    };

    let establishment = fetch_establishment(&state, &establishment_id).await?;
    Ok(HttpResponse::Ok().json(establishment))
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let form = form.into_inner();
    validate_service(&form)?;

    let service_id = new_id();
    sqlx::query(
        "INSERT INTO services (id, establishment_id, name, price, duration_min) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&service_id)
    .bind(&establishment.id)
    .bind(form.name.trim())
    .bind(form.price)
    .bind(form.duration_min)
    .execute(&state.db)
    .await?;

    let service = fetch_service(&state, &establishment.id, &service_id).await?;
    Ok(HttpResponse::Created().json(service))
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let service_id = path.into_inner();
    fetch_service(&state, &establishment.id, &service_id).await?;
    let form = form.into_inner();
    validate_service(&form)?;

    sqlx::query(
        "UPDATE services SET name = ?, price = ?, duration_min = ? WHERE id = ? AND establishment_id = ?",
    )
    .bind(form.name.trim())
    .bind(form.price)
    .bind(form.duration_min)
    .bind(&service_id)
    .bind(&establishment.id)
    .execute(&state.db)
    .await?;

    let service = fetch_service(&state, &establishment.id, &service_id).await?;
    Ok(HttpResponse::Ok().json(service))
}

async fn delete_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let service_id = path.into_inner();
    fetch_service(&state, &establishment.id, &service_id).await?;

    sqlx::query("DELETE FROM professional_services WHERE service_id = ?")
        .bind(&service_id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM services WHERE id = ? AND establishment_id = ?")
        .bind(&service_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn create_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Json<ProfessionalForm>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let form = form.into_inner();
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("Professional name is required."));
    }

    let professional_id = new_id();
    sqlx::query("INSERT INTO professionals (id, establishment_id, name) VALUES (?, ?, ?)")
        .bind(&professional_id)
        .bind(&establishment.id)
        .bind(&name)
        .execute(&state.db)
        .await?;

    link_services(&state, &establishment.id, &professional_id, &form.service_ids).await?;

    let professional = fetch_professional(&state, &establishment.id, &professional_id).await?;
    Ok(HttpResponse::Created().json(professional))
}

async fn delete_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let professional_id = path.into_inner();
    fetch_professional(&state, &establishment.id, &professional_id).await?;

    sqlx::query("DELETE FROM professional_services WHERE professional_id = ?")
        .bind(&professional_id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM professionals WHERE id = ? AND establishment_id = ?")
        .bind(&professional_id)
        .bind(&establishment.id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct AssignServicesForm {
    service_ids: Vec<String>,
}

async fn assign_services(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Json<AssignServicesForm>,
) -> Result<HttpResponse, ApiError> {
    let establishment = own_establishment(&state, &auth.id).await?;
    let professional_id = path.into_inner();
    fetch_professional(&state, &establishment.id, &professional_id).await?;

    sqlx::query("DELETE FROM professional_services WHERE professional_id = ?")
        .bind(&professional_id)
        .execute(&state.db)
        .await?;
    link_services(&state, &establishment.id, &professional_id, &form.service_ids).await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

fn validate_service(form: &ServiceForm) -> Result<(), ApiError> {
    if form.name.trim().is_empty() {
        return Err(ApiError::invalid("Service name is required."));
    }
    if form.price < 0.0 {
        return Err(ApiError::invalid("Service price must not be negative."));
    }
    if form.duration_min <= 0 {
        return Err(ApiError::invalid("Service duration must be positive."));
    }
    Ok(())
}

fn parse_time(value: Option<&str>) -> Result<Option<NaiveTime>, ApiError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ApiError::invalid(format!("'{value}' is not a valid HH:MM time.")))?;
    Ok(Some(time))
}

async fn link_services(
    state: &AppState,
    establishment_id: &str,
    professional_id: &str,
    service_ids: &[String],
) -> Result<(), ApiError> {
    for service_id in service_ids {
        // Guards against linking a service of another establishment.
        fetch_service(state, establishment_id, service_id).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO professional_services (professional_id, service_id) VALUES (?, ?)",
        )
        .bind(professional_id)
        .bind(service_id)
        .execute(&state.db)
        .await?;
    }
    Ok(())
}

async fn own_establishment(state: &AppState, owner_id: &str) -> Result<EstablishmentRow, ApiError> {
    sqlx::query_as::<_, EstablishmentRow>(
        "SELECT id, owner_id, name, payment_account_id, open_time, close_time FROM establishments WHERE owner_id = ? LIMIT 1",
    )
    .bind(owner_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::invalid("Create your establishment first."))
}

pub async fn fetch_establishment(
    state: &AppState,
    establishment_id: &str,
) -> Result<EstablishmentRow, ApiError> {
    sqlx::query_as::<_, EstablishmentRow>(
        "SELECT id, owner_id, name, payment_account_id, open_time, close_time FROM establishments WHERE id = ? LIMIT 1",
    )
    .bind(establishment_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)
}

pub async fn fetch_service(
    state: &AppState,
    establishment_id: &str,
    service_id: &str,
) -> Result<ServiceRow, ApiError> {
    sqlx::query_as::<_, ServiceRow>(
        "SELECT id, establishment_id, name, price, duration_min FROM services WHERE id = ? AND establishment_id = ? LIMIT 1",
    )
    .bind(service_id)
    .bind(establishment_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)
}

pub async fn fetch_professional(
    state: &AppState,
    establishment_id: &str,
    professional_id: &str,
) -> Result<ProfessionalRow, ApiError> {
    sqlx::query_as::<_, ProfessionalRow>(
        "SELECT id, establishment_id, name FROM professionals WHERE id = ? AND establishment_id = ? LIMIT 1",
    )
    .bind(professional_id)
    .bind(establishment_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)
}

async fn fetch_services(
    state: &AppState,
    establishment_id: &str,
) -> Result<Vec<ServiceRow>, ApiError> {
    Ok(sqlx::query_as::<_, ServiceRow>(
        "SELECT id, establishment_id, name, price, duration_min FROM services WHERE establishment_id = ? ORDER BY name",
    )
    .bind(establishment_id)
    .fetch_all(&state.db)
    .await?)
}

async fn fetch_professionals(
    state: &AppState,
    establishment_id: &str,
    service_id: Option<&str>,
) -> Result<Vec<ProfessionalRow>, ApiError> {
    let rows = match service_id {
        Some(service_id) => {
            sqlx::query_as::<_, ProfessionalRow>(
                r#"SELECT p.id, p.establishment_id, p.name
                   FROM professionals p
                   JOIN professional_services ps ON ps.professional_id = p.id
                   WHERE p.establishment_id = ? AND ps.service_id = ?
                   ORDER BY p.name"#,
            )
            .bind(establishment_id)
            .bind(service_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, ProfessionalRow>(
                "SELECT id, establishment_id, name FROM professionals WHERE establishment_id = ? ORDER BY name",
            )
            .bind(establishment_id)
            .fetch_all(&state.db)
            .await?
        }
    };
    Ok(rows)
}
