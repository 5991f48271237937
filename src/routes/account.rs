use actix_web::{web, HttpResponse};
use actix_web_httpauth::{extractors::bearer::BearerAuth, middleware::HttpAuthentication};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{
        bearer_validator, create_session, hash_password, new_id, revoke_session, verify_password,
        AuthUser,
    },
    error::ApiError,
    models::{UserRow, ROLE_CLIENT, ROLE_OWNER},
    state::AppState,
};

#[derive(Deserialize)]
struct SignupForm {
    email: String,
    password: String,
    role: String,
    display_name: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize)]
struct SigninForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct ProfileForm {
    display_name: String,
    phone: String,
    tax_id: Option<String>,
}

#[derive(Serialize)]
struct UserView {
    id: String,
    email: String,
    role: String,
    display_name: String,
    phone: String,
    tax_id: String,
    profile_complete: bool,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        UserView {
            id: row.id,
            email: row.email,
            role: row.role,
            display_name: row.display_name,
            phone: row.phone,
            tax_id: row.tax_id,
            profile_complete: row.profile_complete != 0,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/auth/signup").route(web::post().to(signup)))
        .service(web::resource("/api/auth/signin").route(web::post().to(signin)))
        .service(
            web::resource("/api/auth/signout")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .route(web::post().to(signout)),
        )
        .service(
            web::resource("/api/auth/me")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .route(web::get().to(me)),
        )
        .service(
            web::resource("/api/profile")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .route(web::get().to(get_profile))
                .route(web::put().to(update_profile)),
        );
}

async fn signup(
    state: web::Data<AppState>,
    form: web::Json<SignupForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let email = form.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::invalid("A valid email address is required."));
    }
    if form.password.len() < 8 {
        return Err(ApiError::invalid(
            "Password must be at least 8 characters long.",
        ));
    }
    if form.role != ROLE_OWNER && form.role != ROLE_CLIENT {
        return Err(ApiError::invalid("Role must be 'owner' or 'client'."));
    }

    let password_hash = hash_password(&form.password).map_err(|err| {
        log::error!("Password hash failed: {err}");
        ApiError::Internal
    })?;

    let user_id = new_id();
    let display_name = form.display_name.unwrap_or_default().trim().to_string();
    let phone = form.phone.unwrap_or_default().trim().to_string();
    let profile_complete = i64::from(!display_name.is_empty() && !phone.is_empty());

    sqlx::query(
        r#"INSERT INTO users (id, email, password_hash, role, display_name, phone, tax_id, profile_complete, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, '', ?, 1, ?)"#,
    )
    .bind(&user_id)
    .bind(&email)
    .bind(password_hash)
    .bind(&form.role)
    .bind(&display_name)
    .bind(&phone)
    .bind(profile_complete)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(|err| match ApiError::from(err) {
        ApiError::Conflict(_) => ApiError::conflict("An account with this email already exists."),
        other => other,
    })?;

    let token = create_session(&state.db, &user_id).await?;
    let user = fetch_user(&state, &user_id).await?;

    Ok(HttpResponse::Created().json(json!({ "token": token, "user": UserView::from(user) })))
}

async fn signin(
    state: web::Data<AppState>,
    form: web::Json<SigninForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let email = form.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, password_hash, role, display_name, phone, tax_id, profile_complete, active, created_at
           FROM users
           WHERE email = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&form.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = create_session(&state.db, &user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "token": token, "user": UserView::from(user) })))
}

async fn signout(
    state: web::Data<AppState>,
    credentials: BearerAuth,
) -> Result<HttpResponse, ApiError> {
    revoke_session(&state.db, credentials.token()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn me(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user = fetch_user(&state, &auth.id).await?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

async fn get_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user = fetch_user(&state, &auth.id).await?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

async fn update_profile(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Json<ProfileForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let display_name = form.display_name.trim().to_string();
    let phone = form.phone.trim().to_string();
    let tax_id = form.tax_id.unwrap_or_default().trim().to_string();
    let profile_complete = i64::from(!display_name.is_empty() && !phone.is_empty());

    sqlx::query(
        "UPDATE users SET display_name = ?, phone = ?, tax_id = ?, profile_complete = ? WHERE id = ?",
    )
    .bind(&display_name)
    .bind(&phone)
    .bind(&tax_id)
    .bind(profile_complete)
    .bind(&auth.id)
    .execute(&state.db)
    .await?;

    let user = fetch_user(&state, &auth.id).await?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

async fn fetch_user(state: &AppState, user_id: &str) -> Result<UserRow, ApiError> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, password_hash, role, display_name, phone, tax_id, profile_complete, active, created_at
           FROM users
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::json;

    use super::configure;
    use crate::test_util::test_state;

    #[actix_web::test]
    async fn signup_signin_and_me_round_trip() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({
                "email": "Maria@Example.com",
                "password": "password123",
                "role": "client",
                "display_name": "Maria",
                "phone": "+55 11 91234-5678"
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["user"]["email"], "maria@example.com");
        assert_eq!(body["user"]["profile_complete"], true);

        let req = test::TestRequest::post()
            .uri("/api/auth/signin")
            .set_json(json!({ "email": "maria@example.com", "password": "password123" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let token = body["token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["role"], "client");

        // Signout revokes the session.
        let req = test::TestRequest::post()
            .uri("/api/auth/signout")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn duplicate_email_is_a_conflict() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let signup = json!({
            "email": "maria@example.com",
            "password": "password123",
            "role": "client"
        });
        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(&signup)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(&signup)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({
                "email": "maria@example.com",
                "password": "password123",
                "role": "owner"
            }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/signin")
            .set_json(json!({ "email": "maria@example.com", "password": "wrong-password" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn profile_update_recomputes_completion() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({
                "email": "joao@example.com",
                "password": "password123",
                "role": "client"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["user"]["profile_complete"], false);
        let token = body["token"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri("/api/profile")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "display_name": "João",
                "phone": "+55 11 98888-7777",
                "tax_id": "123.456.789-00"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["profile_complete"], true);
        assert_eq!(body["tax_id"], "123.456.789-00");
    }
}
