use actix_web::{web, HttpResponse};
use actix_web_httpauth::{extractors::bearer::BearerAuth, middleware::HttpAuthentication};

use crate::{
    auth::bearer_validator,
    error::ApiError,
    payments::{self, CreatePaymentIntent},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/create-payment-intent")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::post().to(create_payment_intent)),
    );
}

/// Forwards an authorization to the payment function with the caller's
/// bearer token. Validation happens before anything leaves the process, so a
/// rejected request has no side effects.
async fn create_payment_intent(
    state: web::Data<AppState>,
    credentials: BearerAuth,
    body: web::Json<CreatePaymentIntent>,
) -> Result<HttpResponse, ApiError> {
    let result = payments::authorize(
        &state.payments,
        &state.http,
        credentials.token(),
        &body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(result))
}
