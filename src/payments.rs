use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;

/// Deployment settings for the payment boundary. `upstream_url` is the
/// payment-function endpoint charges are forwarded to; when it is absent
/// every authorization fails with a configuration error.
#[derive(Clone, Debug, Default)]
pub struct PaymentConfig {
    pub upstream_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetails {
    pub establishment_id: String,
    pub service_id: String,
    pub service_name: String,
    /// Decimal currency units, converted to minor units on the wire.
    pub price: f64,
    /// Minutes.
    pub duration: i64,
    pub professional_id: String,
    pub professional_name: String,
    pub booking_timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntent {
    pub payment_method_id: Option<String>,
    pub appointment_details: Option<AppointmentDetails>,
}

/// `49.90` → `4990`.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Field presence checks at the boundary. Nothing leaves the process until
/// these pass.
pub fn validate(request: &CreatePaymentIntent) -> Result<(&str, &AppointmentDetails), ApiError> {
    let payment_method_id = request
        .payment_method_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("paymentMethodId is required"))?;
    let details = request
        .appointment_details
        .as_ref()
        .ok_or_else(|| ApiError::invalid("appointmentDetails is required"))?;

    if details.establishment_id.trim().is_empty()
        || details.service_id.trim().is_empty()
        || details.professional_id.trim().is_empty()
        || details.booking_timestamp.trim().is_empty()
    {
        return Err(ApiError::invalid(
            "appointmentDetails is missing required fields",
        ));
    }
    if details.price < 0.0 {
        return Err(ApiError::invalid("price must not be negative"));
    }
    if details.duration <= 0 {
        return Err(ApiError::invalid("duration must be positive"));
    }
    Ok((payment_method_id, details))
}

/// Forwards an authorization request to the payment function, propagating
/// the caller's bearer token. Upstream rejections keep their status code and
/// message.
pub async fn authorize(
    config: &PaymentConfig,
    http: &reqwest::Client,
    bearer_token: &str,
    request: &CreatePaymentIntent,
) -> Result<serde_json::Value, ApiError> {
    let (payment_method_id, details) = validate(request)?;

    let url = config.upstream_url.as_deref().ok_or_else(|| {
        ApiError::Configuration("PAYMENT_FUNCTION_URL is not set".to_string())
    })?;

    let body = json!({
        "amount": to_minor_units(details.price),
        "paymentMethodId": payment_method_id,
        "appointmentDetails": details,
    });

    let response = http
        .post(url)
        .bearer_auth(bearer_token)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            log::warn!("Payment upstream unreachable: {err}");
            ApiError::Upstream {
                status: 502,
                message: "payment service unreachable".to_string(),
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    response.json().await.map_err(|err| {
        log::error!("Payment upstream returned unreadable body: {err}");
        ApiError::Internal
    })
}
