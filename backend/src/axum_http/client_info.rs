use axum::http::{HeaderMap, header::USER_AGENT};

use crate::usecases::sessions::ClientInfo;

/// First hop of `x-forwarded-for`, falling back to `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: client_ip(headers),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}
