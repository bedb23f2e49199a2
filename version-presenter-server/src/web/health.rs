use std::sync::Arc;

use poem::http::StatusCode;
use poem::web::Data;
use poem::{get, handler, Endpoint, Route};

use super::Presenter;

pub fn api() -> impl Endpoint {
    Route::new()
    .at("/live", get(liveness))
    .at("/ready", get(readyness))
}

/// Check if the API is live
///
/// Result example:
/// OK
#[handler]
fn liveness() -> &'static str {
    "OK"
}


/// Check if the API is ready to serve the version page
///
/// Readiness is dropped as soon as shutdown starts so the load balancer
/// stops routing here while in flight requests finish.
///
/// Result example:
/// OK or FAIL
#[handler]
fn readyness(Data(presenter): Data<&Arc<Presenter>>) -> (StatusCode, &'static str) {
    if presenter.running.read() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "FAIL")
    }
}
