use std::sync::Arc;

use poem::handler;
use poem::web::{Data, Json};
use version_presenter::ResolvedVersion;

use super::Presenter;

/// Get the version currently being presented
///
/// Result example:
/// {
///     "label": "1.2.0-BLUE",
///     "label_origin": "environment",
///     "color": "blue",
///     "color_origin": "default"
/// }
#[handler]
pub fn current(Data(presenter): Data<&Arc<Presenter>>) -> Json<ResolvedVersion> {
    Json(presenter.resolve())
}
