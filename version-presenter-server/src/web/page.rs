use std::sync::Arc;

use askama::Template;
use poem::handler;
use poem::web::{Data, Html};
use version_presenter::VersionColor;

use super::Presenter;
use crate::error::Result;

#[derive(Template)]
#[template(path = "version.html")]
struct VersionPage<'a> {
    title: &'a str,
    label: &'a str,
    color: &'a str,
    background: &'a str,
    refresh_seconds: Option<u32>,
}

/// Page showing the version label on its color
#[handler]
pub fn index(Data(presenter): Data<&Arc<Presenter>>) -> Result<Html<String>> {
    let resolved = presenter.resolve();
    let page = VersionPage {
        title: &presenter.config.ui.title,
        label: &resolved.label,
        color: &resolved.color,
        background: css_color(&resolved.color)
            .unwrap_or_else(|| VersionColor::from_label(&resolved.label).as_str()),
        refresh_seconds: presenter.config.ui.refresh_seconds,
    };
    Ok(Html(page.render()?))
}

/// Accept a configured color only if it is a single css color token, a name or `#hex`
fn css_color(color: &str) -> Option<&str> {
    let valid = !color.is_empty()
        && color.len() <= 32
        && color.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
    valid.then_some(color)
}
