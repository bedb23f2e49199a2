//! Resolve the version label and display color a deployment advertises.
//!
//! The label comes from `APP_VERSION` and falls back to `"Unknown Version"`.
//! The color comes from `APP_VERSION_COLOR`, and when that is unset it is
//! derived from tags in the label (see [`VersionColor::from_label`]).
//! Empty values are treated the same as missing ones.
//!
//! [`resolve`] only reads its source. [`apply_defaults`] (and the two
//! operations it is built from) also writes any defaulted value back so
//! later readers of the same store see it.

#![warn(missing_docs, non_ascii_idents, trivial_numeric_casts,
    unused_crate_dependencies, noop_method_call, single_use_lifetimes, trivial_casts,
    unused_lifetimes, nonstandard_style, variant_size_differences)]
#![deny(keyword_idents)]

use log::debug;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

mod color;
mod env;

pub use color::VersionColor;
pub use env::{EnvSource, EnvStore, ProcessEnv};

/// Variable holding the version label
pub const VERSION_VARIABLE: &str = "APP_VERSION";
/// Variable holding the display color
pub const COLOR_VARIABLE: &str = "APP_VERSION_COLOR";
/// Label used when no version is configured
pub const UNKNOWN_VERSION: &str = "Unknown Version";

/// Where a resolved value came from
#[derive(SerializeDisplay, DeserializeFromStr, strum::Display, strum::EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
    /// Read from the settings source as is
    Environment,
    /// Filled in because the source had no usable value
    Default,
}

/// The label and color to present for the running deployment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// Version label
    pub label: String,
    /// Whether the label was configured or defaulted
    pub label_origin: Origin,
    /// Display color, any configured string or a [`VersionColor`] name
    pub color: String,
    /// Whether the color was configured or derived from the label
    pub color_origin: Origin,
}

fn read_non_empty<S: EnvSource + ?Sized>(source: &S, name: &str) -> Option<String> {
    source.lookup(name).filter(|value| !value.is_empty())
}

fn label_from<S: EnvSource + ?Sized>(source: &S) -> (String, Origin) {
    match read_non_empty(source, VERSION_VARIABLE) {
        Some(label) => (label, Origin::Environment),
        None => (UNKNOWN_VERSION.to_owned(), Origin::Default),
    }
}

fn color_from<S: EnvSource + ?Sized>(source: &S, label: &str) -> (String, Origin) {
    match read_non_empty(source, COLOR_VARIABLE) {
        Some(color) => (color, Origin::Environment),
        None => (VersionColor::from_label(label).as_str().to_owned(), Origin::Default),
    }
}

/// Resolve the label and color without modifying the source
pub fn resolve<S: EnvSource + ?Sized>(source: &S) -> ResolvedVersion {
    let (label, label_origin) = label_from(source);
    let (color, color_origin) = color_from(source, &label);
    ResolvedVersion { label, label_origin, color, color_origin }
}

/// Make sure the store has a version label, returning it.
///
/// A missing or empty label is replaced with [`UNKNOWN_VERSION`].
pub fn resolve_version_label<S: EnvStore + ?Sized>(store: &mut S) -> String {
    let (label, origin) = label_from(&*store);
    if origin == Origin::Default {
        debug!("{VERSION_VARIABLE} not set, using {label:?}");
        store.assign(VERSION_VARIABLE, &label);
    }
    label
}

/// Make sure the store has a display color, returning it.
///
/// A configured color is left untouched. Otherwise one is derived from
/// `label`, which should be the value [`resolve_version_label`] just returned.
pub fn resolve_version_color<S: EnvStore + ?Sized>(store: &mut S, label: &str) -> String {
    let (color, origin) = color_from(&*store, label);
    if origin == Origin::Default {
        debug!("{COLOR_VARIABLE} not set, derived {color:?} from {label:?}");
        store.assign(COLOR_VARIABLE, &color);
    }
    color
}

/// Resolve the label then the color, writing any defaults into the store
pub fn apply_defaults<S: EnvStore + ?Sized>(store: &mut S) -> ResolvedVersion {
    let label_origin = label_from(&*store).1;
    let label = resolve_version_label(store);
    let color_origin = color_from(&*store, &label).1;
    let color = resolve_version_color(store, &label);
    ResolvedVersion { label, label_origin, color, color_origin }
}
