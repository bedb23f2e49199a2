use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Colors a version label can be tagged with when no color is configured
#[derive(SerializeDisplay, DeserializeFromStr, strum::Display, strum::EnumString, strum::IntoStaticStr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum VersionColor {
    /// Label names the blue deployment slot
    Blue,
    /// Label names the green deployment slot
    Green,
    /// Anything else, including labels we know nothing about
    Orange,
}

impl VersionColor {
    /// Tag used in a version label to mark the blue slot
    pub const BLUE_TAG: &'static str = "BLUE";
    /// Tag used in a version label to mark the green slot
    pub const GREEN_TAG: &'static str = "GREEN";

    /// Pick a color from the tags present in a version label.
    ///
    /// Matching is a case sensitive substring search. The blue tag is checked
    /// first so a label carrying both tags is blue.
    pub fn from_label(label: &str) -> Self {
        if label.contains(Self::BLUE_TAG) {
            VersionColor::Blue
        } else if label.contains(Self::GREEN_TAG) {
            VersionColor::Green
        } else {
            VersionColor::Orange
        }
    }

    /// Lowercase name, as written into the color variable
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}
