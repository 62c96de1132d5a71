//! Capability classes: the kinds of generative work a model is selected for.

use serde::{Deserialize, Serialize};

/// The `CapabilityClass` identifies which kind of backend is being resolved.
///
/// The `to_string` and `FromStr` forms are part of the CLI and the config file
/// and should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum CapabilityClass {
    Text,
    Image,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn names_are_stable() {
        assert_eq!(CapabilityClass::Text.to_string(), "text");
        assert_eq!(CapabilityClass::Image.to_string(), "image");
        assert_eq!(
            CapabilityClass::from_str("image").unwrap(),
            CapabilityClass::Image
        );
        assert!(CapabilityClass::from_str("audio").is_err());
    }

    #[test]
    fn iterates_text_first() {
        let all: Vec<CapabilityClass> = CapabilityClass::iter().collect();

        assert_eq!(all, vec![CapabilityClass::Text, CapabilityClass::Image]);
    }
}
