use serde::Serialize;

use crate::capability::CapabilityClass;

/// Display metadata derived from a model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ModelInfo {
    pub name: String,
    pub generation: &'static str,
    pub capability: CapabilityClass,
}

pub(crate) fn model_info(model: &str) -> ModelInfo {
    let generation = if model.contains("3.0") {
        "3.0"
    } else if model.contains("2.0") {
        "2.0"
    } else {
        "1.5"
    };

    let capability = if model.contains("imagen") {
        CapabilityClass::Image
    } else {
        CapabilityClass::Text
    };

    ModelInfo {
        name: model.to_string(),
        generation,
        capability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_and_capabilities() {
        let info = model_info("gemini-3.0-pro");
        assert_eq!(info.generation, "3.0");
        assert_eq!(info.capability, CapabilityClass::Text);

        let info = model_info("imagen-3.0-generate-001");
        assert_eq!(info.capability, CapabilityClass::Image);

        assert_eq!(model_info("gemini-2.0-flash-001").generation, "2.0");
        assert_eq!(model_info("gemini-1.5-flash").generation, "1.5");
    }
}
