use lazy_static::lazy_static;

use crate::capability::CapabilityClass;

use super::priority::PriorityTable;

// Lowest preference first. Pro beats Flash, newer beats older.
const TEXT_PRIORITY: [&str; 6] = [
    r"gemini-1\.5-flash",
    r"gemini-1\.5-pro",
    r"gemini-2\.0-flash",
    r"gemini-2\.0-pro",
    r"gemini-3\.0-flash",
    r"gemini-3\.0-pro",
];

const IMAGE_PRIORITY: [&str; 5] = [
    r"imagen-3\.0-fast",
    r"imagen-3\.0-generate-001",
    r"gemini-3-pro-image",
    r"imagen-4\.0-generate-001",
    r"imagen-4",
];

// Most preferred first; these are probed in order.
const IMAGE_PROBE_CANDIDATES: [&str; 5] = [
    "imagen-4.0-generate-001",
    "imagen-4-generate-001",
    "imagen-4.0-preview-001",
    "imagen-4-preview-001",
    "imagen-4",
];

const TEXT_PROBE_CANDIDATES: [&str; 3] = [
    "gemini-3.0-pro",
    "gemini-2.0-pro",
    "gemini-2.0-flash-001",
];

lazy_static! {
    static ref TEXT_TABLE: PriorityTable =
        PriorityTable::new(&TEXT_PRIORITY).expect("default text priorities are valid patterns");
    static ref IMAGE_TABLE: PriorityTable =
        PriorityTable::new(&IMAGE_PRIORITY).expect("default image priorities are valid patterns");
}

pub(crate) fn default_priority(capability: CapabilityClass) -> PriorityTable {
    match capability {
        CapabilityClass::Text => TEXT_TABLE.clone(),
        CapabilityClass::Image => IMAGE_TABLE.clone(),
    }
}

pub(crate) fn default_probe_candidates(capability: CapabilityClass) -> Vec<String> {
    let candidates: &[&str] = match capability {
        CapabilityClass::Text => &TEXT_PROBE_CANDIDATES,
        CapabilityClass::Image => &IMAGE_PROBE_CANDIDATES,
    };

    candidates.iter().map(|c| c.to_string()).collect()
}

/// Known-good identifiers used when nothing better can be confirmed.
pub(crate) fn default_fallback(capability: CapabilityClass) -> &'static str {
    match capability {
        CapabilityClass::Text => "gemini-2.0-flash-001",
        CapabilityClass::Image => "imagen-3.0-generate-001",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn defaults_compile_and_rank() {
        let text = default_priority(CapabilityClass::Text);

        assert_eq!(text.patterns().len(), TEXT_PRIORITY.len());
        assert_eq!(
            text.rank(&["gemini-1.5-flash-002", "gemini-2.0-flash-001", "gemini-1.5-pro-002"]),
            Some("gemini-2.0-flash-001")
        );

        let image = default_priority(CapabilityClass::Image);

        assert_eq!(
            image.rank(&["imagen-3.0-generate-001", "imagen-3.0-fast-generate-001"]),
            Some("imagen-3.0-generate-001")
        );
    }

    #[test]
    fn fallbacks_are_ranked_by_their_own_tables() {
        for capability in CapabilityClass::iter() {
            let table = default_priority(capability);

            assert!(table.rank_of(default_fallback(capability)).is_some());
            assert!(!default_probe_candidates(capability).is_empty());
        }
    }
}
