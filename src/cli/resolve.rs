use strum::IntoEnumIterator;

use super::output::{format_age, format_output, Table};
use super::session_or_die;
use crate::capability::CapabilityClass;
use crate::config::Config;
use crate::die;
use crate::registry::resolver::{ResolvedSelection, SelectionSource};
use crate::ResolveArgs;

#[derive(serde::Serialize)]
struct Resolution {
    capability: CapabilityClass,
    model: String,
    source: SelectionSource,
    age_secs: u64,
}

impl Resolution {
    fn from_selection(selection: ResolvedSelection) -> Resolution {
        Resolution {
            capability: selection.capability,
            age_secs: selection.resolved_at.elapsed().as_secs(),
            model: selection.identifier,
            source: selection.source,
        }
    }
}

impl From<Vec<Resolution>> for Table {
    fn from(value: Vec<Resolution>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["CAPABILITY", "MODEL", "SOURCE", "AGE"]);

        for resolution in value {
            tab.add_row(vec![
                resolution.capability.to_string(),
                resolution.model,
                resolution.source.to_string(),
                format_age(resolution.age_secs),
            ]);
        }

        tab
    }
}

pub(crate) async fn resolve_cmd(config: &Config, args: &ResolveArgs) {
    let session = session_or_die(config);

    if let Some(model) = &args.check {
        if session.resolver.is_model_available(model).await {
            println!("{} is selected", model);
            return;
        }

        die!("{} is not selected for any capability", model);
    }

    let capabilities: Vec<CapabilityClass> = match args.capability {
        Some(capability) => vec![capability],
        None => CapabilityClass::iter().collect(),
    };

    let mut resolutions = Vec::new();

    for capability in capabilities {
        let selection = session
            .resolver
            .resolve_selection(capability, args.force)
            .await;

        resolutions.push(Resolution::from_selection(selection));
    }

    format_output(resolutions, args.format);
}
