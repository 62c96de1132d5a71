use std::collections::BTreeMap;
use strum::IntoEnumIterator;

use super::output::{format_output, Table};
use super::session_or_die;
use crate::capability::CapabilityClass;
use crate::config::Config;
use crate::die;
use crate::providers::ModelBackend;
use crate::registry::model_info::model_info;
use crate::registry::probe::extract_identifier;
use crate::registry::resolver::Resolver;
use crate::ListArgs;

#[derive(serde::Serialize)]
struct CatalogModel {
    model: String,
    generation: &'static str,
    /// Rank in each shown capability's table; higher is preferred
    ranks: BTreeMap<CapabilityClass, Option<usize>>,
}

struct Catalog {
    capabilities: Vec<CapabilityClass>,
    models: Vec<CatalogModel>,
}

impl serde::Serialize for Catalog {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.models.serialize(serializer)
    }
}

impl From<Catalog> for Table {
    fn from(value: Catalog) -> Self {
        let mut tab = Table::new();

        let mut header = vec!["MODEL".to_string(), "GENERATION".to_string()];

        header.extend(
            value
                .capabilities
                .iter()
                .map(|capability| format!("{}_RANK", capability.to_string().to_uppercase())),
        );

        tab.set_header(header);

        for model in value.models {
            let mut row = vec![model.model, model.generation.to_string()];

            row.extend(value.capabilities.iter().map(|capability| {
                match model.ranks.get(capability).copied().flatten() {
                    Some(rank) => rank.to_string(),
                    None => "-".to_string(),
                }
            }));

            tab.add_row(row);
        }

        tab
    }
}

fn rank_catalog(
    resolver: &Resolver,
    identifiers: Vec<String>,
    capabilities: Vec<CapabilityClass>,
) -> Catalog {
    let models = identifiers
        .into_iter()
        .map(|model| {
            let ranks = capabilities
                .iter()
                .map(|&capability| (capability, resolver.policy(capability).table.rank_of(&model)))
                .collect();

            CatalogModel {
                generation: model_info(&model).generation,
                model,
                ranks,
            }
        })
        .collect();

    Catalog {
        capabilities,
        models,
    }
}

pub(crate) async fn list_cmd(config: &Config, args: &ListArgs) {
    let session = session_or_die(config);

    let names = match session.backend.list_models().await {
        Ok(names) => names,
        Err(err) => die!("failed to list models: {}", err),
    };

    let identifiers: Vec<String> = names
        .iter()
        .filter_map(|name| extract_identifier(name))
        .map(str::to_string)
        .collect();

    let capabilities: Vec<CapabilityClass> = match args.capability {
        Some(capability) => vec![capability],
        None => CapabilityClass::iter().collect(),
    };

    let catalog = rank_catalog(&session.resolver, identifiers, capabilities);

    format_output(catalog, args.format);
}
