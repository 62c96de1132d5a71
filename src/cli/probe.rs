use super::output::{format_output, Table};
use super::session_or_die;
use crate::config::Config;
use crate::registry::probe::{probe_candidates, ProbeResult};
use crate::{die, note, ProbeArgs};

#[derive(serde::Serialize)]
struct ProbeReport {
    results: Vec<ProbeResult>,
}

impl From<ProbeReport> for Table {
    fn from(value: ProbeReport) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "STATUS", "VERDICT"]);

        for result in value.results {
            tab.add_row(vec![
                result.identifier.clone(),
                match result.http_status {
                    Some(status) => status.to_string(),
                    None => "-".to_string(),
                },
                result.verdict().to_string(),
            ]);
        }

        tab
    }
}

pub(crate) async fn probe_cmd(config: &Config, args: &ProbeArgs) {
    let session = session_or_die(config);

    let candidates = if args.candidates.is_empty() {
        session.resolver.policy(args.capability).probe_candidates.clone()
    } else {
        args.candidates.clone()
    };

    if candidates.is_empty() {
        die!("no {} candidates to probe", args.capability);
    }

    let outcome = probe_candidates(session.backend.as_ref(), args.capability, &candidates).await;

    let untried = candidates.len() - outcome.results.len();

    format_output(
        ProbeReport {
            results: outcome.results,
        },
        args.format,
    );

    match outcome.selected {
        Some(selected) if untried > 0 => note!(
            "{} is available; {} lower-preference candidate(s) were not probed",
            selected,
            untried
        ),
        Some(_) => {}
        None => note!(
            "no candidate answered; the {} fallback would be used",
            args.capability
        ),
    }
}
