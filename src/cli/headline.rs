use super::Session;
use crate::capability::CapabilityClass;
use crate::config::Config;
use crate::headline::{fallback_headline, generate_headline};
use crate::invoke::{Classify, FailureClass};
use crate::registry::populate::{self, vertex_backend};
use crate::{die, warn, HeadlineArgs};

pub(crate) async fn headline_cmd(config: &Config, args: &HeadlineArgs) {
    let subject = args.subject.trim();

    if subject.is_empty() {
        die!("a subject is required");
    }

    let backend = match vertex_backend(config) {
        Ok(backend) => backend,
        Err(err @ populate::Error::MissingProjectId(_)) => {
            warn!("{}; using the subject as the headline", err);
            println!("{}", fallback_headline(subject));
            return;
        }
        Err(err) => die!("{}", err),
    };

    let session = Session::from_backend(config, backend);

    let model = session.resolver.resolve(CapabilityClass::Text, false).await;

    match generate_headline(&*session.backend, &model, subject).await {
        Ok(headline) => println!("{}", headline),
        Err(err) if err.failure_class() == FailureClass::Authentication => {
            warn!("{}; using the subject as the headline", err);
            println!("{}", fallback_headline(subject));
        }
        Err(err) => die!(
            "headline generation failed: {}\n       {}",
            err,
            err.failure_class().remediation()
        ),
    }
}
