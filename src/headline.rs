//! Short marketing headlines for a generated image.

use crate::invoke::invoke_once;
use crate::providers::{self, GenerationProvider};

pub(crate) fn headline_prompt(subject: &str) -> String {
    format!(
        "Generate a single, short marketing headline (5 words max) for a design image about \"{}\".\n\
         Be creative, punchy, and compelling.\n\
         The headline will be displayed as an overlay on the generated image.\n\
         Return ONLY the headline text, nothing else. No quotation marks, no explanation.",
        subject.trim()
    )
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Keeps the first line and drops one surrounding quote on each side of it.
pub(crate) fn clean_headline(raw: &str) -> String {
    let mut headline = raw.trim().lines().next().unwrap_or("").trim();

    if let Some(rest) = headline.strip_prefix(is_quote) {
        headline = rest;
    }

    if let Some(rest) = headline.strip_suffix(is_quote) {
        headline = rest;
    }

    headline.trim().to_string()
}

/// The subject with its first letter capitalized.
pub(crate) fn fallback_headline(subject: &str) -> String {
    let subject = subject.trim();

    let mut chars = subject.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) async fn generate_headline(
    provider: &dyn GenerationProvider,
    model: &str,
    subject: &str,
) -> Result<String, providers::Error> {
    let prompt = headline_prompt(subject);

    let raw = invoke_once(|| provider.generate_text(model, &prompt)).await?;

    Ok(clean_headline(&raw))
}
