use regex::{Regex, RegexBuilder};

/// One entry of a [`PriorityTable`]: an independent predicate over model identifiers.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compiles `pattern` as a case-insensitive regular expression.
    pub(crate) fn new(pattern: &str) -> Result<Pattern, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;

        Ok(Pattern { regex })
    }

    pub(crate) fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// An ordered list of patterns, from least to most preferred.
#[derive(Debug, Clone, Default)]
pub(crate) struct PriorityTable {
    patterns: Vec<Pattern>,
}

impl PriorityTable {
    pub(crate) fn new<S: AsRef<str>>(patterns: &[S]) -> Result<PriorityTable, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PriorityTable { patterns })
    }

    pub(crate) fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// The highest rank `candidate` matches, if any.
    pub(crate) fn rank_of(&self, candidate: &str) -> Option<usize> {
        self.patterns
            .iter()
            .enumerate()
            .filter(|(_, p)| p.matches(candidate))
            .map(|(rank, _)| rank)
            .last()
    }

    /// Selects the best candidate. See [`rank`].
    pub(crate) fn rank<'c, S: AsRef<str>>(&self, candidates: &'c [S]) -> Option<&'c str> {
        rank(candidates, self)
    }
}

/// Picks the candidate matching the highest-ranked pattern of `table`.
///
/// Candidates are scanned in input order and the running best is only replaced
/// by a strictly higher rank, so among candidates sharing the winning rank the
/// first one seen wins. Returns `None` if no candidate matches any pattern.
pub(crate) fn rank<'c, S: AsRef<str>>(candidates: &'c [S], table: &PriorityTable) -> Option<&'c str> {
    let mut best: Option<(usize, &'c str)> = None;

    for candidate in candidates {
        let candidate = candidate.as_ref();

        for (rank, pattern) in table.patterns.iter().enumerate() {
            if !pattern.matches(candidate) {
                continue;
            }

            match best {
                Some((best_rank, _)) if rank <= best_rank => {}
                _ => best = Some((rank, candidate)),
            }
        }
    }

    best.map(|(_, candidate)| candidate)
}
