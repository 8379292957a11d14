use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Alias, RawResponse};

static ALIAS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.]+$").unwrap());

/// Reduce the model answer to an alias.
///
/// Only the first part counts, and only its first line break is removed.
/// Case and grammar are left as the model returned them.
pub fn normalize(response: RawResponse) -> PipelineResult<Alias> {
    let first = response
        .parts
        .into_iter()
        .next()
        .ok_or(PipelineError::NoAliasExtracted)?;
    let text = first.to_string().replacen('\n', "", 1);
    Ok(Alias(text))
}

/// Whether the alias satisfies the grammar the instruction asks for.
pub fn matches_alias_grammar(alias: &Alias) -> bool {
    ALIAS_RE.is_match(alias.as_str())
}
