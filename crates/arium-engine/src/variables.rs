use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use arium_core::types::value_to_text;

use crate::node::Variables;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Placeholder names referenced by a text, e.g. `"Hello {name}"` → `{name}`.
pub fn placeholders(text: &str) -> BTreeSet<String> {
    placeholder_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Substitute every known placeholder. Unknown placeholders are left
/// intact; the engine validates completeness before substituting.
pub fn substitute(text: &str, variables: &Variables) -> String {
    placeholder_re()
        .replace_all(text, |caps: &regex::Captures| {
            match variables.get(&caps[1]) {
                Some(value) => value_to_text(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
