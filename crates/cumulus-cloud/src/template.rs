//! Name-template expansion for bulk operations
//!
//! A declared name may carry a printf-style numeric placeholder
//! (`web%02d`). With `count > 1` the template expands into `count`
//! distinct member names; a template without a placeholder gets `%d`
//! appended, matching what the provider tooling historically did.

use regex::Regex;

const PLACEHOLDER: &str = r"%(0(\d+))?d";

/// Expand a name template deterministically into `count` member names.
///
/// Enumeration starts at 1. With `count <= 1` the name is returned
/// as-is, placeholder included, so a single resource keeps its literal
/// name.
pub fn expand_names(template: &str, count: u32) -> Vec<String> {
    if count <= 1 {
        return vec![template.to_string()];
    }

    let re = Regex::new(PLACEHOLDER).unwrap();
    let template = if re.is_match(template) {
        template.to_string()
    } else {
        format!("{template}%d")
    };

    (1..=count)
        .map(|n| {
            re.replace(&template, |caps: &regex::Captures<'_>| {
                let width: usize = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                format!("{n:0width$}")
            })
            .into_owned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_placeholder() {
        assert_eq!(expand_names("web%02d", 3), vec!["web01", "web02", "web03"]);
    }

    #[test]
    fn test_bare_placeholder() {
        assert_eq!(expand_names("vol%d", 2), vec!["vol1", "vol2"]);
    }

    #[test]
    fn test_no_placeholder_appends_index() {
        assert_eq!(expand_names("db", 2), vec!["db1", "db2"]);
    }

    #[test]
    fn test_single_count_keeps_literal_name() {
        assert_eq!(expand_names("standalone", 1), vec!["standalone"]);
        assert_eq!(expand_names("web%02d", 1), vec!["web%02d"]);
    }

    #[test]
    fn test_expansion_is_deterministic() {
        assert_eq!(expand_names("node%03d", 4), expand_names("node%03d", 4));
    }
}
