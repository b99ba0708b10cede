//! Notification titles for keyword alerts.

use tracing::warn;

use crate::action::ActionOutcome;
use crate::rules::template::Placeholders;

const DEFAULT_TITLE: &str = "default";

/// Build the title for `labels` found in `entity`.
///
/// `template` is either `"default"` or a format string using `{container}`,
/// `{keywords}` or `{keyword}`; both keyword fields expand to the quoted,
/// comma-joined label list. A template that cannot be applied falls back
/// to the default wording.
pub fn keyword_title(entity: &str, labels: &[String], template: &str) -> String {
    let template = template.trim();
    if !template.eq_ignore_ascii_case(DEFAULT_TITLE) {
        match apply_template(template, entity, labels) {
            Ok(title) if !title.is_empty() => return title,
            Ok(_) => {}
            Err(reason) => {
                warn!(template, %reason, "Could not apply notification title template, using default");
            }
        }
    }
    default_title(entity, labels)
}

fn default_title(entity: &str, labels: &[String]) -> String {
    match labels {
        [] => format!("{}: []", entity),
        [one] => format!("'{}' found in {}", one, entity),
        [a, b] => format!("'{}' and '{}' found in {}", a, b, entity),
        _ => format!("The following keywords were found in {}: {}", entity, quoted(labels)),
    }
}

fn quoted(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("'{}'", l))
        .collect::<Vec<_>>()
        .join(", ")
}

fn apply_template(template: &str, entity: &str, labels: &[String]) -> Result<String, String> {
    let placeholders = Placeholders::parse(template).map_err(|e| e.reason)?;
    let keywords = quoted(labels);
    placeholders
        .expand(|field| match field {
            "container" => Some(entity.to_string()),
            "keywords" | "keyword" => Some(keywords.clone()),
            _ => None,
        })
        .map_err(|field| format!("unknown field '{}'", field))
}

/// Prefix `title` with the outcome of the actions taken for the same entry.
pub fn with_action_outcomes(title: String, outcomes: &[ActionOutcome]) -> String {
    outcomes.iter().rev().fold(title, |title, outcome| {
        if outcome.succeeded() {
            format!("{} was {}! - {}", outcome.container, outcome.kind.past_tense(), title)
        } else {
            format!("Failed to {} {}! - {}", outcome.kind.verb(), outcome.container, title)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ── Default wording ─────────────────────────────────────────

    #[test]
    fn test_single_keyword() {
        assert_eq!(keyword_title("web", &labels(&["error"]), "default"), "'error' found in web");
    }

    #[test]
    fn test_two_keywords() {
        assert_eq!(
            keyword_title("web", &labels(&["error", "timeout"]), "default"),
            "'error' and 'timeout' found in web"
        );
    }

    #[test]
    fn test_many_keywords() {
        assert_eq!(
            keyword_title("web", &labels(&["a", "b", "c"]), "DEFAULT"),
            "The following keywords were found in web: 'a', 'b', 'c'"
        );
    }

    // ── Templates ───────────────────────────────────────────────

    #[test]
    fn test_custom_template() {
        assert_eq!(
            keyword_title("web", &labels(&["error", "oom"]), "[{container}] {keywords}"),
            "[web] 'error', 'oom'"
        );
        assert_eq!(keyword_title("web", &labels(&["x"]), "{keyword}!"), "'x'!");
    }

    #[test]
    fn test_template_escaped_braces() {
        assert_eq!(keyword_title("web", &labels(&["x"]), "{{{container}}}"), "{web}");
    }

    #[test]
    fn test_unknown_field_falls_back() {
        assert_eq!(keyword_title("web", &labels(&["error"]), "{host}: {keywords}"), "'error' found in web");
    }

    #[test]
    fn test_unclosed_template_falls_back() {
        assert_eq!(keyword_title("web", &labels(&["error"]), "{container"), "'error' found in web");
    }

    // ── Action prefix ───────────────────────────────────────────

    #[test]
    fn test_action_prefix_success_and_failure() {
        let ok = ActionOutcome {
            kind: ActionKind::Restart,
            container: "web".to_string(),
            error: None,
        };
        let failed = ActionOutcome {
            kind: ActionKind::Stop,
            container: "web".to_string(),
            error: Some("permission denied".to_string()),
        };

        assert_eq!(
            with_action_outcomes("'oom' found in web".to_string(), &[ok.clone()]),
            "web was restarted! - 'oom' found in web"
        );
        assert_eq!(
            with_action_outcomes("'oom' found in web".to_string(), &[failed]),
            "Failed to stop web! - 'oom' found in web"
        );
        assert_eq!(with_action_outcomes("t".to_string(), &[]), "t");
    }
}
