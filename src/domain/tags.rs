//! Tag group definitions and merging of user overrides.

use std::collections::HashMap;

use serde::Serialize;

/// One tag group as rendered by the tagging UI.
#[derive(Debug, Clone, Serialize)]
pub struct TagGroup {
    pub id: &'static str,
    pub label: &'static str,
    pub dot: &'static str,
    pub active_class: &'static str,
    pub tags: Vec<String>,
    pub multi: bool,
}

fn owned(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

/// The built-in tag groups. Per-group tag lists can be overridden from the
/// database; everything else is fixed.
pub fn default_tag_groups() -> Vec<TagGroup> {
    vec![
        TagGroup {
            id: "with",
            label: "With",
            dot: "dot-with",
            active_class: "active-with",
            tags: owned(&["Value", "Market Internals", "ADH", "AVWAP", "VWAP"]),
            multi: true,
        },
        TagGroup {
            id: "against",
            label: "Against",
            dot: "dot-against",
            active_class: "active-against",
            tags: owned(&["Value", "Market Internals", "ADH", "AVWAP", "VWAP"]),
            multi: true,
        },
        TagGroup {
            id: "volume",
            label: "Volume",
            dot: "dot-vol",
            active_class: "active-vol",
            tags: owned(&["Avg", "Above Avg", "Below Avg"]),
            multi: false,
        },
        TagGroup {
            id: "exit",
            label: "Exit",
            dot: "dot-exit",
            active_class: "active-exit",
            tags: owned(&["Planned — Monitored Continuation", "Fear / Anxious"]),
            multi: false,
        },
        TagGroup {
            id: "setup",
            label: "Setup",
            dot: "dot-setup",
            active_class: "active-setup",
            tags: owned(&[
                "With Value",
                "Recapture of VWAP",
                "Break out of Range",
                "Initiative",
                "Low Tempo fade",
                "Balance Fade",
                "Look out of balance failed",
                "Gap fill failed",
                "No Setup",
                "Intuitive / Gut Feel",
            ]),
            multi: false,
        },
        TagGroup {
            id: "pre",
            label: "Pre-Trade",
            dot: "dot-pre",
            active_class: "active-pre",
            tags: owned(&[
                "Trade came to me",
                "Intuition / Mkt Feel",
                "Not sure about context",
                "Quick Profit Attitude",
                "Revenge Mindset",
                "Boredom",
                "Distracted",
            ]),
            multi: true,
        },
    ]
}

/// Default tag groups with per-group tag lists replaced by any custom
/// config. Groups without an override keep their defaults.
pub fn merge_tag_overrides(overrides: Option<HashMap<String, Vec<String>>>) -> Vec<TagGroup> {
    let mut groups = default_tag_groups();
    if let Some(custom) = overrides {
        for g in &mut groups {
            if let Some(tags) = custom.get(g.id) {
                g.tags = tags.clone();
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_six_groups() {
        let groups = default_tag_groups();
        assert_eq!(groups.len(), 6);
        let ids: Vec<_> = groups.iter().map(|g| g.id).collect();
        assert_eq!(ids, ["with", "against", "volume", "exit", "setup", "pre"]);
    }

    #[test]
    fn override_replaces_only_named_group() {
        let mut custom = HashMap::new();
        custom.insert("volume".to_string(), vec!["Thin".to_string(), "Heavy".to_string()]);
        let groups = merge_tag_overrides(Some(custom));

        let volume = groups.iter().find(|g| g.id == "volume").unwrap();
        assert_eq!(volume.tags, ["Thin", "Heavy"]);

        let setup = groups.iter().find(|g| g.id == "setup").unwrap();
        assert_eq!(setup.tags.len(), 10);
    }

    #[test]
    fn no_overrides_returns_defaults() {
        let groups = merge_tag_overrides(None);
        let with = groups.iter().find(|g| g.id == "with").unwrap();
        assert_eq!(with.tags[0], "Value");
        assert!(with.multi);
    }
}
