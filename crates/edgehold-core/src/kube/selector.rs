//! Equality-based label and field selectors (`a=b,c!=d`).

use edgehold_types::ResourceObject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Parse a comma-separated list of `k=v`, `k==v`, `k!=v` terms.
    /// Returns `None` on a malformed term.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut requirements = Vec::new();
        for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let req = if let Some((k, v)) = term.split_once("!=") {
                Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else {
                return None;
            };
            requirements.push(req);
        }
        Some(Self { requirements })
    }

    pub fn matches_labels(&self, obj: &ResourceObject) -> bool {
        self.matches_with(|key| obj.label(key))
    }

    /// Field paths are dotted (`spec.nodeName`, `metadata.name`).
    pub fn matches_fields(&self, obj: &ResourceObject) -> bool {
        self.matches_with(|path| obj.field_str(path))
    }

    fn matches_with<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equals(k, v) => lookup(k.as_str()) == Some(v.as_str()),
            Requirement::NotEquals(k, v) => lookup(k.as_str()) != Some(v.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgehold_types::ResourceKind;
    use serde_json::json;

    fn pod() -> ResourceObject {
        ResourceObject::try_from(json!({
            "metadata": {"name": "p", "namespace": "ns", "labels": {"app": "web", "tier": "edge"}},
            "spec": {"nodeName": "edge-1"}
        }))
        .unwrap()
    }

    #[test]
    fn test_label_selector() {
        let obj = pod();
        assert!(Selector::parse("app=web").unwrap().matches_labels(&obj));
        assert!(Selector::parse("app==web, tier=edge").unwrap().matches_labels(&obj));
        assert!(!Selector::parse("app!=web").unwrap().matches_labels(&obj));
        assert!(Selector::parse("missing!=x").unwrap().matches_labels(&obj));
        assert!(!Selector::parse("missing=x").unwrap().matches_labels(&obj));
    }

    #[test]
    fn test_field_selector() {
        let obj = pod();
        assert!(Selector::parse("spec.nodeName=edge-1").unwrap().matches_fields(&obj));
        assert!(!Selector::parse("spec.nodeName=edge-2").unwrap().matches_fields(&obj));
        let node = ResourceObject::new(ResourceKind::Node, None, "edge-1");
        assert!(Selector::parse("metadata.name=edge-1").unwrap().matches_fields(&node));
    }

    #[test]
    fn test_malformed_selector() {
        assert!(Selector::parse("justakey").is_none());
        assert_eq!(Selector::parse("").unwrap(), Selector::default());
    }
}
