use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::model::{Category, MappingSelection};

/// How far the model's chosen id is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidatePolicy {
    /// The id must be one of the candidates shown in the prompt.
    #[default]
    Strict,
    /// Any id present in the marketplace catalog is accepted.
    Catalog,
}

/// Pulls a `{"name", "id"}` selection out of free-form model output.
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    brace_span: Regex,
    policy: CandidatePolicy,
}

impl ResponseExtractor {
    pub fn new(policy: CandidatePolicy) -> Result<Self> {
        let brace_span =
            Regex::new(r"(?s)\{.*\}").context("failed to compile JSON brace-span regex")?;
        Ok(Self { brace_span, policy })
    }

    /// The returned `full_path` always comes from `catalog`, never from the
    /// model.
    pub fn extract(
        &self,
        raw: &str,
        candidates: &[&Category],
        catalog: &[Category],
    ) -> Result<MappingSelection, ExtractError> {
        let span = self
            .brace_span
            .find(raw)
            .ok_or(ExtractError::NoJsonObject)?
            .as_str();

        let value: Value = serde_json::from_str(span)?;
        let object = value.as_object().ok_or(ExtractError::NotAnObject)?;

        let id = required_text(object, "id")?;
        let name = required_text(object, "name")?;

        let in_candidates = candidates.iter().any(|category| category.category_id == id);
        let catalog_entry = catalog.iter().find(|category| category.category_id == id);

        match self.policy {
            CandidatePolicy::Strict if !in_candidates => {
                return Err(ExtractError::OutsideCandidates(id));
            }
            CandidatePolicy::Catalog if catalog_entry.is_none() && !in_candidates => {
                return Err(ExtractError::UnknownCategory(id));
            }
            _ => {}
        }

        let full_path = catalog_entry
            .and_then(|category| category.full_path.clone())
            .filter(|path| !path.is_empty());

        Ok(MappingSelection {
            name,
            id,
            full_path,
        })
    }
}

/// Models occasionally answer numeric ids as JSON numbers.
fn required_text(object: &Map<String, Value>, key: &'static str) -> Result<String, ExtractError> {
    let text = match object.get(key) {
        Some(Value::String(value)) => value.trim().to_string(),
        Some(Value::Number(value)) => value.to_string(),
        _ => String::new(),
    };

    if text.is_empty() {
        return Err(ExtractError::MissingField(key));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarketplaceId;

    fn category(category_id: &str, name: &str, path: Option<&str>) -> Category {
        Category {
            id: format!("cat_{category_id}"),
            marketplace_id: MarketplaceId::MercariShops,
            category_name: name.to_string(),
            category_id: category_id.to_string(),
            full_path: path.map(str::to_string),
            parent_category_id: None,
        }
    }

    fn strict() -> ResponseExtractor {
        ResponseExtractor::new(CandidatePolicy::Strict).expect("extractor should build")
    }

    #[test]
    fn enriches_selection_with_catalog_full_path() {
        let catalog = vec![category("X", "Y", Some("A > B"))];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let selection = strict()
            .extract(r#"{"id":"X","name":"Y"}"#, &candidates, &catalog)
            .expect("selection should extract");

        assert_eq!(
            selection,
            MappingSelection {
                name: "Y".to_string(),
                id: "X".to_string(),
                full_path: Some("A > B".to_string()),
            }
        );
    }

    #[test]
    fn tolerates_prose_and_code_fences_around_json() {
        let catalog = vec![category("C1", "Foo", Some("Root > Foo"))];
        let candidates = catalog.iter().collect::<Vec<&Category>>();
        let raw = "Here is my answer:\n```json\n{\n  \"name\": \"Foo\",\n  \"id\": \"C1\"\n}\n```\nThanks.";

        let selection = strict()
            .extract(raw, &candidates, &catalog)
            .expect("fenced json should extract");
        assert_eq!(selection.id, "C1");
        assert_eq!(selection.name, "Foo");
        assert_eq!(selection.full_path.as_deref(), Some("Root > Foo"));
    }

    #[test]
    fn text_without_braces_is_rejected() {
        let catalog = vec![category("C1", "Foo", None)];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        for raw in ["", "no json here", "id: C1, name: Foo", "} backwards {"] {
            let err = strict()
                .extract(raw, &candidates, &catalog)
                .expect_err("text without a brace span should fail");
            assert!(matches!(err, ExtractError::NoJsonObject), "raw={raw:?}");
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let catalog = vec![category("C1", "Foo", None)];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let err = strict()
            .extract(r#"{"id": "C1", "name": }"#, &candidates, &catalog)
            .expect_err("broken json should fail");
        assert!(matches!(err, ExtractError::InvalidJson(_)));
    }

    #[test]
    fn greedy_span_covering_two_objects_is_rejected() {
        let catalog = vec![category("C1", "Foo", None)];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let err = strict()
            .extract(
                r#"{"id":"C1","name":"Foo"} or maybe {"id":"C2","name":"Bar"}"#,
                &candidates,
                &catalog,
            )
            .expect_err("first-to-last brace span is not valid json");
        assert!(matches!(err, ExtractError::InvalidJson(_)));
    }

    #[test]
    fn missing_or_empty_fields_are_rejected() {
        let catalog = vec![category("C1", "Foo", None)];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let cases = [
            (r#"{"name":"Foo"}"#, "id"),
            (r#"{"id":"C1"}"#, "name"),
            (r#"{"id":"","name":"Foo"}"#, "id"),
            (r#"{"id":"C1","name":"   "}"#, "name"),
            (r#"{"id":null,"name":"Foo"}"#, "id"),
        ];
        for (raw, field) in cases {
            let err = strict()
                .extract(raw, &candidates, &catalog)
                .expect_err("incomplete selection should fail");
            assert!(
                matches!(err, ExtractError::MissingField(missing) if missing == field),
                "raw={raw}"
            );
        }
    }

    #[test]
    fn numeric_id_is_accepted_as_text() {
        let catalog = vec![category("100371", "Tシャツ", Some("トップス > Tシャツ"))];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let selection = strict()
            .extract(r#"{"id": 100371, "name": "Tシャツ"}"#, &candidates, &catalog)
            .expect("numeric id should extract");
        assert_eq!(selection.id, "100371");
    }

    #[test]
    fn strict_policy_rejects_catalog_ids_outside_candidates() {
        let catalog = vec![
            category("C1", "Foo", Some("Root > Foo")),
            category("C2", "Bar", Some("Root > Bar")),
        ];
        let candidates = vec![&catalog[0]];

        let err = strict()
            .extract(r#"{"id":"C2","name":"Bar"}"#, &candidates, &catalog)
            .expect_err("id outside candidates should fail");
        assert!(matches!(err, ExtractError::OutsideCandidates(id) if id == "C2"));
    }

    #[test]
    fn catalog_policy_accepts_catalog_ids_outside_candidates() {
        let catalog = vec![
            category("C1", "Foo", Some("Root > Foo")),
            category("C2", "Bar", Some("Root > Bar")),
        ];
        let candidates = vec![&catalog[0]];
        let extractor =
            ResponseExtractor::new(CandidatePolicy::Catalog).expect("extractor should build");

        let selection = extractor
            .extract(r#"{"id":"C2","name":"Bar"}"#, &candidates, &catalog)
            .expect("catalog id should extract");
        assert_eq!(selection.full_path.as_deref(), Some("Root > Bar"));

        let err = extractor
            .extract(r#"{"id":"C9","name":"Ghost"}"#, &candidates, &catalog)
            .expect_err("unknown id should fail");
        assert!(matches!(err, ExtractError::UnknownCategory(id) if id == "C9"));
    }

    #[test]
    fn empty_catalog_path_is_left_absent() {
        let catalog = vec![category("C1", "Foo", Some(""))];
        let candidates = catalog.iter().collect::<Vec<&Category>>();

        let selection = strict()
            .extract(r#"{"id":"C1","name":"Foo"}"#, &candidates, &catalog)
            .expect("selection should extract");
        assert!(selection.full_path.is_none());
    }
}
