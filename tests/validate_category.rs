use parley_llm::{ResponseSchema, validate_response};
use serde::Deserialize;

/// 工单优先级分类 `Invalid` 作为解析失败的哨兵值
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
enum Category {
    #[serde(rename = "nonessential")]
    Nonessential,
    #[serde(rename = "low priority")]
    LowPriority,
    #[serde(rename = "medium priority")]
    MediumPriority,
    #[serde(rename = "high priority")]
    HighPriority,
    #[serde(rename = "critical")]
    Critical,
    #[default]
    #[serde(skip)]
    Invalid,
}

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
struct CategoryResponse {
    category: Category,
}

impl ResponseSchema for CategoryResponse {}

fn category(raw: &str) -> Category {
    validate_response::<CategoryResponse>(raw).category
}

#[test]
fn empty_and_prose_replies_degrade_to_invalid() {
    assert_eq!(category(""), Category::Invalid);
    assert_eq!(category("not json at all"), Category::Invalid);
}

#[test]
fn fenced_json_is_accepted() {
    assert_eq!(
        category("```json\n{\"category\":\"low priority\"}\n```"),
        Category::LowPriority
    );
}

#[test]
fn object_embedded_in_prose_is_extracted() {
    assert_eq!(
        category("I'd say this is\n{\n  \"category\": \"critical\"\n}\nbecause prod is down."),
        Category::Critical
    );
}

#[test]
fn values_outside_the_enumeration_are_rejected() {
    assert_eq!(category(r#"{"category":"bogus-value"}"#), Category::Invalid);
    assert_eq!(category(r#"{"category":"Invalid"}"#), Category::Invalid);
    assert_eq!(category(r#"{"priority":"critical"}"#), Category::Invalid);
}

#[test]
fn every_allowed_value_round_trips() {
    for (text, expected) in [
        ("nonessential", Category::Nonessential),
        ("low priority", Category::LowPriority),
        ("medium priority", Category::MediumPriority),
        ("high priority", Category::HighPriority),
        ("critical", Category::Critical),
    ] {
        assert_eq!(category(&format!("{{\"category\": \"{text}\"}}")), expected);
    }
}
