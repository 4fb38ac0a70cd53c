//! The analysis value object and its lenient decoding

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Structured commentary on one paper.
///
/// Upstream output is best-effort: list fields may arrive as a single
/// string, text fields as lists, and any field may be missing. All of
/// those are coerced here so storage and rendering never see a bad shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub key_findings: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub methodology: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub limitations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub future_work: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub impact: String,
}

impl Analysis {
    /// Trim tags, drop empties and repeats, keep first-seen order
    pub fn normalize_tags(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.tags = seen;
        self
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(value_to_text).collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => value_to_text(other).into_iter().collect(),
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => value_to_text(other).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::ValueType;

    #[test]
    fn test_json_column_value() {
        let analysis = Analysis {
            tags: vec!["NLP".into()],
            summary: "Short".into(),
            key_findings: vec!["One".into(), "Two".into()],
            ..Default::default()
        };

        let value: sea_orm::Value = analysis.clone().into();
        assert!(matches!(value, sea_orm::Value::Json(Some(_))));
        assert_eq!(<Analysis as ValueType>::try_from(value).unwrap(), analysis);
    }
}
