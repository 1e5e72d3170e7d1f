//! Declarative response shapes and the prompt instructions derived from them.

use serde_json::{Map, Value, json};

use campaignsmith_shared::MAX_SCORE;

/// Value type of one field in a model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty string.
    Text,
    /// Array of strings.
    TextList,
    /// Integer rubric score in `0..=MAX_SCORE`.
    Score,
}

/// One required field of a response object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            description,
        }
    }

    pub const fn text_list(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::TextList,
            description,
        }
    }

    pub const fn score(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Score,
            description: "integer score from 0 (poor) to 5 (excellent)",
        }
    }

    fn json_schema(&self) -> Value {
        match self.kind {
            FieldKind::Text => json!({
                "type": "string",
                "description": self.description,
            }),
            FieldKind::TextList => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": self.description,
            }),
            FieldKind::Score => json!({
                "type": "integer",
                "minimum": 0,
                "maximum": MAX_SCORE,
                "description": self.description,
            }),
        }
    }
}

/// Shape of an entire model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// A single object with the given fields.
    Object {
        title: &'static str,
        fields: Vec<FieldSpec>,
    },
    /// An object whose `key` holds a list of item objects.
    List {
        title: &'static str,
        key: &'static str,
        item: Vec<FieldSpec>,
        min_items: usize,
        max_items: Option<usize>,
    },
}

impl Schema {
    /// JSON-schema document describing this shape.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::Object { title, fields } => {
                let mut schema = object_schema(fields);
                if let Value::Object(map) = &mut schema {
                    map.insert("title".into(), json!(title));
                }
                schema
            }
            Self::List {
                title,
                key,
                item,
                min_items,
                max_items,
            } => {
                let mut list = json!({
                    "type": "array",
                    "minItems": min_items,
                    "items": object_schema(item),
                });
                if let (Some(max), Value::Object(map)) = (max_items, &mut list) {
                    map.insert("maxItems".into(), json!(max));
                }

                let mut properties = Map::new();
                properties.insert((*key).to_string(), list);

                json!({
                    "title": title,
                    "type": "object",
                    "properties": properties,
                    "required": [key],
                })
            }
        }
    }

    /// Instructions embedded into the prompt. Deterministic per schema.
    pub fn render_instructions(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.to_json_schema())
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            "Respond with a single JSON object that conforms to the JSON schema below. \
             Every listed property is required; scores must be whole numbers within the \
             stated minimum and maximum. Do not wrap the object in prose.\n\n\
             ```json\n{schema}\n```"
        )
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), field.json_schema());
    }
    let required: Vec<&str> = fields.iter().map(|f| f.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
