//! Schema definitions and introspection
//!
//! A [`SchemaDefinition`] is the declarative description of a structured LLM
//! output: named fields with declared types and nullable markers. The
//! [`SchemaIntrospector`] resolves it once into a [`Schema`], a closed set of
//! [`FieldSpec`]s whose [`TypeTag`] drives every later comparison.

use crate::scorer::literal_eq;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Declared type of a field, as written in a schema definition.
///
/// Serializes as `"string"`, `"date"`, ... for plain types and as
/// `{"literal": [...]}`, `{"list": ...}`, `{"optional": ...}` for the
/// parameterized ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    /// Free text; short vs. long is decided per comparison by length
    String,
    /// Free text always scored by token overlap
    ShortText,
    /// Free text always scored by embeddings
    LongText,
    Integer,
    Float,
    Boolean,
    /// ISO-8601 calendar date
    Date,
    /// Nested object (no scoring strategy)
    Object,
    /// Closed set of allowed values
    Literal(Vec<Value>),
    /// Homogeneous sequence
    List(Box<DeclaredType>),
    /// Nullable wrapper
    Optional(Box<DeclaredType>),
}

impl DeclaredType {
    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        DeclaredType::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn list(items: DeclaredType) -> Self {
        DeclaredType::List(Box::new(items))
    }

    pub fn optional(inner: DeclaredType) -> Self {
        DeclaredType::Optional(Box::new(inner))
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::String => write!(f, "string"),
            DeclaredType::ShortText => write!(f, "short_text"),
            DeclaredType::LongText => write!(f, "long_text"),
            DeclaredType::Integer => write!(f, "integer"),
            DeclaredType::Float => write!(f, "float"),
            DeclaredType::Boolean => write!(f, "boolean"),
            DeclaredType::Date => write!(f, "date"),
            DeclaredType::Object => write!(f, "object"),
            DeclaredType::Literal(values) => write!(f, "literal[{} values]", values.len()),
            DeclaredType::List(items) => write!(f, "list<{}>", items),
            DeclaredType::Optional(inner) => write!(f, "optional<{}>", inner),
        }
    }
}

/// Declaration of a single field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub declared: DeclaredType,

    /// Nullable marker, equivalent to wrapping the type in `optional`
    #[serde(default)]
    pub optional: bool,

    /// Normalization constant: numeric distance for numbers, days for dates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self {
            name: name.into(),
            declared,
            optional: false,
            scale: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, DeclaredType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DeclaredType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DeclaredType::Float)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, DeclaredType::Date)
    }

    pub fn literal<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(name, DeclaredType::literal(values))
    }

    pub fn string_list(name: impl Into<String>) -> Self {
        Self::new(name, DeclaredType::list(DeclaredType::String))
    }

    /// Mark the field nullable
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Declarative schema for one kind of structured output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaDefinition {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Fields in declared order
    pub fields: Vec<FieldDefinition>,
}

fn default_version() -> u32 {
    1
}

impl SchemaDefinition {
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self { version: 1, fields }
    }

    /// Append a field, builder style
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

/// How text is compared
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Decided per comparison from content length
    Auto,
    /// Token-set Jaccard
    Short,
    /// Embedding cosine
    Long,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    Integer,
    Float,
}

/// Resolved scoring tag of a field. Closed set; dispatch is static.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Text(TextMode),
    Numeric(NumericKind),
    Date,
    Literal(Vec<Value>),
    ListOfString,
    /// Unmappable type on a skipped field; carried through, never scored
    Opaque,
}

impl TypeTag {
    /// Whether values of this tag are lists
    pub fn is_list(&self) -> bool {
        matches!(self, TypeTag::ListOfString)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Text(TextMode::Auto) => write!(f, "Text"),
            TypeTag::Text(TextMode::Short) => write!(f, "ShortText"),
            TypeTag::Text(TextMode::Long) => write!(f, "LongText"),
            TypeTag::Numeric(NumericKind::Integer) => write!(f, "Numeric(int)"),
            TypeTag::Numeric(NumericKind::Float) => write!(f, "Numeric(float)"),
            TypeTag::Date => write!(f, "Date"),
            TypeTag::Literal(values) => write!(f, "Literal({} values)", values.len()),
            TypeTag::ListOfString => write!(f, "ListOfString"),
            TypeTag::Opaque => write!(f, "Opaque"),
        }
    }
}

/// A resolved field. Immutable once produced by the introspector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub tag: TypeTag,
    pub optional: bool,
    pub skip: bool,
    /// Per-field normalization constant (numeric distance or days)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            tag,
            optional: false,
            skip: false,
            scale: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Ordered set of resolved fields with unique names
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Resolve a definition; shorthand for [`SchemaIntrospector::resolve`].
    pub fn resolve<S: AsRef<str>>(
        definition: &SchemaDefinition,
        skip_fields: &[S],
    ) -> Result<Self, SchemaError> {
        SchemaIntrospector::resolve(definition, skip_fields)
    }

    /// Build a schema from already-resolved field specs, checking name uniqueness.
    pub fn from_specs(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::EmptySchema);
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Fields that take part in scoring
    pub fn scored_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.skip)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolves declarative schemas into typed field specs
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Resolve `definition`, marking every field named in `skip_fields` as skipped.
    ///
    /// Skipped fields may carry types with no scoring strategy; they resolve to
    /// [`TypeTag::Opaque`]. Any other unmappable type is a [`SchemaError`].
    pub fn resolve<S: AsRef<str>>(
        definition: &SchemaDefinition,
        skip_fields: &[S],
    ) -> Result<Schema, SchemaError> {
        if definition.fields.is_empty() {
            return Err(SchemaError::EmptySchema);
        }

        let skip: HashSet<&str> = skip_fields.iter().map(AsRef::as_ref).collect();
        for name in &skip {
            if !definition.fields.iter().any(|f| f.name == *name) {
                return Err(SchemaError::UnknownSkipField(name.to_string()));
            }
        }

        let mut specs = Vec::with_capacity(definition.fields.len());
        for field in &definition.fields {
            let skipped = skip.contains(field.name.as_str());
            let (tag, optional) = match resolve_type(&field.name, &field.declared) {
                Ok(resolved) => resolved,
                Err(_) if skipped => (TypeTag::Opaque, is_optional(&field.declared)),
                Err(e) => return Err(e),
            };

            if let Some(scale) = field.scale {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(SchemaError::InvalidScale {
                        field: field.name.clone(),
                        scale,
                    });
                }
            }

            tracing::trace!(field = %field.name, tag = %tag, skip = skipped, "resolved field");
            specs.push(FieldSpec {
                name: field.name.clone(),
                tag,
                optional: optional || field.optional,
                skip: skipped,
                scale: field.scale,
            });
        }

        Schema::from_specs(specs)
    }
}

fn is_optional(declared: &DeclaredType) -> bool {
    matches!(declared, DeclaredType::Optional(_))
}

/// Map a declared type to its tag, unwrapping nullable layers.
fn resolve_type(field: &str, declared: &DeclaredType) -> Result<(TypeTag, bool), SchemaError> {
    let unsupported = || SchemaError::UnsupportedType {
        field: field.to_string(),
        declared: declared.to_string(),
    };

    let tag = match declared {
        DeclaredType::Optional(inner) => {
            let (tag, _) = resolve_type(field, inner)?;
            return Ok((tag, true));
        }
        DeclaredType::String => TypeTag::Text(TextMode::Auto),
        DeclaredType::ShortText => TypeTag::Text(TextMode::Short),
        DeclaredType::LongText => TypeTag::Text(TextMode::Long),
        DeclaredType::Integer => TypeTag::Numeric(NumericKind::Integer),
        DeclaredType::Float => TypeTag::Numeric(NumericKind::Float),
        DeclaredType::Boolean => TypeTag::Literal(vec![Value::Bool(true), Value::Bool(false)]),
        DeclaredType::Date => TypeTag::Date,
        DeclaredType::Literal(values) => {
            if values.is_empty() {
                return Err(SchemaError::EmptyLiteral(field.to_string()));
            }
            let mut distinct: Vec<Value> = Vec::with_capacity(values.len());
            for value in values {
                if !distinct.iter().any(|d| literal_eq(d, value)) {
                    distinct.push(value.clone());
                }
            }
            TypeTag::Literal(distinct)
        }
        DeclaredType::List(items) => match items.as_ref() {
            DeclaredType::String | DeclaredType::ShortText | DeclaredType::LongText => {
                TypeTag::ListOfString
            }
            _ => return Err(unsupported()),
        },
        DeclaredType::Object => return Err(unsupported()),
    };

    Ok((tag, false))
}

/// Errors that can occur while resolving a schema
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema cannot be empty")]
    EmptySchema,

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Skip list names unknown field '{0}'")]
    UnknownSkipField(String),

    #[error("Field '{field}' has type {declared} which maps to no scoring strategy")]
    UnsupportedType { field: String, declared: String },

    #[error("Field '{0}' declares an empty literal set")]
    EmptyLiteral(String),

    #[error("Field '{field}' has invalid scale {scale}; must be finite and positive")]
    InvalidScale { field: String, scale: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn news_definition() -> SchemaDefinition {
        SchemaDefinition::new(vec![
            FieldDefinition::string("generated_title"),
            FieldDefinition::new("publication_date", DeclaredType::optional(DeclaredType::Date)),
            FieldDefinition::literal("primary_category", ["world", "science", "sports"]),
            FieldDefinition::string_list("keywords"),
            FieldDefinition::new(
                "sentiment_tone",
                DeclaredType::optional(DeclaredType::literal(["positive", "neutral", "negative"])),
            ),
            FieldDefinition::integer("word_count").with_scale(100.0),
        ])
    }

    #[test]
    fn test_resolve_tags() {
        let schema = SchemaIntrospector::resolve::<&str>(&news_definition(), &[]).unwrap();
        assert_eq!(schema.len(), 6);

        assert_eq!(schema.get("generated_title").unwrap().tag, TypeTag::Text(TextMode::Auto));
        assert_eq!(schema.get("keywords").unwrap().tag, TypeTag::ListOfString);
        assert_eq!(
            schema.get("word_count").unwrap().tag,
            TypeTag::Numeric(NumericKind::Integer)
        );
        assert_eq!(schema.get("word_count").unwrap().scale, Some(100.0));

        let date = schema.get("publication_date").unwrap();
        assert_eq!(date.tag, TypeTag::Date);
        assert!(date.optional);

        let tone = schema.get("sentiment_tone").unwrap();
        assert!(tone.optional);
        assert!(matches!(&tone.tag, TypeTag::Literal(v) if v.len() == 3));
    }

    #[test]
    fn test_field_order_preserved() {
        let schema = Schema::resolve::<&str>(&news_definition(), &[]).unwrap();
        let names: Vec<_> = schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "generated_title",
                "publication_date",
                "primary_category",
                "keywords",
                "sentiment_tone",
                "word_count"
            ]
        );
    }

    #[test]
    fn test_nullable_marker() {
        let def = SchemaDefinition::default().field(FieldDefinition::float("score").optional());
        let schema = Schema::resolve::<&str>(&def, &[]).unwrap();
        assert!(schema.get("score").unwrap().optional);
    }

    #[test]
    fn test_boolean_is_two_value_literal() {
        let def = SchemaDefinition::new(vec![FieldDefinition::new("paywalled", DeclaredType::Boolean)]);
        let schema = Schema::resolve::<&str>(&def, &[]).unwrap();
        assert_eq!(
            schema.get("paywalled").unwrap().tag,
            TypeTag::Literal(vec![json!(true), json!(false)])
        );
    }

    #[test]
    fn test_numeric_literals_dedup_by_value() {
        let def = SchemaDefinition::new(vec![FieldDefinition::new(
            "stars",
            DeclaredType::Literal(vec![json!(1), json!(1.0), json!(2)]),
        )]);
        let schema = Schema::resolve::<&str>(&def, &[]).unwrap();
        assert_eq!(
            schema.get("stars").unwrap().tag,
            TypeTag::Literal(vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn test_unsupported_type_error() {
        let def = SchemaDefinition::new(vec![
            FieldDefinition::string("title"),
            FieldDefinition::new("raw", DeclaredType::Object),
        ]);
        assert!(matches!(
            Schema::resolve::<&str>(&def, &[]),
            Err(SchemaError::UnsupportedType { field, .. }) if field == "raw"
        ));

        let numbers = SchemaDefinition::new(vec![FieldDefinition::new(
            "ids",
            DeclaredType::list(DeclaredType::Integer),
        )]);
        assert!(matches!(
            Schema::resolve::<&str>(&numbers, &[]),
            Err(SchemaError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_skipped_unsupported_field_is_opaque() {
        let def = SchemaDefinition::new(vec![
            FieldDefinition::string("title"),
            FieldDefinition::new("raw", DeclaredType::optional(DeclaredType::Object)),
        ]);
        let schema = Schema::resolve(&def, &["raw"]).unwrap();
        let raw = schema.get("raw").unwrap();
        assert_eq!(raw.tag, TypeTag::Opaque);
        assert!(raw.skip);
        assert!(raw.optional);
        assert_eq!(schema.scored_fields().count(), 1);
    }

    #[test]
    fn test_skip_supported_field() {
        let schema = Schema::resolve(&news_definition(), &["keywords"]).unwrap();
        let keywords = schema.get("keywords").unwrap();
        assert!(keywords.skip);
        assert_eq!(keywords.tag, TypeTag::ListOfString);
    }

    #[test]
    fn test_unknown_skip_field() {
        assert!(matches!(
            Schema::resolve(&news_definition(), &["nope"]),
            Err(SchemaError::UnknownSkipField(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_duplicate_and_empty() {
        let def = SchemaDefinition::new(vec![
            FieldDefinition::string("a"),
            FieldDefinition::integer("a"),
        ]);
        assert!(matches!(
            Schema::resolve::<&str>(&def, &[]),
            Err(SchemaError::DuplicateField(_))
        ));
        assert!(matches!(
            Schema::resolve::<&str>(&SchemaDefinition::default(), &[]),
            Err(SchemaError::EmptySchema)
        ));
    }

    #[test]
    fn test_empty_literal_and_bad_scale() {
        let empty = SchemaDefinition::new(vec![FieldDefinition::new(
            "kind",
            DeclaredType::Literal(vec![]),
        )]);
        assert!(matches!(
            Schema::resolve::<&str>(&empty, &[]),
            Err(SchemaError::EmptyLiteral(_))
        ));

        let bad_scale = SchemaDefinition::new(vec![FieldDefinition::float("x").with_scale(0.0)]);
        assert!(matches!(
            Schema::resolve::<&str>(&bad_scale, &[]),
            Err(SchemaError::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_definition_from_json() {
        let def: SchemaDefinition = serde_json::from_value(json!({
            "fields": [
                {"name": "title", "type": "string"},
                {"name": "summary", "type": "long_text"},
                {"name": "category", "type": {"literal": ["news", "blog"]}},
                {"name": "people", "type": {"optional": {"list": "string"}}},
                {"name": "published", "type": "date", "optional": true, "scale": 7}
            ]
        }))
        .unwrap();
        assert_eq!(def.version, 1);

        let schema = Schema::resolve::<&str>(&def, &[]).unwrap();
        assert_eq!(schema.get("summary").unwrap().tag, TypeTag::Text(TextMode::Long));
        assert!(schema.get("people").unwrap().optional);
        assert_eq!(schema.get("people").unwrap().tag, TypeTag::ListOfString);
        assert_eq!(schema.get("published").unwrap().scale, Some(7.0));
    }

    #[test]
    fn test_serde_roundtrip() {
        let def = news_definition();
        let json = serde_json::to_string(&def).unwrap();
        let parsed: SchemaDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, parsed);
    }
}
