//! Index, alias and index template definitions.
//!
//! These are the JSON documents persisted by the [`MetadataStore`]. The
//! entity name is carried by the storage key rather than the document, so it
//! is skipped during serialization and filled back in on load.
//!
//! [`MetadataStore`]: crate::meta::MetadataStore

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};
use crate::meta::field_type::FieldType;

fn default_shards() -> i32 {
    1
}

/// Shard layout of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_shards")]
    pub number_of_shards: i32,
    #[serde(default)]
    pub number_of_replicas: i32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            number_of_shards: default_shards(),
            number_of_replicas: 0,
        }
    }
}

impl IndexSettings {
    pub fn new(number_of_shards: i32, number_of_replicas: i32) -> Self {
        IndexSettings {
            number_of_shards,
            number_of_replicas,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.number_of_shards < 1 {
            return Err(SundialError::schema(format!(
                "number_of_shards must be at least 1, got {}",
                self.number_of_shards
            )));
        }
        if self.number_of_replicas < 0 {
            return Err(SundialError::schema(format!(
                "number_of_replicas must not be negative, got {}",
                self.number_of_replicas
            )));
        }
        Ok(())
    }
}

/// One mapped field. The type is kept as written until validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub field_type: String,
}

impl Property {
    pub fn new(field_type: impl Into<String>) -> Self {
        Property {
            field_type: field_type.into(),
        }
    }
}

/// Field mappings of an index or template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mappings {
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl Mappings {
    /// Resolve every property to its [`FieldType`].
    ///
    /// Fields are checked in name order and the first unsupported type aborts
    /// with an error naming the field and the rejected string.
    pub fn field_types(&self) -> Result<BTreeMap<String, FieldType>> {
        self.properties
            .iter()
            .map(|(field, property)| {
                FieldType::parse(&property.field_type)
                    .map(|field_type| (field.clone(), field_type))
                    .ok_or_else(|| SundialError::invalid_field_type(field, &property.field_type))
            })
            .collect()
    }

    fn normalize(&mut self) -> Result<()> {
        for (field, field_type) in self.field_types()? {
            if field.is_empty() {
                return Err(SundialError::schema("field names must not be empty"));
            }
            self.properties
                .insert(field, Property::new(field_type.as_str()));
        }
        Ok(())
    }
}

/// An index definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexSettings>,
    #[serde(default)]
    pub mappings: Mappings,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Index {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for the settings.
    pub fn with_settings(mut self, number_of_shards: i32, number_of_replicas: i32) -> Self {
        self.settings = Some(IndexSettings::new(number_of_shards, number_of_replicas));
        self
    }

    /// Builder-style setter adding one mapped property.
    pub fn with_property(mut self, field: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.mappings
            .properties
            .insert(field.into(), Property::new(field_type));
        self
    }

    /// Effective settings, falling back to the defaults.
    pub fn settings(&self) -> IndexSettings {
        self.settings.unwrap_or_default()
    }

    /// Typed view of the mappings.
    pub fn field_types(&self) -> Result<BTreeMap<String, FieldType>> {
        self.mappings.field_types()
    }

    /// Fill unset settings and missing properties from `template`.
    ///
    /// Values already present on the index win.
    pub fn apply_template(&mut self, template: &IndexTemplate) {
        if self.settings.is_none() {
            self.settings = template.template.settings;
        }
        if let Some(mappings) = &template.template.mappings {
            for (field, property) in &mappings.properties {
                self.mappings
                    .properties
                    .entry(field.clone())
                    .or_insert_with(|| property.clone());
            }
        }
    }

    /// Validate the definition and rewrite field types to canonical names.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        validate_name("index", &self.name)?;
        if self.mappings.properties.is_empty() {
            return Err(SundialError::schema(format!(
                "index '{}' must map at least one property",
                self.name
            )));
        }
        self.mappings.normalize()?;
        let settings = self.settings();
        settings.validate()?;
        self.settings = Some(settings);
        Ok(())
    }
}

/// A named indirection to one or more indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub indexes: BTreeSet<String>,
}

impl Alias {
    pub fn new<I, S>(name: impl Into<String>, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Alias {
            name: name.into(),
            indexes: indexes.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_name("alias", &self.name)?;
        for index in &self.indexes {
            validate_name("index", index)?;
        }
        Ok(())
    }
}

/// Defaults carried by an index template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Mappings>,
}

/// Default settings and mappings for indices whose name matches a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTemplate {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub index_patterns: Vec<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub template: TemplateBody,
}

impl IndexTemplate {
    pub fn new<I, S>(name: impl Into<String>, index_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexTemplate {
            name: name.into(),
            index_patterns: index_patterns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Whether any pattern matches `index_name`.
    ///
    /// `*` matches any run of characters, `?` exactly one.
    pub fn matches(&self, index_name: &str) -> bool {
        self.index_patterns
            .iter()
            .filter_map(|pattern| wildcard_regex(pattern))
            .any(|regex| regex.is_match(index_name))
    }

    pub(crate) fn validate_and_normalize(&mut self) -> Result<()> {
        validate_name("index template", &self.name)?;
        if self.index_patterns.is_empty() || self.index_patterns.iter().any(String::is_empty) {
            return Err(SundialError::schema(format!(
                "index template '{}' needs at least one non-empty pattern",
                self.name
            )));
        }
        if let Some(settings) = &self.template.settings {
            settings.validate()?;
        }
        if let Some(mappings) = &mut self.template.mappings {
            mappings.normalize()?;
        }
        Ok(())
    }
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SundialError::schema(format!("{kind} name must not be empty")));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '*' || c == '?' || c.is_whitespace())
    {
        return Err(SundialError::schema(format!(
            "{kind} name '{name}' contains a reserved character"
        )));
    }
    Ok(())
}
