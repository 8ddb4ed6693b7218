//! Entity descriptors.
//!
//! An entity descriptor is the declared, code-level shape of one table. It is
//! built once (with the builder methods below or deserialized from JSON) and
//! handed to the [`TargetSchemaExtractor`](crate::extract::TargetSchemaExtractor).

use serde::{Deserialize, Serialize};

use crate::types::SemanticType;

/// How the single `Id` column of a regular entity is generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    /// Auto-incrementing integer.
    #[default]
    AutoIncrement,
    /// Unique identifier generated by the database default.
    GeneratedUid,
    /// Free-form string supplied by the caller.
    CallerString,
}

/// Primary key declaration of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    /// A single `Id` column of the given kind.
    Id(IdKind),
    /// An "open" entity: the caller lists the key columns, possibly composite.
    Open {
        /// Key columns, in key order. Each must also be a declared property.
        columns: Vec<String>,
        /// Whether the first key column is auto-incremented.
        #[serde(default)]
        auto_increment: bool,
    },
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::Id(IdKind::AutoIncrement)
    }
}

/// Marker pointing a property at a column of another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMarker {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

/// One declared property of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Column name.
    pub name: String,
    /// Semantic type.
    #[serde(rename = "type")]
    pub ty: SemanticType,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Foreign key target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyMarker>,
    /// Unique group this property participates in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<String>,
    /// Maximum length, for text properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl Property {
    /// Creates a not-null property.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            foreign_key: None,
            unique: None,
            max_length: None,
        }
    }

    /// Marks the property as nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a foreign key marker.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyMarker {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Places the property in a unique group.
    #[must_use]
    pub fn unique(mut self, group: impl Into<String>) -> Self {
        self.unique = Some(group.into());
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub const fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }
}

/// Declared shape of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Table name.
    pub table: String,
    /// Owning schema; the run's schema when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Primary key declaration.
    #[serde(default)]
    pub key: EntityKey,
    /// Ordered properties, excluding the implicit `Id` column.
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Adds the implicit `Inactive` soft-delete column.
    #[serde(default)]
    pub activation: bool,
}

impl EntityDescriptor {
    /// Creates an entity with an auto-increment `Id`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            schema: None,
            key: EntityKey::default(),
            properties: Vec::new(),
            activation: false,
        }
    }

    /// Sets the id kind.
    #[must_use]
    pub fn id(mut self, kind: IdKind) -> Self {
        self.key = EntityKey::Id(kind);
        self
    }

    /// Turns this into an open entity keyed by the given columns.
    #[must_use]
    pub fn open_key<I, S>(mut self, columns: I, auto_increment: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = EntityKey::Open {
            columns: columns.into_iter().map(Into::into).collect(),
            auto_increment,
        };
        self
    }

    /// Appends a property.
    #[must_use]
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Enables activation semantics (the implicit `Inactive` column).
    #[must_use]
    pub const fn with_activation(mut self) -> Self {
        self.activation = true;
        self
    }

    /// Places the table in a specific schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let order = EntityDescriptor::new("Order")
            .property(Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id"))
            .property(Property::new("Note", SemanticType::text()).nullable().max_length(200))
            .with_activation();

        assert_eq!(order.key, EntityKey::Id(IdKind::AutoIncrement));
        assert_eq!(order.properties.len(), 2);
        assert_eq!(
            order.properties[0].foreign_key,
            Some(ForeignKeyMarker {
                table: "Customer".into(),
                column: "Id".into()
            })
        );
        assert!(order.properties[1].nullable);
        assert_eq!(order.properties[1].max_length, Some(200));
        assert!(order.activation);
    }

    #[test]
    fn test_open_key() {
        let line = EntityDescriptor::new("OrderLine").open_key(["OrderId", "LineNo"], false);
        assert_eq!(
            line.key,
            EntityKey::Open {
                columns: vec!["OrderId".into(), "LineNo".into()],
                auto_increment: false
            }
        );
    }

    #[test]
    fn test_deserialize_document() {
        let json = r#"[
            {
                "table": "Customer",
                "key": {"id": "generated_uid"},
                "properties": [
                    {"name": "Email", "type": {"text": 120}, "unique": "email"}
                ],
                "activation": true
            },
            {
                "table": "Tag",
                "key": {"open": {"columns": ["Name"]}},
                "properties": [{"name": "Name", "type": {"text": 40}}]
            }
        ]"#;
        let entities: Vec<EntityDescriptor> = serde_json::from_str(json).unwrap();

        assert_eq!(entities[0].key, EntityKey::Id(IdKind::GeneratedUid));
        assert_eq!(entities[0].properties[0].unique.as_deref(), Some("email"));
        assert!(!entities[0].properties[0].nullable);
        assert_eq!(
            entities[1].key,
            EntityKey::Open {
                columns: vec!["Name".into()],
                auto_increment: false
            }
        );
    }
}
