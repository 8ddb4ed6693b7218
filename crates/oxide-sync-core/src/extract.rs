//! Target schema extraction.
//!
//! Turns entity descriptors into [`TableDescriptor`]s, validating every type
//! against the dialect before any statement is generated.

use tracing::debug;

use crate::dialect::DialectAdapter;
use crate::entity::{EntityDescriptor, EntityKey, IdKind};
use crate::error::{Result, SyncError};
use crate::guard::{PolicyViolation, ViolationKind};
use crate::model::{
    ColumnDescriptor, ForeignKeyDescriptor, KeyKind, TableDescriptor, TargetModel,
    UniqueGroupDescriptor, ID_COLUMN, INACTIVE_COLUMN,
};
use crate::types::SemanticType;

/// Length of caller-supplied string ids.
pub const STRING_ID_LENGTH: u32 = 255;

/// Builds the target model from entity descriptors.
pub struct TargetSchemaExtractor<'a> {
    adapter: &'a dyn DialectAdapter,
}

impl<'a> TargetSchemaExtractor<'a> {
    /// Creates an extractor validating against `adapter`.
    #[must_use]
    pub fn new(adapter: &'a dyn DialectAdapter) -> Self {
        Self { adapter }
    }

    /// Extracts every entity, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnsupportedType`] for unmapped types,
    /// [`SyncError::InvalidEntity`] for malformed descriptors and a
    /// [`PolicyViolation`] for unique groups over nullable columns.
    pub fn extract(
        &self,
        entities: &[EntityDescriptor],
        default_schema: Option<&str>,
    ) -> Result<TargetModel> {
        let mut model = TargetModel::default();
        for entity in entities {
            if model
                .tables
                .iter()
                .any(|t| self.adapter.same_identifier(&t.name, &entity.table))
            {
                return Err(SyncError::invalid_entity(
                    &entity.table,
                    "declared more than once",
                ));
            }
            let table = self.extract_entity(entity, default_schema)?;
            debug!(
                table = %table.name,
                columns = table.columns.len(),
                foreign_keys = table.foreign_keys.len(),
                "Extracted entity"
            );
            model.tables.push(table);
        }
        Ok(model)
    }

    fn extract_entity(
        &self,
        entity: &EntityDescriptor,
        default_schema: Option<&str>,
    ) -> Result<TableDescriptor> {
        let name = &entity.table;
        if name.is_empty() {
            return Err(SyncError::invalid_entity(name, "table name is empty"));
        }

        let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(entity.properties.len() + 2);
        let mut foreign_keys = Vec::new();

        let (key, primary_key) = match &entity.key {
            EntityKey::Id(kind) => {
                columns.push(id_column(*kind));
                (KeyKind::Id(*kind), vec![ID_COLUMN.to_string()])
            }
            EntityKey::Open {
                columns: key_columns,
                auto_increment,
            } => {
                if key_columns.is_empty() {
                    return Err(SyncError::invalid_entity(
                        name,
                        "open entity declares no key columns",
                    ));
                }
                (
                    KeyKind::Open {
                        auto_increment: *auto_increment,
                    },
                    key_columns.clone(),
                )
            }
        };

        for property in &entity.properties {
            if property.name.is_empty() {
                return Err(SyncError::invalid_entity(name, "property name is empty"));
            }
            if columns
                .iter()
                .any(|c| self.adapter.same_identifier(&c.name, &property.name))
            {
                let message = if matches!(entity.key, EntityKey::Id(_))
                    && self.adapter.same_identifier(&property.name, ID_COLUMN)
                {
                    "the Id column is implicit and cannot be declared as a property".to_string()
                } else {
                    format!("property {} declared more than once", property.name)
                };
                return Err(SyncError::invalid_entity(name, message));
            }

            let ty = match (property.max_length, &property.ty) {
                (None, ty) => ty.clone(),
                (Some(len), SemanticType::Text(_)) => SemanticType::Text(Some(len)),
                (Some(_), _) => {
                    return Err(SyncError::invalid_entity(
                        name,
                        format!("max length on non-text property {}", property.name),
                    ));
                }
            };
            self.adapter.native_type(name, &property.name, &ty)?;

            if let Some(fk) = &property.foreign_key {
                foreign_keys.push(ForeignKeyDescriptor {
                    column: property.name.clone(),
                    references_table: fk.table.clone(),
                    references_column: fk.column.clone(),
                    nullable: property.nullable,
                });
            }

            columns.push(ColumnDescriptor::new(&property.name, ty).with_nullable(property.nullable));
        }

        if let KeyKind::Open { auto_increment } = key {
            for (position, key_column) in primary_key.iter().enumerate() {
                let column = columns
                    .iter_mut()
                    .find(|c| self.adapter.same_identifier(&c.name, key_column))
                    .ok_or_else(|| {
                        SyncError::invalid_entity(
                            name,
                            format!("key column {key_column} is not a declared property"),
                        )
                    })?;
                if column.nullable {
                    debug!(table = %name, column = %column.name, "Key column forced NOT NULL");
                }
                column.nullable = false;
                column.primary_key = true;
                if auto_increment && position == 0 {
                    if !column.ty.is_integral() {
                        return Err(SyncError::invalid_entity(
                            name,
                            format!("auto-increment key column {key_column} is not an integer"),
                        ));
                    }
                    column.auto_generated = true;
                }
            }
            // key nullability may have changed
            for fk in &mut foreign_keys {
                if let Some(column) = columns
                    .iter()
                    .find(|c| self.adapter.same_identifier(&c.name, &fk.column))
                {
                    fk.nullable = column.nullable;
                }
            }
        }

        let unique_groups = self.unique_groups(entity, &columns)?;

        if entity.activation {
            if columns
                .iter()
                .any(|c| self.adapter.same_identifier(&c.name, INACTIVE_COLUMN))
            {
                return Err(SyncError::invalid_entity(
                    name,
                    "the Inactive column is implicit for entities with activation",
                ));
            }
            let mut inactive = ColumnDescriptor::new(INACTIVE_COLUMN, SemanticType::Boolean);
            inactive.defaulted = true;
            columns.push(inactive);
        }

        Ok(TableDescriptor {
            name: name.clone(),
            schema: entity
                .schema
                .clone()
                .or_else(|| default_schema.map(str::to_string)),
            columns,
            foreign_keys,
            unique_groups,
            primary_key,
            key,
            soft_delete: entity.activation,
        })
    }

    fn unique_groups(
        &self,
        entity: &EntityDescriptor,
        columns: &[ColumnDescriptor],
    ) -> Result<Vec<UniqueGroupDescriptor>> {
        let mut groups: Vec<UniqueGroupDescriptor> = Vec::new();
        for property in &entity.properties {
            let Some(group_id) = &property.unique else {
                continue;
            };
            match groups.iter_mut().find(|g| &g.id == group_id) {
                Some(group) => group.columns.push(property.name.clone()),
                None => groups.push(UniqueGroupDescriptor {
                    id: group_id.clone(),
                    columns: vec![property.name.clone()],
                }),
            }
        }

        for group in &groups {
            let nullable: Vec<String> = group
                .columns
                .iter()
                .filter(|name| {
                    columns
                        .iter()
                        .any(|c| self.adapter.same_identifier(&c.name, name) && c.nullable)
                })
                .cloned()
                .collect();
            if !nullable.is_empty() {
                return Err(PolicyViolation {
                    table: entity.table.clone(),
                    columns: nullable,
                    constraint: Some(group.id.clone()),
                    kind: ViolationKind::NullableUniqueColumn {
                        group: group.id.clone(),
                    },
                }
                .into());
            }
        }
        Ok(groups)
    }
}

fn id_column(kind: IdKind) -> ColumnDescriptor {
    let ty = match kind {
        IdKind::AutoIncrement => SemanticType::Integer,
        IdKind::GeneratedUid => SemanticType::Uid,
        IdKind::CallerString => SemanticType::Text(Some(STRING_ID_LENGTH)),
    };
    let mut column = ColumnDescriptor::new(ID_COLUMN, ty);
    column.primary_key = true;
    column.auto_generated = kind != IdKind::CallerString;
    column
}
