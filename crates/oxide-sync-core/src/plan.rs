//! Ordered operation batches.

use std::fmt;

use crate::operation::Operation;

/// Batches, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Batch {
    /// New tables.
    Create,
    /// Column additions and alterations, rebuilds.
    Alter,
    /// Constraint drops, then primary keys, unique groups and foreign keys.
    Constraint,
    /// Column and table drops.
    Drop,
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Constraint => "constraint",
            Self::Drop => "drop",
        };
        f.write_str(name)
    }
}

/// The operations of one run, split into batches.
///
/// Constraints are only added after every table exists, and drops come last
/// so nothing still depends on what is being removed. Within the constraint
/// batch every drop precedes every addition, and keys are added before the
/// foreign keys that may reference them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPlan {
    create: Vec<Operation>,
    alter: Vec<Operation>,
    constraint_drops: Vec<Operation>,
    key_adds: Vec<Operation>,
    unique_adds: Vec<Operation>,
    foreign_key_adds: Vec<Operation>,
    drop: Vec<Operation>,
}

impl OperationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a table creation.
    pub fn push_create(&mut self, op: Operation) {
        self.create.push(op);
    }

    /// Queues a column or table alteration.
    pub fn push_alter(&mut self, op: Operation) {
        self.alter.push(op);
    }

    /// Queues a constraint addition.
    pub fn push_constraint(&mut self, op: Operation) {
        match op {
            Operation::AddPrimaryKey { .. } => self.key_adds.push(op),
            Operation::AddUniqueGroup { .. } => self.unique_adds.push(op),
            _ => self.foreign_key_adds.push(op),
        }
    }

    /// Queues a constraint drop, ahead of every constraint addition.
    ///
    /// A foreign key already queued for dropping is not queued twice.
    pub fn push_constraint_drop(&mut self, op: Operation) {
        if let Operation::DropForeignKey { foreign_key, .. } = &op {
            let queued = self.constraint_drops.iter().any(|q| {
                matches!(q, Operation::DropForeignKey { foreign_key: other, .. }
                    if other.table == foreign_key.table && other.constraint == foreign_key.constraint)
            });
            if queued {
                return;
            }
        }
        self.constraint_drops.push(op);
    }

    /// Queues a drop.
    pub fn push_drop(&mut self, op: Operation) {
        self.drop.push(op);
    }

    /// Returns `true` if a foreign key with this name is already being added.
    #[must_use]
    pub fn adds_foreign_key(&self, table: &str, name: &str) -> bool {
        self.foreign_key_adds.iter().any(|op| {
            matches!(op, Operation::AddForeignKey { table: t, foreign_key }
                if t == table && foreign_key.name == name)
        })
    }

    /// Returns `true` when there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.create.len()
            + self.alter.len()
            + self.constraint_drops.len()
            + self.key_adds.len()
            + self.unique_adds.len()
            + self.foreign_key_adds.len()
            + self.drop.len()
    }

    /// Iterates over every operation in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (Batch, &Operation)> {
        let constraints = self
            .constraint_drops
            .iter()
            .chain(&self.key_adds)
            .chain(&self.unique_adds)
            .chain(&self.foreign_key_adds);
        self.create
            .iter()
            .map(|op| (Batch::Create, op))
            .chain(self.alter.iter().map(|op| (Batch::Alter, op)))
            .chain(constraints.map(|op| (Batch::Constraint, op)))
            .chain(self.drop.iter().map(|op| (Batch::Drop, op)))
    }

    /// Operations of one batch, in execution order.
    #[must_use]
    pub fn batch(&self, batch: Batch) -> Vec<&Operation> {
        self.iter()
            .filter(|(b, _)| *b == batch)
            .map(|(_, op)| op)
            .collect()
    }

    /// Number of operations that needed authorization.
    #[must_use]
    pub fn destructive_count(&self) -> usize {
        self.iter().filter(|(_, op)| op.is_destructive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{DestructiveKind, SafetyGuard};
    use crate::model::{
        ColumnDescriptor, DeleteRule, ForeignKeyGroup, LiveColumnInfo, LiveForeignKeyGroup,
    };
    use crate::types::SemanticType;

    fn drop_fk(table: &str, constraint: &str) -> Operation {
        let grant = SafetyGuard::new(false, true)
            .check(DestructiveKind::ConstraintDrop, table, &[], Some(constraint))
            .unwrap();
        Operation::DropForeignKey {
            foreign_key: LiveForeignKeyGroup {
                table: table.into(),
                constraint: constraint.into(),
                columns: vec!["CustomerId".into()],
                references_table: "Customer".into(),
                references_columns: vec!["Id".into()],
                delete_rule: DeleteRule::Cascade,
            },
            grant: Some(grant),
        }
    }

    fn add_fk(table: &str) -> Operation {
        Operation::AddForeignKey {
            table: table.into(),
            foreign_key: ForeignKeyGroup {
                name: format!("fk_{table}_Customer"),
                columns: vec!["CustomerId".into()],
                references_table: "Customer".into(),
                references_columns: vec!["Id".into()],
                delete_rule: DeleteRule::SetNull,
            },
        }
    }

    #[test]
    fn test_constraint_drops_precede_adds() {
        let mut plan = OperationPlan::new();
        plan.push_constraint(add_fk("Order"));
        plan.push_constraint_drop(drop_fk("Order", "fk_old"));
        plan.push_constraint(Operation::AddPrimaryKey {
            table: "Customer".into(),
            name: "pk_Customer".into(),
            columns: vec!["Id".into()],
        });
        plan.push_constraint_drop(drop_fk("Invoice", "fk_old"));

        let ops = plan.batch(Batch::Constraint);
        assert!(matches!(ops[0], Operation::DropForeignKey { .. }));
        assert!(matches!(ops[1], Operation::DropForeignKey { .. }));
        assert!(matches!(ops[2], Operation::AddPrimaryKey { .. }));
        assert!(matches!(ops[3], Operation::AddForeignKey { .. }));
        assert!(plan.adds_foreign_key("Order", "fk_Order_Customer"));
    }

    #[test]
    fn test_duplicate_foreign_key_drop_ignored() {
        let mut plan = OperationPlan::new();
        plan.push_constraint_drop(drop_fk("Order", "fk_Order_Customer"));
        plan.push_constraint_drop(drop_fk("Order", "fk_Order_Customer"));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.destructive_count(), 1);
    }

    #[test]
    fn test_iter_order() {
        let mut plan = OperationPlan::new();
        plan.push_constraint(add_fk("Order"));
        plan.push_drop(Operation::DropColumn {
            table: "Order".into(),
            column: LiveColumnInfo::new("Note", "text"),
            grant: SafetyGuard::new(true, false)
                .check(DestructiveKind::ColumnDrop, "Order", &[], None)
                .unwrap(),
        });
        plan.push_alter(Operation::Backfill {
            table: "Order".into(),
            column: ColumnDescriptor::new("Code", SemanticType::text()),
        });

        let batches: Vec<Batch> = plan.iter().map(|(b, _)| b).collect();
        assert_eq!(batches, vec![Batch::Alter, Batch::Constraint, Batch::Drop]);
        assert!(!plan.is_empty());
    }
}
