//! Schema differ.
//!
//! Compares the target model with the live model table by table and turns the
//! differences into an [`OperationPlan`]. Every destructive difference is
//! authorized by the [`SafetyGuard`] while the diff is built; a denial aborts
//! the whole plan.

use tracing::{debug, info, warn};

use crate::dialect::DialectAdapter;
use crate::error::{Result, SyncError};
use crate::guard::{DestructiveKind, Grant, PolicyViolation, SafetyGuard, ViolationKind};
use crate::model::{
    ColumnDescriptor, ForeignKeyGroup, LiveColumnInfo, LiveForeignKey, LiveForeignKeyGroup,
    LiveModel, LiveTable, LiveUniqueConstraint, TableDescriptor, TargetModel,
    UniqueGroupDescriptor,
};
use crate::operation::{CopyColumn, CopySource, Operation};
use crate::plan::OperationPlan;

/// Suffix of the table a rebuild copies out of.
pub const SHADOW_SUFFIX: &str = "__shadow";

/// An authorized column drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDrop {
    /// Live column.
    pub column: LiveColumnInfo,
    /// Authorization.
    pub grant: Grant,
}

/// An authorized nullable → not-null flip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tightening {
    /// Target column.
    pub column: ColumnDescriptor,
    /// Live column.
    pub live: LiveColumnInfo,
    /// Authorization.
    pub grant: Grant,
}

/// A not-null → nullable flip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loosening {
    /// Target column.
    pub column: ColumnDescriptor,
    /// Live column.
    pub live: LiveColumnInfo,
}

/// A change of the primary key column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyChange {
    /// Live constraint name.
    pub old_constraint: Option<String>,
    /// Live key columns; empty when the table had no key.
    pub old_columns: Vec<String>,
    /// Target key columns.
    pub new_columns: Vec<String>,
    /// Authorization, absent when there was no key to drop.
    pub grant: Option<Grant>,
}

/// Differences between one target table and its live counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Target table name.
    pub table: String,
    /// The table exists in the live schema.
    pub exists: bool,
    /// Columns to add.
    pub to_add: Vec<ColumnDescriptor>,
    /// Columns to drop.
    pub to_drop: Vec<ColumnDrop>,
    /// Columns becoming NOT NULL.
    pub tightened: Vec<Tightening>,
    /// Columns becoming nullable.
    pub loosened: Vec<Loosening>,
    /// Primary key replacement.
    pub primary_key: Option<PrimaryKeyChange>,
    /// Foreign keys to add.
    pub foreign_keys: Vec<ForeignKeyGroup>,
    /// Unique groups to add.
    pub unique_groups: Vec<UniqueGroupDescriptor>,
    /// Foreign keys to drop, on this table or referencing it. A drop
    /// without a grant only replaces the delete rule and is re-added.
    pub dropped_foreign_keys: Vec<(LiveForeignKeyGroup, Option<Grant>)>,
    /// Unique constraints to drop.
    pub dropped_uniques: Vec<(LiveUniqueConstraint, Grant)>,
}

impl SchemaDiff {
    fn new(table: &str, exists: bool) -> Self {
        Self {
            table: table.to_string(),
            exists,
            to_add: Vec::new(),
            to_drop: Vec::new(),
            tightened: Vec::new(),
            loosened: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_groups: Vec::new(),
            dropped_foreign_keys: Vec::new(),
            dropped_uniques: Vec::new(),
        }
    }

    /// Returns `true` when the live table already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exists
            && self.to_add.is_empty()
            && self.to_drop.is_empty()
            && self.tightened.is_empty()
            && self.loosened.is_empty()
            && self.primary_key.is_none()
            && self.foreign_keys.is_empty()
            && self.unique_groups.is_empty()
            && self.dropped_foreign_keys.is_empty()
            && self.dropped_uniques.is_empty()
    }

    /// Every grant collected for this table.
    #[must_use]
    pub fn grants(&self) -> Vec<Grant> {
        let mut grants: Vec<Grant> = self.to_drop.iter().map(|d| d.grant.clone()).collect();
        grants.extend(self.tightened.iter().map(|t| t.grant.clone()));
        grants.extend(self.primary_key.iter().filter_map(|pk| pk.grant.clone()));
        grants.extend(self.dropped_foreign_keys.iter().filter_map(|(_, g)| g.clone()));
        grants.extend(self.dropped_uniques.iter().map(|(_, g)| g.clone()));
        grants
    }
}

/// Compares target and live schemas.
pub struct SchemaDiffer<'a> {
    adapter: &'a dyn DialectAdapter,
    guard: SafetyGuard,
}

impl<'a> SchemaDiffer<'a> {
    /// Creates a differ for one dialect and policy.
    #[must_use]
    pub fn new(adapter: &'a dyn DialectAdapter, guard: SafetyGuard) -> Self {
        Self { adapter, guard }
    }

    fn case_sensitive(&self) -> bool {
        self.adapter.case_sensitive_identifiers()
    }

    fn same(&self, a: &str, b: &str) -> bool {
        self.adapter.same_identifier(a, b)
    }

    fn contains(&self, names: &[String], name: &str) -> bool {
        names.iter().any(|n| self.same(n, name))
    }

    fn same_set(&self, a: &[String], b: &[String]) -> bool {
        a.len() == b.len() && a.iter().all(|n| self.contains(b, n))
    }

    /// Whether a live foreign key has the same columns and references as a
    /// target one. Names and delete rules are not compared.
    fn same_reference(&self, target: &ForeignKeyGroup, live: &LiveForeignKeyGroup) -> bool {
        self.same(&target.references_table, &live.references_table)
            && target.columns.len() == live.columns.len()
            && target
                .columns
                .iter()
                .zip(&target.references_columns)
                .all(|(column, referenced)| {
                    live.columns
                        .iter()
                        .zip(&live.references_columns)
                        .any(|(c, r)| self.same(c, column) && self.same(r, referenced))
                })
    }

    /// Computes the diff of one table.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyViolation`] for unauthorized destructive changes and
    /// for NOT NULL foreign key columns added to an existing table.
    pub fn diff_table(&self, table: &TableDescriptor, live: &LiveModel) -> Result<SchemaDiff> {
        let Some(live_table) = live.find_table(&table.name, self.case_sensitive()) else {
            let mut diff = SchemaDiff::new(&table.name, false);
            diff.foreign_keys = table.foreign_key_groups();
            diff.unique_groups = table.unique_groups.clone();
            return Ok(diff);
        };

        let cs = self.case_sensitive();
        let mut diff = SchemaDiff::new(&table.name, true);

        // columns
        diff.to_add = table
            .columns
            .iter()
            .filter(|c| live_table.column(&c.name, cs).is_none())
            .cloned()
            .collect();

        let required_fks: Vec<String> = diff
            .to_add
            .iter()
            .filter(|c| {
                !c.nullable && table.foreign_keys.iter().any(|fk| self.same(&fk.column, &c.name))
            })
            .map(|c| c.name.clone())
            .collect();
        if !required_fks.is_empty() {
            return Err(PolicyViolation {
                table: table.name.clone(),
                columns: required_fks,
                constraint: None,
                kind: ViolationKind::RequiredForeignKeyColumn,
            }
            .into());
        }

        let dropped: Vec<&LiveColumnInfo> = live_table
            .columns
            .iter()
            .filter(|c| table.column(&c.name, cs).is_none())
            .collect();
        if !dropped.is_empty() {
            let names: Vec<String> = dropped.iter().map(|c| c.name.clone()).collect();
            let grant = self
                .guard
                .check(DestructiveKind::ColumnDrop, &table.name, &names, None)?;
            diff.to_drop = dropped
                .into_iter()
                .map(|column| ColumnDrop {
                    column: column.clone(),
                    grant: grant.clone(),
                })
                .collect();
        }

        // nullability; live key columns are skipped since SQLite reports
        // INTEGER PRIMARY KEY columns as nullable
        let mut tighten: Vec<(&ColumnDescriptor, &LiveColumnInfo)> = Vec::new();
        for column in &table.columns {
            let Some(live_column) = live_table.column(&column.name, cs) else {
                continue;
            };
            if live_column.primary_key || self.contains(&live_table.primary_key, &column.name) {
                continue;
            }
            match (live_column.nullable, column.nullable) {
                (true, false) => tighten.push((column, live_column)),
                (false, true) => diff.loosened.push(Loosening {
                    column: column.clone(),
                    live: live_column.clone(),
                }),
                _ => {}
            }
        }
        if !tighten.is_empty() {
            let names: Vec<String> = tighten.iter().map(|(c, _)| c.name.clone()).collect();
            let grant =
                self.guard
                    .check(DestructiveKind::NullabilityTighten, &table.name, &names, None)?;
            diff.tightened = tighten
                .into_iter()
                .map(|(column, live)| Tightening {
                    column: column.clone(),
                    live: live.clone(),
                    grant: grant.clone(),
                })
                .collect();
        }

        // primary key, open entities only
        if table.is_open() && !self.same_set(&table.primary_key, &live_table.primary_key) {
            let grant = if live_table.primary_key.is_empty() {
                None
            } else {
                Some(self.guard.check(
                    DestructiveKind::PrimaryKeyChange,
                    &table.name,
                    &live_table.primary_key,
                    live_table.primary_key_constraint.as_deref(),
                )?)
            };
            diff.primary_key = Some(PrimaryKeyChange {
                old_constraint: live_table.primary_key_constraint.clone(),
                old_columns: live_table.primary_key.clone(),
                new_columns: table.primary_key.clone(),
                grant,
            });
        }

        self.diff_foreign_keys(table, live_table, &mut diff)?;
        self.diff_unique_groups(table, live_table, &mut diff)?;
        self.drop_incoming_foreign_keys(table, live, &mut diff)?;

        Ok(diff)
    }

    fn diff_foreign_keys(
        &self,
        table: &TableDescriptor,
        live_table: &LiveTable,
        diff: &mut SchemaDiff,
    ) -> Result<()> {
        let target_groups = table.foreign_key_groups();
        let live_groups = live_table.foreign_key_groups();

        for target in &target_groups {
            let matched = live_groups.iter().find(|l| self.same_reference(target, l));
            match matched {
                Some(live) if live.delete_rule == target.delete_rule => {}
                Some(live) => {
                    debug!(
                        table = %table.name,
                        constraint = %live.constraint,
                        live = %live.delete_rule,
                        target = %target.delete_rule,
                        "Foreign key delete rule changed"
                    );
                    // same columns and target: a replacement, not a removal
                    diff.dropped_foreign_keys.push((live.clone(), None));
                    diff.foreign_keys.push(target.clone());
                }
                None => diff.foreign_keys.push(target.clone()),
            }
        }

        for live in &live_groups {
            if !target_groups.iter().any(|t| self.same_reference(t, live)) {
                let grant = self.check_constraint_drop(live)?;
                diff.dropped_foreign_keys.push((live.clone(), Some(grant)));
            }
        }
        Ok(())
    }

    fn diff_unique_groups(
        &self,
        table: &TableDescriptor,
        live_table: &LiveTable,
        diff: &mut SchemaDiff,
    ) -> Result<()> {
        for group in &table.unique_groups {
            if !live_table
                .unique_constraints
                .iter()
                .any(|u| self.same_set(&u.columns, &group.columns))
            {
                diff.unique_groups.push(group.clone());
            }
        }
        for unique in &live_table.unique_constraints {
            if !table
                .unique_groups
                .iter()
                .any(|g| self.same_set(&g.columns, &unique.columns))
            {
                let grant = self.guard.check(
                    DestructiveKind::ConstraintDrop,
                    &table.name,
                    &unique.columns,
                    Some(&unique.name),
                )?;
                diff.dropped_uniques.push((unique.clone(), grant));
            }
        }
        Ok(())
    }

    /// Foreign keys on other tables that point at a column being dropped or
    /// at a primary key being replaced must go first.
    fn drop_incoming_foreign_keys(
        &self,
        table: &TableDescriptor,
        live: &LiveModel,
        diff: &mut SchemaDiff,
    ) -> Result<()> {
        let mut doomed: Vec<String> = diff.to_drop.iter().map(|d| d.column.name.clone()).collect();
        if let Some(pk) = &diff.primary_key {
            doomed.extend(pk.old_columns.iter().cloned());
        }
        if doomed.is_empty() {
            return Ok(());
        }

        for fk in live.foreign_key_groups() {
            if self.same(&fk.table, &table.name)
                || !self.same(&fk.references_table, &table.name)
                || !fk.references_columns.iter().any(|c| self.contains(&doomed, c))
            {
                continue;
            }
            let grant = self.check_constraint_drop(&fk)?;
            diff.dropped_foreign_keys.push((fk, Some(grant)));
        }
        Ok(())
    }

    fn check_constraint_drop(&self, fk: &LiveForeignKeyGroup) -> Result<Grant> {
        Ok(self.guard.check(
            DestructiveKind::ConstraintDrop,
            &fk.table,
            &fk.columns,
            Some(&fk.constraint),
        )?)
    }

    /// Plans every table of the target model.
    ///
    /// # Errors
    ///
    /// Fails on the first policy violation; nothing is planned in that case.
    /// Without in-place alteration, also fails when a rebuild would leave a
    /// table outside the target model referencing a dropped key.
    pub fn plan(&self, target: &TargetModel, live: &LiveModel) -> Result<OperationPlan> {
        let alter_column = self.adapter.capabilities().alter_column;
        let mut plan = OperationPlan::new();
        let mut diffs = Vec::with_capacity(target.tables.len());
        let mut incoming: Vec<(LiveForeignKeyGroup, Option<Grant>)> = Vec::new();

        for table in &target.tables {
            let diff = self.diff_table(table, live)?;
            incoming.extend(
                diff.dropped_foreign_keys
                    .iter()
                    .filter(|(fk, _)| !self.same(&fk.table, &table.name))
                    .cloned(),
            );
            diffs.push((table, diff));
        }

        if !alter_column {
            let cs = self.case_sensitive();
            let unmanaged = incoming
                .iter()
                .find(|(fk, _)| target.table(&fk.table, cs).is_none());
            if let Some((fk, _)) = unmanaged {
                return Err(SyncError::Unsupported {
                    dialect: self.adapter.dialect(),
                    operation: format!(
                        "rebuilding {} while {} references it through {}, which is not an entity table",
                        fk.references_table, fk.table, fk.constraint
                    ),
                });
            }
        }

        for (table, diff) in diffs {
            // rebuild dialects carry severed references into the owner's rebuild
            let severed: Vec<&(LiveForeignKeyGroup, Option<Grant>)> = if alter_column {
                Vec::new()
            } else {
                incoming
                    .iter()
                    .filter(|(fk, _)| self.same(&fk.table, &table.name))
                    .collect()
            };
            if diff.is_empty() && severed.is_empty() {
                debug!(table = %table.name, "Table up to date");
                continue;
            }
            info!(
                table = %table.name,
                exists = diff.exists,
                add = diff.to_add.len(),
                drop = diff.to_drop.len(),
                severed = severed.len(),
                "Table differs"
            );
            self.absorb(&mut plan, target, table, live, diff, &severed)?;
        }

        if alter_column {
            let incoming: Vec<LiveForeignKeyGroup> =
                incoming.into_iter().map(|(fk, _)| fk).collect();
            self.restore_incoming(&mut plan, target, &incoming);
        }
        Ok(plan)
    }

    fn absorb(
        &self,
        plan: &mut OperationPlan,
        target: &TargetModel,
        table: &TableDescriptor,
        live: &LiveModel,
        diff: SchemaDiff,
        severed: &[&(LiveForeignKeyGroup, Option<Grant>)],
    ) -> Result<()> {
        let caps = self.adapter.capabilities();

        if !diff.exists {
            plan.push_create(Operation::CreateTable {
                table: table.clone(),
                inline_constraints: !caps.alter_column,
            });
            if caps.alter_column {
                Self::queue_constraint_adds(plan, table, diff.foreign_keys, &diff.unique_groups);
            }
            return Ok(());
        }

        if !caps.alter_column {
            let live_table = live
                .find_table(&table.name, self.case_sensitive())
                .cloned()
                .unwrap_or_default();
            let rebuilt = self.without_severed(table, target, severed);
            let mut grants = diff.grants();
            grants.extend(severed.iter().filter_map(|(_, grant)| grant.clone()));
            plan.push_alter(self.rebuild(&rebuilt, &live_table, &diff, grants));
            return Ok(());
        }

        for column in diff.to_add {
            plan.push_alter(Operation::AddColumn {
                table: table.name.clone(),
                column,
            });
        }
        for tightening in diff.tightened {
            plan.push_alter(Operation::Backfill {
                table: table.name.clone(),
                column: tightening.column.clone(),
            });
            plan.push_alter(Operation::SetNotNull {
                table: table.name.clone(),
                column: tightening.column,
                live: tightening.live,
                grant: tightening.grant,
            });
        }
        for loosening in diff.loosened {
            plan.push_alter(Operation::DropNotNull {
                table: table.name.clone(),
                column: loosening.column,
                live: loosening.live,
            });
        }

        for (foreign_key, grant) in diff.dropped_foreign_keys {
            plan.push_constraint_drop(Operation::DropForeignKey { foreign_key, grant });
        }
        for (constraint, grant) in diff.dropped_uniques {
            plan.push_constraint_drop(Operation::DropUnique {
                table: table.name.clone(),
                constraint,
                grant,
            });
        }
        if let Some(pk) = diff.primary_key {
            if let Some(grant) = pk.grant {
                plan.push_constraint_drop(Operation::DropPrimaryKey {
                    table: table.name.clone(),
                    constraint: pk.old_constraint,
                    columns: pk.old_columns,
                    grant,
                });
            }
            plan.push_constraint(Operation::AddPrimaryKey {
                table: table.name.clone(),
                name: table.primary_key_name(),
                columns: pk.new_columns,
            });
        }
        Self::queue_constraint_adds(plan, table, diff.foreign_keys, &diff.unique_groups);

        for drop in diff.to_drop {
            plan.push_drop(Operation::DropColumn {
                table: table.name.clone(),
                column: drop.column,
                grant: drop.grant,
            });
        }
        Ok(())
    }

    /// The table as rebuilt after another rebuild severed its references:
    /// a severed reference is kept only while its target column still
    /// exists in the target model.
    fn without_severed(
        &self,
        table: &TableDescriptor,
        target: &TargetModel,
        severed: &[&(LiveForeignKeyGroup, Option<Grant>)],
    ) -> TableDescriptor {
        let cs = self.case_sensitive();
        let mut rebuilt = table.clone();
        rebuilt.foreign_keys.retain(|fk| {
            let cut = severed.iter().any(|(live, _)| {
                self.same(&fk.references_table, &live.references_table)
                    && live
                        .columns
                        .iter()
                        .zip(&live.references_columns)
                        .any(|(c, r)| {
                            self.same(c, &fk.column) && self.same(r, &fk.references_column)
                        })
            });
            let resolvable = target
                .table(&fk.references_table, cs)
                .is_some_and(|t| t.column(&fk.references_column, cs).is_some());
            if cut && !resolvable {
                warn!(
                    table = %table.name,
                    column = %fk.column,
                    references = %fk.references_table,
                    "Rebuild leaves out a reference to a dropped column"
                );
            }
            !cut || resolvable
        });
        rebuilt
    }

    fn queue_constraint_adds(
        plan: &mut OperationPlan,
        table: &TableDescriptor,
        foreign_keys: Vec<ForeignKeyGroup>,
        unique_groups: &[UniqueGroupDescriptor],
    ) {
        for group in unique_groups {
            plan.push_constraint(Operation::AddUniqueGroup {
                table: table.name.clone(),
                name: table.unique_name(group),
                columns: group.columns.clone(),
            });
        }
        for foreign_key in foreign_keys {
            plan.push_constraint(Operation::AddForeignKey {
                table: table.name.clone(),
                foreign_key,
            });
        }
    }

    /// Builds the shadow-copy rebuild of a live table.
    ///
    /// Columns are carried over by name only: a column renamed and retyped
    /// in the same change is a drop plus an add, and its data is lost.
    fn rebuild(
        &self,
        table: &TableDescriptor,
        live_table: &LiveTable,
        diff: &SchemaDiff,
        grants: Vec<Grant>,
    ) -> Operation {
        let cs = self.case_sensitive();
        let mut copy = Vec::with_capacity(table.columns.len());

        for column in &table.columns {
            let source = match live_table.column(&column.name, cs) {
                Some(live_column) => {
                    let tightened = diff
                        .tightened
                        .iter()
                        .any(|t| self.same(&t.column.name, &column.name));
                    if tightened {
                        CopySource::Coalesce(live_column.name.clone(), column.ty.clone())
                    } else {
                        CopySource::Column(live_column.name.clone())
                    }
                }
                None if column.nullable || column.auto_generated => continue,
                None => CopySource::Default(column.ty.clone()),
            };
            copy.push(CopyColumn {
                target: column.name.clone(),
                source,
            });
        }

        if !diff.to_drop.is_empty() {
            let lost: Vec<&str> = diff.to_drop.iter().map(|d| d.column.name.as_str()).collect();
            warn!(table = %table.name, columns = ?lost, "Rebuild discards columns");
        }

        Operation::RebuildTable {
            table: table.clone(),
            shadow: format!("{}{SHADOW_SUFFIX}", table.name),
            copy,
            grants,
        }
    }

    /// Re-adds foreign keys that were dropped only because their target
    /// changed, when the owning entity still declares them.
    fn restore_incoming(
        &self,
        plan: &mut OperationPlan,
        target: &TargetModel,
        incoming: &[LiveForeignKeyGroup],
    ) {
        let cs = self.case_sensitive();
        for live in incoming {
            let Some(owner) = target.table(&live.table, cs) else {
                continue;
            };
            let Some(group) = owner
                .foreign_key_groups()
                .into_iter()
                .find(|g| self.same_reference(g, live))
            else {
                continue;
            };
            let resolvable = target
                .table(&group.references_table, cs)
                .is_some_and(|referenced| {
                    group
                        .references_columns
                        .iter()
                        .all(|c| referenced.column(c, cs).is_some())
                });
            if resolvable && !plan.adds_foreign_key(&owner.name, &group.name) {
                debug!(table = %owner.name, constraint = %group.name, "Restoring foreign key");
                plan.push_constraint(Operation::AddForeignKey {
                    table: owner.name.clone(),
                    foreign_key: group,
                });
            }
        }
    }

    /// Plans dropping every entity table present in the live schema.
    ///
    /// # Errors
    ///
    /// Fails unless table drops are authorized.
    pub fn plan_teardown(&self, target: &TargetModel, live: &LiveModel) -> Result<OperationPlan> {
        let cs = self.case_sensitive();
        let mut plan = OperationPlan::new();
        let present: Vec<&LiveTable> = target
            .tables
            .iter()
            .rev()
            .filter_map(|t| live.find_table(&t.name, cs))
            .collect();
        if present.is_empty() {
            return Ok(plan);
        }

        let mut grants = Vec::with_capacity(present.len());
        for table in &present {
            let grant = self
                .guard
                .check(DestructiveKind::TableDrop, &table.name, &[], None)?;
            grants.push(grant);
        }

        if self.adapter.capabilities().alter_column {
            for fk in live.foreign_key_groups() {
                let owner = present.iter().zip(&grants).find(|(t, _)| {
                    self.same(&t.name, &fk.table) || self.same(&t.name, &fk.references_table)
                });
                if let Some((_, grant)) = owner {
                    plan.push_constraint_drop(Operation::DropForeignKey {
                        foreign_key: fk,
                        grant: Some(grant.clone()),
                    });
                }
            }
        }

        for (table, grant) in present.into_iter().zip(grants) {
            plan.push_drop(Operation::DropTable {
                table: table.name.clone(),
                grant,
            });
        }
        Ok(plan)
    }
}

/// The live model a database reports right after `target` was created.
///
/// Useful to check that planning against an up-to-date schema yields
/// nothing.
#[must_use]
pub fn simulate_applied(target: &TargetModel, adapter: &dyn DialectAdapter) -> LiveModel {
    let mut live = LiveModel::empty(
        target
            .tables
            .first()
            .and_then(|t| t.schema.clone())
            .unwrap_or_default(),
    );
    for table in &target.tables {
        let groups = table.foreign_key_groups();
        let columns = table
            .columns
            .iter()
            .map(|column| {
                let foreign_key = groups.iter().find_map(|g| {
                    g.columns
                        .iter()
                        .position(|c| c == &column.name)
                        .map(|i| LiveForeignKey {
                            constraint: adapter.stored_constraint_name(&g.name),
                            references_table: g.references_table.clone(),
                            references_column: g.references_columns[i].clone(),
                            delete_rule: g.delete_rule,
                        })
                });
                LiveColumnInfo {
                    name: column.name.clone(),
                    raw_type: adapter.type_name(&column.ty).unwrap_or_default(),
                    nullable: column.nullable,
                    default: None,
                    primary_key: column.primary_key,
                    auto_increment: column.auto_generated,
                    foreign_key,
                }
            })
            .collect();
        live.insert(LiveTable {
            name: table.name.clone(),
            columns,
            primary_key: table.primary_key.clone(),
            primary_key_constraint: Some(
                adapter.stored_constraint_name(&table.primary_key_name()),
            ),
            unique_constraints: table
                .unique_groups
                .iter()
                .map(|g| LiveUniqueConstraint {
                    name: adapter.stored_constraint_name(&table.unique_name(g)),
                    columns: g.columns.clone(),
                })
                .collect(),
        });
    }
    live
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::entity::{EntityDescriptor, Property};
    use crate::error::ErrorKind;
    use crate::extract::TargetSchemaExtractor;
    use crate::model::DeleteRule;
    use crate::types::SemanticType;

    fn target(dialect: Dialect, entities: &[EntityDescriptor]) -> TargetModel {
        let adapter = dialect.adapter();
        TargetSchemaExtractor::new(adapter.as_ref())
            .extract(entities, None)
            .unwrap()
    }

    fn customer() -> EntityDescriptor {
        EntityDescriptor::new("Customer")
            .property(Property::new("Name", SemanticType::Text(Some(80))))
    }

    fn order() -> EntityDescriptor {
        EntityDescriptor::new("Order")
            .property(Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id"))
            .property(Property::new("Note", SemanticType::text()).nullable())
    }

    #[test]
    fn test_new_table_diff() {
        let adapter = Dialect::Postgres.adapter();
        let model = target(Dialect::Postgres, &[order()]);
        let differ = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default());
        let diff = differ
            .diff_table(&model.tables[0], &LiveModel::empty("public"))
            .unwrap();

        assert!(!diff.exists);
        assert_eq!(diff.foreign_keys.len(), 1);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_identical_tables_produce_empty_diff() {
        for dialect in Dialect::ALL {
            let adapter = dialect.adapter();
            let model = target(dialect, &[customer(), order()]);
            let live = simulate_applied(&model, adapter.as_ref());
            let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
                .plan(&model, &live)
                .unwrap();
            assert!(plan.is_empty(), "{dialect} planned {plan:?}");
        }
    }

    #[test]
    fn test_drop_requires_authorization() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer(), order()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(
            Dialect::Postgres,
            &[
                customer(),
                EntityDescriptor::new("Order").property(
                    Property::new("CustomerId", SemanticType::Integer).references("Customer", "Id"),
                ),
            ],
        );

        let err = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&after, &live)
            .unwrap_err();
        let violation = err.as_policy_violation().unwrap();
        assert_eq!(violation.table, "Order");
        assert_eq!(violation.columns, vec!["Note"]);
        assert_eq!(
            violation.kind,
            ViolationKind::Destructive(DestructiveKind::ColumnDrop)
        );
    }

    #[test]
    fn test_tightening_is_gated_and_backfilled() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer(), order()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(
            Dialect::Postgres,
            &[
                customer(),
                EntityDescriptor::new("Order")
                    .property(
                        Property::new("CustomerId", SemanticType::Integer)
                            .references("Customer", "Id"),
                    )
                    .property(Property::new("Note", SemanticType::text())),
            ],
        );

        let denied = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default()).plan(&after, &live);
        assert_eq!(denied.unwrap_err().kind(), ErrorKind::PolicyViolation);

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(true, false))
            .plan(&after, &live)
            .unwrap();
        let ops: Vec<&Operation> = plan.iter().map(|(_, op)| op).collect();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], Operation::Backfill { .. }));
        assert!(matches!(ops[1], Operation::SetNotNull { .. }));
    }

    #[test]
    fn test_loosening_is_free() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(
            Dialect::Postgres,
            &[EntityDescriptor::new("Customer")
                .property(Property::new("Name", SemanticType::Text(Some(80))).nullable())],
        );
        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&after, &live)
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.destructive_count(), 0);
    }

    #[test]
    fn test_required_foreign_key_column_rejected() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer(), EntityDescriptor::new("Order")]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(Dialect::Postgres, &[customer(), order()]);

        let err = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(true, true))
            .plan(&after, &live)
            .unwrap_err();
        let violation = err.as_policy_violation().unwrap();
        assert_eq!(violation.kind, ViolationKind::RequiredForeignKeyColumn);
        assert_eq!(violation.columns, vec!["CustomerId"]);
    }

    #[test]
    fn test_nullable_foreign_key_column_added() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer(), EntityDescriptor::new("Order")]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(
            Dialect::Postgres,
            &[
                customer(),
                EntityDescriptor::new("Order").property(
                    Property::new("CustomerId", SemanticType::Integer)
                        .nullable()
                        .references("Customer", "Id"),
                ),
            ],
        );
        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&after, &live)
            .unwrap();
        let ops: Vec<&Operation> = plan.iter().map(|(_, op)| op).collect();
        assert!(matches!(ops[0], Operation::AddColumn { .. }));
        match ops[1] {
            Operation::AddForeignKey { foreign_key, .. } => {
                assert_eq!(foreign_key.delete_rule, DeleteRule::SetNull);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_delete_rule_change_drops_and_readds() {
        let adapter = Dialect::Postgres.adapter();
        let model = target(Dialect::Postgres, &[customer(), order()]);
        let mut live = simulate_applied(&model, adapter.as_ref());
        let order_table = live.tables.get_mut("Order").unwrap();
        for column in &mut order_table.columns {
            if let Some(fk) = &mut column.foreign_key {
                fk.delete_rule = DeleteRule::NoAction;
            }
        }

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&model, &live)
            .unwrap();
        let ops: Vec<&Operation> = plan.iter().map(|(_, op)| op).collect();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], Operation::DropForeignKey { grant: None, .. }));
        match ops[1] {
            Operation::AddForeignKey { foreign_key, .. } => {
                assert_eq!(foreign_key.delete_rule, DeleteRule::Cascade);
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(plan.destructive_count(), 0);
    }

    #[test]
    fn test_removed_foreign_key_still_gated() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[customer(), order()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(
            Dialect::Postgres,
            &[
                customer(),
                EntityDescriptor::new("Order")
                    .property(Property::new("CustomerId", SemanticType::Integer))
                    .property(Property::new("Note", SemanticType::text()).nullable()),
            ],
        );

        let err = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&after, &live)
            .unwrap_err();
        assert_eq!(
            err.as_policy_violation().unwrap().kind,
            ViolationKind::Destructive(DestructiveKind::ConstraintDrop)
        );
    }

    fn region(with_code: bool) -> EntityDescriptor {
        let region = EntityDescriptor::new("Region")
            .property(Property::new("Name", SemanticType::Text(Some(40))));
        if with_code {
            region.property(Property::new("Code", SemanticType::Text(Some(8))).unique("code"))
        } else {
            region
        }
    }

    fn store() -> EntityDescriptor {
        EntityDescriptor::new("Store").property(
            Property::new("RegionCode", SemanticType::Text(Some(8)))
                .nullable()
                .references("Region", "Code"),
        )
    }

    #[test]
    fn test_sqlite_rebuilds_tables_referencing_a_dropped_column() {
        let adapter = Dialect::Sqlite.adapter();
        let before = target(Dialect::Sqlite, &[region(true), store()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(Dialect::Sqlite, &[region(false), store()]);

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(false, true))
            .plan(&after, &live)
            .unwrap();
        let ops: Vec<&Operation> = plan.iter().map(|(_, op)| op).collect();
        assert_eq!(ops.len(), 2);
        match ops[1] {
            Operation::RebuildTable { table, grants, .. } => {
                assert_eq!(table.name, "Store");
                assert!(table.foreign_keys.is_empty());
                assert_eq!(grants.len(), 1);
            }
            other => panic!("unexpected {other}"),
        }
        assert!(matches!(ops[0], Operation::RebuildTable { table, .. } if table.name == "Region"));
    }

    #[test]
    fn test_sqlite_refuses_to_sever_unmanaged_tables() {
        let adapter = Dialect::Sqlite.adapter();
        let before = target(Dialect::Sqlite, &[region(true), store()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(Dialect::Sqlite, &[region(false)]);

        let err = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(false, true))
            .plan(&after, &live)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_postgres_drops_references_to_a_dropped_column() {
        let adapter = Dialect::Postgres.adapter();
        let before = target(Dialect::Postgres, &[region(true), store()]);
        let live = simulate_applied(&before, adapter.as_ref());
        let after = target(Dialect::Postgres, &[region(false), store()]);

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(false, true))
            .plan(&after, &live)
            .unwrap();
        let ops: Vec<&Operation> = plan.iter().map(|(_, op)| op).collect();
        assert!(ops.iter().any(|op| matches!(op,
            Operation::DropForeignKey { foreign_key, grant: Some(_) } if foreign_key.table == "Store")));
        assert!(!ops.iter().any(|op| matches!(op, Operation::AddForeignKey { .. })));
    }

    #[test]
    fn test_case_insensitive_dialect_matches_folded_names() {
        let adapter = Dialect::MySql.adapter();
        let model = target(Dialect::MySql, &[customer()]);
        let mut live = simulate_applied(&model, adapter.as_ref());
        let mut table = live.tables.remove("Customer").unwrap();
        table.name = "customer".into();
        for column in &mut table.columns {
            column.name = column.name.to_lowercase();
        }
        table.primary_key = vec!["id".into()];
        live.insert(table);

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan(&model, &live)
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_teardown_requires_force() {
        let adapter = Dialect::Postgres.adapter();
        let model = target(Dialect::Postgres, &[customer(), order()]);
        let live = simulate_applied(&model, adapter.as_ref());

        let err = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(true, false))
            .plan_teardown(&model, &live)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);

        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::new(false, true))
            .plan_teardown(&model, &live)
            .unwrap();
        let ops: Vec<String> = plan.iter().map(|(_, op)| op.to_string()).collect();
        assert_eq!(
            ops,
            vec![
                "drop foreign key fk_Order_Customer on Order",
                "drop table Order",
                "drop table Customer",
            ]
        );
    }

    #[test]
    fn test_teardown_of_missing_tables_is_empty() {
        let adapter = Dialect::Postgres.adapter();
        let model = target(Dialect::Postgres, &[customer()]);
        let plan = SchemaDiffer::new(adapter.as_ref(), SafetyGuard::default())
            .plan_teardown(&model, &LiveModel::empty("public"))
            .unwrap();
        assert!(plan.is_empty());
    }
}
