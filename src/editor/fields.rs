use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{describe, EditError, Editor, Result};
use crate::history::{Action, Command, Element, Patch};
use crate::model::{Field, FieldRef, FieldUpdate};
use crate::reindex;

impl Editor {
    /// Appends a field. `None` creates `field_{n}` of the default type.
    pub fn add_field(
        &mut self,
        table_id: usize,
        field: Option<Field>,
        add_to_history: bool,
    ) -> Result<usize> {
        let table = self.table(table_id)?;
        let mut field = field.unwrap_or_else(|| {
            Field::new(
                format!("field_{}", table.fields.len()),
                self.config.default_field_type.clone(),
            )
        });
        if field.primary {
            field.not_null = true;
            field.unique = true;
        }
        let message = format!(
            "Add field `{}.{}` #{table_id}.{}",
            table.name,
            field.name,
            table.fields.len()
        );

        let checkpoint = add_to_history.then(|| self.checkpoint());
        let id = reindex::push(&mut self.diagram.tables[table_id].fields, field);

        if let Some(checkpoint) = checkpoint {
            let field = self.diagram.tables[table_id].fields[id].clone();
            let command = Command::new(Action::Add, Element::Field, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::AddField { table_id, field },
            );
            self.push_undo(command);
        }
        self.settle("add_field");
        Ok(id)
    }

    /// Edits one field.
    ///
    /// Promoting a composite foreign key column to primary, or toggling its
    /// `notNull`, applies the same change to every column referencing the same
    /// parent table. A rename carries over to the table's indices and to the
    /// default-named relationships starting at the field.
    pub fn update_field(
        &mut self,
        at: FieldRef,
        values: FieldUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let table = self.table(at.table_id)?;
        let field = table.field(at.field_id).ok_or(EditError::FieldNotFound(at))?;

        let stays_primary = values.primary.unwrap_or(field.primary);
        if stays_primary && (values.not_null == Some(false) || values.unique == Some(false)) {
            return Err(EditError::PrimaryKeyConstraint);
        }
        if field.primary && values.primary == Some(false) && self.is_subtype_key(at) {
            return Err(EditError::SubtypeKeyDemotion);
        }

        let table_name = table.name.clone();
        let old_name = field.name.clone();
        let message = format!(
            "Edit field `{table_name}.{old_name}` #{at} {}",
            describe(&values)
        );
        let checkpoint = add_to_history.then(|| self.checkpoint());

        let table = &mut self.diagram.tables[at.table_id];
        values.apply(&mut table.fields[at.field_id]);
        let field = table.fields[at.field_id].clone();

        if let Some(fk) = field.foreign_key {
            let siblings = table
                .fields
                .iter_mut()
                .filter(|f| f.id != at.field_id && f.references_table(fk.table_id));
            for sibling in siblings {
                if values.primary == Some(true) {
                    sibling.primary = true;
                    sibling.not_null = true;
                    sibling.unique = true;
                }
                if let Some(not_null) = values.not_null {
                    if not_null || !sibling.primary {
                        sibling.not_null = not_null;
                    }
                }
            }
        }

        if field.name != old_name {
            for name in table.indices.iter_mut().flat_map(|i| i.fields.iter_mut()) {
                if *name == old_name {
                    *name = field.name.clone();
                }
            }
            let old_default = format!("{table_name}_{old_name}");
            for rel in &mut self.diagram.relationships {
                if rel.start == at && rel.name == old_default {
                    rel.name = format!("{table_name}_{}", field.name);
                }
            }
        }

        if let Some(checkpoint) = checkpoint {
            let command = Command::new(Action::Edit, Element::Field, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::UpdateField { at, values },
            );
            self.push_undo(command);
        }
        self.settle("update_field");
        Ok(())
    }

    /// Whether the field is a foreign key identifying a subtype child.
    fn is_subtype_key(&self, at: FieldRef) -> bool {
        let Some(field) = self.diagram.field(at) else {
            return false;
        };
        self.diagram.relationships.iter().any(|r| {
            r.is_subtype()
                && r.target.has_table(at.table_id)
                && field.references_table(r.start.table_id)
        })
    }

    /// Deletes a field with its cascade.
    ///
    /// A field belonging to a composite primary key takes down every
    /// relationship started by any column of that key, and with each of them
    /// the child columns referencing the key (one hop only). A field belonging
    /// to a composite foreign key takes down the relationships ending at any of
    /// its sibling columns, and the siblings themselves. Fields referencing
    /// exactly the deleted field go too.
    pub fn delete_field(&mut self, at: FieldRef, add_to_history: bool) -> Result<()> {
        let table = self.table(at.table_id)?;
        let field = table.field(at.field_id).ok_or(EditError::FieldNotFound(at))?;
        let message = format!(
            "Delete field `{}.{}` #{at} of {}",
            table.name,
            field.name,
            table.fields.len()
        );
        let t = at.table_id;

        let pk_ids: BTreeSet<usize> = if field.primary {
            table.primary_keys().map(|f| f.id).collect()
        } else {
            BTreeSet::new()
        };
        let composite_pk = pk_ids.len() > 1;

        let fk_siblings: BTreeSet<usize> = match field.foreign_key {
            Some(fk) => table
                .fields
                .iter()
                .filter(|f| f.references_table(fk.table_id))
                .map(|f| f.id)
                .collect(),
            None => BTreeSet::new(),
        };
        let composite_fk = fk_siblings.len() > 1;

        let affected: Vec<usize> = self
            .diagram
            .relationships
            .iter()
            .filter(|r| {
                r.start == at
                    || r.ends().contains(&at)
                    || (composite_pk && r.start.table_id == t && pk_ids.contains(&r.start.field_id))
                    || (composite_fk
                        && r.ends()
                            .iter()
                            .any(|e| e.table_id == t && fk_siblings.contains(&e.field_id)))
            })
            .map(|r| r.id)
            .collect();

        let mut doomed: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        doomed.entry(t).or_default().insert(at.field_id);

        for &rel_id in &affected {
            let rel = &self.diagram.relationships[rel_id];
            if composite_pk && rel.start.table_id == t {
                for end in rel.ends() {
                    let Some(child) = self.diagram.tables.get(end.table_id) else {
                        debug!(table_id = end.table_id, "child table not found, skipping");
                        continue;
                    };
                    let columns = child.fields.iter().filter(|f| {
                        f.foreign_key
                            .is_some_and(|fk| fk.table_id == t && pk_ids.contains(&fk.field_id))
                    });
                    doomed
                        .entry(end.table_id)
                        .or_default()
                        .extend(columns.map(|f| f.id));
                }
            }
            if composite_fk {
                doomed.entry(t).or_default().extend(fk_siblings.iter().copied());
            }
        }

        for table in &self.diagram.tables {
            let referencing = table.fields.iter().filter(|f| f.foreign_key == Some(at));
            let ids: Vec<usize> = referencing.map(|f| f.id).collect();
            if !ids.is_empty() {
                doomed.entry(table.id).or_default().extend(ids);
            }
        }

        let checkpoint = add_to_history.then(|| self.checkpoint());

        for &rel_id in affected.iter().rev() {
            reindex::remove(&mut self.diagram.relationships, rel_id);
        }
        for (table_id, ids) in &doomed {
            reindex::remove_fields(&mut self.diagram, *table_id, ids);
        }
        debug!(
            table_id = t,
            field_id = at.field_id,
            relationships = affected.len(),
            "field deleted"
        );

        if let Some(checkpoint) = checkpoint {
            let command = Command::new(Action::Delete, Element::Field, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::DeleteField(at),
            );
            self.push_undo(command);
        }
        self.settle("delete_field");
        Ok(())
    }
}
