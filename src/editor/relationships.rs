use std::collections::BTreeSet;

use tracing::debug;

use super::{describe, EditError, Editor, Result};
use crate::history::{Action, Command, Element, Patch};
use crate::model::{
    Cardinality, Field, FieldRef, LinkRequest, Relationship, RelationshipTarget, RelationshipType,
    RelationshipUpdate,
};
use crate::reindex;

impl Editor {
    /// Checks that a link may start at `start`: the field must be primary, or
    /// both not null and unique.
    pub fn can_link_from(&self, start: FieldRef) -> Result<()> {
        let table = self.table(start.table_id)?;
        let field = table.field(start.field_id).ok_or(EditError::FieldNotFound(start))?;
        if field.is_key_eligible() {
            Ok(())
        } else {
            Err(EditError::NotAKey)
        }
    }

    /// Completes a drag-to-link: synthesizes one foreign key column in the
    /// target table per primary key column of the parent, then records the
    /// relationship. Returns the new relationship's id.
    ///
    /// The relationship's end field is the first synthesized column, even for
    /// a composite parent key.
    pub fn link(&mut self, request: LinkRequest, add_to_history: bool) -> Result<usize> {
        self.can_link_from(request.start)?;
        let parent = self.table(request.start.table_id)?;
        let child = self.table(request.end_table_id)?;
        let key = &parent.fields[request.start.field_id];

        let primary_keys: Vec<&Field> = parent.primary_keys().collect();
        if primary_keys.is_empty() {
            return Err(EditError::NoPrimaryKey(parent.name.clone()));
        }

        let recursive = parent.id == child.id;
        let base = child.fields.len();
        let synthesized: Vec<Field> = primary_keys
            .iter()
            .enumerate()
            .map(|(i, pk)| Field {
                id: base + i,
                name: if recursive {
                    String::new()
                } else {
                    format!("{}_{}", parent.name, pk.name)
                },
                typ: pk.typ.clone(),
                size: pk.size.clone(),
                not_null: true,
                unique: false,
                foreign_key: Some(FieldRef::new(parent.id, pk.id)),
                ..Field::default()
            })
            .collect();

        if !recursive {
            if let Some(clash) = synthesized
                .iter()
                .find(|s| child.fields.iter().any(|f| f.name == s.name))
            {
                return Err(EditError::NameCollision {
                    table: child.name.clone(),
                    name: clash.name.clone(),
                });
            }
        }

        let first = &synthesized[0];
        let duplicate = self.diagram.relationships.iter().any(|r| {
            r.start == request.start
                && matches!(r.target, RelationshipTarget::Single(end)
                    if end.table_id == child.id
                        && self.diagram.field(end).is_some_and(|f| {
                            f.name == first.name
                                && f.typ == first.typ
                                && f.foreign_key == first.foreign_key
                        }))
        });
        if duplicate {
            return Err(EditError::DuplicateRelationship);
        }

        let name = format!("{}_{}", parent.name, key.name);
        let mut relationship = Relationship::new(
            name,
            request.start,
            FieldRef::new(child.id, first.id),
        );
        relationship.relationship_type = RelationshipType::OneToMany;
        relationship.cardinality = Cardinality::Many;
        let message = format!(
            "Link `{}.{}` to `{}` #{}",
            parent.name,
            key.name,
            child.name,
            self.diagram.relationships.len()
        );

        let checkpoint = add_to_history.then(|| self.checkpoint());
        let columns = synthesized.len();
        self.diagram.tables[request.end_table_id].fields.extend(synthesized);
        let id = reindex::push(&mut self.diagram.relationships, relationship);
        debug!(id, columns, end_table_id = request.end_table_id, "relationship linked");

        if let Some(checkpoint) = checkpoint {
            let command = Command::new(Action::Add, Element::Relationship, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::Link(request),
            );
            self.push_undo(command);
        }
        self.settle("link");
        Ok(id)
    }

    /// Appends a relationship as given, without synthesizing columns. Used by
    /// importers.
    pub fn add_relationship(&mut self, relationship: Relationship, add_to_history: bool) -> usize {
        let checkpoint = add_to_history.then(|| self.checkpoint());
        let id = reindex::push(&mut self.diagram.relationships, relationship);
        let message = format!(
            "Add relationship `{}` #{id}",
            self.diagram.relationships[id].name
        );

        if let Some(checkpoint) = checkpoint {
            let relationship = self.diagram.relationships[id].clone();
            let command = Command::new(Action::Add, Element::Relationship, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::AddRelationship(relationship),
            );
            self.push_undo(command);
        }
        self.settle("add_relationship");
        id
    }

    /// Edits a relationship.
    ///
    /// Turning it into a subtype promotes the child columns referencing the
    /// parent to primary keys. Turning a subtype back into an ordinary
    /// relationship requires exactly one child.
    pub fn update_relationship(
        &mut self,
        id: usize,
        values: RelationshipUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let rel = self.relationship(id)?;
        let to_subtype =
            values.relationship_type == Some(RelationshipType::Subtype) && !rel.is_subtype();
        let from_subtype = rel.is_subtype()
            && values
                .relationship_type
                .is_some_and(|t| t != RelationshipType::Subtype);

        let collapsed = match &rel.target {
            RelationshipTarget::Subtype(children) if from_subtype => match children.as_slice() {
                [only] => Some(RelationshipTarget::Single(*only)),
                _ => return Err(EditError::SubtypeNotCollapsible(id)),
            },
            _ => None,
        };
        let message = format!("Edit relationship `{}` #{id} {}", rel.name, describe(&values));

        let checkpoint = add_to_history.then(|| self.checkpoint());
        let rel = &mut self.diagram.relationships[id];
        values.apply(rel);
        if let Some(target) = collapsed {
            rel.target = target;
        }
        if from_subtype {
            rel.subtype_restriction = None;
        }
        if to_subtype && rel.subtype_restriction.is_none() {
            rel.subtype_restriction = Some(Default::default());
        }

        if to_subtype {
            let parent = rel.start.table_id;
            let children: BTreeSet<usize> = rel.ends().iter().map(|e| e.table_id).collect();
            for child in children {
                let Some(table) = self.diagram.tables.get_mut(child) else {
                    debug!(table_id = child, "subtype child not found, skipping");
                    continue;
                };
                for field in table.fields.iter_mut().filter(|f| f.references_table(parent)) {
                    field.primary = true;
                    field.not_null = true;
                    field.unique = true;
                }
            }
        }

        if let Some(checkpoint) = checkpoint {
            let command = Command::new(Action::Edit, Element::Relationship, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::UpdateRelationship { id, values },
            );
            self.push_undo(command);
        }
        self.settle("update_relationship");
        Ok(())
    }

    /// Renames a relationship to `fk_{child}_{childField}_{parent}`.
    pub fn reset_relationship_name(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        let rel = self.relationship(id)?;
        let parent = self.table(rel.start.table_id)?;
        let end = rel.ends().first().copied().ok_or(EditError::NoChild(id))?;
        let child = self.table(end.table_id)?;
        let child_field = child.field(end.field_id).ok_or(EditError::FieldNotFound(end))?;

        let name = format!("fk_{}_{}_{}", child.name, child_field.name, parent.name);
        self.update_relationship(
            id,
            RelationshipUpdate {
                name: Some(name),
                ..RelationshipUpdate::default()
            },
            add_to_history,
        )
    }

    /// Deletes a relationship together with the foreign key columns its child
    /// tables hold for the parent.
    pub fn delete_relationship(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        let rel = self.relationship(id)?;
        let message = format!(
            "Delete relationship `{}` #{id} of {}",
            rel.name,
            self.diagram.relationships.len()
        );

        let checkpoint = add_to_history.then(|| self.checkpoint());
        let Some(rel) = reindex::remove(&mut self.diagram.relationships, id) else {
            return Ok(());
        };

        let parent = rel.start.table_id;
        let children: BTreeSet<usize> = rel.ends().iter().map(|e| e.table_id).collect();
        for child in children {
            let Some(table) = self.diagram.tables.get(child) else {
                debug!(table_id = child, "child table not found, skipping");
                continue;
            };
            let columns: BTreeSet<usize> = table
                .fields
                .iter()
                .filter(|f| f.references_table(parent))
                .map(|f| f.id)
                .collect();
            reindex::remove_fields(&mut self.diagram, child, &columns);
        }

        if let Some(checkpoint) = checkpoint {
            let command = Command::new(Action::Delete, Element::Relationship, message).patches(
                Patch::Restore(checkpoint.since(&self.diagram)),
                Patch::DeleteRelationship(id),
            );
            self.push_undo(command);
        }
        self.settle("delete_relationship");
        Ok(())
    }
}
