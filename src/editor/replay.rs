use tracing::{debug, info, warn};

use super::{EditError, Editor, Result};
use crate::history::{Element, Patch, Preimage};
use crate::reindex;

impl Editor {
    /// Reverts the most recent command. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.history.take_undo() else {
            return false;
        };
        info!(message = %command.message, "undo");
        self.apply(&command.undo);
        self.history.undone(command);
        true
    }

    /// Re-applies the most recently undone command.
    pub fn redo(&mut self) -> bool {
        let Some(command) = self.history.take_redo() else {
            return false;
        };
        info!(message = %command.message, "redo");
        self.apply(&command.redo);
        self.history.redone(command);
        true
    }

    fn apply(&mut self, patch: &Patch) {
        if let Err(err) = self.replay(patch) {
            warn!(%err, ?patch, "replay failed");
        }
        self.settle("replay");
    }

    fn replay(&mut self, patch: &Patch) -> Result<()> {
        match patch {
            Patch::AddTable(table) => {
                reindex::insert_table(&mut self.diagram, table.clone());
            }
            Patch::DeleteTable(id) => self.delete_table(*id, false)?,
            Patch::RestoreTable {
                table,
                relationships,
                dependents,
            } => {
                reindex::insert_table(&mut self.diagram, table.clone());
                self.diagram.relationships = relationships.clone();
                self.restore(&Preimage {
                    tables: dependents.clone(),
                    relationships: None,
                });
            }
            Patch::UpdateTable { id, values } => self.update_table(*id, values.clone(), false)?,
            Patch::AddField { table_id, field } => {
                reindex::insert_field(&mut self.diagram, *table_id, field.clone()).ok_or(
                    EditError::NotFound {
                        element: Element::Table,
                        id: *table_id,
                    },
                )?;
            }
            Patch::DeleteField(at) => self.delete_field(*at, false)?,
            Patch::UpdateField { at, values } => self.update_field(*at, values.clone(), false)?,
            Patch::AddRelationship(rel) => {
                reindex::insert(&mut self.diagram.relationships, rel.clone());
            }
            Patch::DeleteRelationship(id) => self.delete_relationship(*id, false)?,
            Patch::UpdateRelationship { id, values } => {
                self.update_relationship(*id, values.clone(), false)?
            }
            Patch::Link(request) => {
                self.link(*request, false)?;
            }
            Patch::AddSubtypeChild {
                relationship_id,
                child_table_id,
            } => self.add_child_to_subtype(*relationship_id, *child_table_id, false)?,
            Patch::RemoveSubtypeChild {
                relationship_id,
                child_table_id,
            } => self.remove_child_from_subtype(*relationship_id, *child_table_id, false)?,
            Patch::AddArea(area) => {
                reindex::insert(&mut self.diagram.areas, area.clone());
            }
            Patch::DeleteArea(id) => self.delete_area(*id, false)?,
            Patch::UpdateArea { id, values } => self.update_area(*id, values.clone(), false)?,
            Patch::AddNote(note) => {
                reindex::insert(&mut self.diagram.notes, note.clone());
            }
            Patch::DeleteNote(id) => self.delete_note(*id, false)?,
            Patch::UpdateNote { id, values } => self.update_note(*id, values.clone(), false)?,
            Patch::AddEnum(e) => {
                reindex::insert(&mut self.diagram.enums, e.clone());
            }
            Patch::DeleteEnum(id) => self.delete_enum(*id, false)?,
            Patch::UpdateEnum { id, values } => self.update_enum(*id, values.clone(), false)?,
            Patch::Move { element, positions } => {
                self.move_elements(*element, positions, false)?
            }
            Patch::Pan(to) => self.pan(*to, false),
            Patch::Restore(preimage) => self.restore(preimage),
        }
        Ok(())
    }

    /// Puts back whole tables at their ids and, if present, the relationship
    /// list.
    fn restore(&mut self, preimage: &Preimage) {
        for table in &preimage.tables {
            match self.diagram.tables.get_mut(table.id) {
                Some(slot) => *slot = table.clone(),
                None => debug!(id = table.id, "restore skipped missing table"),
            }
        }
        if let Some(relationships) = &preimage.relationships {
            self.diagram.relationships = relationships.clone();
        }
    }
}
