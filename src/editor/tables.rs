use tracing::debug;

use super::{describe, Editor, Result};
use crate::history::{Action, Command, Element, Patch};
use crate::model::{Field, RelationshipTarget, Table, TableUpdate};
use crate::reindex;

impl Editor {
    /// Appends a table. `None` creates `table_{n}` with an `id` primary key.
    pub fn add_table(&mut self, table: Option<Table>, add_to_history: bool) -> usize {
        let table = table.unwrap_or_else(|| self.default_table());
        let id = reindex::push(&mut self.diagram.tables, table);
        let table = &mut self.diagram.tables[id];
        reindex::renumber(&mut table.fields);
        for field in &mut table.fields {
            if field.primary {
                field.not_null = true;
                field.unique = true;
            }
        }

        if add_to_history {
            let table = self.diagram.tables[id].clone();
            let command = Command::new(
                Action::Add,
                Element::Table,
                format!("Add table `{}` #{id}", table.name),
            )
            .patches(Patch::DeleteTable(id), Patch::AddTable(table));
            self.push_undo(command);
        }
        self.settle("add_table");
        id
    }

    fn default_table(&self) -> Table {
        let mut id = Field::primary_key("id", self.config.default_field_type.clone());
        id.increment = true;
        Table {
            color: self.config.default_table_color.clone(),
            ..Table::new(format!("table_{}", self.diagram.tables.len())).with_field(id)
        }
    }

    pub fn update_table(
        &mut self,
        id: usize,
        values: TableUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let table = self.table(id)?;
        let inverse = values.inverse(table);
        let message = format!("Edit table `{}` #{id} {}", table.name, describe(&values));

        values.apply(&mut self.diagram.tables[id]);

        if add_to_history {
            let command = Command::new(Action::Edit, Element::Table, message).patches(
                Patch::UpdateTable {
                    id,
                    values: inverse,
                },
                Patch::UpdateTable { id, values },
            );
            self.push_undo(command);
        }
        self.settle("update_table");
        Ok(())
    }

    /// Deletes a table and every relationship it starts or ends.
    ///
    /// Subtype hierarchies that list the table among several children only
    /// lose that child. Foreign key fields elsewhere that still point at the
    /// deleted table are left in place.
    pub fn delete_table(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        self.table(id)?;
        let count = self.diagram.tables.len();
        let relationships_before = self.diagram.relationships.clone();
        let dependents: Vec<Table> = self
            .diagram
            .tables
            .iter()
            .filter(|t| t.id != id && t.fields.iter().any(|f| f.references_table(id)))
            .cloned()
            .collect();

        let relationships = std::mem::take(&mut self.diagram.relationships);
        self.diagram.relationships = relationships
            .into_iter()
            .filter_map(|mut rel| {
                if rel.start.table_id == id {
                    return None;
                }
                if rel.target.has_table(id) {
                    if let RelationshipTarget::Single(_) = rel.target {
                        return None;
                    }
                    rel.target = rel.target.without_table(id);
                }
                Some(rel)
            })
            .collect();
        reindex::renumber(&mut self.diagram.relationships);
        let removed = relationships_before.len() - self.diagram.relationships.len();

        let Some(table) = reindex::remove_table(&mut self.diagram, id) else {
            return Ok(());
        };
        debug!(id, removed, "table deleted with its relationships");

        if add_to_history {
            let command = Command::new(
                Action::Delete,
                Element::Table,
                format!("Delete table `{}` #{id} of {count}", table.name),
            )
            .patches(
                Patch::RestoreTable {
                    table,
                    relationships: relationships_before,
                    dependents,
                },
                Patch::DeleteTable(id),
            );
            self.push_undo(command);
        }
        self.settle("delete_table");
        Ok(())
    }
}
