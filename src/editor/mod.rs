//! The entity store and its mutation primitives.
//!
//! Every primitive takes an `add_to_history` flag. When set, exactly one
//! command is pushed, carrying enough state to invert the whole cascade.
//! Undo and redo replay patches through these same primitives with the flag
//! cleared, so cascades run identically.

mod fields;
mod peers;
mod relationships;
mod replay;
mod subtypes;
mod tables;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::history::{Command, Element, History, Preimage, DEFAULT_CAPACITY};
use crate::integrity;
use crate::model::{Diagram, FieldRef, Relationship, Table};
use crate::reindex::renumber;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("cannot use this field as a key")]
    NotAKey,
    #[error("{element} {id} not found")]
    NotFound { element: Element, id: usize },
    #[error("field {} not found in table {}", .0.field_id, .0.table_id)]
    FieldNotFound(FieldRef),
    #[error("table `{0}` has no primary key")]
    NoPrimaryKey(String),
    #[error("field `{name}` already exists in table `{table}`")]
    NameCollision { table: String, name: String },
    #[error("this relationship already exists")]
    DuplicateRelationship,
    #[error("relationship {0} is not a subtype relationship")]
    NotASubtype(usize),
    #[error("table {0} is already a subtype of this relationship")]
    ChildAlreadyPresent(usize),
    #[error("a table cannot be a subtype of itself")]
    ChildIsParent,
    #[error("table {0} is not a subtype of this relationship")]
    ChildNotPresent(usize),
    #[error("table {0} has no field to use as discriminator")]
    EmptyChildTable(usize),
    #[error("subtype key fields must stay primary")]
    SubtypeKeyDemotion,
    #[error("primary key fields must stay not null and unique")]
    PrimaryKeyConstraint,
    #[error("relationship {0} needs exactly one subtype to become an ordinary relationship")]
    SubtypeNotCollapsible(usize),
    #[error("relationship {0} has no child table")]
    NoChild(usize),
    #[error("{0} cannot be moved")]
    NotMovable(Element),
}

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Capacity of each of the undo and redo stacks.
    pub history_capacity: usize,
    pub default_field_type: String,
    pub default_table_color: String,
    pub default_area_color: String,
    pub default_note_color: String,
    /// Run the integrity audit after every mutation and log violations.
    pub audit_mutations: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            default_field_type: "INTEGER".to_string(),
            default_table_color: "#175e7a".to_string(),
            default_area_color: "#175e7a".to_string(),
            default_note_color: "#fcf7ac".to_string(),
            audit_mutations: cfg!(debug_assertions),
        }
    }
}

pub struct Editor {
    diagram: Diagram,
    history: History,
    config: EditorConfig,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self {
            diagram: Diagram::default(),
            history: History::new(config.history_capacity),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Read-only snapshot of every collection.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replaces the whole document, as a bulk load from persistence or import.
    /// Ids are renumbered to positions and history is cleared.
    pub fn load(&mut self, mut diagram: Diagram) {
        renumber(&mut diagram.tables);
        for table in &mut diagram.tables {
            renumber(&mut table.fields);
            renumber(&mut table.indices);
        }
        renumber(&mut diagram.relationships);
        renumber(&mut diagram.areas);
        renumber(&mut diagram.notes);
        renumber(&mut diagram.enums);

        info!(
            tables = diagram.tables.len(),
            relationships = diagram.relationships.len(),
            "diagram loaded"
        );
        self.diagram = diagram;
        self.history.clear();
        self.settle("load");
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("history cleared");
    }

    /// Pushes a command through the history filter.
    pub fn push_undo(&mut self, command: Command) {
        let pushed = self.history.push_undo(command);
        debug!(?pushed, "command pushed");
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            tables: self.diagram.tables.clone(),
            relationships: self.diagram.relationships.clone(),
        }
    }

    fn table(&self, id: usize) -> Result<&Table> {
        self.diagram.tables.get(id).ok_or(EditError::NotFound {
            element: Element::Table,
            id,
        })
    }

    fn relationship(&self, id: usize) -> Result<&Relationship> {
        self.diagram.relationships.get(id).ok_or(EditError::NotFound {
            element: Element::Relationship,
            id,
        })
    }

    /// Post-mutation hook: logs the primitive and, when enabled, audits.
    fn settle(&self, op: &'static str) {
        debug!(op, "mutation applied");
        if self.config.audit_mutations {
            for violation in integrity::audit(&self.diagram) {
                warn!(op, %violation, "integrity violation");
            }
        }
    }
}

/// Tables and relationships as they were before a cascade.
struct Checkpoint {
    tables: Vec<Table>,
    relationships: Vec<Relationship>,
}

impl Checkpoint {
    /// Keeps only what the cascade changed. Table count must be unchanged.
    fn since(self, diagram: &Diagram) -> Preimage {
        let tables = self
            .tables
            .into_iter()
            .zip(&diagram.tables)
            .filter(|(before, after)| before != *after)
            .map(|(before, _)| before)
            .collect();
        let relationships =
            (self.relationships != diagram.relationships).then_some(self.relationships);
        Preimage {
            tables,
            relationships,
        }
    }
}

/// Summary of a partial update for command messages.
fn describe<T: serde::Serialize>(values: &T) -> String {
    serde_json::to_string(values).unwrap_or_default()
}

#[cfg(test)]
mod tests;
