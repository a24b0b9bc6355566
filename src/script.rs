//! JSON editing scripts.
//!
//! A script is an array of steps, each tagged by `op`:
//!
//! ```json
//! [
//!   { "op": "addTable", "table": { "name": "users", "fields": [] } },
//!   { "op": "link", "start": { "tableId": 0, "fieldId": 0 }, "endTableId": 1 },
//!   { "op": "undo" }
//! ]
//! ```
//!
//! Steps run through the editor primitives with history enabled unless the
//! step says otherwise, so a script behaves like the same edits made by hand.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::editor::{EditError, Editor};
use crate::history::Element;
use crate::model::{
    Area, AreaUpdate, EnumType, EnumUpdate, Field, FieldRef, FieldUpdate, LinkRequest, Note,
    NoteUpdate, Position, Relationship, RelationshipUpdate, Table, TableUpdate,
};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("step {index}: {source}")]
    Step {
        index: usize,
        #[source]
        source: EditError,
    },
}

fn recorded() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    AddTable {
        #[serde(default)]
        table: Option<Table>,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateTable {
        id: usize,
        values: TableUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteTable {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddField {
        table_id: usize,
        #[serde(default)]
        field: Option<Field>,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateField {
        at: FieldRef,
        values: FieldUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteField {
        at: FieldRef,
        #[serde(default = "recorded")]
        history: bool,
    },
    Link {
        start: FieldRef,
        end_table_id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddRelationship {
        relationship: Relationship,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateRelationship {
        id: usize,
        values: RelationshipUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    ResetRelationshipName {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteRelationship {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddChildToSubtype {
        relationship_id: usize,
        child_table_id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    RemoveChildFromSubtype {
        relationship_id: usize,
        child_table_id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddArea {
        #[serde(default)]
        area: Option<Area>,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateArea {
        id: usize,
        values: AreaUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteArea {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddNote {
        #[serde(default)]
        note: Option<Note>,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateNote {
        id: usize,
        values: NoteUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteNote {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    AddEnum {
        #[serde(default, rename = "enum")]
        value: Option<EnumType>,
        #[serde(default = "recorded")]
        history: bool,
    },
    UpdateEnum {
        id: usize,
        values: EnumUpdate,
        #[serde(default = "recorded")]
        history: bool,
    },
    DeleteEnum {
        id: usize,
        #[serde(default = "recorded")]
        history: bool,
    },
    Move {
        element: Element,
        moves: Vec<(usize, Position)>,
        #[serde(default = "recorded")]
        history: bool,
    },
    Pan {
        to: Position,
        #[serde(default = "recorded")]
        history: bool,
    },
    Undo,
    Redo,
    ClearHistory,
}

impl Step {
    pub fn apply(self, editor: &mut Editor) -> Result<(), EditError> {
        match self {
            Step::AddTable { table, history } => {
                editor.add_table(table, history);
            }
            Step::UpdateTable { id, values, history } => editor.update_table(id, values, history)?,
            Step::DeleteTable { id, history } => editor.delete_table(id, history)?,
            Step::AddField {
                table_id,
                field,
                history,
            } => {
                editor.add_field(table_id, field, history)?;
            }
            Step::UpdateField { at, values, history } => editor.update_field(at, values, history)?,
            Step::DeleteField { at, history } => editor.delete_field(at, history)?,
            Step::Link {
                start,
                end_table_id,
                history,
            } => {
                editor.link(LinkRequest { start, end_table_id }, history)?;
            }
            Step::AddRelationship {
                relationship,
                history,
            } => {
                editor.add_relationship(relationship, history);
            }
            Step::UpdateRelationship { id, values, history } => {
                editor.update_relationship(id, values, history)?
            }
            Step::ResetRelationshipName { id, history } => {
                editor.reset_relationship_name(id, history)?
            }
            Step::DeleteRelationship { id, history } => editor.delete_relationship(id, history)?,
            Step::AddChildToSubtype {
                relationship_id,
                child_table_id,
                history,
            } => editor.add_child_to_subtype(relationship_id, child_table_id, history)?,
            Step::RemoveChildFromSubtype {
                relationship_id,
                child_table_id,
                history,
            } => editor.remove_child_from_subtype(relationship_id, child_table_id, history)?,
            Step::AddArea { area, history } => {
                editor.add_area(area, history);
            }
            Step::UpdateArea { id, values, history } => editor.update_area(id, values, history)?,
            Step::DeleteArea { id, history } => editor.delete_area(id, history)?,
            Step::AddNote { note, history } => {
                editor.add_note(note, history);
            }
            Step::UpdateNote { id, values, history } => editor.update_note(id, values, history)?,
            Step::DeleteNote { id, history } => editor.delete_note(id, history)?,
            Step::AddEnum { value, history } => {
                editor.add_enum(value, history);
            }
            Step::UpdateEnum { id, values, history } => editor.update_enum(id, values, history)?,
            Step::DeleteEnum { id, history } => editor.delete_enum(id, history)?,
            Step::Move {
                element,
                moves,
                history,
            } => editor.move_elements(element, &moves, history)?,
            Step::Pan { to, history } => editor.pan(to, history),
            Step::Undo => {
                editor.undo();
            }
            Step::Redo => {
                editor.redo();
            }
            Step::ClearHistory => editor.clear_history(),
        }
        Ok(())
    }
}

pub fn parse(source: &str) -> Result<Vec<Step>, ScriptError> {
    Ok(serde_json::from_str(source)?)
}

/// Runs every step, stopping at the first rejected one. Steps before it stay
/// applied.
pub fn run(editor: &mut Editor, steps: Vec<Step>) -> Result<usize, ScriptError> {
    let count = steps.len();
    for (index, step) in steps.into_iter().enumerate() {
        debug!(index, ?step, "script step");
        step.apply(editor)
            .map_err(|source| ScriptError::Step { index, source })?;
    }
    Ok(count)
}
