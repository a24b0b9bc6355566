//! Undo/redo command log.
//!
//! Two bounded stacks of [`Command`]s. A command carries two [`Patch`]es: the
//! intent to replay for redo and the intent (or pre-image) to replay for undo.
//! Applying patches is the editor's job; this module only decides what gets
//! recorded.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{
    Area, AreaUpdate, EnumType, EnumUpdate, Field, FieldRef, FieldUpdate, LinkRequest, Note,
    NoteUpdate, Position, Relationship, RelationshipUpdate, Table, TableUpdate,
};

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Move,
    Delete,
    Edit,
    Pan,
}

impl Action {
    /// Actions accepted by [`History::push_undo`].
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Add | Self::Move | Self::Delete | Self::Edit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Table,
    Field,
    Relationship,
    Area,
    Note,
    Enum,
    Canvas,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Field => "field",
            Self::Relationship => "relationship",
            Self::Area => "area",
            Self::Note => "note",
            Self::Enum => "enum",
            Self::Canvas => "canvas",
        };
        f.write_str(name)
    }
}

/// Identity of the element(s) a command acts on, used for dedup and MOVE
/// coalescing. Multi-selection moves carry every id, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandId {
    One(usize),
    Many(Vec<usize>),
}

/// Complete copies of the structures a cascade may rewrite.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Preimage {
    /// Whole tables, each restored at its own id.
    pub tables: Vec<Table>,
    /// The full relationship list, when the cascade touched it.
    pub relationships: Option<Vec<Relationship>>,
}

impl Preimage {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relationships.is_none()
    }
}

/// An intent replayed through the editor primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Insert the table at its own id.
    AddTable(Table),
    DeleteTable(usize),
    /// Re-insert a deleted table, then put back the relationship list and the
    /// tables whose foreign keys still pointed at it.
    RestoreTable {
        table: Table,
        relationships: Vec<Relationship>,
        dependents: Vec<Table>,
    },
    UpdateTable {
        id: usize,
        values: TableUpdate,
    },
    /// Insert the field at its own id.
    AddField {
        table_id: usize,
        field: Field,
    },
    DeleteField(FieldRef),
    UpdateField {
        at: FieldRef,
        values: FieldUpdate,
    },
    /// Insert the relationship at its own id.
    AddRelationship(Relationship),
    DeleteRelationship(usize),
    UpdateRelationship {
        id: usize,
        values: RelationshipUpdate,
    },
    Link(LinkRequest),
    AddSubtypeChild {
        relationship_id: usize,
        child_table_id: usize,
    },
    RemoveSubtypeChild {
        relationship_id: usize,
        child_table_id: usize,
    },
    AddArea(Area),
    DeleteArea(usize),
    UpdateArea {
        id: usize,
        values: AreaUpdate,
    },
    AddNote(Note),
    DeleteNote(usize),
    UpdateNote {
        id: usize,
        values: NoteUpdate,
    },
    AddEnum(EnumType),
    DeleteEnum(usize),
    UpdateEnum {
        id: usize,
        values: EnumUpdate,
    },
    Move {
        element: Element,
        positions: Vec<(usize, Position)>,
    },
    Pan(Position),
    Restore(Preimage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub element: Element,
    pub message: String,
    pub id: Option<CommandId>,
    pub undo: Patch,
    pub redo: Patch,
}

impl Command {
    pub fn new(action: Action, element: Element, message: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            action,
            element,
            message: message.into(),
            id: None,
        }
    }

    fn coalesces_with(&self, next: &Command) -> bool {
        self.action == Action::Move
            && next.action == Action::Move
            && self.element == next.element
            && self.id.is_some()
            && self.id == next.id
    }

    fn duplicates(&self, next: &Command) -> bool {
        if next.id.is_some() && self.element == next.element && self.id == next.id {
            return true;
        }
        self.action == next.action && self.element == next.element && self.message == next.message
    }
}

pub struct CommandBuilder {
    action: Action,
    element: Element,
    message: String,
    id: Option<CommandId>,
}

impl CommandBuilder {
    pub fn id(mut self, id: CommandId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn patches(self, undo: Patch, redo: Patch) -> Command {
        Command {
            action: self.action,
            element: self.element,
            message: self.message,
            id: self.id,
            undo,
            redo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Recorded,
    Coalesced,
    Duplicate,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Command>,
    redo: VecDeque<Command>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records a structural command.
    ///
    /// Consecutive MOVEs of the same element(s) merge into the entry on top:
    /// its undo patch (where the drag started) stays, the redo patch (where it
    /// ended) is replaced. Otherwise a command repeating the top one's element
    /// and id, or its action/element/message, is dropped.
    pub fn push_undo(&mut self, command: Command) -> Pushed {
        if !command.action.is_structural() {
            return Pushed::Rejected;
        }

        if let Some(top) = self.undo.back_mut() {
            if top.coalesces_with(&command) {
                top.redo = command.redo;
                self.redo.clear();
                return Pushed::Coalesced;
            }
            if top.duplicates(&command) {
                return Pushed::Duplicate;
            }
        }

        self.push_raw(command);
        Pushed::Recorded
    }

    /// Records a command without filtering. Used for transient actions such as
    /// PAN.
    pub fn push_raw(&mut self, command: Command) {
        push_bounded(&mut self.undo, command, self.capacity);
        self.redo.clear();
    }

    pub(crate) fn take_undo(&mut self) -> Option<Command> {
        self.undo.pop_back()
    }

    pub(crate) fn take_redo(&mut self) -> Option<Command> {
        self.redo.pop_back()
    }

    /// Parks an undone command on the redo stack.
    pub(crate) fn undone(&mut self, command: Command) {
        push_bounded(&mut self.redo, command, self.capacity);
    }

    /// Puts a redone command back on the undo stack, keeping the redo stack.
    pub(crate) fn redone(&mut self, command: Command) {
        push_bounded(&mut self.undo, command, self.capacity);
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Oldest first.
    pub fn undo_stack(&self) -> impl Iterator<Item = &Command> {
        self.undo.iter()
    }

    pub fn redo_stack(&self) -> impl Iterator<Item = &Command> {
        self.redo.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn push_bounded(stack: &mut VecDeque<Command>, command: Command, capacity: usize) {
    stack.push_back(command);
    while stack.len() > capacity {
        stack.pop_front();
    }
}
