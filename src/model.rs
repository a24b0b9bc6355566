//! Diagram entities and the partial-update payloads used to edit them.
//!
//! Every collection is ordered and its ids are positions: `tables[i].id == i`,
//! `table.fields[j].id == j`, and so on. The [`crate::reindex`] module keeps
//! that true across inserts and removals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A reference to one field of one table, by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    pub table_id: usize,
    pub field_id: usize,
}

impl FieldRef {
    pub fn new(table_id: usize, field_id: usize) -> Self {
        Self { table_id, field_id }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_id, self.field_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Canvas viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub pan: Position,
    pub zoom: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pan: Position::default(),
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "FieldDoc", into = "FieldDoc")]
pub struct Field {
    pub id: usize,
    pub name: String,
    pub typ: String,
    pub size: String,
    pub primary: bool,
    pub unique: bool,
    pub not_null: bool,
    pub increment: bool,
    pub default: String,
    pub check: String,
    pub comment: String,
    /// Present iff the field is a foreign key column.
    pub foreign_key: Option<FieldRef>,
}

/// Document shape of a field. `foreignK` is written from `foreignKey` and
/// ignored on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FieldDoc {
    id: usize,
    name: String,
    #[serde(rename = "type")]
    typ: String,
    size: String,
    primary: bool,
    unique: bool,
    not_null: bool,
    increment: bool,
    default: String,
    check: String,
    comment: String,
    foreign_k: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    foreign_key: Option<FieldRef>,
}

impl From<FieldDoc> for Field {
    fn from(doc: FieldDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            typ: doc.typ,
            size: doc.size,
            primary: doc.primary,
            unique: doc.unique,
            not_null: doc.not_null,
            increment: doc.increment,
            default: doc.default,
            check: doc.check,
            comment: doc.comment,
            foreign_key: doc.foreign_key,
        }
    }
}

impl From<Field> for FieldDoc {
    fn from(field: Field) -> Self {
        Self {
            foreign_k: field.foreign_k(),
            id: field.id,
            name: field.name,
            typ: field.typ,
            size: field.size,
            primary: field.primary,
            unique: field.unique,
            not_null: field.not_null,
            increment: field.increment,
            default: field.default,
            check: field.check,
            comment: field.comment,
            foreign_key: field.foreign_key,
        }
    }
}

impl Field {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            ..Self::default()
        }
    }

    /// A primary key column: `primary`, `notNull` and `unique` all set.
    pub fn primary_key(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            primary: true,
            not_null: true,
            unique: true,
            ..Self::new(name, typ)
        }
    }

    pub fn foreign_k(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Whether this field may be the referenced side of a new relationship.
    pub fn is_key_eligible(&self) -> bool {
        self.primary || (self.not_null && self.unique)
    }

    /// Whether this field is a foreign key pointing into `table_id`.
    pub fn references_table(&self, table_id: usize) -> bool {
        self.foreign_key.is_some_and(|fk| fk.table_id == table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Index {
    pub id: usize,
    pub name: String,
    pub unique: bool,
    /// Column names, in key order.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    pub id: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub fields: Vec<Field>,
    pub indices: Vec<Index>,
    pub comment: String,
    pub color: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        let id = self.fields.len();
        self.fields.push(Field { id, ..field });
        self
    }

    pub fn field(&self, id: usize) -> Option<&Field> {
        self.fields.get(id)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary)
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    OneToOne,
    #[default]
    OneToMany,
    Subtype,
}

/// Participation of the child side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    ZeroOrOne,
    #[default]
    Many,
    OneOrMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtypeRestriction {
    #[default]
    DisjointTotal,
    DisjointPartial,
    OverlappingTotal,
    OverlappingPartial,
}

/// The child side of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipTarget {
    Single(FieldRef),
    /// Supertype hierarchy with its subtype children, in attach order.
    Subtype(Vec<FieldRef>),
}

/// A subtype hierarchy with no children yet.
impl Default for RelationshipTarget {
    fn default() -> Self {
        Self::Subtype(Vec::new())
    }
}

impl RelationshipTarget {
    pub fn ends(&self) -> &[FieldRef] {
        match self {
            Self::Single(end) => std::slice::from_ref(end),
            Self::Subtype(children) => children,
        }
    }

    pub fn ends_mut(&mut self) -> &mut [FieldRef] {
        match self {
            Self::Single(end) => std::slice::from_mut(end),
            Self::Subtype(children) => children,
        }
    }

    pub fn has_table(&self, table_id: usize) -> bool {
        self.ends().iter().any(|e| e.table_id == table_id)
    }

    /// Attach another child. Always yields the array form.
    pub fn with_child(self, child: FieldRef) -> Self {
        let mut children = match self {
            Self::Single(end) => vec![end],
            Self::Subtype(children) => children,
        };
        children.push(child);
        Self::Subtype(children)
    }

    /// Detach every child living in `table_id`. One survivor collapses to the
    /// scalar form; none leaves an empty array.
    pub fn without_table(self, table_id: usize) -> Self {
        let mut children = match self {
            Self::Single(end) => vec![end],
            Self::Subtype(children) => children,
        };
        children.retain(|c| c.table_id != table_id);
        Self::collapse(children)
    }

    pub(crate) fn collapse(mut children: Vec<FieldRef>) -> Self {
        if children.len() == 1 {
            Self::Single(children.remove(0))
        } else {
            Self::Subtype(children)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RelationshipDoc", into = "RelationshipDoc")]
pub struct Relationship {
    pub id: usize,
    pub name: String,
    pub relationship_type: RelationshipType,
    pub cardinality: Cardinality,
    pub update_constraint: ReferentialAction,
    pub delete_constraint: ReferentialAction,
    /// The referenced (parent) side.
    pub start: FieldRef,
    pub target: RelationshipTarget,
    pub subtype_restriction: Option<SubtypeRestriction>,
}

impl Relationship {
    pub fn new(name: impl Into<String>, start: FieldRef, end: FieldRef) -> Self {
        Self {
            id: 0,
            name: name.into(),
            relationship_type: RelationshipType::default(),
            cardinality: Cardinality::default(),
            update_constraint: ReferentialAction::default(),
            delete_constraint: ReferentialAction::default(),
            start,
            target: RelationshipTarget::Single(end),
            subtype_restriction: None,
        }
    }

    pub fn ends(&self) -> &[FieldRef] {
        self.target.ends()
    }

    pub fn touches_table(&self, table_id: usize) -> bool {
        self.start.table_id == table_id || self.target.has_table(table_id)
    }

    pub fn is_subtype(&self) -> bool {
        self.relationship_type == RelationshipType::Subtype
    }
}

/// Flat document shape: `endTableId`/`endFieldId` for a single child,
/// `endTableIds`/`endFieldIds` for a subtype hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipDoc {
    #[serde(default)]
    id: usize,
    #[serde(default)]
    name: String,
    #[serde(default)]
    relationship_type: RelationshipType,
    #[serde(default)]
    cardinality: Cardinality,
    #[serde(default)]
    update_constraint: ReferentialAction,
    #[serde(default)]
    delete_constraint: ReferentialAction,
    start_table_id: usize,
    start_field_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_table_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_field_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_table_ids: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_field_ids: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subtype_restriction: Option<SubtypeRestriction>,
}

impl TryFrom<RelationshipDoc> for Relationship {
    type Error = String;

    fn try_from(doc: RelationshipDoc) -> Result<Self, Self::Error> {
        let target = match (doc.end_table_ids, doc.end_field_ids) {
            (Some(tables), Some(fields)) => {
                if tables.len() != fields.len() {
                    return Err(format!(
                        "relationship {}: endTableIds and endFieldIds differ in length",
                        doc.id
                    ));
                }
                RelationshipTarget::Subtype(
                    tables
                        .into_iter()
                        .zip(fields)
                        .map(|(t, f)| FieldRef::new(t, f))
                        .collect(),
                )
            }
            _ => match (doc.end_table_id, doc.end_field_id) {
                (Some(t), Some(f)) => RelationshipTarget::Single(FieldRef::new(t, f)),
                _ => return Err(format!("relationship {}: missing end table/field", doc.id)),
            },
        };

        Ok(Self {
            id: doc.id,
            name: doc.name,
            relationship_type: doc.relationship_type,
            cardinality: doc.cardinality,
            update_constraint: doc.update_constraint,
            delete_constraint: doc.delete_constraint,
            start: FieldRef::new(doc.start_table_id, doc.start_field_id),
            target,
            subtype_restriction: doc.subtype_restriction,
        })
    }
}

impl From<Relationship> for RelationshipDoc {
    fn from(rel: Relationship) -> Self {
        let (end_table_id, end_field_id, end_table_ids, end_field_ids) = match rel.target {
            RelationshipTarget::Single(end) => (Some(end.table_id), Some(end.field_id), None, None),
            RelationshipTarget::Subtype(children) => (
                None,
                None,
                Some(children.iter().map(|c| c.table_id).collect()),
                Some(children.iter().map(|c| c.field_id).collect()),
            ),
        };

        Self {
            id: rel.id,
            name: rel.name,
            relationship_type: rel.relationship_type,
            cardinality: rel.cardinality,
            update_constraint: rel.update_constraint,
            delete_constraint: rel.delete_constraint,
            start_table_id: rel.start.table_id,
            start_field_id: rel.start.field_id,
            end_table_id,
            end_field_id,
            end_table_ids,
            end_field_ids,
            subtype_restriction: rel.subtype_restriction,
        }
    }
}

/// Drag-to-link request: the referenced key field and the table receiving the
/// synthesized foreign key columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub start: FieldRef,
    pub end_table_id: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Area {
    pub id: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    pub id: usize,
    pub title: String,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumType {
    pub id: usize,
    pub name: String,
    pub values: Vec<String>,
}

/// The whole editable document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagram {
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub areas: Vec<Area>,
    pub notes: Vec<Note>,
    pub enums: Vec<EnumType>,
    pub transform: Transform,
}

impl Diagram {
    pub fn table(&self, id: usize) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn field(&self, at: FieldRef) -> Option<&Field> {
        self.tables.get(at.table_id)?.fields.get(at.field_id)
    }

    pub fn relationship(&self, id: usize) -> Option<&Relationship> {
        self.relationships.get(id)
    }
}

// Partial updates. `None` leaves the attribute alone; `inverse` captures the
// current values of exactly the attributes the update would touch.

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<Index>>,
}

impl TableUpdate {
    pub fn apply(&self, table: &mut Table) {
        if let Some(name) = &self.name {
            table.name = name.clone();
        }
        if let Some(comment) = &self.comment {
            table.comment = comment.clone();
        }
        if let Some(color) = &self.color {
            table.color = color.clone();
        }
        if let Some(indices) = &self.indices {
            table.indices = indices.clone();
            crate::reindex::renumber(&mut table.indices);
        }
    }

    pub fn inverse(&self, table: &Table) -> Self {
        Self {
            name: self.name.as_ref().map(|_| table.name.clone()),
            comment: self.comment.as_ref().map(|_| table.comment.clone()),
            color: self.color.as_ref().map(|_| table.color.clone()),
            indices: self.indices.as_ref().map(|_| table.indices.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FieldUpdate {
    pub fn apply(&self, field: &mut Field) {
        if let Some(name) = &self.name {
            field.name = name.clone();
        }
        if let Some(typ) = &self.typ {
            field.typ = typ.clone();
        }
        if let Some(size) = &self.size {
            field.size = size.clone();
        }
        if let Some(primary) = self.primary {
            field.primary = primary;
        }
        if let Some(unique) = self.unique {
            field.unique = unique;
        }
        if let Some(not_null) = self.not_null {
            field.not_null = not_null;
        }
        if let Some(increment) = self.increment {
            field.increment = increment;
        }
        if let Some(default) = &self.default {
            field.default = default.clone();
        }
        if let Some(check) = &self.check {
            field.check = check.clone();
        }
        if let Some(comment) = &self.comment {
            field.comment = comment.clone();
        }
        if field.primary {
            field.not_null = true;
            field.unique = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_constraint: Option<ReferentialAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_constraint: Option<ReferentialAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype_restriction: Option<SubtypeRestriction>,
}

impl RelationshipUpdate {
    pub fn apply(&self, rel: &mut Relationship) {
        if let Some(name) = &self.name {
            rel.name = name.clone();
        }
        if let Some(relationship_type) = self.relationship_type {
            rel.relationship_type = relationship_type;
        }
        if let Some(cardinality) = self.cardinality {
            rel.cardinality = cardinality;
        }
        if let Some(action) = self.update_constraint {
            rel.update_constraint = action;
        }
        if let Some(action) = self.delete_constraint {
            rel.delete_constraint = action;
        }
        if let Some(restriction) = self.subtype_restriction {
            rel.subtype_restriction = Some(restriction);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl AreaUpdate {
    pub fn apply(&self, area: &mut Area) {
        if let Some(name) = &self.name {
            area.name = name.clone();
        }
        if let Some(width) = self.width {
            area.width = width;
        }
        if let Some(height) = self.height {
            area.height = height;
        }
        if let Some(color) = &self.color {
            area.color = color.clone();
        }
    }

    pub fn inverse(&self, area: &Area) -> Self {
        Self {
            name: self.name.as_ref().map(|_| area.name.clone()),
            width: self.width.map(|_| area.width),
            height: self.height.map(|_| area.height),
            color: self.color.as_ref().map(|_| area.color.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NoteUpdate {
    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(height) = self.height {
            note.height = height;
        }
        if let Some(color) = &self.color {
            note.color = color.clone();
        }
    }

    pub fn inverse(&self, note: &Note) -> Self {
        Self {
            title: self.title.as_ref().map(|_| note.title.clone()),
            content: self.content.as_ref().map(|_| note.content.clone()),
            height: self.height.map(|_| note.height),
            color: self.color.as_ref().map(|_| note.color.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl EnumUpdate {
    pub fn apply(&self, e: &mut EnumType) {
        if let Some(name) = &self.name {
            e.name = name.clone();
        }
        if let Some(values) = &self.values {
            e.values = values.clone();
        }
    }

    pub fn inverse(&self, e: &EnumType) -> Self {
        Self {
            name: self.name.as_ref().map(|_| e.name.clone()),
            values: self.values.as_ref().map(|_| e.values.clone()),
        }
    }
}
