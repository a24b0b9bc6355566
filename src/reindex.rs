//! Dense-id maintenance.
//!
//! Ids are positions. Removing element `k` from a collection renumbers the
//! survivors and decrements every reference greater than `k`; inserting at
//! `k` increments every reference `>= k`. The table and field helpers below
//! rewrite the cross-references held by relationships and foreign keys.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{
    Area, Diagram, EnumType, Field, FieldRef, Index, Note, Relationship, RelationshipTarget,
    Table,
};

pub trait Identified {
    fn id(&self) -> usize;
    fn set_id(&mut self, id: usize);
}

macro_rules! identified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identified for $ty {
                fn id(&self) -> usize {
                    self.id
                }

                fn set_id(&mut self, id: usize) {
                    self.id = id;
                }
            }
        )*
    };
}

identified!(Table, Field, Index, Relationship, Area, Note, EnumType);

/// Rewrites `items[i].id = i`.
pub fn renumber<T: Identified>(items: &mut [T]) {
    for (i, item) in items.iter_mut().enumerate() {
        item.set_id(i);
    }
}

/// Appends `item`, assigning the next id.
pub fn push<T: Identified>(items: &mut Vec<T>, mut item: T) -> usize {
    let id = items.len();
    item.set_id(id);
    items.push(item);
    id
}

/// Inserts `item` at the position named by its own id (clamped to the end).
pub fn insert<T: Identified>(items: &mut Vec<T>, item: T) -> usize {
    let at = item.id().min(items.len());
    items.insert(at, item);
    renumber(items);
    at
}

pub fn remove<T: Identified>(items: &mut Vec<T>, id: usize) -> Option<T> {
    if id >= items.len() {
        return None;
    }
    let item = items.remove(id);
    renumber(items);
    Some(item)
}

/// Where a reference to `value` lands once position `removed` is gone.
/// `None` when it pointed at the removed element itself.
pub fn shift_down(value: usize, removed: usize) -> Option<usize> {
    match value.cmp(&removed) {
        std::cmp::Ordering::Less => Some(value),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(value - 1),
    }
}

/// Where a reference to `value` lands once an element is inserted at
/// `inserted` into a collection of `len`. References at or past `len` were
/// already dangling and stay put.
pub fn shift_up(value: usize, inserted: usize, len: usize) -> usize {
    if (inserted..len).contains(&value) { value + 1 } else { value }
}

/// Removes table `id` and renumbers. Relationships touching the table must be
/// dealt with beforehand; the remaining ones and every foreign key pointing
/// past `id` are decremented. Foreign keys pointing at `id` itself, or at no
/// table at all, are left.
pub fn remove_table(diagram: &mut Diagram, id: usize) -> Option<Table> {
    let len = diagram.tables.len();
    let table = remove(&mut diagram.tables, id)?;

    for rel in &mut diagram.relationships {
        if let Some(t) = shift_down(rel.start.table_id, id) {
            rel.start.table_id = t;
        }
        for end in rel.target.ends_mut() {
            if let Some(t) = shift_down(end.table_id, id) {
                end.table_id = t;
            }
        }
    }

    for field in diagram.tables.iter_mut().flat_map(|t| t.fields.iter_mut()) {
        if let Some(fk) = field.foreign_key.as_mut() {
            if fk.table_id > id && fk.table_id < len {
                fk.table_id -= 1;
            }
        }
    }

    Some(table)
}

/// Inserts `table` at its own id, shifting references up.
pub fn insert_table(diagram: &mut Diagram, table: Table) -> usize {
    let len = diagram.tables.len();
    let at = table.id.min(len);

    for rel in &mut diagram.relationships {
        rel.start.table_id = shift_up(rel.start.table_id, at, len);
        for end in rel.target.ends_mut() {
            end.table_id = shift_up(end.table_id, at, len);
        }
    }

    for field in diagram.tables.iter_mut().flat_map(|t| t.fields.iter_mut()) {
        if let Some(fk) = field.foreign_key.as_mut() {
            fk.table_id = shift_up(fk.table_id, at, len);
        }
    }

    insert(&mut diagram.tables, table)
}

/// Inserts `field` into table `table_id` at the field's own id.
pub fn insert_field(diagram: &mut Diagram, table_id: usize, field: Field) -> Option<usize> {
    if table_id >= diagram.tables.len() {
        return None;
    }
    let len = diagram.tables[table_id].fields.len();
    let at = field.id.min(len);

    for rel in &mut diagram.relationships {
        if rel.start.table_id == table_id {
            rel.start.field_id = shift_up(rel.start.field_id, at, len);
        }
        for end in rel.target.ends_mut() {
            if end.table_id == table_id {
                end.field_id = shift_up(end.field_id, at, len);
            }
        }
    }

    for other in diagram.tables.iter_mut().flat_map(|t| t.fields.iter_mut()) {
        if let Some(fk) = other.foreign_key.as_mut() {
            if fk.table_id == table_id {
                fk.field_id = shift_up(fk.field_id, at, len);
            }
        }
    }

    Some(insert(&mut diagram.tables[table_id].fields, field))
}

/// Removes the given fields from one table and rewrites every reference into
/// that table's fields.
///
/// A relationship whose start or single end lands on a removed field is
/// dropped; a subtype child landing on one is detached. Foreign keys elsewhere
/// that pointed at a removed field are left as they were. Returns the number
/// of relationships dropped.
pub fn remove_fields(diagram: &mut Diagram, table_id: usize, ids: &BTreeSet<usize>) -> usize {
    let Some(table) = diagram.tables.get_mut(table_id) else {
        debug!(table_id, "field removal skipped: table not found");
        return 0;
    };
    if ids.is_empty() {
        return 0;
    }

    let mut next = 0;
    let mapping: Vec<Option<usize>> = (0..table.fields.len())
        .map(|old| {
            if ids.contains(&old) {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect();
    let remap = |field_id: usize| mapping.get(field_id).copied().unwrap_or(Some(field_id));

    let removed_names: Vec<String> = table
        .fields
        .iter()
        .filter(|f| ids.contains(&f.id))
        .map(|f| f.name.clone())
        .collect();
    table.fields.retain(|f| !ids.contains(&f.id));
    renumber(&mut table.fields);
    // Indices name their columns, so a name some survivor still carries stays.
    let gone: Vec<String> = removed_names
        .into_iter()
        .filter(|name| !table.fields.iter().any(|f| f.name == *name))
        .collect();
    for index in &mut table.indices {
        index.fields.retain(|name| !gone.contains(name));
    }

    let before = diagram.relationships.len();
    diagram.relationships.retain_mut(|rel| remap_relationship(rel, table_id, &remap));
    renumber(&mut diagram.relationships);
    let dropped = before - diagram.relationships.len();

    for field in diagram.tables.iter_mut().flat_map(|t| t.fields.iter_mut()) {
        if let Some(fk) = field.foreign_key.as_mut() {
            if fk.table_id == table_id {
                if let Some(f) = remap(fk.field_id) {
                    fk.field_id = f;
                }
            }
        }
    }

    if dropped > 0 {
        debug!(table_id, dropped, "relationships dropped with their fields");
    }
    dropped
}

/// Returns false when the relationship lost its start or its only end.
fn remap_relationship(
    rel: &mut Relationship,
    table_id: usize,
    remap: &impl Fn(usize) -> Option<usize>,
) -> bool {
    if rel.start.table_id == table_id {
        match remap(rel.start.field_id) {
            Some(f) => rel.start.field_id = f,
            None => return false,
        }
    }

    match &mut rel.target {
        RelationshipTarget::Single(end) => {
            if end.table_id == table_id {
                match remap(end.field_id) {
                    Some(f) => end.field_id = f,
                    None => return false,
                }
            }
        }
        RelationshipTarget::Subtype(children) => {
            let len = children.len();
            let kept: Vec<FieldRef> = children
                .iter()
                .filter_map(|c| {
                    if c.table_id != table_id {
                        return Some(*c);
                    }
                    remap(c.field_id).map(|f| FieldRef::new(c.table_id, f))
                })
                .collect();
            rel.target = if kept.len() == len {
                RelationshipTarget::Subtype(kept)
            } else {
                RelationshipTarget::collapse(kept)
            };
        }
    }
    true
}
