//! Read-only audit of the diagram's structural invariants.
//!
//! The editor primitives are the only write path, so a violation here is a
//! programming error. The editor logs what this finds; it never surfaces it to
//! the user.

use thiserror::Error;

use crate::model::{Diagram, FieldRef};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("{collection}[{position}] has id {id}")]
    SparseId {
        collection: &'static str,
        position: usize,
        id: usize,
    },
    #[error("table {table_id} field {position} has id {id}")]
    SparseFieldId {
        table_id: usize,
        position: usize,
        id: usize,
    },
    #[error("field {field:?} is primary but not `notNull` and `unique`")]
    LoosePrimaryKey { field: FieldRef },
    #[error("field {field:?} references missing field {target:?}")]
    DanglingForeignKey { field: FieldRef, target: FieldRef },
    #[error("relationship {id} references missing field {target:?}")]
    DanglingRelationship { id: usize, target: FieldRef },
}

pub fn audit(diagram: &Diagram) -> Vec<Violation> {
    let mut violations = Vec::new();

    sparse(&mut violations, "tables", diagram.tables.iter().map(|t| t.id));
    sparse(&mut violations, "relationships", diagram.relationships.iter().map(|r| r.id));
    sparse(&mut violations, "areas", diagram.areas.iter().map(|a| a.id));
    sparse(&mut violations, "notes", diagram.notes.iter().map(|n| n.id));
    sparse(&mut violations, "enums", diagram.enums.iter().map(|e| e.id));

    for (table_id, table) in diagram.tables.iter().enumerate() {
        for (position, field) in table.fields.iter().enumerate() {
            let at = FieldRef::new(table_id, position);
            if field.id != position {
                violations.push(Violation::SparseFieldId {
                    table_id,
                    position,
                    id: field.id,
                });
            }
            if field.primary && !(field.not_null && field.unique) {
                violations.push(Violation::LoosePrimaryKey { field: at });
            }
            if let Some(target) = field.foreign_key {
                if diagram.field(target).is_none() {
                    violations.push(Violation::DanglingForeignKey { field: at, target });
                }
            }
        }
    }

    for rel in &diagram.relationships {
        for target in std::iter::once(&rel.start).chain(rel.ends()) {
            if diagram.field(*target).is_none() {
                violations.push(Violation::DanglingRelationship {
                    id: rel.id,
                    target: *target,
                });
            }
        }
    }

    violations
}

fn sparse(
    violations: &mut Vec<Violation>,
    collection: &'static str,
    ids: impl Iterator<Item = usize>,
) {
    for (position, id) in ids.enumerate() {
        if id != position {
            violations.push(Violation::SparseId {
                collection,
                position,
                id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Relationship, Table};

    #[test]
    fn test_clean_diagram() {
        let mut diagram = Diagram::default();
        diagram
            .tables
            .push(Table::new("users").with_field(Field::primary_key("id", "INTEGER")));
        assert!(audit(&diagram).is_empty());
    }

    #[test]
    fn test_reports_each_violation() {
        let mut diagram = Diagram::default();
        let mut loose = Field::new("id", "INTEGER");
        loose.primary = true;
        loose.foreign_key = Some(FieldRef::new(3, 0));
        diagram.tables.push(Table {
            id: 1,
            ..Table::new("users").with_field(loose)
        });
        diagram.relationships.push(Relationship::new(
            "broken",
            FieldRef::new(0, 0),
            FieldRef::new(0, 9),
        ));

        let violations = audit(&diagram);
        assert_eq!(
            violations,
            vec![
                Violation::SparseId {
                    collection: "tables",
                    position: 0,
                    id: 1
                },
                Violation::LoosePrimaryKey {
                    field: FieldRef::new(0, 0)
                },
                Violation::DanglingForeignKey {
                    field: FieldRef::new(0, 0),
                    target: FieldRef::new(3, 0)
                },
                Violation::DanglingRelationship {
                    id: 0,
                    target: FieldRef::new(0, 9)
                },
            ]
        );
    }
}
