use super::Editor;
use crate::history::Element;
use crate::integrity::{audit, Violation};
use crate::model::{
    Cardinality, Field, FieldRef, LinkRequest, Position, RelationshipType, RelationshipUpdate,
    Table, TableUpdate,
};

fn link(editor: &mut Editor, start: FieldRef, end_table_id: usize) -> usize {
    editor
        .link(LinkRequest { start, end_table_id }, true)
        .unwrap()
}

fn keyed(name: &str) -> Table {
    Table::new(name).with_field(Field::primary_key("id", "INTEGER"))
}

#[test]
fn test_link_then_undo() {
    let mut editor = Editor::new();
    editor.add_table(Some(keyed("A")), true);
    editor.add_table(Some(Table::new("B")), true);
    let id = link(&mut editor, FieldRef::new(0, 0), 1);

    let d = editor.diagram();
    let b = &d.tables[1];
    assert_eq!(b.fields.len(), 1);
    assert_eq!(b.fields[0].name, "A_id");
    assert!(b.fields[0].not_null && b.fields[0].foreign_k());
    assert_eq!(b.fields[0].foreign_key, Some(FieldRef::new(0, 0)));

    let rel = &d.relationships[id];
    assert_eq!(rel.start, FieldRef::new(0, 0));
    assert_eq!(rel.ends(), &[FieldRef::new(1, 0)]);
    assert_eq!(rel.name, "A_id");

    editor.undo();
    assert!(editor.diagram().tables[1].fields.is_empty());
    assert!(editor.diagram().relationships.is_empty());
}

#[test]
fn test_delete_parent_keeps_foreign_key_column() {
    let mut editor = Editor::new();
    editor.add_table(Some(keyed("A")), true);
    editor.add_table(Some(Table::new("B")), true);
    link(&mut editor, FieldRef::new(0, 0), 1);
    let linked = editor.diagram().clone();

    editor.delete_table(0, true).unwrap();
    let d = editor.diagram();
    assert!(d.relationships.is_empty());
    assert_eq!(d.tables.len(), 1);
    assert_eq!(d.tables[0].name, "B");
    assert_eq!(d.tables[0].fields[0].name, "A_id");
    assert_eq!(d.tables[0].fields[0].foreign_key, Some(FieldRef::new(0, 0)));

    editor.undo();
    assert_eq!(editor.diagram(), &linked);
}

#[test]
fn test_composite_key_delete_cascades_to_children() {
    let mut editor = Editor::new();
    editor.add_table(
        Some(
            Table::new("P")
                .with_field(Field::primary_key("id1", "INTEGER"))
                .with_field(Field::primary_key("id2", "INTEGER")),
        ),
        true,
    );
    editor.add_table(Some(keyed("C")), true);
    editor.add_table(Some(keyed("D")), true);
    link(&mut editor, FieldRef::new(0, 0), 1);
    link(&mut editor, FieldRef::new(0, 1), 2);
    editor
        .add_field(1, Some(Field::new("tail", "TEXT")), true)
        .unwrap();

    let c = &editor.diagram().tables[1];
    let names: Vec<_> = c.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["id", "P_id1", "P_id2", "tail"]);
    let before = editor.diagram().clone();

    editor.delete_field(FieldRef::new(0, 0), true).unwrap();

    let d = editor.diagram();
    assert!(d.relationships.is_empty());
    assert_eq!(d.tables[0].fields.len(), 1);
    assert_eq!(d.tables[0].fields[0].name, "id2");
    assert_eq!(d.tables[0].fields[0].id, 0);

    let c: Vec<_> = d.tables[1].fields.iter().map(|f| (f.id, f.name.as_str())).collect();
    assert_eq!(c, [(0, "id"), (1, "tail")]);
    let d_fields: Vec<_> = d.tables[2].fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(d_fields, ["id"]);
    assert!(audit(d).is_empty());

    editor.undo();
    assert_eq!(editor.diagram(), &before);
}

#[test]
fn test_subtype_children_switch_document_shape() {
    let mut editor = Editor::new();
    for name in ["person", "employee", "customer"] {
        editor.add_table(Some(keyed(name)), true);
    }
    let rel = link(&mut editor, FieldRef::new(0, 0), 1);
    editor
        .update_relationship(
            rel,
            RelationshipUpdate {
                relationship_type: Some(RelationshipType::Subtype),
                ..RelationshipUpdate::default()
            },
            true,
        )
        .unwrap();
    assert!(editor.diagram().tables[1].fields[1].primary);

    editor.add_child_to_subtype(rel, 2, true).unwrap();
    let doc = serde_json::to_value(&editor.diagram().relationships[rel]).unwrap();
    assert_eq!(doc["endTableIds"], serde_json::json!([1, 2]));
    assert_eq!(doc["endFieldIds"], serde_json::json!([1, 0]));
    assert!(doc.get("endTableId").is_none());

    editor.remove_child_from_subtype(rel, 1, true).unwrap();
    let doc = serde_json::to_value(&editor.diagram().relationships[rel]).unwrap();
    assert_eq!(doc["endTableId"], 2);
    assert_eq!(doc["endFieldId"], 0);
    assert!(doc.get("endTableIds").is_none());
}

#[test]
fn test_delete_keeps_later_references_valid() {
    let mut editor = Editor::new();
    for name in ["a", "b", "c", "d"] {
        editor.add_table(Some(keyed(name)), true);
    }
    link(&mut editor, FieldRef::new(2, 0), 3);
    editor.delete_table(1, true).unwrap();

    let d = editor.diagram();
    let rel = &d.relationships[0];
    assert_eq!(rel.start, FieldRef::new(1, 0));
    assert_eq!(rel.ends(), &[FieldRef::new(2, 1)]);
    assert_eq!(d.tables[2].fields[1].foreign_key, Some(FieldRef::new(1, 0)));
    assert!(audit(d).is_empty());

    editor.delete_relationship(0, true).unwrap();
    assert_eq!(editor.diagram().tables[2].fields.len(), 1);
}

#[test]
fn test_new_command_clears_redo() {
    let mut editor = Editor::new();
    editor.add_table(None, true);
    editor.add_table(None, true);
    editor.undo();
    assert!(editor.history().can_redo());

    editor
        .move_elements(Element::Table, &[(0, Position::new(1.0, 1.0))], true)
        .unwrap();
    assert!(!editor.history().can_redo());
    assert_eq!(editor.diagram().tables.len(), 1);
}

#[test]
fn test_load_renumbers_and_clears_history() {
    let mut editor = Editor::new();
    editor.add_table(None, true);

    let mut diagram = editor.diagram().clone();
    diagram.tables[0].id = 7;
    diagram.tables[0].fields[0].id = 3;
    editor.load(diagram);

    assert_eq!(editor.diagram().tables[0].id, 0);
    assert_eq!(editor.diagram().tables[0].fields[0].id, 0);
    assert!(!editor.history().can_undo());
}

#[test]
fn test_same_named_relationships_edit_separately() {
    let mut editor = Editor::new();
    editor.add_table(Some(keyed("A")), true);
    editor.add_table(Some(keyed("B")), true);
    editor.add_table(Some(keyed("C")), true);
    let first = link(&mut editor, FieldRef::new(0, 0), 1);
    let second = link(&mut editor, FieldRef::new(0, 0), 2);
    assert_eq!(editor.diagram().relationships[first].name, "A_id");
    assert_eq!(editor.diagram().relationships[second].name, "A_id");

    let one = RelationshipUpdate {
        cardinality: Some(Cardinality::One),
        ..RelationshipUpdate::default()
    };
    editor.update_relationship(first, one.clone(), true).unwrap();
    editor.update_relationship(second, one, true).unwrap();
    assert_eq!(editor.history().undo_len(), 7);
    let after = editor.diagram().clone();

    editor.undo();
    let rels = &editor.diagram().relationships;
    assert_eq!(rels[first].cardinality, Cardinality::One);
    assert_eq!(rels[second].cardinality, Cardinality::Many);

    editor.redo();
    assert_eq!(editor.diagram(), &after);
}

#[test]
fn test_deleting_twins_at_same_position_records_both() {
    let mut editor = Editor::new();
    editor.add_table(Some(Table::new("x")), true);
    editor.add_table(Some(Table::new("x")), true);
    editor.delete_table(0, true).unwrap();
    editor.delete_table(0, true).unwrap();
    assert_eq!(editor.history().undo_len(), 4);

    editor.undo();
    editor.undo();
    assert_eq!(editor.diagram().tables.len(), 2);
    editor.redo();
    editor.redo();
    assert!(editor.diagram().tables.is_empty());
}

#[test]
fn test_repeated_edit_is_one_step() {
    let mut editor = Editor::new();
    editor.add_table(Some(Table::new("x")), true);
    let comment = TableUpdate {
        comment: Some("audit log".into()),
        ..TableUpdate::default()
    };
    editor.update_table(0, comment.clone(), true).unwrap();
    editor.update_table(0, comment, true).unwrap();
    assert_eq!(editor.history().undo_len(), 2);

    editor.undo();
    assert_eq!(editor.diagram().tables[0].comment, "");
}

mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::FieldUpdate;

    const TABLE_NAMES: [&str; 2] = ["a", "b"];
    const FIELD_NAMES: [&str; 2] = ["k", "f"];

    #[derive(Debug, Clone)]
    enum Op {
        AddTable(usize),
        AddField(usize, usize),
        DeleteTable(usize),
        DeleteField(usize, usize),
        Link(usize, usize),
        DeleteRelationship(usize),
        ToggleNotNull(usize, usize),
        Promote(usize, usize),
        RenameTable(usize, usize),
        RenameField(usize, usize, usize),
        SetCardinality(usize, bool),
        ToSubtype(usize),
        FromSubtype(usize),
        AddChild(usize, usize),
        RemoveChild(usize, usize),
        ResetName(usize),
        Move(usize, i32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0..2usize).prop_map(Op::AddTable),
            2 => (0..8usize, 0..2usize).prop_map(|(t, n)| Op::AddField(t, n)),
            1 => (0..8usize).prop_map(Op::DeleteTable),
            1 => (0..8usize, 0..6usize).prop_map(|(t, f)| Op::DeleteField(t, f)),
            3 => (0..8usize, 0..8usize).prop_map(|(p, c)| Op::Link(p, c)),
            1 => (0..8usize).prop_map(Op::DeleteRelationship),
            1 => (0..8usize, 0..6usize).prop_map(|(t, f)| Op::ToggleNotNull(t, f)),
            1 => (0..8usize, 0..6usize).prop_map(|(t, f)| Op::Promote(t, f)),
            1 => (0..8usize, 0..2usize).prop_map(|(t, n)| Op::RenameTable(t, n)),
            1 => (0..8usize, 0..6usize, 0..2usize).prop_map(|(t, f, n)| Op::RenameField(t, f, n)),
            1 => (0..8usize, any::<bool>()).prop_map(|(r, one)| Op::SetCardinality(r, one)),
            1 => (0..8usize).prop_map(Op::ToSubtype),
            1 => (0..8usize).prop_map(Op::FromSubtype),
            1 => (0..8usize, 0..8usize).prop_map(|(r, t)| Op::AddChild(r, t)),
            1 => (0..8usize, 0..8usize).prop_map(|(r, t)| Op::RemoveChild(r, t)),
            1 => (0..8usize).prop_map(Op::ResetName),
            1 => (0..8usize, -50..50i32).prop_map(|(t, p)| Op::Move(t, p)),
        ]
    }

    fn field_at(editor: &Editor, t: usize, f: usize) -> Option<FieldRef> {
        let tables = &editor.diagram().tables;
        let table = tables.get(t % tables.len().max(1))?;
        let len = table.fields.len();
        (len > 0).then(|| FieldRef::new(table.id, f % len))
    }

    /// Table and field names come from tiny pools, so tables, columns and
    /// default relationship names repeat throughout a run.
    fn run(editor: &mut Editor, ops: &[Op]) {
        for (n, op) in ops.iter().enumerate() {
            let tables = editor.diagram().tables.len();
            let relationships = editor.diagram().relationships.len();
            match *op {
                Op::AddTable(name) => {
                    let key = Field::primary_key(FIELD_NAMES[0], "INTEGER");
                    editor.add_table(Some(Table::new(TABLE_NAMES[name]).with_field(key)), true);
                }
                Op::AddField(t, name) if tables > 0 => {
                    let field = Field::new(FIELD_NAMES[name], "TEXT");
                    let _ = editor.add_field(t % tables, Some(field), true);
                }
                Op::DeleteTable(t) if tables > 0 => {
                    let _ = editor.delete_table(t % tables, true);
                }
                Op::DeleteField(t, f) if tables > 0 => {
                    if let Some(at) = field_at(editor, t, f) {
                        let _ = editor.delete_field(at, true);
                    }
                }
                Op::Link(p, c) if tables > 1 => {
                    let (p, c) = (p % tables, c % tables);
                    if p != c && !editor.diagram().tables[p].fields.is_empty() {
                        let request = LinkRequest {
                            start: FieldRef::new(p, 0),
                            end_table_id: c,
                        };
                        let _ = editor.link(request, true);
                    }
                }
                Op::DeleteRelationship(r) if relationships > 0 => {
                    let _ = editor.delete_relationship(r % relationships, true);
                }
                Op::ToggleNotNull(t, f) if tables > 0 => {
                    if let Some(at) = field_at(editor, t, f) {
                        let not_null = editor.diagram().field(at).is_some_and(|f| f.not_null);
                        let values = FieldUpdate {
                            not_null: Some(!not_null),
                            ..FieldUpdate::default()
                        };
                        let _ = editor.update_field(at, values, true);
                    }
                }
                Op::Promote(t, f) if tables > 0 => {
                    if let Some(at) = field_at(editor, t, f) {
                        let values = FieldUpdate {
                            primary: Some(true),
                            ..FieldUpdate::default()
                        };
                        let _ = editor.update_field(at, values, true);
                    }
                }
                Op::RenameTable(t, name) if tables > 0 => {
                    let values = TableUpdate {
                        name: Some(TABLE_NAMES[name].to_string()),
                        ..TableUpdate::default()
                    };
                    let _ = editor.update_table(t % tables, values, true);
                }
                Op::RenameField(t, f, name) if tables > 0 => {
                    if let Some(at) = field_at(editor, t, f) {
                        let values = FieldUpdate {
                            name: Some(FIELD_NAMES[name].to_string()),
                            ..FieldUpdate::default()
                        };
                        let _ = editor.update_field(at, values, true);
                    }
                }
                Op::SetCardinality(r, one) if relationships > 0 => {
                    let values = RelationshipUpdate {
                        cardinality: Some(if one { Cardinality::One } else { Cardinality::Many }),
                        ..RelationshipUpdate::default()
                    };
                    let _ = editor.update_relationship(r % relationships, values, true);
                }
                Op::ToSubtype(r) if relationships > 0 => {
                    let values = RelationshipUpdate {
                        relationship_type: Some(RelationshipType::Subtype),
                        ..RelationshipUpdate::default()
                    };
                    let _ = editor.update_relationship(r % relationships, values, true);
                }
                Op::FromSubtype(r) if relationships > 0 => {
                    let values = RelationshipUpdate {
                        relationship_type: Some(RelationshipType::OneToMany),
                        ..RelationshipUpdate::default()
                    };
                    let _ = editor.update_relationship(r % relationships, values, true);
                }
                Op::AddChild(r, t) if relationships > 0 && tables > 0 => {
                    let _ = editor.add_child_to_subtype(r % relationships, t % tables, true);
                }
                Op::RemoveChild(r, t) if relationships > 0 && tables > 0 => {
                    let _ = editor.remove_child_from_subtype(r % relationships, t % tables, true);
                }
                Op::ResetName(r) if relationships > 0 => {
                    let _ = editor.reset_relationship_name(r % relationships, true);
                }
                Op::Move(t, p) if tables > 0 => {
                    let to = Position::new(p as f64, n as f64);
                    let _ = editor.move_elements(Element::Table, &[(t % tables, to)], true);
                }
                _ => {}
            }
        }
    }

    fn structural(violations: Vec<Violation>) -> Vec<Violation> {
        violations
            .into_iter()
            .filter(|v| !matches!(v, Violation::DanglingForeignKey { .. }))
            .collect()
    }

    proptest! {
        #[test]
        fn ids_stay_dense_and_keys_tight(ops in prop::collection::vec(op(), 1..40)) {
            let mut editor = Editor::new();
            run(&mut editor, &ops);
            prop_assert_eq!(structural(audit(editor.diagram())), vec![]);
        }

        #[test]
        fn undo_all_then_redo_all_round_trips(ops in prop::collection::vec(op(), 1..40)) {
            let mut editor = Editor::new();
            run(&mut editor, &ops);
            let after = editor.diagram().clone();

            let mut undone = 0;
            while editor.undo() {
                undone += 1;
                prop_assert_eq!(structural(audit(editor.diagram())), vec![]);
            }
            prop_assert!(editor.diagram().tables.is_empty());

            let mut redone = 0;
            while editor.redo() {
                redone += 1;
            }
            prop_assert_eq!(undone, redone);
            prop_assert_eq!(editor.diagram(), &after);
        }
    }
}
