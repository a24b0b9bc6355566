//! Areas, notes, enums, element positions and the canvas pan. None of these
//! take part in the relationship graph; they only share the dense-id rule.

use super::{describe, EditError, Editor, Result};
use crate::history::{Action, Command, CommandId, Element, Patch};
use crate::model::{Area, AreaUpdate, EnumType, EnumUpdate, Note, NoteUpdate, Position};
use crate::reindex;

impl Editor {
    pub fn add_area(&mut self, area: Option<Area>, add_to_history: bool) -> usize {
        let area = area.unwrap_or_else(|| Area {
            name: format!("area_{}", self.diagram.areas.len()),
            width: 200.0,
            height: 200.0,
            color: self.config.default_area_color.clone(),
            ..Area::default()
        });
        let id = reindex::push(&mut self.diagram.areas, area);

        if add_to_history {
            let area = self.diagram.areas[id].clone();
            let message = format!("Add area `{}` #{id}", area.name);
            let command = Command::new(Action::Add, Element::Area, message)
                .patches(Patch::DeleteArea(id), Patch::AddArea(area));
            self.push_undo(command);
        }
        self.settle("add_area");
        id
    }

    pub fn update_area(
        &mut self,
        id: usize,
        values: AreaUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let area = self.diagram.areas.get_mut(id).ok_or(EditError::NotFound {
            element: Element::Area,
            id,
        })?;
        let inverse = values.inverse(area);
        let message = format!("Edit area `{}` #{id} {}", area.name, describe(&values));
        values.apply(area);

        if add_to_history {
            let command = Command::new(Action::Edit, Element::Area, message).patches(
                Patch::UpdateArea { id, values: inverse },
                Patch::UpdateArea { id, values },
            );
            self.push_undo(command);
        }
        self.settle("update_area");
        Ok(())
    }

    pub fn delete_area(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        let count = self.diagram.areas.len();
        let area = reindex::remove(&mut self.diagram.areas, id).ok_or(EditError::NotFound {
            element: Element::Area,
            id,
        })?;

        if add_to_history {
            let message = format!("Delete area `{}` #{id} of {count}", area.name);
            let command = Command::new(Action::Delete, Element::Area, message)
                .patches(Patch::AddArea(area), Patch::DeleteArea(id));
            self.push_undo(command);
        }
        self.settle("delete_area");
        Ok(())
    }

    pub fn add_note(&mut self, note: Option<Note>, add_to_history: bool) -> usize {
        let note = note.unwrap_or_else(|| Note {
            title: format!("note_{}", self.diagram.notes.len()),
            height: 88.0,
            color: self.config.default_note_color.clone(),
            ..Note::default()
        });
        let id = reindex::push(&mut self.diagram.notes, note);

        if add_to_history {
            let note = self.diagram.notes[id].clone();
            let message = format!("Add note `{}` #{id}", note.title);
            let command = Command::new(Action::Add, Element::Note, message)
                .patches(Patch::DeleteNote(id), Patch::AddNote(note));
            self.push_undo(command);
        }
        self.settle("add_note");
        id
    }

    pub fn update_note(
        &mut self,
        id: usize,
        values: NoteUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let note = self.diagram.notes.get_mut(id).ok_or(EditError::NotFound {
            element: Element::Note,
            id,
        })?;
        let inverse = values.inverse(note);
        let message = format!("Edit note `{}` #{id} {}", note.title, describe(&values));
        values.apply(note);

        if add_to_history {
            let command = Command::new(Action::Edit, Element::Note, message).patches(
                Patch::UpdateNote { id, values: inverse },
                Patch::UpdateNote { id, values },
            );
            self.push_undo(command);
        }
        self.settle("update_note");
        Ok(())
    }

    pub fn delete_note(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        let count = self.diagram.notes.len();
        let note = reindex::remove(&mut self.diagram.notes, id).ok_or(EditError::NotFound {
            element: Element::Note,
            id,
        })?;

        if add_to_history {
            let message = format!("Delete note `{}` #{id} of {count}", note.title);
            let command = Command::new(Action::Delete, Element::Note, message)
                .patches(Patch::AddNote(note), Patch::DeleteNote(id));
            self.push_undo(command);
        }
        self.settle("delete_note");
        Ok(())
    }

    pub fn add_enum(&mut self, e: Option<EnumType>, add_to_history: bool) -> usize {
        let e = e.unwrap_or_else(|| EnumType {
            name: format!("enum_{}", self.diagram.enums.len()),
            ..EnumType::default()
        });
        let id = reindex::push(&mut self.diagram.enums, e);

        if add_to_history {
            let e = self.diagram.enums[id].clone();
            let message = format!("Add enum `{}` #{id}", e.name);
            let command = Command::new(Action::Add, Element::Enum, message)
                .patches(Patch::DeleteEnum(id), Patch::AddEnum(e));
            self.push_undo(command);
        }
        self.settle("add_enum");
        id
    }

    pub fn update_enum(
        &mut self,
        id: usize,
        values: EnumUpdate,
        add_to_history: bool,
    ) -> Result<()> {
        let e = self.diagram.enums.get_mut(id).ok_or(EditError::NotFound {
            element: Element::Enum,
            id,
        })?;
        let inverse = values.inverse(e);
        let message = format!("Edit enum `{}` #{id} {}", e.name, describe(&values));
        values.apply(e);

        if add_to_history {
            let command = Command::new(Action::Edit, Element::Enum, message).patches(
                Patch::UpdateEnum { id, values: inverse },
                Patch::UpdateEnum { id, values },
            );
            self.push_undo(command);
        }
        self.settle("update_enum");
        Ok(())
    }

    pub fn delete_enum(&mut self, id: usize, add_to_history: bool) -> Result<()> {
        let count = self.diagram.enums.len();
        let e = reindex::remove(&mut self.diagram.enums, id).ok_or(EditError::NotFound {
            element: Element::Enum,
            id,
        })?;

        if add_to_history {
            let message = format!("Delete enum `{}` #{id} of {count}", e.name);
            let command = Command::new(Action::Delete, Element::Enum, message)
                .patches(Patch::AddEnum(e), Patch::DeleteEnum(id));
            self.push_undo(command);
        }
        self.settle("delete_enum");
        Ok(())
    }

    /// Moves tables, areas or notes. One call per pointer event is fine:
    /// consecutive moves of the same selection coalesce into one undo step.
    pub fn move_elements(
        &mut self,
        element: Element,
        moves: &[(usize, Position)],
        add_to_history: bool,
    ) -> Result<()> {
        let mut from = Vec::with_capacity(moves.len());
        for &(id, _) in moves {
            let position = self.position_of(element, id)?;
            from.push((id, position));
        }

        for &(id, to) in moves {
            self.set_position(element, id, to);
        }

        if add_to_history && !moves.is_empty() {
            let id = match moves {
                [(id, _)] => CommandId::One(*id),
                _ => CommandId::Many(moves.iter().map(|(id, _)| *id).collect()),
            };
            let ids: Vec<String> = moves.iter().map(|(id, _)| format!("#{id}")).collect();
            let message = format!("Move {element} {}", ids.join(", "));
            let command = Command::new(Action::Move, element, message).id(id).patches(
                Patch::Move {
                    element,
                    positions: from,
                },
                Patch::Move {
                    element,
                    positions: moves.to_vec(),
                },
            );
            self.push_undo(command);
        }
        self.settle("move_elements");
        Ok(())
    }

    fn position_of(&self, element: Element, id: usize) -> Result<Position> {
        let found = match element {
            Element::Table => self.diagram.tables.get(id).map(|t| Position::new(t.x, t.y)),
            Element::Area => self.diagram.areas.get(id).map(|a| Position::new(a.x, a.y)),
            Element::Note => self.diagram.notes.get(id).map(|n| Position::new(n.x, n.y)),
            other => return Err(EditError::NotMovable(other)),
        };
        found.ok_or(EditError::NotFound { element, id })
    }

    fn set_position(&mut self, element: Element, id: usize, to: Position) {
        let slot = match element {
            Element::Table => self.diagram.tables.get_mut(id).map(|t| (&mut t.x, &mut t.y)),
            Element::Area => self.diagram.areas.get_mut(id).map(|a| (&mut a.x, &mut a.y)),
            Element::Note => self.diagram.notes.get_mut(id).map(|n| (&mut n.x, &mut n.y)),
            _ => None,
        };
        if let Some((x, y)) = slot {
            *x = to.x;
            *y = to.y;
        }
    }

    /// Pans the canvas. Recorded without dedup or coalescing.
    pub fn pan(&mut self, to: Position, add_to_history: bool) {
        let from = self.diagram.transform.pan;
        self.diagram.transform.pan = to;

        if add_to_history {
            let command = Command::new(Action::Pan, Element::Canvas, "Pan canvas")
                .patches(Patch::Pan(from), Patch::Pan(to));
            self.history.push_raw(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::{EditError, Editor};
    use crate::history::Element;
    use crate::model::{AreaUpdate, EnumType, Note, Position, Table};

    #[test]
    fn test_area_lifecycle() {
        let mut editor = Editor::new();
        editor.add_area(None, true);
        editor.add_area(None, true);
        editor
            .update_area(
                1,
                AreaUpdate {
                    name: Some("billing".into()),
                    ..AreaUpdate::default()
                },
                true,
            )
            .unwrap();
        editor.delete_area(0, true).unwrap();

        let areas = &editor.diagram().areas;
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].id, 0);
        assert_eq!(areas[0].name, "billing");

        editor.undo();
        let areas = &editor.diagram().areas;
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].name, "area_0");
        assert_eq!(areas[1].id, 1);
    }

    #[test]
    fn test_note_and_enum_delete_reindexes() {
        let mut editor = Editor::new();
        for title in ["a", "b", "c"] {
            editor.add_note(
                Some(Note {
                    title: title.into(),
                    ..Note::default()
                }),
                false,
            );
        }
        editor.delete_note(1, true).unwrap();
        let ids: Vec<_> = editor.diagram().notes.iter().map(|n| (n.id, n.title.as_str())).collect();
        assert_eq!(ids, vec![(0, "a"), (1, "c")]);

        editor.add_enum(
            Some(EnumType {
                name: "status".into(),
                values: vec!["open".into(), "closed".into()],
                ..EnumType::default()
            }),
            true,
        );
        assert_eq!(editor.diagram().enums[0].values.len(), 2);
        assert_eq!(
            editor.delete_enum(5, true),
            Err(EditError::NotFound {
                element: Element::Enum,
                id: 5
            })
        );
    }

    #[test]
    fn test_drag_is_one_undo_step() {
        let mut editor = Editor::new();
        editor.add_table(Some(Table::new("t")), false);
        for step in 1..=20 {
            let p = step as f64 * 10.0;
            editor
                .move_elements(Element::Table, &[(0, Position::new(p, p))], true)
                .unwrap();
        }
        assert_eq!(editor.history().undo_len(), 1);
        assert_eq!(editor.diagram().tables[0].position(), Position::new(200.0, 200.0));

        editor.undo();
        assert_eq!(editor.diagram().tables[0].position(), Position::new(0.0, 0.0));
        editor.redo();
        assert_eq!(editor.diagram().tables[0].position(), Position::new(200.0, 200.0));
    }

    #[test]
    fn test_fields_cannot_move() {
        let mut editor = Editor::new();
        assert_eq!(
            editor.move_elements(Element::Field, &[(0, Position::default())], true),
            Err(EditError::NotMovable(Element::Field))
        );
    }

    #[test]
    fn test_pan_bypasses_filter() {
        let mut editor = Editor::new();
        editor.pan(Position::new(5.0, 0.0), true);
        editor.pan(Position::new(5.0, 0.0), true);
        assert_eq!(editor.history().undo_len(), 2);

        editor.undo();
        editor.undo();
        assert_eq!(editor.diagram().transform.pan, Position::default());
    }
}
