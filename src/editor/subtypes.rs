use super::{EditError, Editor, Result};
use crate::history::{Action, Command, Element, Patch, Preimage};
use crate::model::{FieldRef, Relationship};

impl Editor {
    /// Attaches `child_table_id` as another subtype of a supertype
    /// relationship. The child's first field stands in as its discriminator.
    /// The relationship switches to (or stays in) the array form.
    pub fn add_child_to_subtype(
        &mut self,
        relationship_id: usize,
        child_table_id: usize,
        add_to_history: bool,
    ) -> Result<()> {
        let rel = self.relationship(relationship_id)?;
        if !rel.is_subtype() {
            return Err(EditError::NotASubtype(relationship_id));
        }
        if rel.start.table_id == child_table_id {
            return Err(EditError::ChildIsParent);
        }
        if rel.target.has_table(child_table_id) {
            return Err(EditError::ChildAlreadyPresent(child_table_id));
        }
        let child = self.table(child_table_id)?;
        let Some(placeholder) = child.fields.first() else {
            return Err(EditError::EmptyChildTable(child_table_id));
        };
        let end = FieldRef::new(child_table_id, placeholder.id);
        let message = format!(
            "Add subtype `{}` #{child_table_id} to `{}` #{relationship_id}",
            child.name, rel.name
        );

        let before = self.diagram.relationships.clone();
        let rel = &mut self.diagram.relationships[relationship_id];
        rel.target = std::mem::take(&mut rel.target).with_child(end);

        if add_to_history {
            self.record_subtype_change(
                message,
                before,
                Patch::AddSubtypeChild {
                    relationship_id,
                    child_table_id,
                },
            );
        }
        self.settle("add_child_to_subtype");
        Ok(())
    }

    /// Detaches a subtype. A single survivor collapses the relationship back
    /// to the scalar form; with none left the relationship stays, childless.
    pub fn remove_child_from_subtype(
        &mut self,
        relationship_id: usize,
        child_table_id: usize,
        add_to_history: bool,
    ) -> Result<()> {
        let rel = self.relationship(relationship_id)?;
        if !rel.is_subtype() {
            return Err(EditError::NotASubtype(relationship_id));
        }
        if !rel.target.has_table(child_table_id) {
            return Err(EditError::ChildNotPresent(child_table_id));
        }
        let message = format!(
            "Remove subtype #{child_table_id} from `{}` #{relationship_id}",
            rel.name
        );

        let before = self.diagram.relationships.clone();
        let rel = &mut self.diagram.relationships[relationship_id];
        rel.target = std::mem::take(&mut rel.target).without_table(child_table_id);

        if add_to_history {
            self.record_subtype_change(
                message,
                before,
                Patch::RemoveSubtypeChild {
                    relationship_id,
                    child_table_id,
                },
            );
        }
        self.settle("remove_child_from_subtype");
        Ok(())
    }

    fn record_subtype_change(
        &mut self,
        message: String,
        before: Vec<Relationship>,
        redo: Patch,
    ) {
        let undo = Patch::Restore(Preimage {
            tables: Vec::new(),
            relationships: Some(before),
        });
        let command =
            Command::new(Action::Edit, Element::Relationship, message).patches(undo, redo);
        self.push_undo(command);
    }
}

#[cfg(test)]
mod tests {
    use crate::editor::{EditError, Editor};
    use crate::model::{
        Field, FieldRef, Relationship, RelationshipTarget, RelationshipType, Table,
    };

    /// Supertype `person` with candidate subtypes `employee`, `customer`, `vendor`.
    fn hierarchy(target: RelationshipTarget) -> Editor {
        let mut editor = Editor::new();
        for name in ["person", "employee", "customer", "vendor"] {
            editor.add_table(
                Some(Table::new(name).with_field(Field::primary_key("id", "INTEGER"))),
                false,
            );
        }
        let mut rel = Relationship::new("person", FieldRef::new(0, 0), FieldRef::new(1, 0));
        rel.relationship_type = RelationshipType::Subtype;
        rel.target = target;
        editor.add_relationship(rel, false);
        editor
    }

    #[test]
    fn test_two_children_then_collapse() {
        let mut editor = hierarchy(RelationshipTarget::Subtype(vec![]));
        editor.add_child_to_subtype(0, 1, true).unwrap();
        assert_eq!(
            editor.diagram().relationships[0].target,
            RelationshipTarget::Subtype(vec![FieldRef::new(1, 0)])
        );
        editor.add_child_to_subtype(0, 2, true).unwrap();
        assert_eq!(
            editor.diagram().relationships[0].target,
            RelationshipTarget::Subtype(vec![FieldRef::new(1, 0), FieldRef::new(2, 0)])
        );

        editor.remove_child_from_subtype(0, 1, true).unwrap();
        assert_eq!(
            editor.diagram().relationships[0].target,
            RelationshipTarget::Single(FieldRef::new(2, 0))
        );

        editor.remove_child_from_subtype(0, 2, true).unwrap();
        assert_eq!(editor.diagram().relationships.len(), 1);
        assert_eq!(
            editor.diagram().relationships[0].target,
            RelationshipTarget::Subtype(vec![])
        );
    }

    #[test]
    fn test_scalar_child_carried_into_array() {
        let mut editor = hierarchy(RelationshipTarget::Single(FieldRef::new(1, 0)));
        editor.add_child_to_subtype(0, 2, true).unwrap();
        assert_eq!(
            editor.diagram().relationships[0].ends(),
            &[FieldRef::new(1, 0), FieldRef::new(2, 0)]
        );

        editor.undo();
        assert_eq!(
            editor.diagram().relationships[0].target,
            RelationshipTarget::Single(FieldRef::new(1, 0))
        );
    }

    #[test]
    fn test_rejections() {
        let mut editor = hierarchy(RelationshipTarget::Single(FieldRef::new(1, 0)));
        editor.add_table(Some(Table::new("empty")), false);

        assert_eq!(editor.add_child_to_subtype(0, 0, true), Err(EditError::ChildIsParent));
        assert_eq!(
            editor.add_child_to_subtype(0, 1, true),
            Err(EditError::ChildAlreadyPresent(1))
        );
        assert_eq!(
            editor.add_child_to_subtype(0, 4, true),
            Err(EditError::EmptyChildTable(4))
        );
        assert_eq!(
            editor.remove_child_from_subtype(0, 3, true),
            Err(EditError::ChildNotPresent(3))
        );
        assert!(!editor.history().can_undo());
    }

    #[test]
    fn test_ordinary_relationship_rejected() {
        let mut editor = hierarchy(RelationshipTarget::Single(FieldRef::new(1, 0)));
        editor.diagram.relationships[0].relationship_type = RelationshipType::OneToOne;
        assert_eq!(editor.add_child_to_subtype(0, 2, true), Err(EditError::NotASubtype(0)));
    }
}
