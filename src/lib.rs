pub mod editor;
pub mod history;
pub mod integrity;
pub mod model;
pub mod reindex;
pub mod script;

use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use editor::{EditError, Editor};
use history::Element;
use model::{
    AreaUpdate, Diagram, EnumUpdate, FieldRef, FieldUpdate, LinkRequest, NoteUpdate, Position,
    RelationshipUpdate, TableUpdate,
};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&message.to_string()).into()
}

fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(js_error)
}

fn optional_json<T: DeserializeOwned>(json: Option<String>) -> Result<Option<T>, JsValue> {
    json.as_deref().map(from_json::<T>).transpose()
}

fn rejected(err: EditError) -> JsValue {
    js_error(err)
}

/// Editor handle for JavaScript hosts. Payloads and snapshots are JSON
/// strings in the diagram document shape.
#[wasm_bindgen]
pub struct DiagramEditor {
    inner: Editor,
}

#[wasm_bindgen]
impl DiagramEditor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> DiagramEditor {
        DiagramEditor {
            inner: Editor::new(),
        }
    }

    /// Bulk-loads a diagram document and clears history.
    pub fn load(&mut self, json: &str) -> Result<(), JsValue> {
        let diagram: Diagram = from_json(json)?;
        self.inner.load(diagram);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.diagram()).map_err(js_error)
    }

    /// Runs a JSON script and returns the number of steps applied.
    #[wasm_bindgen(js_name = "runScript")]
    pub fn run_script(&mut self, json: &str) -> Result<usize, JsValue> {
        let steps = script::parse(json).map_err(js_error)?;
        script::run(&mut self.inner, steps).map_err(js_error)
    }

    #[wasm_bindgen(js_name = "addTable")]
    pub fn add_table(
        &mut self,
        json: Option<String>,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let table = optional_json(json)?;
        Ok(self.inner.add_table(table, add_to_history))
    }

    #[wasm_bindgen(js_name = "updateTable")]
    pub fn update_table(
        &mut self,
        id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: TableUpdate = from_json(json)?;
        self.inner.update_table(id, values, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteTable")]
    pub fn delete_table(&mut self, id: usize, add_to_history: bool) -> Result<(), JsValue> {
        self.inner.delete_table(id, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addFieldToTable")]
    pub fn add_field(
        &mut self,
        table_id: usize,
        json: Option<String>,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let field = optional_json(json)?;
        self.inner.add_field(table_id, field, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "updateField")]
    pub fn update_field(
        &mut self,
        table_id: usize,
        field_id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: FieldUpdate = from_json(json)?;
        self.inner
            .update_field(FieldRef::new(table_id, field_id), values, add_to_history)
            .map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteField")]
    pub fn delete_field(
        &mut self,
        table_id: usize,
        field_id: usize,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        self.inner
            .delete_field(FieldRef::new(table_id, field_id), add_to_history)
            .map_err(rejected)
    }

    #[wasm_bindgen(js_name = "canLinkFrom")]
    pub fn can_link_from(&self, table_id: usize, field_id: usize) -> Result<(), JsValue> {
        self.inner
            .can_link_from(FieldRef::new(table_id, field_id))
            .map_err(rejected)
    }

    pub fn link(
        &mut self,
        table_id: usize,
        field_id: usize,
        end_table_id: usize,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let request = LinkRequest {
            start: FieldRef::new(table_id, field_id),
            end_table_id,
        };
        self.inner.link(request, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addRelationship")]
    pub fn add_relationship(&mut self, json: &str, add_to_history: bool) -> Result<usize, JsValue> {
        let relationship = from_json(json)?;
        Ok(self.inner.add_relationship(relationship, add_to_history))
    }

    #[wasm_bindgen(js_name = "updateRelationship")]
    pub fn update_relationship(
        &mut self,
        id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: RelationshipUpdate = from_json(json)?;
        self.inner
            .update_relationship(id, values, add_to_history)
            .map_err(rejected)
    }

    #[wasm_bindgen(js_name = "resetRelationshipName")]
    pub fn reset_relationship_name(
        &mut self,
        id: usize,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        self.inner.reset_relationship_name(id, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteRelationship")]
    pub fn delete_relationship(&mut self, id: usize, add_to_history: bool) -> Result<(), JsValue> {
        self.inner.delete_relationship(id, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addChildToSubtype")]
    pub fn add_child_to_subtype(
        &mut self,
        relationship_id: usize,
        child_table_id: usize,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        self.inner
            .add_child_to_subtype(relationship_id, child_table_id, add_to_history)
            .map_err(rejected)
    }

    #[wasm_bindgen(js_name = "removeChildFromSubtype")]
    pub fn remove_child_from_subtype(
        &mut self,
        relationship_id: usize,
        child_table_id: usize,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        self.inner
            .remove_child_from_subtype(relationship_id, child_table_id, add_to_history)
            .map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addArea")]
    pub fn add_area(
        &mut self,
        json: Option<String>,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let area = optional_json(json)?;
        Ok(self.inner.add_area(area, add_to_history))
    }

    #[wasm_bindgen(js_name = "updateArea")]
    pub fn update_area(
        &mut self,
        id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: AreaUpdate = from_json(json)?;
        self.inner.update_area(id, values, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteArea")]
    pub fn delete_area(&mut self, id: usize, add_to_history: bool) -> Result<(), JsValue> {
        self.inner.delete_area(id, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addNote")]
    pub fn add_note(
        &mut self,
        json: Option<String>,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let note = optional_json(json)?;
        Ok(self.inner.add_note(note, add_to_history))
    }

    #[wasm_bindgen(js_name = "updateNote")]
    pub fn update_note(
        &mut self,
        id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: NoteUpdate = from_json(json)?;
        self.inner.update_note(id, values, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteNote")]
    pub fn delete_note(&mut self, id: usize, add_to_history: bool) -> Result<(), JsValue> {
        self.inner.delete_note(id, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "addEnum")]
    pub fn add_enum(
        &mut self,
        json: Option<String>,
        add_to_history: bool,
    ) -> Result<usize, JsValue> {
        let e = optional_json(json)?;
        Ok(self.inner.add_enum(e, add_to_history))
    }

    #[wasm_bindgen(js_name = "updateEnum")]
    pub fn update_enum(
        &mut self,
        id: usize,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let values: EnumUpdate = from_json(json)?;
        self.inner.update_enum(id, values, add_to_history).map_err(rejected)
    }

    #[wasm_bindgen(js_name = "deleteEnum")]
    pub fn delete_enum(&mut self, id: usize, add_to_history: bool) -> Result<(), JsValue> {
        self.inner.delete_enum(id, add_to_history).map_err(rejected)
    }

    /// `element` is `"table"`, `"area"` or `"note"`; `json` is an array of
    /// `[id, {x, y}]` pairs.
    #[wasm_bindgen(js_name = "moveElements")]
    pub fn move_elements(
        &mut self,
        element: &str,
        json: &str,
        add_to_history: bool,
    ) -> Result<(), JsValue> {
        let element: Element = serde_json::from_value(element.into()).map_err(js_error)?;
        let moves: Vec<(usize, Position)> = from_json(json)?;
        self.inner
            .move_elements(element, &moves, add_to_history)
            .map_err(rejected)
    }

    pub fn pan(&mut self, x: f64, y: f64, add_to_history: bool) {
        self.inner.pan(Position::new(x, y), add_to_history);
    }

    pub fn undo(&mut self) -> bool {
        self.inner.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.inner.redo()
    }

    #[wasm_bindgen(js_name = "clearHistory")]
    pub fn clear_history(&mut self) {
        self.inner.clear_history();
    }

    #[wasm_bindgen(js_name = "canUndo")]
    pub fn can_undo(&self) -> bool {
        self.inner.history().can_undo()
    }

    #[wasm_bindgen(js_name = "canRedo")]
    pub fn can_redo(&self) -> bool {
        self.inner.history().can_redo()
    }

    /// Messages on the undo stack, oldest first.
    #[wasm_bindgen(js_name = "undoMessages")]
    pub fn undo_messages(&self) -> Vec<String> {
        self.inner
            .history()
            .undo_stack()
            .map(|c| c.message.clone())
            .collect()
    }
}

impl Default for DiagramEditor {
    fn default() -> Self {
        Self::new()
    }
}
