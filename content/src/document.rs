//! A semi-structured content document and the path helpers used to reshape it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One content object (story, video, gallery, image, collection, lightbox)
///
/// The document is kept as an untyped JSON tree because every content kind
/// carries its own extensible structure; the helpers below address fields with
/// JSON pointers (`/promo_items/basic/referent/id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDocument(Value);

impl ContentDocument {
    /// Wrap a JSON value as a content document
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The document's own identifier (`_id`)
    pub fn id(&self) -> Option<&str> {
        self.get_str("/_id")
    }

    /// Replace the document's own identifier
    pub fn set_id(&mut self, id: &str) {
        self.set("/_id", Value::String(id.to_string()));
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// An empty document holds no object at its root
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    pub fn get_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        self.0.pointer_mut(pointer)
    }

    /// Read a string field; absent and non-string fields both yield `None`
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.0.pointer(pointer).and_then(Value::as_str)
    }

    /// Write a value at `pointer`, creating intermediate objects as needed
    pub fn set(&mut self, pointer: &str, value: Value) {
        set_at(&mut self.0, pointer, value);
    }

    /// Remove the field at `pointer`, returning its previous value
    pub fn remove(&mut self, pointer: &str) -> Option<Value> {
        let (parent, key) = split_pointer(pointer)?;
        let parent = if parent.is_empty() {
            &mut self.0
        } else {
            self.0.pointer_mut(parent)?
        };
        parent.as_object_mut()?.remove(&unescape(key))
    }

    /// Mutable access to the object stored at `pointer`, if it is one
    pub fn object_mut(&mut self, pointer: &str) -> Option<&mut Map<String, Value>> {
        self.0.pointer_mut(pointer).and_then(Value::as_object_mut)
    }

    /// Mutable access to the array stored at `pointer`, if it is one
    pub fn array_mut(&mut self, pointer: &str) -> Option<&mut Vec<Value>> {
        self.0.pointer_mut(pointer).and_then(Value::as_array_mut)
    }
}

impl From<Value> for ContentDocument {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Default for ContentDocument {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

fn split_pointer(pointer: &str) -> Option<(&str, &str)> {
    let index = pointer.rfind('/')?;
    Some((&pointer[..index], &pointer[index + 1..]))
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn set_at(root: &mut Value, pointer: &str, value: Value) {
    if pointer.is_empty() {
        *root = value;
        return;
    }

    let mut current = root;
    let tokens: Vec<String> = pointer.split('/').skip(1).map(unescape).collect();
    let Some((last, parents)) = tokens.split_last() else {
        return;
    };

    for token in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}
