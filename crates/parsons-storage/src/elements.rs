//! Form-field storage elements
//!
//! Widgets keep state inside hidden form fields so it survives page reloads
//! and is submitted with the form. Two flavors exist:
//!
//! - [`ElemStorage`]: one hidden input per store id (`elmstr-input-<id>`),
//!   with a read/write accessor that encodes text or markup on the way in and
//!   decodes it on the way out.
//! - [`LocalStorageElements`]: stores bound to an arbitrary selector, with an
//!   encode-only writer and raw get/set.
//!
//! Stored values are base64 of the content with every non-ASCII character
//! replaced by an HTML character reference. Markup characters are kept as-is,
//! so stored HTML stays HTML.
//!
//! The page itself is reached through [`FormDocument`] and [`FormField`], so
//! the elements run against an in-memory form in tests.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ElementError;

/// Prefix of the hidden input backing an [`ElemStorage`] store
pub const ELEM_INPUT_PREFIX: &str = "elmstr-input-";

/// A form field holding a string value
pub trait FormField: Send + Sync {
    fn value(&self) -> String;
    fn set_value(&self, value: &str);
}

/// The page containing the form fields
pub trait FormDocument: Send + Sync {
    /// Look up a field by element id
    fn element_by_id(&self, id: &str) -> Option<Arc<dyn FormField>>;

    /// Look up the first field matching a selector
    fn select(&self, selector: &str) -> Option<Arc<dyn FormField>>;
}

/// Content accepted by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementContent {
    /// Plain text
    Text(String),
    /// A DOM node, stored as its serialized markup
    Node { node_name: String, outer_html: String },
}

impl ElementContent {
    /// Classify an untyped value
    ///
    /// Strings are text. Objects with a numeric `nodeType`, a string
    /// `nodeName` and a string `outerHTML` are nodes. Everything else is
    /// [`ElementError::UnsupportedContent`].
    pub fn from_value(value: &Value) -> Result<Self, ElementError> {
        match value {
            Value::String(text) => Ok(ElementContent::Text(text.clone())),
            Value::Object(map) => {
                let is_node = map.get("nodeType").is_some_and(Value::is_number);
                let node_name = map.get("nodeName").and_then(Value::as_str);
                let outer_html = map.get("outerHTML").and_then(Value::as_str);
                match (is_node, node_name, outer_html) {
                    (true, Some(node_name), Some(outer_html)) => Ok(ElementContent::Node {
                        node_name: node_name.to_string(),
                        outer_html: outer_html.to_string(),
                    }),
                    _ => Err(ElementError::UnsupportedContent("object".into())),
                }
            }
            Value::Null => Err(ElementError::UnsupportedContent("null".into())),
            Value::Bool(_) => Err(ElementError::UnsupportedContent("boolean".into())),
            Value::Number(_) => Err(ElementError::UnsupportedContent("number".into())),
            Value::Array(_) => Err(ElementError::UnsupportedContent("array".into())),
        }
    }

    /// The text that gets stored
    pub fn markup(&self) -> &str {
        match self {
            ElementContent::Text(text) => text,
            ElementContent::Node { outer_html, .. } => outer_html,
        }
    }
}

impl From<&str> for ElementContent {
    fn from(text: &str) -> Self {
        ElementContent::Text(text.to_string())
    }
}

impl From<String> for ElementContent {
    fn from(text: String) -> Self {
        ElementContent::Text(text)
    }
}

/// Read/write handle to one [`ElemStorage`] store
#[derive(Clone)]
pub struct StoreAccessor {
    field: Arc<dyn FormField>,
}

impl StoreAccessor {
    /// Decode the current value
    pub fn get(&self) -> Result<String, ElementError> {
        decode(&self.field.value())
    }

    /// Encode and store `content`
    pub fn set(&self, content: &ElementContent) {
        self.field.set_value(&encode(content.markup()));
    }

    /// Encode and store an untyped value
    pub fn set_value(&self, value: &Value) -> Result<(), ElementError> {
        let content = ElementContent::from_value(value)?;
        self.set(&content);
        Ok(())
    }
}

/// Registry of hidden-input stores, keyed by store id
pub struct ElemStorage {
    document: Arc<dyn FormDocument>,
    stores: DashMap<String, StoreAccessor>,
}

impl ElemStorage {
    pub fn new(document: Arc<dyn FormDocument>) -> Self {
        Self {
            document,
            stores: DashMap::new(),
        }
    }

    /// Register the store for `id` and return its accessor
    ///
    /// # Errors
    ///
    /// - [`ElementError::InvalidStore`] if `id` is empty
    /// - [`ElementError::DuplicateStore`] if `id` is already registered
    /// - [`ElementError::MissingElement`] if the page has no input for `id`
    pub fn register_store(&self, id: &str) -> Result<StoreAccessor, ElementError> {
        if id.is_empty() {
            return Err(ElementError::InvalidStore(id.to_string()));
        }

        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => Err(ElementError::DuplicateStore(id.to_string())),
            Entry::Vacant(slot) => {
                let element_id = format!("{}{}", ELEM_INPUT_PREFIX, id);
                let field = self
                    .document
                    .element_by_id(&element_id)
                    .ok_or(ElementError::MissingElement(element_id))?;
                let accessor = StoreAccessor { field };
                slot.insert(accessor.clone());
                debug!(id, "Registered element store");
                Ok(accessor)
            }
        }
    }

    /// Get the accessor registered for `id`
    pub fn get_store(&self, id: &str) -> Result<StoreAccessor, ElementError> {
        self.stores
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ElementError::NotRegistered(id.to_string()))
    }

    /// Decoded value of the store for `id`
    pub fn get_val(&self, id: &str) -> Result<String, ElementError> {
        self.get_store(id)?.get()
    }

    /// Encode and store `content` in the store for `id`
    pub fn set_val(&self, id: &str, content: &ElementContent) -> Result<(), ElementError> {
        self.get_store(id)?.set(content);
        Ok(())
    }
}

/// Encode-only handle returned by [`LocalStorageElements::register_store`]
#[derive(Clone)]
pub struct StoreWriter {
    field: Arc<dyn FormField>,
}

impl StoreWriter {
    pub fn write(&self, contents: &str) {
        self.field.set_value(&encode(contents));
    }
}

/// Registry of selector-bound stores
pub struct LocalStorageElements {
    document: Arc<dyn FormDocument>,
    stores: DashMap<String, Arc<dyn FormField>>,
}

impl LocalStorageElements {
    pub fn new(document: Arc<dyn FormDocument>) -> Self {
        Self {
            document,
            stores: DashMap::new(),
        }
    }

    /// Bind `id` to the field matching `selector`
    ///
    /// Re-registering an id rebinds it.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::MissingElement`] if nothing matches `selector`.
    pub fn register_store(&self, id: &str, selector: &str) -> Result<StoreWriter, ElementError> {
        let field = self
            .document
            .select(selector)
            .ok_or_else(|| ElementError::MissingElement(selector.to_string()))?;
        self.stores.insert(id.to_string(), Arc::clone(&field));
        trace!(id, selector, "Registered local storage element");
        Ok(StoreWriter { field })
    }

    fn field(&self, id: &str) -> Result<Arc<dyn FormField>, ElementError> {
        self.stores
            .get(id)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(|| ElementError::NotRegistered(id.to_string()))
    }

    /// Raw value of the field bound to `id`
    pub fn get_val(&self, id: &str) -> Result<String, ElementError> {
        Ok(self.field(id)?.value())
    }

    /// Overwrite the field bound to `id` with a raw value
    pub fn set_val(&self, id: &str, contents: &str) -> Result<(), ElementError> {
        self.field(id)?.set_value(contents);
        Ok(())
    }
}

/// An in-memory form field
#[derive(Debug, Default)]
pub struct InMemoryField {
    value: RwLock<String>,
}

impl InMemoryField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(value.into()),
        }
    }
}

impl FormField for InMemoryField {
    fn value(&self) -> String {
        self.value.read().clone()
    }

    fn set_value(&self, value: &str) {
        *self.value.write() = value.to_string();
    }
}

/// An in-memory page of form fields, addressed by element id
///
/// Selectors of the form `#id` resolve to the field with that id; any other
/// selector is treated as a bare id.
#[derive(Debug, Default)]
pub struct InMemoryForm {
    fields: DashMap<String, Arc<InMemoryField>>,
}

impl InMemoryForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field and return it
    pub fn add_field(&self, id: impl Into<String>, value: impl Into<String>) -> Arc<InMemoryField> {
        let field = Arc::new(InMemoryField::new(value));
        self.fields.insert(id.into(), Arc::clone(&field));
        field
    }
}

impl FormDocument for InMemoryForm {
    fn element_by_id(&self, id: &str) -> Option<Arc<dyn FormField>> {
        self.fields
            .get(id)
            .map(|f| Arc::clone(f.value()) as Arc<dyn FormField>)
    }

    fn select(&self, selector: &str) -> Option<Arc<dyn FormField>> {
        self.element_by_id(selector.strip_prefix('#').unwrap_or(selector))
    }
}

const NAMED_REFERENCES: &[(char, &str)] = &[
    ('\u{a0}', "nbsp"),
    ('©', "copy"),
    ('®', "reg"),
    ('°', "deg"),
    ('±', "plusmn"),
    ('×', "times"),
    ('÷', "divide"),
    ('é', "eacute"),
    ('–', "ndash"),
    ('—', "mdash"),
    ('‘', "lsquo"),
    ('’', "rsquo"),
    ('“', "ldquo"),
    ('”', "rdquo"),
    ('…', "hellip"),
    ('€', "euro"),
    ('→', "rarr"),
    ('≤', "le"),
    ('≥', "ge"),
    ('≠', "ne"),
];

const MARKUP_REFERENCES: &[(char, &str)] = &[
    ('&', "amp"),
    ('<', "lt"),
    ('>', "gt"),
    ('"', "quot"),
    ('\'', "apos"),
];

/// Replace `&`, non-ASCII and control characters with character references
///
/// `&` is always escaped so text that already looks like a reference
/// survives [`decode_entities`] unchanged.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let printable = c.is_ascii() && (!c.is_ascii_control() || matches!(c, '\t' | '\n' | '\r'));
        if c == '&' {
            out.push_str("&amp;");
        } else if printable {
            out.push(c);
        } else if let Some((_, name)) = NAMED_REFERENCES.iter().find(|(ch, _)| *ch == c) {
            out.push('&');
            out.push_str(name);
            out.push(';');
        } else {
            out.push_str(&format!("&#x{:X};", u32::from(c)));
        }
    }
    out
}

/// Resolve character references; unknown ones are kept verbatim
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let resolved = tail
            .find(';')
            .filter(|&semi| semi <= 32)
            .and_then(|semi| resolve_reference(&tail[1..semi]).map(|c| (c, semi)));

        match resolved {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    NAMED_REFERENCES
        .iter()
        .chain(MARKUP_REFERENCES)
        .find(|(_, n)| *n == name)
        .map(|(c, _)| *c)
}

/// Encode content for storage in a form field
pub fn encode(contents: &str) -> String {
    STANDARD.encode(encode_entities(contents))
}

/// Decode a stored form-field value
pub fn decode(stored: &str) -> Result<String, ElementError> {
    let bytes = STANDARD
        .decode(stored.trim())
        .map_err(|e| ElementError::Decode(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| ElementError::Decode(e.to_string()))?;
    Ok(decode_entities(&text))
}
