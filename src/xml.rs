//src/xml.rs

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

use crate::error::ReportError;

/// An element under construction.
struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self { name, children: Map::new(), text: String::new() }
    }

    /// Text-only elements collapse to a string, empty ones to null.
    fn into_value(self) -> (String, Value) {
        let value = if !self.children.is_empty() {
            Value::Object(self.children)
        } else if !self.text.is_empty() {
            Value::String(self.text)
        } else {
            Value::Null
        };
        (self.name, value)
    }
}

/// Insert a child, turning a repeated key into an array. A key seen once
/// stays a bare value, which is the ambiguity `report::as_list` undoes.
fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

/// Convert XML text into a compact tree: `{root: {child: ..., ...}}`.
/// Attributes (namespaces, mostly) are dropped.
pub fn xml_to_compact(xml: &str) -> Result<Value, ReportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, Value::Null),
                    None => insert_child(&mut root, name, Value::Null),
                }
            }
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                // end names are checked by the reader, so a frame is always open here
                if let Some(frame) = stack.pop() {
                    let (name, value) = frame.into_value();
                    match stack.last_mut() {
                        Some(parent) => insert_child(&mut parent.children, name, value),
                        None => insert_child(&mut root, name, value),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ReportError::Invalid {
            path: open.name.clone(),
            reason: "document ended before the element was closed".to_string(),
        });
    }
    Ok(Value::Object(root))
}
