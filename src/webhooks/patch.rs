//! Structural JSON patch generation.
//!
//! Produces the RFC 6902 operations turning one document into another.
//! Object members are visited in sorted key order and arrays are compared
//! position by position, so a given pair of inputs always yields the same
//! operation sequence:
//!
//! - a member present on one side only becomes a whole-value `add`/`remove`
//! - array growth becomes `add` at each new index, ascending
//! - array shrinkage becomes `remove` at each dropped index, descending, so
//!   every index is still valid when its operation is applied
//! - any other differing value becomes a `replace`

use std::collections::BTreeSet;

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde::Serialize;
use serde_json::Value;

use crate::webhooks::error::{Error, Result};

/// Diff two typed resources through their JSON representation
pub fn diff_resources<K: Serialize>(original: &K, mutated: &K) -> Result<Patch> {
    let original = serde_json::to_value(original)?;
    let mutated = serde_json::to_value(mutated)?;
    diff(&original, &mutated)
}

/// Compute the operations turning `original` into `mutated`
pub fn diff(original: &Value, mutated: &Value) -> Result<Patch> {
    let mut differ = Differ::default();
    differ.values(original, mutated)?;
    Ok(Patch(differ.operations))
}

#[derive(Default)]
struct Differ {
    path: Vec<String>,
    operations: Vec<PatchOperation>,
}

impl Differ {
    fn values(&mut self, original: &Value, mutated: &Value) -> Result<()> {
        match (original, mutated) {
            (Value::Object(before), Value::Object(after)) => {
                let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
                for key in keys {
                    self.path.push(key.clone());
                    match (before.get(key), after.get(key)) {
                        (Some(old), Some(new)) => self.values(old, new)?,
                        (Some(_), None) => self.remove()?,
                        (None, Some(new)) => self.add(new)?,
                        (None, None) => {}
                    }
                    self.path.pop();
                }
            }
            (Value::Array(before), Value::Array(after)) => {
                for (index, (old, new)) in before.iter().zip(after).enumerate() {
                    self.path.push(index.to_string());
                    self.values(old, new)?;
                    self.path.pop();
                }
                for (index, new) in after.iter().enumerate().skip(before.len()) {
                    self.path.push(index.to_string());
                    self.add(new)?;
                    self.path.pop();
                }
                for index in (after.len()..before.len()).rev() {
                    self.path.push(index.to_string());
                    self.remove()?;
                    self.path.pop();
                }
            }
            (old, new) if old == new => {}
            (_, new) => self.replace(new)?,
        }
        Ok(())
    }

    fn add(&mut self, value: &Value) -> Result<()> {
        let path = self.pointer()?;
        self.operations.push(PatchOperation::Add(AddOperation {
            path,
            value: value.clone(),
        }));
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        let path = self.pointer()?;
        self.operations
            .push(PatchOperation::Remove(RemoveOperation { path }));
        Ok(())
    }

    fn replace(&mut self, value: &Value) -> Result<()> {
        let path = self.pointer()?;
        self.operations.push(PatchOperation::Replace(ReplaceOperation {
            path,
            value: value.clone(),
        }));
        Ok(())
    }

    fn pointer(&self) -> Result<PointerBuf> {
        let encoded = encode_pointer(&self.path);
        encoded
            .parse()
            .map_err(|e| Error::Generator(format!("invalid pointer {:?}: {}", encoded, e)))
    }
}

/// Encode path segments as a JSON pointer, escaping `~` and `/`
pub fn encode_pointer<S: AsRef<str>>(segments: &[S]) -> String {
    segments.iter().fold(String::new(), |mut pointer, segment| {
        pointer.push('/');
        pointer.push_str(&segment.as_ref().replace('~', "~0").replace('/', "~1"));
        pointer
    })
}
