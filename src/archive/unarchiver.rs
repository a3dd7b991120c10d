//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The keyed-archive unarchiver.
//!
//! Unarchiving walks the `$objects` table starting from the UID stored in
//! `$top`, memoizing every materialized value by its UID. The cache slot for
//! a custom-class record is occupied by a pending token before the class's
//! decode hook runs, so a record reachable through two paths decodes to one
//! shared instance and a record that (transitively) requires itself is
//! reported rather than looped on.

use indexmap::IndexMap;
use log::debug;

use std::collections::HashMap;

use crate::archive::{
    registry,
    NsValue,
    ARCHIVER_KEY,
    ARCHIVER_NAME,
    ARCHIVE_VERSION,
    CLASS_KEY,
    CLASS_NAME_KEY,
    NULL_SENTINEL,
    OBJECTS_KEY,
    ROOT_KEY,
    TOP_KEY,
    VERSION_KEY,
};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, Uid};

/// A slot in the identity cache.
#[derive(Debug)]
enum Slot {
    /// The record is being decoded further up the stack.
    Pending,
    /// The record has been materialized.
    Done(NsValue),
}

/// Unpacks an archived object table into a host object graph.
#[derive(Debug)]
pub struct Unarchiver {
    /// The `$objects` array.
    objects: Vec<Object>,
    /// Values already materialized, keyed by UID.
    cache: HashMap<u64, Slot>,
}

impl Unarchiver {
    /// Resolves a UID against the object table.
    ///
    /// UID 0 is the `$null` sentinel and resolves to [`NsValue::Null`].
    fn resolve(&mut self, uid: Uid) -> Result<NsValue> {
        if uid == Uid::NULL {
            return Ok(NsValue::Null);
        }
        match self.cache.get(&uid.get()) {
            Some(Slot::Pending) => return Err(Error::CircularReference(uid.get())),
            Some(Slot::Done(value)) => return Ok(value.clone()),
            None => {}
        }

        let index = usize::try_from(uid.get())
            .map_err(|_| Error::UidOutOfRange(uid.get()))?;
        let record = self
            .objects
            .get(index)
            .cloned()
            .ok_or(Error::UidOutOfRange(uid.get()))?;

        let value = match record {
            Object::Dictionary(dict) if dict.contains_key(CLASS_KEY) => {
                self.cache.insert(uid.get(), Slot::Pending);
                self.decode_record(dict)?
            }
            other => convert(&other)?,
        };

        self.cache.insert(uid.get(), Slot::Done(value.clone()));
        Ok(value)
    }

    /// Decodes an object record through its class's handler.
    fn decode_record(&mut self, record: Dictionary) -> Result<NsValue> {
        let class_uid = record
            .get(CLASS_KEY)
            .and_then(Object::as_uid)
            .ok_or_else(|| {
                Error::MalformedClassRecord("object record's $class is not a UID".to_owned())
            })?;
        let class_name = self.class_name_for(class_uid)?;

        let adapter = registry::lookup(&class_name)
            .ok_or(Error::UnsupportedClass(class_name))?;
        adapter.decode_archive(&mut ArchivedObject {
            record,
            unarchiver: self,
        })
    }

    /// Reads `$classname` out of the class record the UID points at.
    fn class_name_for(&self, class_uid: Uid) -> Result<String> {
        let index = usize::try_from(class_uid.get())
            .map_err(|_| Error::UidOutOfRange(class_uid.get()))?;
        let record = self
            .objects
            .get(index)
            .ok_or(Error::UidOutOfRange(class_uid.get()))?;
        let dict = record.as_dictionary().ok_or_else(|| {
            Error::MalformedClassRecord(format!(
                "class record at uid {} is not a dictionary",
                class_uid.get(),
            ))
        })?;
        dict.get(CLASS_NAME_KEY)
            .and_then(Object::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::MalformedClassRecord("class record has no $classname".to_owned())
            })
    }
}

/// Converts a bplist value that is not an object record into its host form.
///
/// Containers convert recursively, but UID members are kept as UIDs; only
/// a field access through [`ArchivedObject::decode`] resolves them.
fn convert(object: &Object) -> Result<NsValue> {
    match object {
        Object::Boolean(value) => Ok(NsValue::Boolean(*value)),
        Object::Integer(value) => Ok(NsValue::Integer(*value)),
        Object::Real(value) => Ok(NsValue::Real(value.into_inner())),
        Object::String(value) => Ok(NsValue::String(value.clone())),
        Object::Data(value) => Ok(NsValue::Data(value.clone())),
        Object::Date(value) => Ok(NsValue::Date(*value)),
        Object::Uid(value) => Ok(NsValue::Uid(*value)),
        Object::Array(elements) => Ok(NsValue::Array(
            elements.iter().map(convert).collect::<Result<_>>()?,
        )),
        Object::Dictionary(dict) => {
            let mut entries = IndexMap::with_capacity(dict.len());
            for (key, value) in dict {
                let key = key
                    .as_str()
                    .ok_or(Error::SchemaViolation("dictionary key is not a string"))?;
                entries.insert(key.to_owned(), convert(value)?);
            }
            Ok(NsValue::Dictionary(entries))
        }
    }
}

/// The decode view handed to class adapters.
///
/// An adapter reads its fields through [`decode`](Self::decode); values
/// stored by reference are resolved transparently, closing over the
/// unarchiver's identity cache.
pub struct ArchivedObject<'a> {
    record: Dictionary,
    unarchiver: &'a mut Unarchiver,
}

impl ArchivedObject<'_> {
    /// Returns true when the record stores the field, even as `$null`.
    pub fn contains(&self, field: &str) -> bool {
        self.record.contains_key(field)
    }

    /// The record's field names, `$class` excluded.
    pub fn field_names(&self) -> Vec<String> {
        self.record
            .keys()
            .filter_map(Object::as_str)
            .filter(|key| *key != CLASS_KEY)
            .map(str::to_owned)
            .collect()
    }

    /// Decodes the named field.
    ///
    /// Inline primitives convert directly; UIDs resolve through the object
    /// table. A missing field and the `$null` UID both decode to
    /// [`NsValue::Null`].
    pub fn decode(&mut self, field: &str) -> Result<NsValue> {
        match self.record.get(field).cloned() {
            None => Ok(NsValue::Null),
            Some(Object::Uid(uid)) => self.unarchiver.resolve(uid),
            Some(other) => convert(&other),
        }
    }

    /// Resolves a UID the adapter pulled out of a field itself, such as the
    /// members of an `NS.objects` list.
    pub fn decode_uid(&mut self, uid: Uid) -> Result<NsValue> {
        self.unarchiver.resolve(uid)
    }
}

/// Unpacks a keyed archive from its decoded bplist top object.
pub fn from_object(top: &Object) -> Result<NsValue> {
    let dict = top
        .as_dictionary()
        .ok_or(Error::SchemaViolation("top object is not a dictionary"))?;

    match dict.get(ARCHIVER_KEY).and_then(Object::as_str) {
        Some(ARCHIVER_NAME) => {}
        Some(other) => return Err(Error::MissingArchiverHeader(other.to_owned())),
        None => return Err(Error::SchemaViolation("missing $archiver")),
    }

    match dict.get(VERSION_KEY).and_then(Object::as_integer) {
        Some(ARCHIVE_VERSION) => {}
        Some(other) => return Err(Error::InvalidVersion(other)),
        None => return Err(Error::SchemaViolation("missing $version")),
    }

    let objects = dict
        .get(OBJECTS_KEY)
        .and_then(Object::as_array)
        .ok_or(Error::SchemaViolation("missing $objects array"))?
        .to_vec();
    match objects.first().and_then(Object::as_str) {
        Some(NULL_SENTINEL) => {}
        _ => return Err(Error::SchemaViolation("$objects[0] is not the $null sentinel")),
    }

    let top_entries = dict
        .get(TOP_KEY)
        .and_then(Object::as_dictionary)
        .ok_or(Error::SchemaViolation("missing $top dictionary"))?
        .clone();

    debug!("unarchiving object table with {} entries", objects.len());

    let mut unarchiver = Unarchiver {
        objects,
        cache: HashMap::new(),
    };

    // A single entry keyed "root" unwraps to its value, per Cocoa convention.
    if top_entries.len() == 1 {
        if let Some(entry) = top_entries.get(ROOT_KEY) {
            let uid = entry
                .as_uid()
                .ok_or(Error::SchemaViolation("$top entry is not a UID"))?;
            return unarchiver.resolve(uid);
        }
    }

    let mut entries = IndexMap::with_capacity(top_entries.len());
    for (key, value) in &top_entries {
        let key = key
            .as_str()
            .ok_or(Error::SchemaViolation("$top key is not a string"))?;
        let uid = value
            .as_uid()
            .ok_or(Error::SchemaViolation("$top entry is not a UID"))?;
        entries.insert(key.to_owned(), unarchiver.resolve(uid)?);
    }
    Ok(NsValue::Dictionary(entries))
}

/// Parses a bplist document and unpacks the keyed archive it holds.
pub fn from_bytes(input: &[u8]) -> Result<NsValue> {
    from_object(&crate::de::from_bytes(input)?)
}
