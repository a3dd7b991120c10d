//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The keyed-archive archiver.
//!
//! Archiving flattens a host object graph into the `$objects` table. Every
//! value is appended to the table and referenced through its UID; instances
//! of custom classes claim their UID before their encode hook runs, so a
//! graph with shared or cyclic references through custom classes flattens
//! without recursing forever. Class identities are emitted once and shared
//! through a class-record map keyed by the full `$classes` list.

use log::debug;

use std::collections::HashMap;
use std::rc::Rc;

use crate::archive::{
    registry,
    NsValue,
    ARCHIVER_KEY,
    ARCHIVER_NAME,
    ARCHIVE_VERSION,
    CLASSES_KEY,
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

/// Packs a host object graph into an archived object table.
pub struct Archiver {
    /// The `$objects` array being built; index 0 is the `$null` sentinel.
    objects: Vec<Object>,
    /// Class records already emitted, keyed by their `$classes` list.
    class_map: HashMap<Vec<String>, Uid>,
    /// UIDs claimed by instances, keyed by allocation address.
    ref_map: HashMap<usize, Uid>,
}

impl Archiver {
    fn new() -> Self {
        Archiver {
            objects: vec![Object::from(NULL_SENTINEL)],
            class_map: HashMap::new(),
            ref_map: HashMap::new(),
        }
    }

    /// Appends an object to the table and returns its UID.
    fn push(&mut self, object: Object) -> Uid {
        let index = self.objects.len() as u64;
        self.objects.push(object);
        Uid::new(index)
    }

    /// Returns the UID of the class record for the given ancestry, emitting
    /// the record the first time the ancestry is seen.
    fn class_record_uid(&mut self, classes: Vec<String>) -> Result<Uid> {
        if let Some(uid) = self.class_map.get(&classes) {
            return Ok(*uid);
        }
        let class_name = classes
            .first()
            .cloned()
            .ok_or_else(|| {
                Error::MalformedClassRecord("adapter declared no class names".to_owned())
            })?;

        let mut record = Dictionary::new();
        record.insert(
            Object::from(CLASSES_KEY),
            Object::Array(classes.iter().map(|name| Object::from(name.as_str())).collect()),
        );
        record.insert(Object::from(CLASS_NAME_KEY), Object::from(class_name));

        let uid = self.push(Object::Dictionary(record));
        self.class_map.insert(classes, uid);
        Ok(uid)
    }

    /// Adds the encoded form of a value to the table, returning its UID.
    fn archive_value(&mut self, value: &NsValue) -> Result<Uid> {
        match value {
            NsValue::Null => Ok(Uid::NULL),
            NsValue::Boolean(value) => Ok(self.push(Object::Boolean(*value))),
            NsValue::Integer(value) => Ok(self.push(Object::Integer(*value))),
            NsValue::Real(value) => Ok(self.push(Object::from(*value))),
            NsValue::String(value) => Ok(self.push(Object::from(value.as_str()))),
            NsValue::Data(value) => Ok(self.push(Object::Data(value.clone()))),
            NsValue::Uid(value) => Ok(self.push(Object::Uid(*value))),
            NsValue::Uuid(_) => Err(Error::UnsupportedType("NSUUID")),

            NsValue::Date(date) => {
                let index = self.push(Object::Dictionary(Dictionary::new()));
                let class_uid = self.class_record_uid(vec!["NSDate".to_owned()])?;

                let mut record = Dictionary::new();
                record.insert(Object::from(CLASS_KEY), Object::Uid(class_uid));
                record.insert(Object::from("NS.time"), Object::from(date.absolute_time()));
                self.objects[index.get() as usize] = Object::Dictionary(record);
                Ok(index)
            }

            NsValue::Array(members) => {
                let index = self.push(Object::Dictionary(Dictionary::new()));
                let class_uid = self.class_record_uid(vec!["NSArray".to_owned()])?;

                let mut references = Vec::with_capacity(members.len());
                for member in members {
                    references.push(Object::Uid(self.archive_value(member)?));
                }

                let mut record = Dictionary::new();
                record.insert(Object::from(CLASS_KEY), Object::Uid(class_uid));
                record.insert(Object::from("NS.objects"), Object::Array(references));
                self.objects[index.get() as usize] = Object::Dictionary(record);
                Ok(index)
            }

            NsValue::Dictionary(entries) => {
                let index = self.push(Object::Dictionary(Dictionary::new()));
                let class_uid = self.class_record_uid(vec!["NSDictionary".to_owned()])?;

                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    keys.push(Object::Uid(self.push(Object::from(key.as_str()))));
                    values.push(Object::Uid(self.archive_value(value)?));
                }

                let mut record = Dictionary::new();
                record.insert(Object::from(CLASS_KEY), Object::Uid(class_uid));
                record.insert(Object::from("NS.keys"), Object::Array(keys));
                record.insert(Object::from("NS.objects"), Object::Array(values));
                self.objects[index.get() as usize] = Object::Dictionary(record);
                Ok(index)
            }

            NsValue::Instance(instance) => {
                let identity = Rc::as_ptr(instance) as usize;
                if let Some(uid) = self.ref_map.get(&identity) {
                    return Ok(*uid);
                }

                let adapter = registry::lookup(instance.class_name()).ok_or_else(|| {
                    Error::UnsupportedClass(instance.class_name().to_owned())
                })?;

                // Claim the UID before encoding so references back to this
                // instance resolve while its fields are still being written.
                let index = self.push(Object::Dictionary(Dictionary::new()));
                self.ref_map.insert(identity, index);

                let class_uid = self.class_record_uid(adapter.classes())?;
                let mut record = Dictionary::new();
                record.insert(Object::from(CLASS_KEY), Object::Uid(class_uid));

                adapter.encode_archive(
                    instance,
                    &mut ArchivingObject {
                        record: &mut record,
                        archiver: self,
                    },
                )?;

                self.objects[index.get() as usize] = Object::Dictionary(record);
                Ok(index)
            }
        }
    }
}

/// The encode view handed to class adapters.
///
/// An adapter writes its fields through [`encode`](Self::encode); booleans,
/// integers and reals are stored inline in the record, everything else is
/// archived and stored by reference.
pub struct ArchivingObject<'a> {
    record: &'a mut Dictionary,
    archiver: &'a mut Archiver,
}

impl ArchivingObject<'_> {
    /// Encodes one field of the record being written.
    pub fn encode(&mut self, field: &str, value: &NsValue) -> Result<()> {
        let encoded = match value {
            NsValue::Boolean(value) => Object::Boolean(*value),
            NsValue::Integer(value) => Object::Integer(*value),
            NsValue::Real(value) => Object::from(*value),
            other => Object::Uid(self.archiver.archive_value(other)?),
        };
        self.record.insert(Object::from(field), encoded);
        Ok(())
    }
}

/// Packs a host object graph into the top dictionary of a keyed archive.
pub fn to_object(value: &NsValue) -> Result<Object> {
    let mut archiver = Archiver::new();
    let root = archiver.archive_value(value)?;

    debug!(
        "archived object graph into {} table entries",
        archiver.objects.len(),
    );

    let mut top = Dictionary::new();
    top.insert(Object::from(ROOT_KEY), Object::Uid(root));

    let mut document = Dictionary::new();
    document.insert(Object::from(VERSION_KEY), Object::Integer(ARCHIVE_VERSION));
    document.insert(Object::from(ARCHIVER_KEY), Object::from(ARCHIVER_NAME));
    document.insert(Object::from(TOP_KEY), Object::Dictionary(top));
    document.insert(Object::from(OBJECTS_KEY), Object::Array(archiver.objects));
    Ok(Object::Dictionary(document))
}

/// Packs a host object graph and serializes it to bplist bytes.
pub fn to_bytes(value: &NsValue) -> Result<Vec<u8>> {
    crate::ser::to_bytes(&to_object(value)?)
}
