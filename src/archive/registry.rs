//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The class registry.
//!
//! A process-wide map from Cocoa class names to the adapters that encode and
//! decode their instances. The map is seeded with handlers for the built-in
//! Foundation classes and extended through [`register`] and
//! [`update_class_map`]; registering a name again replaces the previous
//! adapter silently.
//!
//! Registrations are expected at program startup. Reads during archiving and
//! unarchiving go through a reader-writer lock, so late registrations are
//! safe but a decode running concurrently with one sees either the old or
//! the new adapter, never a torn map.

use once_cell::sync::Lazy;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::archive::archiver::ArchivingObject;
use crate::archive::record::{Record, RecordAdapter};
use crate::archive::unarchiver::ArchivedObject;
use crate::archive::{Instance, NsValue};
use crate::error::{Error, Result};
use crate::object::Date;

/// Encodes and decodes instances of one Cocoa class.
pub trait ClassAdapter: Send + Sync {
    /// The class name plus its ancestors, recorded in `$classes`. The first
    /// entry is the class itself.
    fn classes(&self) -> Vec<String>;

    /// Rebuilds a host value from an object record.
    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue>;

    /// Writes an instance's fields into an object record.
    ///
    /// Built-in classes are emitted structurally by the archiver and never
    /// receive this call, so handlers that only ever decode can rely on the
    /// default.
    fn encode_archive(
        &self,
        instance: &Instance,
        coder: &mut ArchivingObject<'_>,
    ) -> Result<()> {
        let _ = coder;
        Err(Error::UnsupportedClass(instance.class_name().to_owned()))
    }
}

type AdapterMap = HashMap<String, Arc<dyn ClassAdapter>>;

static CLASS_MAP: Lazy<RwLock<AdapterMap>> = Lazy::new(|| RwLock::new(builtin_class_map()));

/// Registers an adapter under a class name, replacing any previous adapter
/// for that name.
pub fn register(name: impl Into<String>, adapter: Arc<dyn ClassAdapter>) {
    CLASS_MAP
        .write()
        .expect("class registry lock poisoned")
        .insert(name.into(), adapter);
}

/// Merges a batch of `{class name: adapter}` entries into the registry.
pub fn update_class_map<I>(mapping: I)
where
    I: IntoIterator<Item = (String, Arc<dyn ClassAdapter>)>,
{
    CLASS_MAP
        .write()
        .expect("class registry lock poisoned")
        .extend(mapping);
}

/// Registers a [`Record`] type under its declared class name.
pub fn register_record<T: Record>() {
    register(T::class_name(), Arc::new(RecordAdapter::<T>::new()));
}

/// Looks up the adapter registered for a class name.
pub fn lookup(name: &str) -> Option<Arc<dyn ClassAdapter>> {
    CLASS_MAP
        .read()
        .expect("class registry lock poisoned")
        .get(name)
        .cloned()
}

/// Decodes a field that holds a list of references, resolving each member.
fn decode_object_list(coder: &mut ArchivedObject<'_>, field: &str) -> Result<Vec<NsValue>> {
    match coder.decode(field)? {
        NsValue::Array(members) => members
            .into_iter()
            .map(|member| match member {
                NsValue::Uid(uid) => coder.decode_uid(uid),
                inline => Ok(inline),
            })
            .collect(),
        _ => Err(Error::MalformedClassRecord(format!(
            "`{field}' is not an array",
        ))),
    }
}

/// Handler for `NSNull`.
struct NullCoder;

impl ClassAdapter for NullCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSNull".to_owned()]
    }

    fn decode_archive(&self, _coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        Ok(NsValue::Null)
    }
}

/// Handler for `NSDictionary` and `NSMutableDictionary` records.
struct DictionaryCoder;

impl ClassAdapter for DictionaryCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSDictionary".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        let keys = decode_object_list(coder, "NS.keys")?;
        let values = decode_object_list(coder, "NS.objects")?;
        if keys.len() != values.len() {
            return Err(Error::MalformedClassRecord(
                "NS.keys and NS.objects differ in length".to_owned(),
            ));
        }

        let mut entries = indexmap::IndexMap::with_capacity(keys.len());
        for (key, value) in keys.into_iter().zip(values) {
            match key {
                NsValue::String(key) => {
                    entries.insert(key, value);
                }
                _ => {
                    return Err(Error::MalformedClassRecord(
                        "NSDictionary key is not a string".to_owned(),
                    ))
                }
            }
        }
        Ok(NsValue::Dictionary(entries))
    }
}

/// Handler for `NSArray` and `NSMutableArray` records.
struct ArrayCoder;

impl ClassAdapter for ArrayCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSArray".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        Ok(NsValue::Array(decode_object_list(coder, "NS.objects")?))
    }
}

/// Handler for `NSSet` and `NSMutableSet` records.
///
/// Sets are unordered on the Cocoa side; members are yielded in object-table
/// order. Sets are never emitted by the archiver.
struct SetCoder;

impl ClassAdapter for SetCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSSet".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        Ok(NsValue::Array(decode_object_list(coder, "NS.objects")?))
    }
}

/// Handler for `NSString` and `NSMutableString` records.
struct StringCoder;

impl ClassAdapter for StringCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSString".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        match coder.decode("NS.string")? {
            value @ NsValue::String(_) => Ok(value),
            _ => Err(Error::MalformedClassRecord(
                "NS.string is not a string".to_owned(),
            )),
        }
    }
}

/// Handler for `NSDate` records.
struct DateCoder;

impl ClassAdapter for DateCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSDate".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        let offset = match coder.decode("NS.time")? {
            NsValue::Real(value) => value,
            NsValue::Integer(value) => value as f64,
            _ => {
                return Err(Error::MalformedClassRecord(
                    "NS.time is not a number".to_owned(),
                ))
            }
        };
        Ok(NsValue::Date(Date::from_absolute_time(offset)))
    }
}

/// Handler for `NSData` and `NSMutableData` records.
struct DataCoder;

impl ClassAdapter for DataCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSData".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        match coder.decode("NS.data")? {
            value @ NsValue::Data(_) => Ok(value),
            _ => Err(Error::MalformedClassRecord(
                "NS.data is not a data value".to_owned(),
            )),
        }
    }
}

/// Handler for `NSUUID` records.
struct UuidCoder;

impl ClassAdapter for UuidCoder {
    fn classes(&self) -> Vec<String> {
        vec!["NSUUID".to_owned()]
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        let bytes = match coder.decode("NS.uuidbytes")? {
            NsValue::Data(bytes) => bytes,
            _ => {
                return Err(Error::MalformedClassRecord(
                    "NS.uuidbytes is not a data value".to_owned(),
                ))
            }
        };
        let uuid = uuid::Uuid::from_slice(&bytes).map_err(|_| {
            Error::MalformedClassRecord("NS.uuidbytes is not 16 bytes".to_owned())
        })?;
        Ok(NsValue::Uuid(uuid))
    }
}

/// The handlers every registry starts out with.
fn builtin_class_map() -> AdapterMap {
    let dictionary: Arc<dyn ClassAdapter> = Arc::new(DictionaryCoder);
    let array: Arc<dyn ClassAdapter> = Arc::new(ArrayCoder);
    let set: Arc<dyn ClassAdapter> = Arc::new(SetCoder);
    let string: Arc<dyn ClassAdapter> = Arc::new(StringCoder);
    let data: Arc<dyn ClassAdapter> = Arc::new(DataCoder);

    let mut map = AdapterMap::new();
    map.insert("NSNull".to_owned(), Arc::new(NullCoder));
    map.insert("NSDictionary".to_owned(), dictionary.clone());
    map.insert("NSMutableDictionary".to_owned(), dictionary);
    map.insert("NSArray".to_owned(), array.clone());
    map.insert("NSMutableArray".to_owned(), array);
    map.insert("NSSet".to_owned(), set.clone());
    map.insert("NSMutableSet".to_owned(), set);
    map.insert("NSString".to_owned(), string.clone());
    map.insert("NSMutableString".to_owned(), string);
    map.insert("NSDate".to_owned(), Arc::new(DateCoder));
    map.insert("NSData".to_owned(), data.clone());
    map.insert("NSMutableData".to_owned(), data);
    map.insert("NSUUID".to_owned(), Arc::new(UuidCoder));
    map
}
