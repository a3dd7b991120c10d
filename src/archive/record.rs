//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The record adapter.
//!
//! Most custom classes are plain records: a fixed set of named fields with
//! no encode-time logic. Declaring such a type as a [`Record`] gives it a
//! generic adapter for free; [`RecordAdapter`] walks the field schema in
//! declaration order on both paths, so the type never touches the coder
//! views directly.
//!
//! Field names beginning `NS` map to the `NS.`-dotted spelling Cocoa uses
//! for its own records, since a dot cannot appear in an identifier.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use crate::archive::archiver::ArchivingObject;
use crate::archive::registry::ClassAdapter;
use crate::archive::unarchiver::ArchivedObject;
use crate::archive::{Instance, NsValue};
use crate::error::{Error, Result};

/// A single entry in a record's field schema.
#[derive(Clone, Copy, Debug)]
pub struct Field {
    name: &'static str,
    default: Option<fn() -> NsValue>,
}

impl Field {
    /// A field that must be present in every archive of the record.
    pub const fn new(name: &'static str) -> Self {
        Field { name, default: None }
    }

    /// A field that falls back to a default when an archive omits it.
    pub const fn with_default(name: &'static str, default: fn() -> NsValue) -> Self {
        Field { name, default: Some(default) }
    }

    /// The declared field name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A record type with named fields that archives itself field by field.
pub trait Record: Any + fmt::Debug + Sized {
    /// The Cocoa class name instances are archived under.
    fn class_name() -> &'static str;

    /// Ancestors recorded in `$classes`; defaults to the class alone.
    fn classes() -> Vec<String> {
        vec![Self::class_name().to_owned()]
    }

    /// When true, archive fields with no schema entry are ignored instead of
    /// rejected during decode.
    fn ignore_unmapped() -> bool {
        false
    }

    /// The field schema, in declaration order.
    fn fields() -> &'static [Field];

    /// Returns the current value of the named field.
    fn field(&self, name: &str) -> NsValue;

    /// Builds an instance from decoded field values, one per schema entry,
    /// in schema order.
    fn from_fields(values: Vec<NsValue>) -> Result<Self>;
}

/// Maps a declared field name to its on-wire spelling.
fn wire_name(name: &str) -> Cow<'_, str> {
    match name.strip_prefix("NS") {
        Some(rest) => Cow::Owned(format!("NS.{rest}")),
        None => Cow::Borrowed(name),
    }
}

/// Maps an on-wire field name back to its declared spelling.
fn declared_name(wire: &str) -> Cow<'_, str> {
    match wire.strip_prefix("NS.") {
        Some(rest) => Cow::Owned(format!("NS{rest}")),
        None => Cow::Borrowed(wire),
    }
}

/// The generic adapter for a [`Record`] type.
pub struct RecordAdapter<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> RecordAdapter<T> {
    pub fn new() -> Self {
        RecordAdapter { marker: PhantomData }
    }
}

impl<T> Default for RecordAdapter<T> {
    fn default() -> Self {
        RecordAdapter::new()
    }
}

impl<T: Record> ClassAdapter for RecordAdapter<T> {
    fn classes(&self) -> Vec<String> {
        T::classes()
    }

    fn decode_archive(&self, coder: &mut ArchivedObject<'_>) -> Result<NsValue> {
        if !T::ignore_unmapped() {
            for wire in coder.field_names() {
                let declared = declared_name(&wire);
                if !T::fields().iter().any(|field| field.name == declared) {
                    return Err(Error::MalformedClassRecord(format!(
                        "{} has no field mapping for `{}'",
                        T::class_name(),
                        wire,
                    )));
                }
            }
        }

        let mut values = Vec::with_capacity(T::fields().len());
        for field in T::fields() {
            let wire = wire_name(field.name);
            if coder.contains(&wire) {
                values.push(coder.decode(&wire)?);
            } else if let Some(default) = field.default {
                values.push(default());
            } else {
                return Err(Error::MalformedClassRecord(format!(
                    "{} record is missing field `{}'",
                    T::class_name(),
                    field.name,
                )));
            }
        }
        Ok(NsValue::from(Instance::new(
            T::class_name(),
            T::from_fields(values)?,
        )))
    }

    fn encode_archive(
        &self,
        instance: &Instance,
        coder: &mut ArchivingObject<'_>,
    ) -> Result<()> {
        let record = instance.downcast_ref::<T>().ok_or_else(|| {
            Error::UnsupportedClass(instance.class_name().to_owned())
        })?;
        for field in T::fields() {
            coder.encode(&wire_name(field.name), &record.field(field.name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{declared_name, wire_name};

    #[test]
    fn test_wire_name_mapping() {
        assert_eq!(wire_name("title"), "title");
        assert_eq!(wire_name("NSdata"), "NS.data");
        assert_eq!(wire_name("NStime"), "NS.time");
    }

    #[test]
    fn test_declared_name_mapping() {
        assert_eq!(declared_name("title"), "title");
        assert_eq!(declared_name("NS.data"), "NSdata");
    }
}
