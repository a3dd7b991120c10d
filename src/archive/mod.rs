//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The keyed-archive layer.
//!
//! An `NSKeyedArchiver` archive is a bplist whose top dictionary carries four
//! entries: `$version`, `$archiver`, `$top` and `$objects`. Application
//! objects live in the flat `$objects` array and reference each other through
//! UIDs; index 0 is the `$null` sentinel. The [`unarchiver`] walks that table
//! back into a host object graph, and the [`archiver`] flattens a host graph
//! into it.
//!
//! Host graphs are trees of [`NsValue`]. Instances of registered custom
//! classes are reference-counted, so a value reachable through two paths
//! stays one value across a round-trip.

pub mod archiver;
pub mod record;
pub mod registry;
pub mod unarchiver;

use indexmap::IndexMap;
use uuid::Uuid as UuidValue;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::object::{Date, Uid};

/// The value of the `$archiver` entry this library reads and writes.
pub(crate) const ARCHIVER_NAME: &str = "NSKeyedArchiver";

/// The implementation version Cocoa stamps into `$version`.
pub(crate) const ARCHIVE_VERSION: i64 = 100_000;

/// The string stored at `$objects[0]`.
pub(crate) const NULL_SENTINEL: &str = "$null";

/// The conventional single key of `$top`.
pub(crate) const ROOT_KEY: &str = "root";

pub(crate) const ARCHIVER_KEY: &str = "$archiver";
pub(crate) const VERSION_KEY: &str = "$version";
pub(crate) const TOP_KEY: &str = "$top";
pub(crate) const OBJECTS_KEY: &str = "$objects";
pub(crate) const CLASS_KEY: &str = "$class";
pub(crate) const CLASS_NAME_KEY: &str = "$classname";
pub(crate) const CLASSES_KEY: &str = "$classes";

/// An instance of a registered custom class.
///
/// The payload is the host value produced by the class's adapter; the class
/// name ties the instance back to its adapter when it is archived again.
pub struct Instance {
    class_name: String,
    value: Box<dyn Any>,
}

impl Instance {
    /// Wraps a host value under the given Cocoa class name.
    pub fn new<T: Any>(class_name: impl Into<String>, value: T) -> Self {
        Instance {
            class_name: class_name.into(),
            value: Box::new(value),
        }
    }

    /// The Cocoa class name this instance is archived under.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Borrows the payload as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Instance")
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}

/// Instances compare by identity; two handles are equal when they point at
/// the same allocation.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// A value in a host object graph.
///
/// This is what [`unarchiver::from_bytes`] produces and what
/// [`archiver::to_bytes`] consumes. Scalars carry their payload directly;
/// custom-class instances are shared through [`Rc`] so DAG structure
/// survives a round-trip.
#[derive(Clone, Debug, PartialEq)]
pub enum NsValue {
    /// The absence of a value; stored as UID 0 on the wire.
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Data(Vec<u8>),
    /// A point in time, from `NSDate` or a bare bplist date.
    Date(Date),
    /// A raw UID the caller chose to expose; distinct from `Integer`.
    Uid(Uid),
    /// A UUID decoded from an `NSUUID` record.
    Uuid(UuidValue),
    Array(Vec<NsValue>),
    Dictionary(IndexMap<String, NsValue>),
    /// An instance of a registered custom class.
    Instance(Rc<Instance>),
}

impl NsValue {
    /// Returns true for the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, NsValue::Null)
    }

    /// Returns the boolean payload, if this is a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            NsValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NsValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the floating-point payload, if this is a real.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            NsValue::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NsValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the data payload, if this is a data value.
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            NsValue::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the date payload, if this is a date.
    pub fn as_date(&self) -> Option<Date> {
        match self {
            NsValue::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the UID payload, if this is a UID.
    pub fn as_uid(&self) -> Option<Uid> {
        match self {
            NsValue::Uid(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the element list, if this is an array.
    pub fn as_array(&self) -> Option<&[NsValue]> {
        match self {
            NsValue::Array(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the entry map, if this is a dictionary.
    pub fn as_dictionary(&self) -> Option<&IndexMap<String, NsValue>> {
        match self {
            NsValue::Dictionary(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the instance handle, if this is a custom-class instance.
    pub fn as_instance(&self) -> Option<&Rc<Instance>> {
        match self {
            NsValue::Instance(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows the payload of a custom-class instance as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_instance().and_then(|instance| instance.downcast_ref())
    }
}

impl From<bool> for NsValue {
    fn from(value: bool) -> Self {
        NsValue::Boolean(value)
    }
}

impl From<i64> for NsValue {
    fn from(value: i64) -> Self {
        NsValue::Integer(value)
    }
}

impl From<f64> for NsValue {
    fn from(value: f64) -> Self {
        NsValue::Real(value)
    }
}

impl From<&str> for NsValue {
    fn from(value: &str) -> Self {
        NsValue::String(value.to_owned())
    }
}

impl From<String> for NsValue {
    fn from(value: String) -> Self {
        NsValue::String(value)
    }
}

impl From<Vec<u8>> for NsValue {
    fn from(value: Vec<u8>) -> Self {
        NsValue::Data(value)
    }
}

impl From<Date> for NsValue {
    fn from(value: Date) -> Self {
        NsValue::Date(value)
    }
}

impl From<Uid> for NsValue {
    fn from(value: Uid) -> Self {
        NsValue::Uid(value)
    }
}

impl From<Vec<NsValue>> for NsValue {
    fn from(value: Vec<NsValue>) -> Self {
        NsValue::Array(value)
    }
}

impl From<IndexMap<String, NsValue>> for NsValue {
    fn from(value: IndexMap<String, NsValue>) -> Self {
        NsValue::Dictionary(value)
    }
}

impl From<Instance> for NsValue {
    fn from(value: Instance) -> Self {
        NsValue::Instance(Rc::new(value))
    }
}

impl From<Rc<Instance>> for NsValue {
    fn from(value: Rc<Instance>) -> Self {
        NsValue::Instance(value)
    }
}
