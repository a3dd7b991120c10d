//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The bplist object model.
//!
//! The bplist format version 00 supports the following object kinds:
//!
//! 1. Boolean.
//! 2. Integers, up to 64 bits long.
//! 3. Real, single- and double-precision.
//! 4. Data.
//! 5. Date.
//! 6. String.
//! 7. Uid.
//! 8. Array.
//! 9. Dictionary.
//!
//! # References
//!
//! 1. https://github.com/opensource-apple/CF/blob/master/ForFoundationOnly.h
//! 2. https://opensource.apple.com/source/CF/CF-855.17/CFBinaryPList.c

mod dictionary;

pub use dictionary::Dictionary;

use ordered_float::OrderedFloat;

/// Seconds between the unix epoch and the Core Data Epoch (2001-01-01 00:00:00 UTC).
pub const COCOA_EPOCH_OFFSET: f64 = 978_307_200.0;

/// A date structure roughly equivalent to an `NSDate`.
///
/// The value is stored as seconds since the unix epoch. On the wire, bplist
/// dates are `CFAbsoluteTime` offsets from the Core Data Epoch; the
/// conversion happens at the codec boundary.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Date {
    /// A double-precision 64-bit offset, in seconds, from the unix epoch.
    pub unix_seconds: OrderedFloat<f64>,
}

impl Date {
    /// Creates a date from seconds since the unix epoch.
    pub fn from_unix_seconds(seconds: f64) -> Self {
        Date { unix_seconds: OrderedFloat(seconds) }
    }

    /// Creates a date from a `CFAbsoluteTime` offset from the Core Data Epoch.
    pub fn from_absolute_time(absolute_time: f64) -> Self {
        Date::from_unix_seconds(absolute_time + COCOA_EPOCH_OFFSET)
    }

    /// The `CFAbsoluteTime` representation used on the wire.
    pub fn absolute_time(&self) -> f64 {
        self.unix_seconds.into_inner() - COCOA_EPOCH_OFFSET
    }
}

/// A UID structure referencing an element of an NSKeyedArchiver object table.
///
/// UIDs carry a non-negative integer and are never interchangeable with
/// `Object::Integer`; the distinction survives a round-trip.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Uid(u64);

impl Uid {
    /// The distinguished UID denoting the `$null` sentinel.
    pub const NULL: Uid = Uid(0);

    /// Creates a UID holding the given index.
    pub fn new(value: u64) -> Self {
        Uid(value)
    }

    /// Returns the index this UID holds.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Represents any valid bplist object.
///
/// See the `nskeyed::object` module documentation for usage examples.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Object {
    /// Represents a bplist boolean, like `NSNumber`.
    Boolean(bool),

    /// Represents a bplist integral value of up to 64 bits, like `NSNumber`.
    Integer(i64),

    /// Represents a bplist floating-point value, like `NSNumber`.
    ///
    /// Unlike normal `f64` values, these values have a defined order, implementing
    /// `Eq` and `Hash` in addition to `PartialOrd` and `PartialEq`.
    /// This allows them to be used as keys and values in Dictionaries.
    Real(OrderedFloat<f64>),

    /// Represents a bplist data instance, like `NSData`.
    Data(Vec<u8>),

    /// Represents a bplist date, like `NSDate`.
    ///
    /// Dates and reals are distinct object kinds even though both carry a
    /// double; the distinction survives a round-trip.
    Date(Date),

    /// Represents a bplist UID value, the reference type used by NSKeyedArchiver.
    Uid(Uid),

    /// Represents a bplist string, like `NSString`.
    ///
    /// Strings whose code points are all below 128 are stored as ASCII on the
    /// wire; everything else is stored as UTF-16 big-endian.
    String(String),

    /// Represents a bplist array of objects, like `NSArray<id>`.
    Array(Vec<Object>),

    /// Represents a bplist dictionary, like `NSDictionary<id,id>`.
    ///
    /// The dictionary preserves insertion order, so documents round-trip with
    /// their key order intact.
    Dictionary(Dictionary),
}

impl Object {
    /// Returns the boolean payload, if this is a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Object::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the floating-point payload, if this is a real.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(value) => Some(value.into_inner()),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the data payload, if this is a data object.
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Object::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the date payload, if this is a date.
    pub fn as_date(&self) -> Option<Date> {
        match self {
            Object::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the UID payload, if this is a UID.
    pub fn as_uid(&self) -> Option<Uid> {
        match self {
            Object::Uid(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the element list, if this is an array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the entry map, if this is a dictionary.
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Real(OrderedFloat(value))
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::String(value.to_owned())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::String(value)
    }
}

impl From<Vec<u8>> for Object {
    fn from(value: Vec<u8>) -> Self {
        Object::Data(value)
    }
}

impl From<Date> for Object {
    fn from(value: Date) -> Self {
        Object::Date(value)
    }
}

impl From<Uid> for Object {
    fn from(value: Uid) -> Self {
        Object::Uid(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::Array(value)
    }
}

impl From<Dictionary> for Object {
    fn from(value: Dictionary) -> Self {
        Object::Dictionary(value)
    }
}
