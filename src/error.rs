//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Binary property list and keyed-archive serialization error.
///
/// Errors carry the offending offset, index, or class name where one exists.
/// All failure paths are surfaced through `Result`; the codec makes no
/// partial-result guarantees.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// The bplist magic number and version marker is missing or invalid.
    #[error("missing or invalid bplist header")]
    MissingOrInvalidHeader,
    /// The version number in the header is not one of the versions supported by this library.
    #[error("document is not a version (0,0) bplist")]
    UnsupportedVersion,
    /// The trailer with the metadata necessary to interpret the offset table and object table is missing or invalid.
    #[error("missing or invalid bplist trailer")]
    MissingOrInvalidTrailer,
    /// The trailer declares an offset or reference width other than 1, 2, 4 or 8 bytes.
    #[error("trailer declares invalid integer width {0}")]
    InvalidTrailerWidth(usize),
    /// The offset table used to determine the location of objects is missing or invalid.
    #[error("missing or invalid bplist offset table")]
    MissingOrInvalidOffsetTable,
    /// Encountered a reference to an object not in the offset table.
    #[error("invalid reference to object {0} not in offset table")]
    InvalidObjectReference(usize),
    /// Encountered an offset pointing outside the object table.
    #[error("invalid offset {offset:#x} for object {object}")]
    InvalidOffsetToObject {
        object: usize,
        offset: usize,
    },
    /// The root object in the trailer is not in the offset table.
    #[error("invalid root object in document metadata")]
    InvalidRootObject,
    /// Encountered a marker byte for an object format not supported by this library,
    /// or an object whose payload could not be decoded.
    #[error("invalid or unsupported object at offset {0:#x}")]
    InvalidObject(usize),
    /// Binary property list containers are acyclic; an object contained itself.
    #[error("cycle detected through object {0}")]
    CycleDetected(usize),
    /// Prematurely reached the end of the input.
    #[error("unexpected end of input")]
    Eof,

    /// The generator or archiver received a value it cannot emit.
    #[error("unsupported value type: {0}")]
    UnsupportedType(&'static str),
    /// Object count or byte size exceeds what the chosen widths can express.
    #[error("document exceeds representable size")]
    Overflow,

    /// The archive was not produced by NSKeyedArchiver.
    #[error("unsupported archiver: `{0}'")]
    MissingArchiverHeader(String),
    /// The archive version does not match the keyed-archive implementation version.
    #[error("expected archive version 100000, got `{0}'")]
    InvalidVersion(i64),
    /// The archive is missing `$top`, `$objects`, or violates the `$objects[0]` sentinel.
    #[error("malformed archive: {0}")]
    SchemaViolation(&'static str),
    /// A UID points outside the `$objects` table.
    #[error("uid {0} is out of range of the object table")]
    UidOutOfRange(u64),
    /// An object record's `$class` chain is missing or malformed.
    #[error("malformed class record: {0}")]
    MalformedClassRecord(String),
    /// The unarchiver encountered a class name without a handler or registered adapter.
    #[error("no class mapping registered for `{0}'")]
    UnsupportedClass(String),
    /// A decoder required a value that is still being constructed.
    #[error("archive has an unresolvable cycle through uid {0}")]
    CircularReference(u64),
}
