
use indexmap::IndexMap;
use uuid::Uuid as UuidValue;

use std::rc::Rc;
use std::sync::Arc;

use nskeyed::{
    archive,
    generate,
    parse,
    register_record,
    unarchive,
    update_class_map,
    ClassAdapter,
    Date,
    Error,
    Field,
    Instance,
    NsValue,
    Object,
    Record,
    RecordAdapter,
    Uid,
};

#[derive(Debug, PartialEq)]
struct MyCocoaClass {
    first_property: String,
    second_property: i64,
}

fn wrong_type() -> Error {
    Error::MalformedClassRecord("MyCocoaClass field has the wrong type".to_owned())
}

impl Record for MyCocoaClass {
    fn class_name() -> &'static str {
        "MyCocoaClass"
    }

    fn fields() -> &'static [Field] {
        const FIELDS: [Field; 2] = [
            Field::new("first_property"),
            Field::new("second_property"),
        ];
        &FIELDS
    }

    fn field(&self, name: &str) -> NsValue {
        match name {
            "first_property" => NsValue::from(self.first_property.as_str()),
            "second_property" => NsValue::from(self.second_property),
            _ => NsValue::Null,
        }
    }

    fn from_fields(values: Vec<NsValue>) -> nskeyed::Result<Self> {
        let mut values = values.into_iter();
        let first = values.next().ok_or_else(wrong_type)?;
        let second = values.next().ok_or_else(wrong_type)?;
        Ok(MyCocoaClass {
            first_property: first.as_str().ok_or_else(wrong_type)?.to_owned(),
            second_property: second.as_integer().ok_or_else(wrong_type)?,
        })
    }
}

impl MyCocoaClass {
    fn value(first: &str, second: i64) -> NsValue {
        NsValue::from(Instance::new(
            Self::class_name(),
            MyCocoaClass {
                first_property: first.to_owned(),
                second_property: second,
            },
        ))
    }
}

fn default_volume() -> NsValue {
    NsValue::Integer(11)
}

#[derive(Debug, PartialEq)]
struct Preferences {
    theme: String,
    volume: i64,
}

impl Record for Preferences {
    fn class_name() -> &'static str {
        "Preferences"
    }

    fn fields() -> &'static [Field] {
        const FIELDS: [Field; 2] = [
            Field::new("theme"),
            Field::with_default("volume", default_volume),
        ];
        &FIELDS
    }

    fn field(&self, name: &str) -> NsValue {
        match name {
            "theme" => NsValue::from(self.theme.as_str()),
            "volume" => NsValue::from(self.volume),
            _ => NsValue::Null,
        }
    }

    fn from_fields(values: Vec<NsValue>) -> nskeyed::Result<Self> {
        let mut values = values.into_iter();
        let theme = values.next().and_then(|value| {
            value.as_str().map(str::to_owned)
        });
        let volume = values.next().and_then(|value| value.as_integer());
        match (theme, volume) {
            (Some(theme), Some(volume)) => Ok(Preferences { theme, volume }),
            _ => Err(Error::MalformedClassRecord(
                "Preferences field has the wrong type".to_owned(),
            )),
        }
    }
}

/// Builds the bytes of an archive whose `$objects` and root UID are chosen
/// by the test.
fn archive_document(objects: Vec<Object>, root: u64) -> Vec<u8> {
    let top = [(Object::from("root"), Object::Uid(Uid::new(root)))]
        .into_iter()
        .collect();
    let document = [
        (Object::from("$version"), Object::Integer(100_000)),
        (Object::from("$archiver"), Object::from("NSKeyedArchiver")),
        (Object::from("$top"), Object::Dictionary(top)),
        (Object::from("$objects"), Object::Array(objects)),
    ]
    .into_iter()
    .collect();
    generate(&Object::Dictionary(document)).unwrap()
}

fn obj_dict(entries: Vec<(&str, Object)>) -> Object {
    Object::Dictionary(
        entries
            .into_iter()
            .map(|(key, value)| (Object::from(key), value))
            .collect(),
    )
}

fn class_record(name: &str) -> Object {
    obj_dict(vec![
        ("$classes", Object::Array(vec![Object::from(name)])),
        ("$classname", Object::from(name)),
    ])
}

#[test]
fn test_roundtrip_simple_dictionary() {
    let mut map = IndexMap::new();
    map.insert("foo".to_owned(), NsValue::from("bar"));
    map.insert(
        "some_array".to_owned(),
        NsValue::Array(vec![
            NsValue::Integer(1),
            NsValue::Integer(2),
            NsValue::Integer(3),
            NsValue::Integer(4),
        ]),
    );
    let graph = NsValue::Dictionary(map);

    let bytes = archive(&graph).unwrap();

    // The intermediate bplist carries the archive schema.
    let top = parse(&bytes).unwrap();
    let top = top.as_dictionary().unwrap();
    for key in ["$top", "$objects", "$archiver", "$version"] {
        assert!(top.contains_key(key), "archive is missing {}", key);
    }

    assert_eq!(unarchive(&bytes).unwrap(), graph);
}

#[test]
fn test_unknown_class_error() {
    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![("$class", Object::Uid(Uid::new(2)))]),
            class_record("SomeUnknownClass"),
        ],
        1,
    );
    assert_eq!(
        unarchive(&bytes),
        Err(Error::UnsupportedClass("SomeUnknownClass".to_owned())),
    );
}

#[test]
fn test_registered_custom_class_roundtrip() {
    register_record::<MyCocoaClass>();

    let bytes = archive(&MyCocoaClass::value("a", 42)).unwrap();
    let decoded = unarchive(&bytes).unwrap();
    assert_eq!(
        decoded.downcast_ref::<MyCocoaClass>(),
        Some(&MyCocoaClass {
            first_property: "a".to_owned(),
            second_property: 42,
        }),
    );
}

#[test]
fn test_shared_instances_stay_shared() {
    register_record::<MyCocoaClass>();

    let shared = Rc::new(Instance::new(
        MyCocoaClass::class_name(),
        MyCocoaClass {
            first_property: "shared".to_owned(),
            second_property: 7,
        },
    ));
    let graph = NsValue::Array(vec![
        NsValue::Instance(shared.clone()),
        NsValue::Instance(shared),
    ]);

    let bytes = archive(&graph).unwrap();
    let decoded = unarchive(&bytes).unwrap();
    let members = decoded.as_array().unwrap();
    assert_eq!(members.len(), 2);

    let first = members[0].as_instance().unwrap();
    let second = members[1].as_instance().unwrap();
    assert!(Rc::ptr_eq(first, second), "shared member was duplicated");
    assert_eq!(
        members[0].downcast_ref::<MyCocoaClass>().unwrap().second_property,
        7,
    );
}

#[test]
fn test_null_root() {
    let bytes = archive(&NsValue::Null).unwrap();

    let top = parse(&bytes).unwrap();
    let top = top.as_dictionary().unwrap();
    let root = top
        .get("$top")
        .and_then(Object::as_dictionary)
        .and_then(|entries| entries.get("root"))
        .and_then(Object::as_uid)
        .unwrap();
    assert_eq!(root, Uid::new(0));

    let objects = top.get("$objects").and_then(Object::as_array).unwrap();
    assert_eq!(objects[0], Object::from("$null"));

    assert_eq!(unarchive(&bytes).unwrap(), NsValue::Null);
}

#[test]
fn test_roundtrip_scalars_and_dates() {
    let graph = NsValue::Array(vec![
        NsValue::Boolean(true),
        NsValue::Integer(-12),
        NsValue::Real(2.5),
        NsValue::from("text"),
        NsValue::Data(vec![1, 2, 3]),
        NsValue::Date(Date::from_unix_seconds(86_400.0)),
        NsValue::Null,
    ]);
    let bytes = archive(&graph).unwrap();
    assert_eq!(unarchive(&bytes).unwrap(), graph);
}

#[test]
fn test_top_with_multiple_entries() {
    let objects = vec![
        Object::from("$null"),
        Object::from("first"),
        Object::Integer(2),
    ];
    let top = [
        (Object::from("a"), Object::Uid(Uid::new(1))),
        (Object::from("b"), Object::Uid(Uid::new(2))),
    ]
    .into_iter()
    .collect();
    let document = [
        (Object::from("$version"), Object::Integer(100_000)),
        (Object::from("$archiver"), Object::from("NSKeyedArchiver")),
        (Object::from("$top"), Object::Dictionary(top)),
        (Object::from("$objects"), Object::Array(objects)),
    ]
    .into_iter()
    .collect();
    let bytes = generate(&Object::Dictionary(document)).unwrap();

    let mut expected = IndexMap::new();
    expected.insert("a".to_owned(), NsValue::from("first"));
    expected.insert("b".to_owned(), NsValue::Integer(2));
    assert_eq!(unarchive(&bytes).unwrap(), NsValue::Dictionary(expected));
}

#[test]
fn test_wrong_archiver_is_rejected() {
    let top = [(Object::from("root"), Object::Uid(Uid::new(0)))]
        .into_iter()
        .collect();
    let document = [
        (Object::from("$version"), Object::Integer(100_000)),
        (Object::from("$archiver"), Object::from("NSArchiver")),
        (Object::from("$top"), Object::Dictionary(top)),
        (Object::from("$objects"), Object::Array(vec![Object::from("$null")])),
    ]
    .into_iter()
    .collect::<nskeyed::Dictionary>();
    let bytes = generate(&Object::Dictionary(document)).unwrap();
    assert_eq!(
        unarchive(&bytes),
        Err(Error::MissingArchiverHeader("NSArchiver".to_owned())),
    );
}

#[test]
fn test_wrong_version_is_rejected() {
    let top = [(Object::from("root"), Object::Uid(Uid::new(0)))]
        .into_iter()
        .collect();
    let document = [
        (Object::from("$version"), Object::Integer(99)),
        (Object::from("$archiver"), Object::from("NSKeyedArchiver")),
        (Object::from("$top"), Object::Dictionary(top)),
        (Object::from("$objects"), Object::Array(vec![Object::from("$null")])),
    ]
    .into_iter()
    .collect::<nskeyed::Dictionary>();
    let bytes = generate(&Object::Dictionary(document)).unwrap();
    assert_eq!(unarchive(&bytes), Err(Error::InvalidVersion(99)));
}

#[test]
fn test_missing_null_sentinel_is_rejected() {
    let bytes = archive_document(vec![Object::from("not null")], 0);
    assert_eq!(
        unarchive(&bytes),
        Err(Error::SchemaViolation("$objects[0] is not the $null sentinel")),
    );
}

#[test]
fn test_uid_out_of_range_is_rejected() {
    let bytes = archive_document(vec![Object::from("$null")], 9);
    assert_eq!(unarchive(&bytes), Err(Error::UidOutOfRange(9)));
}

#[test]
fn test_decode_builtin_string_record() {
    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("NS.string", Object::from("hello")),
            ]),
            class_record("NSMutableString"),
        ],
        1,
    );
    assert_eq!(unarchive(&bytes).unwrap(), NsValue::from("hello"));
}

#[test]
fn test_decode_builtin_set_record() {
    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                (
                    "NS.objects",
                    Object::Array(vec![
                        Object::Uid(Uid::new(3)),
                        Object::Uid(Uid::new(4)),
                    ]),
                ),
            ]),
            class_record("NSSet"),
            Object::from("a"),
            Object::from("b"),
        ],
        1,
    );
    assert_eq!(
        unarchive(&bytes).unwrap(),
        NsValue::Array(vec![NsValue::from("a"), NsValue::from("b")]),
    );
}

#[test]
fn test_decode_builtin_uuid_record() {
    let uuid_bytes = (0u8 .. 16).collect::<Vec<u8>>();
    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("NS.uuidbytes", Object::Data(uuid_bytes.clone())),
            ]),
            class_record("NSUUID"),
        ],
        1,
    );
    let expected = UuidValue::from_slice(&uuid_bytes).unwrap();
    assert_eq!(unarchive(&bytes).unwrap(), NsValue::Uuid(expected));
}

#[test]
fn test_decode_builtin_date_record() {
    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("NS.time", Object::from(120.5)),
            ]),
            class_record("NSDate"),
        ],
        1,
    );
    assert_eq!(
        unarchive(&bytes).unwrap(),
        NsValue::Date(Date::from_absolute_time(120.5)),
    );
}

#[test]
fn test_missing_field_uses_declared_default() {
    register_record::<Preferences>();

    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("theme", Object::from("dark")),
            ]),
            class_record("Preferences"),
        ],
        1,
    );
    let decoded = unarchive(&bytes).unwrap();
    assert_eq!(
        decoded.downcast_ref::<Preferences>(),
        Some(&Preferences {
            theme: "dark".to_owned(),
            volume: 11,
        }),
    );
}

#[test]
fn test_missing_field_without_default_fails() {
    register_record::<MyCocoaClass>();

    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("first_property", Object::from("only")),
            ]),
            class_record("MyCocoaClass"),
        ],
        1,
    );
    assert!(matches!(
        unarchive(&bytes),
        Err(Error::MalformedClassRecord(_)),
    ));
}

#[test]
fn test_unmapped_field_is_rejected() {
    register_record::<MyCocoaClass>();

    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("first_property", Object::from("a")),
                ("second_property", Object::Integer(1)),
                ("surplus", Object::Integer(2)),
            ]),
            class_record("MyCocoaClass"),
        ],
        1,
    );
    assert!(matches!(
        unarchive(&bytes),
        Err(Error::MalformedClassRecord(_)),
    ));
}

#[test]
fn test_update_class_map_registers_alias() {
    update_class_map([(
        "AliasClass".to_owned(),
        Arc::new(RecordAdapter::<MyCocoaClass>::new()) as Arc<dyn ClassAdapter>,
    )]);

    let bytes = archive_document(
        vec![
            Object::from("$null"),
            obj_dict(vec![
                ("$class", Object::Uid(Uid::new(2))),
                ("first_property", Object::from("aliased")),
                ("second_property", Object::Integer(3)),
            ]),
            class_record("AliasClass"),
        ],
        1,
    );
    let decoded = unarchive(&bytes).unwrap();
    assert_eq!(
        decoded.downcast_ref::<MyCocoaClass>(),
        Some(&MyCocoaClass {
            first_property: "aliased".to_owned(),
            second_property: 3,
        }),
    );
}

#[test]
fn test_nested_graph_roundtrip() {
    register_record::<MyCocoaClass>();

    let mut inner = IndexMap::new();
    inner.insert("object".to_owned(), MyCocoaClass::value("deep", -5));
    inner.insert(
        "when".to_owned(),
        NsValue::Date(Date::from_unix_seconds(1_000.0)),
    );
    let graph = NsValue::Array(vec![
        NsValue::Dictionary(inner),
        NsValue::Data(vec![0xDE, 0xAD]),
    ]);

    let bytes = archive(&graph).unwrap();
    let decoded = unarchive(&bytes).unwrap();
    let members = decoded.as_array().unwrap();

    let inner = members[0].as_dictionary().unwrap();
    assert_eq!(
        inner["object"].downcast_ref::<MyCocoaClass>(),
        Some(&MyCocoaClass {
            first_property: "deep".to_owned(),
            second_property: -5,
        }),
    );
    assert_eq!(
        inner["when"],
        NsValue::Date(Date::from_unix_seconds(1_000.0)),
    );
    assert_eq!(members[1], NsValue::Data(vec![0xDE, 0xAD]));
}
