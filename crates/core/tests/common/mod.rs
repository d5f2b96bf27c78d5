//! Hand-assembled class files for the integration tests.

#![allow(dead_code)]

use classdex_core::logging::init_test_logging;
use classdex_core::{Index, Indexer, NameTable, ParserConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_MODULE: u16 = 0x8000;
pub const ACC_MANDATED: u16 = 0x8000;

/// An element value for [`ClassFileBuilder::annotation`].
#[derive(Debug, Clone)]
pub enum Element {
    Int(i32),
    Bool(bool),
    Str(&'static str),
    Enum(&'static str, &'static str),
    Class(&'static str),
    Array(Vec<Element>),
    Nested(&'static str, Vec<(&'static str, Element)>),
}

/// Builds a class file byte by byte. Constant pool entries are deduplicated.
pub struct ClassFileBuilder {
    major: u16,
    minor: u16,
    pool: Vec<u8>,
    pool_slots: u16,
    entries: HashMap<Vec<u8>, u16>,
    flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`, version 61 (Java 17).
    pub fn new(internal_name: &str) -> Self {
        let mut builder = Self {
            major: 61,
            minor: 0,
            pool: Vec::new(),
            pool_slots: 1,
            entries: HashMap::new(),
            flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(internal_name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn superclass(mut self, internal_name: Option<&str>) -> Self {
        self.super_class = match internal_name {
            Some(name) => self.class(name),
            None => 0,
        };
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        let index = self.class(internal_name);
        self.interfaces.push(index);
        self
    }

    fn entry(&mut self, encoded: Vec<u8>, slots: u16) -> u16 {
        if let Some(&index) = self.entries.get(&encoded) {
            return index;
        }
        let index = self.pool_slots;
        self.pool.extend_from_slice(&encoded);
        self.pool_slots += slots;
        self.entries.insert(encoded, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let mut encoded = vec![1];
        encoded.extend_from_slice(&(text.len() as u16).to_be_bytes());
        encoded.extend_from_slice(text.as_bytes());
        self.entry(encoded, 1)
    }

    fn indexed(&mut self, tag: u8, index: u16) -> u16 {
        let mut encoded = vec![tag];
        encoded.extend_from_slice(&index.to_be_bytes());
        self.entry(encoded, 1)
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.indexed(7, name)
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let value = self.utf8(text);
        self.indexed(8, value)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut encoded = vec![3];
        encoded.extend_from_slice(&value.to_be_bytes());
        self.entry(encoded, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut encoded = vec![5];
        encoded.extend_from_slice(&value.to_be_bytes());
        self.entry(encoded, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut encoded = vec![12];
        encoded.extend_from_slice(&name.to_be_bytes());
        encoded.extend_from_slice(&descriptor.to_be_bytes());
        self.entry(encoded, 1)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        let mut encoded = vec![10];
        encoded.extend_from_slice(&class.to_be_bytes());
        encoded.extend_from_slice(&nat.to_be_bytes());
        self.entry(encoded, 1)
    }

    pub fn module(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.indexed(19, name)
    }

    pub fn package(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.indexed(20, name)
    }

    /// An encoded `attribute_info`.
    pub fn attribute(&mut self, name: &str, body: Vec<u8>) -> Vec<u8> {
        let name = self.utf8(name);
        let mut encoded = Vec::with_capacity(body.len() + 6);
        encoded.extend_from_slice(&name.to_be_bytes());
        encoded.extend_from_slice(&(body.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&body);
        encoded
    }

    pub fn signature(&mut self, signature: &str) -> Vec<u8> {
        let index = self.utf8(signature);
        self.attribute("Signature", index.to_be_bytes().to_vec())
    }

    pub fn element_value(&mut self, value: &Element) -> Vec<u8> {
        let mut out = Vec::new();
        match value {
            Element::Int(v) => {
                out.push(b'I');
                out.extend_from_slice(&self.integer(*v).to_be_bytes());
            }
            Element::Bool(v) => {
                out.push(b'Z');
                out.extend_from_slice(&self.integer(i32::from(*v)).to_be_bytes());
            }
            Element::Str(v) => {
                out.push(b's');
                out.extend_from_slice(&self.utf8(v).to_be_bytes());
            }
            Element::Enum(descriptor, constant) => {
                out.push(b'e');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
                out.extend_from_slice(&self.utf8(constant).to_be_bytes());
            }
            Element::Class(descriptor) => {
                out.push(b'c');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
            }
            Element::Array(values) => {
                out.push(b'[');
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                for value in values {
                    out.extend(self.element_value(value));
                }
            }
            Element::Nested(descriptor, values) => {
                out.push(b'@');
                out.extend(self.annotation(descriptor, values));
            }
        }
        out
    }

    /// An encoded `annotation` structure.
    pub fn annotation(&mut self, descriptor: &str, values: &[(&str, Element)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        out.extend_from_slice(&(values.len() as u16).to_be_bytes());
        for (name, value) in values {
            out.extend_from_slice(&self.utf8(name).to_be_bytes());
            out.extend(self.element_value(value));
        }
        out
    }

    /// `Runtime{Visible,Invisible}Annotations` holding the given annotations.
    pub fn annotations(&mut self, visible: bool, annotations: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = (annotations.len() as u16).to_be_bytes().to_vec();
        for annotation in annotations {
            body.extend(annotation);
        }
        let name = if visible {
            "RuntimeVisibleAnnotations"
        } else {
            "RuntimeInvisibleAnnotations"
        };
        self.attribute(name, body)
    }

    /// A marker annotation attribute, the common case.
    pub fn marker(&mut self, descriptor: &str) -> Vec<u8> {
        let annotation = self.annotation(descriptor, &[]);
        self.annotations(true, vec![annotation])
    }

    /// `RuntimeVisibleParameterAnnotations` with one table per parameter.
    pub fn parameter_annotations(&mut self, tables: Vec<Vec<Vec<u8>>>) -> Vec<u8> {
        let mut body = vec![tables.len() as u8];
        for table in tables {
            body.extend_from_slice(&(table.len() as u16).to_be_bytes());
            for annotation in table {
                body.extend(annotation);
            }
        }
        self.attribute("RuntimeVisibleParameterAnnotations", body)
    }

    /// One `type_annotation`: `target` is the target type byte followed by
    /// its `target_info`, `path` the `(kind, argument)` steps.
    pub fn type_annotation(&mut self, target: &[u8], path: &[(u8, u8)], descriptor: &str) -> Vec<u8> {
        let mut out = target.to_vec();
        out.push(path.len() as u8);
        for (kind, argument) in path {
            out.push(*kind);
            out.push(*argument);
        }
        out.extend(self.annotation(descriptor, &[]));
        out
    }

    pub fn type_annotations(&mut self, visible: bool, annotations: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = (annotations.len() as u16).to_be_bytes().to_vec();
        for annotation in annotations {
            body.extend(annotation);
        }
        let name = if visible {
            "RuntimeVisibleTypeAnnotations"
        } else {
            "RuntimeInvisibleTypeAnnotations"
        };
        self.attribute(name, body)
    }

    /// An `InnerClasses` attribute; `outer` and `simple_name` may be absent.
    pub fn inner_classes(&mut self, entries: &[(&str, Option<&str>, Option<&str>, u16)]) -> Vec<u8> {
        let mut body = (entries.len() as u16).to_be_bytes().to_vec();
        for (inner, outer, simple_name, flags) in entries {
            let inner = self.class(inner);
            let outer = outer.map(|o| self.class(o)).unwrap_or(0);
            let simple_name = simple_name.map(|s| self.utf8(s)).unwrap_or(0);
            body.extend_from_slice(&inner.to_be_bytes());
            body.extend_from_slice(&outer.to_be_bytes());
            body.extend_from_slice(&simple_name.to_be_bytes());
            body.extend_from_slice(&flags.to_be_bytes());
        }
        self.attribute("InnerClasses", body)
    }

    /// A `Code` attribute with a single `return` and optional nested attributes.
    pub fn code(&mut self, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&1u32.to_be_bytes());
        body.push(0xB1);
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            body.extend(attribute);
        }
        self.attribute("Code", body)
    }

    /// A `Record` attribute; each component is `(name, descriptor, attributes)`.
    pub fn record(&mut self, components: Vec<(&str, &str, Vec<Vec<u8>>)>) -> Vec<u8> {
        let mut body = (components.len() as u16).to_be_bytes().to_vec();
        for (name, descriptor, attributes) in components {
            body.extend_from_slice(&self.utf8(name).to_be_bytes());
            body.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
            body.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
            for attribute in attributes {
                body.extend(attribute);
            }
        }
        self.attribute("Record", body)
    }

    fn member(&mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&flags.to_be_bytes());
        out.extend_from_slice(&self.utf8(name).to_be_bytes());
        out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            out.extend(attribute);
        }
        out
    }

    pub fn field(mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Self {
        let field = self.member(flags, name, descriptor, attributes);
        self.fields.push(field);
        self
    }

    pub fn method(mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Self {
        let method = self.member(flags, name, descriptor, attributes);
        self.methods.push(method);
        self
    }

    pub fn class_attribute(mut self, attribute: Vec<u8>) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&self.pool_slots.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        for members in [&self.fields, &self.methods] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                out.extend_from_slice(member);
            }
        }
        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            out.extend_from_slice(attribute);
        }
        out
    }
}

/// Indexes the given class files with default settings.
pub fn index_classes(classes: &[Vec<u8>]) -> Index {
    init_test_logging();
    let mut indexer = Indexer::new(Arc::new(NameTable::new()), ParserConfig::default());
    for bytes in classes {
        indexer.index_class(bytes).expect("class should parse");
    }
    indexer.complete()
}

/// A small `@interface` with an optional `@Target` naming `ElementType`
/// constants.
pub fn annotation_interface(internal_name: &str, targets: Option<&[&'static str]>) -> Vec<u8> {
    let mut builder = ClassFileBuilder::new(internal_name)
        .flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
        .interface("java/lang/annotation/Annotation");
    if let Some(targets) = targets {
        let values = targets
            .iter()
            .map(|t| Element::Enum("Ljava/lang/annotation/ElementType;", *t))
            .collect();
        let target = builder.annotation(
            "Ljava/lang/annotation/Target;",
            &[("value", Element::Array(values))],
        );
        let attribute = builder.annotations(true, vec![target]);
        builder = builder.class_attribute(attribute);
    }
    builder.build()
}

/// A javac-compiled class from `tests/fixtures/classes`, by internal name
/// (`fixtures/Outer$Inner`). Sources live next to them under `tests/fixtures/java`.
pub fn compiled(internal_name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/classes")
        .join(format!("{}.class", internal_name));
    std::fs::read(&path).unwrap_or_else(|err| panic!("missing fixture {}: {}", path.display(), err))
}

/// The annotation types every compiled fixture refers to.
pub const FIXTURE_ANNOTATIONS: &[&str] = &[
    "fixtures/Annotations",
    "fixtures/Annotations$Tagged",
    "fixtures/Annotations$Named",
    "fixtures/Annotations$ComponentOnly",
    "fixtures/Annotations$ComponentAndMethod",
    "fixtures/Annotations$FieldOnly",
    "fixtures/Annotations$MethodOnly",
    "fixtures/Annotations$Anywhere",
];
