//! Declarations produced by the class-file parser.
//!
//! Declarations never point back at the index they live in. Anything that
//! needs another class goes through `Index` lookups by name.

use super::annotation::{AnnotationInstance, AnnotationValue, binary_search_annotation};
use super::name::DotName;
use super::target::MethodRef;
use super::types::{Type, TypeKind, TypeVariableReference, VariableScope};
use super::well_known;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const VARARGS: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
    /// `ACC_MODULE` on classes, `ACC_MANDATED` on parameters and requires.
    pub const MODULE: u16 = 0x8000;

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    pub fn is_annotation(self) -> bool {
        self.contains(Self::ANNOTATION)
    }

    pub fn is_enum(self) -> bool {
        self.contains(Self::ENUM)
    }

    pub fn is_module(self) -> bool {
        self.contains(Self::MODULE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClassFileVersion {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
    Enum,
    Record,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NestingKind {
    #[default]
    TopLevel,
    Member,
    Local,
    Anonymous,
}

/// The method a local or anonymous class is declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnclosingMethod {
    pub class: DotName,
    pub method: MethodRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestingInfo {
    pub kind: NestingKind,
    pub enclosing_class: Option<DotName>,
    /// Source-level simple name; `None` for anonymous classes.
    pub simple_name: Option<SmolStr>,
    pub enclosing_method: Option<EnclosingMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: DotName,
    pub flags: AccessFlags,
    pub version: ClassFileVersion,
    pub superclass_name: Option<DotName>,
    pub superclass_type: Option<Type>,
    pub interface_names: Vec<DotName>,
    pub interface_types: Vec<Type>,
    pub type_parameters: Vec<Type>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// `None` unless the class file has a `Record` attribute.
    pub record_components: Option<Vec<RecordComponentInfo>>,
    /// Class-level annotations, sorted by name.
    pub declared_annotations: Vec<AnnotationInstance>,
    /// Every annotation instance in the class, grouped by annotation name.
    pub annotations: BTreeMap<DotName, Vec<AnnotationInstance>>,
    pub nesting: NestingInfo,
    pub member_classes: Vec<DotName>,
    pub permitted_subclasses: Vec<DotName>,
    pub module: Option<ModuleInfo>,
    /// Classes named by the constant pool, sorted, without this class.
    pub referenced_classes: Vec<DotName>,
}

impl ClassInfo {
    pub fn new(name: DotName, flags: AccessFlags, version: ClassFileVersion) -> Self {
        Self {
            name,
            flags,
            version,
            superclass_name: None,
            superclass_type: None,
            interface_names: Vec::new(),
            interface_types: Vec::new(),
            type_parameters: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            record_components: None,
            declared_annotations: Vec::new(),
            annotations: BTreeMap::new(),
            nesting: NestingInfo::default(),
            member_classes: Vec::new(),
            permitted_subclasses: Vec::new(),
            module: None,
            referenced_classes: Vec::new(),
        }
    }

    pub fn kind(&self) -> ClassKind {
        if self.flags.is_module() {
            ClassKind::Module
        } else if self.flags.is_annotation() {
            ClassKind::Annotation
        } else if self.flags.is_interface() {
            ClassKind::Interface
        } else if self.is_enum() {
            ClassKind::Enum
        } else if self.is_record() {
            ClassKind::Record
        } else {
            ClassKind::Class
        }
    }

    /// An enum declaration. Constant bodies also carry `ACC_ENUM` but extend
    /// the enum itself, so they are plain classes.
    pub fn is_enum(&self) -> bool {
        self.flags.is_enum() && self.superclass_name.as_ref() == Some(&*well_known::ENUM)
    }

    pub fn is_record(&self) -> bool {
        self.record_components.is_some()
            || self.superclass_name.as_ref() == Some(&*well_known::RECORD)
    }

    pub fn package(&self) -> Option<DotName> {
        self.name.package_prefix()
    }

    /// A class-level annotation, found by binary search.
    pub fn declared_annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        binary_search_annotation(&self.declared_annotations, name)
    }

    /// All instances of `name` anywhere in the class.
    pub fn annotation_instances(&self, name: &DotName) -> &[AnnotationInstance] {
        self.annotations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_annotation(&self, name: &DotName) -> bool {
        self.annotations.contains_key(name)
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    pub fn record_components(&self) -> &[RecordComponentInfo] {
        self.record_components.as_deref().unwrap_or(&[])
    }

    pub fn record_component(&self, name: &str) -> Option<&RecordComponentInfo> {
        self.record_components().iter().find(|c| c.name == name)
    }

    /// The constructor whose erased parameters are the component types in
    /// declaration order. Compact, explicit and implicit forms all match.
    pub fn canonical_record_constructor(&self) -> Option<&MethodInfo> {
        let components = self.record_components.as_ref()?;
        let mut descriptor = String::from("(");
        for component in components {
            descriptor.push_str(&component.descriptor);
        }
        descriptor.push_str(")V");
        self.method("<init>", &descriptor)
    }

    /// A class type parameter by identifier.
    pub fn type_parameter(&self, identifier: &str) -> Option<&Type> {
        self.type_parameters.iter().find(|p| {
            p.as_type_variable()
                .is_some_and(|tv| tv.identifier == identifier)
        })
    }

    /// The declaration a [`TypeVariableReference`] points at. Method-scoped
    /// references need the method they were found in.
    pub fn resolve_type_variable_reference<'a>(
        &'a self,
        reference: &TypeVariableReference,
        method: Option<&'a MethodInfo>,
    ) -> Option<&'a Type> {
        let parameters = match reference.scope {
            VariableScope::Class => &self.type_parameters,
            VariableScope::Method => &method?.type_parameters,
        };
        parameters.get(usize::from(reference.position))
    }

    pub fn summary(&self) -> ClassSummary {
        ClassSummary {
            name: self.name.clone(),
            superclass: self.superclass_name.clone(),
            annotation_count: self.annotation_count(),
            field_count: self.fields.len(),
            method_count: self.methods.len(),
            flags: self.flags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSummary {
    pub name: DotName,
    pub superclass: Option<DotName>,
    pub annotation_count: usize,
    pub field_count: usize,
    pub method_count: usize,
    pub flags: AccessFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub declaring_class: DotName,
    pub name: SmolStr,
    pub flags: AccessFlags,
    pub descriptor: SmolStr,
    pub field_type: Type,
    /// Sorted by name.
    pub annotations: Vec<AnnotationInstance>,
}

impl FieldInfo {
    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        binary_search_annotation(&self.annotations, name)
    }

    pub fn is_enum_constant(&self) -> bool {
        self.flags.is_enum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub declaring_class: DotName,
    pub name: SmolStr,
    pub flags: AccessFlags,
    pub descriptor: SmolStr,
    pub type_parameters: Vec<Type>,
    pub return_type: Type,
    /// One entry per descriptor parameter, synthetic ones included.
    pub parameter_types: Vec<Type>,
    /// From `MethodParameters`; empty when the attribute is absent.
    pub parameter_names: Vec<Option<SmolStr>>,
    /// Present only when the receiver carries type annotations.
    pub receiver_type: Option<Type>,
    pub exceptions: Vec<Type>,
    /// Method-level annotations, sorted by name.
    pub annotations: Vec<AnnotationInstance>,
    /// Per descriptor parameter, each sorted by name.
    pub parameter_annotations: Vec<Vec<AnnotationInstance>>,
    pub default_value: Option<AnnotationValue>,
}

impl MethodInfo {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags.is_synthetic()
    }

    pub fn is_bridge(&self) -> bool {
        self.flags.contains(AccessFlags::BRIDGE)
    }

    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.name.clone(), self.descriptor.clone())
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        binary_search_annotation(&self.annotations, name)
    }

    pub fn parameter_annotation(&self, position: usize, name: &DotName) -> Option<&AnnotationInstance> {
        binary_search_annotation(self.parameter_annotations.get(position)?, name)
    }

    pub fn parameter_name(&self, position: usize) -> Option<&str> {
        self.parameter_names.get(position)?.as_deref()
    }

    /// The receiver type of an instance method; the declaring class unless
    /// the class file annotated it.
    pub fn receiver(&self) -> Option<Type> {
        if self.flags.is_static() || self.is_static_initializer() {
            return None;
        }
        Some(
            self.receiver_type
                .clone()
                .unwrap_or_else(|| Type::class(self.declaring_class.clone())),
        )
    }

    /// A method type parameter by identifier.
    pub fn type_parameter(&self, identifier: &str) -> Option<&Type> {
        self.type_parameters.iter().find(|p| {
            matches!(p.kind(), TypeKind::TypeVariable(tv) if tv.identifier == identifier)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordComponentInfo {
    pub declaring_class: DotName,
    pub name: SmolStr,
    pub descriptor: SmolStr,
    pub component_type: Type,
    /// Sorted by name.
    pub annotations: Vec<AnnotationInstance>,
}

impl RecordComponentInfo {
    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        binary_search_annotation(&self.annotations, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: DotName,
    pub flags: AccessFlags,
    pub version: Option<SmolStr>,
    pub requires: Vec<RequiredModule>,
    pub exports: Vec<PackageDirective>,
    pub opens: Vec<PackageDirective>,
    pub uses: Vec<DotName>,
    pub provides: Vec<ProvidedService>,
    pub main_class: Option<DotName>,
    pub packages: Vec<DotName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiredModule {
    pub name: DotName,
    pub flags: AccessFlags,
    pub version: Option<SmolStr>,
}

/// An `exports` or `opens` directive; no targets means unqualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDirective {
    pub package: DotName,
    pub flags: AccessFlags,
    pub targets: Vec<DotName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvidedService {
    pub service: DotName,
    pub providers: Vec<DotName>,
}
