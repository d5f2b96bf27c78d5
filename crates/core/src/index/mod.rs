//! The completed, query-ready index.
//!
//! An [`Index`] is produced by [`Indexer::complete`] and never changes
//! afterwards. Every secondary map is keyed and ordered by [`DotName`], so two
//! indexes built from the same input in the same order serialize to the same
//! bytes.

mod builder;

pub use builder::Indexer;

use crate::error::IndexError;
use classdex_api::{
    AnnotationInstance, AnnotationValueKind, ClassInfo, DotName, ModuleInfo, PrimitiveKind, Type,
    TypeKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub(crate) classes: BTreeMap<DotName, ClassInfo>,
    /// Annotation name to every usage, in class order.
    pub(crate) annotations: BTreeMap<DotName, Vec<AnnotationInstance>>,
    pub(crate) subclasses: BTreeMap<DotName, Vec<DotName>>,
    /// Interface to the non-interface classes listing it directly.
    pub(crate) implementors: BTreeMap<DotName, Vec<DotName>>,
    pub(crate) subinterfaces: BTreeMap<DotName, Vec<DotName>>,
    pub(crate) users: BTreeMap<DotName, Vec<DotName>>,
    pub(crate) packages: BTreeMap<DotName, Vec<DotName>>,
    /// Module name to the `module-info` class declaring it.
    pub(crate) modules: BTreeMap<DotName, DotName>,
}

impl Index {
    pub fn class_by_name(&self, name: &DotName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// All indexed classes in name order.
    pub fn known_classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Every usage of the annotation across the index, declaration and
    /// type-use alike.
    pub fn annotations(&self, name: &DotName) -> &[AnnotationInstance] {
        self.annotations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Annotation names with at least one usage, in name order.
    pub fn annotation_names(&self) -> impl Iterator<Item = &DotName> {
        self.annotations.keys()
    }

    fn lookup<'a>(&'a self, map: &'a BTreeMap<DotName, Vec<DotName>>, name: &DotName) -> Vec<&'a ClassInfo> {
        map.get(name)
            .into_iter()
            .flatten()
            .filter_map(|n| self.classes.get(n))
            .collect()
    }

    pub fn known_direct_subclasses(&self, name: &DotName) -> Vec<&ClassInfo> {
        self.lookup(&self.subclasses, name)
    }

    /// Subclasses at any depth, breadth first.
    pub fn all_known_subclasses(&self, name: &DotName) -> Vec<&ClassInfo> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::from([name.clone()]);
        while let Some(current) = queue.pop_front() {
            for class in self.known_direct_subclasses(&current) {
                if seen.insert(class.name.clone()) {
                    queue.push_back(class.name.clone());
                    result.push(class);
                }
            }
        }
        result
    }

    /// Classes (not interfaces) whose `implements` clause names the interface.
    pub fn known_direct_implementors(&self, name: &DotName) -> Vec<&ClassInfo> {
        self.lookup(&self.implementors, name)
    }

    pub fn known_direct_subinterfaces(&self, name: &DotName) -> Vec<&ClassInfo> {
        self.lookup(&self.subinterfaces, name)
    }

    /// Classes implementing the interface directly, through a subinterface,
    /// or by extending an implementor.
    pub fn all_known_implementors(&self, name: &DotName) -> Vec<&ClassInfo> {
        let mut interfaces = BTreeSet::from([name.clone()]);
        let mut pending = vec![name.clone()];
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        while let Some(interface) = pending.pop() {
            for sub in self.known_direct_subinterfaces(&interface) {
                if interfaces.insert(sub.name.clone()) {
                    pending.push(sub.name.clone());
                }
            }
            for class in self.known_direct_implementors(&interface) {
                if seen.insert(class.name.clone()) {
                    result.push(class);
                }
                for sub in self.all_known_subclasses(&class.name) {
                    if seen.insert(sub.name.clone()) {
                        result.push(sub);
                    }
                }
            }
        }
        result
    }

    /// Classes whose constant pool names the class.
    pub fn known_users(&self, name: &DotName) -> Vec<&ClassInfo> {
        self.lookup(&self.users, name)
    }

    pub fn classes_in_package(&self, package: &DotName) -> Vec<&ClassInfo> {
        self.lookup(&self.packages, package)
    }

    pub fn module(&self, name: &DotName) -> Option<&ModuleInfo> {
        self.modules
            .get(name)
            .and_then(|class| self.classes.get(class))
            .and_then(|class| class.module.as_ref())
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules
            .values()
            .filter_map(|class| self.classes.get(class)?.module.as_ref())
    }

    /// Finds the declaration of a type variable visible inside `class`,
    /// looking through enclosing methods and classes.
    pub fn resolve_type_variable(&self, class: &DotName, identifier: &str) -> Option<&Type> {
        let mut current = self.classes.get(class);
        let mut seen = BTreeSet::new();
        while let Some(info) = current {
            if !seen.insert(&info.name) {
                break;
            }
            if let Some(found) = info.type_parameter(identifier) {
                return Some(found);
            }
            let enclosing_method = info.nesting.enclosing_method.as_ref();
            if let Some(enclosing) = enclosing_method {
                let found = self
                    .classes
                    .get(&enclosing.class)
                    .and_then(|c| c.method(&enclosing.method.name, &enclosing.method.descriptor))
                    .and_then(|m| m.type_parameter(identifier));
                if found.is_some() {
                    return found;
                }
            }
            let outer = info
                .nesting
                .enclosing_class
                .as_ref()
                .or(enclosing_method.map(|e| &e.class));
            current = outer.and_then(|name| self.classes.get(name));
        }
        None
    }

    /// The element kind of an array-valued annotation member, taken from the
    /// member's declared return type. Needed for empty arrays, which carry no
    /// elements to inspect.
    pub fn annotation_array_element_kind(
        &self,
        annotation: &DotName,
        member: &str,
    ) -> Result<AnnotationValueKind, IndexError> {
        let class = self
            .classes
            .get(annotation)
            .ok_or_else(|| IndexError::MissingAnnotationClass(annotation.clone()))?;
        let method = class
            .methods_named(member)
            .find(|m| m.parameter_types.is_empty() && !m.flags.is_static())
            .ok_or_else(|| IndexError::UnknownAnnotationMember {
                annotation: annotation.clone(),
                member: member.to_string(),
            })?;
        let element = method.return_type.component().unwrap_or_else(|| method.return_type.clone());
        Ok(self.value_kind(&element))
    }

    fn value_kind(&self, ty: &Type) -> AnnotationValueKind {
        match ty.kind() {
            TypeKind::Primitive(primitive) => match primitive {
                PrimitiveKind::Boolean => AnnotationValueKind::Boolean,
                PrimitiveKind::Byte => AnnotationValueKind::Byte,
                PrimitiveKind::Short => AnnotationValueKind::Short,
                PrimitiveKind::Int => AnnotationValueKind::Int,
                PrimitiveKind::Long => AnnotationValueKind::Long,
                PrimitiveKind::Float => AnnotationValueKind::Float,
                PrimitiveKind::Double => AnnotationValueKind::Double,
                PrimitiveKind::Char => AnnotationValueKind::Char,
            },
            TypeKind::Array(_) => AnnotationValueKind::Array,
            _ => {
                let name = ty.name();
                if name == DotName::simple("java.lang.String") {
                    AnnotationValueKind::String
                } else if name == DotName::simple("java.lang.Class") {
                    AnnotationValueKind::Class
                } else if self
                    .classes
                    .get(&name)
                    .is_some_and(|c| c.flags.is_annotation())
                {
                    AnnotationValueKind::Nested
                } else {
                    AnnotationValueKind::Enum
                }
            }
        }
    }
}
