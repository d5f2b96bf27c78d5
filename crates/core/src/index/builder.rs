//! Mutable accumulator for an [`Index`].
//!
//! Classes are added one at a time from a single thread, either as raw bytes
//! or already parsed. [`Indexer::complete`] builds the secondary maps and
//! freezes the result.

use super::Index;
use crate::config::ParserConfig;
use crate::error::Result;
use crate::model::NameTable;
use crate::parser::ClassFileParser;
use classdex_api::{
    AnnotationInstance, AnnotationTarget, ClassInfo, ClassSummary, DotName, TargetSite,
    normalize_annotations, well_known,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Indexer {
    names: Arc<NameTable>,
    config: ParserConfig,
    classes: BTreeMap<DotName, ClassInfo>,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new(Arc::new(NameTable::new()), ParserConfig::default())
    }
}

impl Indexer {
    pub fn new(names: Arc<NameTable>, config: ParserConfig) -> Self {
        Self {
            names,
            config,
            classes: BTreeMap::new(),
        }
    }

    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Parses one class file and adds it.
    pub fn index_class(&mut self, bytes: &[u8]) -> Result<ClassSummary> {
        let parsed = ClassFileParser::new(&self.names, &self.config).parse(bytes)?;
        self.add_class(parsed.info);
        Ok(parsed.summary)
    }

    /// Adds an already parsed class. A class with the same name replaces the
    /// earlier one.
    pub fn add_class(&mut self, class: ClassInfo) {
        let name = class.name.clone();
        if self.classes.insert(name.clone(), class).is_some() {
            tracing::warn!("Duplicate class {}, keeping the last definition", name);
        }
    }

    /// Builds the secondary maps and freezes the index.
    pub fn complete(mut self) -> Index {
        self.propagate_record_annotations();

        let mut index = Index::default();
        for (name, class) in &self.classes {
            if let Some(superclass) = &class.superclass_name {
                push(&mut index.subclasses, superclass, name);
            }
            let interface_edges = if class.flags.is_interface() {
                &mut index.subinterfaces
            } else {
                &mut index.implementors
            };
            for interface in &class.interface_names {
                push(interface_edges, interface, name);
            }
            for referenced in &class.referenced_classes {
                push(&mut index.users, referenced, name);
            }
            if let Some(package) = class.package() {
                push(&mut index.packages, &package, name);
            }
            if let Some(module) = &class.module {
                index.modules.insert(module.name.clone(), name.clone());
            }
            for (annotation, usages) in &class.annotations {
                index
                    .annotations
                    .entry(annotation.clone())
                    .or_default()
                    .extend(usages.iter().cloned());
            }
        }
        index.classes = self.classes;

        tracing::debug!(
            "Completed index: {} classes, {} annotation types",
            index.classes.len(),
            index.annotations.len()
        );
        index
    }

    /// Copies record component annotations onto the component's field and
    /// accessor where the annotation class is indexed and its `@Target`
    /// names `FIELD` or `METHOD`. javac already does this for the members it
    /// generates, so only missing instances are added.
    fn propagate_record_annotations(&mut self) {
        let mut plans = Vec::new();
        for class in self.classes.values() {
            for component in class.record_components() {
                let mut to_field = Vec::new();
                let mut to_accessor = Vec::new();
                for annotation in &component.annotations {
                    let Some((field, method)) = self.applicable_targets(annotation.name()) else {
                        continue;
                    };
                    if field {
                        to_field.push(annotation.detached());
                    }
                    if method {
                        to_accessor.push(annotation.detached());
                    }
                }
                if !to_field.is_empty() || !to_accessor.is_empty() {
                    let declared: Vec<DotName> =
                        component.annotations.iter().map(|a| a.name().clone()).collect();
                    plans.push((
                        class.name.clone(),
                        component.name.clone(),
                        format!("(){}", component.descriptor),
                        declared,
                        to_field,
                        to_accessor,
                    ));
                }
            }
        }

        for (class_name, component, accessor_descriptor, declared, to_field, to_accessor) in plans {
            let Some(class) = self.classes.get_mut(&class_name) else {
                continue;
            };
            let mut added: Vec<AnnotationInstance> = Vec::new();

            if let Some(field) = class
                .fields
                .iter_mut()
                .find(|f| f.name == component && !f.flags.is_static())
            {
                let target = AnnotationTarget::new(class_name.clone(), TargetSite::Field(component.clone()));
                added.extend(merge(&mut field.annotations, to_field, &target));
            }
            if let Some(accessor) = class
                .methods
                .iter_mut()
                .find(|m| m.name == component && m.descriptor == accessor_descriptor)
            {
                // An accessor carrying annotations the component does not
                // declare was written by hand and keeps its own set.
                let handwritten = accessor
                    .annotations
                    .iter()
                    .any(|a| !declared.contains(a.name()));
                if handwritten {
                    tracing::debug!(
                        "Skipping explicit accessor {}.{} for annotation propagation",
                        class_name,
                        component
                    );
                } else {
                    let target =
                        AnnotationTarget::new(class_name.clone(), TargetSite::Method(accessor.method_ref()));
                    added.extend(merge(&mut accessor.annotations, to_accessor, &target));
                }
            }

            for annotation in added {
                class
                    .annotations
                    .entry(annotation.name().clone())
                    .or_default()
                    .push(annotation);
            }
        }
    }

    /// Whether an annotation may sit on a field and on a method, from its
    /// `@Target`. `None` when the annotation class is not indexed or declares
    /// no `@Target`.
    fn applicable_targets(&self, annotation: &DotName) -> Option<(bool, bool)> {
        let target = self
            .classes
            .get(annotation)?
            .declared_annotation(&well_known::TARGET)?;
        let values = target.value("value")?.as_array()?;
        let mut field = false;
        let mut method = false;
        for value in values {
            match value.as_enum() {
                Some((ty, "FIELD")) if *ty == *well_known::ELEMENT_TYPE => field = true,
                Some((ty, "METHOD")) if *ty == *well_known::ELEMENT_TYPE => method = true,
                _ => {}
            }
        }
        Some((field, method))
    }
}

fn push(map: &mut BTreeMap<DotName, Vec<DotName>>, key: &DotName, value: &DotName) {
    map.entry(key.clone()).or_default().push(value.clone());
}

/// Adds annotations the list does not already carry. Returns the added,
/// targeted instances.
fn merge(
    existing: &mut Vec<AnnotationInstance>,
    incoming: Vec<AnnotationInstance>,
    target: &AnnotationTarget,
) -> Vec<AnnotationInstance> {
    let added: Vec<AnnotationInstance> = incoming
        .into_iter()
        .filter(|a| !existing.iter().any(|e| e.name() == a.name()))
        .map(|a| a.with_target(target.clone()))
        .collect();
    if !added.is_empty() {
        let mut combined = std::mem::take(existing);
        combined.extend(added.iter().cloned());
        *existing = normalize_annotations(combined);
    }
    added
}
