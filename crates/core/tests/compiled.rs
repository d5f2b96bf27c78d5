//! Class files produced by javac 17 from `tests/fixtures/java`.

mod common;

use classdex_api::{AnnotationInstance, ClassKind, DotName, TargetSite, TypeUsage};
use classdex_core::Index;
use common::*;

fn name(text: &str) -> DotName {
    DotName::simple(text)
}

fn tagged() -> DotName {
    name("fixtures.Annotations$Tagged")
}

fn index_compiled(classes: &[&str]) -> Index {
    let bytes: Vec<Vec<u8>> = classes.iter().map(|c| compiled(c)).collect();
    index_classes(&bytes)
}

fn with_annotations(classes: &[&'static str]) -> Vec<&'static str> {
    FIXTURE_ANNOTATIONS.iter().chain(classes).copied().collect()
}

fn annotation_names(annotations: &[AnnotationInstance]) -> Vec<String> {
    annotations.iter().map(|a| a.name().to_string()).collect()
}

#[test]
fn test_method_return_receiver_parameter_and_throws() {
    let index = index_compiled(&["fixtures/Service"]);
    let method = index
        .class_by_name(&name("fixtures.Service"))
        .unwrap()
        .method("call", "(ILjava/lang/String;)Ljava/lang/String;")
        .unwrap();

    assert_eq!(
        method.return_type.to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
    assert_eq!(
        method.receiver_type.as_ref().unwrap().to_string(),
        "@fixtures.Annotations$Tagged fixtures.Service"
    );
    assert_eq!(method.parameter_types[0].to_string(), "int");
    assert_eq!(
        method.parameter_types[1].to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
    assert_eq!(method.exceptions[0].to_string(), "java.lang.IllegalStateException");
    assert_eq!(
        method.exceptions[1].to_string(),
        "@fixtures.Annotations$Tagged java.lang.RuntimeException"
    );

    let usages: Vec<&TypeUsage> = index
        .annotations(&tagged())
        .iter()
        .filter_map(|a| match &a.target()?.site {
            TargetSite::Type { usage, .. } => Some(usage),
            _ => None,
        })
        .collect();
    assert_eq!(usages.len(), 4);
    assert!(usages.iter().any(|u| matches!(u, TypeUsage::MethodReturn { .. })));
    assert!(usages.iter().any(|u| matches!(u, TypeUsage::MethodReceiver { .. })));
    assert!(usages.iter().any(|u| matches!(u, TypeUsage::MethodParameter { position: 1, .. })));
    assert!(usages.iter().any(|u| matches!(u, TypeUsage::Throws { index: 1, .. })));
}

#[test]
fn test_inner_constructor_without_signature() {
    let index = index_compiled(&with_annotations(&["fixtures/Outer", "fixtures/Outer$Inner"]));
    let constructor = index
        .class_by_name(&name("fixtures.Outer$Inner"))
        .unwrap()
        .method("<init>", "(Lfixtures/Outer;Ljava/lang/String;Ljava/lang/String;)V")
        .unwrap();

    assert_eq!(constructor.parameter_types[0].to_string(), "fixtures.Outer");
    assert_eq!(
        constructor.parameter_types[1].to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
    assert_eq!(constructor.parameter_types[2].to_string(), "java.lang.String");

    assert!(constructor.parameter_annotations[0].is_empty());
    assert!(constructor.parameter_annotations[1].is_empty());
    assert_eq!(
        annotation_names(&constructor.parameter_annotations[2]),
        ["fixtures.Annotations$Named"]
    );

    let usage = &index.annotations(&tagged())[0];
    assert!(matches!(
        &usage.target().unwrap().site,
        TargetSite::Type { usage: TypeUsage::MethodParameter { position: 1, .. }, .. }
    ));
}

#[test]
fn test_local_class_constructor_skips_captured_values() {
    let index = index_compiled(&["fixtures/Local", "fixtures/Local$1Holder"]);
    let holder = index.class_by_name(&name("fixtures.Local$1Holder")).unwrap();
    let constructor = holder
        .method("<init>", "(Lfixtures/Local;Ljava/lang/String;Ljava/lang/String;)V")
        .unwrap();

    // outer instance, declared value, captured local
    assert_eq!(
        constructor.parameter_types[1].to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
    assert_eq!(constructor.parameter_types[2].to_string(), "java.lang.String");
}

#[test]
fn test_enum_constructor_skips_name_and_ordinal() {
    let index = index_compiled(&["fixtures/Level"]);
    let level = index.class_by_name(&name("fixtures.Level")).unwrap();
    assert_eq!(level.kind(), ClassKind::Enum);
    let constructor = level
        .method("<init>", "(Ljava/lang/String;ILjava/lang/String;)V")
        .unwrap();
    assert_eq!(constructor.parameter_types[0].to_string(), "java.lang.String");
    assert_eq!(constructor.parameter_types[1].to_string(), "int");
    assert_eq!(
        constructor.parameter_types[2].to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
}

#[test]
fn test_recursive_and_forward_bounds() {
    let index = index_compiled(&["fixtures/Cmp"]);
    let class = index.class_by_name(&name("fixtures.Cmp")).unwrap();

    let t = class.type_parameter("T").unwrap().as_type_variable().unwrap();
    assert_eq!(t.bounds[0].to_string(), "java.lang.Comparable<T>");
    let s = class.type_parameter("S").unwrap().as_type_variable().unwrap();
    assert_eq!(s.bounds[0].to_string(), "java.lang.Iterable<U>");
    let u = class.type_parameter("U").unwrap().as_type_variable().unwrap();
    assert_eq!(u.bounds[0].to_string(), "@fixtures.Annotations$Tagged T");

    let pick = class
        .method("pick", "(Ljava/lang/Comparable;Ljava/lang/Comparable;)Ljava/lang/Comparable;")
        .unwrap();
    let v = pick.type_parameter("V").unwrap().as_type_variable().unwrap();
    assert_eq!(
        v.bounds[0].to_string(),
        "@fixtures.Annotations$Tagged java.lang.Comparable<V>"
    );
    assert_eq!(pick.parameter_types[0].to_string(), "@fixtures.Annotations$Tagged T");
    assert_eq!(pick.parameter_types[1].to_string(), "U");
    // The use of U sees the annotated bound of its declaration.
    let second = pick.parameter_types[1].as_type_variable().unwrap();
    assert!(second.bounds[0].has_annotation(&tagged()));
    assert_eq!(pick.return_type.to_string(), "V");
}

#[test]
fn test_record_without_annotation_classes() {
    let index = index_compiled(&["fixtures/Point"]);
    let record = index.class_by_name(&name("fixtures.Point")).unwrap();
    assert_eq!(record.kind(), ClassKind::Record);

    // Exactly what javac wrote.
    assert_eq!(
        annotation_names(&record.field("x").unwrap().annotations),
        ["fixtures.Annotations$Anywhere", "fixtures.Annotations$FieldOnly"]
    );
    assert_eq!(
        annotation_names(&record.method("x", "()I").unwrap().annotations),
        ["fixtures.Annotations$Anywhere", "fixtures.Annotations$MethodOnly"]
    );
    assert!(record.field("label").unwrap().annotations.is_empty());
    assert_eq!(
        annotation_names(&record.method("label", "()Ljava/lang/String;").unwrap().annotations),
        ["fixtures.Annotations$Anywhere"]
    );
    assert_eq!(index.annotations(&name("fixtures.Annotations$ComponentOnly")).len(), 1);
    assert_eq!(
        index.annotations(&name("fixtures.Annotations$ComponentAndMethod")).len(),
        1
    );

    let canonical = record.canonical_record_constructor().unwrap();
    assert_eq!(
        canonical.parameter_types[1].to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
    assert_eq!(
        annotation_names(&canonical.parameter_annotations[0]),
        ["fixtures.Annotations$Anywhere"]
    );
}

#[test]
fn test_record_with_annotation_classes_keeps_explicit_accessor() {
    let index = index_compiled(&with_annotations(&["fixtures/Point"]));
    let record = index.class_by_name(&name("fixtures.Point")).unwrap();

    assert_eq!(
        annotation_names(&record.method("label", "()Ljava/lang/String;").unwrap().annotations),
        ["fixtures.Annotations$Anywhere"]
    );
    assert_eq!(
        annotation_names(&record.field("x").unwrap().annotations),
        ["fixtures.Annotations$Anywhere", "fixtures.Annotations$FieldOnly"]
    );
    assert_eq!(
        index.annotations(&name("fixtures.Annotations$ComponentAndMethod")).len(),
        1
    );
    assert_eq!(
        record.record_component("label").unwrap().component_type.to_string(),
        "@fixtures.Annotations$Tagged java.lang.String"
    );
}
