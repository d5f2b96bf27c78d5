mod common;

use classdex_api::{AnnotationValueKind, DotName, NestingKind};
use classdex_core::IndexError;
use common::*;

fn name(text: &str) -> DotName {
    DotName::simple(text)
}

fn names(classes: Vec<&classdex_api::ClassInfo>) -> Vec<String> {
    classes.iter().map(|c| c.name.to_string()).collect()
}

fn interface(internal_name: &str, extends: &[&str]) -> Vec<u8> {
    let mut builder =
        ClassFileBuilder::new(internal_name).flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    for parent in extends {
        builder = builder.interface(parent);
    }
    builder.build()
}

fn class(internal_name: &str, superclass: &str, interfaces: &[&str]) -> Vec<u8> {
    let mut builder = ClassFileBuilder::new(internal_name).superclass(Some(superclass));
    for interface in interfaces {
        builder = builder.interface(interface);
    }
    builder.build()
}

#[test]
fn test_hierarchy_queries() {
    let index = index_classes(&[
        interface("a/Shape", &[]),
        interface("a/Polygon", &["a/Shape"]),
        class("a/Circle", "java/lang/Object", &["a/Shape"]),
        class("a/Square", "java/lang/Object", &["a/Polygon"]),
        class("a/BigSquare", "a/Square", &[]),
        class("a/Ring", "a/Circle", &[]),
    ]);

    let shape = name("a.Shape");
    assert_eq!(names(index.known_direct_implementors(&shape)), ["a.Circle"]);
    assert_eq!(names(index.known_direct_subinterfaces(&shape)), ["a.Polygon"]);

    let mut all = names(index.all_known_implementors(&shape));
    all.sort();
    assert_eq!(all, ["a.BigSquare", "a.Circle", "a.Ring", "a.Square"]);

    assert_eq!(names(index.known_direct_subclasses(&name("a.Square"))), ["a.BigSquare"]);
    let object_children = names(index.all_known_subclasses(&name("java.lang.Object")));
    for expected in ["a.Circle", "a.Square", "a.Ring", "a.BigSquare"] {
        assert!(object_children.iter().any(|n| n == expected), "missing {}", expected);
    }
    // Breadth first: direct subclasses come before their own subclasses.
    let position = |n: &str| object_children.iter().position(|c| c == n).unwrap();
    assert!(position("a.Square") < position("a.BigSquare"));
}

#[test]
fn test_known_classes_in_name_order() {
    let index = index_classes(&[
        class("b/Z", "java/lang/Object", &[]),
        class("a/Y", "java/lang/Object", &[]),
        class("a/X", "java/lang/Object", &[]),
    ]);
    let order: Vec<String> = index.known_classes().map(|c| c.name.to_string()).collect();
    assert_eq!(order, ["a.X", "a.Y", "b.Z"]);
    assert_eq!(names(index.classes_in_package(&name("a"))), ["a.X", "a.Y"]);
}

#[test]
fn test_known_users() {
    let service = class("a/Service", "java/lang/Object", &[]);
    let mut client = ClassFileBuilder::new("a/Client");
    client.method_ref("a/Service", "run", "()V");
    let client = client.build();

    let index = index_classes(&[service, client]);
    assert_eq!(names(index.known_users(&name("a.Service"))), ["a.Client"]);
    let client = index.class_by_name(&name("a.Client")).unwrap();
    assert!(client.referenced_classes.contains(&name("a.Service")));
    assert!(!client.referenced_classes.contains(&name("a.Client")));
}

#[test]
fn test_zero_annotation_class_lookup() {
    let index = index_classes(&[class("a/Bare", "java/lang/Object", &[])]);
    let bare = index.class_by_name(&name("a.Bare")).unwrap();
    assert!(bare.declared_annotations.is_empty());
    assert_eq!(bare.annotation_count(), 0);
    assert!(index.class_by_name(&name("a.bare")).is_none());
    assert!(index.class_by_name(&name("a.Bare$1")).is_none());
}

#[test]
fn test_declaration_annotations() {
    let mut builder = ClassFileBuilder::new("a/Endpoint");
    let on_class = {
        let route = builder.annotation(
            "La/Route;",
            &[
                ("path", Element::Str("/users")),
                ("methods", Element::Array(vec![Element::Enum("La/Verb;", "GET")])),
                ("timeout", Element::Int(30)),
                ("secure", Element::Bool(true)),
                ("handler", Element::Class("La/Handler;")),
                ("meta", Element::Nested("La/Meta;", vec![("owner", Element::Str("team"))])),
            ],
        );
        builder.annotations(true, vec![route])
    };
    let on_method = builder.marker("La/Deprecated;");
    let on_parameter = {
        let annotation = builder.annotation("La/NotNull;", &[]);
        builder.parameter_annotations(vec![vec![], vec![annotation]])
    };
    let bytes = builder
        .class_attribute(on_class)
        .method(ACC_PUBLIC, "get", "(ILjava/lang/String;)V", vec![on_method, on_parameter])
        .build();

    let index = index_classes(&[bytes]);
    let endpoint = index.class_by_name(&name("a.Endpoint")).unwrap();

    let route = endpoint.declared_annotation(&name("a.Route")).unwrap();
    assert_eq!(route.value("path").and_then(|v| v.as_str()), Some("/users"));
    assert_eq!(route.value("timeout").and_then(|v| v.as_long()), Some(30));
    assert_eq!(route.value("secure").and_then(|v| v.as_bool()), Some(true));
    let methods = route.value("methods").and_then(|v| v.as_array()).unwrap();
    assert_eq!(methods[0].as_enum().map(|(_, c)| c), Some("GET"));
    assert_eq!(
        route.value("handler").and_then(|v| v.as_class()).unwrap().to_string(),
        "a.Handler"
    );
    let meta = route.value("meta").and_then(|v| v.as_nested()).unwrap();
    assert_eq!(meta.value("owner").and_then(|v| v.as_str()), Some("team"));
    let order: Vec<&str> = route.values().map(|(n, _)| n).collect();
    assert_eq!(order, ["path", "methods", "timeout", "secure", "handler", "meta"]);

    let method = endpoint.method("get", "(ILjava/lang/String;)V").unwrap();
    assert!(method.annotation(&name("a.Deprecated")).is_some());
    assert!(method.parameter_annotation(0, &name("a.NotNull")).is_none());
    assert!(method.parameter_annotation(1, &name("a.NotNull")).is_some());

    assert_eq!(index.annotations(&name("a.Route")).len(), 1);
    assert_eq!(index.annotations(&name("a.NotNull")).len(), 1);
    assert_eq!(endpoint.summary().annotation_count, 3);
}

#[test]
fn test_parameter_annotations_skip_synthetic_leading_parameters() {
    let mut builder = ClassFileBuilder::new("a/Outer$Inner");
    let annotation = builder.annotation("La/NotNull;", &[]);
    let table = builder.parameter_annotations(vec![vec![annotation]]);
    let bytes = builder
        .method(ACC_PUBLIC, "<init>", "(La/Outer;Ljava/lang/String;)V", vec![table])
        .build();

    let index = index_classes(&[bytes]);
    let constructor = index
        .class_by_name(&name("a.Outer$Inner"))
        .unwrap()
        .constructors()
        .next()
        .unwrap();
    assert!(constructor.parameter_annotation(0, &name("a.NotNull")).is_none());
    assert!(constructor.parameter_annotation(1, &name("a.NotNull")).is_some());
}

#[test]
fn test_annotation_array_element_kind() {
    let mut builder = ClassFileBuilder::new("a/Tags")
        .flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
        .interface("java/lang/annotation/Annotation");
    builder = builder
        .method(ACC_PUBLIC | ACC_ABSTRACT, "value", "()[Ljava/lang/String;", vec![])
        .method(ACC_PUBLIC | ACC_ABSTRACT, "levels", "()[I", vec![])
        .method(ACC_PUBLIC | ACC_ABSTRACT, "nested", "()[La/Inner;", vec![])
        .method(ACC_PUBLIC | ACC_ABSTRACT, "colors", "()[La/Color;", vec![])
        .method(ACC_PUBLIC | ACC_ABSTRACT, "types", "()[Ljava/lang/Class;", vec![]);
    let tags = builder.build();

    let index = index_classes(&[tags, annotation_interface("a/Inner", None)]);
    let tags = name("a.Tags");
    assert_eq!(
        index.annotation_array_element_kind(&tags, "value").unwrap(),
        AnnotationValueKind::String
    );
    assert_eq!(
        index.annotation_array_element_kind(&tags, "levels").unwrap(),
        AnnotationValueKind::Int
    );
    assert_eq!(
        index.annotation_array_element_kind(&tags, "nested").unwrap(),
        AnnotationValueKind::Nested
    );
    assert_eq!(
        index.annotation_array_element_kind(&tags, "colors").unwrap(),
        AnnotationValueKind::Enum
    );
    assert_eq!(
        index.annotation_array_element_kind(&tags, "types").unwrap(),
        AnnotationValueKind::Class
    );
    assert!(matches!(
        index.annotation_array_element_kind(&tags, "missing"),
        Err(IndexError::UnknownAnnotationMember { member, .. }) if member == "missing"
    ));
    assert!(matches!(
        index.annotation_array_element_kind(&name("a.Absent"), "value"),
        Err(IndexError::MissingAnnotationClass(_))
    ));
}

#[test]
fn test_module_descriptor() {
    let mut builder = ClassFileBuilder::new("module-info")
        .flags(ACC_MODULE)
        .superclass(None);
    let module = {
        let this = builder.module("com.example.app");
        let base = builder.module("java.base");
        let api = builder.package("com/example/api");
        let friend = builder.module("com.example.friend");
        let service = builder.class("com/example/spi/Plugin");
        let provider = builder.class("com/example/impl/DefaultPlugin");
        let mut body = Vec::new();
        body.extend_from_slice(&this.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        // requires java.base
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&base.to_be_bytes());
        body.extend_from_slice(&0x8000u16.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        // exports com.example.api to com.example.friend
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&api.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&friend.to_be_bytes());
        // no opens
        body.extend_from_slice(&0u16.to_be_bytes());
        // uses Plugin
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&service.to_be_bytes());
        // provides Plugin with DefaultPlugin
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&service.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&provider.to_be_bytes());
        builder.attribute("Module", body)
    };
    let packages = {
        let api = builder.package("com/example/api");
        let internal = builder.package("com/example/internal");
        let body = [2u16.to_be_bytes(), api.to_be_bytes(), internal.to_be_bytes()].concat();
        builder.attribute("ModulePackages", body)
    };
    let main_class = {
        let main = builder.class("com/example/Main");
        builder.attribute("ModuleMainClass", main.to_be_bytes().to_vec())
    };
    let bytes = builder
        .class_attribute(module)
        .class_attribute(packages)
        .class_attribute(main_class)
        .build();

    let index = index_classes(&[bytes]);
    let module = index.module(&name("com.example.app")).unwrap();
    assert_eq!(module.requires[0].name, name("java.base"));
    assert_eq!(module.exports[0].package, name("com.example.api"));
    assert_eq!(module.exports[0].targets, [name("com.example.friend")]);
    assert!(module.opens.is_empty());
    assert_eq!(module.uses, [name("com.example.spi.Plugin")]);
    assert_eq!(module.provides[0].providers, [name("com.example.impl.DefaultPlugin")]);
    assert_eq!(module.main_class, Some(name("com.example.Main")));
    assert_eq!(module.packages.len(), 2);

    let info = index.class_by_name(&name("module-info")).unwrap();
    assert_eq!(info.kind(), classdex_api::ClassKind::Module);
    assert!(info.superclass_name.is_none());
}

#[test]
fn test_anonymous_class_sees_enclosing_method_variables() {
    let mut outer = ClassFileBuilder::new("a/Outer");
    let signature = outer.signature("<M:Ljava/lang/Number;>()V");
    let outer = outer.method(ACC_PUBLIC, "make", "()V", vec![signature]).build();

    let mut anonymous = ClassFileBuilder::new("a/Outer$1");
    let enclosing = {
        let class = anonymous.class("a/Outer");
        let method = anonymous.name_and_type("make", "()V");
        anonymous.attribute("EnclosingMethod", [class.to_be_bytes(), method.to_be_bytes()].concat())
    };
    let inner_classes = anonymous.inner_classes(&[("a/Outer$1", None, None, 0)]);
    let anonymous = anonymous
        .class_attribute(enclosing)
        .class_attribute(inner_classes)
        .build();

    let index = index_classes(&[outer, anonymous]);
    let class = index.class_by_name(&name("a.Outer$1")).unwrap();
    assert_eq!(class.nesting.kind, NestingKind::Anonymous);
    assert_eq!(class.nesting.enclosing_class, Some(name("a.Outer")));
    let method = class.nesting.enclosing_method.as_ref().unwrap();
    assert_eq!(method.method.name, "make");

    let resolved = index.resolve_type_variable(&name("a.Outer$1"), "M").unwrap();
    assert_eq!(resolved.as_type_variable().unwrap().bounds[0].to_string(), "java.lang.Number");
}
