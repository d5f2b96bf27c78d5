use super::ParsedClass;
use super::annotations::AnnotationDecoder;
use super::constant_pool::ConstantPool;
use super::descriptor::{parse_field_descriptor, parse_method_descriptor};
use super::module::{read_module, read_module_packages};
use super::reader::{ByteReader, ParseResult};
use super::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, refresh_type_parameters,
    refresh_use, resolve_type_parameters, resolve_use,
};
use super::type_annotations::{self as kinds, RawTypeAnnotation, TargetInfo, read_type_annotations};
use crate::config::ParserConfig;
use crate::error::{ClassFileError, Malformed};
use crate::model::NameTable;
use classdex_api::{
    AccessFlags, AnnotationInstance, AnnotationTarget, AnnotationValue, ClassFileVersion,
    ClassInfo, DotName, EnclosingMethod, FieldInfo, MethodInfo, MethodRef, ModuleInfo,
    NestingInfo, NestingKind, RecordComponentInfo, SUPERCLASS_INDEX, TargetSite, Type, TypeKind,
    TypeUsage, TypeVariable, VariableScope, normalize_annotations,
};
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};

const MAGIC: u32 = 0xCAFE_BABE;
const MIN_MAJOR_VERSION: u16 = 45;

/// Which declaration a type annotation table was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Class,
    Field(usize),
    Method(usize),
    Component(usize),
}

struct RawField {
    flags: AccessFlags,
    name: SmolStr,
    descriptor: SmolStr,
    descriptor_type: Type,
    signature: Option<SmolStr>,
    annotations: Vec<AnnotationInstance>,
}

struct RawMethod {
    flags: AccessFlags,
    name: SmolStr,
    descriptor: SmolStr,
    parameters: Vec<Type>,
    return_type: Type,
    signature: Option<SmolStr>,
    exceptions: Vec<DotName>,
    parameter_names: Vec<Option<SmolStr>>,
    /// `MethodParameters` access flags, parallel to `parameter_names`.
    parameter_flags: Vec<AccessFlags>,
    annotations: Vec<AnnotationInstance>,
    /// One entry per `Runtime*ParameterAnnotations` attribute.
    parameter_tables: Vec<Vec<Vec<AnnotationInstance>>>,
    default_value: Option<AnnotationValue>,
}

struct RawComponent {
    name: SmolStr,
    descriptor: SmolStr,
    descriptor_type: Type,
    signature: Option<SmolStr>,
    annotations: Vec<AnnotationInstance>,
}

struct InnerClassEntry {
    inner: DotName,
    outer: Option<DotName>,
    simple_name: Option<SmolStr>,
    flags: AccessFlags,
}

#[derive(Default)]
struct RawClass {
    signature: Option<SmolStr>,
    annotations: Vec<AnnotationInstance>,
    inner_classes: Vec<InnerClassEntry>,
    enclosing: Option<(DotName, Option<MethodRef>)>,
    permitted_subclasses: Vec<DotName>,
    components: Option<Vec<RawComponent>>,
    module: Option<ModuleInfo>,
    module_packages: Vec<DotName>,
    main_class: Option<DotName>,
    synthetic: bool,
}

/// Decodes one class file. Errors raised after `this_class` is known carry
/// the class name.
pub(crate) fn decode_class(
    bytes: &[u8],
    names: &NameTable,
    config: &ParserConfig,
) -> ParseResult<ParsedClass> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.read_u4()?;
    if magic != MAGIC {
        return Err(ClassFileError::malformed(0, Malformed::BadMagic(magic)));
    }
    let minor = reader.read_u2()?;
    let major = reader.read_u2()?;
    if major < MIN_MAJOR_VERSION {
        return Err(ClassFileError::malformed(6, Malformed::TooOldVersion(major)));
    }
    if major > config.max_major_version {
        return Err(ClassFileError::UnsupportedVersion {
            class: peek_class_name(bytes, &mut reader, names),
            major,
            minor,
        });
    }

    let mut pool = ConstantPool::parse(bytes, &mut reader)?;
    let flags = AccessFlags(reader.read_u2()?);
    let this_index = reader.read_u2()?;
    let name = pool.class_name(names, this_index)?;

    let mut decoder = ClassDecoder {
        names,
        config,
        pool,
        name: name.clone(),
        type_annotations: Vec::new(),
    };
    decoder
        .decode(&mut reader, flags, ClassFileVersion { major, minor })
        .map_err(|e| e.in_class(&name))
}

/// Best effort: the name of a class whose version is not supported, when the
/// constant pool still has a familiar layout.
fn peek_class_name<'a>(
    bytes: &'a [u8],
    reader: &mut ByteReader<'a>,
    names: &NameTable,
) -> Option<DotName> {
    let mut pool = ConstantPool::parse(bytes, reader).ok()?;
    reader.skip(2).ok()?;
    let index = reader.read_u2().ok()?;
    pool.class_name(names, index).ok()
}

struct ClassDecoder<'a, 't> {
    names: &'t NameTable,
    config: &'t ParserConfig,
    pool: ConstantPool<'a>,
    name: DotName,
    type_annotations: Vec<(Site, RawTypeAnnotation)>,
}

impl<'a, 't> ClassDecoder<'a, 't> {
    fn decode(
        &mut self,
        reader: &mut ByteReader<'a>,
        mut flags: AccessFlags,
        version: ClassFileVersion,
    ) -> ParseResult<ParsedClass> {
        let superclass_name = self.pool.optional_class_name(self.names, reader.read_u2()?)?;
        let interface_count = reader.read_u2()?;
        let mut interface_names = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interface_names.push(self.pool.class_name(self.names, reader.read_u2()?)?);
        }

        let field_count = reader.read_u2()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for index in 0..usize::from(field_count) {
            fields.push(self.read_field(reader, index)?);
        }

        let method_count = reader.read_u2()?;
        let mut methods = Vec::with_capacity(usize::from(method_count));
        for index in 0..usize::from(method_count) {
            methods.push(self.read_method(reader, index)?);
        }

        let mut raw = RawClass::default();
        let attribute_count = reader.read_u2()?;
        for _ in 0..attribute_count {
            self.read_class_attribute(reader, &mut raw)?;
        }
        if raw.synthetic {
            flags.0 |= AccessFlags::SYNTHETIC;
        }

        self.assemble(flags, version, superclass_name, interface_names, fields, methods, raw)
    }

    fn read_attribute(&mut self, reader: &mut ByteReader<'a>) -> ParseResult<(SmolStr, ByteReader<'a>)> {
        let name = self.pool.utf8(self.names, reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let body = reader.sub_reader(length)?;
        Ok((name, body))
    }

    fn wants(&self, visible: bool) -> bool {
        visible || self.config.include_invisible_annotations
    }

    fn annotation_table(
        &mut self,
        body: &mut ByteReader<'a>,
        visible: bool,
    ) -> ParseResult<Vec<AnnotationInstance>> {
        AnnotationDecoder::new(&mut self.pool, self.names).read_table(body, visible)
    }

    fn collect_type_annotations(
        &mut self,
        body: &mut ByteReader<'a>,
        visible: bool,
        site: Site,
    ) -> ParseResult<()> {
        let decoded = {
            let mut decoder = AnnotationDecoder::new(&mut self.pool, self.names);
            read_type_annotations(&mut decoder, body, visible)?
        };
        for annotation in decoded {
            if annotation.is_code_target() {
                tracing::debug!(
                    "skipping code-level type annotation {} in {}",
                    annotation.annotation.name(),
                    self.name
                );
                continue;
            }
            self.type_annotations.push((site, annotation));
        }
        Ok(())
    }

    fn read_signature(&mut self, body: &mut ByteReader<'a>) -> ParseResult<SmolStr> {
        self.pool.utf8(self.names, body.read_u2()?)
    }

    fn read_field(&mut self, reader: &mut ByteReader<'a>, index: usize) -> ParseResult<RawField> {
        let mut flags = AccessFlags(reader.read_u2()?);
        let name = self.pool.utf8(self.names, reader.read_u2()?)?;
        let descriptor_offset = reader.position();
        let descriptor = self.pool.utf8(self.names, reader.read_u2()?)?;
        let descriptor_type = parse_field_descriptor(&descriptor, self.names)
            .map_err(|reason| ClassFileError::malformed(descriptor_offset, reason))?;

        let mut signature = None;
        let mut annotations = Vec::new();
        let attribute_count = reader.read_u2()?;
        for _ in 0..attribute_count {
            let (attribute, mut body) = self.read_attribute(reader)?;
            match attribute.as_str() {
                "Signature" => signature = Some(self.read_signature(&mut body)?),
                "Synthetic" => flags.0 |= AccessFlags::SYNTHETIC,
                "RuntimeVisibleAnnotations" => {
                    annotations.extend(self.annotation_table(&mut body, true)?)
                }
                "RuntimeInvisibleAnnotations" if self.wants(false) => {
                    annotations.extend(self.annotation_table(&mut body, false)?)
                }
                "RuntimeVisibleTypeAnnotations" => {
                    self.collect_type_annotations(&mut body, true, Site::Field(index))?
                }
                "RuntimeInvisibleTypeAnnotations" if self.wants(false) => {
                    self.collect_type_annotations(&mut body, false, Site::Field(index))?
                }
                _ => {}
            }
        }

        Ok(RawField {
            flags,
            name,
            descriptor,
            descriptor_type,
            signature,
            annotations,
        })
    }

    fn read_method(&mut self, reader: &mut ByteReader<'a>, index: usize) -> ParseResult<RawMethod> {
        let mut flags = AccessFlags(reader.read_u2()?);
        let name = self.pool.utf8(self.names, reader.read_u2()?)?;
        let descriptor_offset = reader.position();
        let descriptor = self.pool.utf8(self.names, reader.read_u2()?)?;
        let (parameters, return_type) = parse_method_descriptor(&descriptor, self.names)
            .map_err(|reason| ClassFileError::malformed(descriptor_offset, reason))?;

        let mut method = RawMethod {
            flags,
            name,
            descriptor,
            parameters,
            return_type,
            signature: None,
            exceptions: Vec::new(),
            parameter_names: Vec::new(),
            parameter_flags: Vec::new(),
            annotations: Vec::new(),
            parameter_tables: Vec::new(),
            default_value: None,
        };

        let attribute_count = reader.read_u2()?;
        for _ in 0..attribute_count {
            let (attribute, mut body) = self.read_attribute(reader)?;
            match attribute.as_str() {
                "Signature" => method.signature = Some(self.read_signature(&mut body)?),
                "Synthetic" => flags.0 |= AccessFlags::SYNTHETIC,
                "Exceptions" => {
                    let count = body.read_u2()?;
                    for _ in 0..count {
                        let exception = self.pool.class_name(self.names, body.read_u2()?)?;
                        method.exceptions.push(exception);
                    }
                }
                "MethodParameters" => {
                    let count = body.read_u1()?;
                    for _ in 0..count {
                        let parameter = self.pool.optional_utf8(self.names, body.read_u2()?)?;
                        method.parameter_flags.push(AccessFlags(body.read_u2()?));
                        method.parameter_names.push(parameter);
                    }
                }
                "AnnotationDefault" => {
                    let value = AnnotationDecoder::new(&mut self.pool, self.names)
                        .read_element_value(&mut body, true, 0)?;
                    method.default_value = Some(value);
                }
                "RuntimeVisibleAnnotations" => {
                    method.annotations.extend(self.annotation_table(&mut body, true)?)
                }
                "RuntimeInvisibleAnnotations" if self.wants(false) => {
                    method.annotations.extend(self.annotation_table(&mut body, false)?)
                }
                "RuntimeVisibleParameterAnnotations" => {
                    let tables = AnnotationDecoder::new(&mut self.pool, self.names)
                        .read_parameter_tables(&mut body, true)?;
                    method.parameter_tables.push(tables);
                }
                "RuntimeInvisibleParameterAnnotations" if self.wants(false) => {
                    let tables = AnnotationDecoder::new(&mut self.pool, self.names)
                        .read_parameter_tables(&mut body, false)?;
                    method.parameter_tables.push(tables);
                }
                "RuntimeVisibleTypeAnnotations" => {
                    self.collect_type_annotations(&mut body, true, Site::Method(index))?
                }
                "RuntimeInvisibleTypeAnnotations" if self.wants(false) => {
                    self.collect_type_annotations(&mut body, false, Site::Method(index))?
                }
                "Code" => self.skip_code(&mut body)?,
                _ => {}
            }
        }
        method.flags = flags;
        Ok(method)
    }

    /// Walks a `Code` attribute far enough to decode (and drop) the type
    /// annotations on expressions and locals.
    fn skip_code(&mut self, body: &mut ByteReader<'a>) -> ParseResult<()> {
        // max_stack, max_locals
        body.skip(4)?;
        let code_length = body.read_u4()? as usize;
        body.skip(code_length)?;
        let handlers = body.read_u2()?;
        body.skip(usize::from(handlers) * 8)?;
        let attribute_count = body.read_u2()?;
        for _ in 0..attribute_count {
            let (attribute, mut nested) = self.read_attribute(body)?;
            let visible = match attribute.as_str() {
                "RuntimeVisibleTypeAnnotations" => true,
                "RuntimeInvisibleTypeAnnotations" => false,
                _ => continue,
            };
            let decoded = {
                let mut decoder = AnnotationDecoder::new(&mut self.pool, self.names);
                read_type_annotations(&mut decoder, &mut nested, visible)?
            };
            tracing::debug!(
                "ignoring {} code-level type annotations in {}",
                decoded.len(),
                self.name
            );
        }
        Ok(())
    }

    fn read_record(&mut self, body: &mut ByteReader<'a>) -> ParseResult<Vec<RawComponent>> {
        let count = body.read_u2()?;
        let mut components = Vec::with_capacity(usize::from(count));
        for index in 0..usize::from(count) {
            let name = self.pool.utf8(self.names, body.read_u2()?)?;
            let descriptor_offset = body.position();
            let descriptor = self.pool.utf8(self.names, body.read_u2()?)?;
            let descriptor_type = parse_field_descriptor(&descriptor, self.names)
                .map_err(|reason| ClassFileError::malformed(descriptor_offset, reason))?;
            let mut component = RawComponent {
                name,
                descriptor,
                descriptor_type,
                signature: None,
                annotations: Vec::new(),
            };
            let attribute_count = body.read_u2()?;
            for _ in 0..attribute_count {
                let (attribute, mut nested) = self.read_attribute(body)?;
                match attribute.as_str() {
                    "Signature" => component.signature = Some(self.read_signature(&mut nested)?),
                    "RuntimeVisibleAnnotations" => component
                        .annotations
                        .extend(self.annotation_table(&mut nested, true)?),
                    "RuntimeInvisibleAnnotations" if self.wants(false) => component
                        .annotations
                        .extend(self.annotation_table(&mut nested, false)?),
                    "RuntimeVisibleTypeAnnotations" => {
                        self.collect_type_annotations(&mut nested, true, Site::Component(index))?
                    }
                    "RuntimeInvisibleTypeAnnotations" if self.wants(false) => {
                        self.collect_type_annotations(&mut nested, false, Site::Component(index))?
                    }
                    _ => {}
                }
            }
            components.push(component);
        }
        Ok(components)
    }

    fn read_class_attribute(&mut self, reader: &mut ByteReader<'a>, raw: &mut RawClass) -> ParseResult<()> {
        let (attribute, mut body) = self.read_attribute(reader)?;
        match attribute.as_str() {
            "Signature" => raw.signature = Some(self.read_signature(&mut body)?),
            "Synthetic" => raw.synthetic = true,
            "RuntimeVisibleAnnotations" => raw.annotations.extend(self.annotation_table(&mut body, true)?),
            "RuntimeInvisibleAnnotations" if self.wants(false) => {
                raw.annotations.extend(self.annotation_table(&mut body, false)?)
            }
            "RuntimeVisibleTypeAnnotations" => {
                self.collect_type_annotations(&mut body, true, Site::Class)?
            }
            "RuntimeInvisibleTypeAnnotations" if self.wants(false) => {
                self.collect_type_annotations(&mut body, false, Site::Class)?
            }
            "InnerClasses" => {
                let count = body.read_u2()?;
                for _ in 0..count {
                    let inner = self.pool.class_name(self.names, body.read_u2()?)?;
                    let outer = self.pool.optional_class_name(self.names, body.read_u2()?)?;
                    let simple_name = self.pool.optional_utf8(self.names, body.read_u2()?)?;
                    let flags = AccessFlags(body.read_u2()?);
                    raw.inner_classes.push(InnerClassEntry {
                        inner,
                        outer,
                        simple_name,
                        flags,
                    });
                }
            }
            "EnclosingMethod" => {
                let class = self.pool.class_name(self.names, body.read_u2()?)?;
                let method_index = body.read_u2()?;
                let method = if method_index == 0 {
                    None
                } else {
                    let (name, descriptor) = self.pool.name_and_type(self.names, method_index)?;
                    Some(MethodRef::new(name, descriptor))
                };
                raw.enclosing = Some((class, method));
            }
            "PermittedSubclasses" => {
                let count = body.read_u2()?;
                for _ in 0..count {
                    let subclass = self.pool.class_name(self.names, body.read_u2()?)?;
                    raw.permitted_subclasses.push(subclass);
                }
            }
            "Record" => raw.components = Some(self.read_record(&mut body)?),
            "Module" => raw.module = Some(read_module(&mut body, &mut self.pool, self.names)?),
            "ModulePackages" => {
                raw.module_packages = read_module_packages(&mut body, &mut self.pool, self.names)?
            }
            "ModuleMainClass" => {
                raw.main_class = Some(self.pool.class_name(self.names, body.read_u2()?)?)
            }
            _ => {}
        }
        Ok(())
    }

    fn field_like_type(
        &self,
        signature: Option<&SmolStr>,
        descriptor_type: Type,
        scopes: &[&[Type]],
        member: &str,
    ) -> (Type, bool) {
        let Some(text) = signature else {
            return (descriptor_type, false);
        };
        match parse_field_signature(text, self.names) {
            Ok(ty) => (resolve_use(&ty, scopes), false),
            Err(reason) => {
                tracing::debug!(
                    "unparsable signature on {}.{}, using descriptor: {}",
                    self.name,
                    member,
                    reason
                );
                (descriptor_type, true)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &mut self,
        flags: AccessFlags,
        version: ClassFileVersion,
        superclass_name: Option<DotName>,
        interface_names: Vec<DotName>,
        fields: Vec<RawField>,
        methods: Vec<RawMethod>,
        raw: RawClass,
    ) -> ParseResult<ParsedClass> {
        let class_name = self.name.clone();
        let mut draft = Draft {
            type_parameters: Vec::new(),
            superclass_type: superclass_name.clone().map(Type::class),
            interface_types: interface_names.iter().cloned().map(Type::class).collect(),
            class_degraded: false,
            fields: Vec::with_capacity(fields.len()),
            field_degraded: Vec::with_capacity(fields.len()),
            methods: Vec::with_capacity(methods.len()),
            method_shift: Vec::with_capacity(methods.len()),
            method_degraded: Vec::with_capacity(methods.len()),
            components: None,
            component_degraded: Vec::new(),
        };

        if let Some(text) = &raw.signature {
            match parse_class_signature(text, self.names) {
                Ok(signature) if signature.interfaces.len() == interface_names.len() => {
                    let parameters =
                        resolve_type_parameters(&signature.type_parameters, VariableScope::Class, &[]);
                    let scopes = [parameters.as_slice()];
                    if superclass_name.is_some() {
                        draft.superclass_type = Some(resolve_use(&signature.superclass, &scopes));
                    }
                    draft.interface_types = signature
                        .interfaces
                        .iter()
                        .map(|t| resolve_use(t, &scopes))
                        .collect();
                    draft.type_parameters = parameters;
                }
                Ok(_) => {
                    draft.class_degraded = true;
                    tracing::debug!(
                        "signature of {} does not match its interfaces, using descriptors",
                        class_name
                    );
                }
                Err(reason) => {
                    draft.class_degraded = true;
                    tracing::debug!("unparsable signature on {}: {}", class_name, reason);
                }
            }
        }

        let class_parameters = draft.type_parameters.clone();
        let class_scopes = [class_parameters.as_slice()];

        for field in fields {
            let (field_type, degraded) = self.field_like_type(
                field.signature.as_ref(),
                field.descriptor_type,
                &class_scopes,
                &field.name,
            );
            let target = AnnotationTarget::new(class_name.clone(), TargetSite::Field(field.name.clone()));
            draft.fields.push(FieldInfo {
                declaring_class: class_name.clone(),
                name: field.name,
                flags: field.flags,
                descriptor: field.descriptor,
                field_type,
                annotations: targeted(field.annotations, &target),
            });
            draft.field_degraded.push(degraded);
        }

        let context = MethodContext {
            outer_instance: outer_instance(&class_name, &raw),
            is_enum: flags.is_enum(),
        };
        for method in methods {
            let (info, shift, degraded) = self.build_method(method, &class_name, &class_scopes, &context);
            draft.methods.push(info);
            draft.method_shift.push(shift);
            draft.method_degraded.push(degraded);
        }

        if let Some(components) = raw.components {
            let mut infos = Vec::with_capacity(components.len());
            for component in components {
                let (component_type, degraded) = self.field_like_type(
                    component.signature.as_ref(),
                    component.descriptor_type,
                    &class_scopes,
                    &component.name,
                );
                let target = AnnotationTarget::new(
                    class_name.clone(),
                    TargetSite::RecordComponent(component.name.clone()),
                );
                infos.push(RecordComponentInfo {
                    declaring_class: class_name.clone(),
                    name: component.name,
                    descriptor: component.descriptor,
                    component_type,
                    annotations: targeted(component.annotations, &target),
                });
                draft.component_degraded.push(degraded);
            }
            draft.components = Some(infos);
        }

        // Non-static member classes nest inside an instance of their outer class.
        let enclosing_instances: HashMap<DotName, DotName> = raw
            .inner_classes
            .iter()
            .filter(|entry| !entry.flags.is_static())
            .filter_map(|entry| Some((entry.inner.clone(), entry.outer.clone()?)))
            .collect();
        let enclosing = |name: &DotName| enclosing_instances.get(name).cloned();

        let mut type_targets = Vec::new();
        for (site, annotation) in std::mem::take(&mut self.type_annotations) {
            match draft.apply(&class_name, site, &annotation, &enclosing)? {
                Some(instance) => type_targets.push(instance),
                None => tracing::debug!(
                    "type annotation {} on {} could not be placed, skipped",
                    annotation.annotation.name(),
                    class_name
                ),
            }
        }
        if !type_targets.is_empty() {
            draft.refresh();
        }
        if self.config.intern_types {
            draft.intern(self.names);
        }

        let class_target = AnnotationTarget::new(class_name.clone(), TargetSite::Class);
        let declared_annotations = targeted(raw.annotations, &class_target);

        let mut all: BTreeMap<DotName, Vec<AnnotationInstance>> = BTreeMap::new();
        group(&mut all, &declared_annotations);
        group(&mut all, &type_targets);
        for field in &draft.fields {
            group(&mut all, &field.annotations);
        }
        for method in &draft.methods {
            group(&mut all, &method.annotations);
            for parameter in &method.parameter_annotations {
                group(&mut all, parameter);
            }
        }
        for component in draft.components.iter().flatten() {
            group(&mut all, &component.annotations);
        }

        let mut nesting = NestingInfo::default();
        let mut member_classes = Vec::new();
        for entry in &raw.inner_classes {
            if entry.inner == class_name {
                nesting.kind = match (&entry.outer, &entry.simple_name) {
                    (Some(_), _) => NestingKind::Member,
                    (None, None) => NestingKind::Anonymous,
                    (None, Some(_)) => NestingKind::Local,
                };
                nesting.enclosing_class = entry.outer.clone();
                nesting.simple_name = entry.simple_name.clone();
            } else if entry.outer.as_ref() == Some(&class_name) {
                member_classes.push(entry.inner.clone());
            }
        }
        if let Some((class, method)) = raw.enclosing {
            if nesting.kind == NestingKind::TopLevel {
                nesting.kind = NestingKind::Local;
            }
            if nesting.enclosing_class.is_none() {
                nesting.enclosing_class = Some(class.clone());
            }
            nesting.enclosing_method = method.map(|method| EnclosingMethod { class, method });
        }

        let module = raw.module.map(|mut module| {
            module.packages = raw.module_packages;
            module.main_class = raw.main_class;
            module
        });

        let mut referenced_classes = self.pool.referenced_classes(self.names)?;
        referenced_classes.sort();
        referenced_classes.dedup();
        referenced_classes.retain(|name| *name != class_name);

        let mut info = ClassInfo::new(class_name, flags, version);
        info.superclass_name = superclass_name;
        info.superclass_type = draft.superclass_type;
        info.interface_names = interface_names;
        info.interface_types = draft.interface_types;
        info.type_parameters = draft.type_parameters;
        info.fields = draft.fields;
        info.methods = draft.methods;
        info.record_components = draft.components;
        info.declared_annotations = declared_annotations;
        info.annotations = all;
        info.nesting = nesting;
        info.member_classes = member_classes;
        info.permitted_subclasses = raw.permitted_subclasses;
        info.module = module;
        info.referenced_classes = referenced_classes;

        Ok(ParsedClass {
            summary: info.summary(),
            info,
        })
    }

    fn build_method(
        &self,
        method: RawMethod,
        class_name: &DotName,
        class_scopes: &[&[Type]],
        context: &MethodContext,
    ) -> (MethodInfo, usize, bool) {
        let leading = context.leading_implicit_parameters(&method);
        let mut info = MethodInfo {
            declaring_class: class_name.clone(),
            name: method.name,
            flags: method.flags,
            descriptor: method.descriptor,
            type_parameters: Vec::new(),
            return_type: method.return_type,
            parameter_types: method.parameters,
            parameter_names: method.parameter_names,
            receiver_type: None,
            exceptions: method.exceptions.into_iter().map(Type::class).collect(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            default_value: method.default_value,
        };

        let mut shift = 0;
        let mut degraded = false;
        if let Some(text) = &method.signature {
            match parse_method_signature(text, self.names) {
                Ok(signature) if signature.parameters.len() <= info.parameter_types.len() => {
                    let parameters = resolve_type_parameters(
                        &signature.type_parameters,
                        VariableScope::Method,
                        class_scopes,
                    );
                    let mut scopes: Vec<&[Type]> = Vec::with_capacity(class_scopes.len() + 1);
                    scopes.push(&parameters);
                    scopes.extend_from_slice(class_scopes);

                    // Implicit parameters only exist in the descriptor.
                    let extra = info.parameter_types.len() - signature.parameters.len();
                    shift = leading.map_or(extra, |n| n.min(extra));
                    for (i, parameter) in signature.parameters.iter().enumerate() {
                        info.parameter_types[shift + i] = resolve_use(parameter, &scopes);
                    }
                    info.return_type = resolve_use(&signature.return_type, &scopes);
                    if !signature.throws.is_empty() {
                        info.exceptions = signature
                            .throws
                            .iter()
                            .map(|t| resolve_use(t, &scopes))
                            .collect();
                    }
                    info.type_parameters = parameters;
                }
                Ok(_) => {
                    degraded = true;
                    tracing::debug!(
                        "signature of {}.{} has more parameters than its descriptor, using descriptor",
                        class_name,
                        info.name
                    );
                }
                Err(reason) => {
                    degraded = true;
                    tracing::debug!(
                        "unparsable signature on {}.{}, using descriptor: {}",
                        class_name,
                        info.name,
                        reason
                    );
                }
            }
        }

        let method_ref = info.method_ref();
        let method_target = AnnotationTarget::new(class_name.clone(), TargetSite::Method(method_ref.clone()));
        info.annotations = targeted(method.annotations, &method_target);

        let count = info.parameter_types.len();
        let declared = method.parameter_tables.iter().map(Vec::len).max();
        if method.signature.is_none() || degraded {
            // Type annotations index declared parameters only.
            shift = match (leading, declared) {
                (Some(n), _) => n,
                (None, Some(declared)) => count.saturating_sub(declared),
                (None, None) => 0,
            };
        }
        let mut per_parameter: Vec<Vec<AnnotationInstance>> = vec![Vec::new(); count];
        for tables in method.parameter_tables {
            // Tables that skip implicit parameters start after the leading
            // ones, or line up with the end when those are unknown.
            let extra = count.saturating_sub(tables.len());
            let offset = leading.map_or(extra, |n| n.min(extra));
            for (i, annotations) in tables.into_iter().enumerate() {
                if let Some(slot) = per_parameter.get_mut(offset + i) {
                    slot.extend(annotations);
                }
            }
        }
        info.parameter_annotations = per_parameter
            .into_iter()
            .enumerate()
            .map(|(position, annotations)| {
                let target = AnnotationTarget::new(
                    class_name.clone(),
                    TargetSite::MethodParameter {
                        method: method_ref.clone(),
                        position: position as u16,
                    },
                );
                targeted(annotations, &target)
            })
            .collect();

        (info, shift, degraded)
    }
}

/// What a method needs to know about its class to find the parameters
/// javac adds in front of the declared ones.
struct MethodContext {
    outer_instance: Option<DotName>,
    is_enum: bool,
}

impl MethodContext {
    /// How many descriptor parameters precede the declared ones, when that
    /// can be told.
    fn leading_implicit_parameters(&self, method: &RawMethod) -> Option<usize> {
        let implicit = AccessFlags::SYNTHETIC | AccessFlags::MODULE;
        if !method.parameter_flags.is_empty() && method.parameter_flags.len() == method.parameters.len() {
            return Some(
                method
                    .parameter_flags
                    .iter()
                    .take_while(|flags| flags.contains(implicit))
                    .count(),
            );
        }
        if method.name != "<init>" {
            return None;
        }
        if self.is_enum {
            let descriptor_prefix = method.descriptor.starts_with("(Ljava/lang/String;I");
            return Some(if descriptor_prefix { 2 } else { 0 });
        }
        let outer = self.outer_instance.as_ref()?;
        let first = method.parameters.first().map(Type::name);
        Some(usize::from(first.as_ref() == Some(outer)))
    }
}

/// The class whose instance a non-static member, local or anonymous class
/// captures as its first constructor parameter.
fn outer_instance(class_name: &DotName, raw: &RawClass) -> Option<DotName> {
    let entry = raw.inner_classes.iter().find(|entry| entry.inner == *class_name);
    if entry.is_some_and(|entry| entry.flags.is_static()) {
        return None;
    }
    entry
        .and_then(|entry| entry.outer.clone())
        .or_else(|| raw.enclosing.as_ref().map(|(class, _)| class.clone()))
}

/// Targets every annotation and normalizes the list (sorted, last wins).
fn targeted(annotations: Vec<AnnotationInstance>, target: &AnnotationTarget) -> Vec<AnnotationInstance> {
    normalize_annotations(
        annotations
            .into_iter()
            .map(|a| a.with_target(target.clone()))
            .collect(),
    )
}

fn group(all: &mut BTreeMap<DotName, Vec<AnnotationInstance>>, annotations: &[AnnotationInstance]) {
    for annotation in annotations {
        all.entry(annotation.name().clone())
            .or_default()
            .push(annotation.clone());
    }
}

/// Member types under construction while type annotations are placed.
struct Draft {
    type_parameters: Vec<Type>,
    superclass_type: Option<Type>,
    interface_types: Vec<Type>,
    class_degraded: bool,
    fields: Vec<FieldInfo>,
    field_degraded: Vec<bool>,
    methods: Vec<MethodInfo>,
    method_shift: Vec<usize>,
    method_degraded: Vec<bool>,
    components: Option<Vec<RecordComponentInfo>>,
    component_degraded: Vec<bool>,
}

type Enclosing<'e> = &'e dyn Fn(&DotName) -> Option<DotName>;

/// Outcome of placing one annotation into a type slot.
enum Placement {
    Applied,
    /// The member fell back to its descriptor, so the path may not fit.
    Skipped,
    /// The target index points past the declaration.
    Missing,
}

fn annotate_slot(
    slot: &mut Type,
    raw: &RawTypeAnnotation,
    enclosing: Enclosing<'_>,
    degraded: bool,
) -> ParseResult<Placement> {
    match slot.annotate_at(raw.path.steps(), raw.annotation.clone(), enclosing) {
        Ok(annotated) => {
            *slot = annotated;
            Ok(Placement::Applied)
        }
        Err(_) if degraded => Ok(Placement::Skipped),
        Err(e) => Err(ClassFileError::malformed(
            raw.offset,
            Malformed::UnresolvedTypePath(e),
        )),
    }
}

fn annotate_optional(
    slot: Option<&mut Type>,
    raw: &RawTypeAnnotation,
    enclosing: Enclosing<'_>,
    degraded: bool,
) -> ParseResult<Placement> {
    match slot {
        Some(slot) => annotate_slot(slot, raw, enclosing, degraded),
        None => Ok(Placement::Missing),
    }
}

/// Annotates bound `bound` of a type parameter. Bound 0 is the class bound,
/// which is not stored when it was left implicit.
fn annotate_bound(
    parameter: Option<&mut Type>,
    bound: u8,
    raw: &RawTypeAnnotation,
    enclosing: Enclosing<'_>,
    degraded: bool,
) -> ParseResult<Placement> {
    let Some(parameter) = parameter else {
        return Ok(Placement::Missing);
    };
    let Some(tv) = parameter.as_type_variable() else {
        return Ok(Placement::Missing);
    };
    let position = if tv.implicit_object_bound {
        usize::from(bound).checked_sub(1)
    } else {
        Some(usize::from(bound))
    };
    let Some(position) = position.filter(|p| *p < tv.bounds.len()) else {
        return Ok(Placement::Missing);
    };
    let mut bounds = tv.bounds.clone();
    let placement = annotate_slot(&mut bounds[position], raw, enclosing, degraded)?;
    if let Placement::Applied = placement {
        let updated = TypeKind::TypeVariable(TypeVariable {
            identifier: tv.identifier.clone(),
            bounds,
            implicit_object_bound: tv.implicit_object_bound,
        });
        *parameter = parameter.with_kind(updated);
    }
    Ok(placement)
}

impl Draft {
    /// Places one type annotation. Returns the targeted instance, or `None`
    /// when the annotation was skipped.
    fn apply(
        &mut self,
        class: &DotName,
        site: Site,
        raw: &RawTypeAnnotation,
        enclosing: Enclosing<'_>,
    ) -> ParseResult<Option<AnnotationInstance>> {
        let (usage, degraded, placement) = match (site, raw.kind, raw.info) {
            (Site::Class, kinds::CLASS_TYPE_PARAMETER, TargetInfo::TypeParameter { index }) => {
                let slot = self.type_parameters.get_mut(usize::from(index));
                (
                    TypeUsage::ClassTypeParameter { index },
                    self.class_degraded,
                    annotate_optional(slot, raw, enclosing, self.class_degraded)?,
                )
            }
            (Site::Class, kinds::CLASS_EXTENDS, TargetInfo::Supertype { index }) => {
                let slot = if index == SUPERCLASS_INDEX {
                    self.superclass_type.as_mut()
                } else {
                    self.interface_types.get_mut(usize::from(index))
                };
                (
                    TypeUsage::Supertype { index },
                    self.class_degraded,
                    annotate_optional(slot, raw, enclosing, self.class_degraded)?,
                )
            }
            (
                Site::Class,
                kinds::CLASS_TYPE_PARAMETER_BOUND,
                TargetInfo::TypeParameterBound { parameter, bound },
            ) => {
                let slot = self.type_parameters.get_mut(usize::from(parameter));
                (
                    TypeUsage::ClassTypeParameterBound { parameter, bound },
                    self.class_degraded,
                    annotate_bound(slot, bound, raw, enclosing, self.class_degraded)?,
                )
            }
            (Site::Field(i), kinds::FIELD, TargetInfo::Empty) => {
                let degraded = self.field_degraded.get(i).copied().unwrap_or(false);
                let Some(field) = self.fields.get_mut(i) else {
                    return Ok(None);
                };
                (
                    TypeUsage::Field {
                        field: field.name.clone(),
                    },
                    degraded,
                    annotate_slot(&mut field.field_type, raw, enclosing, degraded)?,
                )
            }
            (Site::Component(i), kinds::FIELD, TargetInfo::Empty) => {
                let degraded = self.component_degraded.get(i).copied().unwrap_or(false);
                let Some(component) = self.components.as_mut().and_then(|c| c.get_mut(i)) else {
                    return Ok(None);
                };
                (
                    TypeUsage::RecordComponent {
                        component: component.name.clone(),
                    },
                    degraded,
                    annotate_slot(&mut component.component_type, raw, enclosing, degraded)?,
                )
            }
            (Site::Method(i), kind, info) => {
                let receiver_base = if self.type_parameters.is_empty() {
                    Type::class(class.clone())
                } else {
                    Type::parameterized(class.clone(), None, self.type_parameters.clone())
                };
                let degraded = self.method_degraded.get(i).copied().unwrap_or(false);
                let shift = self.method_shift.get(i).copied().unwrap_or(0);
                let Some(method) = self.methods.get_mut(i) else {
                    return Ok(None);
                };
                let method_ref = method.method_ref();
                match (kind, info) {
                    (kinds::METHOD_TYPE_PARAMETER, TargetInfo::TypeParameter { index }) => (
                        TypeUsage::MethodTypeParameter {
                            method: method_ref,
                            index,
                        },
                        degraded,
                        annotate_optional(
                            method.type_parameters.get_mut(usize::from(index)),
                            raw,
                            enclosing,
                            degraded,
                        )?,
                    ),
                    (
                        kinds::METHOD_TYPE_PARAMETER_BOUND,
                        TargetInfo::TypeParameterBound { parameter, bound },
                    ) => (
                        TypeUsage::MethodTypeParameterBound {
                            method: method_ref,
                            parameter,
                            bound,
                        },
                        degraded,
                        annotate_bound(
                            method.type_parameters.get_mut(usize::from(parameter)),
                            bound,
                            raw,
                            enclosing,
                            degraded,
                        )?,
                    ),
                    (kinds::METHOD_RETURN, TargetInfo::Empty) => (
                        TypeUsage::MethodReturn { method: method_ref },
                        degraded,
                        annotate_slot(&mut method.return_type, raw, enclosing, degraded)?,
                    ),
                    (kinds::METHOD_RECEIVER, TargetInfo::Empty) => {
                        let receiver = method.receiver_type.get_or_insert(receiver_base);
                        (
                            TypeUsage::MethodReceiver { method: method_ref },
                            degraded,
                            annotate_slot(receiver, raw, enclosing, degraded)?,
                        )
                    }
                    (kinds::METHOD_FORMAL_PARAMETER, TargetInfo::FormalParameter { index }) => {
                        let position = usize::from(index) + shift;
                        (
                            TypeUsage::MethodParameter {
                                method: method_ref,
                                position: position as u16,
                            },
                            degraded,
                            annotate_optional(
                                method.parameter_types.get_mut(position),
                                raw,
                                enclosing,
                                degraded,
                            )?,
                        )
                    }
                    (kinds::THROWS, TargetInfo::Throws { index }) => (
                        TypeUsage::Throws {
                            method: method_ref,
                            index,
                        },
                        degraded,
                        annotate_optional(
                            method.exceptions.get_mut(usize::from(index)),
                            raw,
                            enclosing,
                            degraded,
                        )?,
                    ),
                    _ => return Ok(None),
                }
            }
            _ => return Ok(None),
        };

        match placement {
            Placement::Applied => Ok(Some(raw.annotation.clone().with_target(
                AnnotationTarget::new(
                    class.clone(),
                    TargetSite::Type {
                        usage,
                        path: raw.path.clone(),
                    },
                ),
            ))),
            Placement::Skipped => Ok(None),
            Placement::Missing if degraded => Ok(None),
            Placement::Missing => Err(ClassFileError::malformed(
                raw.offset,
                Malformed::InvalidTypeAnnotationTarget(raw.kind),
            )),
        }
    }

    /// Copies annotated type-variable declarations into every use site.
    fn refresh(&mut self) {
        self.type_parameters = refresh_type_parameters(&self.type_parameters, &[]);
        let class_scopes = [self.type_parameters.as_slice()];
        if let Some(superclass) = self.superclass_type.as_mut() {
            *superclass = refresh_use(superclass, &class_scopes);
        }
        for interface in &mut self.interface_types {
            *interface = refresh_use(interface, &class_scopes);
        }
        for field in &mut self.fields {
            field.field_type = refresh_use(&field.field_type, &class_scopes);
        }
        for component in self.components.iter_mut().flatten() {
            component.component_type = refresh_use(&component.component_type, &class_scopes);
        }
        for method in &mut self.methods {
            method.type_parameters = refresh_type_parameters(&method.type_parameters, &class_scopes);
            let scopes = [method.type_parameters.as_slice(), class_scopes[0]];
            method.return_type = refresh_use(&method.return_type, &scopes);
            for parameter in &mut method.parameter_types {
                *parameter = refresh_use(parameter, &scopes);
            }
            for exception in &mut method.exceptions {
                *exception = refresh_use(exception, &scopes);
            }
            if let Some(receiver) = method.receiver_type.as_mut() {
                *receiver = refresh_use(receiver, &scopes);
            }
        }
    }

    /// Routes finished member types through the shared type table.
    fn intern(&mut self, names: &NameTable) {
        let intern = |ty: &mut Type| *ty = names.intern_type(ty.clone());
        self.type_parameters.iter_mut().for_each(intern);
        self.superclass_type.iter_mut().for_each(intern);
        self.interface_types.iter_mut().for_each(intern);
        for field in &mut self.fields {
            intern(&mut field.field_type);
        }
        for component in self.components.iter_mut().flatten() {
            intern(&mut component.component_type);
        }
        for method in &mut self.methods {
            method.type_parameters.iter_mut().for_each(intern);
            intern(&mut method.return_type);
            method.parameter_types.iter_mut().for_each(intern);
            method.exceptions.iter_mut().for_each(intern);
            method.receiver_type.iter_mut().for_each(intern);
        }
    }
}
