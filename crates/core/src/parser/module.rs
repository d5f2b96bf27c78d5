use super::constant_pool::ConstantPool;
use super::reader::{ByteReader, ParseResult};
use crate::model::NameTable;
use classdex_api::{
    AccessFlags, DotName, ModuleInfo, PackageDirective, ProvidedService, RequiredModule,
};

fn read_package_directives<'a>(
    reader: &mut ByteReader<'a>,
    pool: &mut ConstantPool<'a>,
    names: &NameTable,
) -> ParseResult<Vec<PackageDirective>> {
    let count = reader.read_u2()?;
    let mut directives = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let package = pool.package_name(names, reader.read_u2()?)?;
        let flags = AccessFlags(reader.read_u2()?);
        let target_count = reader.read_u2()?;
        let mut targets = Vec::with_capacity(usize::from(target_count));
        for _ in 0..target_count {
            targets.push(pool.module_name(names, reader.read_u2()?)?);
        }
        directives.push(PackageDirective {
            package,
            flags,
            targets,
        });
    }
    Ok(directives)
}

fn read_class_list<'a>(
    reader: &mut ByteReader<'a>,
    pool: &mut ConstantPool<'a>,
    names: &NameTable,
) -> ParseResult<Vec<DotName>> {
    let count = reader.read_u2()?;
    let mut classes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        classes.push(pool.class_name(names, reader.read_u2()?)?);
    }
    Ok(classes)
}

/// Decodes the body of a `Module` attribute.
pub(crate) fn read_module<'a>(
    reader: &mut ByteReader<'a>,
    pool: &mut ConstantPool<'a>,
    names: &NameTable,
) -> ParseResult<ModuleInfo> {
    let name = pool.module_name(names, reader.read_u2()?)?;
    let flags = AccessFlags(reader.read_u2()?);
    let version = pool.optional_utf8(names, reader.read_u2()?)?;

    let requires_count = reader.read_u2()?;
    let mut requires = Vec::with_capacity(usize::from(requires_count));
    for _ in 0..requires_count {
        let module = pool.module_name(names, reader.read_u2()?)?;
        let flags = AccessFlags(reader.read_u2()?);
        let version = pool.optional_utf8(names, reader.read_u2()?)?;
        requires.push(RequiredModule {
            name: module,
            flags,
            version,
        });
    }

    let exports = read_package_directives(reader, pool, names)?;
    let opens = read_package_directives(reader, pool, names)?;
    let uses = read_class_list(reader, pool, names)?;

    let provides_count = reader.read_u2()?;
    let mut provides = Vec::with_capacity(usize::from(provides_count));
    for _ in 0..provides_count {
        let service = pool.class_name(names, reader.read_u2()?)?;
        let providers = read_class_list(reader, pool, names)?;
        provides.push(ProvidedService { service, providers });
    }

    Ok(ModuleInfo {
        name,
        flags,
        version,
        requires,
        exports,
        opens,
        uses,
        provides,
        main_class: None,
        packages: Vec::new(),
    })
}

/// Decodes the body of a `ModulePackages` attribute.
pub(crate) fn read_module_packages<'a>(
    reader: &mut ByteReader<'a>,
    pool: &mut ConstantPool<'a>,
    names: &NameTable,
) -> ParseResult<Vec<DotName>> {
    let count = reader.read_u2()?;
    let mut packages = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        packages.push(pool.package_name(names, reader.read_u2()?)?);
    }
    Ok(packages)
}
