use classdex_api::{DotName, Type};
use dashmap::DashMap;
use lasso::{Spur, ThreadedRodeo};
use smol_str::SmolStr;
use std::sync::Arc;

/// Session-wide interning of names, strings, byte payloads and type nodes.
///
/// Every `intern_*` call is insert-if-absent and returns the canonical
/// instance, so equal inputs share one allocation across all parsed classes.
/// Safe to share between parser threads.
#[derive(Debug, Default)]
pub struct NameTable {
    atoms: ThreadedRodeo,
    /// Keyed by the parent's node identity. The stored child keeps its
    /// parent alive, so an identity is never reused for a live key.
    components: DashMap<(Option<usize>, Spur, bool), DotName>,
    strings: DashMap<SmolStr, ()>,
    bytes: DashMap<Arc<[u8]>, ()>,
    /// Decoded constant-pool UTF-8, keyed by the interned raw payload.
    utf8: DashMap<Arc<[u8]>, SmolStr>,
    types: DashMap<Type, ()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameTableStats {
    pub atoms: usize,
    pub names: usize,
    pub strings: usize,
    pub byte_buffers: usize,
    pub types: usize,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dotted name such as `java.lang.String`, componentized along `.`.
    pub fn intern_name(&self, name: &str) -> DotName {
        self.intern_separated(name, '.')
    }

    /// A binary name such as `java/lang/String`.
    pub fn intern_internal_name(&self, name: &str) -> DotName {
        self.intern_separated(name, '/')
    }

    fn intern_separated(&self, name: &str, separator: char) -> DotName {
        let mut current: Option<DotName> = None;
        for segment in name.split(separator) {
            current = Some(self.intern_component(current.as_ref(), segment, false));
        }
        // `split` always yields at least one segment.
        current.unwrap_or_else(|| DotName::simple(name))
    }

    /// One link of a name chain. `inner` joins with `$` instead of `.`.
    pub fn intern_component(&self, parent: Option<&DotName>, local: &str, inner: bool) -> DotName {
        let atom = self.atoms.get_or_intern(local);
        let key = (parent.map(DotName::identity), atom, inner);
        if let Some(existing) = self.components.get(&key) {
            return existing.value().clone();
        }
        self.components
            .entry(key)
            .or_insert_with(|| {
                let local = SmolStr::new(self.atoms.resolve(&atom));
                match (parent, inner) {
                    (Some(parent), true) => DotName::inner(parent.clone(), local),
                    _ => DotName::componentized(parent.cloned(), local),
                }
            })
            .value()
            .clone()
    }

    pub fn intern_str(&self, value: &str) -> SmolStr {
        if let Some(existing) = self.strings.get(value) {
            return existing.key().clone();
        }
        self.strings
            .entry(SmolStr::new(value))
            .or_insert(())
            .key()
            .clone()
    }

    pub fn intern_bytes(&self, value: &[u8]) -> Arc<[u8]> {
        if let Some(existing) = self.bytes.get(value) {
            return existing.key().clone();
        }
        self.bytes
            .entry(Arc::from(value))
            .or_insert(())
            .key()
            .clone()
    }

    /// A constant-pool UTF-8 payload and its decoded text. `decode` runs at
    /// most once per distinct payload in the session; `None` means the bytes
    /// are not valid and nothing is interned.
    pub fn intern_utf8(&self, raw: &[u8], decode: impl FnOnce(&[u8]) -> Option<String>) -> Option<SmolStr> {
        if let Some(existing) = self.utf8.get(raw) {
            return Some(existing.value().clone());
        }
        let text = self.intern_str(&decode(raw)?);
        let key = self.intern_bytes(raw);
        Some(self.utf8.entry(key).or_insert(text).value().clone())
    }

    /// Structural interning: any type equal to an earlier one comes back as
    /// that earlier instance.
    pub fn intern_type(&self, ty: Type) -> Type {
        if let Some(existing) = self.types.get(&ty) {
            return existing.key().clone();
        }
        self.types.entry(ty).or_insert(()).key().clone()
    }

    pub fn stats(&self) -> NameTableStats {
        NameTableStats {
            atoms: self.atoms.len(),
            names: self.components.len(),
            strings: self.strings.len(),
            byte_buffers: self.bytes.len(),
            types: self.types.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_names_are_canonical() {
        let table = NameTable::new();
        let a = table.intern_name("java.lang.String");
        let b = table.intern_internal_name("java/lang/String");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "java.lang.String");
        assert!(a.is_componentized());
        assert_eq!(a.prefix(), b.prefix());
        // java, java.lang, java.lang.String
        assert_eq!(table.stats().names, 3);
    }

    #[test]
    fn test_inner_component() {
        let table = NameTable::new();
        let outer = table.intern_name("p.Outer");
        let inner = table.intern_component(Some(&outer), "Inner", true);
        assert_eq!(inner.to_string(), "p.Outer$Inner");
        assert_eq!(inner, DotName::simple("p.Outer$Inner"));
        let again = table.intern_component(Some(&outer), "Inner", true);
        assert_eq!(table.stats().names, 3);
        assert_eq!(again, inner);
    }

    #[test]
    fn test_strings_bytes_and_types() {
        let table = NameTable::new();
        let long = "a fairly long constant string that does not fit inline";
        let s1 = table.intern_str(long);
        let s2 = table.intern_str(long);
        assert_eq!(s1, s2);
        assert_eq!(table.stats().strings, 1);

        let b1 = table.intern_bytes(&[1, 2, 3]);
        let b2 = table.intern_bytes(&[1, 2, 3]);
        assert!(Arc::ptr_eq(&b1, &b2));
        assert_eq!(table.stats().byte_buffers, 1);

        let list = |table: &NameTable| {
            Type::parameterized(
                table.intern_name("java.util.List"),
                None,
                vec![Type::class(table.intern_name("java.lang.String"))],
            )
        };
        let t1 = table.intern_type(list(&table));
        let t2 = table.intern_type(list(&table));
        assert_eq!(t1, t2);
        assert_eq!(table.stats().types, 1);
    }

    #[test]
    fn test_utf8_payloads_decode_once() {
        let table = NameTable::new();
        let mut calls = 0;
        let mut decode = |raw: &[u8]| {
            calls += 1;
            String::from_utf8(raw.to_vec()).ok()
        };
        let first = table.intern_utf8(b"java/lang/Object", &mut decode).unwrap();
        let second = table.intern_utf8(b"java/lang/Object", &mut decode).unwrap();
        assert_eq!(first, "java/lang/Object");
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        assert_eq!(table.stats().byte_buffers, 1);

        assert!(table.intern_utf8(&[0xFF], |_| None).is_none());
        assert_eq!(table.stats().byte_buffers, 1);
    }

    #[test]
    fn test_components_key_on_parent_identity() {
        let table = NameTable::new();
        let parent = table.intern_name("org.acme");
        let child = table.intern_component(Some(&parent), "Foo", false);
        // An equal parent built elsewhere is a different node.
        let detached = DotName::simple("org.acme");
        let other = table.intern_component(Some(&detached), "Foo", false);
        assert_eq!(child, other);
        assert_eq!(table.stats().names, 4);
        let again = table.intern_component(Some(&parent.clone()), "Foo", false);
        assert_eq!(table.stats().names, 4);
        assert_eq!(again.identity(), child.identity());
    }

    #[test]
    fn test_concurrent_interning_yields_one_instance() {
        let table = NameTable::new();
        let names: Vec<DotName> = (0..64)
            .into_par_iter()
            .map(|i| table.intern_name(&format!("com.example.pkg{}.Type", i % 4)))
            .collect();
        for name in &names {
            let expected = table.intern_name(&name.to_string());
            assert_eq!(*name, expected);
        }
        // com, com.example, 4 packages, 4 types
        assert_eq!(table.stats().names, 10);
    }
}
