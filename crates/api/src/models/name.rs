use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between package components and between a package and a class.
pub const PACKAGE_SEPARATOR: char = '.';

/// Separator between an enclosing class and an inner class segment.
pub const INNER_SEPARATOR: char = '$';

/// Hierarchical dotted name, the universal key of the model.
///
/// A name is either *simple* (one flat dotted string) or *componentized*
/// (a local segment linked to an optional parent). Both encodings share one
/// equality, hashing and ordering contract based on the expanded string form,
/// so `DotName::simple("org.acme.Foo")` equals the chain `org -> acme -> Foo`.
#[derive(Clone)]
pub struct DotName(Arc<NameNode>);

#[derive(Debug)]
enum NameNode {
    Simple(SmolStr),
    Component {
        parent: Option<DotName>,
        local: SmolStr,
        inner: bool,
    },
}

impl DotName {
    /// Creates a name from its flat dotted form.
    pub fn simple(name: impl Into<SmolStr>) -> Self {
        Self(Arc::new(NameNode::Simple(name.into())))
    }

    /// Creates a name from a parent and one local segment joined with `.`.
    pub fn componentized(parent: Option<DotName>, local: impl Into<SmolStr>) -> Self {
        Self(Arc::new(NameNode::Component {
            parent,
            local: local.into(),
            inner: false,
        }))
    }

    /// Creates an inner-class name whose segment joins the parent with `$`.
    pub fn inner(parent: DotName, local: impl Into<SmolStr>) -> Self {
        Self(Arc::new(NameNode::Component {
            parent: Some(parent),
            local: local.into(),
            inner: true,
        }))
    }

    /// Converts a binary (internal) name such as `java/util/Map$Entry`.
    pub fn from_internal(internal: &str) -> Self {
        Self::simple(internal.replace('/', "."))
    }

    /// Address of the shared node. Clones agree; equal names built
    /// separately do not.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn is_componentized(&self) -> bool {
        matches!(&*self.0, NameNode::Component { .. })
    }

    /// True for componentized names whose last segment is an inner class.
    pub fn is_inner(&self) -> bool {
        matches!(&*self.0, NameNode::Component { inner: true, .. })
    }

    /// The local portion of the name.
    ///
    /// For componentized names this is the last component as it was created;
    /// for simple names it is everything after the last `.`.
    pub fn local(&self) -> &str {
        match &*self.0 {
            NameNode::Simple(s) => s.rsplit(PACKAGE_SEPARATOR).next().unwrap_or(s.as_str()),
            NameNode::Component { local, .. } => local,
        }
    }

    /// The last `.`-separated segment of the expanded form.
    pub fn last_segment(&self) -> Cow<'_, str> {
        self.segments().last().unwrap_or(Cow::Borrowed(""))
    }

    /// Compares the last segment of both names, independent of encoding.
    pub fn simple_name_eq(&self, other: &DotName) -> bool {
        self.last_segment() == other.last_segment()
    }

    /// The enclosing name: the parent component, or the text before the last `.`.
    pub fn prefix(&self) -> Option<DotName> {
        match &*self.0 {
            NameNode::Simple(s) => s
                .rfind(PACKAGE_SEPARATOR)
                .map(|idx| DotName::simple(&s[..idx])),
            NameNode::Component { parent, .. } => parent.clone(),
        }
    }

    /// The package of a class name, skipping inner-class components.
    pub fn package_prefix(&self) -> Option<DotName> {
        match &*self.0 {
            NameNode::Simple(s) => s
                .rfind(PACKAGE_SEPARATOR)
                .map(|idx| DotName::simple(&s[..idx])),
            NameNode::Component { parent, inner, .. } => {
                if *inner {
                    parent.as_ref().and_then(DotName::package_prefix)
                } else {
                    parent.clone()
                }
            }
        }
    }

    /// The expanded form without the package prefix (`Map$Entry` for `java.util.Map$Entry`).
    pub fn without_package_prefix(&self) -> String {
        let full = self.to_string();
        match self.package_prefix() {
            Some(pkg) => full[pkg.to_string().len() + 1..].to_string(),
            None => full,
        }
    }

    /// True iff the expanded form equals `prefix` followed by end-of-string or `.`.
    pub fn starts_with(&self, prefix: &DotName) -> bool {
        let mut mine = self.segments();
        for expected in prefix.segments() {
            match mine.next() {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }
        true
    }

    /// Walks the `.`-separated segments of the expanded form.
    ///
    /// Flat names are split lazily; `$` joins of inner components stay inside
    /// one segment, exactly as in the expanded string.
    pub fn segments(&self) -> Segments<'_> {
        match &*self.0 {
            NameNode::Simple(s) => Segments(SegmentsRepr::Flat(s.split(PACKAGE_SEPARATOR))),
            NameNode::Component { .. } => Segments(SegmentsRepr::Chain(
                self.chain_segments().into_iter(),
            )),
        }
    }

    fn pieces(&self) -> Vec<(&str, bool)> {
        let mut pieces = Vec::new();
        let mut current = Some(self);
        while let Some(name) = current {
            match &*name.0 {
                NameNode::Simple(s) => {
                    pieces.push((s.as_str(), false));
                    current = None;
                }
                NameNode::Component {
                    parent,
                    local,
                    inner,
                } => {
                    pieces.push((local.as_str(), *inner));
                    current = parent.as_ref();
                }
            }
        }
        pieces.reverse();
        pieces
    }

    fn chain_segments(&self) -> Vec<Cow<'_, str>> {
        let mut segments: Vec<Cow<'_, str>> = Vec::new();
        for (i, (text, inner)) in self.pieces().into_iter().enumerate() {
            let mut parts = text.split(PACKAGE_SEPARATOR);
            let first = parts.next().unwrap_or("");
            if i > 0 && inner {
                let mut joined = segments.pop().map(Cow::into_owned).unwrap_or_default();
                joined.push(INNER_SEPARATOR);
                joined.push_str(first);
                segments.push(Cow::Owned(joined));
            } else {
                segments.push(Cow::Borrowed(first));
            }
            segments.extend(parts.map(Cow::Borrowed));
        }
        segments
    }
}

/// Iterator over the segments of a [`DotName`].
pub struct Segments<'a>(SegmentsRepr<'a>);

enum SegmentsRepr<'a> {
    Flat(std::str::Split<'a, char>),
    Chain(std::vec::IntoIter<Cow<'a, str>>),
}

impl<'a> Iterator for Segments<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            SegmentsRepr::Flat(split) => split.next().map(Cow::Borrowed),
            SegmentsRepr::Chain(iter) => iter.next(),
        }
    }
}

impl PartialEq for DotName {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (NameNode::Simple(a), NameNode::Simple(b)) => a == b,
            _ => self.segments().eq(other.segments()),
        }
    }
}

impl Eq for DotName {}

impl Hash for DotName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in self.segments() {
            let segment: &str = &segment;
            segment.hash(state);
        }
    }
}

impl PartialOrd for DotName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DotName {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        self.segments().cmp(other.segments())
    }
}

impl fmt::Display for DotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            NameNode::Simple(s) => f.write_str(s),
            NameNode::Component { .. } => {
                for (i, (text, inner)) in self.pieces().into_iter().enumerate() {
                    if i > 0 {
                        let sep = if inner { INNER_SEPARATOR } else { PACKAGE_SEPARATOR };
                        fmt::Write::write_char(f, sep)?;
                    }
                    f.write_str(text)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for DotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DotName({})", self)
    }
}

impl From<&str> for DotName {
    fn from(value: &str) -> Self {
        DotName::simple(value)
    }
}

impl Serialize for DotName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DotName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = SmolStr::deserialize(deserializer)?;
        Ok(DotName::simple(raw))
    }
}
