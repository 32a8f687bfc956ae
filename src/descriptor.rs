//! Caller-provided argument descriptors.
//!
//! A [`Descriptor`] is a plain, immutable node in the host's argument tree.
//! The host builds the whole tree up front (typically as a `'static` array
//! literal, mirroring how the original C library built `TsClpArgument[]`
//! tables) and hands a reference to [`crate::Handle::open`]. The parser never
//! mutates a `Descriptor`; all mutable parse state lives in the `Symbol`
//! mirror built from it (see [`crate::symtab`]).

use crate::flags::Flags;

/// The kind of value (or aggregate) a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Switch,
    Number,
    Float,
    String,
    Object,
    Overlay,
    Alias,
}

/// One node of the caller-supplied argument tree.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub kind: Kind,
    pub keyword: &'static str,
    /// For `Kind::Alias`, the keyword of the descriptor this aliases. Must
    /// name a sibling that is itself not an alias.
    pub alias_of: Option<&'static str>,
    pub min: u32,
    pub max: u32,
    /// Element size in bytes. For `String`, the available/element size
    /// rather than a fixed type width.
    pub size: usize,
    /// Byte offset of this argument within the target buffer.
    pub offset: usize,
    /// Discriminant used for overlay branches, switch values, and
    /// `DEF`-flagged "keyword alone" number semantics.
    pub object_id: i64,
    pub flags: Flags,
    /// Child table for `Object`/`Overlay` children, or for the constant
    /// selection table of a `SELECTION`-flagged scalar.
    pub children: Option<&'static [Descriptor]>,
    /// Expression text evaluated and bound when this descriptor receives no
    /// writes during a parse and the scope containing it closes.
    pub default: Option<&'static str>,
    /// For a descriptor carrying a `COUNT`/`ELN`/`SLN`/`TLN`/`OID`/`IND` link
    /// role, the keyword of the sibling it reports on.
    pub link_target: Option<&'static str>,
    pub help: &'static str,
    pub manual: &'static str,
}

impl Descriptor {
    /// A builder-style constructor for the common case, with all optional
    /// fields defaulted. Intended for descriptor tables built by hand in
    /// tests and examples; production descriptor trees are usually declared
    /// as `const`/`static` array literals directly.
    pub const fn new(kind: Kind, keyword: &'static str, size: usize, offset: usize) -> Self {
        Descriptor {
            kind,
            keyword,
            alias_of: None,
            min: 0,
            max: 1,
            size,
            offset,
            object_id: 0,
            flags: Flags::empty(),
            children: None,
            default: None,
            link_target: None,
            help: "",
            manual: "",
        }
    }

    pub const fn min_max(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub const fn oid(mut self, oid: i64) -> Self {
        self.object_id = oid;
        self
    }

    pub const fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub const fn children(mut self, children: &'static [Descriptor]) -> Self {
        self.children = Some(children);
        self
    }

    pub const fn default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn alias_of(mut self, target: &'static str) -> Self {
        self.alias_of = Some(target);
        self
    }

    pub const fn link_target(mut self, target: &'static str) -> Self {
        self.link_target = Some(target);
        self
    }

    pub const fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    pub const fn manual(mut self, manual: &'static str) -> Self {
        self.manual = manual;
        self
    }

    pub fn is_array(&self) -> bool {
        self.max != 1
    }
}

/// A descriptor tree's root table: the list of top-level object/overlay
/// arguments a host accepts.
pub type RootTable = [Descriptor];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builder_sets_fields() {
        let d = Descriptor::new(Kind::Number, "NUM08", 1, 0)
            .min_max(1, 1)
            .oid(1)
            .default("23");
        assert_eq!(d.keyword, "NUM08");
        assert_eq!(d.min, 1);
        assert_eq!(d.max, 1);
        assert_eq!(d.object_id, 1);
        assert_eq!(d.default, Some("23"));
        assert!(!d.is_array());
    }

    #[test]
    fn is_array_true_when_max_not_one() {
        let d = Descriptor::new(Kind::String, "ARR", 5, 0).min_max(0, 4);
        assert!(d.is_array());
    }
}
