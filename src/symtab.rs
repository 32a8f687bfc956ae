//! The dynamically built symbol table.
//!
//! A [`Descriptor`] tree is immutable and caller-owned; [`SymbolTable`] is the
//! mutable mirror the parser actually walks, tracking per-scope occurrence
//! counts, lazily-materialized child lists, and the sibling view an alias
//! shares with its principal. One table is built per [`crate::Handle::open`]
//! call and reused (with `reset`) across repeated `parse_command` calls.

use crate::descriptor::{Descriptor, Kind, RootTable};
use crate::error::{Error, Result, SourceOrigin};
use crate::eval::Value;
use crate::flags::Flags;
use crate::intern::{Interner, Kw};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a descriptor's bound values are stored. `Static` covers scalars and
/// `CONSTANT` selection-table entries (a single slot, overwritten on each
/// bind); `Fixed` is a statically-sized array with stride-based offsets;
/// `Variable` is a `DYN`-flagged array that grows through the allocator
/// registry as elements are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Static,
    Fixed { stride: usize },
    Variable,
}

pub struct Symbol {
    pub descriptor: &'static Descriptor,
    pub parent: Option<SymbolId>,
    pub storage: Storage,
    /// Self unless this symbol is an `ALIAS`, in which case the id of the
    /// sibling it resolves to — alias and principal share one record.
    pub principal: SymbolId,
    pub count: u32,
    pub keyword: Kw,
    children: Option<Vec<SymbolId>>,
    /// A value supplied by `parse_properties`/`symbol_update`, shadowing
    /// `descriptor.default` when the scope closes with this symbol
    /// unwritten. Survives `reset` — see its doc comment.
    property_override: Option<Value>,
}

pub struct SymbolTable {
    symbols: Vec<Symbol>,
    roots: Vec<SymbolId>,
    interner: Interner,
    case_sensitive: bool,
    /// `OWN`/`PGM`/`PATH` segments of the environment-variable default
    /// lookup chain. Empty strings drop out of the chain rather than
    /// contributing a blank segment.
    env_owner: String,
    env_program: String,
    env_path: String,
}

impl SymbolTable {
    pub fn build(root: &'static RootTable, case_sensitive: bool) -> Self {
        Self::build_with_env(root, case_sensitive, "", "", "")
    }

    /// Same as [`Self::build`], additionally pre-filling each scalar/array
    /// descriptor's initial default from the environment, checked in
    /// `OWN.PGM.PATH.KYW`, `PGM.PATH.KYW`, `PATH.KYW` order (whichever
    /// leading segments are non-empty), dots replaced by underscores and
    /// uppercased. A hit is stored the same way a property-list override
    /// would be, so it's shadowed by an explicit `parse_properties` or
    /// `symbol_update` call the same way a file-supplied default is.
    pub fn build_with_env(root: &'static RootTable, case_sensitive: bool, owner: &str, program: &str, path: &str) -> Self {
        let mut table = SymbolTable {
            symbols: Vec::new(),
            roots: Vec::new(),
            interner: Interner::new(),
            case_sensitive,
            env_owner: owner.to_string(),
            env_program: program.to_string(),
            env_path: path.to_string(),
        };
        let roots = table.materialize(root, None);
        table.resolve_aliases(&roots);
        table.roots = roots;
        table
    }

    fn materialize(&mut self, descs: &'static [Descriptor], parent: Option<SymbolId>) -> Vec<SymbolId> {
        let mut ids = Vec::with_capacity(descs.len());
        for d in descs {
            let storage = if d.flags.contains(Flags::DYN) {
                Storage::Variable
            } else if d.is_array() {
                Storage::Fixed { stride: d.size }
            } else {
                Storage::Static
            };
            let keyword = if self.case_sensitive {
                self.interner.intern(d.keyword)
            } else {
                self.interner.intern_ci(d.keyword)
            };
            let id = SymbolId(self.symbols.len() as u32);
            self.symbols.push(Symbol {
                descriptor: d,
                parent,
                storage,
                principal: id,
                count: 0,
                keyword,
                children: None,
                property_override: None,
            });
            self.seed_env_default(id);
            ids.push(id);
        }
        ids
    }

    /// Checks the environment chain for `id`'s descriptor and, on a hit,
    /// stashes the parsed value as its initial property override.
    fn seed_env_default(&mut self, id: SymbolId) {
        let d = self.symbols[id.index()].descriptor;
        if !matches!(d.kind, Kind::Number | Kind::Float | Kind::String) || d.flags.contains(Flags::CONSTANT) || d.flags.contains(Flags::DUMMY) {
            return;
        }
        for name in env_chain(&self.env_owner, &self.env_program, &self.env_path, d.keyword) {
            if let Ok(raw) = std::env::var(name.replace('.', "_").to_ascii_uppercase()) {
                if let Some(value) = parse_env_value(d.kind, &raw) {
                    self.symbols[id.index()].property_override = Some(value);
                }
                break;
            }
        }
    }

    fn resolve_aliases(&mut self, ids: &[SymbolId]) {
        for &id in ids {
            let d = self.symbols[id.index()].descriptor;
            if d.flags.contains(Flags::ALIAS) {
                if let Some(target_name) = d.alias_of {
                    if let Some(&target) = ids
                        .iter()
                        .find(|&&other| other != id && self.symbols[other.index()].descriptor.keyword == target_name)
                    {
                        self.symbols[id.index()].principal = target;
                    }
                }
            }
        }
    }

    /// Ensures `id`'s children are materialized (this is the "lazy
    /// extension" point: objects/overlays are cheap until a path actually
    /// descends into them) and returns them.
    pub fn ensure_children(&mut self, id: SymbolId) -> &[SymbolId] {
        if self.symbols[id.index()].children.is_none() {
            let desc = self.symbols[id.index()].descriptor;
            let child_ids = match desc.children {
                Some(children) => self.materialize(children, Some(id)),
                None => Vec::new(),
            };
            self.resolve_aliases(&child_ids);
            self.symbols[id.index()].children = Some(child_ids);
        }
        self.symbols[id.index()].children.as_deref().unwrap()
    }

    pub fn roots(&self) -> &[SymbolId] {
        &self.roots
    }

    /// Read-only view of `id`'s children: empty if they haven't been
    /// materialized by [`Self::ensure_children`] yet. Used by contexts that
    /// only hold a shared reference to the table (expression evaluation
    /// against already-bound siblings), where lazily populating on first
    /// touch isn't available.
    pub fn children_if_materialized(&self, id: SymbolId) -> &[SymbolId] {
        self.symbols[id.index()].children.as_deref().unwrap_or(&[])
    }

    pub fn descriptor(&self, id: SymbolId) -> &'static Descriptor {
        self.symbols[id.index()].descriptor
    }

    pub fn principal(&self, id: SymbolId) -> SymbolId {
        self.symbols[id.index()].principal
    }

    pub fn storage(&self, id: SymbolId) -> Storage {
        self.symbols[self.principal(id).index()].storage
    }

    pub fn count(&self, id: SymbolId) -> u32 {
        self.symbols[self.principal(id).index()].count
    }

    pub fn bump_count(&mut self, id: SymbolId) -> u32 {
        let p = self.principal(id).index();
        self.symbols[p].count += 1;
        self.symbols[p].count
    }

    pub fn parent(&self, id: SymbolId) -> Option<SymbolId> {
        self.symbols[id.index()].parent
    }

    /// Records a value that shadows `descriptor.default` for `id`'s
    /// principal the next time its scope closes with `id` unwritten.
    /// Installed by `parse_properties`/`symbol_update`.
    pub fn set_property_override(&mut self, id: SymbolId, value: Value) {
        let p = self.principal(id).index();
        self.symbols[p].property_override = Some(value);
    }

    pub fn property_override(&self, id: SymbolId) -> Option<&Value> {
        self.symbols[self.principal(id).index()].property_override.as_ref()
    }

    /// Resets every occurrence counter to zero and drops lazily-materialized
    /// children, so a handle can be reused for a fresh `parse_command` call
    /// without rebuilding from the descriptor tree. Property overrides
    /// survive a reset — they outlive one parse pass by design, the same
    /// way a property file's values outlive the command line that follows
    /// it.
    pub fn reset(&mut self) {
        for s in &mut self.symbols {
            s.count = 0;
        }
    }

    /// Finds the sibling of `parent` (or a root, when `parent` is `None`)
    /// whose keyword exactly matches `text`, or — failing that — whose
    /// keyword `text` is an unambiguous prefix of. Returns a table error if
    /// more than one sibling shares the same prefix.
    pub fn find_symbol(
        &mut self,
        parent: Option<SymbolId>,
        text: &str,
        span: Span,
        source: SourceOrigin,
    ) -> Result<Option<SymbolId>> {
        let siblings: Vec<SymbolId> = match parent {
            Some(p) => self.ensure_children(p).to_vec(),
            None => self.roots.clone(),
        };
        let needle = if self.case_sensitive {
            text.to_string()
        } else {
            text.to_ascii_uppercase()
        };
        if let Some(&exact) = siblings
            .iter()
            .find(|&&id| self.symbols[id.index()].descriptor.keyword == needle)
        {
            return Ok(Some(exact));
        }
        let matches: Vec<SymbolId> = siblings
            .into_iter()
            .filter(|&id| self.symbols[id.index()].descriptor.keyword.starts_with(&needle))
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0])),
            _ => Err(Error::tab(
                format!("'{text}' abbreviates more than one keyword in this scope"),
                span,
                source,
            )),
        }
    }

    /// Like [`Self::find_symbol`], but on a miss in `scope` walks up through
    /// each enclosing object/overlay's own sibling list in turn before
    /// giving up, so a parameter nested several objects deep can still name
    /// an ancestor scope's keyword without repeating the whole path.
    pub fn find_symbol_outward(
        &mut self,
        scope: Option<SymbolId>,
        text: &str,
        span: Span,
        source: SourceOrigin,
    ) -> Result<Option<SymbolId>> {
        let mut cur = scope;
        loop {
            if let Some(found) = self.find_symbol(cur, text, span, source)? {
                return Ok(Some(found));
            }
            cur = match cur {
                Some(s) => self.parent(s),
                None => return Ok(None),
            };
        }
    }

    pub fn keyword_of(&self, id: SymbolId) -> &'static str {
        self.symbols[id.index()].descriptor.keyword
    }

    /// The full path to `id`, root-first, for diagnostics and `syntax()`/
    /// `help()` output.
    pub fn path(&self, id: SymbolId) -> Vec<&'static str> {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            parts.push(self.symbols[c.index()].descriptor.keyword);
            cur = self.symbols[c.index()].parent;
        }
        parts.reverse();
        parts
    }

    pub fn descriptor_kind(&self, id: SymbolId) -> Kind {
        self.symbols[id.index()].descriptor.kind
    }

    /// Walks the whole tree (materializing every object/overlay body along
    /// the way) and collects every symbol currently holding a property
    /// override, root-first path alongside its value. Used by
    /// `Handle::properties` to regenerate property-list text a later
    /// `parse_properties` call reproduces the same merged defaults from.
    pub fn collect_property_overrides(&mut self, parent: Option<SymbolId>, out: &mut Vec<(Vec<&'static str>, Value)>) {
        let siblings: Vec<SymbolId> = match parent {
            Some(p) => self.ensure_children(p).to_vec(),
            None => self.roots.clone(),
        };
        for sib in siblings {
            if let Some(v) = self.property_override(sib).cloned() {
                out.push((self.path(sib), v));
            }
            if matches!(self.descriptor(sib).kind, Kind::Object | Kind::Overlay) {
                self.collect_property_overrides(Some(sib), out);
            }
        }
    }

    /// Resolves a dot-separated path (`"OBJ.INNER"`) to a symbol id, walking
    /// down from the roots. Used by `Handle::symbol_update`.
    pub fn find_path(&mut self, path: &str, span: Span, source: SourceOrigin) -> Result<SymbolId> {
        let mut parent: Option<SymbolId> = None;
        let mut current = None;
        for part in path.split('.') {
            let found = self
                .find_symbol(parent, part, span, source)?
                .ok_or_else(|| Error::tab(format!("no symbol at path component '{part}'"), span, source))?;
            current = Some(found);
            parent = Some(found);
        }
        current.ok_or_else(|| Error::tab("empty path", span, source))
    }
}

/// Builds the `OWN.PGM.PATH.KYW` environment-variable candidate chain,
/// longest first, dropping any of `owner`/`program`/`path` that is empty.
/// `keyword` is always the last segment.
fn env_chain(owner: &str, program: &str, path: &str, keyword: &str) -> Vec<String> {
    let prefix: Vec<&str> = [owner, program, path].into_iter().filter(|s| !s.is_empty()).collect();
    let mut out = Vec::with_capacity(prefix.len() + 1);
    for start in 0..prefix.len() {
        let mut parts = prefix[start..].to_vec();
        parts.push(keyword);
        out.push(parts.join("."));
    }
    if prefix.is_empty() {
        out.push(keyword.to_string());
    }
    out
}

/// Converts a raw environment-variable string into a bindable value, per
/// the receiving descriptor's kind. Returns `None` for a value that
/// doesn't parse as the expected type, in which case the variable is
/// silently skipped rather than rejected.
fn parse_env_value(kind: Kind, raw: &str) -> Option<Value> {
    match kind {
        Kind::Number => raw.trim().parse::<i64>().ok().map(Value::Int),
        Kind::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
        Kind::String => Some(Value::Str(raw.as_bytes().to_vec(), crate::eval::StrEnc::Default)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    static LEAVES: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "NUM08", 8, 0),
        Descriptor::new(Kind::String, "NUMBER-EXTRA", 8, 8),
    ];

    static ROOT: &[Descriptor] = &[Descriptor::new(Kind::Object, "OBJ", 0, 0).children(LEAVES)];

    #[test]
    fn find_exact_then_abbreviation() {
        let mut table = SymbolTable::build(ROOT, true);
        let obj = table.roots()[0];
        let kids = table.ensure_children(obj).to_vec();
        assert_eq!(kids.len(), 2);
        let span = Span::point(0);
        let found = table
            .find_symbol(Some(obj), "NUM08", span, SourceOrigin::CommandLine)
            .unwrap();
        assert_eq!(table.keyword_of(found.unwrap()), "NUM08");
    }

    #[test]
    fn ambiguous_abbreviation_is_a_table_error() {
        let mut table = SymbolTable::build(ROOT, true);
        let obj = table.roots()[0];
        let err = table
            .find_symbol(Some(obj), "NUM", Span::point(0), SourceOrigin::CommandLine)
            .unwrap_err();
        assert_eq!(err.code(), -5);
    }

    #[test]
    fn env_chain_orders_longest_prefix_first() {
        assert_eq!(
            env_chain("ME", "PGM", "SOME.PATH", "KYW"),
            vec!["ME.PGM.SOME.PATH.KYW", "PGM.SOME.PATH.KYW", "SOME.PATH.KYW"]
        );
        assert_eq!(env_chain("", "", "", "KYW"), vec!["KYW"]);
    }

    #[test]
    fn env_variable_seeds_initial_default() {
        static LEAF: &[Descriptor] = &[Descriptor::new(Kind::Number, "ENVNUM08", 8, 0)];
        std::env::set_var("ENVNUM08", "42");
        let mut table = SymbolTable::build_with_env(LEAF, true, "", "", "");
        let id = table.roots()[0];
        assert_eq!(table.property_override(id), Some(&Value::Int(42)));
        std::env::remove_var("ENVNUM08");
    }

    #[test]
    fn count_increments_per_bind() {
        let mut table = SymbolTable::build(ROOT, true);
        let obj = table.roots()[0];
        let kids = table.ensure_children(obj).to_vec();
        assert_eq!(table.count(kids[0]), 0);
        table.bump_count(kids[0]);
        table.bump_count(kids[0]);
        assert_eq!(table.count(kids[0]), 2);
    }

    #[test]
    fn alias_shares_principal_storage() {
        static TARGET_AND_ALIAS: &[Descriptor] = &[
            Descriptor::new(Kind::Number, "LONGNAME", 8, 0),
            Descriptor::new(Kind::Alias, "LN", 0, 0).alias_of("LONGNAME"),
        ];
        static ROOT2: &[Descriptor] =
            &[Descriptor::new(Kind::Object, "O", 0, 0).children(TARGET_AND_ALIAS)];
        let mut table = SymbolTable::build(ROOT2, true);
        let obj = table.roots()[0];
        let kids = table.ensure_children(obj).to_vec();
        let target = kids[0];
        let alias = kids[1];
        table.bump_count(alias);
        assert_eq!(table.count(target), 1);
        assert_eq!(table.principal(alias), target);
    }
}
