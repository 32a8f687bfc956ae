//! The recursive-descent parameter-list parser.
//!
//! Walks a token stream against the current [`SymbolTable`] scope, binding
//! each keyword's value (or descending into an object/overlay body) as it
//! goes, and closes every scope it opens through [`crate::defaults`] so
//! minimums and defaults are enforced at the right nesting level. Property
//! lists reuse the same machinery through [`Parser::parse_property_list`],
//! the only difference being dotted paths instead of nested parentheses.

use crate::alloc::AllocRegistry;
use crate::binder;
use crate::constants::RandomState;
use crate::defaults;
use crate::descriptor::{Descriptor, Kind};
use crate::error::{Error, Result, SourceOrigin};
use crate::eval::{EmptyContext, Evaluator, Value, VariableLookup};
use crate::flags::Flags;
use crate::lexer::{Checkpoint, Lexer, Token};
use crate::symtab::{SymbolId, SymbolTable};
use crate::target::TargetBuffer;

/// One entry in the "parsed list": every argument successfully bound
/// before a parse either finished or failed, in bind order. `value_text`
/// is already redacted (`***SECRET***`) for `PWD`-flagged descriptors, so
/// callers never need to re-check the flag before displaying it.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub path: Vec<&'static str>,
    pub value_text: String,
}

impl ParsedEntry {
    /// Renders as `dotted.path=value`, the form `Error::render`'s
    /// `parsed_list` argument expects.
    pub fn display(&self) -> String {
        format!("{}={}", self.path.join("."), self.value_text)
    }
}

pub struct Parser<'t, 'b> {
    pub table: &'t mut SymbolTable,
    pub buf: &'t mut TargetBuffer<'b>,
    pub alloc: &'t mut AllocRegistry,
    pub rng: RandomState,
    pub now: i64,
    /// Gates the `=>path` parameter-file inclusion form. Set by
    /// [`crate::handle::Handle`] from `OpenOptions::parameter_files_enabled`.
    pub parameter_files_enabled: bool,
    /// Whether `close_scope` enforces minimum-occurrence counts. `false`
    /// for property-list parsing and for a lenient command parse.
    pub strict: bool,
    /// Every argument bound so far this parse, in order, for
    /// `Error::render`'s "parsed list" and for the caller's own inspection.
    pub parsed_log: Vec<ParsedEntry>,
}

/// Resolves bare-keyword references during expression evaluation against
/// whatever symbols are already bound in the current scope. Only scalar
/// Number/Float lookups are supported — string variable references aren't,
/// a deliberate simplification noted in `DESIGN.md`.
struct SiblingContext<'p, 't, 'b> {
    parser: &'p Parser<'t, 'b>,
    scope: Option<SymbolId>,
    /// The target descriptor's own constant table, present only when it's
    /// `SELECTION`-flagged — a bare keyword naming one of these entries
    /// evaluates to that entry's value rather than a sibling lookup.
    selection: Option<&'static [Descriptor]>,
}

impl<'p, 't, 'b> VariableLookup for SiblingContext<'p, 't, 'b> {
    fn lookup_variable(&self, name: &str, _subscript: Option<usize>) -> Result<Option<Value>> {
        // Read-only lookup: only siblings already materialized by
        // `ensure_children` are visible, since this context holds a shared
        // reference to the table. In practice the enclosing scope was just
        // walked into by the parser, so its children are already there.
        let siblings: Vec<SymbolId> = match self.scope {
            Some(p) => self.parser.table.children_if_materialized(p).to_vec(),
            None => self.parser.table.roots().to_vec(),
        };
        for id in siblings {
            if self.parser.table.keyword_of(id).eq_ignore_ascii_case(name) {
                if let Some(v) = self.parser.read_back(id) {
                    return Ok(Some(v));
                }
            }
        }
        Ok(None)
    }

    fn lookup_constant(&self, name: &str) -> Option<Value> {
        let children = self.selection?;
        let c = children.iter().find(|c| c.keyword.eq_ignore_ascii_case(name))?;
        Some(match c.kind {
            Kind::String => Value::Str(c.keyword.as_bytes().to_vec(), crate::eval::StrEnc::Default),
            _ => Value::Int(c.object_id),
        })
    }
}

/// Renders a bound value for the parsed-list log. Not used for the actual
/// binary write — only for diagnostics. Also reused by
/// [`crate::handle::Handle::properties`] to regenerate property-list text.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(bytes, _) => String::from_utf8_lossy(bytes).to_string(),
    }
}

impl<'t, 'b> Parser<'t, 'b> {
    pub fn new(table: &'t mut SymbolTable, buf: &'t mut TargetBuffer<'b>, alloc: &'t mut AllocRegistry, now: i64) -> Self {
        Parser {
            table,
            buf,
            alloc,
            rng: RandomState::new(),
            now,
            parameter_files_enabled: true,
            strict: true,
            parsed_log: Vec::new(),
        }
    }

    /// Appends a bind to the parsed-list log, redacting `PWD`-flagged
    /// values to the literal string every diagnostic surface uses.
    fn log_bind(&mut self, id: SymbolId, rendered: String) {
        let principal = self.table.principal(id);
        let redacted = self.table.descriptor(principal).flags.contains(Flags::PWD);
        let value_text = if redacted { "***SECRET***".to_string() } else { rendered };
        self.parsed_log.push(ParsedEntry {
            path: self.table.path(id),
            value_text,
        });
    }

    fn read_back(&self, id: SymbolId) -> Option<Value> {
        let d = self.table.descriptor(id);
        match d.kind {
            Kind::Number => self.buf.read_i64(d.offset, d.size).map(Value::Int),
            _ => None,
        }
    }

    /// Entry point for a full command-line buffer: parses the root
    /// parameter list, then closes the root scope.
    pub fn parse_main(&mut self, lexer: &mut Lexer, source: SourceOrigin) -> Result<()> {
        self.parse_parameter_list(lexer, None, source)?;
        defaults::close_scope(self.table, self.buf, self.alloc, &self.rng, self.now, None, self.strict, lexer.last_span(), source)
    }

    /// Entry point for a property list: `KEYWORD.KEYWORD=value` pairs,
    /// comma- or newline-separated, any number of times, in any order.
    pub fn parse_property_list(&mut self, lexer: &mut Lexer, source: SourceOrigin) -> Result<()> {
        loop {
            if matches!(lexer.peek()?, Token::End) {
                break;
            }
            self.parse_property(lexer, source)?;
        }
        Ok(())
    }

    /// A property root that doesn't resolve under the current prefix is
    /// either rejected (`strict`) or silently ignored: its record is still
    /// consumed token-by-token so the rest of the list stays in sync, but
    /// the evaluated right-hand side is discarded rather than stored as an
    /// override.
    fn parse_property(&mut self, lexer: &mut Lexer, source: SourceOrigin) -> Result<()> {
        let mut parent: Option<SymbolId> = None;
        let mut unresolved = false;
        loop {
            let tok = lexer.next_token()?;
            let name = match tok {
                Token::Keyword(k) => k,
                other => return Err(Error::syn(format!("expected a keyword, found {other:?}"), lexer.last_span(), source)),
            };
            let id = if unresolved {
                None
            } else {
                match self.table.find_symbol(parent, &name, lexer.last_span(), source)? {
                    Some(found) => Some(found),
                    None => {
                        if self.strict {
                            return Err(Error::tab(format!("unknown property keyword '{name}'"), lexer.last_span(), source));
                        }
                        unresolved = true;
                        None
                    }
                }
            };
            if matches!(lexer.peek()?, Token::Dot) {
                lexer.next_token()?;
                parent = id;
                continue;
            }
            if unresolved {
                lexer.expect(Token::Assign)?;
                let ev = Evaluator::new(self.now, &self.rng);
                ev.eval_expr(lexer, &EmptyContext, source)?;
                return Ok(());
            }
            return self.set_property_value(lexer, id.expect("resolved path always has an id"), source);
        }
    }

    /// Evaluates a property's right-hand side and stashes it as an
    /// override on the target symbol, rather than binding it immediately —
    /// properties only take effect if the later command parse leaves that
    /// keyword unwritten (resolved by `crate::defaults::close_scope`). A
    /// repeated path simply overwrites the previous override: last write
    /// wins.
    fn set_property_value(&mut self, lexer: &mut Lexer, id: SymbolId, source: SourceOrigin) -> Result<()> {
        lexer.expect(Token::Assign)?;
        let principal = self.table.principal(id);
        let scope = self.table.parent(principal);
        let d = self.table.descriptor(principal);
        let selection = d.flags.contains(Flags::SELECTION).then_some(d.children).flatten();
        let value = {
            let ctx = SiblingContext { parser: &*self, scope, selection };
            let ev = Evaluator::new(self.now, &self.rng);
            ev.eval_expr(lexer, &ctx, source)?
        };
        self.table.set_property_override(id, value);
        Ok(())
    }

    /// Parses every parameter in a body, returning the symbol each one
    /// resolved to in parse order. An overlay body uses this list to learn
    /// which single branch was selected, for its own OID back-reference.
    fn parse_parameter_list(&mut self, lexer: &mut Lexer, parent: Option<SymbolId>, source: SourceOrigin) -> Result<Vec<SymbolId>> {
        let mut ids = Vec::new();
        loop {
            match lexer.peek()? {
                Token::End | Token::RParen | Token::RBracket => break,
                _ => {
                    ids.push(self.parse_parameter(lexer, parent, source)?);
                }
            }
        }
        Ok(ids)
    }

    /// Parses and binds exactly one `parameter` (switch, assignment, nested
    /// object/overlay body, or array), returning the symbol it resolved to.
    /// Used directly by [`crate::handle::Handle::parse_overlay`], which only
    /// ever wants the one selected branch.
    pub(crate) fn parse_parameter(&mut self, lexer: &mut Lexer, parent: Option<SymbolId>, source: SourceOrigin) -> Result<SymbolId> {
        let tok = lexer.next_token()?;
        let name = match tok {
            Token::Keyword(k) => k,
            other => return Err(Error::syn(format!("expected a keyword, found {other:?}"), lexer.last_span(), source)),
        };
        let input_offset = lexer.last_span().start;
        let id = self
            .table
            .find_symbol_outward(parent, &name, lexer.last_span(), source)?
            .ok_or_else(|| Error::tab(format!("unknown keyword '{name}'"), lexer.last_span(), source))?;
        self.parse_after_keyword(lexer, parent, id, input_offset, source)?;
        Ok(id)
    }

    fn parse_after_keyword(
        &mut self,
        lexer: &mut Lexer,
        parent: Option<SymbolId>,
        id: SymbolId,
        input_offset: usize,
        source: SourceOrigin,
    ) -> Result<()> {
        let principal = self.table.principal(id);
        let kind = self.table.descriptor_kind(principal);
        match kind {
            Kind::Object | Kind::Overlay => {
                lexer.expect(Token::LParen)?;
                let selected = self.parse_parameter_list(lexer, Some(principal), source)?;
                lexer.expect(Token::RParen)?;
                defaults::close_scope(self.table, self.buf, self.alloc, &self.rng, self.now, Some(principal), self.strict, lexer.last_span(), source)?;
                // An overlay's own OID back-reference names the branch that
                // was actually selected, not the overlay descriptor's own
                // (usually unset) object_id. An object has no such notion
                // and keeps its own static object_id.
                let oid = if kind == Kind::Overlay {
                    match selected.as_slice() {
                        [only] => self.table.descriptor(self.table.principal(*only)).object_id,
                        [] => return Err(Error::sem(format!("'{}' requires exactly one branch", self.table.descriptor(principal).keyword), lexer.last_span(), source)),
                        _ => return Err(Error::sem(format!("'{}' accepts only one branch", self.table.descriptor(principal).keyword), lexer.last_span(), source)),
                    }
                } else {
                    self.table.descriptor(principal).object_id
                };
                binder::bind_value(self.table, self.buf, self.alloc, id, Value::Int(oid), input_offset, lexer.last_span(), source)?;
                self.log_bind(id, oid.to_string());
                Ok(())
            }
            Kind::Switch => {
                let oid = self.table.descriptor(principal).object_id;
                binder::bind_value(self.table, self.buf, self.alloc, id, Value::Int(oid), input_offset, lexer.last_span(), source)?;
                self.log_bind(id, oid.to_string());
                Ok(())
            }
            Kind::Number if self.table.descriptor(principal).flags.contains(Flags::DEF)
                && !matches!(lexer.peek()?, Token::Assign | Token::AssignFile) =>
            {
                let oid = self.table.descriptor(principal).object_id;
                binder::bind_value(self.table, self.buf, self.alloc, id, Value::Int(oid), input_offset, lexer.last_span(), source)?;
                self.log_bind(id, oid.to_string());
                Ok(())
            }
            Kind::Number | Kind::Float | Kind::String => self.bind_leaf(lexer, parent, id, source),
            Kind::Alias => unreachable!("principal() never resolves to an Alias descriptor"),
        }
    }

    fn bind_leaf(&mut self, lexer: &mut Lexer, parent: Option<SymbolId>, id: SymbolId, source: SourceOrigin) -> Result<()> {
        match lexer.next_token()? {
            Token::Assign => {}
            Token::AssignFile => {
                if !self.parameter_files_enabled {
                    return Err(Error::syn(
                        "parameter-file inclusion is disabled for this handle",
                        lexer.last_span(),
                        source,
                    ));
                }
                let path = match lexer.next_required_string()? {
                    Token::Str(s) => String::from_utf8_lossy(&s.bytes).to_string(),
                    other => unreachable!("next_required_string always yields Str, got {other:?}"),
                };
                return self.bind_from_file(lexer, parent, id, &path, source);
            }
            other => return Err(Error::syn(format!("expected '=', found {other:?}"), lexer.last_span(), source)),
        }

        let principal = self.table.principal(id);
        let is_array = self.table.descriptor(principal).is_array();
        if is_array && matches!(lexer.peek()?, Token::LBracket) {
            lexer.next_token()?;
            loop {
                if matches!(lexer.peek()?, Token::RBracket) {
                    break;
                }
                self.bind_one_value(lexer, id, source)?;
                if matches!(lexer.peek()?, Token::RBracket) {
                    break;
                }
            }
            lexer.expect(Token::RBracket)?;
            return Ok(());
        }

        self.bind_one_value(lexer, id, source)?;
        if is_array {
            loop {
                let had_sep = lexer.last_separator_had_comma_or_newline();
                let save = lexer.save();
                match lexer.peek() {
                    Ok(Token::Keyword(_)) | Ok(Token::End) | Ok(Token::RParen) | Ok(Token::RBracket) if !had_sep => break,
                    _ => {}
                }
                if self.looks_like_next_keyword(lexer, parent, &save, source)? {
                    break;
                }
                if matches!(lexer.peek()?, Token::End | Token::RParen | Token::RBracket) {
                    break;
                }
                self.bind_one_value(lexer, id, source)?;
            }
        }
        Ok(())
    }

    /// Disambiguates "another value for this array" from "the next
    /// keyword": peeks a keyword token and checks whether it resolves in
    /// the current scope. If it doesn't, it's treated as another
    /// (unit-constant-free) bare value continuing the array — which in
    /// practice only matters for string arrays, since numeric/float
    /// continuations are always separated by an operator or a fresh NUM.
    fn looks_like_next_keyword(
        &mut self,
        lexer: &mut Lexer,
        parent: Option<SymbolId>,
        save: &Checkpoint,
        source: SourceOrigin,
    ) -> Result<bool> {
        if let Ok(Token::Keyword(name)) = lexer.peek() {
            let name = name.clone();
            let found = self.table.find_symbol_outward(parent, &name, lexer.last_span(), source)?;
            lexer.restore(*save);
            return Ok(found.is_some());
        }
        lexer.restore(*save);
        Ok(false)
    }

    fn bind_one_value(&mut self, lexer: &mut Lexer, id: SymbolId, source: SourceOrigin) -> Result<()> {
        let input_offset = lexer.pos();
        let principal = self.table.principal(id);
        let scope = self.table.parent(principal);
        let d = self.table.descriptor(principal);
        let selection = d.flags.contains(Flags::SELECTION).then_some(d.children).flatten();
        let value = {
            let ctx = SiblingContext { parser: &*self, scope, selection };
            let ev = Evaluator::new(self.now, &self.rng);
            ev.eval_expr(lexer, &ctx, source)?
        };
        let rendered = render_value(&value);
        binder::bind_value(self.table, self.buf, self.alloc, id, value, input_offset, lexer.last_span(), source)?;
        self.log_bind(id, rendered);
        Ok(())
    }

    fn bind_from_file(&mut self, lexer: &mut Lexer, _parent: Option<SymbolId>, id: SymbolId, path: &str, _source: SourceOrigin) -> Result<()> {
        let content = lexer.load_file(path)?;
        let mut nested = lexer.nested(&content, SourceOrigin::ParameterFile)?;
        loop {
            if matches!(nested.peek()?, Token::End) {
                break;
            }
            self.bind_one_value(&mut nested, id, SourceOrigin::ParameterFile)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::error::SourceOrigin;
    use crate::symtab::SymbolTable;

    static LEAF_ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "NUM08", 8, 0),
        Descriptor::new(Kind::Switch, "FLAG", 1, 8),
    ];

    #[test]
    fn parses_keyword_assign_number() {
        let mut table = SymbolTable::build(LEAF_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("NUM08=42", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(42));
    }

    #[test]
    fn switch_alone_binds_presence() {
        // FLAG never calls .oid(...), so its object_id defaults to 0 and
        // that's exactly what a bare switch binds.
        let mut table = SymbolTable::build(LEAF_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("FLAG NUM08=1", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(8, 1), Some(0));
    }

    static OID_SWITCH_ROOT: &[Descriptor] = &[Descriptor::new(Kind::Switch, "FLAG", 8, 0).oid(7)];

    #[test]
    fn switch_alone_binds_its_configured_object_id() {
        let mut table = SymbolTable::build(OID_SWITCH_ROOT, true);
        let mut backing = [0u8; 8];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("FLAG", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(7));
    }

    static DEF_NUMBER_ROOT: &[Descriptor] = &[Descriptor::new(Kind::Number, "COUNT", 8, 0).flags(Flags::DEF).oid(5)];

    #[test]
    fn def_flagged_number_alone_binds_its_object_id() {
        let mut table = SymbolTable::build(DEF_NUMBER_ROOT, true);
        let mut backing = [0u8; 8];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("COUNT", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(5));
    }

    #[test]
    fn def_flagged_number_with_value_binds_the_value_not_the_object_id() {
        let mut table = SymbolTable::build(DEF_NUMBER_ROOT, true);
        let mut backing = [0u8; 8];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("COUNT=42", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(42));
    }

    static SEL_CHOICES: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "NUM0", 0, 0).flags(Flags::CONSTANT).oid(0),
        Descriptor::new(Kind::Number, "NUM1", 0, 0).flags(Flags::CONSTANT).oid(1),
        Descriptor::new(Kind::Number, "NUM2", 0, 0).flags(Flags::CONSTANT).oid(2),
    ];

    static SEL_ROOT: &[Descriptor] =
        &[Descriptor::new(Kind::Number, "NUM16", 2, 0).flags(Flags::SELECTION).children(SEL_CHOICES)];

    #[test]
    fn selection_keyword_resolves_to_child_object_id() {
        let mut table = SymbolTable::build(SEL_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("NUM16=NUM2", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 2), Some(2));
    }

    #[test]
    fn selection_rejects_value_outside_constant_table() {
        let mut table = SymbolTable::build(SEL_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("NUM16=9", SourceOrigin::CommandLine, false).unwrap();
        let err = parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap_err();
        assert_eq!(err.code(), -3);
    }

    static OBJ_ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Object, "OBJ", 0, 0).children(&[Descriptor::new(Kind::Number, "INNER", 8, 0)]),
    ];

    #[test]
    fn parses_object_body() {
        let mut table = SymbolTable::build(OBJ_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("OBJ(INNER=7)", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(7));
    }

    static OVL_BRANCHES: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "X", 8, 0).oid(11),
        Descriptor::new(Kind::Number, "Y", 8, 0).oid(22),
    ];
    static OVL_ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Overlay, "M", 0, 0).children(OVL_BRANCHES),
        Descriptor::new(Kind::Number, "M-OID", 4, 8).flags(Flags::OID).link_target("M"),
    ];

    #[test]
    fn overlay_oid_reflects_the_selected_branch_not_its_own() {
        let mut table = SymbolTable::build(OVL_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("M(Y=7)", SourceOrigin::CommandLine, false).unwrap();
        parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(8, 4), Some(22));
    }

    #[test]
    fn overlay_rejects_more_than_one_branch() {
        let mut table = SymbolTable::build(OVL_ROOT, true);
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let mut parser = Parser::new(&mut table, &mut buf, &mut alloc, 0);
        let mut lexer = Lexer::new("M(X=1 Y=2)", SourceOrigin::CommandLine, false).unwrap();
        let err = parser.parse_main(&mut lexer, SourceOrigin::CommandLine).unwrap_err();
        assert_eq!(err.code(), -3);
    }
}
