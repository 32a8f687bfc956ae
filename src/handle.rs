//! The public handle: ties the lexer, symbol table, parser, binder, linker,
//! default merger, and allocator registry together behind the small set of
//! entry points a host program actually calls.
//!
//! One `Handle` is built per descriptor tree via [`Handle::open`] and reused
//! (through [`Handle::reset`]) across repeated `parse_command` calls against
//! fresh target buffers — mirroring the original library's "open once, parse
//! many times" lifecycle.

use crate::alloc::AllocRegistry;
use crate::constants::RandomState;
use crate::descriptor::{Kind, RootTable};
use crate::error::{Error, Result, SourceOrigin};
use crate::flags::Flags;
use crate::lexer::{FileLoader, Lexer};
use crate::parser::{ParsedEntry, Parser};
use crate::span::Span;
use crate::symtab::{SymbolId, SymbolTable};
use crate::target::TargetBuffer;
use crate::time;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// `open()`'s ~20 parameters, grouped into one builder struct rather than a
/// long positional argument list.
pub struct OpenOptions {
    pub case_sensitive: bool,
    /// Gates the `=>path` parameter-file inclusion form.
    pub parameter_files_enabled: bool,
    /// Gates `<NAME>` environment-variable substitution in the input stream.
    pub envsubst_enabled: bool,
    /// Owner, program, and path components used to build the
    /// `OWN.PGM.PATH.KYW` / `PGM.PATH.KYW` / `PATH.KYW` environment lookup
    /// chain for each keyword's default.
    pub owner: String,
    pub program: String,
    pub path: String,
    /// Free-text shown by `help`/`docu` for the command as a whole.
    pub command_help: &'static str,
    pub manual: &'static str,
    /// Overrides the reference instant otherwise resolved from `CLP_NOW`.
    pub now: Option<i64>,
    /// Supplies a host-controlled source for `f`-prefixed string literals
    /// and `=>path` parameter-file inclusion. `None` reads real files.
    pub file_loader: Option<Rc<dyn FileLoader>>,
    /// Consulted once per `parse_command` for descriptors carrying an
    /// authorization role; `None` means every call is authorized.
    pub auth_callback: Option<Rc<dyn Fn(&str) -> bool>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            case_sensitive: true,
            parameter_files_enabled: true,
            envsubst_enabled: true,
            owner: String::new(),
            program: String::new(),
            path: String::new(),
            command_help: "",
            manual: "",
            now: None,
            file_loader: None,
            auth_callback: None,
        }
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("case_sensitive", &self.case_sensitive)
            .field("parameter_files_enabled", &self.parameter_files_enabled)
            .field("envsubst_enabled", &self.envsubst_enabled)
            .field("owner", &self.owner)
            .field("program", &self.program)
            .field("path", &self.path)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// How `Handle::close` disposes of `DYN`-flagged allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMethod {
    /// Reclaims every outstanding `DYN` block.
    All,
    /// Leaves `DYN` blocks allocated; only this handle's own bookkeeping
    /// (not the caller's target-buffer pointers) is dropped.
    KeepDynamic,
    /// Same as `KeepDynamic` — named separately because the original
    /// library distinguished "caller already owns the pointers" intent from
    /// "leak them as a known tradeoff", even though the mechanics coincide.
    ExceptDynamic,
}

/// A `symbol_walk` traversal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOp {
    /// Jump to the first root.
    Root,
    /// Redisplay the current cursor position.
    Old,
    /// Move to the next sibling.
    Next,
    /// Move to the previous sibling.
    Back,
    /// Descend into the cursor's first child.
    Dep,
    /// Ascend to the cursor's parent.
    Hih,
    /// Jump to an ALIAS's principal.
    Alias,
    /// Jump to the sibling carrying a COUNT link role targeting the cursor.
    Count,
    /// Jump to the sibling carrying an ELN link role targeting the cursor.
    Eln,
    /// Jump to the sibling carrying any link role targeting the cursor.
    Link,
    /// Jump to the sibling carrying an OID link role targeting the cursor.
    Oid,
    /// Jump to the sibling carrying an SLN link role targeting the cursor.
    Sln,
    /// Jump to the sibling carrying a TLN link role targeting the cursor.
    Tln,
}

/// A read-only snapshot of one symbol, returned by `symbol_walk`. Borrows
/// from the handle it came from so a stale view can't outlive the next
/// mutating call.
#[derive(Debug, Clone)]
pub struct SymbolView<'h> {
    pub keyword: &'static str,
    pub kind: Kind,
    pub flags: Flags,
    pub min: u32,
    pub max: u32,
    pub count: u32,
    pub help: &'static str,
    pub manual: &'static str,
    pub path: Vec<&'static str>,
    _marker: std::marker::PhantomData<&'h ()>,
}

/// One entry of the JSON-serializable documentation tree `docu`/`properties`
/// build, mirroring the config-struct style the rest of the pack uses for
/// anything meant to round-trip through `serde_json`.
#[derive(Debug, Clone, Serialize)]
struct DocEntry {
    path: String,
    kind: String,
    min: u32,
    max: u32,
    help: String,
    manual: String,
    children: Vec<DocEntry>,
}

/// The driver: owns the symbol table, allocator registry, and a walk cursor,
/// and borrows the caller's target buffer for the duration of one parse
/// cycle. Not `Send`/`Sync`: the allocator registry holds raw pointers into
/// heap blocks this handle exclusively owns until `close`.
pub struct Handle<'b> {
    table: SymbolTable,
    buf: TargetBuffer<'b>,
    alloc: AllocRegistry,
    options: OpenOptions,
    now: i64,
    rng: RandomState,
    last_error: Option<Error>,
    last_source_text: String,
    last_parsed_log: Vec<ParsedEntry>,
    walk_cursor: Option<SymbolId>,
}

impl<'b> Handle<'b> {
    /// Builds the symbol table from `root` and takes ownership of `target`
    /// for the handle's lifetime. Validates the descriptor tree's static
    /// invariants (min ≤ max, non-`DYN` scalars have a nonzero size, every
    /// `ALIAS`/link-target name resolves) before returning, so a malformed
    /// descriptor table fails at `open()` rather than on the first parse.
    pub fn open(root: &'static RootTable, target: TargetBuffer<'b>, options: OpenOptions) -> Result<Self> {
        validate_tree(root, Span::point(0), SourceOrigin::CommandLine)?;
        let now = options.now.unwrap_or_else(time::reference_now);
        let table = SymbolTable::build_with_env(root, options.case_sensitive, &options.owner, &options.program, &options.path);
        log::debug!("opened handle over {} root descriptor(s)", root.len());
        Ok(Handle {
            table,
            buf: target,
            alloc: AllocRegistry::new(),
            options,
            now,
            rng: RandomState::new(),
            last_error: None,
            last_source_text: String::new(),
            last_parsed_log: Vec::new(),
            walk_cursor: None,
        })
    }

    fn make_parser(&mut self, strict: bool) -> Parser<'_, 'b> {
        let mut p = Parser::new(&mut self.table, &mut self.buf, &mut self.alloc, self.now);
        p.parameter_files_enabled = self.options.parameter_files_enabled;
        p.strict = strict;
        p
    }

    fn make_lexer(&self, text: &str, source: SourceOrigin) -> Result<Lexer> {
        match &self.options.file_loader {
            Some(loader) => Lexer::with_loader(text, source, self.options.envsubst_enabled, Rc::clone(loader)),
            None => Lexer::new(text, source, self.options.envsubst_enabled),
        }
    }

    /// Parses a property list (`keyword.keyword=value`, comma/newline
    /// separated). Only defaults/overrides are touched — nothing is written
    /// into the target buffer. `strict` rejects an unresolvable property
    /// root instead of logging and skipping it.
    pub fn parse_properties(&mut self, source_name: &str, text: &str, strict: bool) -> Result<(u32, Vec<ParsedEntry>)> {
        log::trace!("parse_properties({source_name}): {} bytes", text.len());
        self.last_source_text = text.to_string();
        let mut lexer = self.make_lexer(text, SourceOrigin::PropertyList)?;
        let mut parser = self.make_parser(strict);
        let result = parser.parse_property_list(&mut lexer, SourceOrigin::PropertyList);
        let log_entries = parser.parsed_log.clone();
        self.last_parsed_log = log_entries.clone();
        match result {
            Ok(()) => {
                self.last_error = None;
                Ok((log_entries.len() as u32, log_entries))
            }
            Err(e) => {
                log::warn!("parse_properties({source_name}) failed: {e}");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Parses a full command line against the root parameter list, applying
    /// defaults/overrides and (in `strict` mode) enforcing minimum
    /// occurrences at every scope close. `redact_passwords` is accepted for
    /// signature fidelity with the original entry point but has no further
    /// effect: `PWD` redaction in the parsed list, in rendered diagnostics,
    /// and in traces is unconditional, per the redaction invariant — there
    /// is no way to opt back into seeing a secret once bound.
    pub fn parse_command(
        &mut self,
        source_name: &str,
        text: &str,
        strict: bool,
        _redact_passwords: bool,
    ) -> Result<(i64, Vec<ParsedEntry>)> {
        log::trace!("parse_command({source_name}): {} bytes", text.len());
        self.last_source_text = text.to_string();
        let mut lexer = self.make_lexer(text, SourceOrigin::CommandLine)?;
        let mut parser = self.make_parser(strict);
        let result = parser.parse_main(&mut lexer, SourceOrigin::CommandLine);
        let log_entries = parser.parsed_log.clone();
        self.last_parsed_log = log_entries.clone();
        match result {
            Ok(()) => {
                self.last_error = None;
                Ok((0, log_entries))
            }
            Err(e) => {
                log::warn!("parse_command({source_name}) failed: {e}");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Parses a single top-level overlay branch selection — an optional
    /// leading `.` followed by exactly one parameter (`KYW=value`, a switch,
    /// or a nested body) — and returns the selected branch's `object_id`.
    /// Unlike `parse_command`, this binds only the one selected parameter;
    /// it's for hosts that open a handle over an overlay's own branch list
    /// and want to resolve which branch without parsing a full command.
    pub fn parse_overlay(&mut self, text: &str) -> Result<i64> {
        let mut lexer = self.make_lexer(text, SourceOrigin::CommandLine)?;
        if matches!(lexer.peek()?, crate::lexer::Token::Dot) {
            lexer.next_token()?;
        }
        let mut parser = self.make_parser(false);
        let id = parser.parse_parameter(&mut lexer, None, SourceOrigin::CommandLine)?;
        let log_entries = parser.parsed_log.clone();
        self.last_parsed_log = log_entries;
        self.last_error = None;
        let principal = self.table.principal(id);
        Ok(self.table.descriptor(principal).object_id)
    }

    /// Moves the walk cursor per `op` and returns a view of the symbol it
    /// lands on, or `None` if the move isn't possible from the current
    /// position (e.g. `Back` at the first sibling, `Hih` at a root).
    pub fn symbol_walk(&mut self, op: WalkOp) -> Option<SymbolView<'_>> {
        let next = match op {
            WalkOp::Root => self.table.roots().first().copied(),
            WalkOp::Old => self.walk_cursor,
            WalkOp::Next => self.sibling_step(1),
            WalkOp::Back => self.sibling_step(-1),
            WalkOp::Dep => {
                let cur = self.walk_cursor?;
                self.table.ensure_children(cur).first().copied()
            }
            WalkOp::Hih => self.walk_cursor.and_then(|c| self.table.parent(c)),
            WalkOp::Alias => self.walk_cursor.map(|c| self.table.principal(c)),
            WalkOp::Count => self.link_sibling(Flags::COUNT),
            WalkOp::Eln => self.link_sibling(Flags::ELN),
            WalkOp::Link => self.link_sibling(Flags::LINK_ROLES),
            WalkOp::Oid => self.link_sibling(Flags::OID),
            WalkOp::Sln => self.link_sibling(Flags::SLN),
            WalkOp::Tln => self.link_sibling(Flags::TLN),
        };
        self.walk_cursor = next;
        let id = next?;
        let d = self.table.descriptor(id);
        Some(SymbolView {
            keyword: d.keyword,
            kind: d.kind,
            flags: d.flags,
            min: d.min,
            max: d.max,
            count: self.table.count(id),
            help: d.help,
            manual: d.manual,
            path: self.table.path(id),
            _marker: std::marker::PhantomData,
        })
    }

    fn sibling_step(&mut self, delta: i32) -> Option<SymbolId> {
        let cur = self.walk_cursor?;
        let parent = self.table.parent(cur);
        let siblings: Vec<SymbolId> = match parent {
            Some(p) => self.table.ensure_children(p).to_vec(),
            None => self.table.roots().to_vec(),
        };
        let pos = siblings.iter().position(|&s| s == cur)?;
        let new_pos = pos as i32 + delta;
        if new_pos < 0 || new_pos as usize >= siblings.len() {
            None
        } else {
            Some(siblings[new_pos as usize])
        }
    }

    /// Finds the sibling of the cursor carrying any of `role` and whose
    /// `link_target` names the cursor's keyword.
    fn link_sibling(&mut self, role: Flags) -> Option<SymbolId> {
        let cur = self.walk_cursor?;
        let keyword = self.table.keyword_of(cur);
        let parent = self.table.parent(cur);
        let siblings: Vec<SymbolId> = match parent {
            Some(p) => self.table.ensure_children(p).to_vec(),
            None => self.table.roots().to_vec(),
        };
        siblings.into_iter().find(|&s| {
            let d = self.table.descriptor(s);
            d.flags.intersects(role) && d.link_target == Some(keyword)
        })
    }

    /// Sets a property default on the symbol at `path` (a dot-separated
    /// keyword chain) by evaluating `update` as an expression with no
    /// sibling context — the same restriction `defaults::close_scope`
    /// applies to static default expressions.
    pub fn symbol_update(&mut self, path: &str, update: &str) -> Result<()> {
        let span = Span::point(0);
        let id = self.table.find_path(path, span, SourceOrigin::PropertyList)?;
        let mut lexer = Lexer::new(update, SourceOrigin::PropertyList, false)?;
        let ev = crate::eval::Evaluator::new(self.now, &self.rng);
        let value = ev.eval_expr(&mut lexer, &crate::eval::EmptyContext, SourceOrigin::PropertyList)?;
        self.table.set_property_override(id, value);
        Ok(())
    }

    /// One line per root descriptor: keyword, kind, and multiplicity.
    pub fn syntax(&mut self) -> String {
        let mut out = String::new();
        for &id in self.table.roots().to_vec().iter() {
            let d = self.table.descriptor(id);
            out.push_str(&format!("{} [{:?}] ({}..{})\n", d.keyword, d.kind, d.min, d.max));
        }
        out
    }

    /// `help` text for the symbol at `path`, or the command-level help text
    /// when `path` is empty.
    pub fn help(&mut self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Ok(self.options.command_help.to_string());
        }
        let id = self.table.find_path(path, Span::point(0), SourceOrigin::PropertyList)?;
        Ok(self.table.descriptor(id).help.to_string())
    }

    /// Full manual-page text: command manual followed by each root's own.
    pub fn docu(&mut self) -> String {
        let mut out = String::new();
        if !self.options.manual.is_empty() {
            out.push_str(self.options.manual);
            out.push('\n');
        }
        for &id in self.table.roots().to_vec().iter() {
            self.docu_node(id, &mut out);
        }
        out
    }

    fn docu_node(&mut self, id: SymbolId, out: &mut String) {
        let d = self.table.descriptor(id);
        out.push_str(&format!("{}\n", self.table.path(id).join(".")));
        if !d.manual.is_empty() {
            out.push_str(d.manual);
            out.push('\n');
        }
        if matches!(d.kind, Kind::Object | Kind::Overlay) {
            for child in self.table.ensure_children(id).to_vec() {
                self.docu_node(child, out);
            }
        }
    }

    /// Machine-readable documentation tree, as JSON.
    pub fn docu_json(&mut self) -> String {
        let roots = self.table.roots().to_vec();
        let tree: Vec<DocEntry> = roots.into_iter().map(|id| self.doc_entry(id)).collect();
        serde_json::to_string_pretty(&tree).unwrap_or_default()
    }

    fn doc_entry(&mut self, id: SymbolId) -> DocEntry {
        let d = self.table.descriptor(id);
        let children = if matches!(d.kind, Kind::Object | Kind::Overlay) {
            self.table
                .ensure_children(id)
                .to_vec()
                .into_iter()
                .map(|c| self.doc_entry(c))
                .collect()
        } else {
            Vec::new()
        };
        DocEntry {
            path: self.table.path(id).join("."),
            kind: format!("{:?}", d.kind),
            min: d.min,
            max: d.max,
            help: d.help.to_string(),
            manual: d.manual.to_string(),
            children,
        }
    }

    /// Regenerates property-list text from every override currently set.
    /// `reset` followed by `parse_properties` of this text reproduces the
    /// same merged defaults (the round-trip property).
    pub fn properties(&mut self) -> String {
        let mut overrides = Vec::new();
        self.table.collect_property_overrides(None, &mut overrides);
        overrides
            .into_iter()
            .map(|(path, value)| format!("{}={}\n", path.join("."), crate::parser::render_value(&value)))
            .collect()
    }

    /// Writes `docu()`'s text form through a caller-supplied sink, for
    /// hosts that want to stream documentation rather than buffer it.
    pub fn print_page(&mut self, out: &mut dyn fmt::Write) -> fmt::Result {
        out.write_str(&self.docu())
    }

    /// The lexer's token grammar, as static reference text.
    pub fn lexemes(&self) -> &'static str {
        "NUM   := ['-'] DIGIT+ | '0x' HEXDIGIT+ | '0b' BINDIGIT+\n\
         FLT   := ['-'] DIGIT+ '.' DIGIT+\n\
         STR   := \"'\" ANY* \"'\" | PREFIX \"'\" ANY* \"'\"\n\
         KYW   := ALPHA (ALNUM | '-' | '_')*\n\
         TIME  := '0t' ['+' | '-'] TIMESPEC"
    }

    /// The parser's grammar, as static reference text.
    pub fn grammar(&self) -> &'static str {
        "command     := parameter*\n\
         parameter   := KYW ('(' parameter* ')' | '=' value | )\n\
         value       := expr | '[' expr (',' expr)* ']'\n\
         expr        := term (('+' | '-') expr)?\n\
         term        := factor (('*' | '/') term)?\n\
         factor      := NUM | FLT | STR | KYW | '(' expr ')'"
    }

    /// Reclaims (or intentionally leaks, per `method`) every `DYN`
    /// allocation and consumes the handle.
    pub fn close(mut self, method: CloseMethod) {
        match method {
            CloseMethod::All => self.alloc.free_all(),
            CloseMethod::KeepDynamic | CloseMethod::ExceptDynamic => self.alloc.forget_all(),
        }
        log::debug!("closed handle ({method:?})");
    }

    /// Rebinds the handle to a fresh target buffer, clearing occurrence
    /// counters but preserving property overrides and the descriptor tree,
    /// so a handle can be reused for another `parse_command` call.
    pub fn reset(&mut self, new_target: TargetBuffer<'b>) {
        self.table.reset();
        self.buf = new_target;
        self.last_error = None;
        self.last_parsed_log.clear();
        self.walk_cursor = None;
    }

    /// The most recent parse's error, if it failed. Cleared by the next
    /// successful `parse_properties`/`parse_command`/`parse_overlay` call.
    pub fn error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Renders the last error with the `^`-underline view and parsed-list,
    /// or an empty string if the last parse succeeded.
    pub fn render_error(&self) -> String {
        match &self.last_error {
            Some(e) => {
                let list: Vec<String> = self.last_parsed_log.iter().map(ParsedEntry::display).collect();
                e.render(&self.last_source_text, &list)
            }
            None => String::new(),
        }
    }
}

/// Validates the static invariants from the data model section: every
/// descriptor's `min <= max`; non-`DYN` scalar descriptors have a nonzero
/// size; every `ALIAS`/link-target name resolves to an actual sibling.
fn validate_tree(descs: &'static [crate::descriptor::Descriptor], span: Span, source: SourceOrigin) -> Result<()> {
    for d in descs {
        if d.min > d.max && d.max != 0 {
            return Err(Error::tab(format!("'{}' has min {} greater than max {}", d.keyword, d.min, d.max), span, source));
        }
        if matches!(d.kind, Kind::Number | Kind::Float | Kind::String)
            && !d.flags.contains(Flags::DYN)
            && !d.flags.contains(Flags::DUMMY)
            && !d.flags.contains(Flags::CONSTANT)
            && d.size == 0
        {
            return Err(Error::tab(format!("'{}' has zero size and is not DYN", d.keyword), span, source));
        }
        if d.kind == Kind::Alias {
            let target = d.alias_of.ok_or_else(|| Error::tab(format!("'{}' is an ALIAS with no target", d.keyword), span, source))?;
            if !descs.iter().any(|o| o.keyword == target && o.kind != Kind::Alias) {
                return Err(Error::tab(format!("'{}' aliases unknown sibling '{}'", d.keyword, target), span, source));
            }
        }
        if let Some(target) = d.link_target {
            if !d.flags.has_link_role() {
                return Err(Error::tab(format!("'{}' names a link_target but carries no link-role flag", d.keyword), span, source));
            }
            if !descs.iter().any(|o| o.keyword == target) {
                return Err(Error::tab(format!("'{}' links to unknown sibling '{}'", d.keyword, target), span, source));
            }
        }
        if let Some(children) = d.children {
            validate_tree(children, span, source)?;
        }
    }
    Ok(())
}
