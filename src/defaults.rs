//! The default/property merger.
//!
//! Runs once per scope, when that scope (the whole command line, or one
//! object/overlay body) finishes parsing. Every sibling that received zero
//! writes binds a value here: a property override set by
//! `parse_properties`/`symbol_update` takes precedence, then the
//! descriptor's own default expression. A sibling still below its minimum
//! occurrence count with neither fails the parse. `DLM`-flagged arrays get
//! their trailing sentinel appended here too, since that only makes sense
//! once no more elements are coming.

use crate::alloc::AllocRegistry;
use crate::binder;
use crate::constants::RandomState;
use crate::descriptor::Kind;
use crate::error::{Error, Result, SourceOrigin};
use crate::eval::{EmptyContext, Evaluator};
use crate::flags::Flags;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::symtab::{SymbolId, SymbolTable};
use crate::target::TargetBuffer;

/// Closes one scope: binds defaults, enforces minimums, appends `DLM`
/// sentinels. `span`/`source` are used for any error raised (a missing
/// required argument has no input span of its own, so the scope's own
/// closing position is reported). The minimum-occurrence check only runs
/// when `strict` is set — defaults, property overrides, and `DLM`
/// sentinels are applied either way.
#[allow(clippy::too_many_arguments)]
pub fn close_scope(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    alloc: &mut AllocRegistry,
    rng: &RandomState,
    now: i64,
    parent: Option<SymbolId>,
    strict: bool,
    span: Span,
    source: SourceOrigin,
) -> Result<()> {
    let siblings: Vec<SymbolId> = match parent {
        Some(p) => table.ensure_children(p).to_vec(),
        None => table.roots().to_vec(),
    };
    for sib in siblings {
        let d = table.descriptor(sib);
        if matches!(d.kind, Kind::Alias) || d.flags.contains(Flags::CONSTANT) || d.flags.contains(Flags::DUMMY) {
            continue;
        }
        let count = table.count(sib);
        if count == 0 {
            if let Some(value) = table.property_override(sib).cloned() {
                binder::bind_value(table, buf, alloc, sib, value, 0, span, SourceOrigin::PropertyList)?;
            } else if let Some(expr) = d.default {
                let mut lexer = Lexer::new(expr, SourceOrigin::DefaultValue, false)?;
                let ev = Evaluator::new(now, rng);
                // Defaults are evaluated against an empty variable context: a
                // default expression that references a sibling's bound value
                // is not supported yet.
                let value = ev.eval_expr(&mut lexer, &EmptyContext, SourceOrigin::DefaultValue)?;
                binder::bind_value(table, buf, alloc, sib, value, 0, span, SourceOrigin::DefaultValue)?;
            } else if strict && d.min > 0 {
                return Err(Error::sem(
                    format!("'{}' is required but was not supplied", d.keyword),
                    span,
                    source,
                ));
            }
        } else if strict && count < d.min {
            return Err(Error::sem(
                format!("'{}' occurred {} time(s), fewer than its minimum of {}", d.keyword, count, d.min),
                span,
                source,
            ));
        }

        if d.flags.contains(Flags::DLM) {
            append_sentinel(table, buf, alloc, sib, span, source)?;
        }
    }
    Ok(())
}

fn append_sentinel(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    alloc: &mut AllocRegistry,
    id: SymbolId,
    span: Span,
    source: SourceOrigin,
) -> Result<()> {
    use crate::symtab::Storage;
    let principal = table.principal(id);
    let d = table.descriptor(principal);
    match table.storage(principal) {
        Storage::Variable => {
            let old_len = alloc.len(principal);
            let ptr = alloc.ensure_capacity(principal, old_len + 1, d.flags.contains(Flags::PWD));
            unsafe {
                *ptr.add(old_len) = 0xFF;
            }
            alloc.set_len(principal, old_len + 1);
            buf.write_i64(d.offset, ptr as i64, span, source)?;
        }
        Storage::Fixed { stride } => {
            let index = table.count(principal) as usize;
            if d.max == 0 || (index as u32) < d.max {
                let offset = d.offset + index * stride;
                buf.write_bytes(offset, &vec![0u8; stride], span, source)?;
            }
        }
        Storage::Static => {}
    }
    Ok(())
}
