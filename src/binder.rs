//! The binder.
//!
//! Takes one evaluated [`Value`] destined for one symbol and writes it into
//! the target buffer (or, for `DYN` fields, into an allocator-registry
//! block), enforcing `SELECTION`/`UNSIGNED` at bind time and handing the
//! result to [`crate::linker::resolve`] so COUNT/ELN/SLN/TLN/OID/IND
//! siblings stay current. Min-occurrence checks and default-expression
//! binding on scope close live in [`crate::defaults`], one layer up, since
//! those only make sense once a whole scope has finished parsing.

use crate::descriptor::{Descriptor, Kind};
use crate::error::{Error, Result, SourceOrigin};
use crate::eval::{StrEnc, Value};
use crate::flags::Flags;
use crate::linker::{self, LinkValues};
use crate::span::Span;
use crate::symtab::{Storage, SymbolId, SymbolTable};
use crate::target::TargetBuffer;
use crate::alloc::AllocRegistry;

/// Writes `value` for `id`'s next array element (its occurrence count is
/// read before being bumped, so element 0 goes first) and resolves any
/// linked siblings. `input_offset` is the byte position in the source
/// buffer the bound keyword started at, for `IND`-flagged siblings.
#[allow(clippy::too_many_arguments)]
pub fn bind_value(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    alloc: &mut AllocRegistry,
    id: SymbolId,
    value: Value,
    input_offset: usize,
    span: Span,
    source: SourceOrigin,
) -> Result<LinkValues> {
    let principal = table.principal(id);
    let d = table.descriptor(principal);

    if d.flags.contains(Flags::SELECTION) {
        validate_selection(d, &value, span, source)?;
    }
    if d.flags.contains(Flags::UNSIGNED) {
        if let Some(n) = value.as_int() {
            if n < 0 {
                return Err(Error::sem(
                    format!("'{}' does not accept a negative value", d.keyword),
                    span,
                    source,
                ));
            }
        }
    }

    let index = table.count(principal) as usize;
    if d.max != 0 && index as u32 >= d.max {
        return Err(Error::sem(
            format!("'{}' occurs more than its maximum of {}", d.keyword, d.max),
            span,
            source,
        ));
    }

    let (element_len, string_len) = write_element(table, buf, alloc, principal, d, &value, index, span, source)?;
    let new_count = table.bump_count(principal);
    let total_len = match table.storage(principal) {
        Storage::Variable => alloc.len(principal),
        _ => new_count as usize * d.size,
    };

    let values = LinkValues {
        count: new_count,
        object_id: d.object_id,
        element_len,
        string_len,
        total_len,
        input_offset,
    };
    linker::resolve(table, buf, table.parent(principal), d.keyword, values, span, source)?;
    Ok(values)
}

fn validate_selection(d: &Descriptor, value: &Value, span: Span, source: SourceOrigin) -> Result<()> {
    let Some(children) = d.children else {
        return Err(Error::tab(
            format!("'{}' is flagged SELECTION but has no constant table", d.keyword),
            span,
            source,
        ));
    };
    let matches = children.iter().any(|c| match (&value, c.kind) {
        (Value::Int(n), Kind::Number) => *n == c.object_id,
        (Value::Str(bytes, _), Kind::String) => bytes.as_slice() == c.keyword.as_bytes(),
        _ => false,
    });
    if matches {
        Ok(())
    } else {
        Err(Error::sem(
            format!("value is not one of '{}'s allowed selections", d.keyword),
            span,
            source,
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn write_element(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    alloc: &mut AllocRegistry,
    principal: SymbolId,
    d: &'static Descriptor,
    value: &Value,
    index: usize,
    span: Span,
    source: SourceOrigin,
) -> Result<(usize, usize)> {
    match table.storage(principal) {
        Storage::Variable => write_variable(alloc, buf, principal, d, value, span, source),
        storage => {
            let offset = match storage {
                Storage::Fixed { stride } => d.offset + index * stride,
                Storage::Static => d.offset,
                Storage::Variable => unreachable!(),
            };
            write_fixed(buf, d, value, offset, span, source)
        }
    }
}

fn write_fixed(
    buf: &mut TargetBuffer,
    d: &'static Descriptor,
    value: &Value,
    offset: usize,
    span: Span,
    source: SourceOrigin,
) -> Result<(usize, usize)> {
    match (d.kind, value) {
        // An object/overlay has no data of its own to write — binding it
        // only exists to bump its occurrence count, log it, and hand its
        // `object_id` to the link resolver for any OID-flagged sibling.
        (Kind::Object | Kind::Overlay, Value::Int(_)) => Ok((0, 0)),
        (Kind::Switch, _) => {
            buf.write_sized(offset, d.size.max(1), d.object_id, span, source)?;
            Ok((d.size.max(1), 0))
        }
        (Kind::Number, Value::Int(n)) => {
            buf.write_sized(offset, d.size, *n, span, source)?;
            Ok((d.size, 0))
        }
        (Kind::Float, Value::Float(f)) => {
            if d.size == 4 {
                buf.write_f32(offset, *f as f32, span, source)?;
            } else {
                buf.write_f64(offset, *f, span, source)?;
            }
            Ok((d.size, 0))
        }
        (Kind::Float, Value::Int(n)) => {
            let f = *n as f64;
            if d.size == 4 {
                buf.write_f32(offset, f as f32, span, source)?;
            } else {
                buf.write_f64(offset, f, span, source)?;
            }
            Ok((d.size, 0))
        }
        (Kind::String, Value::Str(bytes, enc)) => {
            let cased = apply_case_flags(d, bytes);
            let binary = *enc == StrEnc::Binary || d.flags.contains(Flags::BINARY);
            let mut content = cased.clone();
            if !binary {
                content.truncate(d.size.saturating_sub(1));
            }
            let field_width = d.size.max(content.len() + if binary { 0 } else { 1 });
            let mut out = vec![0u8; field_width];
            out[..content.len()].copy_from_slice(&content);
            buf.write_bytes(offset, &out, span, source)?;
            Ok((cased.len(), cased.len()))
        }
        (kind, value) => Err(Error::typ(
            format!("'{}' cannot bind a {:?} into a {kind:?} field", d.keyword, value),
            span,
            source,
        )),
    }
}

fn write_variable(
    alloc: &mut AllocRegistry,
    buf: &mut TargetBuffer,
    principal: SymbolId,
    d: &'static Descriptor,
    value: &Value,
    span: Span,
    source: SourceOrigin,
) -> Result<(usize, usize)> {
    let bytes: Vec<u8> = match value {
        Value::Str(b, _) => apply_case_flags(d, b),
        Value::Int(n) => n.to_ne_bytes().to_vec(),
        Value::Float(f) => f.to_ne_bytes().to_vec(),
    };
    let old_len = alloc.len(principal);
    let new_len = old_len + bytes.len();
    let pwd = d.flags.contains(Flags::PWD);
    let ptr = alloc.ensure_capacity(principal, new_len, pwd);
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(old_len), bytes.len());
    }
    alloc.set_len(principal, new_len);
    buf.write_i64(d.offset, ptr as i64, span, source)?;
    Ok((bytes.len(), bytes.len()))
}

fn apply_case_flags(d: &Descriptor, bytes: &[u8]) -> Vec<u8> {
    if d.flags.contains(Flags::UPP) {
        bytes.to_ascii_uppercase()
    } else if d.flags.contains(Flags::LOW) {
        bytes.to_ascii_lowercase()
    } else {
        bytes.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceOrigin;
    use crate::symtab::SymbolTable;

    static NUM_ROOT: &[Descriptor] = &[Descriptor::new(Kind::Number, "NUM08", 8, 0).min_max(0, 1)];

    #[test]
    fn binds_a_scalar_number() {
        let mut table = SymbolTable::build(NUM_ROOT, true);
        let id = table.roots()[0];
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        bind_value(&mut table, &mut buf, &mut alloc, id, Value::Int(42), 0, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 8), Some(42));
        assert_eq!(table.count(id), 1);
    }

    static ARR_ROOT: &[Descriptor] =
        &[Descriptor::new(Kind::Number, "ARR", 4, 0).min_max(0, 3)];

    #[test]
    fn binds_successive_array_elements_at_stride_offsets() {
        let mut table = SymbolTable::build(ARR_ROOT, true);
        let id = table.roots()[0];
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        bind_value(&mut table, &mut buf, &mut alloc, id, Value::Int(1), 0, Span::point(0), SourceOrigin::CommandLine).unwrap();
        bind_value(&mut table, &mut buf, &mut alloc, id, Value::Int(2), 0, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(0, 4), Some(1));
        assert_eq!(buf.read_i64(4, 4), Some(2));
    }

    static OBJ_OID_ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Object, "OBJ", 0, 0).oid(7),
        Descriptor::new(Kind::Number, "OBJ-OID", 4, 8).flags(Flags::OID).link_target("OBJ"),
    ];

    #[test]
    fn binding_an_object_writes_no_bytes_but_resolves_its_oid_link() {
        let mut table = SymbolTable::build(OBJ_OID_ROOT, true);
        let obj = table.roots()[0];
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        bind_value(&mut table, &mut buf, &mut alloc, obj, Value::Int(7), 0, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(8, 4), Some(7));
    }

    static UNSIGNED_ROOT: &[Descriptor] =
        &[Descriptor::new(Kind::Number, "U", 8, 0).flags(Flags::UNSIGNED)];

    #[test]
    fn unsigned_rejects_negative_values() {
        let mut table = SymbolTable::build(UNSIGNED_ROOT, true);
        let id = table.roots()[0];
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        let err = bind_value(&mut table, &mut buf, &mut alloc, id, Value::Int(-1), 0, Span::point(0), SourceOrigin::CommandLine)
            .unwrap_err();
        assert_eq!(err.code(), -3);
    }

    static DYN_ROOT: &[Descriptor] = &[Descriptor::new(Kind::String, "S", 0, 0).flags(Flags::DYN)];

    #[test]
    fn dyn_field_grows_and_writes_pointer() {
        let mut table = SymbolTable::build(DYN_ROOT, true);
        let id = table.roots()[0];
        let mut backing = [0u8; 16];
        let mut buf = TargetBuffer::new(&mut backing);
        let mut alloc = AllocRegistry::new();
        bind_value(
            &mut table,
            &mut buf,
            &mut alloc,
            id,
            Value::Str(b"hello".to_vec(), StrEnc::Default),
            0,
            Span::point(0),
            SourceOrigin::CommandLine,
        )
        .unwrap();
        let ptr = buf.read_i64(0, 8).unwrap();
        assert_ne!(ptr, 0);
        let slice = unsafe { std::slice::from_raw_parts(ptr as *const u8, 5) };
        assert_eq!(slice, b"hello");
    }
}
