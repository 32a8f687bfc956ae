//! The link resolver.
//!
//! After the binder writes a value for some descriptor, any sibling carrying
//! a link-role flag (`COUNT`/`ELN`/`SLN`/`TLN`/`OID`/`IND`) whose
//! [`Descriptor::link_target`] names that descriptor is updated with the
//! corresponding back-reference. This runs once per bind, immediately after
//! the value write, so link fields always reflect the most recent element.

use crate::descriptor::Descriptor;
use crate::error::{Result, SourceOrigin};
use crate::flags::Flags;
use crate::span::Span;
use crate::symtab::{Storage, SymbolId, SymbolTable};
use crate::target::TargetBuffer;

/// The back-reference values available immediately after one bind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkValues {
    pub count: u32,
    pub object_id: i64,
    pub element_len: usize,
    pub string_len: usize,
    pub total_len: usize,
    pub input_offset: usize,
}

pub fn resolve(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    parent: Option<SymbolId>,
    source_keyword: &'static str,
    values: LinkValues,
    span: Span,
    source: SourceOrigin,
) -> Result<()> {
    let siblings: Vec<SymbolId> = match parent {
        Some(p) => table.ensure_children(p).to_vec(),
        None => table.roots().to_vec(),
    };
    for sib in siblings {
        let d = table.descriptor(sib);
        if d.link_target != Some(source_keyword) {
            continue;
        }
        // COUNT/TLN/IND describe the source symbol as a whole and are
        // overwritten in place on every bind. OID/ELN/SLN describe the one
        // element just bound and append a new array slot per occurrence,
        // same as any other array-typed sibling.
        if d.flags.contains(Flags::COUNT) {
            write_sized(buf, d, d.offset, values.count as i64, span, source)?;
        }
        if d.flags.contains(Flags::TLN) {
            write_sized(buf, d, d.offset, values.total_len as i64, span, source)?;
        }
        if d.flags.contains(Flags::IND) {
            write_sized(buf, d, d.offset, values.input_offset as i64, span, source)?;
        }
        // A zero object_id means the source symbol isn't an overlay branch
        // (or the branch carries no identity worth recording); nothing is
        // appended for that occurrence.
        if d.flags.contains(Flags::OID) && values.object_id != 0 {
            append_link_value(table, buf, sib, values.object_id, span, source)?;
        }
        if d.flags.contains(Flags::ELN) {
            append_link_value(table, buf, sib, values.element_len as i64, span, source)?;
        }
        if d.flags.contains(Flags::SLN) {
            append_link_value(table, buf, sib, values.string_len as i64, span, source)?;
        }
    }
    Ok(())
}

/// Writes `value` into the next array slot of an OID/ELN/SLN-linked sibling,
/// using that sibling's own occurrence count as the element index, then
/// bumps it — mirroring how `binder::bind_value` advances a regular array
/// symbol one element per call.
fn append_link_value(
    table: &mut SymbolTable,
    buf: &mut TargetBuffer,
    sib: SymbolId,
    value: i64,
    span: Span,
    source: SourceOrigin,
) -> Result<()> {
    let d = table.descriptor(sib);
    let index = table.count(sib) as usize;
    let offset = match table.storage(sib) {
        Storage::Fixed { stride } => d.offset + index * stride,
        _ => d.offset,
    };
    write_sized(buf, d, offset, value, span, source)?;
    table.bump_count(sib);
    Ok(())
}

fn write_sized(buf: &mut TargetBuffer, d: &Descriptor, offset: usize, value: i64, span: Span, source: SourceOrigin) -> Result<()> {
    buf.write_sized(offset, d.size, value, span, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Kind;
    use crate::error::SourceOrigin;
    use crate::symtab::SymbolTable;

    static LEAVES: &[Descriptor] = &[
        Descriptor::new(Kind::String, "NAME", 0, 0).flags(Flags::DYN),
        Descriptor::new(Kind::Number, "NAME-COUNT", 4, 64)
            .flags(Flags::COUNT)
            .link_target("NAME"),
        Descriptor::new(Kind::Number, "NAME-SLN", 4, 68)
            .flags(Flags::SLN)
            .link_target("NAME"),
    ];
    static ROOT: &[Descriptor] = &[Descriptor::new(Kind::Object, "O", 0, 0).children(LEAVES)];

    #[test]
    fn count_and_sln_siblings_receive_back_references() {
        let mut table = SymbolTable::build(ROOT, true);
        let obj = table.roots()[0];
        let mut backing = [0u8; 128];
        let mut buf = TargetBuffer::new(&mut backing);
        let values = LinkValues {
            count: 3,
            string_len: 9,
            ..Default::default()
        };
        resolve(&mut table, &mut buf, Some(obj), "NAME", values, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(64, 4), Some(3));
        assert_eq!(buf.read_i64(68, 4), Some(9));
    }

    static OID_LEAVES: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "CHOICE", 0, 0),
        Descriptor::new(Kind::Number, "CHOICE-OID", 4, 64)
            .flags(Flags::OID)
            .link_target("CHOICE")
            .min_max(0, 4),
    ];
    static OID_ROOT: &[Descriptor] = &[Descriptor::new(Kind::Object, "O2", 0, 0).children(OID_LEAVES)];

    #[test]
    fn oid_sibling_appends_one_array_slot_per_occurrence() {
        let mut table = SymbolTable::build(OID_ROOT, true);
        let obj = table.roots()[0];
        let mut backing = [0u8; 128];
        let mut buf = TargetBuffer::new(&mut backing);
        let first = LinkValues { object_id: 11, ..Default::default() };
        resolve(&mut table, &mut buf, Some(obj), "CHOICE", first, Span::point(0), SourceOrigin::CommandLine).unwrap();
        let second = LinkValues { object_id: 22, ..Default::default() };
        resolve(&mut table, &mut buf, Some(obj), "CHOICE", second, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(64, 4), Some(11));
        assert_eq!(buf.read_i64(68, 4), Some(22));
    }

    #[test]
    fn oid_sibling_skips_a_zero_object_id() {
        let mut table = SymbolTable::build(OID_ROOT, true);
        let obj = table.roots()[0];
        let mut backing = [0u8; 128];
        let mut buf = TargetBuffer::new(&mut backing);
        let values = LinkValues { object_id: 0, ..Default::default() };
        resolve(&mut table, &mut buf, Some(obj), "CHOICE", values, Span::point(0), SourceOrigin::CommandLine).unwrap();
        assert_eq!(buf.read_i64(64, 4), Some(0));
    }
}
