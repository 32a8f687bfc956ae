//! Descriptor flags.
//!
//! Each flag is an independent bit; no flag implies another and no flag is
//! exclusive with another unless the component that consumes it says so
//! (e.g. `SELECTION` only makes sense alongside a populated child constant
//! table, but nothing stops it being set without one except validation at
//! `open()` time). Implemented as a bit-set rather than as a type hierarchy:
//! code that cares about a role tests that single bit.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        /// Resolves to another descriptor (the principal); shares its
        /// Fixed/Variable records.
        const ALIAS        = 0x0000_0001;
        /// Compile-time value in a selection table; no argument, no link, no alias.
        const CONSTANT      = 0x0000_0002;
        /// Only legal on the command line.
        const COMMAND_ONLY  = 0x0000_0004;
        /// Only legal in a property list.
        const PROPERTY_ONLY = 0x0000_0008;
        /// Value must match one of this descriptor's child constants.
        const SELECTION     = 0x0000_0010;
        /// Array element stride equals `size` (vs. tightly packed).
        const FIXED         = 0x0000_0020;
        /// String may contain NUL; no terminator required.
        const BINARY        = 0x0000_0040;
        /// Present in the target buffer but not in the symbol table.
        const DUMMY         = 0x0000_0080;
        /// Receives the principal's current element count.
        const COUNT         = 0x0000_0100;
        /// Receives the principal's `object_id` (overlay/switch selection).
        const OID           = 0x0000_0200;
        /// Receives the byte offset of the current keyword in the input stream.
        const IND           = 0x0000_0400;
        /// Not shown in syntax/help output.
        const HIDDEN        = 0x0000_0800;
        /// Receives the size of the most recently written element.
        const ELN           = 0x0000_1000;
        /// Receives the string length (excluding terminator) of the most
        /// recently written string element.
        const SLN           = 0x0000_2000;
        /// Receives the total bytes written so far by the principal.
        const TLN           = 0x0000_4000;
        /// Keyword alone binds `object_id` as the value (numbers behave like switches).
        const DEF           = 0x0001_0000;
        /// Binary string default-interpreted as host charset.
        const CHR           = 0x0002_0000;
        /// Binary string default-interpreted as ASCII.
        const ASC           = 0x0004_0000;
        /// Binary string default-interpreted as EBCDIC.
        const EBC           = 0x0008_0000;
        /// Binary string default-interpreted as hex digit pairs.
        const HEX           = 0x0010_0000;
        /// Number carries a Unix time value (display-only annotation).
        const TIM           = 0x0040_0000;
        /// Target field is a pointer to heap-extendable storage.
        const DYN           = 0x0080_0000;
        /// Redact this descriptor's value in all diagnostics.
        const PWD           = 0x0100_0000;
        /// Reserve a trailing sentinel element (`0xFF` for non-fixed string
        /// arrays, an empty element for fixed arrays).
        const DLM           = 0x0200_0000;
        /// Negative values are rejected.
        const UNSIGNED      = 0x0400_0000;
        /// Zero-terminated string is an XML path; `(...)` expands env vars.
        const XML           = 0x0800_0000;
        /// Zero-terminated string is a filesystem path; `~` expands to HOME.
        const FIL           = 0x1000_0000;
        /// Zero-terminated string is a label; `~`/`^`/`!` expand USER/OWNER/ENVID.
        const LAB           = 0x2000_0000;
        /// Upper-case the bound string.
        const UPP           = 0x4000_0000;
        /// Lower-case the bound string.
        const LOW           = 0x8000_0000;
    }
}

impl Flags {
    /// The link-role flags, as a group, for quickly testing "does this
    /// descriptor carry any link role at all".
    pub const LINK_ROLES: Flags = Flags::COUNT
        .union(Flags::ELN)
        .union(Flags::SLN)
        .union(Flags::TLN)
        .union(Flags::OID)
        .union(Flags::IND);

    pub fn has_link_role(self) -> bool {
        self.intersects(Flags::LINK_ROLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent_bits() {
        let f = Flags::SELECTION | Flags::HIDDEN;
        assert!(f.contains(Flags::SELECTION));
        assert!(f.contains(Flags::HIDDEN));
        assert!(!f.contains(Flags::ALIAS));
    }

    #[test]
    fn link_roles_detected() {
        assert!((Flags::COUNT).has_link_role());
        assert!((Flags::OID | Flags::ELN).has_link_role());
        assert!(!(Flags::HIDDEN | Flags::PWD).has_link_role());
    }
}
