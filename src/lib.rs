//! A declarative, table-driven command-line parser and value binder.
//!
//! A host program describes its arguments once as a static [`Descriptor`]
//! tree, opens a [`Handle`] over that tree and a caller-owned
//! [`TargetBuffer`], then calls [`Handle::parse_command`] (or
//! [`Handle::parse_properties`] for a property-list default override) as
//! many times as it likes against fresh buffers via [`Handle::reset`].
//!
//! ```text
//! lexer -> parser -> eval (expressions) -> binder -> linker -> defaults
//!                                             |
//!                                          alloc (DYN fields)
//! ```
//! [`Handle`] is the seam a host actually calls through; everything else is
//! implementation plumbing it drives.

pub mod alloc;
pub mod binder;
pub mod charset;
pub mod constants;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod flags;
pub mod handle;
pub mod intern;
pub mod lexer;
pub mod linker;
pub mod parser;
pub mod span;
pub mod symtab;
pub mod target;
pub mod time;

pub use descriptor::{Descriptor, Kind, RootTable};
pub use error::{Error, Result, SourceOrigin};
pub use flags::Flags;
pub use handle::{CloseMethod, Handle, OpenOptions, SymbolView, WalkOp};
pub use lexer::FileLoader;
pub use parser::ParsedEntry;
pub use target::TargetBuffer;
