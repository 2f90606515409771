//! Small newtype identifiers shared across the crate.

use derive_more::{Display, From};

/// Identifies a registered class within one VM's class registry
/// (`spec.md` §3.3/§4.1). Reserved built-in classids are assigned by
/// [`crate::builtins::register_builtins`]; host-registered classes get
/// the next free id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const NIL: ClassId = ClassId(0);
    pub const BOOLEAN: ClassId = ClassId(1);
    pub const INTEGER: ClassId = ClassId(2);
    pub const REAL: ClassId = ClassId(3);
    pub const CLASSID: ClassId = ClassId(4);
    pub const OBJREF: ClassId = ClassId(5);
    pub const STRING: ClassId = ClassId(6);
    pub const DSTRING: ClassId = ClassId(7);
    pub const ARRAY: ClassId = ClassId(8);
    pub const TABLE: ClassId = ClassId(9);
    pub const FUNCTION: ClassId = ClassId(10);
    pub const MODULE: ClassId = ClassId(11);
    pub const VECTOR_U8: ClassId = ClassId(12);
    pub const VECTOR_S8: ClassId = ClassId(13);
    pub const VECTOR_U16: ClassId = ClassId(14);
    pub const VECTOR_S16: ClassId = ClassId(15);
    pub const VECTOR_U32: ClassId = ClassId(16);
    pub const VECTOR_S32: ClassId = ClassId(17);
    pub const VECTOR_F: ClassId = ClassId(18);
    pub const VECTOR_D: ClassId = ClassId(19);

    /// One past the highest reserved built-in classid; the first id a
    /// host `register_class` call hands out.
    pub const FIRST_USER: ClassId = ClassId(20);
}

/// Tags which [`crate::vm::Vm`] instance allocated an object. Checked
/// whenever two object references interact (binary metamethods,
/// container insertion) to enforce `spec.md` §5's "no data shared
/// across VMs" invariant at runtime rather than only in documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct VmId(pub u64);
