//! The tagged-union [`Value`] type (`spec.md` §3.1/§3.2).

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::ids::ClassId;
use crate::object::Object;

/// A single EEL value. Six variants, exactly as specified: `nil`,
/// `boolean`, `integer` (wrapping 32-bit signed), `real` (`f64`),
/// `classid` (a first-class reference to a registered class), and
/// `objref` (a strong, refcounted reference into the object heap).
///
/// `ObjRef` wraps `Rc<Object>` directly: cloning a `Value::ObjRef` is
/// the refcount increment of `spec.md` §4.2, and dropping the last
/// clone is the decrement that releases the object (`own`/`disown` in
/// the host API are thin wrappers around `Clone`/`drop`, see
/// `host_api.rs`).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i32),
    Real(f64),
    ClassId(ClassId),
    ObjRef(Rc<Object>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn classid(&self) -> ClassId {
        match self {
            Value::Nil => ClassId::NIL,
            Value::Boolean(_) => ClassId::BOOLEAN,
            Value::Integer(_) => ClassId::INTEGER,
            Value::Real(_) => ClassId::REAL,
            Value::ClassId(_) => ClassId::CLASSID,
            Value::ObjRef(o) => o.classid,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<Object>> {
        match self {
            Value::ObjRef(o) => Some(o),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::ClassId(a), Value::ClassId(b)) => a == b,
            (Value::ObjRef(a), Value::ObjRef(b)) => {
                if a.classid == ClassId::STRING && b.classid == ClassId::STRING {
                    // Interned: pointer equality and content equality
                    // coincide (`spec.md` §4.3), but compare content
                    // directly so equal strings from two pools (e.g.
                    // before/after a purge-and-reintern cycle) still
                    // compare equal.
                    return a.as_string_bytes() == b.as_string_bytes();
                }
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            Value::ClassId(c) => c.hash(state),
            Value::ObjRef(o) => {
                if o.classid == ClassId::STRING {
                    o.as_string_bytes().hash(state);
                } else {
                    // Mutable containers (and any other heap object
                    // used as a key) hash by identity: hashing their
                    // content would break the Hash/Eq contract the
                    // moment the container is mutated after insertion.
                    (Rc::as_ptr(o) as usize).hash(state);
                }
            }
        }
    }
}
