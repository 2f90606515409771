//! The heap object: classid + per-class private body behind one
//! `RefCell` (`spec.md` §3.2/§4.2).
//!
//! Refcounting itself is not implemented here: every [`Object`] is
//! only ever reached through `Rc<Object>` (see [`crate::value::Value::ObjRef`]),
//! so `Rc`'s strong count is the refcount and `Drop` is the automatic
//! destructor call. This is a deliberate departure from the teacher's
//! `reference_counter.rs`, whose own cycle-detection heuristic
//! (`items_might_reference_each_other`) is a non-functional
//! placeholder that always answers `true`; there is nothing worth
//! porting from it (see `DESIGN.md`).

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::function::FunctionBody;
use crate::ids::{ClassId, VmId};
use crate::module::ModuleBody;
use crate::value::Value;

/// Element type tag for a [`VectorBody`] (`spec.md` §3.4 "Vector<T>").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorElem {
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    F,
    D,
}

impl VectorElem {
    pub fn size(self) -> usize {
        match self {
            VectorElem::U8 | VectorElem::S8 => 1,
            VectorElem::U16 | VectorElem::S16 => 2,
            VectorElem::U32 | VectorElem::S32 | VectorElem::F => 4,
            VectorElem::D => 8,
        }
    }

    pub fn classid(self) -> ClassId {
        match self {
            VectorElem::U8 => ClassId::VECTOR_U8,
            VectorElem::S8 => ClassId::VECTOR_S8,
            VectorElem::U16 => ClassId::VECTOR_U16,
            VectorElem::S16 => ClassId::VECTOR_S16,
            VectorElem::U32 => ClassId::VECTOR_U32,
            VectorElem::S32 => ClassId::VECTOR_S32,
            VectorElem::F => ClassId::VECTOR_F,
            VectorElem::D => ClassId::VECTOR_D,
        }
    }
}

/// A typed, contiguous byte block (`spec.md` §3.4 "typed `Vector<T>`").
/// `bytes` is always a multiple of `elem.size()` long; the raw-data
/// view (§4.4) is just `&bytes`/`&mut bytes` behind the owning
/// object's `RefCell` borrow guard — the borrow checker is the
/// "scoped lock" the design notes ask for.
#[derive(Debug, Clone)]
pub struct VectorBody {
    pub elem: VectorElem,
    pub bytes: Vec<u8>,
}

impl VectorBody {
    pub fn new_zeroed(elem: VectorElem, len: usize) -> Self {
        VectorBody {
            elem,
            bytes: vec![0u8; len * elem.size()],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.elem.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        let sz = self.elem.size();
        let off = index * sz;
        let slice = &self.bytes[off..off + sz];
        Some(match self.elem {
            VectorElem::U8 => Value::Integer(slice[0] as i32),
            VectorElem::S8 => Value::Integer(slice[0] as i8 as i32),
            VectorElem::U16 => Value::Integer(u16::from_le_bytes([slice[0], slice[1]]) as i32),
            VectorElem::S16 => Value::Integer(i16::from_le_bytes([slice[0], slice[1]]) as i32),
            VectorElem::U32 => {
                Value::Integer(u32::from_le_bytes(slice.try_into().unwrap()) as i32)
            }
            VectorElem::S32 => Value::Integer(i32::from_le_bytes(slice.try_into().unwrap())),
            VectorElem::F => {
                Value::Real(f32::from_le_bytes(slice.try_into().unwrap()) as f64)
            }
            VectorElem::D => Value::Real(f64::from_le_bytes(slice.try_into().unwrap())),
        })
    }

    /// Writing past the current end extends the vector by one
    /// zero-filled element (`spec.md` §3.4: "`Vector<T>`: same
    /// extension policy as dstring, with T's native size").
    pub fn set(&mut self, index: usize, value: &Value) -> Result<(), crate::error::EelError> {
        if index >= self.len() {
            let sz = self.elem.size();
            self.bytes.resize((index + 1) * sz, 0);
        }
        let sz = self.elem.size();
        let off = index * sz;
        let slot = &mut self.bytes[off..off + sz];
        match self.elem {
            VectorElem::U8 | VectorElem::S8 => {
                let i = value_as_i64(value)?;
                slot[0] = i as u8;
            }
            VectorElem::U16 | VectorElem::S16 => {
                let i = value_as_i64(value)?;
                slot.copy_from_slice(&(i as u16).to_le_bytes());
            }
            VectorElem::U32 | VectorElem::S32 => {
                let i = value_as_i64(value)?;
                slot.copy_from_slice(&(i as u32).to_le_bytes());
            }
            VectorElem::F => {
                let f = value_as_f64(value)?;
                slot.copy_from_slice(&(f as f32).to_le_bytes());
            }
            VectorElem::D => {
                let f = value_as_f64(value)?;
                slot.copy_from_slice(&f.to_le_bytes());
            }
        }
        Ok(())
    }
}

fn value_as_i64(v: &Value) -> Result<i64, crate::error::EelError> {
    match v {
        Value::Integer(i) => Ok(*i as i64),
        Value::Real(r) => Ok(*r as i64),
        _ => Err(crate::error::EelError::wrong_type()),
    }
}

fn value_as_f64(v: &Value) -> Result<f64, crate::error::EelError> {
    match v {
        Value::Integer(i) => Ok(*i as f64),
        Value::Real(r) => Ok(*r),
        _ => Err(crate::error::EelError::wrong_type()),
    }
}

pub type DestructFn = Box<dyn FnMut(&mut dyn Any)>;

/// Private data for a host-registered class. Host destructors operate
/// only on their own owned payload, never on a back-pointer into the
/// VM (a deliberate, safe narrowing of the C API's destructor
/// capability; built-in classes need no destructor at all, since
/// `Vec`/`IndexMap`/etc. already clean up via their own `Drop`).
pub struct HostBody {
    pub data: Box<dyn Any>,
    pub destruct: Option<DestructFn>,
}

impl std::fmt::Debug for HostBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBody").finish_non_exhaustive()
    }
}

impl Drop for HostBody {
    fn drop(&mut self) {
        if let Some(destruct) = &mut self.destruct {
            destruct(self.data.as_mut());
        }
    }
}

/// Per-class private data. One variant per built-in reserved classid
/// plus `Host` for anything a host `register_class` call defines.
#[derive(Debug)]
pub enum ObjectBody {
    Str(Rc<[u8]>),
    DString(Vec<u8>),
    Array(Vec<Value>),
    Table(IndexMap<Value, Value>),
    Vector(VectorBody),
    Function(FunctionBody),
    Module(ModuleBody),
    Host(HostBody),
}

/// A heap object: a class tag, the id of the VM that allocated it, and
/// its private body. Reached only through `Rc<Object>`.
#[derive(Debug)]
pub struct Object {
    pub classid: ClassId,
    pub vm_id: VmId,
    pub body: RefCell<ObjectBody>,
}

impl Object {
    pub fn new(classid: ClassId, vm_id: VmId, body: ObjectBody) -> Object {
        Object {
            classid,
            vm_id,
            body: RefCell::new(body),
        }
    }

    pub fn new_interned_string(vm_id: VmId, bytes: Rc<[u8]>) -> Object {
        Object::new(ClassId::STRING, vm_id, ObjectBody::Str(bytes))
    }

    pub fn new_dstring(vm_id: VmId, bytes: Vec<u8>) -> Object {
        Object::new(ClassId::DSTRING, vm_id, ObjectBody::DString(bytes))
    }

    pub fn new_array(vm_id: VmId, items: Vec<Value>) -> Object {
        Object::new(ClassId::ARRAY, vm_id, ObjectBody::Array(items))
    }

    pub fn new_table(vm_id: VmId) -> Object {
        Object::new(ClassId::TABLE, vm_id, ObjectBody::Table(IndexMap::new()))
    }

    pub fn new_vector(vm_id: VmId, elem: VectorElem, len: usize) -> Object {
        let classid = elem.classid();
        Object::new(classid, vm_id, ObjectBody::Vector(VectorBody::new_zeroed(elem, len)))
    }

    pub fn new_function(vm_id: VmId, func: FunctionBody) -> Object {
        Object::new(ClassId::FUNCTION, vm_id, ObjectBody::Function(func))
    }

    pub fn new_module(vm_id: VmId, module: ModuleBody) -> Object {
        Object::new(ClassId::MODULE, vm_id, ObjectBody::Module(module))
    }

    pub fn new_host(classid: ClassId, vm_id: VmId, body: HostBody) -> Object {
        Object::new(classid, vm_id, ObjectBody::Host(body))
    }

    /// Borrowed content view for an interned string or dstring, for
    /// use in `Value`'s `Hash`/`Eq` impls and container keys. Panics
    /// if called on a non-string object, which would be a bug in the
    /// caller (every call site already matched on `classid`).
    pub fn as_string_bytes(&self) -> Rc<[u8]> {
        match &*self.body.borrow() {
            ObjectBody::Str(b) => b.clone(),
            ObjectBody::DString(b) => Rc::from(b.as_slice()),
            _ => panic!("as_string_bytes called on non-string object"),
        }
    }
}

/// A non-owning back-link, used where the object graph needs a
/// "points at but does not keep alive" edge (e.g. a function's
/// reference to its owning module, `spec.md` §3.6). Cleared
/// automatically once the referent is dropped — `Weak::upgrade`
/// returning `None` is exactly the discipline the design notes (§9)
/// ask for instead of a raw, manually-cleared pointer.
pub type BackRef = Weak<Object>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_roundtrip() {
        let mut v = VectorBody::new_zeroed(VectorElem::S32, 4);
        v.set(2, &Value::Integer(-7)).unwrap();
        assert_eq!(v.get(2), Some(Value::Integer(-7)));
        assert_eq!(v.get(0), Some(Value::Integer(0)));
    }

    #[test]
    fn vector_write_past_end_extends_with_zero() {
        let mut v = VectorBody::new_zeroed(VectorElem::U8, 2);
        v.set(5, &Value::Integer(1)).unwrap();
        assert_eq!(v.len(), 6);
        assert_eq!(v.get(2), Some(Value::Integer(0)));
        assert_eq!(v.get(4), Some(Value::Integer(0)));
        assert_eq!(v.get(5), Some(Value::Integer(1)));
    }
}
