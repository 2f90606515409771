//! Indexable containers (`spec.md` §3.4/§4.4): array, table, typed
//! vector, and dstring, unified behind one [`Indexable`] trait.

pub mod array;
pub mod table;
pub mod vector;

use crate::error::EelResult;
use crate::object::Object;
use crate::value::Value;
use crate::vm::Vm;

/// Shared operations every indexable container supports. Dispatched
/// by classid in the blanket [`Indexable`] impl for [`Object`]; each
/// submodule implements the classid-specific behaviour as free
/// functions operating on the object's borrowed body. Only `table`
/// needs `vm` (to consult a key class's `hash` metamethod); the other
/// kinds ignore it.
pub trait Indexable {
    fn get_index(&self, vm: &mut Vm, key: &Value) -> EelResult<Value>;
    fn set_index(&self, vm: &mut Vm, key: &Value, value: Value) -> EelResult<()>;
    fn length(&self) -> EelResult<i32>;
    /// Remove `key` entirely. Only meaningful for `table` (`spec.md`
    /// §9's resolved Open Question: nil-as-value never implies this,
    /// only an explicit `delete` call does). Other container kinds
    /// reject it with `notimplemented`, since shrinking a dense array
    /// or a fixed-size typed vector has no specified semantics.
    fn delete(&self, vm: &mut Vm, key: &Value) -> EelResult<()>;
}

impl Indexable for Object {
    fn get_index(&self, vm: &mut Vm, key: &Value) -> EelResult<Value> {
        use crate::ids::ClassId;
        match self.classid {
            ClassId::ARRAY => array::get_index(self, key),
            ClassId::TABLE => table::get_index(self, vm, key),
            ClassId::DSTRING => array::get_index_dstring(self, key),
            ClassId::STRING => array::get_index_string(self, key),
            c if vector::is_vector_class(c) => vector::get_index(self, key),
            _ => Err(crate::error::EelError::cant_index()),
        }
    }

    fn set_index(&self, vm: &mut Vm, key: &Value, value: Value) -> EelResult<()> {
        use crate::ids::ClassId;
        match self.classid {
            ClassId::ARRAY => array::set_index(self, key, value),
            ClassId::TABLE => table::set_index(self, vm, key, value),
            ClassId::DSTRING => array::set_index_dstring(self, key, value),
            c if vector::is_vector_class(c) => vector::set_index(self, key, value),
            _ => Err(crate::error::EelError::cant_write()),
        }
    }

    fn length(&self) -> EelResult<i32> {
        use crate::ids::ClassId;
        match self.classid {
            ClassId::ARRAY => array::length(self),
            ClassId::TABLE => table::length(self),
            ClassId::DSTRING => array::length_dstring(self),
            ClassId::STRING => array::length_string(self),
            c if vector::is_vector_class(c) => vector::length(self),
            _ => Err(crate::error::EelError::cant_index()),
        }
    }

    fn delete(&self, vm: &mut Vm, key: &Value) -> EelResult<()> {
        use crate::ids::ClassId;
        match self.classid {
            ClassId::TABLE => table::delete(self, vm, key),
            ClassId::ARRAY | ClassId::DSTRING => Err(crate::error::EelError::not_implemented()),
            c if vector::is_vector_class(c) => Err(crate::error::EelError::not_implemented()),
            _ => Err(crate::error::EelError::cant_index()),
        }
    }
}
