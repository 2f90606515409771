//! Typed `Vector<T>` containers (`spec.md` §3.4): fixed-size, raw
//! contiguous byte storage with a host-visible raw-data view.

use crate::error::{EelError, EelResult};
use crate::ids::ClassId;
use crate::object::{Object, ObjectBody};
use crate::value::Value;

pub fn is_vector_class(c: ClassId) -> bool {
    matches!(
        c,
        ClassId::VECTOR_U8
            | ClassId::VECTOR_S8
            | ClassId::VECTOR_U16
            | ClassId::VECTOR_S16
            | ClassId::VECTOR_U32
            | ClassId::VECTOR_S32
            | ClassId::VECTOR_F
            | ClassId::VECTOR_D
    )
}

fn index_as_usize(key: &Value) -> EelResult<usize> {
    match key {
        Value::Integer(i) if *i >= 0 => Ok(*i as usize),
        Value::Integer(_) => Err(EelError::low_index()),
        _ => Err(EelError::wrong_type()),
    }
}

pub fn get_index(obj: &Object, key: &Value) -> EelResult<Value> {
    let idx = index_as_usize(key)?;
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::Vector(v) => v.get(idx).ok_or_else(EelError::high_index),
        _ => unreachable!(),
    }
}

pub fn set_index(obj: &Object, key: &Value, value: Value) -> EelResult<()> {
    let idx = index_as_usize(key)?;
    let mut body = obj.body.borrow_mut();
    match &mut *body {
        ObjectBody::Vector(v) => v.set(idx, &value),
        _ => unreachable!(),
    }
}

pub fn length(obj: &Object) -> EelResult<i32> {
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::Vector(v) => Ok(v.len() as i32),
        _ => unreachable!(),
    }
}

/// Borrowed raw byte view, guarded by the `RefCell` borrow — the
/// lifetime of the returned `Ref` is the "scoped lock" the design
/// notes ask for (`spec.md` §9 REDESIGN FLAGS).
pub fn raw_data(obj: &Object) -> std::cell::Ref<'_, [u8]> {
    std::cell::Ref::map(obj.body.borrow(), |b| match b {
        ObjectBody::Vector(v) => v.bytes.as_slice(),
        _ => unreachable!(),
    })
}

pub fn raw_data_mut(obj: &Object) -> std::cell::RefMut<'_, [u8]> {
    std::cell::RefMut::map(obj.body.borrow_mut(), |b| match b {
        ObjectBody::Vector(v) => v.bytes.as_mut_slice(),
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::VmId;
    use crate::object::VectorElem;

    #[test]
    fn raw_view_reflects_writes() {
        let obj = Object::new_vector(VmId(1), VectorElem::U8, 4);
        set_index(&obj, &Value::Integer(0), Value::Integer(0xAB)).unwrap();
        assert_eq!(raw_data(&obj)[0], 0xAB);
    }

    #[test]
    fn fixed_size_out_of_range() {
        let obj = Object::new_vector(VmId(1), VectorElem::F, 2);
        assert!(get_index(&obj, &Value::Integer(2)).is_err());
    }
}
