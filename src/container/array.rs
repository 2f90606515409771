//! Dense, 0-based arrays with extend-on-write-past-end semantics
//! (`spec.md` §3.4 "Array"), plus the dstring/string length helpers
//! that share the same integer-index convention.

use crate::error::{EelError, EelResult};
use crate::object::{Object, ObjectBody};
use crate::value::Value;

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
        ObjectBody::Array(items) => items.get(idx).cloned().ok_or_else(EelError::high_index),
        _ => unreachable!("get_index dispatched to array on non-array object"),
    }
}

/// Writing past the current end extends the array, filling the gap
/// with `nil` (`spec.md` §3.4's "extend-on-write-past-end" invariant).
pub fn set_index(obj: &Object, key: &Value, value: Value) -> EelResult<()> {
    let idx = index_as_usize(key)?;
    let mut body = obj.body.borrow_mut();
    match &mut *body {
        ObjectBody::Array(items) => {
            if idx >= items.len() {
                items.resize(idx + 1, Value::Nil);
            }
            items[idx] = value;
            Ok(())
        }
        _ => unreachable!("set_index dispatched to array on non-array object"),
    }
}

pub fn length(obj: &Object) -> EelResult<i32> {
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::Array(items) => Ok(items.len() as i32),
        _ => unreachable!(),
    }
}

pub fn length_string(obj: &Object) -> EelResult<i32> {
    Ok(obj.as_string_bytes().len() as i32)
}

/// Interned strings are read-only: indexing returns a byte, but there
/// is no corresponding `set_index_string` (use a `dstring` for a
/// mutable byte buffer).
pub fn get_index_string(obj: &Object, key: &Value) -> EelResult<Value> {
    let idx = index_as_usize(key)?;
    let bytes = obj.as_string_bytes();
    bytes
        .get(idx)
        .map(|b| Value::Integer(*b as i32))
        .ok_or_else(EelError::high_index)
}

pub fn length_dstring(obj: &Object) -> EelResult<i32> {
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::DString(bytes) => Ok(bytes.len() as i32),
        _ => unreachable!(),
    }
}

pub fn get_index_dstring(obj: &Object, key: &Value) -> EelResult<Value> {
    let idx = index_as_usize(key)?;
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::DString(bytes) => bytes
            .get(idx)
            .map(|b| Value::Integer(*b as i32))
            .ok_or_else(EelError::high_index),
        _ => unreachable!(),
    }
}

/// Writing an out-of-range integer clamps to a single byte rather than
/// rejecting it (`spec.md` §3.4: dstring elements are clamped to
/// `0..255`).
pub fn set_index_dstring(obj: &Object, key: &Value, value: Value) -> EelResult<()> {
    let idx = index_as_usize(key)?;
    let byte = match value {
        Value::Integer(i) => i.clamp(0, 255) as u8,
        _ => return Err(EelError::wrong_type()),
    };
    let mut body = obj.body.borrow_mut();
    match &mut *body {
        ObjectBody::DString(bytes) => {
            if idx >= bytes.len() {
                bytes.resize(idx + 1, 0);
            }
            bytes[idx] = byte;
            Ok(())
        }
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::VmId;

    #[test]
    fn write_past_end_extends_with_nil() {
        let obj = Object::new_array(VmId(1), vec![Value::Integer(1)]);
        set_index(&obj, &Value::Integer(3), Value::Integer(9)).unwrap();
        assert_eq!(length(&obj).unwrap(), 4);
        assert_eq!(get_index(&obj, &Value::Integer(1)).unwrap(), Value::Nil);
        assert_eq!(get_index(&obj, &Value::Integer(2)).unwrap(), Value::Nil);
        assert_eq!(get_index(&obj, &Value::Integer(3)).unwrap(), Value::Integer(9));
    }

    #[test]
    fn negative_index_rejected() {
        let obj = Object::new_array(VmId(1), vec![Value::Nil]);
        assert!(get_index(&obj, &Value::Integer(-1)).is_err());
    }

    #[test]
    fn read_past_end_is_high_index() {
        let obj = Object::new_array(VmId(1), vec![Value::Nil]);
        assert!(get_index(&obj, &Value::Integer(5)).is_err());
    }

    #[test]
    fn dstring_write_clamps_out_of_range_integers() {
        let obj = Object::new_dstring(VmId(1), vec![0]);
        set_index_dstring(&obj, &Value::Integer(0), Value::Integer(9999)).unwrap();
        assert_eq!(get_index_dstring(&obj, &Value::Integer(0)).unwrap(), Value::Integer(255));
        set_index_dstring(&obj, &Value::Integer(0), Value::Integer(-9999)).unwrap();
        assert_eq!(get_index_dstring(&obj, &Value::Integer(0)).unwrap(), Value::Integer(0));
    }
}
