//! Ordered tables (`spec.md` §3.4 "Table"): insertion-order preserving,
//! first-write-wins position, backed by `indexmap::IndexMap` (see
//! `DESIGN.md` for why this is the one addition to the teacher's
//! dependency stack — its own `StackItem::Map` uses a `BTreeMap`,
//! which sorts by key and cannot express insertion order).

use indexmap::IndexMap;

use crate::class::Metamethod;
use crate::error::{EelError, EelResult};
use crate::object::{Object, ObjectBody};
use crate::value::Value;
use crate::vm::Vm;

/// If `key`'s class defines a `hash` metamethod, evaluate it. Ordinary
/// keys (integers, strings, objects of classes with no `hash`) fall
/// through to `IndexMap`'s own `Hash`/`Eq` and never pay for this.
fn class_hash(vm: &mut Vm, key: &Value) -> EelResult<Option<i32>> {
    let Value::ObjRef(o) = key else {
        return Ok(None);
    };
    let Some(f) = vm.classes.lookup_metamethod(o.classid, Metamethod::Hash) else {
        return Ok(None);
    };
    match f(vm, std::slice::from_ref(key))? {
        Value::Integer(i) => Ok(Some(i)),
        _ => Err(EelError::wrong_type()),
    }
}

fn find_by_class_hash(
    vm: &mut Vm,
    map: &IndexMap<Value, Value>,
    key: &Value,
    target_hash: i32,
) -> EelResult<Option<usize>> {
    for i in 0..map.len() {
        let candidate = map.get_index(i).unwrap().0.clone();
        if let Some(candidate_hash) = class_hash(vm, &candidate)? {
            if candidate_hash == target_hash && vm.values_equal(key, &candidate)? {
                return Ok(Some(i));
            }
        }
    }
    Ok(None)
}

pub fn get_index(obj: &Object, vm: &mut Vm, key: &Value) -> EelResult<Value> {
    if key.is_nil() {
        return Err(EelError::wrong_index());
    }
    if let Some(hash) = class_hash(vm, key)? {
        let found = {
            let body = obj.body.borrow();
            let map = match &*body {
                ObjectBody::Table(map) => map,
                _ => unreachable!(),
            };
            find_by_class_hash(vm, map, key, hash)?
        };
        let body = obj.body.borrow();
        let map = match &*body {
            ObjectBody::Table(map) => map,
            _ => unreachable!(),
        };
        return match found {
            Some(i) => Ok(map.get_index(i).unwrap().1.clone()),
            None => Err(EelError::wrong_index()),
        };
    }
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::Table(map) => map.get(key).cloned().ok_or_else(EelError::wrong_index),
        _ => unreachable!(),
    }
}

/// Nil is never a legal key (`spec.md` §9 Open Question #1, resolved
/// in `SPEC_FULL.md` §3: `delete` is the only way to remove an entry).
/// A write that keeps an existing key's position; a new key is
/// appended at the end, giving the "first write wins position"
/// ordering invariant.
pub fn set_index(obj: &Object, vm: &mut Vm, key: &Value, value: Value) -> EelResult<()> {
    if key.is_nil() {
        return Err(EelError::wrong_index());
    }
    if let Some(hash) = class_hash(vm, key)? {
        let found = {
            let body = obj.body.borrow();
            let map = match &*body {
                ObjectBody::Table(map) => map,
                _ => unreachable!(),
            };
            find_by_class_hash(vm, map, key, hash)?
        };
        let mut body = obj.body.borrow_mut();
        return match &mut *body {
            ObjectBody::Table(map) => {
                match found {
                    Some(i) => {
                        let (_, v) = map.get_index_mut(i).unwrap();
                        *v = value;
                    }
                    None => {
                        map.insert(key.clone(), value);
                    }
                }
                Ok(())
            }
            _ => unreachable!(),
        };
    }
    let mut body = obj.body.borrow_mut();
    match &mut *body {
        ObjectBody::Table(map) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        _ => unreachable!(),
    }
}

pub fn length(obj: &Object) -> EelResult<i32> {
    let body = obj.body.borrow();
    match &*body {
        ObjectBody::Table(map) => Ok(map.len() as i32),
        _ => unreachable!(),
    }
}

pub fn delete(obj: &Object, vm: &mut Vm, key: &Value) -> EelResult<()> {
    if let Some(hash) = class_hash(vm, key)? {
        let found = {
            let body = obj.body.borrow();
            let map = match &*body {
                ObjectBody::Table(map) => map,
                _ => unreachable!(),
            };
            find_by_class_hash(vm, map, key, hash)?
        };
        if let Some(i) = found {
            let mut body = obj.body.borrow_mut();
            if let ObjectBody::Table(map) = &mut *body {
                map.shift_remove_index(i);
            }
        }
        return Ok(());
    }
    let mut body = obj.body.borrow_mut();
    match &mut *body {
        ObjectBody::Table(map) => {
            map.shift_remove(key);
            Ok(())
        }
        _ => unreachable!(),
    }
}
