//! Metamethod dispatch (`spec.md` §4.7): consult the operand's class,
//! else walk its parent chain, else `notimplemented`. Binary
//! operators try the left operand first and retry the right operand
//! exactly once on `notimplemented` — not full symmetric double
//! dispatch.

use crate::class::Metamethod;
use crate::error::{EelError, ExceptionCode};
use crate::value::Value;
use crate::vm::Vm;

fn is_not_implemented(e: &EelError) -> bool {
    e.code == ExceptionCode::NotImplemented
}

/// Dispatch a unary metamethod (`neg`, `bnot`, `length`, ...) against
/// a single operand's class (and its parent chain).
pub fn dispatch_unary(vm: &mut Vm, mm: Metamethod, operand: &Value) -> Result<Value, EelError> {
    let class = operand.classid();
    let f = vm
        .classes
        .lookup_metamethod(class, mm)
        .ok_or_else(EelError::not_implemented)?;
    f(vm, std::slice::from_ref(operand))
}

/// Dispatch a binary metamethod. Tries `lhs`'s class first; if that
/// class has no handler, or the handler itself answers
/// `notimplemented`, retries once against `rhs`'s class. Failing both,
/// raises `notimplemented` (`spec.md` §4.7).
pub fn dispatch_binary(
    vm: &mut Vm,
    mm: Metamethod,
    lhs: &Value,
    rhs: &Value,
) -> Result<Value, EelError> {
    let args = [lhs.clone(), rhs.clone()];
    let lhs_class = lhs.classid();
    if let Some(f) = vm.classes.lookup_metamethod(lhs_class, mm) {
        match f(vm, &args) {
            Ok(v) => return Ok(v),
            Err(e) if is_not_implemented(&e) => {}
            Err(e) => return Err(e),
        }
    }
    let rhs_class = rhs.classid();
    if let Some(f) = vm.classes.lookup_metamethod(rhs_class, mm) {
        return f(vm, &args);
    }
    Err(EelError::not_implemented())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::MetamethodFn;
    use crate::ids::ClassId;
    use crate::vm::{ExecutionLimits, Vm};
    use std::rc::Rc;

    fn test_vm() -> Vm {
        Vm::open(ExecutionLimits::default())
    }

    #[test]
    fn binary_retries_rhs_on_not_implemented() {
        let mut vm = test_vm();
        let right_cls = vm.classes.register_class("right", None).unwrap();
        let f: MetamethodFn = Rc::new(|_vm, args| Ok(args[1].clone()));
        vm.classes.set_metamethod(right_cls, Metamethod::Add, f).unwrap();

        let lhs = Value::Integer(1);
        let rhs_obj = crate::object::Object::new_host(
            right_cls,
            vm.id(),
            crate::object::HostBody {
                data: Box::new(()),
                destruct: None,
            },
        );
        let rhs = Value::ObjRef(Rc::new(rhs_obj));
        let result = dispatch_binary(&mut vm, Metamethod::Add, &lhs, &rhs).unwrap();
        assert_eq!(result, rhs);
    }

    #[test]
    fn both_sides_missing_is_not_implemented() {
        let mut vm = test_vm();
        let a = Value::ClassId(ClassId::NIL);
        let b = Value::ClassId(ClassId::NIL);
        let err = dispatch_binary(&mut vm, Metamethod::Add, &a, &b).unwrap_err();
        assert_eq!(err.code, ExceptionCode::NotImplemented);
    }
}
