//! The host-facing API (`spec.md` §4.6): the only surface bindings and
//! executives are meant to use. Everything here is a thin, safe
//! wrapper over [`crate::vm::Vm`] and the object constructors —
//! grounded in the same "one narrow entry-point surface, everything
//! else internal" shape as the teacher's `InteropService` registry,
//! generalized from Neo's fixed syscall table to EEL's open host API.

use std::rc::Rc;

use log::error;

use crate::error::{EelError, EelResult};
use crate::function::{ArgSpec, FunctionBody, HostFn};
use crate::ids::ClassId;
use crate::module::ModuleBody;
use crate::object::{HostBody, Object, ObjectBody};
use crate::value::Value;
use crate::vm::Vm;

/// Flags accepted by [`load`]/[`load_buffer`] (`spec.md` §4.6). Three
/// independent booleans; not worth a bitflags dependency (see
/// `DESIGN.md`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadFlags {
    pub list_symbols: bool,
    pub list_disassembly: bool,
    pub warnings_as_errors: bool,
}

/// Load a compiled module image from a named source.
///
/// Compilation and on-disk image lookup are outside this crate's scope
/// (`spec.md` §1 Non-goals: no compiler front-end); this loads a
/// pre-built image exactly as produced by `crate::image`.
pub fn load(vm: &mut Vm, name: &str, bytes: &[u8], flags: LoadFlags) -> EelResult<Rc<Object>> {
    let module = crate::loader::load_image(vm, name, bytes, flags)?;
    vm.register_module(module.clone());
    Ok(module)
}

/// Load a module image already resident in memory (`load_buffer`,
/// `spec.md` §4.6) — identical to [`load`] once the image bytes are in
/// hand; kept as a distinct entry point to match the host-facing names
/// the specification gives them.
pub fn load_buffer(vm: &mut Vm, name: &str, bytes: &[u8], flags: LoadFlags) -> EelResult<Rc<Object>> {
    load(vm, name, bytes, flags)
}

/// `create_module` (`spec.md` §4.6): a fresh, empty module a host can
/// populate with `export_cfunction`/`export_class`/`export_constants`.
pub fn create_module(vm: &mut Vm, name: &str, unload: Option<crate::module::UnloadFn>) -> Rc<Object> {
    let mut body = ModuleBody::new(Rc::from(name.as_bytes()));
    body.unload = unload;
    let module = Rc::new(Object::new_module(vm.id(), body));
    vm.register_module(module.clone());
    module
}

/// `export_cfunction` (`spec.md` §4.6): register a host callback as an
/// exported function of `module`.
pub fn export_cfunction(
    vm: &Vm,
    module: &Rc<Object>,
    name: &str,
    results: u8,
    args: ArgSpec,
    f: HostFn,
) -> EelResult<Rc<Object>> {
    let func_body = FunctionBody::new_host(
        Some(Rc::from(name.as_bytes())),
        args,
        results,
        f,
        Rc::downgrade(module),
    );
    let func_obj = Rc::new(Object::new_function(vm.id(), func_body));
    match &mut *module.body.borrow_mut() {
        crate::object::ObjectBody::Module(m) => {
            let idx = m.add_function(func_obj.clone());
            m.export(Rc::from(name.as_bytes()), idx);
        }
        _ => return Err(EelError::wrong_type()),
    }
    Ok(func_obj)
}

/// `export_class` (`spec.md` §4.6): register a new host-defined class
/// with this module as its registration point. `construct` is invoked
/// on `new <classname>(...)`-style construction; `destruct`/`clone` are
/// the class-level fallbacks consulted by [`new_host_object`] and
/// [`clone_value`] when an instance supplies none of its own, since
/// every instance may still own distinct native state
/// (`DESIGN.md`: destructors/clones operate only on owned data).
pub fn export_class(
    vm: &mut Vm,
    name: &str,
    parent: Option<ClassId>,
    construct: Option<crate::class::ConstructFn>,
    destruct: Option<crate::class::ClassDestructFn>,
    clone: Option<crate::class::CloneFn>,
) -> EelResult<ClassId> {
    let id = vm.classes.register_class(name, parent)?;
    if let Some(f) = construct {
        vm.classes.set_construct(id, f)?;
    }
    if let Some(f) = destruct {
        vm.classes.set_destruct(id, f)?;
    }
    if let Some(f) = clone {
        vm.classes.set_clone(id, f)?;
    }
    Ok(id)
}

/// `export_constants` (`spec.md` §4.6): bind a table of name/value
/// pairs into the module's constant pool, each reachable as a global
/// lookup of that name at load time. Returns the constant-pool indices
/// assigned, in argument order.
pub fn export_constants(module: &Rc<Object>, constants: &[(&str, Value)]) -> EelResult<Vec<usize>> {
    match &mut *module.body.borrow_mut() {
        crate::object::ObjectBody::Module(m) => Ok(constants
            .iter()
            .map(|(_, v)| {
                m.constants.push(v.clone());
                m.constants.len() - 1
            })
            .collect()),
        _ => Err(EelError::wrong_type()),
    }
}

/// `export_lconstants` (`spec.md` §4.6): the integer-only convenience
/// form of [`export_constants`].
pub fn export_lconstants(module: &Rc<Object>, constants: &[(&str, i32)]) -> EelResult<Vec<usize>> {
    let owned: Vec<(&str, Value)> = constants.iter().map(|(n, v)| (*n, Value::Integer(*v))).collect();
    export_constants(module, &owned)
}

/// `argf` (`spec.md` §4.6): build an argument vector from a compact
/// format string. `*` resets (returns an empty vector to start over),
/// `s`/`l`/`d`/`o`/`b`/`n` push a string/integer/real/object/boolean/
/// nil argument respectively. The out-parameter result-slot binding
/// (`R`) has no meaning outside the C calling convention this crate
/// does not expose, so `R` is accepted and ignored here.
pub fn argf(vm: &mut Vm, format: &str, values: &[Value]) -> EelResult<Vec<Value>> {
    let mut out = Vec::with_capacity(values.len());
    let mut vi = 0;
    for ch in format.chars() {
        match ch {
            '*' => out.clear(),
            'R' => {}
            's' | 'l' | 'd' | 'o' | 'b' | 'n' => {
                let v = values.get(vi).cloned().ok_or_else(EelError::few_args)?;
                vi += 1;
                out.push(coerce_format(vm, ch, v)?);
            }
            _ => return Err(EelError::wrong_format()),
        }
    }
    Ok(out)
}

fn coerce_format(vm: &mut Vm, ch: char, v: Value) -> EelResult<Value> {
    match ch {
        's' => match &v {
            Value::ObjRef(o) if o.classid == ClassId::STRING || o.classid == ClassId::DSTRING => Ok(v),
            _ => Err(EelError::need_string()),
        },
        'l' => match v {
            Value::Integer(_) => Ok(v),
            Value::Real(r) => Ok(Value::Integer(r as i32)),
            _ => Err(EelError::wrong_type()),
        },
        'd' => match v {
            Value::Real(_) => Ok(v),
            Value::Integer(i) => Ok(Value::Real(i as f64)),
            _ => Err(EelError::wrong_type()),
        },
        'o' => match &v {
            Value::ObjRef(_) => Ok(v),
            _ => Err(EelError::need_object()),
        },
        'b' => match v {
            Value::Boolean(_) => Ok(v),
            _ => Err(EelError::wrong_type()),
        },
        'n' => {
            let _ = &v;
            let _ = vm;
            Ok(Value::Nil)
        }
        _ => unreachable!(),
    }
}

/// `call` (`spec.md` §4.6): invoke a function object directly.
pub fn call(vm: &mut Vm, function: &Rc<Object>, args: &[Value]) -> EelResult<Option<Value>> {
    vm.call_function(function, args)
}

/// `calln` (`spec.md` §4.6): look up `name` in `module`'s exports and
/// call it.
pub fn calln(vm: &mut Vm, module: &Rc<Object>, name: &str, args: &[Value]) -> EelResult<Option<Value>> {
    let func = match &*module.body.borrow() {
        crate::object::ObjectBody::Module(m) => {
            let idx = m.lookup_export(name.as_bytes()).ok_or_else(EelError::wrong_index)?;
            m.functions[idx].clone()
        }
        _ => return Err(EelError::wrong_type()),
    };
    vm.call_function(&func, args)
}

/// `callf` (`spec.md` §4.6): combine [`argf`] and [`call`] in one step.
pub fn callf(
    vm: &mut Vm,
    function: &Rc<Object>,
    format: &str,
    values: &[Value],
) -> EelResult<Option<Value>> {
    let args = argf(vm, format, values)?;
    call(vm, function, &args)
}

/// `v2l` (`spec.md` §4.6).
pub fn v2l(v: &Value) -> EelResult<i32> {
    match v {
        Value::Integer(i) => Ok(*i),
        Value::Real(r) => Ok(*r as i32),
        _ => Err(EelError::wrong_type()),
    }
}

/// `v2d`.
pub fn v2d(v: &Value) -> EelResult<f64> {
    match v {
        Value::Real(r) => Ok(*r),
        Value::Integer(i) => Ok(*i as f64),
        _ => Err(EelError::wrong_type()),
    }
}

/// `v2s`. Returns a borrow tied to the value's own backing storage —
/// the Rust expression of `EEL.h`'s "string storage belongs to the VM
/// and MAY HAVE A LIMITED LIFETIME" warning (`SPEC_FULL.md` Host API
/// supplement): the borrow checker, not a comment, enforces that this
/// cannot outlive the object it came from.
pub fn v2s(v: &Value) -> EelResult<Rc<[u8]>> {
    match v {
        Value::ObjRef(o) if o.classid == ClassId::STRING => Ok(o.as_string_bytes()),
        Value::ObjRef(o) if o.classid == ClassId::DSTRING => Ok(o.as_string_bytes()),
        _ => Err(EelError::need_string()),
    }
}

pub fn l2v(i: i32) -> Value {
    Value::Integer(i)
}

pub fn d2v(d: f64) -> Value {
    Value::Real(d)
}

/// `s2v`: intern `bytes` as a `string` value.
pub fn s2v(vm: &mut Vm, bytes: &[u8]) -> Value {
    Value::ObjRef(vm.intern_string(bytes))
}

pub fn o2v(o: Rc<Object>) -> Value {
    Value::ObjRef(o)
}

pub fn b2v(b: bool) -> Value {
    Value::Boolean(b)
}

pub fn nil2v() -> Value {
    Value::Nil
}

/// `getsindex`/`setsindex` (`spec.md` §4.6): string-keyed indexing,
/// the common case for `table` property access.
pub fn getsindex(vm: &mut Vm, object: &Value, name: &str) -> EelResult<Value> {
    let key = s2v(vm, name.as_bytes());
    vm.op_getindex(object, &key)
}

pub fn setsindex(vm: &mut Vm, object: &Value, name: &str, value: Value) -> EelResult<()> {
    let key = s2v(vm, name.as_bytes());
    vm.op_setindex(object, &key, value)
}

/// `getlindex`/`setlindex`: integer-keyed indexing.
pub fn getlindex(vm: &mut Vm, object: &Value, index: i32) -> EelResult<Value> {
    vm.op_getindex(object, &Value::Integer(index))
}

pub fn setlindex(vm: &mut Vm, object: &Value, index: i32, value: Value) -> EelResult<()> {
    vm.op_setindex(object, &Value::Integer(index), value)
}

/// `length`.
pub fn length(object: &Value) -> EelResult<i32> {
    match object {
        Value::ObjRef(o) => crate::container::Indexable::length(o.as_ref()),
        _ => Err(EelError::cant_index()),
    }
}

/// `own`/`disown` (`spec.md` §4.6): the host's side of the refcount.
/// `own` is a plain `Clone` (bump the `Rc` strong count); `disown` is
/// an explicit `drop` of the caller's handle.
pub fn own(v: &Value) -> Value {
    v.clone()
}

pub fn disown(v: Value) {
    drop(v);
}

/// Wrap a boxed native value as a host object of a previously
/// exported class (the Rust analogue of `eel_cv_new_noinit` +
/// in-place construction, `spec.md` §4.6).
pub fn new_host_object(
    vm: &Vm,
    class: ClassId,
    data: Box<dyn std::any::Any>,
    destruct: Option<crate::object::DestructFn>,
) -> EelResult<Rc<Object>> {
    let entry = vm.classes.get(class).ok_or_else(EelError::wrong_type)?;
    let destruct = destruct.or_else(|| {
        entry
            .destruct
            .clone()
            .map(|d| -> crate::object::DestructFn { Box::new(move |data| d(data)) })
    });
    Ok(Rc::new(Object::new_host(class, vm.id(), HostBody { data, destruct })))
}

/// `clone` (`spec.md` §4.6): a deep, one-level copy of a heap object.
/// Built-in container bodies clone structurally; host objects consult
/// the owning class's [`crate::class::CloneFn`].
pub fn clone_value(vm: &mut Vm, v: &Value) -> EelResult<Value> {
    let Value::ObjRef(o) = v else {
        return Ok(v.clone());
    };
    let cloned_body = match &*o.body.borrow() {
        ObjectBody::Str(b) => ObjectBody::Str(b.clone()),
        ObjectBody::DString(b) => ObjectBody::DString(b.clone()),
        ObjectBody::Array(items) => ObjectBody::Array(items.clone()),
        ObjectBody::Table(map) => ObjectBody::Table(map.clone()),
        ObjectBody::Vector(vec) => ObjectBody::Vector(vec.clone()),
        ObjectBody::Host(h) => {
            let entry = vm.classes.get(o.classid).ok_or_else(EelError::wrong_type)?;
            let clone_fn = entry.clone.clone().ok_or_else(EelError::not_implemented)?;
            let destruct = entry.destruct.clone();
            let data = clone_fn(h.data.as_ref());
            ObjectBody::Host(HostBody {
                data,
                destruct: destruct
                    .map(|d| -> crate::object::DestructFn { Box::new(move |data| d(data)) }),
            })
        }
        ObjectBody::Function(_) | ObjectBody::Module(_) => return Err(EelError::not_implemented()),
    };
    Ok(Value::ObjRef(Rc::new(Object::new(o.classid, o.vm_id, cloned_body))))
}

/// `cast` (`spec.md` §4.6/§4.7): explicit conversion through a class's
/// registered `cast` table — no dedicated bytecode opcode, since it is
/// a host-level coercion in the same family as [`v2l`]/[`v2d`] rather
/// than a binary operator.
pub fn cast(vm: &mut Vm, value: &Value, target: ClassId) -> EelResult<Value> {
    let f = vm
        .classes
        .lookup_cast(value.classid(), target)
        .ok_or_else(EelError::not_implemented)?;
    f(vm, value)
}

/// `perror` (`spec.md` §4.6): report the VM's pending exception, if
/// any, through the crate's own logging rather than directly to
/// stderr (`SPEC_FULL.md` ambient logging section) — grounded in the
/// teacher's `warn!`-on-unhandled-exception pattern.
pub fn perror(vm: &mut Vm, clear: bool) {
    if let Some(code) = vm.last_exception {
        error!("eel: unhandled exception: {}", vm.exceptions.description(code));
        if clear {
            vm.last_exception = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::ExecutionLimits;

    #[test]
    fn argf_builds_typed_argument_vector() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let args = argf(&mut vm, "ld", &[Value::Integer(5), Value::Integer(2)]).unwrap();
        assert_eq!(args, vec![Value::Integer(5), Value::Real(2.0)]);
    }

    #[test]
    fn own_disown_roundtrip_refcount() {
        let vm = Vm::open(ExecutionLimits::default());
        let arr = Value::ObjRef(vm.new_array(vec![]));
        let rc_before = match &arr {
            Value::ObjRef(o) => Rc::strong_count(o),
            _ => unreachable!(),
        };
        let owned = own(&arr);
        let rc_after = match &owned {
            Value::ObjRef(o) => Rc::strong_count(o),
            _ => unreachable!(),
        };
        assert_eq!(rc_after, rc_before + 1);
        disown(owned);
    }

    #[test]
    fn getsindex_roundtrips_through_table() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let table = Value::ObjRef(vm.new_table());
        setsindex(&mut vm, &table, "x", Value::Integer(42)).unwrap();
        assert_eq!(getsindex(&mut vm, &table, "x").unwrap(), Value::Integer(42));
    }

    #[test]
    fn calln_invokes_exported_function() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let module = create_module(&mut vm, "m", None);
        let f: HostFn = Rc::new(|vm: &mut Vm| {
            let frame = vm.current_frame_mut();
            frame.set(frame.resv as u8, Value::Integer(7))
        });
        export_cfunction(&vm, &module, "seven", 1, ArgSpec::fixed(0, 0), f).unwrap();
        let result = calln(&mut vm, &module, "seven", &[]).unwrap();
        assert_eq!(result, Some(Value::Integer(7)));
    }
}
