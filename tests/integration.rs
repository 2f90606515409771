//! End-to-end tests driving the runtime only through its public host
//! API (`spec.md` §8's scenario list), the same way the teacher's
//! `tests/` directory exercises the VM only through
//! `ApplicationEngine`/`ExecutionEngine` public methods.

use std::rc::Rc;

use eel_vm::host_api::{self, LoadFlags};
use eel_vm::image::{Image, ImageConstant, ImageExport, ImageFunction, Version};
use eel_vm::instruction::OpCode;
use eel_vm::{ArgSpec, ExecutionLimits, Value, Vm};

fn open() -> Vm {
    Vm::open(ExecutionLimits::default())
}

/// Scenario: a host builds a module image in memory (as a compiler
/// front-end would), loads it, and calls one of its exports.
#[test]
fn load_module_image_and_call_export() {
    let mut vm = open();
    let image = Image {
        version: Version { major: 0, minor: 1, micro: 0 },
        names: vec!["double".to_string()],
        constants: vec![ImageConstant::Integer(2)],
        functions: vec![ImageFunction {
            name_index: Some(0),
            reqargs: 1,
            optargs: 0,
            tuparg: 0,
            results: 1,
            num_registers: 3,
            code: vec![
                OpCode::LoadConst as u8, 1, 0, 0,
                OpCode::Mul as u8, 2, 0, 1,
                OpCode::Return as u8,
            ],
        }],
        exports: vec![ImageExport { name_index: 0, function_index: 0 }],
    };
    let bytes = eel_vm::image::write_image(&image);

    let module = host_api::load(&mut vm, "math", &bytes, LoadFlags::default()).unwrap();
    let result = host_api::calln(&mut vm, &module, "double", &[Value::Integer(21)]).unwrap();
    assert_eq!(result, Some(Value::Integer(42)));
}

/// Scenario: a host registers its own module and native function, then
/// calls it via `argf`/`callf` the way `eel_export_cfunction`/`eel_callf`
/// are meant to be used together.
#[test]
fn host_module_export_cfunction_and_callf() {
    let mut vm = open();
    let module = host_api::create_module(&mut vm, "strings", None);
    let f: eel_vm::function::HostFn = Rc::new(|vm: &mut Vm| {
        let (a, b) = {
            let frame = vm.current_frame();
            (frame.get(0)?.clone(), frame.get(1)?.clone())
        };
        let sa = host_api::v2s(&a)?;
        let sb = host_api::v2s(&b)?;
        let mut joined = sa.to_vec();
        joined.extend_from_slice(&sb);
        let result = host_api::s2v(vm, &joined);
        let frame = vm.current_frame_mut();
        let resv = frame.resv as u8;
        frame.set(resv, result)
    });
    let func =
        host_api::export_cfunction(&vm, &module, "concat", 1, ArgSpec::fixed(2, 0), f).unwrap();

    let a = host_api::s2v(&mut vm, b"foo");
    let b = host_api::s2v(&mut vm, b"bar");
    let args = host_api::argf(&mut vm, "ss", &[a, b]).unwrap();
    let result = host_api::call(&mut vm, &func, &args).unwrap().unwrap();
    assert_eq!(&*host_api::v2s(&result).unwrap(), b"foobar");
}

/// Scenario: table/array/vector property access through the
/// `getsindex`/`setsindex`/`getlindex`/`setlindex`/`length` surface.
#[test]
fn container_indexing_through_host_api() {
    let mut vm = open();

    let table = Value::ObjRef(vm.new_table());
    host_api::setsindex(&mut vm, &table, "name", host_api::s2v(&mut vm, b"eel")).unwrap();
    let name = host_api::getsindex(&mut vm, &table, "name").unwrap();
    assert_eq!(&*host_api::v2s(&name).unwrap(), b"eel");

    let array = Value::ObjRef(vm.new_array(vec![Value::Integer(1), Value::Integer(2)]));
    host_api::setlindex(&mut vm, &array, 0, Value::Integer(99)).unwrap();
    assert_eq!(host_api::getlindex(&mut vm, &array, 0).unwrap(), Value::Integer(99));
    assert_eq!(host_api::length(&array).unwrap(), 2);

    let vector = Value::ObjRef(vm.new_vector(eel_vm::VectorElem::S32, 4));
    host_api::setlindex(&mut vm, &vector, 1, Value::Integer(-7)).unwrap();
    assert_eq!(host_api::getlindex(&mut vm, &vector, 1).unwrap(), Value::Integer(-7));
    assert_eq!(host_api::length(&vector).unwrap(), 4);
}

/// Scenario: a host-defined class supplies an `add` metamethod, picked
/// up by bytecode's generic `Add` opcode (`spec.md` §4.7 dispatch).
#[test]
fn custom_class_add_metamethod_dispatch() {
    let mut vm = open();
    let point =
        host_api::export_class(&mut vm, "point", Some(eel_vm::ClassId::OBJREF), None, None, None)
            .unwrap();
    vm.classes
        .set_metamethod(
            point,
            eel_vm::Metamethod::Add,
            Rc::new(|vm: &mut Vm, args: &[Value]| {
                let (x, y) = match (&args[0], &args[1]) {
                    (Value::ObjRef(a), Value::ObjRef(b)) => {
                        let ax = match &*a.body.borrow() {
                            eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
                            _ => unreachable!(),
                        };
                        let bx = match &*b.body.borrow() {
                            eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
                            _ => unreachable!(),
                        };
                        (ax, bx)
                    }
                    _ => unreachable!(),
                };
                Ok(Value::ObjRef(host_api::new_host_object(vm, point, Box::new(x + y), None)?))
            }),
        )
        .unwrap();

    let a = Value::ObjRef(host_api::new_host_object(&vm, point, Box::new(3), None).unwrap());
    let b = Value::ObjRef(host_api::new_host_object(&vm, point, Box::new(4), None).unwrap());

    // r0 = a, r1 = b, r2 = r0 + r1, return r2
    let code = vec![OpCode::Add as u8, 2, 0, 1, OpCode::Return as u8];
    let func_body = eel_vm::FunctionBody::new_bytecode(
        None,
        ArgSpec::fixed(2, 0),
        1,
        Rc::from(code.as_slice()),
        3,
        std::rc::Weak::new(),
    );
    let func = Rc::new(eel_vm::Object::new_function(vm.id(), func_body));

    let result = host_api::call(&mut vm, &func, &[a, b]).unwrap().unwrap();
    let sum = match &result {
        Value::ObjRef(o) => match &*o.body.borrow() {
            eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    assert_eq!(sum, 7);
}

/// Scenario: an uncaught exception propagates out of `call` to the
/// host, which reports it via `perror` (`spec.md` §4.6/§4.8).
#[test]
fn uncaught_exception_reaches_host_and_perror_reports_it() {
    let mut vm = open();
    let code = vec![
        OpCode::LoadInt as u8, 0, 1, 0, 0, 0,
        OpCode::LoadInt as u8, 1, 0, 0, 0, 0,
        OpCode::Div as u8, 2, 0, 1,
        OpCode::Return as u8,
    ];
    let func_body = eel_vm::FunctionBody::new_bytecode(
        None,
        ArgSpec::fixed(0, 0),
        1,
        Rc::from(code.as_slice()),
        3,
        std::rc::Weak::new(),
    );
    let func = Rc::new(eel_vm::Object::new_function(vm.id(), func_body));

    let err = host_api::call(&mut vm, &func, &[]).unwrap_err();
    assert_eq!(err.code, eel_vm::ExceptionCode::DivByZero);

    vm.last_exception = Some(err.code);
    host_api::perror(&mut vm, true);
    assert!(vm.last_exception.is_none());
}

/// Scenario: objects allocated by one VM must never be usable from
/// another (`spec.md` §5).
#[test]
fn objects_do_not_cross_vm_boundaries() {
    let mut vm_a = open();
    let mut vm_b = open();
    let table_a = Value::ObjRef(vm_a.new_table());
    let foreign_value = host_api::s2v(&mut vm_b, b"x");

    assert!(host_api::setsindex(&mut vm_a, &table_a, "k", foreign_value).is_err());
    assert!(host_api::setsindex(&mut vm_a, &table_a, "k", Value::Integer(1)).is_ok());
}

/// Scenario: a module may refuse an explicit unload request, then
/// succeed on a later attempt (`spec.md` §4.9).
#[test]
fn module_unload_can_refuse_then_succeed() {
    let mut vm = open();
    let refused_once = Rc::new(std::cell::Cell::new(false));
    let flag = refused_once.clone();
    let module = host_api::create_module(
        &mut vm,
        "device",
        Some(Box::new(move |_vm: &mut Vm, closing: bool| {
            if closing {
                return Ok(());
            }
            if !flag.get() {
                flag.set(true);
                return Err(eel_vm::EelError::refuse());
            }
            Ok(())
        })),
    );

    assert!(vm.unload_module(&module).is_err());
    assert!(vm.unload_module(&module).is_ok());
}

/// Scenario: interning the same bytes twice returns the same string
/// object (`spec.md` §4.3).
#[test]
fn string_pool_interns_identical_bytes() {
    let mut vm = open();
    let a = vm.intern_string(b"hello");
    let b = vm.intern_string(b"hello");
    assert!(Rc::ptr_eq(&a, &b));
}

/// Scenario: `try`/`throw`/`untry` unwinds to the nearest handler and
/// leaves `last_exception` set for the catch block to inspect.
#[test]
fn try_throw_catch_through_call() {
    let mut vm = open();
    let divbyzero = eel_vm::ExceptionCode::DivByZero.as_code() as i32;
    let le = divbyzero.to_le_bytes();
    let try_body = vec![
        OpCode::LoadInt as u8, 0, le[0], le[1], le[2], le[3],
        OpCode::Throw as u8, 0,
    ];
    let catch_body = vec![OpCode::LoadInt as u8, 1, 42, 0, 0, 0, OpCode::Return as u8];
    let offset = try_body.len() as i32;
    let mut code = vec![OpCode::Try as u8];
    code.extend_from_slice(&offset.to_le_bytes());
    code.extend_from_slice(&try_body);
    code.extend_from_slice(&catch_body);

    let func_body = eel_vm::FunctionBody::new_bytecode(
        None,
        ArgSpec::fixed(0, 0),
        1,
        Rc::from(code.as_slice()),
        2,
        std::rc::Weak::new(),
    );
    let func = Rc::new(eel_vm::Object::new_function(vm.id(), func_body));

    let result = host_api::call(&mut vm, &func, &[]).unwrap();
    assert_eq!(result, Some(Value::Integer(42)));
    assert_eq!(vm.last_exception, Some(eel_vm::ExceptionCode::DivByZero));
}

/// Scenario: `clone_value` copies a built-in container structurally
/// (independent storage) and a host object through the owning class's
/// `clone` callback (`spec.md` §4.6 `clone`).
#[test]
fn clone_value_copies_structurally_and_via_class_hook() {
    let mut vm = open();

    let array = Value::ObjRef(vm.new_array(vec![Value::Integer(1), Value::Integer(2)]));
    let array_clone = host_api::clone_value(&mut vm, &array).unwrap();
    host_api::setlindex(&mut vm, &array_clone, 0, Value::Integer(99)).unwrap();
    assert_eq!(host_api::getlindex(&mut vm, &array, 0).unwrap(), Value::Integer(1));
    assert_eq!(host_api::getlindex(&mut vm, &array_clone, 0).unwrap(), Value::Integer(99));

    let counter = host_api::export_class(
        &mut vm,
        "counter",
        Some(eel_vm::ClassId::OBJREF),
        None,
        None,
        Some(Rc::new(|data: &dyn std::any::Any| {
            Box::new(*data.downcast_ref::<i32>().unwrap()) as Box<dyn std::any::Any>
        })),
    )
    .unwrap();
    let original = Value::ObjRef(host_api::new_host_object(&vm, counter, Box::new(5i32), None).unwrap());
    let cloned = host_api::clone_value(&mut vm, &original).unwrap();
    let value_of = |v: &Value| match v {
        Value::ObjRef(o) => match &*o.body.borrow() {
            eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    assert_eq!(value_of(&cloned), 5);
    match (&original, &cloned) {
        (Value::ObjRef(a), Value::ObjRef(b)) => assert!(!Rc::ptr_eq(a, b)),
        _ => unreachable!(),
    }
}

/// Scenario: `cast` dispatches through a class's registered cast table
/// rather than any bytecode opcode (`spec.md` §4.6/§4.7).
#[test]
fn cast_dispatches_through_class_cast_table() {
    let mut vm = open();
    let celsius =
        host_api::export_class(&mut vm, "celsius", Some(eel_vm::ClassId::OBJREF), None, None, None)
            .unwrap();
    vm.classes
        .set_cast(
            celsius,
            eel_vm::ClassId::INTEGER,
            Rc::new(|_vm: &mut Vm, v: &Value| match v {
                Value::ObjRef(o) => match &*o.body.borrow() {
                    eel_vm::ObjectBody::Host(h) => {
                        Ok(Value::Integer(*h.data.downcast_ref::<i32>().unwrap() * 9 / 5 + 32))
                    }
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            }),
        )
        .unwrap();

    let temp = Value::ObjRef(host_api::new_host_object(&vm, celsius, Box::new(100i32), None).unwrap());
    let fahrenheit = host_api::cast(&mut vm, &temp, eel_vm::ClassId::INTEGER).unwrap();
    assert_eq!(fahrenheit, Value::Integer(212));
}

/// Scenario: two distinct host object instances that a class's `hash`
/// metamethod treats as equal collapse to one table slot, the same way
/// a built-in key type would (`spec.md` §3.3 `hash` metamethod).
#[test]
fn table_key_hash_metamethod_collapses_equal_instances() {
    let mut vm = open();
    let boxed =
        host_api::export_class(&mut vm, "boxed", Some(eel_vm::ClassId::OBJREF), None, None, None)
            .unwrap();
    let value_of = |v: &Value| match v {
        Value::ObjRef(o) => match &*o.body.borrow() {
            eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    vm.classes
        .set_metamethod(
            boxed,
            eel_vm::Metamethod::Hash,
            Rc::new(move |_vm: &mut Vm, args: &[Value]| {
                Ok(Value::Integer(match &args[0] {
                    Value::ObjRef(o) => match &*o.body.borrow() {
                        eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                }))
            }),
        )
        .unwrap();
    vm.classes
        .set_metamethod(
            boxed,
            eel_vm::Metamethod::Compare,
            Rc::new(|_vm: &mut Vm, args: &[Value]| {
                let a = match &args[0] {
                    Value::ObjRef(o) => match &*o.body.borrow() {
                        eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                };
                let b = match &args[1] {
                    Value::ObjRef(o) => match &*o.body.borrow() {
                        eel_vm::ObjectBody::Host(h) => *h.data.downcast_ref::<i32>().unwrap(),
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                };
                Ok(Value::Integer((a - b).signum()))
            }),
        )
        .unwrap();

    let table = Value::ObjRef(vm.new_table());
    let key_a = Value::ObjRef(host_api::new_host_object(&vm, boxed, Box::new(5i32), None).unwrap());
    let key_b = Value::ObjRef(host_api::new_host_object(&vm, boxed, Box::new(5i32), None).unwrap());
    assert_ne!(value_of(&key_a), -1);

    vm.op_setindex(&table, &key_a, Value::Integer(100)).unwrap();
    vm.op_setindex(&table, &key_b, Value::Integer(200)).unwrap();

    assert_eq!(host_api::length(&table).unwrap(), 1);
    assert_eq!(vm.op_getindex(&table, &key_a).unwrap(), Value::Integer(200));
}

/// Scenario: the bytecode `in` opcode falls back to a class's `in`
/// metamethod when the container isn't a built-in (`spec.md` §4.7).
#[test]
fn in_opcode_dispatches_to_class_in_metamethod() {
    let mut vm = open();
    let bag = host_api::export_class(&mut vm, "bag", Some(eel_vm::ClassId::OBJREF), None, None, None)
        .unwrap();
    vm.classes
        .set_metamethod(
            bag,
            eel_vm::Metamethod::In,
            Rc::new(|_vm: &mut Vm, args: &[Value]| {
                let needle = match &args[0] {
                    Value::Integer(i) => *i,
                    _ => unreachable!(),
                };
                Ok(Value::Boolean(needle == 7))
            }),
        )
        .unwrap();

    let container = Value::ObjRef(host_api::new_host_object(&vm, bag, Box::new(()), None).unwrap());

    // r0 = container (argument), r1 = 7, dst r1 = (r1 in r0)
    let code = vec![
        OpCode::LoadInt as u8, 1, 7, 0, 0, 0,
        OpCode::In as u8, 1, 1, 0,
        OpCode::Return as u8,
    ];
    let func_body = eel_vm::FunctionBody::new_bytecode(
        None,
        ArgSpec::fixed(1, 0),
        1,
        Rc::from(code.as_slice()),
        2,
        std::rc::Weak::new(),
    );
    let func = Rc::new(eel_vm::Object::new_function(vm.id(), func_body));

    let result = host_api::call(&mut vm, &func, &[container]).unwrap();
    assert_eq!(result, Some(Value::Boolean(true)));
}

/// Scenario: the `call` opcode falls back to a non-function class's
/// `call` metamethod instead of requiring `ClassId::FUNCTION`
/// (`spec.md` §4.7).
#[test]
fn call_opcode_dispatches_to_class_call_metamethod() {
    let mut vm = open();
    let callable =
        host_api::export_class(&mut vm, "callable", Some(eel_vm::ClassId::OBJREF), None, None, None)
            .unwrap();
    vm.classes
        .set_metamethod(
            callable,
            eel_vm::Metamethod::Call,
            Rc::new(|_vm: &mut Vm, args: &[Value]| {
                let a = match &args[1] {
                    Value::Integer(i) => *i,
                    _ => unreachable!(),
                };
                Ok(Value::Integer(a * 2))
            }),
        )
        .unwrap();

    let callee = Value::ObjRef(host_api::new_host_object(&vm, callable, Box::new(()), None).unwrap());

    // r0 = callee (argument), r1 = 21 (argument); call r0 with base r1, nargs 1
    let code = vec![
        OpCode::Call as u8, 0, 1, 1, 1,
        OpCode::Return as u8,
    ];
    let func_body = eel_vm::FunctionBody::new_bytecode(
        None,
        ArgSpec::fixed(2, 0),
        1,
        Rc::from(code.as_slice()),
        2,
        std::rc::Weak::new(),
    );
    let outer = Rc::new(eel_vm::Object::new_function(vm.id(), func_body));

    let result = host_api::call(&mut vm, &outer, &[callee, Value::Integer(21)]).unwrap().unwrap();
    assert_eq!(result, Value::Integer(42));
}
