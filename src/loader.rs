//! Module loader (`spec.md` §4.9, §6.4 note): turns a serialised
//! image (`crate::image`) into a live `module` object registered with
//! the VM, wires each function's back-pointer to its owning module,
//! and honours the `list-symbols`/`list-disassembly` debug flags.

use std::rc::Rc;

use log::{debug, info};

use crate::error::{EelError, EelResult};
use crate::function::{ArgSpec, FunctionBody};
use crate::host_api::LoadFlags;
use crate::image::{self, Image};
use crate::instruction::Instruction;
use crate::module::ModuleBody;
use crate::object::Object;
use crate::vm::Vm;

pub fn load_image(vm: &mut Vm, name: &str, bytes: &[u8], flags: LoadFlags) -> EelResult<Rc<Object>> {
    let img = image::read_image(bytes)?;
    check_version_compatible(&img)?;

    let module_obj = Rc::new(Object::new_module(vm.id(), ModuleBody::new(Rc::from(name.as_bytes()))));

    let constants = img
        .constants
        .iter()
        .map(|c| image::resolve_constant(vm, &img.names, c))
        .collect::<EelResult<Vec<_>>>()?;

    {
        let module_ref = &module_obj;
        let mut body = module_ref.body.borrow_mut();
        let m = match &mut *body {
            crate::object::ObjectBody::Module(m) => m,
            _ => unreachable!(),
        };
        m.constants = constants;
    }

    for (i, f) in img.functions.iter().enumerate() {
        let func_name = f
            .name_index
            .and_then(|idx| img.names.get(idx as usize))
            .map(|n| Rc::from(n.as_bytes()));
        let args = if f.tuparg > 0 {
            ArgSpec::with_tuple(f.reqargs, f.optargs, f.tuparg)
        } else {
            ArgSpec::fixed(f.reqargs, f.optargs)
        };
        let body = FunctionBody::new_bytecode(
            func_name,
            args,
            f.results,
            Rc::from(f.code.as_slice()),
            f.num_registers,
            Rc::downgrade(&module_obj),
        );
        let func_obj = Rc::new(Object::new_function(vm.id(), body));

        if flags.list_disassembly {
            log_disassembly(i, &f.code);
        }

        let mut mbody = module_obj.body.borrow_mut();
        let m = match &mut *mbody {
            crate::object::ObjectBody::Module(m) => m,
            _ => unreachable!(),
        };
        let idx = m.add_function(func_obj);
        debug_assert_eq!(idx, i);
    }

    {
        let mut mbody = module_obj.body.borrow_mut();
        let m = match &mut *mbody {
            crate::object::ObjectBody::Module(m) => m,
            _ => unreachable!(),
        };
        for e in &img.exports {
            let name = img.names.get(e.name_index as usize).ok_or_else(EelError::wrong_index)?;
            m.export(Rc::from(name.as_bytes()), e.function_index as usize);
        }
    }

    if flags.list_symbols {
        let listing = match &*module_obj.body.borrow() {
            crate::object::ObjectBody::Module(m) => m.symbol_listing(),
            _ => unreachable!(),
        };
        for (name, idx) in listing {
            info!("eel: export {} -> function {}", String::from_utf8_lossy(&name), idx);
        }
    }

    Ok(module_obj)
}

fn check_version_compatible(img: &Image) -> EelResult<()> {
    let (major, minor, _) = Vm::version();
    if img.version.major as u32 != major || img.version.minor as u32 > minor {
        return Err(EelError::wrong_format());
    }
    Ok(())
}

fn log_disassembly(func_index: usize, code: &[u8]) {
    let mut pc = 0;
    debug!("eel: disassembly of function {func_index}");
    while pc < code.len() {
        match Instruction::decode(code, pc) {
            Ok((instr, next)) => {
                debug!("  {pc:>4}: {instr}");
                pc = next;
            }
            Err(_) => break,
        }
    }
}
