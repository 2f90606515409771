//! The VM itself (`spec.md` §4.5): register file, call frames, class
//! registry, string pool, loaded modules, and the bytecode dispatch
//! loop. Grounded in the teacher's `execution_engine.rs` top-level
//! engine struct, generalized from Neo's fixed stack-item type set to
//! EEL's classid-dispatched metamethod model.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use log::{debug, trace, warn};

use crate::class::{ClassRegistry, Metamethod};
use crate::container::{table, vector, Indexable};
use crate::error::{EelError, EelResult, ExceptionCode};
use crate::exception::{ExceptionTable, TryHandler, TryStack};
use crate::frame::Frame;
use crate::function::{ArgSpec, FunctionBody, FunctionImpl};
use crate::ids::{ClassId, VmId};
use crate::instruction::Instruction;
use crate::module::ModuleBody;
use crate::object::{Object, ObjectBody};
use crate::string_pool::StringPool;
use crate::value::Value;

/// Resource limits a host may configure at `Vm::open` (`SPEC_FULL.md`
/// "Configuration"). Not present in `spec.md`'s text; required for
/// any register-VM reimplementation to bound its own native recursion
/// instead of crashing on malformed or runaway bytecode.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_call_depth: usize,
    pub max_registers_per_frame: u32,
    pub max_handler_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits {
            max_call_depth: 256,
            max_registers_per_frame: 256,
            max_handler_depth: 64,
        }
    }
}

enum ControlFlow {
    Continue,
    Return(Option<Value>),
}

static NEXT_VM_ID: AtomicU64 = AtomicU64::new(1);

/// Bumped on builds whose module image format changes (`spec.md`
/// §6.1's major.minor.micro).
pub const VERSION: (u32, u32, u32) = (0, 1, 0);

pub struct Vm {
    id: VmId,
    pub classes: ClassRegistry,
    pub strings: StringPool,
    pub exceptions: ExceptionTable,
    pub limits: ExecutionLimits,
    frames: Vec<Frame>,
    try_stack: TryStack,
    /// The exception caught by the most recently entered `catch`
    /// block, readable from bytecode/host code while handling it.
    /// A pragmatic, documented simplification in place of a dedicated
    /// "load caught exception" opcode (`spec.md` leaves the exact
    /// instruction set at the design level only).
    pub last_exception: Option<ExceptionCode>,
    /// Loaded modules, in load order, so `close` can unload them in
    /// reverse order (`spec.md` §4.9).
    modules: Vec<Rc<Object>>,
}

impl Vm {
    /// `eel_open` (`spec.md` §4.6).
    pub fn open(limits: ExecutionLimits) -> Vm {
        let id = VmId(NEXT_VM_ID.fetch_add(1, AtomicOrdering::Relaxed));
        let mut vm = Vm {
            id,
            classes: ClassRegistry::new(),
            strings: StringPool::new(),
            exceptions: ExceptionTable::new(),
            limits,
            frames: Vec::new(),
            try_stack: TryStack::new(),
            last_exception: None,
            modules: Vec::new(),
        };
        crate::builtins::register_builtins(&mut vm.classes);
        debug!("eel vm {} opened", id.0);
        vm
    }

    pub fn id(&self) -> VmId {
        self.id
    }

    /// The frame a host callback is currently running in — how
    /// `HostFn` implementations read their arguments and write their
    /// result (`spec.md` §4.5's register-file convention).
    pub fn current_frame(&self) -> &Frame {
        self.frames.last().expect("host function called outside a frame")
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("host function called outside a frame")
    }

    pub fn version() -> (u32, u32, u32) {
        VERSION
    }

    /// `eel_close`: unload modules in reverse registration order
    /// (`spec.md` §4.9).
    pub fn close(&mut self) {
        while let Some(module_obj) = self.modules.pop() {
            let unload = {
                let mut body = module_obj.body.borrow_mut();
                match &mut *body {
                    ObjectBody::Module(m) => m.unload.take(),
                    _ => None,
                }
            };
            if let Some(mut unload) = unload {
                if let Err(e) = unload(self, true) {
                    warn!("module unload during close reported an error: {e}");
                }
            }
        }
        debug!("eel vm {} closed", self.id.0);
    }

    pub fn register_module(&mut self, module_obj: Rc<Object>) {
        self.modules.push(module_obj);
    }

    /// Explicit host unload request; the module may refuse
    /// (`spec.md` §4.9).
    pub fn unload_module(&mut self, module_obj: &Rc<Object>) -> EelResult<()> {
        let pos = self
            .modules
            .iter()
            .position(|m| Rc::ptr_eq(m, module_obj))
            .ok_or_else(EelError::wrong_type)?;
        let unload = {
            let mut body = module_obj.body.borrow_mut();
            match &mut *body {
                ObjectBody::Module(m) => m.unload.take(),
                _ => None,
            }
        };
        if let Some(mut unload) = unload {
            match unload(self, false) {
                Ok(()) => {
                    self.modules.remove(pos);
                    Ok(())
                }
                Err(e) => {
                    // Refused: put the callback back so a future
                    // attempt (or final close) can invoke it again.
                    if let ObjectBody::Module(m) = &mut *module_obj.body.borrow_mut() {
                        m.unload = Some(unload);
                    }
                    Err(e)
                }
            }
        } else {
            self.modules.remove(pos);
            Ok(())
        }
    }

    // ---- calling convention (spec.md §4.5/§3.6) ----

    /// Call a function object with the given arguments, returning its
    /// single optional result.
    pub fn call_function(&mut self, func_obj: &Rc<Object>, args: &[Value]) -> EelResult<Option<Value>> {
        if self.frames.len() >= self.limits.max_call_depth {
            return Err(EelError::overflow());
        }
        if func_obj.classid != ClassId::FUNCTION {
            return Err(EelError::wrong_type());
        }
        let func_body = match &*func_obj.body.borrow() {
            ObjectBody::Function(fb) => fb.clone(),
            _ => return Err(EelError::wrong_type()),
        };
        func_body.args.check(args.len())?;

        match func_body.imp.clone() {
            FunctionImpl::Host(f) => self.call_host(func_obj.clone(), &func_body, f, args),
            FunctionImpl::Bytecode { code, num_registers } => {
                self.call_bytecode(func_obj.clone(), &func_body, code, num_registers, args)
            }
        }
    }

    fn call_host(
        &mut self,
        func_obj: Rc<Object>,
        func_body: &FunctionBody,
        f: crate::function::HostFn,
        args: &[Value],
    ) -> EelResult<Option<Value>> {
        let nregs = (args.len() + 1).max(1) as u32;
        let resv = nregs as usize - 1;
        let mut frame = Frame::new(func_obj, nregs, args.len(), resv);
        for (i, a) in args.iter().enumerate() {
            frame.set(i as u8, a.clone())?;
        }
        self.frames.push(frame);
        let result = f(self);
        let frame = self.frames.pop().expect("frame pushed above");
        result?;
        if func_body.results == 1 {
            Ok(Some(frame.registers.get(resv).cloned().unwrap_or(Value::Nil)))
        } else {
            Ok(None)
        }
    }

    fn call_bytecode(
        &mut self,
        func_obj: Rc<Object>,
        func_body: &FunctionBody,
        code: Rc<[u8]>,
        num_registers: u32,
        args: &[Value],
    ) -> EelResult<Option<Value>> {
        let num_registers = num_registers.max(args.len() as u32 + 1);
        if num_registers > self.limits.max_registers_per_frame {
            return Err(EelError::overflow());
        }
        let resv = num_registers as usize - 1;
        let mut frame = Frame::new(func_obj, num_registers, args.len(), resv);
        for (i, a) in args.iter().enumerate() {
            frame.set(i as u8, a.clone())?;
        }
        self.frames.push(frame);
        let depth = self.frames.len() - 1;
        let result = self.run_frame(depth, &code);
        self.frames.pop();
        let value = result?;
        if func_body.results == 1 {
            Ok(Some(value.unwrap_or(Value::Nil)))
        } else {
            Ok(None)
        }
    }

    fn run_frame(&mut self, depth: usize, code: &[u8]) -> EelResult<Option<Value>> {
        loop {
            let pc = self.frames[depth].pc;
            let (instr, next_pc) = Instruction::decode(code, pc)?;
            self.frames[depth].pc = next_pc;
            trace!("vm {} frame {} pc {}: {}", self.id.0, depth, pc, instr);
            match self.exec(depth, instr) {
                Ok(ControlFlow::Continue) => continue,
                Ok(ControlFlow::Return(v)) => return Ok(v),
                Err(e) => {
                    let catches_here = matches!(self.try_stack.last(), Some(h) if h.frame_depth == depth);
                    if catches_here {
                        let handler = self.try_stack.pop().unwrap();
                        self.last_exception = Some(e.code);
                        self.frames[depth].pc = handler.catch_pc;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn exec(&mut self, depth: usize, instr: Instruction) -> EelResult<ControlFlow> {
        use Instruction::*;
        match instr {
            LoadNil { dst } => {
                self.frames[depth].set(dst, Value::Nil)?;
            }
            LoadBool { dst, value } => {
                self.frames[depth].set(dst, Value::Boolean(value))?;
            }
            LoadInt { dst, value } => {
                self.frames[depth].set(dst, Value::Integer(value))?;
            }
            LoadConst { dst, index } => {
                let v = self.load_constant(depth, index)?;
                self.frames[depth].set(dst, v)?;
            }
            Move { dst, src } => {
                let v = self.frames[depth].get(src)?.clone();
                self.frames[depth].set(dst, v)?;
            }
            GetIndex { dst, obj, key } => {
                let o = self.frames[depth].get(obj)?.clone();
                let k = self.frames[depth].get(key)?.clone();
                let v = self.op_getindex(&o, &k)?;
                self.frames[depth].set(dst, v)?;
            }
            SetIndex { obj, key, value } => {
                let o = self.frames[depth].get(obj)?.clone();
                let k = self.frames[depth].get(key)?.clone();
                let v = self.frames[depth].get(value)?.clone();
                self.op_setindex(&o, &k, v)?;
            }
            Delete { obj, key } => {
                let o = self.frames[depth].get(obj)?.clone();
                let k = self.frames[depth].get(key)?.clone();
                self.op_delete(&o, &k)?;
            }
            Add { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Add)?,
            Sub { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Sub)?,
            Mul { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Mul)?,
            Div { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Div)?,
            Mod { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Mod)?,
            BAnd { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::BAnd)?,
            BOr { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::BOr)?,
            BXor { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::BXor)?,
            Shl { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Shl)?,
            Shr { dst, a, b } => self.binary_arith(depth, dst, a, b, Metamethod::Shr)?,
            Neg { dst, a } => self.unary_arith(depth, dst, a, Metamethod::Neg)?,
            BNot { dst, a } => self.unary_arith(depth, dst, a, Metamethod::BNot)?,
            CmpEq { dst, a, b } => {
                let (av, bv) = (self.frames[depth].get(a)?.clone(), self.frames[depth].get(b)?.clone());
                let eq = self.values_equal(&av, &bv)?;
                self.frames[depth].set(dst, Value::Boolean(eq))?;
            }
            CmpLt { dst, a, b } => {
                let (av, bv) = (self.frames[depth].get(a)?.clone(), self.frames[depth].get(b)?.clone());
                let ord = self.compare_values(&av, &bv)?;
                self.frames[depth].set(dst, Value::Boolean(ord == std::cmp::Ordering::Less))?;
            }
            CmpLe { dst, a, b } => {
                let (av, bv) = (self.frames[depth].get(a)?.clone(), self.frames[depth].get(b)?.clone());
                let ord = self.compare_values(&av, &bv)?;
                self.frames[depth].set(dst, Value::Boolean(ord != std::cmp::Ordering::Greater))?;
            }
            Not { dst, a } => {
                let v = self.frames[depth].get(a)?.clone();
                self.frames[depth].set(dst, Value::Boolean(!truthy(&v)))?;
            }
            Jump { offset } => {
                self.frames[depth].pc = apply_offset(self.frames[depth].pc, offset)?;
            }
            JumpIfFalse { cond, offset } => {
                let v = self.frames[depth].get(cond)?.clone();
                if !truthy(&v) {
                    self.frames[depth].pc = apply_offset(self.frames[depth].pc, offset)?;
                }
            }
            Call { func, base, nargs, nres } => {
                self.exec_call(depth, func, base, nargs, nres)?;
            }
            Return => {
                let resv = self.frames[depth].resv;
                let v = self.frames[depth].registers.get(resv).cloned();
                return Ok(ControlFlow::Return(v));
            }
            Try { catch_offset } => {
                let catch_pc = apply_offset(self.frames[depth].pc, catch_offset)?;
                self.try_stack
                    .push(TryHandler { frame_depth: depth, catch_pc }, self.limits.max_handler_depth)?;
            }
            Untry => {
                self.try_stack.pop();
            }
            Throw { value } => {
                let v = self.frames[depth].get(value)?.clone();
                return Err(value_to_exception(&v)?);
            }
            TupleUnpack { base, count } => {
                self.exec_tuple_unpack(depth, base, count)?;
            }
            In { dst, a, b } => {
                let (av, bv) = (self.frames[depth].get(a)?.clone(), self.frames[depth].get(b)?.clone());
                let result = crate::metamethod::dispatch_binary(self, Metamethod::In, &av, &bv)?;
                self.frames[depth].set(dst, result)?;
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn exec_call(&mut self, depth: usize, func: u8, base: u8, nargs: u8, nres: u8) -> EelResult<()> {
        let func_val = self.frames[depth].get(func)?.clone();
        let mut args = Vec::with_capacity(nargs as usize);
        for i in 0..nargs {
            args.push(self.frames[depth].get(base + i)?.clone());
        }
        let result = match &func_val {
            Value::ObjRef(o) if o.classid == ClassId::FUNCTION => {
                self.call_function(&o.clone(), &args)?
            }
            _ => {
                let f = self
                    .classes
                    .lookup_metamethod(func_val.classid(), Metamethod::Call)
                    .ok_or_else(EelError::need_object)?;
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(func_val.clone());
                call_args.extend(args.iter().cloned());
                Some(f(self, &call_args)?)
            }
        };
        if nres == 1 {
            self.frames[depth].set(base, result.unwrap_or(Value::Nil))?;
        }
        Ok(())
    }

    fn exec_tuple_unpack(&mut self, depth: usize, base: u8, count: u8) -> EelResult<()> {
        let tuple = self.frames[depth].get(base)?.clone();
        let items: Vec<Value> = match &tuple {
            Value::ObjRef(o) if o.classid == ClassId::ARRAY => match &*o.body.borrow() {
                ObjectBody::Array(items) => items.clone(),
                _ => unreachable!(),
            },
            _ => return Err(EelError::wrong_type()),
        };
        for i in 0..count {
            let v = items.get(i as usize).cloned().unwrap_or(Value::Nil);
            self.frames[depth].set(base + i, v)?;
        }
        Ok(())
    }

    fn load_constant(&mut self, depth: usize, index: u16) -> EelResult<Value> {
        let func_obj = self.frames[depth].function.clone();
        let module = match &*func_obj.body.borrow() {
            ObjectBody::Function(fb) => fb.module.upgrade(),
            _ => None,
        }
        .ok_or_else(EelError::wrong_type)?;
        let body = module.body.borrow();
        match &*body {
            ObjectBody::Module(m) => m
                .constants
                .get(index as usize)
                .cloned()
                .ok_or_else(EelError::wrong_index),
            _ => Err(EelError::wrong_type()),
        }
    }

    // ---- indexing (spec.md §4.4, metamethod fallback per §4.7) ----

    pub fn op_getindex(&mut self, obj: &Value, key: &Value) -> EelResult<Value> {
        self.check_same_vm(obj)?;
        self.check_same_vm(key)?;
        match obj {
            Value::ObjRef(o) => match o.classid {
                ClassId::ARRAY | ClassId::TABLE | ClassId::DSTRING | ClassId::STRING => {
                    let o = o.clone();
                    o.get_index(self, key)
                }
                c if vector::is_vector_class(c) => {
                    let o = o.clone();
                    o.get_index(self, key)
                }
                _ => crate::metamethod::dispatch_binary(self, Metamethod::GetIndex, obj, key),
            },
            _ => Err(EelError::cant_index()),
        }
    }

    pub fn op_setindex(&mut self, obj: &Value, key: &Value, value: Value) -> EelResult<()> {
        self.check_same_vm(obj)?;
        self.check_same_vm(key)?;
        self.check_same_vm(&value)?;
        match obj {
            Value::ObjRef(o) => match o.classid {
                ClassId::ARRAY | ClassId::TABLE | ClassId::DSTRING => {
                    let o = o.clone();
                    o.set_index(self, key, value)
                }
                ClassId::STRING => Err(EelError::cant_write()),
                c if vector::is_vector_class(c) => {
                    let o = o.clone();
                    o.set_index(self, key, value)
                }
                _ => {
                    crate::metamethod::dispatch_binary(self, Metamethod::SetIndex, obj, key)?;
                    Ok(())
                }
            },
            _ => Err(EelError::cant_write()),
        }
    }

    pub fn op_delete(&mut self, obj: &Value, key: &Value) -> EelResult<()> {
        match obj {
            Value::ObjRef(o) if o.classid == ClassId::TABLE => {
                let o = o.clone();
                table::delete(&o, self, key)
            }
            Value::ObjRef(o) => match crate::metamethod::dispatch_binary(self, Metamethod::Delete, obj, key) {
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            },
            _ => Err(EelError::cant_index()),
        }
    }

    /// `spec.md` §5: object references from two different VMs must
    /// never interact.
    fn check_same_vm(&self, v: &Value) -> EelResult<()> {
        if let Value::ObjRef(o) = v {
            if o.vm_id != self.id {
                return Err(EelError::wrong_type());
            }
        }
        Ok(())
    }

    // ---- arithmetic (spec.md §4.5 numeric semantics, §4.7 dispatch) ----

    fn binary_arith(&mut self, depth: usize, dst: u8, a: u8, b: u8, mm: Metamethod) -> EelResult<()> {
        let av = self.frames[depth].get(a)?.clone();
        let bv = self.frames[depth].get(b)?.clone();
        let result = self.arith(mm, &av, &bv)?;
        self.frames[depth].set(dst, result)
    }

    fn unary_arith(&mut self, depth: usize, dst: u8, a: u8, mm: Metamethod) -> EelResult<()> {
        let av = self.frames[depth].get(a)?.clone();
        let result = match &av {
            Value::Integer(i) => match mm {
                Metamethod::Neg => Value::Integer(i.wrapping_neg()),
                Metamethod::BNot => Value::Integer(!i),
                _ => unreachable!(),
            },
            Value::Real(r) if mm == Metamethod::Neg => Value::Real(-r),
            _ => crate::metamethod::dispatch_unary(self, mm, &av)?,
        };
        self.frames[depth].set(dst, result)
    }

    fn arith(&mut self, mm: Metamethod, a: &Value, b: &Value) -> EelResult<Value> {
        self.check_same_vm(a)?;
        self.check_same_vm(b)?;
        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => integer_arith(mm, *x, *y),
            (Value::Integer(_), Value::Real(_))
            | (Value::Real(_), Value::Integer(_))
            | (Value::Real(_), Value::Real(_)) => real_arith(mm, as_f64(a), as_f64(b)),
            _ => crate::metamethod::dispatch_binary(self, mm, a, b),
        }
    }

    pub(crate) fn values_equal(&mut self, a: &Value, b: &Value) -> EelResult<bool> {
        if a == b {
            return Ok(true);
        }
        match (a, b) {
            (Value::ObjRef(oa), Value::ObjRef(ob)) if oa.classid == ob.classid => {
                match crate::metamethod::dispatch_binary(self, Metamethod::Compare, a, b) {
                    Ok(Value::Integer(0)) => Ok(true),
                    Ok(_) => Ok(false),
                    Err(e) if e.code == ExceptionCode::NotImplemented => Ok(false),
                    Err(e) => Err(e),
                }
            }
            _ => Ok(false),
        }
    }

    fn compare_values(&mut self, a: &Value, b: &Value) -> EelResult<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
            (Value::Integer(_), Value::Real(_))
            | (Value::Real(_), Value::Integer(_))
            | (Value::Real(_), Value::Real(_)) => {
                as_f64(a).partial_cmp(&as_f64(b)).ok_or_else(EelError::wrong_type)
            }
            _ => match crate::metamethod::dispatch_binary(self, Metamethod::Compare, a, b)? {
                Value::Integer(i) if i < 0 => Ok(Ordering::Less),
                Value::Integer(0) => Ok(Ordering::Equal),
                Value::Integer(_) => Ok(Ordering::Greater),
                _ => Err(EelError::wrong_type()),
            },
        }
    }

    // ---- string helpers (spec.md §4.3/§4.6) ----

    pub fn intern_string(&mut self, bytes: &[u8]) -> Rc<Object> {
        self.strings.intern(bytes, self.id)
    }

    pub fn new_dstring(&self, bytes: Vec<u8>) -> Rc<Object> {
        Rc::new(Object::new_dstring(self.id, bytes))
    }

    pub fn new_array(&self, items: Vec<Value>) -> Rc<Object> {
        Rc::new(Object::new_array(self.id, items))
    }

    pub fn new_table(&self) -> Rc<Object> {
        Rc::new(Object::new_table(self.id))
    }

    pub fn new_vector(&self, elem: crate::object::VectorElem, len: usize) -> Rc<Object> {
        Rc::new(Object::new_vector(self.id, elem, len))
    }

    pub fn new_module(&self, name: &str) -> Rc<Object> {
        Rc::new(Object::new_module(self.id, ModuleBody::new(Rc::from(name.as_bytes()))))
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.close();
    }
}

fn truthy(v: &Value) -> bool {
    !matches!(v, Value::Nil | Value::Boolean(false))
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Integer(i) => *i as f64,
        Value::Real(r) => *r,
        _ => f64::NAN,
    }
}

fn apply_offset(pc: usize, offset: i32) -> EelResult<usize> {
    let new_pc = pc as i64 + offset as i64;
    if new_pc < 0 {
        return Err(EelError::wrong_index());
    }
    Ok(new_pc as usize)
}

fn value_to_exception(v: &Value) -> EelResult<EelError> {
    match v {
        Value::Integer(code) => {
            let code = ExceptionCode::from_code(*code as u32).ok_or_else(EelError::wrong_format)?;
            Ok(EelError::new(code))
        }
        _ => Err(EelError::wrong_type()),
    }
}

/// Integer arithmetic wraps modulo 2^32 (`spec.md` §4.5); division and
/// modulo by zero raise `divbyzero`. Bitwise ops are defined only for
/// integers.
fn integer_arith(mm: Metamethod, x: i32, y: i32) -> EelResult<Value> {
    let v = match mm {
        Metamethod::Add => x.wrapping_add(y),
        Metamethod::Sub => x.wrapping_sub(y),
        Metamethod::Mul => x.wrapping_mul(y),
        Metamethod::Div => {
            if y == 0 {
                return Err(EelError::div_by_zero());
            }
            x.wrapping_div(y)
        }
        Metamethod::Mod => {
            if y == 0 {
                return Err(EelError::div_by_zero());
            }
            x.wrapping_rem(y)
        }
        Metamethod::BAnd => x & y,
        Metamethod::BOr => x | y,
        Metamethod::BXor => x ^ y,
        Metamethod::Shl => x.wrapping_shl(y as u32 & 31),
        Metamethod::Shr => ((x as u32).wrapping_shr(y as u32 & 31)) as i32,
        _ => return Err(EelError::not_implemented()),
    };
    Ok(Value::Integer(v))
}

/// Real arithmetic follows IEEE 754 silently: no error on overflow or
/// division by zero, `inf`/`nan` propagate as values (`spec.md` §4.5).
/// Bitwise operators are not defined on reals.
fn real_arith(mm: Metamethod, x: f64, y: f64) -> EelResult<Value> {
    let v = match mm {
        Metamethod::Add => x + y,
        Metamethod::Sub => x - y,
        Metamethod::Mul => x * y,
        Metamethod::Div => x / y,
        Metamethod::Mod => x % y,
        Metamethod::BAnd
        | Metamethod::BOr
        | Metamethod::BXor
        | Metamethod::Shl
        | Metamethod::Shr => return Err(EelError::not_implemented()),
        _ => return Err(EelError::not_implemented()),
    };
    Ok(Value::Real(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::OpCode;

    fn code(bytes: &[u8]) -> Rc<[u8]> {
        Rc::from(bytes)
    }

    fn make_function(vm: &Vm, code_bytes: Rc<[u8]>, num_registers: u32, results: u8) -> Rc<Object> {
        let body = FunctionBody::new_bytecode(
            None,
            ArgSpec::fixed(0, 0),
            results,
            code_bytes,
            num_registers,
            std::rc::Weak::new(),
        );
        Rc::new(Object::new_function(vm.id(), body))
    }

    #[test]
    fn integer_overflow_wraps() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let v = vm.arith(Metamethod::Add, &Value::Integer(0x7FFFFFFF), &Value::Integer(1)).unwrap();
        assert_eq!(v, Value::Integer(i32::MIN));
    }

    #[test]
    fn division_by_zero_raises() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let err = vm.arith(Metamethod::Div, &Value::Integer(1), &Value::Integer(0)).unwrap_err();
        assert_eq!(err.code, ExceptionCode::DivByZero);
    }

    #[test]
    fn mixed_int_real_promotes_to_real() {
        let mut vm = Vm::open(ExecutionLimits::default());
        let v = vm.arith(Metamethod::Add, &Value::Integer(1), &Value::Real(0.5)).unwrap();
        assert_eq!(v, Value::Real(1.5));
    }

    #[test]
    fn run_simple_bytecode_add_and_return() {
        let vm = Vm::open(ExecutionLimits::default());
        let mut vm = vm;
        let bytes = vec![
            OpCode::LoadInt as u8, 0, 2, 0, 0, 0,
            OpCode::LoadInt as u8, 1, 3, 0, 0, 0,
            OpCode::Add as u8, 2, 0, 1,
            OpCode::Return as u8,
        ];
        let func = make_function(&vm, code(&bytes), 3, 1);
        let result = vm.call_function(&func, &[]).unwrap();
        assert_eq!(result, Some(Value::Integer(5)));
    }

    #[test]
    fn try_throw_catch_roundtrip() {
        let vm = Vm::open(ExecutionLimits::default());
        let mut vm = vm;
        // try { throw divbyzero } -> catch: load a marker value and return it.
        let divbyzero_code = ExceptionCode::DivByZero.as_code() as i32;
        let le = divbyzero_code.to_le_bytes();
        let mut bytes = vec![OpCode::Try as u8];
        // catch_offset computed after assembling the "try body" below.
        let try_body = vec![
            OpCode::LoadInt as u8, 0, le[0], le[1], le[2], le[3],
            OpCode::Throw as u8, 0,
        ];
        let catch_body = vec![OpCode::LoadInt as u8, 1, 42, 0, 0, 0, OpCode::Return as u8];
        // offset is relative to pc right after the Try instruction's own operand.
        let offset = try_body.len() as i32;
        bytes.extend_from_slice(&offset.to_le_bytes());
        bytes.extend_from_slice(&try_body);
        bytes.extend_from_slice(&catch_body);
        let func = make_function(&vm, code(&bytes), 2, 1);
        let result = vm.call_function(&func, &[]).unwrap();
        assert_eq!(result, Some(Value::Integer(42)));
        assert_eq!(vm.last_exception, Some(ExceptionCode::DivByZero));
    }

    #[test]
    fn call_depth_limit_enforced() {
        let limits = ExecutionLimits { max_call_depth: 2, ..ExecutionLimits::default() };
        let vm = Vm::open(limits);
        let mut vm = vm;
        vm.frames.push(Frame::new(make_function(&vm, code(&[]), 1, 0), 1, 0, 0));
        vm.frames.push(Frame::new(make_function(&vm, code(&[]), 1, 0), 1, 0, 0));
        let func = make_function(&vm, code(&[OpCode::Return as u8]), 1, 0);
        assert!(vm.call_function(&func, &[]).is_err());
    }

    #[test]
    fn cross_vm_objects_rejected() {
        let mut vm_a = Vm::open(ExecutionLimits::default());
        let vm_b = Vm::open(ExecutionLimits::default());
        let arr_a = Value::ObjRef(vm_a.new_array(vec![]));
        let arr_b = Value::ObjRef(vm_b.new_array(vec![]));
        assert!(vm_a.op_getindex(&arr_a, &Value::Integer(0)).is_err());
        assert!(vm_a.check_same_vm(&arr_b).is_err());
    }
}
