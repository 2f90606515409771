//! Call frames / register windows (`spec.md` §4.5).
//!
//! Each frame owns a flat register array distinct from the object
//! heap, with `argv` (arg base), `resv` (result slot index), and
//! `argc` (actual argument count) exactly as specified.

use std::rc::Rc;

use crate::error::{EelError, EelResult};
use crate::object::Object;
use crate::value::Value;

pub struct Frame {
    pub function: Rc<Object>,
    pub registers: Vec<Value>,
    pub pc: usize,
    /// Register index where the incoming arguments begin.
    pub argv: usize,
    /// Actual number of arguments passed by the caller.
    pub argc: usize,
    /// Register index the single optional return value is written to.
    pub resv: usize,
}

impl Frame {
    pub fn new(function: Rc<Object>, num_registers: u32, argc: usize, resv: usize) -> Frame {
        Frame {
            function,
            registers: vec![Value::Nil; num_registers as usize],
            pc: 0,
            argv: 0,
            argc,
            resv,
        }
    }

    pub fn get(&self, reg: u8) -> EelResult<&Value> {
        self.registers.get(reg as usize).ok_or_else(EelError::wrong_index)
    }

    pub fn set(&mut self, reg: u8, value: Value) -> EelResult<()> {
        let slot = self
            .registers
            .get_mut(reg as usize)
            .ok_or_else(EelError::wrong_index)?;
        *slot = value;
        Ok(())
    }

    /// The argument at position `i` (0-based, relative to `argv`), or
    /// `nil` if `i >= argc` (fewer args than the slot requires is
    /// handled by `ArgSpec::check` earlier; reading within the
    /// optional range just yields nil by the register file's default
    /// fill).
    pub fn arg(&self, i: usize) -> EelResult<&Value> {
        self.registers
            .get(self.argv + i)
            .ok_or_else(EelError::wrong_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{ArgSpec, FunctionBody};
    use crate::ids::VmId;

    fn dummy_function() -> Rc<Object> {
        let body = FunctionBody::new_bytecode(
            None,
            ArgSpec::fixed(0, 0),
            0,
            Rc::from([].as_slice()),
            4,
            std::rc::Weak::new(),
        );
        Rc::new(Object::new_function(VmId(1), body))
    }

    #[test]
    fn register_bounds_checked() {
        let mut frame = Frame::new(dummy_function(), 4, 0, 0);
        assert!(frame.set(3, Value::Integer(1)).is_ok());
        assert!(frame.set(4, Value::Integer(1)).is_err());
        assert!(frame.get(4).is_err());
    }

    #[test]
    fn args_readable_via_argv() {
        let mut frame = Frame::new(dummy_function(), 4, 2, 0);
        frame.set(0, Value::Integer(10)).unwrap();
        frame.set(1, Value::Integer(20)).unwrap();
        assert_eq!(frame.arg(0).unwrap(), &Value::Integer(10));
        assert_eq!(frame.arg(1).unwrap(), &Value::Integer(20));
    }
}
