//! Function objects (`spec.md` §3.6).

use std::rc::Rc;

use crate::error::EelResult;
use crate::object::BackRef;
use crate::vm::Vm;

/// Required/optional/tuple argument counts and result arity, exactly
/// as `spec.md` §3.6 and the `argf`/`call` contract of §4.6 describe.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub required: u8,
    pub optional: u8,
    /// 0 means no trailing tuple. Otherwise the element-group size of
    /// a trailing variadic tuple following `required + optional` fixed
    /// arguments: the actual argument count beyond the fixed ones must
    /// be a whole multiple of this group size (`spec.md` §4.5: `n` is
    /// legal iff `required <= n <= required + optional + k*tuple` for
    /// some integer `k >= 0`).
    pub tuple: u8,
}

impl ArgSpec {
    pub fn fixed(required: u8, optional: u8) -> Self {
        ArgSpec {
            required,
            optional,
            tuple: 0,
        }
    }

    pub fn with_tuple(required: u8, optional: u8, group_size: u8) -> Self {
        ArgSpec {
            required,
            optional,
            tuple: group_size,
        }
    }

    /// Validate an actual argument count, returning `fewargs`/
    /// `manyargs` on mismatch (`spec.md` §6.3).
    pub fn check(&self, argc: usize) -> EelResult<()> {
        if argc < self.required as usize {
            return Err(crate::error::EelError::few_args());
        }
        let fixed = (self.required + self.optional) as usize;
        if self.tuple == 0 {
            if argc > fixed {
                return Err(crate::error::EelError::many_args());
            }
            return Ok(());
        }
        if argc < fixed {
            return Ok(());
        }
        if (argc - fixed) % self.tuple as usize != 0 {
            return Err(crate::error::EelError::many_args());
        }
        Ok(())
    }
}

/// A host callback implementing a function body. Takes the VM (so it
/// can read `argv`/`argc` and write `resv`, per the register-file
/// convention of `spec.md` §4.5) and returns the exception, if any.
pub type HostFn = Rc<dyn Fn(&mut Vm) -> EelResult<()>>;

#[derive(Clone)]
pub enum FunctionImpl {
    Bytecode { code: Rc<[u8]>, num_registers: u32 },
    Host(HostFn),
}

impl std::fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionImpl::Bytecode { code, num_registers } => f
                .debug_struct("Bytecode")
                .field("code_len", &code.len())
                .field("num_registers", num_registers)
                .finish(),
            FunctionImpl::Host(_) => f.debug_tuple("Host").field(&"<fn>").finish(),
        }
    }
}

/// Private data of a `function` class object.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub name: Option<Rc<[u8]>>,
    pub args: ArgSpec,
    /// 0 or 1, per `spec.md` §3.6.
    pub results: u8,
    pub imp: FunctionImpl,
    /// Non-owning: the module outlives its functions, never the other
    /// way around (`spec.md` §3.6).
    pub module: BackRef,
}

impl FunctionBody {
    pub fn new_bytecode(
        name: Option<Rc<[u8]>>,
        args: ArgSpec,
        results: u8,
        code: Rc<[u8]>,
        num_registers: u32,
        module: BackRef,
    ) -> Self {
        FunctionBody {
            name,
            args,
            results,
            imp: FunctionImpl::Bytecode { code, num_registers },
            module,
        }
    }

    pub fn new_host(
        name: Option<Rc<[u8]>>,
        args: ArgSpec,
        results: u8,
        f: HostFn,
        module: BackRef,
    ) -> Self {
        FunctionBody {
            name,
            args,
            results,
            imp: FunctionImpl::Host(f),
            module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argspec_fixed() {
        let spec = ArgSpec::fixed(1, 2);
        assert!(spec.check(0).is_err());
        assert!(spec.check(1).is_ok());
        assert!(spec.check(3).is_ok());
        assert!(spec.check(4).is_err());
    }

    #[test]
    fn argspec_tuple_requires_group_multiple() {
        let spec = ArgSpec::with_tuple(1, 0, 3);
        assert!(spec.check(0).is_err());
        assert!(spec.check(1).is_ok());
        assert!(spec.check(2).is_err());
        assert!(spec.check(4).is_ok());
        assert!(spec.check(7).is_ok());
        assert!(spec.check(8).is_err());
    }
}
