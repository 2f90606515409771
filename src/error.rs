//! Exception codes and the internal error type.
//!
//! EEL exposes exceptions to host code as small integers (`spec.md`
//! §6.3). Internally this crate uses a `thiserror`-derived enum so
//! normal `Result`/`?` propagation can carry structured context; the
//! ABI-facing integer is produced on demand via [`EelError::code`].

use std::fmt;

/// The closed set of built-in exception codes (`spec.md` §6.3),
/// plus a reserved range for host-registered additional codes.
///
/// Built-in codes are stable small integers starting at 0 so that a
/// module image compiled against one version of this crate keeps
/// meaning against another. Host-registered codes are allocated above
/// [`ExceptionCode::FIRST_DYNAMIC`] in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    None,
    Memory,
    WrongType,
    WrongIndex,
    LowIndex,
    HighIndex,
    CantIndex,
    CantWrite,
    CantRead,
    DivByZero,
    Overflow,
    Underflow,
    Arguments,
    FewArgs,
    ManyArgs,
    NeedString,
    NeedObject,
    NotImplemented,
    DeviceOpen,
    DeviceOpened,
    DeviceClosed,
    DeviceRead,
    DeviceWrite,
    DeviceError,
    Eof,
    ModuleInit,
    Refuse,
    BufOverflow,
    ThreadCreate,
    Constructor,
    WrongFormat,
    FewItems,
    NeedEven,
    /// A code registered at runtime by host-bound code, identified by
    /// its offset from [`ExceptionCode::FIRST_DYNAMIC`].
    Dynamic(u32),
}

impl ExceptionCode {
    /// First integer value available for host-registered codes.
    pub const FIRST_DYNAMIC: u32 = 1000;

    /// Map to the stable wire/ABI integer representation (`spec.md` §6.3).
    pub fn as_code(self) -> u32 {
        match self {
            ExceptionCode::None => 0,
            ExceptionCode::Memory => 1,
            ExceptionCode::WrongType => 2,
            ExceptionCode::WrongIndex => 3,
            ExceptionCode::LowIndex => 4,
            ExceptionCode::HighIndex => 5,
            ExceptionCode::CantIndex => 6,
            ExceptionCode::CantWrite => 7,
            ExceptionCode::CantRead => 8,
            ExceptionCode::DivByZero => 9,
            ExceptionCode::Overflow => 10,
            ExceptionCode::Underflow => 11,
            ExceptionCode::Arguments => 12,
            ExceptionCode::FewArgs => 13,
            ExceptionCode::ManyArgs => 14,
            ExceptionCode::NeedString => 15,
            ExceptionCode::NeedObject => 16,
            ExceptionCode::NotImplemented => 17,
            ExceptionCode::DeviceOpen => 18,
            ExceptionCode::DeviceOpened => 19,
            ExceptionCode::DeviceClosed => 20,
            ExceptionCode::DeviceRead => 21,
            ExceptionCode::DeviceWrite => 22,
            ExceptionCode::DeviceError => 23,
            ExceptionCode::Eof => 24,
            ExceptionCode::ModuleInit => 25,
            ExceptionCode::Refuse => 26,
            ExceptionCode::BufOverflow => 27,
            ExceptionCode::ThreadCreate => 28,
            ExceptionCode::Constructor => 29,
            ExceptionCode::WrongFormat => 30,
            ExceptionCode::FewItems => 31,
            ExceptionCode::NeedEven => 32,
            ExceptionCode::Dynamic(offset) => Self::FIRST_DYNAMIC + offset,
        }
    }

    /// Recover a code from its wire representation. Unknown small
    /// integers below [`ExceptionCode::FIRST_DYNAMIC`] are rejected;
    /// callers registering dynamic codes are expected to round-trip
    /// the `u32` they were handed back by
    /// [`crate::exception::ExceptionTable::register`].
    pub fn from_code(code: u32) -> Option<ExceptionCode> {
        if code >= Self::FIRST_DYNAMIC {
            return Some(ExceptionCode::Dynamic(code - Self::FIRST_DYNAMIC));
        }
        let c = match code {
            0 => ExceptionCode::None,
            1 => ExceptionCode::Memory,
            2 => ExceptionCode::WrongType,
            3 => ExceptionCode::WrongIndex,
            4 => ExceptionCode::LowIndex,
            5 => ExceptionCode::HighIndex,
            6 => ExceptionCode::CantIndex,
            7 => ExceptionCode::CantWrite,
            8 => ExceptionCode::CantRead,
            9 => ExceptionCode::DivByZero,
            10 => ExceptionCode::Overflow,
            11 => ExceptionCode::Underflow,
            12 => ExceptionCode::Arguments,
            13 => ExceptionCode::FewArgs,
            14 => ExceptionCode::ManyArgs,
            15 => ExceptionCode::NeedString,
            16 => ExceptionCode::NeedObject,
            17 => ExceptionCode::NotImplemented,
            18 => ExceptionCode::DeviceOpen,
            19 => ExceptionCode::DeviceOpened,
            20 => ExceptionCode::DeviceClosed,
            21 => ExceptionCode::DeviceRead,
            22 => ExceptionCode::DeviceWrite,
            23 => ExceptionCode::DeviceError,
            24 => ExceptionCode::Eof,
            25 => ExceptionCode::ModuleInit,
            26 => ExceptionCode::Refuse,
            27 => ExceptionCode::BufOverflow,
            28 => ExceptionCode::ThreadCreate,
            29 => ExceptionCode::Constructor,
            30 => ExceptionCode::WrongFormat,
            31 => ExceptionCode::FewItems,
            32 => ExceptionCode::NeedEven,
            _ => return None,
        };
        Some(c)
    }

    /// The built-in, non-overridable default description for this code.
    /// Host-registered codes have no built-in description; the per-VM
    /// [`crate::exception::ExceptionTable`] carries the one supplied at
    /// registration time instead.
    pub fn default_description(self) -> &'static str {
        match self {
            ExceptionCode::None => "no exception",
            ExceptionCode::Memory => "out of memory",
            ExceptionCode::WrongType => "wrong type",
            ExceptionCode::WrongIndex => "wrong index",
            ExceptionCode::LowIndex => "index too low",
            ExceptionCode::HighIndex => "index too high",
            ExceptionCode::CantIndex => "object is not indexable",
            ExceptionCode::CantWrite => "object is read-only",
            ExceptionCode::CantRead => "object is write-only",
            ExceptionCode::DivByZero => "division by zero",
            ExceptionCode::Overflow => "overflow",
            ExceptionCode::Underflow => "underflow",
            ExceptionCode::Arguments => "bad arguments",
            ExceptionCode::FewArgs => "too few arguments",
            ExceptionCode::ManyArgs => "too many arguments",
            ExceptionCode::NeedString => "string required",
            ExceptionCode::NeedObject => "object required",
            ExceptionCode::NotImplemented => "operation not implemented",
            ExceptionCode::DeviceOpen => "could not open device",
            ExceptionCode::DeviceOpened => "device already open",
            ExceptionCode::DeviceClosed => "device not open",
            ExceptionCode::DeviceRead => "device read error",
            ExceptionCode::DeviceWrite => "device write error",
            ExceptionCode::DeviceError => "device error",
            ExceptionCode::Eof => "end of file",
            ExceptionCode::ModuleInit => "module initialization failed",
            ExceptionCode::Refuse => "operation refused",
            ExceptionCode::BufOverflow => "buffer overflow",
            ExceptionCode::ThreadCreate => "could not create thread",
            ExceptionCode::Constructor => "constructor failed",
            ExceptionCode::WrongFormat => "wrong format",
            ExceptionCode::FewItems => "too few items",
            ExceptionCode::NeedEven => "even item count required",
            ExceptionCode::Dynamic(_) => "host exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_description())
    }
}

/// Internal error type. Every fallible operation in this crate returns
/// `Result<T, EelError>`; the exception code is always present and is
/// what ultimately crosses the host API boundary (`spec.md` §4.8).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}{}", detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct EelError {
    pub code: ExceptionCode,
    pub detail: Option<String>,
}

impl EelError {
    pub fn new(code: ExceptionCode) -> Self {
        EelError { code, detail: None }
    }

    pub fn with_detail(code: ExceptionCode, detail: impl Into<String>) -> Self {
        EelError {
            code,
            detail: Some(detail.into()),
        }
    }

    pub fn code(&self) -> u32 {
        self.code.as_code()
    }

    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self.code,
            ExceptionCode::Overflow | ExceptionCode::BufOverflow | ExceptionCode::Memory
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self.code,
            ExceptionCode::Arguments
                | ExceptionCode::FewArgs
                | ExceptionCode::ManyArgs
                | ExceptionCode::WrongType
                | ExceptionCode::WrongIndex
        )
    }

    pub fn category(&self) -> &'static str {
        match self.code {
            ExceptionCode::Memory
            | ExceptionCode::Overflow
            | ExceptionCode::Underflow
            | ExceptionCode::BufOverflow => "resource",
            ExceptionCode::WrongType
            | ExceptionCode::WrongIndex
            | ExceptionCode::LowIndex
            | ExceptionCode::HighIndex
            | ExceptionCode::Arguments
            | ExceptionCode::FewArgs
            | ExceptionCode::ManyArgs
            | ExceptionCode::NeedString
            | ExceptionCode::NeedObject
            | ExceptionCode::WrongFormat
            | ExceptionCode::FewItems
            | ExceptionCode::NeedEven => "usage",
            ExceptionCode::DeviceOpen
            | ExceptionCode::DeviceOpened
            | ExceptionCode::DeviceClosed
            | ExceptionCode::DeviceRead
            | ExceptionCode::DeviceWrite
            | ExceptionCode::DeviceError
            | ExceptionCode::Eof => "device",
            ExceptionCode::CantIndex | ExceptionCode::CantWrite | ExceptionCode::CantRead => {
                "access"
            }
            ExceptionCode::DivByZero => "arithmetic",
            ExceptionCode::ModuleInit | ExceptionCode::Refuse | ExceptionCode::Constructor => {
                "lifecycle"
            }
            ExceptionCode::ThreadCreate => "system",
            ExceptionCode::NotImplemented => "dispatch",
            ExceptionCode::None => "none",
            ExceptionCode::Dynamic(_) => "host",
        }
    }
}

macro_rules! ctor {
    ($name:ident, $code:ident) => {
        pub fn $name() -> EelError {
            EelError::new(ExceptionCode::$code)
        }
    };
}

impl EelError {
    ctor!(memory, Memory);
    ctor!(wrong_type, WrongType);
    ctor!(wrong_index, WrongIndex);
    ctor!(low_index, LowIndex);
    ctor!(high_index, HighIndex);
    ctor!(cant_index, CantIndex);
    ctor!(cant_write, CantWrite);
    ctor!(cant_read, CantRead);
    ctor!(div_by_zero, DivByZero);
    ctor!(overflow, Overflow);
    ctor!(underflow, Underflow);
    ctor!(arguments, Arguments);
    ctor!(few_args, FewArgs);
    ctor!(many_args, ManyArgs);
    ctor!(need_string, NeedString);
    ctor!(need_object, NeedObject);
    ctor!(not_implemented, NotImplemented);
    ctor!(module_init, ModuleInit);
    ctor!(refuse, Refuse);
    ctor!(buf_overflow, BufOverflow);
    ctor!(constructor, Constructor);
    ctor!(wrong_format, WrongFormat);
    ctor!(few_items, FewItems);
    ctor!(need_even, NeedEven);
}

pub type EelResult<T> = Result<T, EelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for code in 0..=32u32 {
            let c = ExceptionCode::from_code(code).unwrap();
            assert_eq!(c.as_code(), code);
        }
    }

    #[test]
    fn dynamic_code_roundtrip() {
        let c = ExceptionCode::from_code(ExceptionCode::FIRST_DYNAMIC + 7).unwrap();
        assert_eq!(c, ExceptionCode::Dynamic(7));
        assert_eq!(c.as_code(), ExceptionCode::FIRST_DYNAMIC + 7);
    }

    #[test]
    fn unknown_small_code_rejected() {
        assert!(ExceptionCode::from_code(900).is_none());
    }

    #[test]
    fn categories() {
        assert_eq!(EelError::div_by_zero().category(), "arithmetic");
        assert_eq!(EelError::few_args().category(), "usage");
        assert!(EelError::overflow().is_resource_limit());
        assert!(EelError::wrong_type().is_user_error());
    }
}
