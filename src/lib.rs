//! # EEL: an embeddable scripting language runtime
//!
//! A register-based bytecode virtual machine and object/value runtime
//! for the EEL embeddable scripting language. This crate implements
//! the runtime only: the value model, object heap, class registry
//! with metamethod dispatch, exception protocol, module loader, and
//! the host-facing API bindings and executives are built against. The
//! compiler front-end and the `eel`/`eelbox`/`eelium` executives are
//! out of scope (see `DESIGN.md`).
//!
//! ## Architecture
//!
//! - **`Value`**: the six-variant tagged value (`nil`, `boolean`,
//!   `integer`, `real`, `classid`, `objref`).
//! - **`Object`**: the heap object behind every `objref` — one
//!   `RefCell`-guarded body per class kind.
//! - **`ClassRegistry`**: class names, single-inheritance parent
//!   chain, and the closed set of metamethods.
//! - **`Vm`**: the register file, call frames, try/throw handler
//!   stack, string pool, loaded modules, and the bytecode dispatch
//!   loop.
//! - **`host_api`**: the only surface a host embedding this runtime is
//!   meant to use.
//!
//! ## Example
//!
//! ```rust,no_run
//! use eel_vm::vm::{ExecutionLimits, Vm};
//! use eel_vm::host_api;
//!
//! let mut vm = Vm::open(ExecutionLimits::default());
//! let module = host_api::create_module(&mut vm, "demo", None);
//! // ... export_cfunction / export_class / export_constants, then call.
//! host_api::perror(&mut vm, true);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Reserved built-in class registration.
pub mod builtins;
/// Indexable container kinds: array, table, vector, dstring.
pub mod container;
/// Class registry, metamethod table, cast table.
pub mod class;
/// Exception codes and the internal error type.
pub mod error;
/// Try/throw/untry handler stack and the per-VM exception name table.
pub mod exception;
/// Call frames / register windows.
pub mod frame;
/// Function objects and argument-count validation.
pub mod function;
/// The host-facing API — the only surface bindings and executives use.
pub mod host_api;
/// Small newtype identifiers (`ClassId`, `VmId`).
pub mod ids;
/// Module image binary format (reader/writer).
pub mod image;
/// Bytecode instruction encoding and disassembly.
pub mod instruction;
/// Module loading and the init/unload lifecycle.
pub mod loader;
/// Metamethod dispatch (left-operand-first, single-retry).
pub mod metamethod;
/// Module objects: constant pool, function table, exports.
pub mod module;
/// The heap object type and its per-class private bodies.
pub mod object;
/// Interned immutable string pool.
pub mod string_pool;
/// The tagged-union `Value` type.
pub mod value;
/// The VM: register file, call frames, bytecode dispatch loop.
pub mod vm;

pub use class::{ClassDestructFn, ClassRegistry, CloneFn, Metamethod};
pub use error::{EelError, EelResult, ExceptionCode};
pub use exception::{ExceptionTable, TryHandler, TryStack};
pub use frame::Frame;
pub use function::{ArgSpec, FunctionBody};
pub use host_api::LoadFlags;
pub use ids::{ClassId, VmId};
pub use instruction::{Instruction, OpCode};
pub use module::ModuleBody;
pub use object::{Object, ObjectBody, VectorBody, VectorElem};
pub use string_pool::StringPool;
pub use value::Value;
pub use vm::{ExecutionLimits, Vm};
