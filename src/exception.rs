//! Exception protocol (`spec.md` §4.8/§6.3): per-VM name/description
//! table for the built-in codes plus host-registered additional
//! codes, and the `try`/`untry` handler stack the interpreter unwinds
//! against.

use crate::error::ExceptionCode;

/// A `try` handler pushed by the `try` instruction and popped by
/// `untry` (`spec.md` §4.5/§4.8). `throw` unwinds frames until it
/// finds the nearest one still on the stack; if none remain, the
/// exception propagates out to the host's `call`/`calln`/`callf`.
#[derive(Debug, Clone, Copy)]
pub struct TryHandler {
    /// Index into the VM's frame stack this handler belongs to —
    /// frames above this one are discarded on unwind.
    pub frame_depth: usize,
    /// Bytecode offset of the catch target within that frame.
    pub catch_pc: usize,
}

#[derive(Debug, Default)]
pub struct TryStack {
    handlers: Vec<TryHandler>,
}

impl TryStack {
    pub fn new() -> Self {
        TryStack { handlers: Vec::new() }
    }

    pub fn push(&mut self, handler: TryHandler, limit: usize) -> Result<(), crate::error::EelError> {
        if self.handlers.len() >= limit {
            return Err(crate::error::EelError::overflow());
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TryHandler> {
        self.handlers.pop()
    }

    pub fn last(&self) -> Option<&TryHandler> {
        self.handlers.last()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Per-VM table mapping exception codes to names/descriptions
/// (`spec.md` §4.8: "per-VM name/description table; bindings may
/// register additional codes at runtime").
#[derive(Debug, Default)]
pub struct ExceptionTable {
    dynamic: Vec<(String, String)>,
}

impl ExceptionTable {
    pub fn new() -> Self {
        ExceptionTable { dynamic: Vec::new() }
    }

    /// Register an additional exception code. Returns the base offset
    /// assigned, as `spec.md` §4.8 specifies; the caller adds this
    /// offset to whatever local numbering scheme it wants for its own
    /// sub-codes.
    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>) -> u32 {
        let offset = self.dynamic.len() as u32;
        self.dynamic.push((name.into(), description.into()));
        offset
    }

    pub fn name(&self, code: ExceptionCode) -> String {
        match code {
            ExceptionCode::Dynamic(offset) => self
                .dynamic
                .get(offset as usize)
                .map(|(n, _)| n.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            other => format!("{other:?}"),
        }
    }

    pub fn description(&self, code: ExceptionCode) -> String {
        match code {
            ExceptionCode::Dynamic(offset) => self
                .dynamic
                .get(offset as usize)
                .map(|(_, d)| d.clone())
                .unwrap_or_else(|| "unknown host exception".to_string()),
            other => other.default_description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_registration_returns_sequential_offsets() {
        let mut table = ExceptionTable::new();
        let a = table.register("net_timeout", "network operation timed out");
        let b = table.register("net_refused", "connection refused");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.name(ExceptionCode::Dynamic(1)), "net_refused");
    }

    #[test]
    fn try_stack_unwinds_to_nearest_handler() {
        let mut stack = TryStack::new();
        stack.push(TryHandler { frame_depth: 0, catch_pc: 10 }, 8).unwrap();
        stack.push(TryHandler { frame_depth: 2, catch_pc: 20 }, 8).unwrap();
        let h = stack.pop().unwrap();
        assert_eq!(h.catch_pc, 20);
        let h = stack.pop().unwrap();
        assert_eq!(h.catch_pc, 10);
        assert!(stack.is_empty());
    }

    #[test]
    fn try_stack_respects_limit() {
        let mut stack = TryStack::new();
        for _ in 0..4 {
            stack.push(TryHandler { frame_depth: 0, catch_pc: 0 }, 4).unwrap();
        }
        assert!(stack.push(TryHandler { frame_depth: 0, catch_pc: 0 }, 4).is_err());
    }
}
