//! Module objects (`spec.md` §3.5/§4.9).

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::EelResult;
use crate::value::Value;
use crate::vm::Vm;

/// Called when a module is torn down. `closing` is true for normal VM
/// teardown (the module must release its state and succeed); false
/// means this is an explicit host `unload` request, which the module
/// may decline by returning `ExceptionCode::Refuse` (`spec.md` §4.9).
pub type UnloadFn = Box<dyn FnMut(&mut Vm, bool) -> EelResult<()>>;

/// Private data of a `module` class object.
pub struct ModuleBody {
    pub name: Rc<[u8]>,
    pub constants: Vec<Value>,
    /// Every function defined by this module, in function-table order
    /// (`spec.md` §6.1's function table).
    pub functions: Vec<Rc<crate::object::Object>>,
    /// Ordered name -> function-table index. Order is registration
    /// order (first write keeps its position), matching `spec.md`
    /// §3.5's "ordered exports map".
    pub exports: IndexMap<Rc<[u8]>, usize>,
    pub unload: Option<UnloadFn>,
}

impl std::fmt::Debug for ModuleBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBody")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("constants", &self.constants.len())
            .field("functions", &self.functions.len())
            .field("exports", &self.exports.len())
            .finish()
    }
}

impl ModuleBody {
    pub fn new(name: Rc<[u8]>) -> Self {
        ModuleBody {
            name,
            constants: Vec::new(),
            functions: Vec::new(),
            exports: IndexMap::new(),
            unload: None,
        }
    }

    /// Register a function in the function table and return its index.
    pub fn add_function(&mut self, func: Rc<crate::object::Object>) -> usize {
        self.functions.push(func);
        self.functions.len() - 1
    }

    /// Export a name bound to a function-table index. First write
    /// keeps its position on re-export (`spec.md` §3.5's ordering
    /// guarantee, same discipline as `container/table.rs`).
    pub fn export(&mut self, name: Rc<[u8]>, func_index: usize) {
        self.exports.entry(name).or_insert(func_index);
    }

    pub fn lookup_export(&self, name: &[u8]) -> Option<usize> {
        self.exports.iter().find(|(n, _)| n.as_ref() == name).map(|(_, i)| *i)
    }

    /// Ordered name -> function-table index listing, used by the
    /// loader's list-symbols debug flag (`spec.md` §4.6).
    pub fn symbol_listing(&self) -> Vec<(Rc<[u8]>, usize)> {
        self.exports.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_order_preserved() {
        let mut m = ModuleBody::new(Rc::from(b"m".as_slice()));
        m.export(Rc::from(b"z".as_slice()), 0);
        m.export(Rc::from(b"a".as_slice()), 1);
        m.export(Rc::from(b"m_fn".as_slice()), 2);
        let names: Vec<_> = m
            .symbol_listing()
            .into_iter()
            .map(|(n, _)| String::from_utf8(n.to_vec()).unwrap())
            .collect();
        assert_eq!(names, vec!["z", "a", "m_fn"]);
    }

    #[test]
    fn first_export_wins_position() {
        let mut m = ModuleBody::new(Rc::from(b"m".as_slice()));
        m.export(Rc::from(b"a".as_slice()), 0);
        m.export(Rc::from(b"a".as_slice()), 99);
        assert_eq!(m.lookup_export(b"a"), Some(0));
    }
}
