//! Class registry (`spec.md` §3.3/§4.1): names, single-inheritance
//! parent chain, cast table, and the closed set of metamethods.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{EelError, EelResult};
use crate::ids::ClassId;
use crate::value::Value;
use crate::vm::Vm;

/// The closed set of metamethods a class may define (`spec.md` §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metamethod {
    GetIndex,
    SetIndex,
    In,
    Length,
    Compare,
    Hash,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    BNot,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Cast,
    Call,
    Delete,
}

impl Metamethod {
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Metamethod::Add
                | Metamethod::Sub
                | Metamethod::Mul
                | Metamethod::Div
                | Metamethod::Mod
                | Metamethod::BAnd
                | Metamethod::BOr
                | Metamethod::BXor
                | Metamethod::Shl
                | Metamethod::Shr
                | Metamethod::Compare
                | Metamethod::In
        )
    }
}

/// A metamethod implementation. Operands are passed as a slice so one
/// signature covers unary (`neg`, `bnot`, `length`), binary
/// (arithmetic, `compare`, `in`), and variadic (`call`, `getindex` on
/// multi-dimensional indexing) metamethods alike.
pub type MetamethodFn = Rc<dyn Fn(&mut Vm, &[Value]) -> EelResult<Value>>;

pub type CastFn = Rc<dyn Fn(&mut Vm, &Value) -> EelResult<Value>>;

/// Host constructor/destructor hooks for a registered class, used by
/// `host_api::export_class` (`spec.md` §4.6).
pub type ConstructFn = Rc<dyn Fn(&mut Vm, &[Value]) -> EelResult<Value>>;

/// Class-level destructor, consulted by `host_api::new_host_object`
/// when an instance supplies no per-instance destructor of its own.
/// Operates only on the owned host payload, same restriction as
/// `object::DestructFn` (`Object` has no back-pointer to its VM).
pub type ClassDestructFn = Rc<dyn Fn(&mut dyn Any)>;

/// Class-level clone hook for host objects (`spec.md` §4.6 `clone`).
/// Built-in container classes clone structurally in
/// `host_api::clone_value` without consulting this table.
pub type CloneFn = Rc<dyn Fn(&dyn Any) -> Box<dyn Any>>;

#[derive(Default)]
pub struct ClassEntry {
    pub name: Rc<str>,
    pub parent: Option<ClassId>,
    pub metamethods: HashMap<Metamethod, MetamethodFn>,
    pub casts: HashMap<ClassId, CastFn>,
    pub construct: Option<ConstructFn>,
    pub destruct: Option<ClassDestructFn>,
    pub clone: Option<CloneFn>,
}

impl ClassEntry {
    fn new(name: Rc<str>, parent: Option<ClassId>) -> Self {
        ClassEntry {
            name,
            parent,
            metamethods: HashMap::new(),
            casts: HashMap::new(),
            construct: None,
            destruct: None,
            clone: None,
        }
    }
}

/// Per-VM class registry. Lookups are O(1) by classid; name lookups
/// are O(1) via a secondary index.
pub struct ClassRegistry {
    classes: HashMap<ClassId, ClassEntry>,
    by_name: HashMap<Rc<str>, ClassId>,
    next_id: u32,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry {
            classes: HashMap::new(),
            by_name: HashMap::new(),
            next_id: ClassId::FIRST_USER.0,
        }
    }

    pub fn register_reserved(&mut self, id: ClassId, name: &str, parent: Option<ClassId>) {
        let name: Rc<str> = Rc::from(name);
        self.by_name.insert(name.clone(), id);
        self.classes.insert(id, ClassEntry::new(name, parent));
    }

    /// Register a new, host-defined class (`spec.md` §4.1
    /// `register_class`). Returns the freshly allocated classid.
    pub fn register_class(&mut self, name: &str, parent: Option<ClassId>) -> EelResult<ClassId> {
        if parent.is_some_and(|p| !self.classes.contains_key(&p)) {
            return Err(EelError::wrong_type());
        }
        let id = ClassId(self.next_id);
        self.next_id += 1;
        let name: Rc<str> = Rc::from(name);
        self.by_name.insert(name.clone(), id);
        self.classes.insert(id, ClassEntry::new(name, parent));
        Ok(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassEntry> {
        self.classes.get(&id)
    }

    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassEntry> {
        self.classes.get_mut(&id)
    }

    pub fn set_metamethod(&mut self, id: ClassId, mm: Metamethod, f: MetamethodFn) -> EelResult<()> {
        self.classes
            .get_mut(&id)
            .ok_or_else(EelError::wrong_type)?
            .metamethods
            .insert(mm, f);
        Ok(())
    }

    pub fn set_cast(&mut self, id: ClassId, target: ClassId, f: CastFn) -> EelResult<()> {
        self.classes
            .get_mut(&id)
            .ok_or_else(EelError::wrong_type)?
            .casts
            .insert(target, f);
        Ok(())
    }

    pub fn set_construct(&mut self, id: ClassId, f: ConstructFn) -> EelResult<()> {
        self.classes.get_mut(&id).ok_or_else(EelError::wrong_type)?.construct = Some(f);
        Ok(())
    }

    pub fn set_destruct(&mut self, id: ClassId, f: ClassDestructFn) -> EelResult<()> {
        self.classes.get_mut(&id).ok_or_else(EelError::wrong_type)?.destruct = Some(f);
        Ok(())
    }

    pub fn set_clone(&mut self, id: ClassId, f: CloneFn) -> EelResult<()> {
        self.classes.get_mut(&id).ok_or_else(EelError::wrong_type)?.clone = Some(f);
        Ok(())
    }

    /// Walk `id`'s parent chain (inclusive) looking for a class that
    /// defines `mm` (`spec.md` §4.7: "consult operand class, else walk
    /// parent chain").
    pub fn lookup_metamethod(&self, id: ClassId, mm: Metamethod) -> Option<MetamethodFn> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let entry = self.classes.get(&c)?;
            if let Some(f) = entry.metamethods.get(&mm) {
                return Some(f.clone());
            }
            cur = entry.parent;
        }
        None
    }

    pub fn lookup_cast(&self, id: ClassId, target: ClassId) -> Option<CastFn> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let entry = self.classes.get(&c)?;
            if let Some(f) = entry.casts.get(&target) {
                return Some(f.clone());
            }
            cur = entry.parent;
        }
        None
    }

    /// True if `id` derives from (or is) `ancestor`, per the
    /// single-inheritance parent chain.
    pub fn is_a(&self, id: ClassId, ancestor: ClassId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.classes.get(&c).and_then(|e| e.parent);
        }
        false
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metamethod_inherited_from_parent() {
        let mut reg = ClassRegistry::new();
        reg.register_reserved(ClassId::INTEGER, "integer", None);
        let child = reg.register_class("child", Some(ClassId::INTEGER)).unwrap();
        let f: MetamethodFn = Rc::new(|_vm, _args| Ok(Value::Integer(1)));
        reg.set_metamethod(ClassId::INTEGER, Metamethod::Add, f).unwrap();
        assert!(reg.lookup_metamethod(child, Metamethod::Add).is_some());
        assert!(reg.lookup_metamethod(child, Metamethod::Sub).is_none());
    }

    #[test]
    fn is_a_walks_chain() {
        let mut reg = ClassRegistry::new();
        reg.register_reserved(ClassId::OBJREF, "objref", None);
        let mid = reg.register_class("mid", Some(ClassId::OBJREF)).unwrap();
        let leaf = reg.register_class("leaf", Some(mid)).unwrap();
        assert!(reg.is_a(leaf, ClassId::OBJREF));
        assert!(reg.is_a(leaf, mid));
        assert!(!reg.is_a(mid, leaf));
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut reg = ClassRegistry::new();
        assert!(reg.register_class("orphan", Some(ClassId(999))).is_err());
    }

    #[test]
    fn destruct_and_clone_are_stored_on_the_class() {
        let mut reg = ClassRegistry::new();
        reg.register_reserved(ClassId::OBJREF, "objref", None);
        let id = reg.register_class("widget", Some(ClassId::OBJREF)).unwrap();
        let destruct: ClassDestructFn = Rc::new(|_data| {});
        let clone: CloneFn = Rc::new(|data| Box::new(*data.downcast_ref::<i32>().unwrap()));
        reg.set_destruct(id, destruct).unwrap();
        reg.set_clone(id, clone).unwrap();
        let entry = reg.get(id).unwrap();
        assert!(entry.destruct.is_some());
        assert!(entry.clone.is_some());
    }
}
