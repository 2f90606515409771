//! Registers the reserved built-in classids into a fresh
//! [`ClassRegistry`] (`spec.md` §3.3: "classids 0-19 are reserved for
//! built-in types"). Grounded in the teacher's fixed `StackItemType`
//! registration at engine construction, generalized to EEL's
//! open-ended, host-extensible class model: value types have no
//! parent, every heap type derives from `objref`.

use crate::class::ClassRegistry;
use crate::ids::ClassId;

pub fn register_builtins(classes: &mut ClassRegistry) {
    classes.register_reserved(ClassId::NIL, "nil", None);
    classes.register_reserved(ClassId::BOOLEAN, "boolean", None);
    classes.register_reserved(ClassId::INTEGER, "integer", None);
    classes.register_reserved(ClassId::REAL, "real", None);
    classes.register_reserved(ClassId::CLASSID, "classid", None);
    classes.register_reserved(ClassId::OBJREF, "objref", None);

    let objref = Some(ClassId::OBJREF);
    classes.register_reserved(ClassId::STRING, "string", objref);
    classes.register_reserved(ClassId::DSTRING, "dstring", objref);
    classes.register_reserved(ClassId::ARRAY, "array", objref);
    classes.register_reserved(ClassId::TABLE, "table", objref);
    classes.register_reserved(ClassId::FUNCTION, "function", objref);
    classes.register_reserved(ClassId::MODULE, "module", objref);
    classes.register_reserved(ClassId::VECTOR_U8, "vector_u8", objref);
    classes.register_reserved(ClassId::VECTOR_S8, "vector_s8", objref);
    classes.register_reserved(ClassId::VECTOR_U16, "vector_u16", objref);
    classes.register_reserved(ClassId::VECTOR_S16, "vector_s16", objref);
    classes.register_reserved(ClassId::VECTOR_U32, "vector_u32", objref);
    classes.register_reserved(ClassId::VECTOR_S32, "vector_s32", objref);
    classes.register_reserved(ClassId::VECTOR_F, "vector_f", objref);
    classes.register_reserved(ClassId::VECTOR_D, "vector_d", objref);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reserved_classid_is_registered_and_named() {
        let mut classes = ClassRegistry::new();
        register_builtins(&mut classes);
        for (id, name) in [
            (ClassId::NIL, "nil"),
            (ClassId::BOOLEAN, "boolean"),
            (ClassId::INTEGER, "integer"),
            (ClassId::REAL, "real"),
            (ClassId::CLASSID, "classid"),
            (ClassId::OBJREF, "objref"),
            (ClassId::STRING, "string"),
            (ClassId::DSTRING, "dstring"),
            (ClassId::ARRAY, "array"),
            (ClassId::TABLE, "table"),
            (ClassId::FUNCTION, "function"),
            (ClassId::MODULE, "module"),
            (ClassId::VECTOR_U8, "vector_u8"),
            (ClassId::VECTOR_D, "vector_d"),
        ] {
            assert_eq!(classes.find_by_name(name), Some(id));
        }
    }

    #[test]
    fn heap_types_derive_from_objref() {
        let mut classes = ClassRegistry::new();
        register_builtins(&mut classes);
        assert!(classes.is_a(ClassId::ARRAY, ClassId::OBJREF));
        assert!(classes.is_a(ClassId::VECTOR_F, ClassId::OBJREF));
        assert!(!classes.is_a(ClassId::INTEGER, ClassId::OBJREF));
    }
}
