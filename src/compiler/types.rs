use crate::compiler::symbols::ModuleId;
use crate::compiler::words::{WordId, WordTable};
use rustc_hash::FxHashMap;

/// Canonical handle to a type. Because all types pass through the
/// [`TypeTable`], structural equality of non-sentinel types is the same as
/// handle equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// The structural shape of a type.
///
/// `Ptr` and `Arr` carry their total depth: one more than the element's depth
/// when the element is the same kind of type, otherwise one. Forward-declared
/// module types (`FdModule`) exist only between parsing and import
/// resolution; `Mixed` only as the element of an un-pinned array literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Byte,
    Short,
    Int,
    Long,
    UByte,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    Char8,
    Char16,
    Char32,
    Bool,
    Void,
    Null,
    Mixed,
    Error,
    Str,
    Ptr { elem: TypeId, depth: u32 },
    Arr { elem: TypeId, depth: u32 },
    Module { unique_id: u32 },
    FdModule { name: WordId },
}

/// Canonicalizing table over [`TypeKind`] values. Primitives are installed
/// up front at fixed handles; compound types are interned on demand.
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    lookup: FxHashMap<TypeKind, TypeId>,
}

macro_rules! primitive_ids {
    ($($name:ident => $index:expr),* $(,)?) => {
        impl TypeTable {
            $(pub const $name: TypeId = TypeId($index);)*
        }
    };
}

primitive_ids! {
    BYTE => 0, SHORT => 1, INT => 2, LONG => 3,
    UBYTE => 4, USHORT => 5, UINT => 6, ULONG => 7,
    FLOAT => 8, DOUBLE => 9,
    CHAR8 => 10, CHAR16 => 11, CHAR32 => 12,
    BOOL => 13, VOID => 14,
    NULL => 15, MIXED => 16, ERROR => 17, STRING => 18,
}

const PRIMITIVES: [TypeKind; 19] = [
    TypeKind::Byte,
    TypeKind::Short,
    TypeKind::Int,
    TypeKind::Long,
    TypeKind::UByte,
    TypeKind::UShort,
    TypeKind::UInt,
    TypeKind::ULong,
    TypeKind::Float,
    TypeKind::Double,
    TypeKind::Char8,
    TypeKind::Char16,
    TypeKind::Char32,
    TypeKind::Bool,
    TypeKind::Void,
    TypeKind::Null,
    TypeKind::Mixed,
    TypeKind::Error,
    TypeKind::Str,
];

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable {
            kinds: Vec::with_capacity(PRIMITIVES.len() * 4),
            lookup: FxHashMap::default(),
        };
        for kind in PRIMITIVES {
            table.canonicalize(kind);
        }
        table
    }

    /// Returns the canonical handle for a structural type value. Idempotent:
    /// structurally equal inputs always return the same handle.
    pub fn canonicalize(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&existing) = self.lookup.get(&kind) {
            return existing;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.lookup.insert(kind, id);
        id
    }

    #[inline]
    pub fn kind(&self, ty: TypeId) -> TypeKind {
        self.kinds[ty.0 as usize]
    }

    /// A pointer to `elem`, with the depth recomputed from the element.
    pub fn ptr_to(&mut self, elem: TypeId) -> TypeId {
        let depth = match self.kind(elem) {
            TypeKind::Ptr { depth, .. } => depth + 1,
            _ => 1,
        };
        self.canonicalize(TypeKind::Ptr { elem, depth })
    }

    /// An array of `elem`, with the depth recomputed from the element.
    pub fn arr_of(&mut self, elem: TypeId) -> TypeId {
        let depth = match self.kind(elem) {
            TypeKind::Arr { depth, .. } => depth + 1,
            _ => 1,
        };
        self.canonicalize(TypeKind::Arr { elem, depth })
    }

    pub fn module(&mut self, unique_id: u32) -> TypeId {
        self.canonicalize(TypeKind::Module { unique_id })
    }

    pub fn fd_module(&mut self, name: WordId) -> TypeId {
        self.canonicalize(TypeKind::FdModule { name })
    }

    /// The integer type with the given memory size and signedness.
    pub fn int_with_size(mem_size: u32, signed: bool) -> TypeId {
        match (mem_size, signed) {
            (1, true) => Self::BYTE,
            (2, true) => Self::SHORT,
            (4, true) => Self::INT,
            (8, true) => Self::LONG,
            (1, false) => Self::UBYTE,
            (2, false) => Self::USHORT,
            (4, false) => Self::UINT,
            (8, false) => Self::ULONG,
            _ => Self::ERROR,
        }
    }

    pub fn float_with_size(mem_size: u32) -> TypeId {
        match mem_size {
            4 => Self::FLOAT,
            8 => Self::DOUBLE,
            _ => Self::ERROR,
        }
    }

    pub fn is_int(&self, ty: TypeId) -> bool {
        matches!(
            self.kind(ty),
            TypeKind::Byte
                | TypeKind::Short
                | TypeKind::Int
                | TypeKind::Long
                | TypeKind::UByte
                | TypeKind::UShort
                | TypeKind::UInt
                | TypeKind::ULong
                // Characters count as integers so math can be done on them
                | TypeKind::Char8
                | TypeKind::Char16
                | TypeKind::Char32
        )
    }

    pub fn is_float(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Float | TypeKind::Double)
    }

    pub fn is_number(&self, ty: TypeId) -> bool {
        self.is_int(ty) || self.is_float(ty)
    }

    pub fn is_signed(&self, ty: TypeId) -> bool {
        matches!(
            self.kind(ty),
            TypeKind::Byte
                | TypeKind::Short
                | TypeKind::Int
                | TypeKind::Long
                | TypeKind::Float
                | TypeKind::Double
                | TypeKind::Char8
                | TypeKind::Char16
                | TypeKind::Char32
        )
    }

    pub fn is_char(&self, ty: TypeId) -> bool {
        matches!(
            self.kind(ty),
            TypeKind::Char8 | TypeKind::Char16 | TypeKind::Char32
        )
    }

    pub fn is_ptr(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Ptr { .. })
    }

    pub fn is_arr(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Arr { .. })
    }

    pub fn is_module(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Module { .. })
    }

    pub fn module_unique_id(&self, ty: TypeId) -> Option<u32> {
        match self.kind(ty) {
            TypeKind::Module { unique_id } => Some(unique_id),
            _ => None,
        }
    }

    pub fn ptr_depth(&self, ty: TypeId) -> u32 {
        match self.kind(ty) {
            TypeKind::Ptr { depth, .. } => depth,
            _ => 0,
        }
    }

    pub fn arr_depth(&self, ty: TypeId) -> u32 {
        match self.kind(ty) {
            TypeKind::Arr { depth, .. } => depth,
            _ => 0,
        }
    }

    /// The immediate element type of a pointer or array.
    pub fn elem(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Ptr { elem, .. } | TypeKind::Arr { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// The innermost non-pointer type of a pointer chain, or the innermost
    /// non-array type of an array chain.
    pub fn base_type(&self, ty: TypeId) -> TypeId {
        match self.kind(ty) {
            TypeKind::Ptr { elem, .. } => match self.kind(elem) {
                TypeKind::Ptr { .. } => self.base_type(elem),
                _ => elem,
            },
            TypeKind::Arr { elem, .. } => match self.kind(elem) {
                TypeKind::Arr { .. } => self.base_type(elem),
                _ => elem,
            },
            _ => ty,
        }
    }

    /// The type left after indexing `count` times into an array or pointer
    /// chain. `int[][]` indexed once is `int[]`.
    pub fn after_indexing(&self, ty: TypeId, count: u32) -> TypeId {
        let mut current = ty;
        for _ in 0..count {
            match self.elem(current) {
                Some(elem) => current = elem,
                None => return current,
            }
        }
        current
    }

    /// Rebuilds `ty` as an array chain of the same depth over a new base
    /// type. Used when an array literal's `mixed` element type is pinned by
    /// the assignment destination.
    pub fn with_base_type(&mut self, ty: TypeId, base: TypeId) -> TypeId {
        match self.kind(ty) {
            TypeKind::Arr { elem, .. } => {
                let new_elem = self.with_base_type(elem, base);
                self.arr_of(new_elem)
            }
            TypeKind::Ptr { elem, .. } => {
                let new_elem = self.with_base_type(elem, base);
                self.ptr_to(new_elem)
            }
            _ => base,
        }
    }

    pub fn mem_size(&self, ty: TypeId) -> u32 {
        match self.kind(ty) {
            TypeKind::Byte | TypeKind::UByte | TypeKind::Char8 | TypeKind::Bool => 1,
            TypeKind::Short | TypeKind::UShort | TypeKind::Char16 => 2,
            TypeKind::Int | TypeKind::UInt | TypeKind::Char32 | TypeKind::Float => 4,
            TypeKind::Long | TypeKind::ULong | TypeKind::Double => 8,
            TypeKind::Ptr { .. } | TypeKind::Arr { .. } => 8,
            _ => 0,
        }
    }

    /// Replaces every forward-declared module type inside `ty` using the
    /// unit's name-to-module resolution map. Returns the unresolved name if
    /// the map has no entry for it.
    pub fn resolve_fd(
        &mut self,
        ty: TypeId,
        resolution: &FxHashMap<WordId, ModuleId>,
    ) -> Result<TypeId, WordId> {
        match self.kind(ty) {
            TypeKind::FdModule { name } => match resolution.get(&name) {
                Some(module) => Ok(self.module(module.as_u32())),
                None => Err(name),
            },
            TypeKind::Ptr { elem, .. } => {
                let elem = self.resolve_fd(elem, resolution)?;
                Ok(self.ptr_to(elem))
            }
            TypeKind::Arr { elem, .. } => {
                let elem = self.resolve_fd(elem, resolution)?;
                Ok(self.arr_of(elem))
            }
            _ => Ok(ty),
        }
    }

    /// Source-syntax name of a type, for diagnostics.
    pub fn name(&self, ty: TypeId, words: &WordTable) -> String {
        match self.kind(ty) {
            TypeKind::Byte => "byte".to_string(),
            TypeKind::Short => "short".to_string(),
            TypeKind::Int => "int".to_string(),
            TypeKind::Long => "long".to_string(),
            TypeKind::UByte => "ubyte".to_string(),
            TypeKind::UShort => "ushort".to_string(),
            TypeKind::UInt => "uint".to_string(),
            TypeKind::ULong => "ulong".to_string(),
            TypeKind::Float => "float".to_string(),
            TypeKind::Double => "double".to_string(),
            TypeKind::Char8 => "char".to_string(),
            TypeKind::Char16 => "char16".to_string(),
            TypeKind::Char32 => "char32".to_string(),
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Void => "void".to_string(),
            TypeKind::Null => "null".to_string(),
            TypeKind::Mixed => "<T>".to_string(),
            TypeKind::Error => "error".to_string(),
            TypeKind::Str => "String".to_string(),
            TypeKind::Ptr { elem, .. } => format!("{}*", self.name(elem, words)),
            TypeKind::Arr { elem, .. } => format!("{}[]", self.name(elem, words)),
            TypeKind::Module { unique_id } => format!("module#{unique_id}"),
            TypeKind::FdModule { name } => words.resolve(name).to_string(),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn primitives_are_singletons() {
        let mut types = TypeTable::new();
        assert_eq!(types.canonicalize(TypeKind::Int), TypeTable::INT);
        assert_eq!(types.canonicalize(TypeKind::Double), TypeTable::DOUBLE);
    }

    #[test]
    fn pointer_depth_stacks() {
        let mut types = TypeTable::new();
        let p1 = types.ptr_to(TypeTable::INT);
        let p2 = types.ptr_to(p1);
        assert_eq!(types.ptr_depth(p1), 1);
        assert_eq!(types.ptr_depth(p2), 2);
        assert_eq!(types.base_type(p2), TypeTable::INT);
    }

    #[test]
    fn fd_module_resolves_through_map() {
        let mut words = WordTable::new();
        let mut types = TypeTable::new();
        let name = words.intern("Vec2");
        let fd = types.fd_module(name);
        let fd_arr = types.arr_of(fd);

        let mut map = FxHashMap::default();
        map.insert(name, ModuleId::new(7));

        let resolved = types.resolve_fd(fd_arr, &map).unwrap();
        let expected_module = types.module(7);
        let expected = types.arr_of(expected_module);
        assert_eq!(resolved, expected);
    }

    #[test]
    fn fd_module_without_mapping_reports_name() {
        let mut words = WordTable::new();
        let mut types = TypeTable::new();
        let name = words.intern("Missing");
        let fd = types.fd_module(name);
        assert_eq!(types.resolve_fd(fd, &FxHashMap::default()), Err(name));
    }

    #[test]
    fn with_base_type_preserves_depth() {
        let mut types = TypeTable::new();
        let mixed_arr = types.arr_of(TypeTable::MIXED);
        let nested = types.arr_of(mixed_arr);
        let pinned = types.with_base_type(nested, TypeTable::INT);
        assert_eq!(types.arr_depth(pinned), 2);
        assert_eq!(types.base_type(pinned), TypeTable::INT);
    }

    /// Generates an arbitrary structural type a few levels deep.
    fn arb_type_kind() -> impl Strategy<Value = Vec<u8>> {
        // A type is described by a base primitive selector plus a stack of
        // ptr/arr wrappers, encoded as bytes to keep the strategy simple.
        (0u8..14, proptest::collection::vec(0u8..2, 0..4))
            .prop_map(|(base, wrappers)| std::iter::once(base).chain(wrappers).collect())
    }

    fn build(types: &mut TypeTable, encoded: &[u8]) -> TypeId {
        let mut ty = TypeId(encoded[0] as u32);
        for wrapper in &encoded[1..] {
            ty = match wrapper {
                0 => types.ptr_to(ty),
                _ => types.arr_of(ty),
            };
        }
        ty
    }

    proptest! {
        // Structurally equal types built independently are handle-equal, and
        // structurally different ones are not.
        #[test]
        fn canonicalization_matches_structural_equality(
            a in arb_type_kind(),
            b in arb_type_kind(),
        ) {
            let mut types = TypeTable::new();
            let first = build(&mut types, &a);
            let second = build(&mut types, &b);
            prop_assert_eq!(a == b, first == second);

            // Rebuilding the same shape later still lands on the same handle
            let again = build(&mut types, &a);
            prop_assert_eq!(first, again);
        }
    }
}
