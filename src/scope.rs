use crate::names::NameId;

/// Role of a named object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Constant,
    Variable,
    Array,
    ValueParameter,
    ReferenceParameter,
    ReturnParameter,
    Procedure,
    Undefined,
}

/// Types of the language. `Universal` is the error sentinel: it matches
/// every type and suppresses further complaints about an expression that
/// has already been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Universal,
    Boolean,
    Integer,
    Channel,
    Void,
}

impl Type {
    pub fn matches(self, other: Type) -> bool {
        self == Type::Universal || other == Type::Universal || self == other
    }

    pub fn is_universal(self) -> bool {
        self == Type::Universal
    }
}

/// Semantic descriptor of a named object, copied by value.
#[derive(Debug, Clone, Copy)]
pub struct Metadata {
    pub kind: Kind,
    pub typ: Type,
    /// Compile-time value, constants only.
    pub value: i64,
    /// Upper bound, arrays only. Lower bound is always 1.
    pub upper_bound: i64,
    /// Lexical level of the defining block.
    pub level: i32,
    /// Signed offset from the activation-record base register.
    pub displacement: i64,
    /// Entry address, procedures only.
    pub label: usize,
}

impl Metadata {
    fn blank(kind: Kind, typ: Type) -> Self {
        Metadata {
            kind,
            typ,
            value: 0,
            upper_bound: 0,
            level: 0,
            displacement: 0,
            label: 0,
        }
    }

    pub fn constant(typ: Type, value: i64) -> Self {
        Metadata {
            value,
            ..Self::blank(Kind::Constant, typ)
        }
    }

    pub fn variable(typ: Type) -> Self {
        Self::blank(Kind::Variable, typ)
    }

    pub fn array(typ: Type, upper_bound: i64) -> Self {
        Metadata {
            upper_bound,
            ..Self::blank(Kind::Array, typ)
        }
    }

    pub fn parameter(typ: Type, by_reference: bool) -> Self {
        let kind = if by_reference {
            Kind::ReferenceParameter
        } else {
            Kind::ValueParameter
        };
        Self::blank(kind, typ)
    }

    pub fn return_slot(typ: Type) -> Self {
        Self::blank(Kind::ReturnParameter, typ)
    }

    pub fn procedure(typ: Type, label: usize) -> Self {
        Metadata {
            label,
            ..Self::blank(Kind::Procedure, typ)
        }
    }

    pub fn undefined() -> Self {
        Self::blank(Kind::Undefined, Type::Universal)
    }

    /// Stack slots this object occupies in its activation record.
    /// Parameters sit below the base and are allocated by the caller;
    /// procedures and error placeholders occupy nothing.
    fn slots(&self) -> i64 {
        match self.kind {
            Kind::Array => self.upper_bound,
            Kind::Procedure
            | Kind::ValueParameter
            | Kind::ReferenceParameter
            | Kind::Undefined => 0,
            _ => 1,
        }
    }
}

/// One signature element of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub typ: Type,
    pub by_reference: bool,
}

/// Side information gathered while a procedure body parses, consumed by
/// the parallel statement's friendliness audit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcTraits {
    pub uses_io: bool,
    /// Outermost lexical level the body touches, if any.
    pub outermost_level_used: Option<i32>,
    pub calls_unfriendly: bool,
}

impl ProcTraits {
    /// An access at or outside the procedure's defining level escapes it.
    pub fn touches_outer(&self, defining_level: i32) -> bool {
        matches!(self.outermost_level_used, Some(l) if l <= defining_level)
    }
}

/// Stable index of an object record. Records are arena-allocated, so a
/// handle held across scope operations stays valid as long as the
/// record's own scope is still open.
pub type Handle = usize;

#[derive(Debug)]
pub struct ObjectRecord {
    pub name: NameId,
    pub meta: Metadata,
    /// Signature in source order, procedures only.
    pub params: Vec<Param>,
    pub traits: ProcTraits,
}

/// The scope analyzer: an arena of object records plus one vector of
/// handles per open block level. Records are appended in definition
/// order, so closing a block tears its objects down by truncation.
pub struct ScopeTable {
    records: Vec<ObjectRecord>,
    levels: Vec<Vec<Handle>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        ScopeTable {
            records: Vec::new(),
            levels: Vec::new(),
        }
    }

    /// Level of the innermost open block; -1 before the program block.
    pub fn block_level(&self) -> i32 {
        self.levels.len() as i32 - 1
    }

    pub fn new_block(&mut self) {
        self.levels.push(Vec::new());
    }

    pub fn end_block(&mut self) {
        let level = self.levels.pop().expect("end_block without new_block");
        if let Some(&first) = level.first() {
            self.records.truncate(first);
        }
    }

    pub fn record(&self, handle: Handle) -> &ObjectRecord {
        &self.records[handle]
    }

    pub fn record_mut(&mut self, handle: Handle) -> &mut ObjectRecord {
        &mut self.records[handle]
    }

    /// Search from the innermost level outward.
    pub fn find(&self, name: NameId) -> Option<Handle> {
        if name == NameId::NONE {
            return None;
        }
        for level in self.levels.iter().rev() {
            for &handle in level.iter().rev() {
                if self.records[handle].name == name {
                    return Some(handle);
                }
            }
        }
        None
    }

    fn is_defined_here(&self, name: NameId) -> bool {
        if name == NameId::NONE {
            return false;
        }
        match self.levels.last() {
            Some(level) => level.iter().any(|&h| self.records[h].name == name),
            None => false,
        }
    }

    /// Define an object in the current block. Returns `None` when the
    /// name is already taken at this level; the caller reports the
    /// ambiguity and the duplicate is discarded. The anonymous name
    /// bypasses the uniqueness check.
    pub fn define(&mut self, name: NameId, mut meta: Metadata) -> Option<Handle> {
        if self.is_defined_here(name) {
            return None;
        }
        meta.level = self.block_level();
        meta.displacement = self.next_displacement(&meta);
        let handle = self.records.len();
        self.records.push(ObjectRecord {
            name,
            meta,
            params: Vec::new(),
            traits: ProcTraits::default(),
        });
        self.levels
            .last_mut()
            .expect("define outside any block")
            .push(handle);
        Some(handle)
    }

    /// Synthesize a placeholder for an undefined name so downstream kind
    /// and type checks short-circuit silently.
    pub fn define_undefined(&mut self, name: NameId) -> Handle {
        self.define(name, Metadata::undefined())
            .or_else(|| self.find(name))
            .expect("placeholder definition cannot collide")
    }

    /// Parameters count downward from -1 in definition order; locals
    /// count upward from +3, arrays taking their bound in slots and
    /// procedure names taking none.
    fn next_displacement(&self, meta: &Metadata) -> i64 {
        let level = self.levels.last().expect("no open block");
        match meta.kind {
            Kind::ValueParameter | Kind::ReferenceParameter => {
                let defined = level
                    .iter()
                    .filter(|&&h| {
                        matches!(
                            self.records[h].meta.kind,
                            Kind::ValueParameter | Kind::ReferenceParameter
                        )
                    })
                    .count() as i64;
                -1 - defined
            }
            Kind::Procedure | Kind::Undefined => 0,
            _ => {
                let used: i64 = level.iter().map(|&h| self.records[h].meta.slots()).sum();
                3 + used
            }
        }
    }

    /// Slots the current block's objects need above the reserved three,
    /// used to size its activation record.
    pub fn objects_length(&self) -> i64 {
        match self.levels.last() {
            Some(level) => level.iter().map(|&h| self.records[h].meta.slots()).sum(),
            None => 0,
        }
    }

    /// Parameter slots of the current block, popped by the callee's
    /// closing instruction.
    pub fn params_length(&self) -> i64 {
        match self.levels.last() {
            Some(level) => level
                .iter()
                .filter(|&&h| {
                    matches!(
                        self.records[h].meta.kind,
                        Kind::ValueParameter | Kind::ReferenceParameter
                    )
                })
                .count() as i64,
            None => 0,
        }
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}
