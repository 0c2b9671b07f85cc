//! Symbol store with decorated names and overload groups.
//!
//! Every function symbol is keyed by its decorated name, the bare identifier
//! followed by the parenthesized, comma-joined argument-type list
//! (`operator<<(ostream,int)`). Overload groups map a bare identifier to the
//! set of decorated names sharing it; calls are resolved by rebuilding the
//! decorated name from the argument types at the call site and matching it
//! against the group.

use std::collections::{HashMap, HashSet};

/// What a symbol names, and where it lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A data-segment entry of `size` words at `offset`.
    Data { offset: usize, size: usize },
    /// A function at `offset` in the code segment. `arg_count` is negative
    /// for variadic routines, with its absolute value counting the fixed
    /// arguments.
    Code {
        offset: usize,
        return_type: String,
        arg_count: i32,
    },
    /// An externally implemented routine; `offset` addresses its `RET`
    /// prelude in the code segment.
    ExternalCode {
        offset: usize,
        return_type: String,
        arg_count: i32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Declared type name; for functions, the return type.
    pub type_name: String,
}

impl Symbol {
    /// Fixed argument count of a code symbol.
    pub fn fixed_args(&self) -> usize {
        match self.kind {
            SymbolKind::Code { arg_count, .. } | SymbolKind::ExternalCode { arg_count, .. } => {
                arg_count.abs() as usize
            }
            SymbolKind::Data { .. } => 0,
        }
    }

    pub fn is_variadic(&self) -> bool {
        match self.kind {
            SymbolKind::Code { arg_count, .. } | SymbolKind::ExternalCode { arg_count, .. } => {
                arg_count < 0
            }
            SymbolKind::Data { .. } => false,
        }
    }

    pub fn code_offset(&self) -> Option<usize> {
        match self.kind {
            SymbolKind::Code { offset, .. } | SymbolKind::ExternalCode { offset, .. } => {
                Some(offset)
            }
            SymbolKind::Data { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    /// The decorated name is already present.
    Duplicate(String),
    /// Another data entry already occupies the offset.
    OffsetCollision(usize),
    /// No group member matches the call's decorated name.
    UnknownOverload(String),
    /// A bare reference to a group with several members.
    Ambiguous(String),
    /// The bare name is not present at all.
    Unknown(String),
}

/// Builds a decorated name from a bare identifier and argument types.
pub fn decorate(bare: &str, arg_types: &[String], variadic: bool) -> String {
    let mut name = String::from(bare);
    name.push('(');
    name.push_str(&arg_types.join(","));
    if variadic {
        if !arg_types.is_empty() {
            name.push(',');
        }
        name.push_str("...");
    }
    name.push(')');
    name
}

#[derive(Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    groups: HashMap<String, Vec<String>>,
    data_offsets: HashSet<usize>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Inserts a data symbol under its plain name.
    pub fn insert_data(
        &mut self,
        name: &str,
        offset: usize,
        size: usize,
        type_name: &str,
    ) -> Result<(), SymbolError> {
        if self.symbols.contains_key(name) {
            return Err(SymbolError::Duplicate(name.to_string()));
        }
        if !self.data_offsets.insert(offset) {
            return Err(SymbolError::OffsetCollision(offset));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Data { offset, size },
                type_name: type_name.to_string(),
            },
        );
        Ok(())
    }

    /// Inserts a code symbol at `offset` and adds its decorated name to the
    /// bare name's overload group. Returns the decorated name.
    pub fn insert_code(
        &mut self,
        bare: &str,
        arg_types: &[String],
        return_type: &str,
        arg_count: i32,
        offset: usize,
        external: bool,
    ) -> Result<String, SymbolError> {
        let decorated = decorate(bare, arg_types, arg_count < 0);
        if self.symbols.contains_key(&decorated) {
            return Err(SymbolError::Duplicate(decorated));
        }

        let kind = if external {
            SymbolKind::ExternalCode {
                offset,
                return_type: return_type.to_string(),
                arg_count,
            }
        } else {
            SymbolKind::Code {
                offset,
                return_type: return_type.to_string(),
                arg_count,
            }
        };
        self.symbols.insert(
            decorated.clone(),
            Symbol {
                kind,
                type_name: return_type.to_string(),
            },
        );
        self.groups
            .entry(bare.to_string())
            .or_insert_with(Vec::new)
            .push(decorated.clone());
        Ok(decorated)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Resolves a bare reference to a function: accepted only when the group
    /// has exactly one member.
    pub fn resolve_single(&self, bare: &str) -> Result<(&str, &Symbol), SymbolError> {
        let group = self
            .groups
            .get(bare)
            .ok_or_else(|| SymbolError::Unknown(bare.to_string()))?;
        if group.len() != 1 {
            return Err(SymbolError::Ambiguous(bare.to_string()));
        }
        let decorated = &group[0];
        Ok((decorated, &self.symbols[decorated]))
    }

    /// Resolves a call by exact decorated-name match, falling back to
    /// variadic members whose fixed prefix matches. No implicit conversions
    /// are considered.
    pub fn resolve_call(
        &self,
        bare: &str,
        arg_types: &[String],
    ) -> Result<(&str, &Symbol), SymbolError> {
        let candidate = decorate(bare, arg_types, false);
        let group = self
            .groups
            .get(bare)
            .ok_or_else(|| SymbolError::Unknown(bare.to_string()))?;

        for decorated in group {
            if *decorated == candidate {
                return Ok((decorated, &self.symbols[decorated]));
            }
        }

        // Variadic members match on the prefix before ",...": the literal
        // suffix stands for the remaining arguments.
        for decorated in group {
            let symbol = &self.symbols[decorated];
            if !symbol.is_variadic() {
                continue;
            }
            let fixed = symbol.fixed_args();
            if arg_types.len() < fixed {
                continue;
            }
            let prefix = decorate(bare, &arg_types[..fixed], false);
            let prefix = &prefix[..prefix.len() - 1];
            let tail = match decorated.strip_prefix(prefix) {
                Some(tail) => tail,
                None => continue,
            };
            if tail == ",...)" || tail == "...)" {
                return Ok((decorated, symbol));
            }
        }

        Err(SymbolError::UnknownOverload(candidate))
    }
}
