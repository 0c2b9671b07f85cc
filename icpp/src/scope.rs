//! Lexical scopes and per-function stack frames.
//!
//! Only function scopes open a stack frame; the other scope kinds are
//! recorded so the parser can track where it is, but do not affect code
//! generation. Frame offsets follow the machine's call convention: the
//! saved frame pointer sits at `bp`, the return address at `bp + 1`,
//! arguments above that and locals below `bp` at negative offsets.

use std::collections::HashMap;

use icvm::Word;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Struct,
    Class,
    Union,
    Namespace,
}

/// A name bound inside a frame: its bp-relative offset, size in words and
/// declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameVar {
    pub offset: Word,
    pub size: usize,
    pub type_name: String,
}

/// Per-function frame descriptor.
///
/// `enter_offset` addresses the function's `ENTER` instruction; its
/// immediate is rewritten in place as locals are added, so the operand is
/// monotonically non-decreasing over the function body.
#[derive(Debug)]
pub struct Frame {
    pub name: String,
    pub enter_offset: usize,
    pub locals_size: usize,
    pub fixed_args: usize,
    pub returned: bool,
    vars: HashMap<String, FrameVar>,
}

impl Frame {
    /// Registers argument `index` (0 is leftmost) of `fixed_args` total.
    /// Arguments were pushed left to right, so the leftmost sits highest
    /// above the saved frame pointer and return address.
    pub fn add_arg(&mut self, name: &str, index: usize, type_name: &str) {
        let offset = (self.fixed_args - index + 1) as Word;
        self.vars.insert(
            name.to_string(),
            FrameVar {
                offset,
                size: 1,
                type_name: type_name.to_string(),
            },
        );
    }

    /// Allocates `size` words of locals and binds `name` to the aggregate's
    /// lowest word. Re-binding an existing name allocates a fresh slot and
    /// shadows the old one.
    pub fn add_local(&mut self, name: &str, size: usize, type_name: &str) -> Word {
        self.locals_size += size;
        let offset = -(self.locals_size as Word);
        self.vars.insert(
            name.to_string(),
            FrameVar {
                offset,
                size,
                type_name: type_name.to_string(),
            },
        );
        offset
    }

    pub fn lookup(&self, name: &str) -> Option<&FrameVar> {
        self.vars.get(name)
    }
}

#[derive(Default)]
pub struct ScopeStack {
    scopes: Vec<(ScopeKind, String)>,
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> ScopeStack {
        ScopeStack::default()
    }

    /// Enters a non-function scope.
    pub fn enter(&mut self, kind: ScopeKind, name: &str) {
        debug_assert!(kind != ScopeKind::Function);
        self.scopes.push((kind, name.to_string()));
    }

    /// Enters a function scope, opening a frame whose `ENTER` instruction
    /// sits at `enter_offset`.
    pub fn enter_function(&mut self, name: &str, fixed_args: usize, enter_offset: usize) {
        self.scopes.push((ScopeKind::Function, name.to_string()));
        self.frames.push(Frame {
            name: name.to_string(),
            enter_offset,
            locals_size: 0,
            fixed_args,
            returned: false,
            vars: HashMap::new(),
        });
    }

    /// Leaves the innermost scope, returning its kind. Leaving a function
    /// scope pops its frame.
    pub fn leave(&mut self) -> Option<(ScopeKind, String)> {
        let top = self.scopes.pop();
        if let Some((ScopeKind::Function, _)) = top {
            self.frames.pop();
        }
        top
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Searches the frames from innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<&FrameVar> {
        self.frames.iter().rev().find_map(|f| f.lookup(name))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn argument_offsets() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f", 2, 0);
        let frame = scopes.frame_mut().unwrap();
        frame.add_arg("a", 0, "int");
        frame.add_arg("b", 1, "int");
        // Two arguments: the leftmost is highest above the frame base.
        assert_eq!(frame.lookup("a").unwrap().offset, 3);
        assert_eq!(frame.lookup("b").unwrap().offset, 2);
    }

    #[test]
    fn local_offsets_grow_downward() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f", 0, 0);
        let frame = scopes.frame_mut().unwrap();
        assert_eq!(frame.add_local("x", 1, "int"), -1);
        assert_eq!(frame.add_local("a", 3, "int[3]"), -4);
        assert_eq!(frame.add_local("y", 1, "int"), -5);
        assert_eq!(frame.locals_size, 5);
    }

    #[test]
    fn shadowing_rebinds() {
        let mut scopes = ScopeStack::new();
        scopes.enter_function("f", 0, 0);
        let frame = scopes.frame_mut().unwrap();
        frame.add_local("i", 1, "int");
        let second = frame.add_local("i", 1, "int");
        assert_eq!(frame.lookup("i").unwrap().offset, second);
        assert_eq!(frame.locals_size, 2);
    }

    #[test]
    fn leaving_function_pops_frame() {
        let mut scopes = ScopeStack::new();
        scopes.enter(ScopeKind::Namespace, "n");
        scopes.enter_function("f", 0, 0);
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.leave().unwrap().0, ScopeKind::Function);
        assert_eq!(scopes.depth(), 0);
        assert_eq!(scopes.leave().unwrap().0, ScopeKind::Namespace);
    }
}
