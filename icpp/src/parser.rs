//! Statement and declaration parser.
//!
//! A single pass over the token stream: declarations reserve data or frame
//! space, statements drive the expression compiler and lay down their jump
//! scaffolding as they go, and function bodies are emitted directly into the
//! code segment. There is no syntax tree; the only memory of what was parsed
//! is the symbol store, the scope stack and the emitted code itself.

use std::collections::HashMap;

use icvm::{External, Opcode, Program, Word};
use matches::debug_assert_matches;

use crate::data::DataSegment;
use crate::emit::{Emitter, Fixup, TooFar};
use crate::error::{Error, ParseError};
use crate::expr::array_type;
use crate::lexer::{eval_char, eval_number, Lexer, Token, TokenKind};
use crate::scope::{ScopeKind, ScopeStack};
use crate::symbols::SymbolTable;

/// Words that can begin a type prefix. Keywords are not lexed specially;
/// the parser recognizes them here by string comparison.
const TYPE_WORDS: &[&str] = &[
    "int", "char", "double", "float", "void", "bool", "long", "short", "signed", "unsigned",
    "const", "size_t",
];

/// A brace-nested array initializer.
enum InitNode {
    List(Vec<InitNode>),
    Value(Word),
}

pub struct Parser<'a> {
    pub(crate) token: Token,
    pub(crate) symbols: SymbolTable,
    pub(crate) scopes: ScopeStack,
    pub(crate) emitter: Emitter,
    pub(crate) data: DataSegment,
    pub(crate) enums: HashMap<String, Word>,
    pub(crate) externals: Vec<External>,
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Parser<'a>, Error> {
        let mut lexer = Lexer::new(source);
        let token = lexer.next_token()?;
        let line = token.line;
        let mut parser = Parser {
            token,
            symbols: SymbolTable::new(),
            scopes: ScopeStack::new(),
            emitter: Emitter::new(),
            data: DataSegment::new(),
            enums: HashMap::new(),
            externals: Vec::new(),
            lexer,
        };
        // Builtins are emitted before any source line and stay attributed
        // to line zero, which the listing renders as its own section.
        parser.register_builtins();
        parser.emitter.set_line(line);
        Ok(parser)
    }

    /// Parses the whole source.
    pub fn parse_program(&mut self) -> Result<(), Error> {
        while self.token.kind != TokenKind::Eos {
            self.top_item()?;
        }
        Ok(())
    }

    /// Locates the entry point and seals the program image.
    pub fn finish(self) -> Result<Program, Error> {
        let line = self.lexer.line_number();
        let (entry, entry_args) = match self.symbols.resolve_single("main") {
            Ok((_, symbol)) => (
                symbol.code_offset().expect("main is a code symbol"),
                symbol.fixed_args(),
            ),
            Err(error) => return Err(self.symbol_error_at(error, line)),
        };

        let (code, line_ranges, comments) = self.emitter.into_parts();
        let (data, data_entries) = self.data.into_parts();
        Ok(Program::new(
            data,
            code,
            entry,
            entry_args,
            self.externals,
            line_ranges,
            comments,
            data_entries,
        ))
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    pub(crate) fn advance(&mut self) -> Result<(), Error> {
        self.token = self.lexer.next_token()?;
        self.emitter.set_line(self.token.line);
        Ok(())
    }

    pub(crate) fn expect(&mut self, text: &str) -> Result<(), Error> {
        if self.token.is(text) {
            self.advance()
        } else {
            Err(self.unexpected(&format!("\"{}\"", text)))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> Error {
        ParseError::Unexpected {
            line: self.line(),
            found: self.token.text.clone(),
            expected: expected.to_string(),
        }
        .into()
    }

    pub(crate) fn line(&self) -> u32 {
        self.token.line
    }

    pub(crate) fn branch_to(&mut self, op: Opcode, target: usize) -> Result<(), Error> {
        let line = self.line();
        self.emitter
            .emit_branch(op, target)
            .map_err(|TooFar| ParseError::DisplacementOverflow { line }.into())
    }

    pub(crate) fn resolve_fixup(&mut self, fixup: Fixup) -> Result<(), Error> {
        let line = self.line();
        self.emitter
            .resolve(fixup)
            .map_err(|TooFar| ParseError::DisplacementOverflow { line }.into())
    }

    pub(crate) fn is_type_start(&self) -> bool {
        self.token.kind == TokenKind::Ident && TYPE_WORDS.contains(&self.token.text.as_str())
    }

    pub(crate) fn symbol_error_at(&self, error: crate::symbols::SymbolError, line: u32) -> Error {
        use crate::symbols::SymbolError;
        let parse_error = match error {
            SymbolError::Duplicate(name) => ParseError::Duplicate { line, name },
            SymbolError::OffsetCollision(offset) => ParseError::Duplicate {
                line,
                name: format!("data at offset {}", offset),
            },
            SymbolError::UnknownOverload(name) => ParseError::UnknownOverload { line, name },
            SymbolError::Ambiguous(name) => ParseError::AmbiguousOverload { line, name },
            SymbolError::Unknown(name) => ParseError::UnknownSymbol { line, name },
        };
        parse_error.into()
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn top_item(&mut self) -> Result<(), Error> {
        match self.token.text.as_str() {
            ";" => self.advance(),
            "typedef" | "using" | "template" => {
                tracing::debug!("line {}: skipping {} declaration", self.line(), self.token.text);
                self.skip_to_semicolon()
            }
            "struct" | "class" | "union" => {
                tracing::debug!("line {}: skipping {} declaration", self.line(), self.token.text);
                let kind = match self.token.text.as_str() {
                    "struct" => ScopeKind::Struct,
                    "class" => ScopeKind::Class,
                    _ => ScopeKind::Union,
                };
                self.advance()?;
                let name = if self.token.kind == TokenKind::Ident {
                    let name = self.token.text.clone();
                    self.advance()?;
                    name
                } else {
                    String::new()
                };
                // The scope is recorded while the body is skipped; nothing
                // inside affects code generation.
                self.scopes.enter(kind, &name);
                let result = self.skip_braced_declaration();
                self.scopes.leave();
                result
            }
            "namespace" => self.namespace(),
            "enum" => self.enum_declaration(),
            _ if self.is_type_start() => self.declaration(true),
            _ => Err(self.unexpected("a declaration")),
        }
    }

    fn skip_to_semicolon(&mut self) -> Result<(), Error> {
        while !self.token.is(";") {
            if self.token.kind == TokenKind::Eos {
                return Err(self.unexpected("\";\""));
            }
            self.advance()?;
        }
        self.advance()
    }

    fn skip_braced_declaration(&mut self) -> Result<(), Error> {
        let mut depth = 0usize;
        loop {
            if self.token.kind == TokenKind::Eos {
                return Err(self.unexpected("\";\""));
            }
            if self.token.is("{") {
                depth += 1;
            } else if self.token.is("}") {
                depth = depth.saturating_sub(1);
            } else if self.token.is(";") && depth == 0 {
                return self.advance();
            }
            self.advance()?;
        }
    }

    fn namespace(&mut self) -> Result<(), Error> {
        self.advance()?;
        let name = if self.token.kind == TokenKind::Ident {
            let name = self.token.text.clone();
            self.advance()?;
            name
        } else {
            String::new()
        };
        self.expect("{")?;
        self.scopes.enter(ScopeKind::Namespace, &name);
        while !self.token.is("}") {
            if self.token.kind == TokenKind::Eos {
                return Err(self.unexpected("\"}\""));
            }
            self.top_item()?;
        }
        self.advance()?;
        self.scopes.leave();
        Ok(())
    }

    fn enum_declaration(&mut self) -> Result<(), Error> {
        self.advance()?;
        if self.token.kind == TokenKind::Ident {
            // Enum names introduce no type; only the constants matter.
            self.advance()?;
        }
        self.expect("{")?;

        let mut next: Word = 0;
        while !self.token.is("}") {
            if self.token.kind != TokenKind::Ident {
                return Err(self.unexpected("an enumerator name"));
            }
            let name = self.token.text.clone();
            let line = self.line();
            self.advance()?;
            if self.token.is("=") {
                self.advance()?;
                next = self.const_expr()?;
            }
            if self.enums.contains_key(&name) || self.symbols.lookup(&name).is_some() {
                return Err(ParseError::Redefinition { line, name }.into());
            }
            self.enums.insert(name, next);
            next = next.wrapping_add(1);
            if self.token.is(",") {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect("}")?;
        self.expect(";")
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// A declaration: type prefix, then declarators separated by commas. At
    /// top level a declarator followed by `(` starts a function definition.
    fn declaration(&mut self, allow_function: bool) -> Result<(), Error> {
        debug_assert_matches!(self.token.kind, TokenKind::Ident);
        let base = self.base_type()?;
        loop {
            let mut type_name = base.clone();
            while self.token.is("*") {
                type_name.push('*');
                self.advance()?;
            }
            if self.token.kind != TokenKind::Ident {
                return Err(self.unexpected("a name"));
            }
            let name = self.token.text.clone();
            self.advance()?;

            if self.token.is("(") {
                if !allow_function {
                    return Err(self.unexpected("a variable declarator"));
                }
                return self.function(type_name, name);
            }

            self.variable(&type_name, &name)?;
            if self.token.is(",") {
                self.advance()?;
                continue;
            }
            return self.expect(";");
        }
    }

    fn base_type(&mut self) -> Result<String, Error> {
        if !self.is_type_start() {
            return Err(self.unexpected("a type"));
        }
        let mut words = vec![self.token.text.clone()];
        self.advance()?;
        while self.is_type_start() {
            words.push(self.token.text.clone());
            self.advance()?;
        }
        Ok(words.join(" "))
    }

    fn variable(&mut self, type_name: &str, name: &str) -> Result<(), Error> {
        let line = self.line();
        let mut dims: Vec<Option<usize>> = Vec::new();
        while self.token.is("[") {
            self.advance()?;
            if self.token.is("]") {
                dims.push(None);
                self.advance()?;
            } else {
                let size = self.const_expr()?;
                if size <= 0 {
                    return Err(ParseError::BadArrayShape {
                        line,
                        name: name.to_string(),
                    }
                    .into());
                }
                dims.push(Some(size as usize));
                self.expect("]")?;
            }
        }

        if dims.is_empty() {
            self.scalar_variable(type_name, name)
        } else {
            self.array_variable(type_name, name, dims, line)
        }
    }

    fn scalar_variable(&mut self, type_name: &str, name: &str) -> Result<(), Error> {
        let line = self.line();
        if self.scopes.frame().is_some() {
            let offset = self
                .scopes
                .frame_mut()
                .expect("checked above")
                .add_local(name, 1, type_name);
            self.patch_enter();
            if self.token.is("=") {
                self.advance()?;
                self.expr(",")?;
                self.emitter.emit_with(Opcode::LPUT, offset);
                self.emitter.comment(name);
            }
        } else {
            let offset = self.data.alloc_words(name, 1);
            self.symbols
                .insert_data(name, offset, 1, type_name)
                .map_err(|e| self.symbol_error_at(e, line))?;
            if self.token.is("=") {
                self.advance()?;
                let value = self.const_expr()?;
                self.data.set(offset, value);
            }
        }
        Ok(())
    }

    fn array_variable(
        &mut self,
        element_type: &str,
        name: &str,
        dims: Vec<Option<usize>>,
        line: u32,
    ) -> Result<(), Error> {
        let init = if self.token.is("=") {
            self.advance()?;
            Some(self.init_list()?)
        } else {
            None
        };

        // Omitted dimensions are inferred from the initializer's shape.
        let mut resolved = Vec::with_capacity(dims.len());
        for (depth, dim) in dims.iter().enumerate() {
            match dim {
                Some(size) => resolved.push(*size),
                None => {
                    let measured = init
                        .as_ref()
                        .and_then(|node| measure(node, depth))
                        .unwrap_or(0);
                    if measured == 0 {
                        return Err(ParseError::BadArrayShape {
                            line,
                            name: name.to_string(),
                        }
                        .into());
                    }
                    resolved.push(measured);
                }
            }
        }
        let total: usize = resolved.iter().product();
        let full_type = array_type(element_type, &resolved);

        let mut values = vec![0; total];
        let has_init = init.is_some();
        if let Some(node) = init {
            fill(&node, &resolved, 0, &mut values).map_err(|kind| match kind {
                FillError::Overflow => ParseError::InitializerOverflow {
                    line,
                    name: name.to_string(),
                },
                FillError::Shape => ParseError::BadArrayShape {
                    line,
                    name: name.to_string(),
                },
            })?;
        }

        if self.scopes.frame().is_some() {
            let offset = self
                .scopes
                .frame_mut()
                .expect("checked above")
                .add_local(name, total, &full_type);
            self.patch_enter();
            if has_init {
                // Missing elements are stored as explicit zeroes; ENTER
                // only reserves the space.
                for (index, value) in values.iter().enumerate() {
                    self.emitter.emit_with(Opcode::MOV, *value);
                    self.emitter.emit_with(Opcode::LPUT, offset + index as Word);
                }
                self.emitter.comment(name);
            }
        } else {
            let offset = self.data.alloc_words(name, total);
            self.symbols
                .insert_data(name, offset, total, &full_type)
                .map_err(|e| self.symbol_error_at(e, line))?;
            if has_init {
                for (index, value) in values.iter().enumerate() {
                    self.data.set(offset + index, *value);
                }
            }
        }
        Ok(())
    }

    /// Rewrites the current function's `ENTER` immediate to the frame's
    /// grown locals size.
    fn patch_enter(&mut self) {
        let (enter_offset, locals_size) = {
            let frame = self.scopes.frame().expect("locals need a frame");
            (frame.enter_offset, frame.locals_size)
        };
        self.emitter.set_operand(enter_offset, locals_size as Word);
    }

    fn init_list(&mut self) -> Result<InitNode, Error> {
        self.expect("{")?;
        let mut items = Vec::new();
        while !self.token.is("}") {
            if self.token.is("{") {
                items.push(self.init_list()?);
            } else {
                items.push(InitNode::Value(self.const_expr()?));
            }
            if self.token.is(",") {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect("}")?;
        Ok(InitNode::List(items))
    }

    /// A compile-time constant: an optionally signed integer or character
    /// literal, or an enum constant.
    pub(crate) fn const_expr(&mut self) -> Result<Word, Error> {
        let negative = if self.token.is("-") {
            self.advance()?;
            true
        } else {
            if self.token.is("+") {
                self.advance()?;
            }
            false
        };

        let value = match self.token.kind {
            TokenKind::Number => eval_number(&self.token.text),
            TokenKind::StrChar if self.token.text.starts_with('\'') => {
                eval_char(&self.token.text)
            }
            TokenKind::Ident => match self.enums.get(&self.token.text) {
                Some(&value) => value,
                None => return Err(self.unexpected("a constant")),
            },
            _ => return Err(self.unexpected("a constant")),
        };
        self.advance()?;
        Ok(if negative { value.wrapping_neg() } else { value })
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn function(&mut self, return_type: String, name: String) -> Result<(), Error> {
        self.advance()?;
        let mut params: Vec<(String, String)> = Vec::new();
        if !self.token.is(")") {
            loop {
                let mut param_type = self.base_type()?;
                while self.token.is("*") {
                    param_type.push('*');
                    self.advance()?;
                }
                if self.token.kind != TokenKind::Ident {
                    return Err(self.unexpected("a parameter name"));
                }
                params.push((param_type, self.token.text.clone()));
                self.advance()?;
                if self.token.is(",") {
                    self.advance()?;
                    continue;
                }
                break;
            }
        }
        self.expect(")")?;

        if self.token.is(";") {
            tracing::warn!(
                "line {}: skipping prototype of \"{}\"; a definition must precede its calls",
                self.line(),
                name
            );
            return self.advance();
        }

        let line = self.line();
        let arg_types: Vec<String> = params.iter().map(|(t, _)| t.clone()).collect();
        let count = params.len();
        let offset = self.emitter.here();
        let decorated = self
            .symbols
            .insert_code(&name, &arg_types, &return_type, count as i32, offset, false)
            .map_err(|e| self.symbol_error_at(e, line))?;
        tracing::debug!("function {} at code offset {}", decorated, offset);

        let enter_offset = self.emitter.here();
        self.emitter.emit_with(Opcode::ENTER, 0);
        self.emitter.comment(&decorated);
        self.scopes.enter_function(&name, count, enter_offset);
        tracing::trace!("frame depth now {}", self.scopes.depth());
        for (index, (param_type, param_name)) in params.iter().enumerate() {
            self.scopes
                .frame_mut()
                .expect("just entered")
                .add_arg(param_name, index, param_type);
        }

        self.expect("{")?;
        while !self.token.is("}") {
            if self.token.kind == TokenKind::Eos {
                return Err(self.unexpected("\"}\""));
            }
            let returned = self.statement()?;
            self.scopes.frame_mut().expect("in a function").returned = returned;
        }

        // Epilogue first, while the closing brace's line is still current,
        // so the listing attributes it to the brace.
        let (returned, fixed_args, frame_name) = {
            let frame = self.scopes.frame().expect("in a function");
            (frame.returned, frame.fixed_args, frame.name.clone())
        };
        if !returned {
            self.emitter.emit(Opcode::LEAVE);
            self.emitter.emit_with(Opcode::RET, fixed_args as Word);
            self.emitter.comment(&format!("end {}", frame_name));
        }
        self.scopes.leave();
        self.advance()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parses one statement. Returns true if every path through the
    /// statement ended in an explicit `return`, so the closing brace knows
    /// whether to emit the epilogue.
    fn statement(&mut self) -> Result<bool, Error> {
        if self.token.is("{") {
            self.advance()?;
            let mut returned = false;
            while !self.token.is("}") {
                if self.token.kind == TokenKind::Eos {
                    return Err(self.unexpected("\"}\""));
                }
                returned = self.statement()?;
            }
            self.advance()?;
            return Ok(returned);
        }
        if self.token.is(";") {
            self.advance()?;
            return Ok(false);
        }

        if self.token.kind == TokenKind::Ident {
            match self.token.text.as_str() {
                "if" => return self.if_statement(),
                "while" => return self.while_statement().map(|_| false),
                "do" => return self.do_statement().map(|_| false),
                "for" => return self.for_statement().map(|_| false),
                "return" => return self.return_statement().map(|_| true),
                "enum" => return self.enum_declaration().map(|_| false),
                _ if self.is_type_start() => return self.declaration(false).map(|_| false),
                _ => {}
            }
        }

        self.expr(";")?;
        self.expect(";")?;
        Ok(false)
    }

    fn if_statement(&mut self) -> Result<bool, Error> {
        self.advance()?;
        self.expect("(")?;
        self.expr(";")?;
        self.expect(")")?;

        let else_fix = self.emitter.emit_branch_fixup(Opcode::JZ);
        let then_returned = self.statement()?;
        if self.token.is("else") {
            self.advance()?;
            let end_fix = self.emitter.emit_branch_fixup(Opcode::JMP);
            self.resolve_fixup(else_fix)?;
            let else_returned = self.statement()?;
            self.resolve_fixup(end_fix)?;
            Ok(then_returned && else_returned)
        } else {
            self.resolve_fixup(else_fix)?;
            Ok(false)
        }
    }

    fn while_statement(&mut self) -> Result<(), Error> {
        self.advance()?;
        let condition = self.emitter.here();
        self.expect("(")?;
        self.expr(";")?;
        self.expect(")")?;
        let end_fix = self.emitter.emit_branch_fixup(Opcode::JZ);
        self.statement()?;
        self.branch_to(Opcode::JMP, condition)?;
        self.resolve_fixup(end_fix)
    }

    fn do_statement(&mut self) -> Result<(), Error> {
        self.advance()?;
        let body = self.emitter.here();
        self.statement()?;
        if !self.token.is("while") {
            return Err(self.unexpected("\"while\""));
        }
        self.advance()?;
        self.expect("(")?;
        self.expr(";")?;
        self.expect(")")?;
        self.expect(";")?;
        self.branch_to(Opcode::JNZ, body)
    }

    /// `for (init; cond; step) body`, emitted in source order with the step
    /// after the body in execution but before it in the code segment:
    /// init, cond, `JZ end`, `JMP body`, step, `JMP cond`, body, `JMP step`.
    fn for_statement(&mut self) -> Result<(), Error> {
        self.advance()?;
        self.expect("(")?;

        if self.token.is(";") {
            self.advance()?;
        } else if self.is_type_start() {
            self.declaration(false)?;
        } else {
            self.expr(";")?;
            self.expect(";")?;
        }

        let condition = self.emitter.here();
        let end_fix = if self.token.is(";") {
            None
        } else {
            self.expr(";")?;
            Some(self.emitter.emit_branch_fixup(Opcode::JZ))
        };
        self.expect(";")?;

        let body_fix = self.emitter.emit_branch_fixup(Opcode::JMP);
        let step = self.emitter.here();
        if !self.token.is(")") {
            self.expr(";")?;
        }
        self.expect(")")?;
        self.branch_to(Opcode::JMP, condition)?;

        self.resolve_fixup(body_fix)?;
        self.statement()?;
        self.branch_to(Opcode::JMP, step)?;
        if let Some(fix) = end_fix {
            self.resolve_fixup(fix)?;
        }
        Ok(())
    }

    fn return_statement(&mut self) -> Result<(), Error> {
        self.advance()?;
        if !self.token.is(";") {
            self.expr(";")?;
        }
        self.expect(";")?;

        let fixed_args = self.scopes.frame().map_or(0, |f| f.fixed_args);
        self.emitter.emit(Opcode::LEAVE);
        self.emitter.emit_with(Opcode::RET, fixed_args as Word);
        Ok(())
    }
}

enum FillError {
    Overflow,
    Shape,
}

/// Writes an initializer tree into the dense element vector, row-major.
fn fill(node: &InitNode, dims: &[usize], base: usize, out: &mut [Word]) -> Result<(), FillError> {
    match node {
        InitNode::Value(value) => {
            if !dims.is_empty() {
                return Err(FillError::Shape);
            }
            out[base] = *value;
            Ok(())
        }
        InitNode::List(items) => {
            let (dim, rest) = match dims.split_first() {
                Some(split) => split,
                None => return Err(FillError::Shape),
            };
            if items.len() > *dim {
                return Err(FillError::Overflow);
            }
            let stride: usize = rest.iter().product();
            for (index, item) in items.iter().enumerate() {
                fill(item, rest, base + index * stride, out)?;
            }
            Ok(())
        }
    }
}

/// Length of the longest initializer list at `depth`, used to infer an
/// omitted dimension.
fn measure(node: &InitNode, depth: usize) -> Option<usize> {
    match node {
        InitNode::Value(_) => None,
        InitNode::List(items) => {
            if depth == 0 {
                Some(items.len())
            } else {
                items.iter().filter_map(|item| measure(item, depth - 1)).max()
            }
        }
    }
}
