//! Typed expression compiler.
//!
//! A precedence-driven walk that emits postfix-order instructions as it
//! consumes tokens and returns the declared type name of the value left in
//! `ax`. Each call is bounded by a `stop` token: binary operators are
//! consumed only while they bind tighter than the stop, so a recursive call
//! with the current operator as the new stop yields left associativity.
//!
//! Precedence classes, tightest first (lower numbers bind tighter):
//!
//! ```text
//! 1   ::
//! 2   prefix ++ -- ! ~ * &
//! 3   .* ->*
//! 4   * / %
//! 5   + -
//! 6   << >>
//! 7   <=>
//! 8   < <= > >=
//! 9   == !=
//! 10  &
//! 11  ^
//! 12  |
//! 13  &&
//! 14  ||
//! 15  ?: and assignments
//! 16  ,
//! 17  sentinels: { } ( ) [ ] ;
//! ```

use icvm::{Opcode, Word};

use crate::error::{Error, ParseError};
use crate::lexer::{eval_char, eval_number, eval_string, TokenKind};
use crate::parser::Parser;
use crate::symbols::{SymbolError, SymbolKind};

/// Sentinel precedence: nothing at this level is consumed as an operator.
const SENTINEL: u8 = 17;

pub(crate) fn precedence(op: &str) -> u8 {
    match op {
        "::" => 1,
        ".*" | "->*" => 3,
        "*" | "/" | "%" => 4,
        "+" | "-" => 5,
        "<<" | ">>" => 6,
        "<=>" => 7,
        "<" | "<=" | ">" | ">=" => 8,
        "==" | "!=" => 9,
        "&" => 10,
        "^" => 11,
        "|" => 12,
        "&&" => 13,
        "||" => 14,
        "?" | ":" | "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "&=" | "^="
        | "|=" => 15,
        "," => 16,
        _ => SENTINEL,
    }
}

/// Binary operators on two `int` operands and the opcode each emits.
fn int_opcode(op: &str) -> Option<Opcode> {
    Some(match op {
        "*" => Opcode::MUL,
        "/" => Opcode::DIV,
        "%" => Opcode::MOD,
        "+" => Opcode::ADD,
        "-" => Opcode::SUB,
        "<<" => Opcode::SHL,
        ">>" => Opcode::SHR,
        "<" => Opcode::LT,
        "<=" => Opcode::LE,
        ">" => Opcode::GT,
        ">=" => Opcode::GE,
        "==" => Opcode::EQ,
        "!=" => Opcode::NE,
        "&" => Opcode::AND,
        "|" => Opcode::OR,
        "&&" => Opcode::LAND,
        "||" => Opcode::LOR,
        _ => return None,
    })
}

/// Compound assignment operators and the opcode combining old and new value.
fn compound_opcode(op: &str) -> Option<Opcode> {
    Some(match op {
        "+=" => Opcode::ADD,
        "-=" => Opcode::SUB,
        "*=" => Opcode::MUL,
        "/=" => Opcode::DIV,
        "%=" => Opcode::MOD,
        "<<=" => Opcode::SHL,
        ">>=" => Opcode::SHR,
        "&=" => Opcode::AND,
        "|=" => Opcode::OR,
        _ => return None,
    })
}

/// A scalar's load yields its value; everything else loads as an address.
/// Aggregates (array types) and the stream and marker types are the
/// non-scalars of this machine.
fn is_scalar(type_name: &str) -> bool {
    !(type_name.ends_with(']') || type_name == "ostream" || type_name == "endl_t")
}

/// Splits `int[2][3]` into its element type and dimension list.
fn split_array_type(type_name: &str) -> (String, Vec<usize>) {
    match type_name.find('[') {
        None => (type_name.to_string(), Vec::new()),
        Some(at) => {
            let base = type_name[..at].to_string();
            let dims = type_name[at..]
                .split('[')
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches(']').parse().unwrap_or(0))
                .collect();
            (base, dims)
        }
    }
}

/// Rebuilds an array type name from element type and dimensions.
pub(crate) fn array_type(base: &str, dims: &[usize]) -> String {
    let mut name = base.to_string();
    for d in dims {
        name.push_str(&format!("[{}]", d));
    }
    name
}

/// Function-pointer type of a bare function reference, derived from its
/// decorated name: `endl(endl_t)` becomes `(*)(endl_t)`.
fn fn_pointer_type(bare: &str, decorated: &str) -> String {
    format!("(*){}", &decorated[bare.len()..])
}

impl<'a> Parser<'a> {
    /// Compiles one expression, leaving its value in `ax`, and returns its
    /// type name. Operators are consumed while they bind tighter than
    /// `stop`; `,` always stops unless it is the caller's own stop.
    pub(crate) fn expr(&mut self, stop: &str) -> Result<String, Error> {
        let left = self.unary(true)?;
        self.binary_loop(left, stop)
    }

    fn binary_loop(&mut self, mut left: String, stop: &str) -> Result<String, Error> {
        loop {
            if self.token.kind != TokenKind::Operator {
                return Ok(left);
            }
            let op = self.token.text.clone();
            if precedence(&op) >= precedence(stop) || op == "," {
                return Ok(left);
            }
            if op == "?" {
                left = self.conditional(stop)?;
                continue;
            }

            self.advance()?;
            self.emitter.emit(Opcode::PUSH);
            let right = self.expr(&op)?;
            left = self.apply_binary(&op, &left, &right)?;
        }
    }

    /// `c ? a : b`: branch over the then-arm on false, over the else-arm
    /// after it.
    fn conditional(&mut self, stop: &str) -> Result<String, Error> {
        self.advance()?;
        let else_fix = self.emitter.emit_branch_fixup(Opcode::JZ);
        let then_type = self.expr(":")?;
        self.expect(":")?;
        let end_fix = self.emitter.emit_branch_fixup(Opcode::JMP);
        self.resolve_fixup(else_fix)?;
        self.expr(stop)?;
        self.resolve_fixup(end_fix)?;
        Ok(then_type)
    }

    /// The left operand is already pushed and the right sits in `ax`.
    fn apply_binary(&mut self, op: &str, left: &str, right: &str) -> Result<String, Error> {
        if left == "int" && right == "int" {
            if let Some(opcode) = int_opcode(op) {
                self.emitter.emit(opcode);
                return Ok("int".to_string());
            }
        }

        // Not plain integer arithmetic: an operator overload carries it,
        // with both operands on the stack.
        let bare = format!("operator{}", op);
        let arg_types = [left.to_string(), right.to_string()];
        let (offset, decorated, return_type) = {
            let (decorated, symbol) = self
                .symbols
                .resolve_call(&bare, &arg_types)
                .map_err(|e| self.symbol_error(e))?;
            (
                symbol.code_offset().expect("operators are code symbols"),
                decorated.to_string(),
                symbol.type_name.clone(),
            )
        };
        self.emitter.emit(Opcode::PUSH);
        self.branch_to(Opcode::CALL, offset)?;
        self.emitter.comment(&decorated);
        Ok(return_type)
    }

    /// Parses one unary expression. `assignable` says whether a trailing
    /// assignment operator belongs to this operand; dereference and indexing
    /// parse their operands with it cleared, so `*p = e` stores through the
    /// pointer instead of letting `p` itself capture the `=`.
    fn unary(&mut self, assignable: bool) -> Result<String, Error> {
        match self.token.kind {
            TokenKind::Number => {
                let value = eval_number(&self.token.text);
                self.advance()?;
                self.emitter.emit_with(Opcode::MOV, value);
                Ok("int".to_string())
            }
            TokenKind::StrChar => {
                if self.token.text.starts_with('\'') {
                    let value = eval_char(&self.token.text);
                    self.advance()?;
                    self.emitter.emit_with(Opcode::MOV, value);
                    Ok("int".to_string())
                } else {
                    let bytes = eval_string(&self.token.text);
                    self.advance()?;
                    let offset = self.data.alloc_string(&bytes);
                    self.emitter.emit_with(Opcode::LEA, offset as Word);
                    self.emitter
                        .comment(&format!("\"{}\"", String::from_utf8_lossy(&bytes)));
                    Ok("const char*".to_string())
                }
            }
            TokenKind::Ident => {
                if self.token.is("sizeof") {
                    self.size_of()
                } else {
                    self.identifier_expr(assignable)
                }
            }
            TokenKind::Operator => {
                let op = self.token.text.clone();
                match op.as_str() {
                    "(" => {
                        self.advance()?;
                        let inner = self.expr(";")?;
                        self.expect(")")?;
                        Ok(inner)
                    }
                    "++" | "--" => self.prefix_incdec(op == "++"),
                    "+" => {
                        self.advance()?;
                        self.unary(assignable)
                    }
                    "-" => {
                        self.advance()?;
                        self.unary(false)?;
                        self.emitter.emit(Opcode::NEG);
                        Ok("int".to_string())
                    }
                    "!" => {
                        self.advance()?;
                        self.unary(false)?;
                        self.emitter.emit(Opcode::LNOT);
                        Ok("int".to_string())
                    }
                    "~" => {
                        self.advance()?;
                        self.unary(false)?;
                        self.emitter.emit(Opcode::NOT);
                        Ok("int".to_string())
                    }
                    "*" => self.deref(assignable),
                    "&" => self.address_of(),
                    _ => Err(self.unexpected("an expression")),
                }
            }
            TokenKind::Unknown | TokenKind::Eos => Err(self.unexpected("an expression")),
        }
    }

    /// `sizeof(expr)` and `sizeof(type)`: the operand is parsed and
    /// discarded; every value in this machine is one word.
    fn size_of(&mut self) -> Result<String, Error> {
        self.advance()?;
        self.expect("(")?;
        if self.is_type_start() {
            while !self.token.is(")") {
                if self.token.kind == TokenKind::Eos {
                    return Err(self.unexpected(")"));
                }
                self.advance()?;
            }
        } else {
            let checkpoint = self.emitter.checkpoint();
            self.expr(";")?;
            self.emitter.rollback(checkpoint);
        }
        self.expect(")")?;
        self.emitter.emit_with(Opcode::MOV, 1);
        Ok("int".to_string())
    }

    fn prefix_incdec(&mut self, increment: bool) -> Result<String, Error> {
        let line = self.line();
        self.advance()?;
        if self.token.kind != TokenKind::Ident {
            return Err(self.unexpected("an identifier"));
        }
        let name = self.token.text.clone();
        self.advance()?;
        let (local, offset, type_name) = self.lvalue_place(&name)?;
        if type_name != "int" {
            return Err(ParseError::TypeError {
                line,
                message: format!("++/-- needs an int target, \"{}\" is {}", name, type_name),
            }
            .into());
        }

        self.load(local, offset, &name);
        self.emitter
            .emit(if increment { Opcode::INC } else { Opcode::DEC });
        self.store(local, offset, &name);
        Ok("int".to_string())
    }

    /// `*p` loads through the pointer; `*p = e` and the compound forms
    /// store through it. The operand is parsed value-only so the pointer
    /// variable itself cannot capture the trailing assignment, and the
    /// pointee access goes through the shared element machinery.
    fn deref(&mut self, assignable: bool) -> Result<String, Error> {
        let line = self.line();
        self.advance()?;
        let operand = self.unary(false)?;
        if !operand.ends_with('*') {
            return Err(ParseError::TypeError {
                line,
                message: format!("cannot dereference a value of type {}", operand),
            }
            .into());
        }
        let pointee = operand[..operand.len() - 1].to_string();
        self.element_access(&pointee, assignable)
    }

    /// `&name` yields the variable's address.
    fn address_of(&mut self) -> Result<String, Error> {
        self.advance()?;
        if self.token.kind != TokenKind::Ident {
            return Err(self.unexpected("an identifier"));
        }
        let name = self.token.text.clone();
        self.advance()?;
        let (local, offset, type_name) = self.lvalue_place(&name)?;
        self.address(local, offset, &name);
        Ok(format!("{}*", type_name))
    }

    fn identifier_expr(&mut self, assignable: bool) -> Result<String, Error> {
        let name = self.token.text.clone();
        self.advance()?;

        if self.token.is("(") {
            return self.call(&name);
        }

        if let Some(var) = self.scopes.lookup(&name).cloned() {
            return self.variable_expr(&name, true, var.offset, &var.type_name, assignable);
        }

        if let Some(&value) = self.enums.get(&name) {
            self.emitter.emit_with(Opcode::MOV, value);
            self.emitter.comment(&name);
            return Ok("int".to_string());
        }

        if let Some(symbol) = self.symbols.lookup(&name) {
            if let SymbolKind::Data { offset, .. } = symbol.kind {
                let type_name = symbol.type_name.clone();
                return self.variable_expr(&name, false, offset as Word, &type_name, assignable);
            }
        }

        // A bare function reference: its value is the code offset, its type
        // the function-pointer form of the decorated name.
        let (offset, pointer_type, decorated) = {
            let (decorated, symbol) = self
                .symbols
                .resolve_single(&name)
                .map_err(|e| self.symbol_error(e))?;
            (
                symbol.code_offset().expect("groups hold code symbols"),
                fn_pointer_type(&name, decorated),
                decorated.to_string(),
            )
        };
        self.emitter.emit_with(Opcode::MOV, offset as Word);
        self.emitter.comment(&decorated);
        Ok(pointer_type)
    }

    /// A named variable followed by its postfix forms: assignment, compound
    /// assignment, `++`/`--`, indexing, or a plain load. With `assignable`
    /// cleared the assignment forms are left for the caller.
    fn variable_expr(
        &mut self,
        name: &str,
        local: bool,
        offset: Word,
        type_name: &str,
        assignable: bool,
    ) -> Result<String, Error> {
        let line = self.line();

        if assignable && self.token.is("=") {
            self.advance()?;
            self.address(local, offset, name);
            self.emitter.emit(Opcode::PUSH);
            self.expr(",")?;
            self.emitter.emit(Opcode::SPUT);
            return Ok(type_name.to_string());
        }

        if assignable {
            if let Some(opcode) = compound_opcode(&self.token.text) {
                self.advance()?;
                self.address(local, offset, name);
                self.emitter.emit(Opcode::PUSH);
                self.load(local, offset, name);
                self.emitter.emit(Opcode::PUSH);
                self.expr(",")?;
                self.emitter.emit(opcode);
                self.emitter.emit(Opcode::SPUT);
                return Ok("int".to_string());
            }
            if self.token.is("^=") {
                return Err(ParseError::TypeError {
                    line,
                    message: "the machine has no exclusive-or instruction".to_string(),
                }
                .into());
            }
        }

        if self.token.is("++") || self.token.is("--") {
            let increment = self.token.is("++");
            if type_name != "int" {
                return Err(ParseError::TypeError {
                    line,
                    message: format!("++/-- needs an int target, \"{}\" is {}", name, type_name),
                }
                .into());
            }
            self.advance()?;
            self.load(local, offset, name);
            self.emitter.emit(Opcode::PUSH);
            self.emitter
                .emit(if increment { Opcode::INC } else { Opcode::DEC });
            self.store(local, offset, name);
            self.emitter.emit(Opcode::POP);
            return Ok("int".to_string());
        }

        if self.token.is("[") {
            if type_name.ends_with('*') {
                return self.pointer_index(name, local, offset, type_name, assignable);
            }
            if type_name.ends_with(']') {
                return self.array_index(name, local, offset, type_name, assignable);
            }
            return Err(ParseError::TypeError {
                line,
                message: format!("\"{}\" of type {} cannot be indexed", name, type_name),
            }
            .into());
        }

        if is_scalar(type_name) {
            self.load(local, offset, name);
        } else {
            self.address(local, offset, name);
        }
        Ok(type_name.to_string())
    }

    /// Pointer-style indexing: each bracket level adds the index (elements
    /// are one word) and loads through the sum, stripping one `*`.
    fn pointer_index(
        &mut self,
        name: &str,
        local: bool,
        offset: Word,
        type_name: &str,
        assignable: bool,
    ) -> Result<String, Error> {
        let line = self.line();
        let mut current = type_name.to_string();
        self.load(local, offset, name);

        while self.token.is("[") {
            if !current.ends_with('*') {
                return Err(ParseError::TypeError {
                    line,
                    message: format!("too many subscripts for {}", type_name),
                }
                .into());
            }
            self.advance()?;
            self.emitter.emit(Opcode::PUSH);
            self.expr(";")?;
            self.expect("]")?;
            self.emitter.emit(Opcode::ADD);
            current.truncate(current.len() - 1);

            if self.token.is("[") {
                self.emitter.emit(Opcode::PUSH);
                self.emitter.emit(Opcode::SGET);
            }
        }

        self.element_access(&current, assignable)
    }

    /// Array indexing: the flat row-major index over the declared
    /// dimensions, added to the array's base address.
    fn array_index(
        &mut self,
        name: &str,
        local: bool,
        offset: Word,
        type_name: &str,
        assignable: bool,
    ) -> Result<String, Error> {
        let line = self.line();
        let (base_type, dims) = split_array_type(type_name);

        self.address(local, offset, name);
        self.emitter.emit(Opcode::PUSH);

        let mut consumed = 0;
        while self.token.is("[") {
            if consumed == dims.len() {
                return Err(ParseError::TypeError {
                    line,
                    message: format!("too many subscripts for {}", type_name),
                }
                .into());
            }
            self.advance()?;
            if consumed > 0 {
                // Accumulated index in ax: scale by this dimension, then
                // add the next subscript.
                self.emitter.emit(Opcode::PUSH);
                self.emitter.emit_with(Opcode::MOV, dims[consumed] as Word);
                self.emitter.emit(Opcode::MUL);
                self.emitter.emit(Opcode::PUSH);
                self.expr(";")?;
                self.emitter.emit(Opcode::ADD);
            } else {
                self.expr(";")?;
            }
            self.expect("]")?;
            consumed += 1;
        }

        if consumed < dims.len() {
            // Partial indexing addresses a sub-array: scale by the size of
            // the remaining dimensions.
            let remaining: usize = dims[consumed..].iter().product();
            self.emitter.emit(Opcode::PUSH);
            self.emitter.emit_with(Opcode::MOV, remaining as Word);
            self.emitter.emit(Opcode::MUL);
        }
        self.emitter.emit(Opcode::ADD);

        if consumed < dims.len() {
            return Ok(array_type(&base_type, &dims[consumed..]));
        }
        self.element_access(&base_type, assignable)
    }

    /// The element address is in `ax`: store through it on assignment,
    /// otherwise load the element. With `assignable` cleared only the load
    /// form applies; any assignment operator is the caller's.
    fn element_access(&mut self, element_type: &str, assignable: bool) -> Result<String, Error> {
        if assignable && self.token.is("=") {
            self.advance()?;
            self.emitter.emit(Opcode::PUSH);
            self.expr(",")?;
            self.emitter.emit(Opcode::SPUT);
            return Ok(element_type.to_string());
        }
        if assignable {
            if let Some(opcode) = compound_opcode(&self.token.text) {
                self.advance()?;
                // Two copies of the address: one feeds the reload, the
                // other the final store.
                self.emitter.emit(Opcode::PUSH);
                self.emitter.emit(Opcode::PUSH);
                self.emitter.emit(Opcode::SGET);
                self.emitter.emit(Opcode::PUSH);
                self.expr(",")?;
                self.emitter.emit(opcode);
                self.emitter.emit(Opcode::SPUT);
                return Ok("int".to_string());
            }
        }

        self.emitter.emit(Opcode::PUSH);
        self.emitter.emit(Opcode::SGET);
        Ok(element_type.to_string())
    }

    /// A call: arguments are compiled and pushed left to right, the overload
    /// resolved from their types, and the call emitted. Variadic calls push
    /// the count of variadic arguments last and clean the stack afterwards.
    fn call(&mut self, bare: &str) -> Result<String, Error> {
        self.expect("(")?;
        let mut arg_types = Vec::new();
        if !self.token.is(")") {
            loop {
                let arg_type = self.expr(",")?;
                self.emitter.emit(Opcode::PUSH);
                arg_types.push(arg_type);
                if self.token.is(",") {
                    self.advance()?;
                    continue;
                }
                break;
            }
        }
        self.expect(")")?;

        let (offset, decorated, return_type, variadic, fixed) = {
            let (decorated, symbol) = self
                .symbols
                .resolve_call(bare, &arg_types)
                .map_err(|e| self.symbol_error(e))?;
            (
                symbol.code_offset().expect("groups hold code symbols"),
                decorated.to_string(),
                symbol.type_name.clone(),
                symbol.is_variadic(),
                symbol.fixed_args(),
            )
        };

        if variadic {
            // The callee's prelude is RET 0; the caller publishes the
            // variadic count just below the return address and cleans the
            // whole argument block afterwards.
            let variadic_count = arg_types.len() - fixed;
            self.emitter.emit_with(Opcode::MOV, variadic_count as Word);
            self.emitter.emit(Opcode::PUSH);
            self.branch_to(Opcode::CALL, offset)?;
            self.emitter.comment(&decorated);
            self.emitter
                .emit_with(Opcode::ADJ, (variadic_count + 1 + fixed) as Word);
        } else {
            self.branch_to(Opcode::CALL, offset)?;
            self.emitter.comment(&decorated);
        }
        Ok(return_type)
    }

    fn load(&mut self, local: bool, offset: Word, name: &str) {
        if local {
            self.emitter.emit_with(Opcode::LGET, offset);
        } else {
            self.emitter.emit_with(Opcode::GET, offset);
        }
        self.emitter.comment(name);
    }

    fn store(&mut self, local: bool, offset: Word, name: &str) {
        if local {
            self.emitter.emit_with(Opcode::LPUT, offset);
        } else {
            self.emitter.emit_with(Opcode::PUT, offset);
        }
        self.emitter.comment(name);
    }

    fn address(&mut self, local: bool, offset: Word, name: &str) {
        if local {
            self.emitter.emit_with(Opcode::LLEA, offset);
        } else {
            self.emitter.emit_with(Opcode::LEA, offset);
        }
        self.emitter.comment(name);
    }

    /// Resolves `name` to an addressable variable: a frame slot or a global.
    fn lvalue_place(&mut self, name: &str) -> Result<(bool, Word, String), Error> {
        if let Some(var) = self.scopes.lookup(name) {
            return Ok((true, var.offset, var.type_name.clone()));
        }
        if let Some(symbol) = self.symbols.lookup(name) {
            if let SymbolKind::Data { offset, .. } = symbol.kind {
                return Ok((false, offset as Word, symbol.type_name.clone()));
            }
        }
        Err(ParseError::UnknownSymbol {
            line: self.line(),
            name: name.to_string(),
        }
        .into())
    }

    pub(crate) fn symbol_error(&self, error: SymbolError) -> Error {
        self.symbol_error_at(error, self.line())
    }
}
