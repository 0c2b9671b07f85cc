//! Externally-named symbols registered before parsing begins.
//!
//! The registration order is fixed so the stream handles land on data words
//! 0 and 1 and every external's prelude slot is deterministic. Each external
//! emits a single `RET n` prelude whose address is the call target; the
//! machine recognizes the instruction pointer entering the prelude region
//! and runs the matching native handler first.

use icvm::{External, Opcode, Word, CERR_OFFSET, COUT_OFFSET};

use crate::parser::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn register_builtins(&mut self) {
        let cout = self.data.alloc_words("cout", 1);
        debug_assert_eq!(cout, COUT_OFFSET);
        self.symbols
            .insert_data("cout", cout, 1, "ostream")
            .expect("builtins register into an empty table");
        let cerr = self.data.alloc_words("cerr", 1);
        debug_assert_eq!(cerr, CERR_OFFSET);
        self.symbols
            .insert_data("cerr", cerr, 1, "ostream")
            .expect("builtins register into an empty table");

        self.external("endl", &["endl_t"], "ostream", 1, External::Endl);
        self.external(
            "operator<<",
            &["ostream", "int"],
            "ostream",
            2,
            External::PutInt,
        );
        self.external(
            "operator<<",
            &["ostream", "double"],
            "ostream",
            2,
            External::PutDouble,
        );
        self.external(
            "operator<<",
            &["ostream", "const char*"],
            "ostream",
            2,
            External::PutStr,
        );
        self.external(
            "operator<<",
            &["ostream", "(*)(endl_t)"],
            "ostream",
            2,
            External::PutEndl,
        );
        self.external("printf", &["const char*"], "int", -1, External::Printf);
    }

    fn external(
        &mut self,
        bare: &str,
        arg_types: &[&str],
        return_type: &str,
        arg_count: i32,
        handler: External,
    ) {
        let arg_types: Vec<String> = arg_types.iter().map(|s| s.to_string()).collect();
        let offset = self.emitter.here();
        let decorated = self
            .symbols
            .insert_code(bare, &arg_types, return_type, arg_count, offset, true)
            .expect("builtin names are disjoint");

        // Variadic preludes return without cleaning anything; the caller
        // drops the count word and arguments with ADJ.
        let cleaned = if arg_count < 0 { 0 } else { arg_count };
        self.emitter.emit_with(Opcode::RET, cleaned as Word);
        self.emitter.comment(&decorated);
        self.externals.push(handler);
    }
}
