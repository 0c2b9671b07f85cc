use std::collections::HashMap;

use super::*;

macro_rules! instr {
    ($op:ident) => {
        vec![enum_to_word(Opcode::$op)]
    };
    ($op:ident $imm:expr) => {
        vec![enum_to_word(Opcode::$op), $imm as Word]
    };
}

macro_rules! code {
    [$( ($( $t:tt )+) ),* $(,)?] => {{
        let mut words: Vec<Word> = Vec::new();
        $( words.extend(instr!($($t)+)); )*
        words
    }};
}

pub struct Run {
    pub result: Result<Word, RuntimeError>,
    pub memory: Memory,
    pub registers: Registers,
    pub out: Vec<u8>,
    pub err: Vec<u8>,
}

pub fn make_program(data: &[Word], code: &[Word], externals: &[External]) -> Program {
    Program::new(
        Vec::from(data),
        Vec::from(code),
        externals.len() * constants::PRELUDE_WORDS,
        0,
        Vec::from(externals),
        Vec::new(),
        HashMap::new(),
        Vec::new(),
    )
}

pub fn run_with(data: &[Word], code: &[Word], externals: &[External], args: &[&str]) -> Run {
    let program = make_program(data, code, externals);
    let image = load(&program, args, 4096).unwrap();
    let Image {
        mut memory,
        registers,
        layout,
    } = image;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut processor = Processor::new(registers);
    let result = {
        let mut host = Host::new(&mut out, &mut err);
        processor.run(&mut memory, &layout, program.externals(), &mut host)
    };

    Run {
        result,
        memory,
        registers: *processor.registers(),
        out,
        err,
    }
}

pub fn run_code(code: &[Word]) -> Run {
    run_with(&[], code, &[], &[])
}

/// Runs a program that must exit cleanly and returns its result value.
pub fn exit_value(code: &[Word]) -> Word {
    let run = run_code(code);
    run.result.expect("program should exit cleanly")
}

#[test]
fn exit_returns_accumulator() {
    let code = code![(MOV 42), (EXIT)];
    assert_eq!(exit_value(&code), 42);
}

#[test]
fn empty_entry_hits_sentinel() {
    // With no code at all the entry point is the loader's sentinel itself.
    let run = run_code(&[]);
    assert_eq!(run.result, Ok(0));
}

#[test]
fn seeded_frame_shape() {
    // argc, argv and the exit sentinel are stacked in that order.
    let code = code![(EXIT)];
    let run = run_with(&[], &code, &[], &["prog", "x"]);
    let sp = run.registers.sp;
    let argc = run.memory.read(sp + 2).unwrap();
    let argv = run.memory.read(sp + 1).unwrap();
    let sentinel = run.memory.read(sp).unwrap();
    assert_eq!(argc, 2);
    assert_eq!(sentinel, code.len() as Word);

    let first = run.memory.read(argv as usize).unwrap() as usize;
    assert_eq!(run.memory.read_c_string(first).unwrap(), b"prog".to_vec());
    let second = run.memory.read(argv as usize + 1).unwrap() as usize;
    assert_eq!(run.memory.read_c_string(second).unwrap(), b"x".to_vec());
    assert_eq!(run.memory.read(argv as usize + 2).unwrap(), 0);
}

#[test]
fn data_segment_loads_at_zero() {
    let code = code![(GET 1), (EXIT)];
    let run = run_with(&[7, 19], &code, &[], &[]);
    assert_eq!(run.result, Ok(19));
}

#[test]
fn too_large_program_is_refused() {
    let program = make_program(&[0; 64], &[], &[]);
    match load(&program, &[] as &[&str], 32) {
        Err(LoadError::TooLarge { available: 32, .. }) => {}
        other => panic!("expected TooLarge, got {:?}", other.map(|_| ())),
    }
}

mod instructions;
