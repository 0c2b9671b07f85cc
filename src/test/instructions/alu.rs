use crate::test::*;
use crate::*;

fn binary(op: Opcode, left: Word, right: Word) -> Word {
    let code = vec![
        enum_to_word(Opcode::MOV),
        left,
        enum_to_word(Opcode::PUSH),
        enum_to_word(Opcode::MOV),
        right,
        enum_to_word(op),
        enum_to_word(Opcode::EXIT),
    ];
    exit_value(&code)
}

#[test]
fn add() {
    assert_eq!(binary(Opcode::ADD, 2, 3), 5);
}

#[test]
fn sub_is_stack_minus_accumulator() {
    assert_eq!(binary(Opcode::SUB, 10, 4), 6);
}

#[test]
fn mul() {
    assert_eq!(binary(Opcode::MUL, -6, 7), -42);
}

#[test]
fn div_truncates_toward_zero() {
    assert_eq!(binary(Opcode::DIV, 7, 2), 3);
    assert_eq!(binary(Opcode::DIV, -7, 2), -3);
}

#[test]
fn modulo() {
    assert_eq!(binary(Opcode::MOD, 7, 3), 1);
    assert_eq!(binary(Opcode::MOD, -7, 3), -1);
}

#[test]
fn shl_shifts_left() {
    assert_eq!(binary(Opcode::SHL, 1, 4), 16);
}

#[test]
fn shr_is_arithmetic() {
    assert_eq!(binary(Opcode::SHR, -8, 1), -4);
    assert_eq!(binary(Opcode::SHR, 8, 2), 2);
}

#[test]
fn oversized_shift_does_not_fault() {
    // Implementation-defined result, but the machine must keep running.
    let code = code![(MOV 1), (PUSH), (MOV 77), (SHL), (MOV 3), (EXIT)];
    assert_eq!(exit_value(&code), 3);
}

#[test]
fn bitwise() {
    assert_eq!(binary(Opcode::AND, 6, 3), 2);
    assert_eq!(binary(Opcode::OR, 6, 3), 7);
}

#[test]
fn wrapping_overflow() {
    assert_eq!(binary(Opcode::ADD, Word::max_value(), 1), Word::min_value());
}
