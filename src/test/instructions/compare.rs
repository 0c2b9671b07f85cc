use crate::test::*;
use crate::*;

fn compare(op: Opcode, left: Word, right: Word) -> Word {
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
fn eq_ne() {
    assert_eq!(compare(Opcode::EQ, 4, 4), 1);
    assert_eq!(compare(Opcode::EQ, 4, 5), 0);
    assert_eq!(compare(Opcode::NE, 4, 4), 0);
    assert_eq!(compare(Opcode::NE, 4, 5), 1);
}

#[test]
fn orderings_apply_to_stacked_left_operand() {
    assert_eq!(compare(Opcode::LT, 3, 5), 1);
    assert_eq!(compare(Opcode::LT, 5, 3), 0);
    assert_eq!(compare(Opcode::GT, 5, 3), 1);
    assert_eq!(compare(Opcode::GE, 3, 3), 1);
    assert_eq!(compare(Opcode::LE, 4, 3), 0);
}

#[test]
fn signed_comparison() {
    assert_eq!(compare(Opcode::LT, -1, 0), 1);
}

#[test]
fn logical_connectives() {
    assert_eq!(compare(Opcode::LAND, 2, 3), 1);
    assert_eq!(compare(Opcode::LAND, 0, 3), 0);
    assert_eq!(compare(Opcode::LOR, 0, 3), 1);
    assert_eq!(compare(Opcode::LOR, 0, 0), 0);
}
