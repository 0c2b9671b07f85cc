use crate::test::*;
use crate::*;

#[test]
fn division_by_zero() {
    let code = code![(MOV 5), (PUSH), (MOV 0), (DIV), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::DivisionByZero);
}

#[test]
fn remainder_by_zero() {
    let code = code![(MOV 5), (PUSH), (MOV 0), (MOD), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::DivisionByZero);
}

#[test]
fn fault_reports_registers() {
    let code = code![(MOV 1), (PUSH), (MOV 0), (DIV), (EXIT)];
    let error = run_code(&code).result.unwrap_err();
    // The DIV at offset 5 was fetched, so ip points past it.
    assert_eq!(error.registers.ip, 6);
    assert_eq!(error.trap, Trap::DivisionByZero);
}

#[test]
fn fault_inside_call_has_backtrace() {
    let code = code![
        (CALL 1),
        (EXIT),
        (ENTER 0),
        (MOV 1),
        (PUSH),
        (MOV 0),
        (DIV),
        (LEAVE),
        (RET 0)
    ];
    let error = run_code(&code).result.unwrap_err();
    assert_eq!(error.trap, Trap::DivisionByZero);
    // The return address pushed by CALL points at the EXIT after it.
    assert_eq!(error.backtrace, vec![2]);
}

#[test]
fn unknown_opcode_warns_and_continues() {
    let code = vec![
        99,
        enum_to_word(Opcode::MOV),
        3,
        enum_to_word(Opcode::EXIT),
    ];
    assert_eq!(exit_value(&code), 3);
}
