use crate::test::*;
use crate::*;

#[test]
fn jmp_skips_forward() {
    let code = code![(MOV 1), (JMP 2), (MOV 0), (EXIT)];
    assert_eq!(exit_value(&code), 1);
}

#[test]
fn jz_taken_only_on_zero() {
    let taken = code![(MOV 0), (JZ 2), (MOV 7), (EXIT)];
    assert_eq!(exit_value(&taken), 0);

    let skipped = code![(MOV 1), (JZ 2), (MOV 7), (EXIT)];
    assert_eq!(exit_value(&skipped), 7);
}

#[test]
fn jnz_taken_only_on_nonzero() {
    let taken = code![(MOV 3), (JNZ 2), (MOV 7), (EXIT)];
    assert_eq!(exit_value(&taken), 3);

    let skipped = code![(MOV 0), (JNZ 2), (MOV 7), (EXIT)];
    assert_eq!(exit_value(&skipped), 7);
}

#[test]
fn call_ret_with_argument() {
    // Calls a routine that returns its argument plus one and cleans the
    // stacked argument with RET 1.
    let code = code![
        (MOV 5),
        (PUSH),
        (CALL 1),
        (EXIT),
        (ENTER 0),
        (LGET 2),
        (INC),
        (LEAVE),
        (RET 1)
    ];
    assert_eq!(exit_value(&code), 6);
}

#[test]
fn backward_jump_loops() {
    let code = code![
        (GET 0),
        (JZ 7),
        (GET 0),
        (DEC),
        (PUT 0),
        (JMP - 11),
        (EXIT)
    ];
    let run = run_with(&[3], &code, &[], &[]);
    assert_eq!(run.result, Ok(0));
    assert_eq!(run.memory.read(0), Ok(0));
}

#[test]
fn jump_outside_code_segment() {
    let code = code![(JMP 100), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::BadJump(102));
}

#[test]
fn jump_before_code_segment() {
    let data = [0; 4];
    let code = code![(JMP - 100), (EXIT)];
    let run = run_with(&data, &code, &[], &[]);
    // code_base is 4, so the resolved target 4 + 2 - 100 is far below it.
    assert_eq!(run.result.unwrap_err().trap, Trap::BadJump(-94));
}
