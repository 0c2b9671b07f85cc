use crate::test::*;
use crate::*;

#[test]
fn sget_loads_through_address() {
    let code = code![(MOV 1), (PUSH), (SGET), (EXIT)];
    let run = run_with(&[0, 55], &code, &[], &[]);
    assert_eq!(run.result, Ok(55));
}

#[test]
fn sput_stores_through_address() {
    let code = code![(MOV 2), (PUSH), (MOV 77), (SPUT), (GET 2), (EXIT)];
    let run = run_with(&[0, 0, 0], &code, &[], &[]);
    assert_eq!(run.result, Ok(77));
    assert_eq!(run.memory.read(2), Ok(77));
}

#[test]
fn sput_keeps_value_in_accumulator() {
    let code = code![(MOV 1), (PUSH), (MOV 12), (SPUT), (EXIT)];
    let run = run_with(&[0, 0], &code, &[], &[]);
    assert_eq!(run.result, Ok(12));
}

#[test]
fn sget_negative_address() {
    let code = code![(MOV - 4), (PUSH), (SGET), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::Memory);
}
