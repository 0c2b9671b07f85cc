use crate::test::*;
use crate::*;

#[test]
fn mov_loads_immediate() {
    assert_eq!(exit_value(&code![(MOV - 3), (EXIT)]), -3);
}

#[test]
fn lea_loads_address() {
    assert_eq!(exit_value(&code![(LEA 3), (EXIT)]), 3);
}

#[test]
fn get_put_globals() {
    let code = code![(MOV 9), (PUT 1), (MOV 0), (GET 1), (EXIT)];
    let run = run_with(&[0, 0], &code, &[], &[]);
    assert_eq!(run.result, Ok(9));
}

#[test]
fn get_outside_memory() {
    let code = code![(GET 100_000), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::Memory);
}
