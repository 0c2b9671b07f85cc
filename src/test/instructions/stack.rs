use crate::test::*;
use crate::*;

#[test]
fn push_pop() {
    let code = code![(MOV 7), (PUSH), (MOV 0), (POP), (EXIT)];
    assert_eq!(exit_value(&code), 7);
}

#[test]
fn adj_discards_top_words() {
    let code = code![(MOV 5), (PUSH), (MOV 6), (PUSH), (ADJ 1), (POP), (EXIT)];
    assert_eq!(exit_value(&code), 5);
}

#[test]
fn adj_outside_memory() {
    let code = code![(ADJ 100_000), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::Memory);
}

#[test]
fn adj_below_zero() {
    let code = code![(ADJ - 100_000), (EXIT)];
    let run = run_code(&code);
    assert_eq!(run.result.unwrap_err().trap, Trap::Memory);
}
