use crate::test::*;
use crate::*;

#[test]
fn neg() {
    assert_eq!(exit_value(&code![(MOV 42), (NEG), (EXIT)]), -42);
}

#[test]
fn inc_dec() {
    assert_eq!(exit_value(&code![(MOV 7), (INC), (EXIT)]), 8);
    assert_eq!(exit_value(&code![(MOV 7), (DEC), (EXIT)]), 6);
}

#[test]
fn not_flips_bits() {
    assert_eq!(exit_value(&code![(MOV 5), (NOT), (EXIT)]), -6);
}

#[test]
fn lnot_tests_for_zero() {
    assert_eq!(exit_value(&code![(MOV 0), (LNOT), (EXIT)]), 1);
    assert_eq!(exit_value(&code![(MOV 9), (LNOT), (EXIT)]), 0);
}
