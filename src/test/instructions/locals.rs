use crate::test::*;
use crate::*;

#[test]
fn lput_lget_round_trip() {
    let code = code![
        (ENTER 2),
        (MOV 41),
        (LPUT - 1),
        (MOV 0),
        (LGET - 1),
        (EXIT)
    ];
    assert_eq!(exit_value(&code), 41);
}

#[test]
fn llea_yields_frame_address() {
    let code = code![
        (ENTER 1),
        (LLEA - 1),
        (PUSH),
        (MOV 13),
        (SPUT),
        (LGET - 1),
        (EXIT)
    ];
    assert_eq!(exit_value(&code), 13);
}

#[test]
fn leave_restores_frame() {
    let code = code![(ENTER 3), (LEAVE), (EXIT)];
    let run = run_code(&code);
    assert!(run.result.is_ok());
    // The seeded frame has bp == sp; ENTER/LEAVE must restore that.
    assert_eq!(run.registers.sp, run.registers.bp);
}

#[test]
fn nested_frames_are_independent() {
    let code = code![
        (ENTER 1),
        (MOV 5),
        (LPUT - 1),
        (ENTER 1),
        (MOV 6),
        (LPUT - 1),
        (LEAVE),
        (LGET - 1),
        (EXIT)
    ];
    assert_eq!(exit_value(&code), 5);
}
