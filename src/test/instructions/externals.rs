use crate::test::*;
use crate::*;

// These tests lay the preludes out by hand, exactly as the front end does:
// external slot `i` owns the two words at code offset `i * 2`, and calls
// reach it like any other routine.

const EXTERNALS: [External; 4] = [
    External::PutInt,
    External::PutStr,
    External::PutEndl,
    External::Printf,
];

fn preludes() -> Vec<Word> {
    code![(RET 2), (RET 2), (RET 2), (RET 0)]
}

fn streams_data() -> Vec<Word> {
    // cout and cerr handles occupy data words 0 and 1.
    vec![0, 0]
}

#[test]
fn put_int_writes_decimal_and_returns_stream() {
    let mut code = preludes();
    code.extend(code![
        (LEA 0),
        (PUSH),
        (MOV - 42),
        (PUSH),
        (CALL - 16),
        (EXIT)
    ]);
    let run = run_with(&streams_data(), &code, &EXTERNALS, &[]);
    assert_eq!(run.result, Ok(COUT_OFFSET as Word));
    assert_eq!(run.out, b"-42");
    assert!(run.err.is_empty());
}

#[test]
fn put_int_to_cerr() {
    let mut code = preludes();
    code.extend(code![
        (LEA 1),
        (PUSH),
        (MOV 7),
        (PUSH),
        (CALL - 16),
        (EXIT)
    ]);
    let run = run_with(&streams_data(), &code, &EXTERNALS, &[]);
    assert_eq!(run.err, b"7");
    assert!(run.out.is_empty());
}

#[test]
fn put_str_and_endl_chain() {
    let mut data = streams_data();
    data.extend(util::pack_str(b"hi"));

    let mut code = preludes();
    code.extend(code![
        (LEA 0),
        (PUSH),
        (LEA 2),
        (PUSH),
        (CALL - 14),
        (PUSH),
        (MOV 0),
        (PUSH),
        (CALL - 18),
        (MOV 0),
        (EXIT)
    ]);
    let run = run_with(&data, &code, &EXTERNALS, &[]);
    assert_eq!(run.result, Ok(0));
    assert_eq!(run.out, b"hi\n");
}

#[test]
fn printf_formats_subset() {
    let mut data = streams_data();
    let format_at = data.len() as Word;
    data.extend(util::pack_str(b"n=%d c=%c s=%s q=%q%%\n"));
    let string_at = data.len() as Word;
    data.extend(util::pack_str(b"ok"));

    // printf(format, 7, 'x', "ok"): fixed argument first, then the three
    // variadic arguments, then their count; ADJ 5 drops count, variadics
    // and the fixed argument.
    let mut code = preludes();
    code.extend(code![
        (LEA format_at),
        (PUSH),
        (MOV 7),
        (PUSH),
        (MOV 120),
        (PUSH),
        (LEA string_at),
        (PUSH),
        (MOV 3),
        (PUSH),
        (CALL - 19),
        (ADJ 5),
        (MOV 0),
        (EXIT)
    ]);
    let run = run_with(&data, &code, &EXTERNALS, &[]);
    assert_eq!(run.result, Ok(0));
    assert_eq!(run.out, b"n=7 c=x s=ok q=q%\n");
}

#[test]
fn printf_returns_byte_count() {
    let mut data = streams_data();
    data.extend(util::pack_str(b"abc"));

    let mut code = preludes();
    code.extend(code![
        (LEA 2),
        (PUSH),
        (MOV 0),
        (PUSH),
        (CALL - 10),
        (ADJ 2),
        (EXIT)
    ]);
    let run = run_with(&data, &code, &EXTERNALS, &[]);
    assert_eq!(run.result, Ok(3));
}

#[test]
fn bad_stream_handle_faults() {
    let mut code = preludes();
    code.extend(code![
        (MOV 9),
        (PUSH),
        (MOV 1),
        (PUSH),
        (CALL - 16),
        (EXIT)
    ]);
    let run = run_with(&streams_data(), &code, &EXTERNALS, &[]);
    assert_eq!(run.result.unwrap_err().trap, Trap::BadStream(9));
}
