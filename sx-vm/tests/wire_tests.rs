mod common;

use common::{Instruction, compile};
use sx::{WireError, encode_instructions};

#[test]
fn encodes_each_instruction_with_its_tag() {
    let bytes = encode_instructions(&[
        Instruction::IntPush(-2),
        Instruction::StrPush("hi".to_string()),
        Instruction::Get("x".to_string()),
        Instruction::Call {
            argc: 3,
            tail: true,
        },
        Instruction::ArgsBind(vec!["a".to_string(), "bc".to_string()]),
        Instruction::Return,
    ])
    .expect("encode should succeed");

    let mut expected = vec![b'I'];
    expected.extend_from_slice(&(-2i64).to_le_bytes());
    expected.extend_from_slice(&[b'S', 2, 0, 0, 0, b'h', b'i']);
    expected.extend_from_slice(&[b'g', 1, b'x']);
    expected.extend_from_slice(&[b'c', 3, 1]);
    expected.extend_from_slice(&[b'a', 2, 1, b'a', 2, b'b', b'c']);
    expected.push(b'r');
    assert_eq!(bytes, expected);
}

#[test]
fn compiled_program_starts_with_jump_to_main() {
    let program = compile("((fn (a) a) 1)");
    let bytes = encode_instructions(program.instructions()).expect("encode should succeed");
    assert_eq!(&bytes[..6], &[b'j', 4, b'm', b'a', b'i', b'n']);
    assert_eq!(bytes.last(), Some(&b'r'));
    assert_eq!(&bytes[6..10], &[b'L', 2, b'f', b'0']);
}

#[test]
fn label_operands_use_byte_length_prefix() {
    let bytes = encode_instructions(&[
        Instruction::Label("w0".to_string()),
        Instruction::JumpIfFalse("w0".to_string()),
        Instruction::Goto("w0".to_string()),
        Instruction::FnRef("f1".to_string()),
        Instruction::Set("y".to_string()),
        Instruction::LetBind("z".to_string()),
    ])
    .expect("encode should succeed");
    assert_eq!(
        bytes,
        vec![
            b'L', 2, b'w', b'0', b'J', 2, b'w', b'0', b'j', 2, b'w', b'0', b'f', 2, b'f', b'1',
            b's', 1, b'y', b'l', 1, b'z',
        ]
    );
}

#[test]
fn long_names_are_rejected() {
    let name = "n".repeat(256);
    let err = encode_instructions(&[Instruction::Get(name)]).expect_err("name should be too long");
    assert_eq!(err, WireError::NameTooLong(256));
}

#[test]
fn too_many_parameters_are_rejected() {
    let names: Vec<String> = (0..256).map(|index| format!("p{index}")).collect();
    let err = encode_instructions(&[Instruction::ArgsBind(names)])
        .expect_err("parameter list should be too long");
    assert_eq!(err, WireError::TooManyNames(256));
}
