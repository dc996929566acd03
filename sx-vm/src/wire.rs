use crate::bytecode::Instruction;

const TAG_INT: u8 = b'I';
const TAG_STR: u8 = b'S';
const TAG_LET: u8 = b'l';
const TAG_GET: u8 = b'g';
const TAG_SET: u8 = b's';
const TAG_CALL: u8 = b'c';
const TAG_FN: u8 = b'f';
const TAG_GOTO: u8 = b'j';
const TAG_JMPF: u8 = b'J';
const TAG_LABEL: u8 = b'L';
const TAG_ARGS: u8 = b'a';
const TAG_RET: u8 = b'r';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    NameTooLong(usize),
    StringTooLong(usize),
    TooManyNames(usize),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::NameTooLong(len) => write!(f, "name too long: {len} bytes (max 255)"),
            WireError::StringTooLong(len) => write!(f, "string too long: {len} bytes"),
            WireError::TooManyNames(count) => {
                write!(f, "too many parameter names: {count} (max 255)")
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Encodes an instruction stream as tag bytes followed by packed operands.
///
/// There is no matching decoder; the VM only runs in-memory programs.
pub fn encode_instructions(instructions: &[Instruction]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    for instruction in instructions {
        encode_instruction(instruction, &mut out)?;
    }
    Ok(out)
}

pub fn encode_instruction(instruction: &Instruction, out: &mut Vec<u8>) -> Result<(), WireError> {
    match instruction {
        Instruction::IntPush(value) => {
            out.push(TAG_INT);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Instruction::StrPush(value) => {
            out.push(TAG_STR);
            let len = u32::try_from(value.len()).map_err(|_| WireError::StringTooLong(value.len()))?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        Instruction::LetBind(name) => {
            out.push(TAG_LET);
            write_name(name, out)?;
        }
        Instruction::Get(name) => {
            out.push(TAG_GET);
            write_name(name, out)?;
        }
        Instruction::Set(name) => {
            out.push(TAG_SET);
            write_name(name, out)?;
        }
        Instruction::Call { argc, tail } => {
            out.push(TAG_CALL);
            out.push(*argc);
            out.push(u8::from(*tail));
        }
        Instruction::FnRef(label) => {
            out.push(TAG_FN);
            write_name(label, out)?;
        }
        Instruction::Goto(label) => {
            out.push(TAG_GOTO);
            write_name(label, out)?;
        }
        Instruction::JumpIfFalse(label) => {
            out.push(TAG_JMPF);
            write_name(label, out)?;
        }
        Instruction::Label(name) => {
            out.push(TAG_LABEL);
            write_name(name, out)?;
        }
        Instruction::ArgsBind(names) => {
            out.push(TAG_ARGS);
            let count = u8::try_from(names.len()).map_err(|_| WireError::TooManyNames(names.len()))?;
            out.push(count);
            for name in names {
                write_name(name, out)?;
            }
        }
        Instruction::Return => out.push(TAG_RET),
    }
    Ok(())
}

fn write_name(name: &str, out: &mut Vec<u8>) -> Result<(), WireError> {
    let len = u8::try_from(name.len()).map_err(|_| WireError::NameTooLong(name.len()))?;
    out.push(len);
    out.extend_from_slice(name.as_bytes());
    Ok(())
}
