use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    IntPush(i64),
    StrPush(String),
    LetBind(String),
    Get(String),
    Set(String),
    Call { argc: u8, tail: bool },
    FnRef(String),
    Goto(String),
    JumpIfFalse(String),
    Label(String),
    ArgsBind(Vec<String>),
    Return,
}

impl Instruction {
    /// Instructions that start a new line when pretty-printed.
    pub(crate) fn starts_line(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_)
                | Instruction::JumpIfFalse(_)
                | Instruction::Return
                | Instruction::Label(_)
                | Instruction::Set(_)
                | Instruction::LetBind(_)
        )
    }

    /// Instructions that end the current line when pretty-printed.
    pub(crate) fn ends_line(&self) -> bool {
        matches!(
            self,
            Instruction::Call { .. }
                | Instruction::Set(_)
                | Instruction::LetBind(_)
                | Instruction::Return
                | Instruction::Goto(_)
                | Instruction::JumpIfFalse(_)
                | Instruction::ArgsBind(_)
                | Instruction::Label(_)
        )
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::IntPush(value) => write!(f, "{value}"),
            Instruction::StrPush(value) => write!(f, "{}", quote_string(value)),
            Instruction::LetBind(name) => write!(f, "let {name}"),
            Instruction::Get(name) => write!(f, "${name}"),
            Instruction::Set(name) => write!(f, "->{name}"),
            Instruction::Call { argc, tail } => {
                write!(f, "(")?;
                if *argc > 0 {
                    write!(f, "{argc}")?;
                }
                write!(f, ")")?;
                if *tail {
                    write!(f, "!")?;
                }
                Ok(())
            }
            Instruction::FnRef(label) => write!(f, "fn {label}"),
            Instruction::Goto(label) => write!(f, "goto {label}"),
            Instruction::JumpIfFalse(label) => write!(f, "jmpf {label}"),
            Instruction::Label(name) => write!(f, ".{name}"),
            Instruction::ArgsBind(names) => {
                write!(f, "args")?;
                if !names.is_empty() {
                    write!(f, " {}", names.join(", "))?;
                }
                Ok(())
            }
            Instruction::Return => write!(f, "ret"),
        }
    }
}

/// Renders a string literal with `'` and `\` backslash-escaped.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Inverse of [`quote_string`] for the body between the quotes: `\X` becomes `X`.
pub fn unescape_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    DuplicateLabel(String),
    CallArityOverflow(usize),
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyError::DuplicateLabel(name) => write!(f, "duplicate label '{name}'"),
            AssemblyError::CallArityOverflow(count) => {
                write!(f, "call has {count} arguments, at most 255 are supported")
            }
        }
    }
}

impl std::error::Error for AssemblyError {}

/// An instruction sequence plus its label table.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, AssemblyError> {
        let mut labels = HashMap::new();
        for (index, instruction) in instructions.iter().enumerate() {
            if let Instruction::Label(name) = instruction
                && labels.insert(name.clone(), index).is_some()
            {
                return Err(AssemblyError::DuplicateLabel(name.clone()));
            }
        }
        Ok(Self {
            instructions,
            labels,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

}
