use std::sync::LazyLock;

use owo_colors::OwoColorize;
use regex::{Captures, Regex};

use crate::bytecode::{Instruction, Program, unescape_string};

const INDENT: &str = "    ";
const NEAR_CONTEXT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for AsmParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for AsmParseError {}

type BuildFn = fn(&Captures) -> Result<Instruction, String>;

struct Rule {
    regex: Regex,
    build: BuildFn,
}

impl Rule {
    fn new(pattern: &str, build: BuildFn) -> Self {
        Self {
            regex: Regex::new(pattern).expect("assembler pattern should compile"),
            build,
        }
    }
}

static SKIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s+|;[^\n]*)").expect("assembler skip pattern should compile")
});

// Tried in order; the first rule that matches at the cursor wins.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"^-?[0-9]+", |caps| {
            let token = &caps[0];
            token
                .parse::<i64>()
                .map(Instruction::IntPush)
                .map_err(|_| format!("integer literal out of range '{token}'"))
        }),
        Rule::new(r"(?s)^'((?:[^'\\]|\\.)*)'", |caps| {
            Ok(Instruction::StrPush(unescape_string(&caps[1])))
        }),
        Rule::new(r"^let\s+(\w+)", |caps| {
            Ok(Instruction::LetBind(caps[1].to_string()))
        }),
        Rule::new(r"^\$(\w+)", |caps| Ok(Instruction::Get(caps[1].to_string()))),
        Rule::new(r"^->(\w+)", |caps| Ok(Instruction::Set(caps[1].to_string()))),
        Rule::new(r"^\(\s*([0-9]*)\s*\)\s*(!?)", |caps| {
            let raw = &caps[1];
            let argc = if raw.is_empty() {
                0
            } else {
                raw.parse::<u8>()
                    .map_err(|_| format!("invalid call argument count '{raw}'"))?
            };
            Ok(Instruction::Call {
                argc,
                tail: &caps[2] == "!",
            })
        }),
        Rule::new(r"^fn\s+(\w+)", |caps| {
            Ok(Instruction::FnRef(caps[1].to_string()))
        }),
        Rule::new(r"^goto\s+(\w+)", |caps| {
            Ok(Instruction::Goto(caps[1].to_string()))
        }),
        Rule::new(r"^jmpf\s+(\w+)", |caps| {
            Ok(Instruction::JumpIfFalse(caps[1].to_string()))
        }),
        Rule::new(r"^\.(\w+)", |caps| Ok(Instruction::Label(caps[1].to_string()))),
        // Parameter names must stay on the `args` line.
        Rule::new(r"^args\b(?:[ \t]+(\w+(?:[ \t]*,[ \t]*\w+)*))?", |caps| {
            let names = caps
                .get(1)
                .map(|list| {
                    list.as_str()
                        .split(',')
                        .map(|name| name.trim().to_string())
                        .collect()
                })
                .unwrap_or_default();
            Ok(Instruction::ArgsBind(names))
        }),
        Rule::new(r"^ret\b", |_| Ok(Instruction::Return)),
    ]
});

/// Parses assembly text into instructions.
pub fn parse_text(source: &str) -> Result<Vec<Instruction>, AsmParseError> {
    let mut out = Vec::new();
    let mut pos = 0;
    'outer: while pos < source.len() {
        let rest = &source[pos..];
        if let Some(skip) = SKIP.find(rest) {
            pos += skip.end();
            continue;
        }
        for rule in RULES.iter() {
            if let Some(caps) = rule.regex.captures(rest) {
                let instruction = (rule.build)(&caps).map_err(|message| AsmParseError {
                    line: line_at(source, pos),
                    message,
                })?;
                out.push(instruction);
                pos += caps[0].len();
                continue 'outer;
            }
        }
        let near: String = rest.chars().take(NEAR_CONTEXT).collect();
        return Err(AsmParseError {
            line: line_at(source, pos),
            message: format!("unrecognized instruction near '{near}'"),
        });
    }
    Ok(out)
}

/// Parses assembly text and builds its label table.
pub fn assemble(source: &str) -> Result<Program, AsmParseError> {
    let instructions = parse_text(source)?;
    Program::new(instructions).map_err(|err| AsmParseError {
        line: 0,
        message: format!("assembler error: {err}"),
    })
}

/// Pretty-prints instructions. With `colored == false` the output parses
/// back into the same sequence via [`parse_text`].
pub fn render_text(instructions: &[Instruction], colored: bool) -> String {
    let mut out = String::new();
    let mut fresh_line = true;
    for instruction in instructions {
        if instruction.starts_line() && !fresh_line {
            out.push('\n');
            fresh_line = true;
        }
        if fresh_line {
            if !matches!(instruction, Instruction::Label(_)) {
                out.push_str(INDENT);
            }
        } else {
            out.push(' ');
        }

        let text = instruction.to_string();
        if colored {
            out.push_str(&colorize(instruction, &text));
        } else {
            out.push_str(&text);
        }
        fresh_line = false;

        if instruction.ends_line() {
            out.push('\n');
            fresh_line = true;
        }
    }
    out.trim_end().to_string()
}

fn colorize(instruction: &Instruction, text: &str) -> String {
    match instruction {
        Instruction::IntPush(_) => text.cyan().to_string(),
        Instruction::StrPush(_) => text.red().to_string(),
        Instruction::LetBind(_) | Instruction::Get(_) | Instruction::Set(_) => {
            text.blue().to_string()
        }
        Instruction::Return | Instruction::Goto(_) | Instruction::JumpIfFalse(_) => {
            text.yellow().to_string()
        }
        Instruction::FnRef(_) => text.magenta().to_string(),
        Instruction::ArgsBind(_) => text.green().to_string(),
        Instruction::Call { .. } | Instruction::Label(_) => text.to_string(),
    }
}

fn line_at(source: &str, pos: usize) -> usize {
    source[..pos].bytes().filter(|&byte| byte == b'\n').count() + 1
}
