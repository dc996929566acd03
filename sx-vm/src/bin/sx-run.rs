use std::io;
use std::path::{Path, PathBuf};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sx::{
    NativeRegistry, Program, SourceError, Vm, VmStatus, assemble, compile_source,
    encode_instructions, logging, render_source_error, render_text,
};
use tracing::info;

const DEFAULT_SOURCE: &str = "main.sx";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliConfig {
    source: Option<String>,
    asm: bool,
    print_ast: bool,
    print_asm: bool,
    emit_bin_path: Option<String>,
    no_color: bool,
    repl: bool,
    help: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    logging::init()?;
    let colored = !cli.no_color && logging::colors_enabled();
    if cli.repl {
        return run_repl(colored, cli.print_asm);
    }

    let source_path = resolve_source_path(cli.source.as_deref())?;
    let source = std::fs::read_to_string(&source_path)?;
    let display_name = source_path.display().to_string();

    let program = if cli.asm {
        assemble(&source)?
    } else {
        match compile_source(&source) {
            Ok(compiled) => {
                if cli.print_ast {
                    println!("{}", compiled.ast);
                }
                compiled.program
            }
            Err(err) => {
                eprintln!("{}", render_source_error(&display_name, &source, &err));
                std::process::exit(1);
            }
        }
    };

    if cli.print_asm {
        println!("{}", render_text(program.instructions(), colored));
    }
    if let Some(output_path) = cli.emit_bin_path.as_ref() {
        let bytes = encode_instructions(program.instructions())?;
        std::fs::write(output_path, &bytes)?;
        println!("wrote {} bytes to {output_path}", bytes.len());
        return Ok(());
    }

    info!(path = %display_name, instructions = program.len(), "running program");
    let natives = NativeRegistry::with_builtins();
    let mut vm = Vm::new(program, &natives);
    let mut status = vm.run();
    loop {
        match status {
            Ok(VmStatus::Halted) => break,
            Ok(VmStatus::Interrupted) => status = vm.resume(),
            Err(fault) => {
                eprintln!("{}", fault.report);
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    if args.is_empty() {
        cfg.repl = true;
        return Ok(cfg);
    }
    let mut index = 0usize;

    if let Some(first) = args.first()
        && first == "repl"
    {
        cfg.repl = true;
        index = 1;
    }

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--asm" => {
                cfg.asm = true;
                index += 1;
            }
            "--print-ast" => {
                cfg.print_ast = true;
                index += 1;
            }
            "--print-asm" => {
                cfg.print_asm = true;
                index += 1;
            }
            "--no-color" => {
                cfg.no_color = true;
                index += 1;
            }
            "--emit-bin" => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --emit-bin".to_string())?;
                cfg.emit_bin_path = Some(path.clone());
                index += 2;
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown flag '{value}'"));
            }
            path => {
                if cfg.source.is_some() {
                    return Err("multiple source paths provided".to_string());
                }
                cfg.source = Some(path.to_string());
                index += 1;
            }
        }
    }

    if cfg.repl
        && (cfg.source.is_some()
            || cfg.asm
            || cfg.print_ast
            || cfg.emit_bin_path.is_some())
    {
        return Err("repl mode only accepts --print-asm and --no-color".to_string());
    }
    if cfg.asm && cfg.print_ast {
        return Err("--print-ast requires s-expression input".to_string());
    }

    Ok(cfg)
}

fn resolve_source_path(arg: Option<&str>) -> Result<PathBuf, io::Error> {
    let rel = arg.unwrap_or(DEFAULT_SOURCE);
    let provided = PathBuf::from(rel);
    if provided.is_absolute() {
        return Ok(provided);
    }

    let cwd_path = std::env::current_dir()?.join(&provided);
    if cwd_path.exists() {
        return Ok(cwd_path);
    }

    Ok(Path::new(env!("CARGO_MANIFEST_DIR")).join(provided))
}

fn print_usage() {
    println!("Usage:");
    println!("  sx-run                     (defaults to REPL)");
    println!("  sx-run repl [--print-asm] [--no-color]");
    println!("  sx-run [--print-ast] [--print-asm] [--no-color] [source_path]");
    println!("  sx-run --asm [--print-asm] <listing.sxa>");
    println!("  sx-run --emit-bin <output.sxb> [--asm] [source_path]");
}

fn run_repl(colored: bool, show_asm: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("sx REPL");
    println!("history: up/down arrows, commands: .help, .asm, .natives, .quit");
    println!("state: every entry runs in a fresh vm");
    let mut editor = DefaultEditor::new()?;
    let natives = NativeRegistry::with_builtins();
    let mut show_asm = show_asm;
    loop {
        match editor.readline("sx> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match handle_repl_command(line) {
                    Some(ReplAction::Break) => break,
                    Some(ReplAction::ToggleAsm) => {
                        show_asm = !show_asm;
                        println!("bytecode listing {}", if show_asm { "on" } else { "off" });
                        continue;
                    }
                    Some(ReplAction::ListNatives) => {
                        println!("{}", natives.names().collect::<Vec<_>>().join(" "));
                        continue;
                    }
                    Some(ReplAction::Continue) => continue,
                    None => {}
                }
                let _ = editor.add_history_entry(line);
                let program = match compile_repl_entry(line) {
                    Ok(program) => program,
                    Err(err) => {
                        println!("{}", render_source_error("<repl>", line, &err));
                        continue;
                    }
                };
                if show_asm {
                    println!("{}", render_text(program.instructions(), colored));
                }
                let mut vm = Vm::new(program, &natives);
                match vm.run() {
                    Ok(_) => match vm.stack().last() {
                        Some(value) => println!("=> {}", value.repr()),
                        None => println!("=> <empty>"),
                    },
                    Err(fault) => println!("{}", fault.report),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("bye");
                break;
            }
            Err(err) => {
                return Err(Box::new(io::Error::other(err.to_string())));
            }
        }
    }
    Ok(())
}

fn compile_repl_entry(line: &str) -> Result<Program, SourceError> {
    compile_source(line).map(|compiled| compiled.program)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReplAction {
    Continue,
    ToggleAsm,
    ListNatives,
    Break,
}

fn handle_repl_command(line: &str) -> Option<ReplAction> {
    match line {
        ".quit" | ".exit" => Some(ReplAction::Break),
        ".asm" => Some(ReplAction::ToggleAsm),
        ".natives" => Some(ReplAction::ListNatives),
        ".help" => {
            println!("commands:");
            println!("  .help      show commands");
            println!("  .asm       toggle the bytecode listing");
            println!("  .natives   list the native functions in scope");
            println!("  .quit      quit repl");
            println!("  .exit      quit repl");
            Some(ReplAction::Continue)
        }
        _ if line.starts_with('.') => {
            println!("unknown command: {line}");
            Some(ReplAction::Continue)
        }
        _ => None,
    }
}
