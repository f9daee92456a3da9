//! qrk CLI: execute files, evaluate snippets, or run the REPL.

use std::env;
use std::path::Path;
use std::process;

use qrk::error::QrkError;
use qrk::value::Value;
use qrk::ExecutionMode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    mode: ExecutionMode,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("qrk {}", VERSION);
    eprintln!();
    eprintln!("Usage: qrk [options] [script.qrk]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  <script.qrk>    Run a script file");
    eprintln!("  -e <code>       Evaluate code and print the result");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --interpret     Use the tree-walking interpreter instead of the VM");
    eprintln!("  --disassemble   Print compiled bytecode before running");
    eprintln!("  --version, -v   Show the version");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  qrk                     Start the interactive REPL");
    eprintln!("  qrk script.qrk          Run a script file");
    eprintln!("  qrk -e 'print(1 + 2)'   Evaluate a snippet");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut command = None;
    let mut mode = ExecutionMode::default();
    let mut disassemble = false;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-v" => {
                println!("qrk {}", VERSION);
                process::exit(0);
            }
            "--interpret" => mode = ExecutionMode::TreeWalk,
            "--disassemble" => disassemble = true,
            "-e" => {
                index += 1;
                let code = args
                    .get(index)
                    .ok_or_else(|| "-e requires an argument".to_string())?;
                command = Some(Command::Eval { code: code.clone() });
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            file => {
                command = Some(Command::Run {
                    file: file.to_string(),
                });
            }
        }
        index += 1;
    }

    Ok(Options {
        command: command.unwrap_or(Command::Repl),
        mode,
        disassemble,
    })
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    match options.command {
        Command::Repl => qrk::repl::start(options.mode),

        Command::Run { file } => {
            match qrk::run_file(Path::new(&file), options.mode, options.disassemble) {
                Ok(Value::Error(message)) => {
                    eprintln!("ERROR:{}", message);
                    process::exit(1);
                }
                Ok(_) => {}
                Err(err) => exit_with_error(err),
            }
        }

        Command::Eval { code } => {
            match qrk::run_with_options(&code, options.mode, options.disassemble) {
                Ok(value) => println!("{}", value),
                Err(err) => exit_with_error(err),
            }
        }
    }
}

fn exit_with_error(err: QrkError) -> ! {
    match &err {
        QrkError::Parse(errors) => {
            eprintln!("Syntax error!");
            for error in &errors.0 {
                eprintln!("\t{}", error);
            }
        }
        other => eprintln!("{}", other),
    }
    process::exit(1);
}
