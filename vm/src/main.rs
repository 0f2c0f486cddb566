use clap::Parser as ClapParser;
use std::{fs, process};

use heap::HeapSettings;
use object::Value;
use parser::Lexer;

use vm::{Recovery, VmError, VmSettings, VM};

/// Exit status for errors raised while the program runs.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file defining a `Main` class with a `run` method
    file: String,

    #[arg(long, default_value_t = HeapSettings::default().capacity_words, help = "Heap capacity in words")]
    heap_words: usize,

    #[arg(long, default_value_t = VmSettings::default().max_frames, help = "Maximum call depth")]
    max_frames: usize,

    #[arg(long, default_value_t = VmSettings::default().stack_size, help = "Operand stack slots per frame")]
    stack_size: usize,

    /// Stop at the first runtime error instead of continuing with nil
    #[arg(long)]
    abort_on_error: bool,

    #[arg(long, help = "Dump bytecode + literal pool for the program's methods")]
    dump_bytecode: bool,

    #[arg(long, help = "Print the token stream and exit")]
    tokens: bool,

    #[arg(long, help = "Print the parsed classes and exit")]
    ast: bool,
}

impl Cli {
    fn settings(&self) -> VmSettings {
        VmSettings {
            heap: HeapSettings {
                capacity_words: self.heap_words,
                ..HeapSettings::default()
            },
            max_frames: self.max_frames,
            stack_size: self.stack_size,
            recovery: if self.abort_on_error {
                Recovery::Abort
            } else {
                Recovery::Continue
            },
            ..VmSettings::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", cli.file, err);
            process::exit(1);
        }
    };

    if cli.tokens {
        for token in Lexer::from_str(&source) {
            let pos = token.span.start.to_string();
            println!("{pos:>7} {:<12} {}", token.kind.name(), token.lexeme);
        }
        return;
    }

    if cli.ast {
        let parsed = parser::parse_source(&source);
        for class in &parsed.classes {
            println!("{class:#?}");
        }
        for err in &parsed.errors {
            eprintln!("parse error: {err}");
        }
        process::exit(if parsed.is_ok() { 0 } else { 1 });
    }

    let code = match run(&cli, &source) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            if err.is_runtime() { EXIT_RUNTIME } else { 1 }
        }
    };
    process::exit(code);
}

fn run(cli: &Cli, source: &str) -> Result<(), VmError> {
    let mut vm = VM::new(cli.settings())?;
    let classes = vm.load_source(source)?;
    if cli.dump_bytecode {
        dump_bytecode(&vm, &classes);
        return Ok(());
    }
    let result = vm.run_main()?;
    log::debug!("Main>>run answered {}", vm.print_string(result));
    let (hits, misses) = vm.cache.hits_and_misses();
    log::debug!("method cache: {hits} hits, {misses} misses");
    Ok(())
}

fn dump_bytecode(vm: &VM, classes: &[Value]) {
    for &class in classes {
        let name = vm.class_name(class);
        let Some(methods) = vm.object(class).and_then(|c| vm.object(c.methods())) else {
            continue;
        };
        for &method in methods.fields.iter() {
            let Some(m) = vm.object(method) else {
                continue;
            };
            let selector = vm.text_of(m.selector()).unwrap_or("?");
            println!(
                "== {name}>>{selector} (args: {}, locals: {}) ==",
                m.num_args(),
                m.num_locals()
            );
            print!("{}", bytecode::disassemble(m.bytecode()));
        }
    }
    println!("== literals ==");
    for index in 0..vm.literals.len() {
        if let Some(value) = vm.literals.get(index as u8) {
            println!("  #{index:<3} {}", vm.print_string(value));
        }
    }
}
