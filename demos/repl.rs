use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use storexp::ast::Value;
use storexp::builtinops::get_builtin_ops;
use storexp::scheme::ParseConfig;
use storexp::{Error, ParseErrorKind, Session};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn main() {
    // Logs go to stderr so they never interleave with results; RUST_LOG=storexp=debug shows definitions
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("StoreXP Scheme Interpreter");
    println!("Environments map names to store addresses; set! writes cells in place");
    println!("Enter forms like: (define x 5) or (let ((y 2)) (+ x y))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };
    let mut session = Session::new();
    let config = ParseConfig {
        handle_comments: true,
    };

    // Lines of a form that is still missing its closing parentheses
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "storexp> "
        } else {
            "     ... "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&session);
                            continue;
                        }
                        ":store" => {
                            print_store(&session);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                pending.push_str(&line);
                pending.push('\n');

                match session.eval_parse_with_config(&pending, config) {
                    // Keep reading until the form is complete
                    Err(Error::ParseError(err)) if err.kind == ParseErrorKind::Incomplete => {
                        continue;
                    }
                    // Don't print Unspecified values (e.g., from define)
                    Ok(Value::Unspecified) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
                pending.clear();
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                // Abandon the unfinished form, stay in the REPL
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("StoreXP Scheme Interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show global bindings and their addresses");
    println!("  :store     - Show every store cell");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Abandon an unfinished form, or exit");
    println!();
    println!("Forms:");
    println!("  Literals: 42, -5, #t, #f, \"text\", 'symbol, '(1 2)");
    println!("  (if test then else)      - only #f is false");
    println!("  (lambda (x y) body...)   - closure over the current environment");
    println!("  (let ((x 1) (y 2)) body...)");
    println!("  (define name value)      - global; the first definition of a name wins");
    println!("  (set! name value)        - writes the cell the name resolves to");
    println!("  ; comment to end of line");
    println!();

    let names: Vec<&str> = get_builtin_ops().iter().map(|op| op.scheme_id).collect();
    println!("Primitives ({}):", names.len());
    for row in names.chunks(6) {
        let row: Vec<String> = row.iter().map(|name| format!("{name:<15}")).collect();
        println!("  {}", row.join(""));
    }
    println!();
    println!("Examples:");
    println!("  (define x 5)");
    println!("  (define add-to-x! (lambda (z) (set! x (+ x z)) x))");
    println!("  (add-to-x! 3)");
    println!();
}

fn print_environment(session: &Session) {
    let global = session.global_env();

    if global.is_empty() {
        println!("Global environment is empty.");
        return;
    }

    println!("Global bindings ({} total):", global.len());
    for (index, (name, address)) in global.bindings().enumerate() {
        let shadowed = global
            .bindings()
            .take(index)
            .any(|(earlier, _)| earlier == name);
        let value = session
            .store()
            .read(address)
            .map_or_else(|e| format!("<{e}>"), |v| format!("{v}"));
        if shadowed {
            println!("  {name} -> @{address} = {value}   (shadowed)");
        } else {
            println!("  {name} -> @{address} = {value}");
        }
    }
}

fn print_store(session: &Session) {
    let store = session.store();

    if store.is_empty() {
        println!("Store is empty.");
        return;
    }

    println!("Store cells ({} total):", store.len());
    for (address, value) in store.iter() {
        println!("  @{address:<5} {value}");
    }
}
