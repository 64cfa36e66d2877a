//! Interactive session: reads statements line by line, keeps the typed
//! environment alive between inputs, and accumulates accepted lines so
//! `:gencpp` can translate the whole session. A line ending in `:` opens
//! an indented block which a blank line closes.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::analysis::Analyzer;
use crate::context::Context;
use crate::{compile_string, repl_eval};

const INTRO: &str = "Angel REPL. Available commands:
:gencpp     prints generated C++ code
:clear      clears virtual file
:undo       removes last statement from virtual file
:exit :quit :q :e   exits";

pub fn run() -> i32 {
    println!("{INTRO}");
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("{}", format!("cannot start the line editor: {error}").red());
            return 1;
        }
    };
    let mut analyzer = Analyzer::new(Context::default()).repl_mode();
    let mut accepted: Vec<String> = vec![];

    loop {
        let line = match editor.readline(">>> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return 0,
            Err(error) => {
                eprintln!("{}", format!("{error}").red());
                return 1;
            }
        };
        let _ = editor.add_history_entry(&line);
        let trimmed = line.trim_end();

        if let Some(command) = trimmed.strip_prefix(':') {
            match command {
                "exit" | "quit" | "q" | "e" => return 0,
                "gencpp" => match compile_string(&accepted.join("\n"), false) {
                    Ok(cpp) => println!("{cpp}"),
                    Err(error) => eprintln!("{}", format!("{error}").red()),
                },
                "clear" => accepted.clear(),
                "undo" => {
                    accepted.pop();
                }
                other => eprintln!("{}", format!("unknown command ':{other}'").red()),
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let input = if trimmed.ends_with(':') {
            match read_block(&mut editor, line) {
                Some(block) => block,
                None => return 0,
            }
        } else {
            line
        };

        match repl_eval(&input, &mut analyzer) {
            Ok(_) => accepted.extend(input.lines().map(str::to_owned)),
            Err(error) => eprintln!("{}", format!("{error}").red()),
        }
    }
}

/// Collect an indented block: `... ` lines until a blank line.
fn read_block(editor: &mut DefaultEditor, first_line: String) -> Option<String> {
    let mut lines = vec![first_line];
    loop {
        let line = match editor.readline("... ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return None,
            Err(_) => return None,
        };
        if line.trim().is_empty() {
            return Some(lines.join("\n"));
        }
        lines.push(line);
    }
}
