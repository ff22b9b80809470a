use crate::compiler::compiler_errors::{CompilerError, ErrorType, error_type_to_str};
use saying::say;
use std::path::{Path, PathBuf};
use std::{env, fs};

fn normalize_display_path(path: &Path) -> PathBuf {
    let path_string = path.to_string_lossy();
    if let Some(stripped) = path_string.strip_prefix(r"\\?\") {
        return PathBuf::from(stripped);
    }

    path.to_path_buf()
}

fn relative_display_path(path: &Path) -> String {
    let normalized = normalize_display_path(path);

    match env::current_dir() {
        Ok(dir) => {
            let normalized_dir = normalize_display_path(&dir);
            normalized
                .strip_prefix(&normalized_dir)
                .unwrap_or(&normalized)
                .to_string_lossy()
                .to_string()
        }
        Err(_) => normalized.to_string_lossy().to_string(),
    }
}

pub fn print_errors(errors: &[CompilerError]) {
    for err in errors {
        print_formatted_error(err.clone());
    }
}

pub fn print_formatted_error(e: CompilerError) {
    let relative_dir = relative_display_path(&e.location.path);
    let line_number = e.location.start_pos.line_number as usize;

    let category = e.kind.category();
    match category {
        ErrorType::File | ErrorType::Config | ErrorType::Compiler => {
            say!(Red { error_type_to_str(category) }, ": ", e.msg);
            if !relative_dir.is_empty() {
                say!(Dark Magenta relative_dir);
            }
            return;
        }
        _ => {
            if !relative_dir.is_empty() {
                say!("\n", Dark Magenta relative_dir);
            }
            say!(Red { error_type_to_str(category) });
            say!(Dark Magenta "Line ", Bright { line_number + 1 });
        }
    }

    say!(Red e.msg);

    // Pull the offending line back out of the file so the span can be
    // underlined. Missing files just skip the snippet.
    let line = match fs::read_to_string(&e.location.path) {
        Ok(file) => file
            .lines()
            .nth(line_number)
            .unwrap_or_default()
            .to_string(),
        Err(_) => String::new(),
    };

    if line.is_empty() {
        return;
    }

    println!("\n{line}");

    let start_column = e.location.start_pos.char_column.max(1) as usize;
    print!("{}", " ".repeat(start_column - 1));

    let length_of_underline =
        (e.location.end_pos.char_column - e.location.start_pos.char_column + 1).max(1) as usize;
    say!(Red { "^".repeat(length_of_underline) });
}
