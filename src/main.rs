use nylac::backends::ir::IrModuleBackend;
use nylac::backends::link;
use nylac::compiler::orchestrator::{
    COMPFLAGS_FULL_COMPILATION, COMPFLAGS_VERBOSE, COMPFLAG_DISPLAY_AST,
    COMPFLAG_DISPLAY_LLVM_IR, COMPFLAG_DISPLAY_SOURCE_PATHS, COMPFLAG_DISPLAY_STAGES,
    COMPFLAG_DISPLAY_TIMES, Compilation, CompileOptions,
};
use nylac::settings;
use saying::say;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "Usage: nylac <options> <source directories>
Possible Options:
  -name=<name>
      Sets the name of the generated executable
  -main=<internal path>
      Sets the file expected to declare the main function
  -verbose  -display-ast  -display-stages  -display-source-paths
  -display-llvm-ir  -display-times
";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut options = CompileOptions {
        flags: COMPFLAGS_FULL_COMPILATION,
        ..CompileOptions::default()
    };
    let mut name_set = false;
    let mut main_set = false;

    // Options lead; the first positional argument ends them
    let mut positional_start = args.len();
    for (index, arg) in args.iter().enumerate() {
        if !arg.starts_with('-') {
            positional_start = index;
            break;
        }

        if let Some(name) = arg.strip_prefix("-name=") {
            options.executable_name = name.to_string();
            name_set = true;
        } else if let Some(main) = arg.strip_prefix("-main=") {
            options.main_path = main.to_string();
            main_set = true;
        } else {
            match arg.as_str() {
                "-verbose" => options.flags |= COMPFLAGS_VERBOSE,
                "-display-ast" => options.flags |= COMPFLAG_DISPLAY_AST,
                "-display-stages" => options.flags |= COMPFLAG_DISPLAY_STAGES,
                "-display-source-paths" => options.flags |= COMPFLAG_DISPLAY_SOURCE_PATHS,
                "-display-llvm-ir" => options.flags |= COMPFLAG_DISPLAY_LLVM_IR,
                "-display-times" => options.flags |= COMPFLAG_DISPLAY_TIMES,
                other => {
                    println!("Unknown option: {other}");
                    return ExitCode::from(1);
                }
            }
        }
    }

    let src_directories: Vec<PathBuf> = args[positional_start..]
        .iter()
        .map(PathBuf::from)
        .collect();
    if src_directories.is_empty() {
        print!("{USAGE}");
        return ExitCode::from(1);
    }

    // Project config fills in whatever the command line left unset
    let mut src_directories = src_directories;
    match settings::load_config(&src_directories[0]) {
        Ok(Some(config)) => {
            if let (false, Some(name)) = (name_set, config.name) {
                options.executable_name = name;
            }
            if let (false, Some(main)) = (main_set, config.main) {
                options.main_path = main;
            }
            for extra in config.src {
                src_directories.push(src_directories[0].join(extra));
            }
        }
        Ok(None) => {}
        Err(e) => {
            nylac::compiler::display_messages::print_formatted_error(e);
            return ExitCode::from(1);
        }
    }

    let mut compilation = Compilation::new(IrModuleBackend::new(), options);
    if !compilation.compile(&src_directories) {
        compilation.print_errors();
        return ExitCode::from(1);
    }

    let object_path = PathBuf::from(format!("{}.ll", compilation.executable_name()));
    if let Err(e) = compilation.write_object(&object_path) {
        let msg = e.to_string();
        say!(Red "Failed to write output: ", msg);
        return ExitCode::from(1);
    }

    let executable = compilation.executable_name().to_string();
    say!("-- Linking: ", executable);
    if let Err(e) = link::link_executable(&object_path, compilation.executable_name()) {
        say!(Red "Linking failed: ", e);
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
