use std::fs;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use lisp_interpreter::Ast;
use lisp_interpreter::Interpreter;
use lisp_interpreter::Lexer;
use lisp_interpreter::Scope;
use lisp_interpreter::lex::InvalidEscapeError;
use lisp_interpreter::lex::StringTerminationError;
use miette::IntoDiagnostic;
use miette::WrapErr;

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Tokenize { filename: PathBuf },
    Parse { filename: PathBuf },
    Run { filename: PathBuf },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = fs::read_to_string(&filename)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading `{}` failed", filename.display()))?;

            for token in Lexer::new(filename.to_str(), &file_contents) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        if let Some(string_termination_error) =
                            e.downcast_ref::<StringTerminationError>()
                        {
                            eprintln!(
                                "[line {}] Error: Unterminated string",
                                string_termination_error.line()
                            );
                            eprintln!("{e:?}");

                            std::process::exit(65);
                        } else if let Some(invalid_escape_error) =
                            e.downcast_ref::<InvalidEscapeError>()
                        {
                            eprintln!(
                                "[line {}] Error: Invalid escape sequence: \\{}",
                                invalid_escape_error.line(),
                                invalid_escape_error.escape
                            );
                            eprintln!("{e:?}");

                            std::process::exit(65);
                        }
                        return Err(e);
                    }
                };
                println!("{token}");
            }
        }
        Commands::Parse { filename } => {
            let file_contents = fs::read_to_string(&filename)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading `{}` failed", filename.display()))?;

            let ast = lisp_interpreter::Parser::new(filename.to_str(), &file_contents)?.parse()?;
            println!("{ast}");
        }
        Commands::Run { filename } => {
            let file_contents = fs::read_to_string(&filename)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading `{}` failed", filename.display()))?;

            let ast = lisp_interpreter::Parser::new(filename.to_str(), &file_contents)?.parse()?;
            let Ast::Term { args, .. } = ast else {
                unreachable!("the parser always wraps a program in a source term");
            };

            // each top-level form runs directly in the root scope
            let mut interpreter = Interpreter::new(std::io::stdout(), Scope::root());
            for node in &args {
                interpreter.eval(node)?;
            }
        }
    }
    Ok(())
}
