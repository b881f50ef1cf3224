use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use cryptpack::error::{CryptpackError, ErrorCategory, ErrorKind};
use cryptpack::password::{PasswordReader, ReaderPasswordReader, TerminalPasswordReader};
use cryptpack::{PipelineConfig, container_path, decrypt_path, encrypt_path};

#[derive(Parser, Debug)]
#[command(
    name = "cryptpack",
    version,
    about = "encrypt a file or directory into a password-protected container"
)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long = "password-stdin", action = ArgAction::SetTrue, global = true)]
    password_stdin: bool,

    /// PBKDF2 iteration count
    #[arg(long, default_value_t = cryptpack::kdf::DEFAULT_ITERATIONS, global = true)]
    iterations: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file or directory
    Encrypt {
        /// Path to the file or directory to encrypt
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Output name; the container is written to <output><extension>.enc
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Overwrite an existing container without asking
        #[arg(short = 'f', long = "force", action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Decrypt a container into a directory
    Decrypt {
        /// Path to the encrypted container
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Directory to extract into (created if absent)
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
}

/// Rejects empty passwords before they reach the pipeline.
struct NonEmptyPasswordReader {
    upstream: Box<dyn PasswordReader>,
}

impl PasswordReader for NonEmptyPasswordReader {
    fn read_password(&mut self) -> cryptpack::Result<Zeroizing<Vec<u8>>> {
        let password = self.upstream.read_password()?;
        if password.is_empty() {
            return Err(CryptpackError::with_kind(
                ErrorCategory::User,
                ErrorKind::PasswordUnavailable,
                "password must not be empty",
            ));
        }
        Ok(password)
    }
}

fn password_reader(from_stdin: bool) -> NonEmptyPasswordReader {
    let upstream: Box<dyn PasswordReader> = if from_stdin {
        Box::new(ReaderPasswordReader::new(
            Box::new(io::stdin()) as Box<dyn Read>
        ))
    } else {
        Box::new(TerminalPasswordReader::new())
    };
    NonEmptyPasswordReader { upstream }
}

fn confirm_overwrite(path: &Path) -> io::Result<bool> {
    println!("Warning: output file already exists: {}", path.display());
    print!("Continue? [y/N]: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig {
        iterations: cli.iterations,
        ..PipelineConfig::default()
    };
    let mut reader = password_reader(cli.password_stdin);

    let result = match cli.command {
        Commands::Encrypt {
            input,
            output,
            force,
        } => {
            let target = container_path(&input, &output);
            if target.exists() && !force {
                match confirm_overwrite(&target) {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("Operation cancelled.");
                        return ExitCode::SUCCESS;
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            println!("Encrypting...");
            encrypt_path(&input, &output, &mut reader, &config)
                .map(|path| println!("Encryption completed successfully: {}", path.display()))
        }
        Commands::Decrypt { input, output } => {
            println!("Decrypting...");
            decrypt_path(&input, &output, &mut reader, &config)
                .map(|()| println!("Decryption completed successfully: {}", output.display()))
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
