//! Print the bcrypt hash of a password for the `basic_auth_users` auth file.
//!
//! Usage:
//!     echo -n 'secret' | mkpasswd
//!     mkpasswd            (prompts)

use std::io::{BufRead, IsTerminal, Write};

use anyhow::Context;
use zeroize::Zeroizing;

fn main() -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        print!("Enter Password: ");
        std::io::stdout().flush()?;
    }

    let mut line = Zeroizing::new(String::new());
    stdin
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']);
    anyhow::ensure!(!password.is_empty(), "password must not be empty");

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).context("failed to hash password")?;
    println!("{hash}");
    Ok(())
}
