//! # Shell Completion Module
//!
//! ```bash
//! # Generate bash completions
//! supergenre completion bash > ~/.local/share/bash-completion/completions/supergenre
//!
//! # Generate zsh completions
//! supergenre completion zsh > ~/.config/zsh/completions/_supergenre
//! ```

use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    write_completions(gen, cmd, &mut io::stdout());
}

/// Like [`generate_completions`], into any writer.
pub fn write_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub const fn shell_to_completion_shell(shell: crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(
            shell_to_completion_shell(crate::cli::Shell::Bash),
            CompletionShell::Bash
        );
        assert_eq!(
            shell_to_completion_shell(crate::cli::Shell::Zsh),
            CompletionShell::Zsh
        );
    }

    #[test]
    fn test_bash_script_mentions_subcommands() {
        let mut cmd = crate::cli::Args::command();
        let mut out = Vec::new();
        write_completions(CompletionShell::Bash, &mut cmd, &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("supergenre"));
        assert!(script.contains("super-genres"));
    }
}
