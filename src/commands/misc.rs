use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub fn generate_completions(shell: Shell) {
    let mut cmd = crate::Cli::command();
    generate(shell, &mut cmd, "agents-census", &mut io::stdout());

    eprintln!();
    eprintln!("Save the output to the appropriate location for your shell:");
    match shell {
        Shell::Bash => {
            eprintln!("  agents-census completions bash > ~/.local/share/bash-completion/completions/agents-census");
        }
        Shell::Zsh => {
            eprintln!("  agents-census completions zsh > ~/.zsh/completions/_agents-census");
            eprintln!("  # (Add 'fpath=(~/.zsh/completions $fpath)' before 'compinit' in .zshrc)");
        }
        Shell::Fish => {
            eprintln!("  agents-census completions fish > ~/.config/fish/completions/agents-census.fish");
        }
        _ => {}
    }
}
