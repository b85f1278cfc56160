//! completions command - Print a shell completion script

use clap::CommandFactory;
use clap_complete::Shell;

use super::Cli;
use crate::exit_code::ExitCode;

/// Print a completion script, e.g. `ds completions zsh > ~/.zfunc/_ds`
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

fn render(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}

pub fn execute(args: CompletionsArgs) -> ExitCode {
    render(args.shell, &mut std::io::stdout());
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scripts_cover_subcommands() {
        let markers = [
            (Shell::Bash, "complete"),
            (Shell::Zsh, "compdef"),
            (Shell::Fish, "complete"),
            (Shell::PowerShell, "Register-ArgumentCompleter"),
        ];

        for (shell, marker) in markers {
            let mut buf = Vec::new();
            render(shell, &mut buf);
            let script = String::from_utf8(buf).unwrap();
            assert!(script.contains(marker), "{shell}: missing {marker}");
            assert!(script.contains("endpoint"), "{shell}: missing endpoint");
            assert!(script.contains("slice-size"), "{shell}: missing --slice-size");
        }
    }
}
