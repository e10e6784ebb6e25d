use crate::cli::args::{Cli, CompletionCommands};
use crate::utils::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

const APP_NAME: &str = "pasmcli";

// Values accepted by `import-csv --secret-type`
const BASH_SECRET_TYPES: &str = r#"
_pasmcli_override() {
    local cur prev
    cur="${COMP_WORDS[COMP_CWORD]}"
    prev="${COMP_WORDS[COMP_CWORD-1]}"

    if [[ " ${COMP_WORDS[*]} " == *" import-csv "* ]]; then
        case "$prev" in
            "--secret-type"|"-t")
                local IFS=$'\n'
                COMPREPLY=($(compgen -W $'esxi\nstatic\nSSH key endpoint' -- "$cur"))
                return 0
                ;;
        esac
    fi

    _pasmcli "$@"
}
"#;

pub fn handle_completion_command(command: &CompletionCommands) -> Result<()> {
    write_completion(command.shell(), &mut io::stdout())
}

/// Write the completion script for `shell`. Bash additionally completes CSV
/// import secret types.
pub fn write_completion<W: Write>(shell: Shell, out: &mut W) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, APP_NAME, out);

    if matches!(shell, Shell::Bash) {
        writeln!(out, "{BASH_SECRET_TYPES}")?;
        writeln!(
            out,
            "complete -F _pasmcli_override -o bashdefault -o default {APP_NAME}"
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut out = Vec::new();
        write_completion(shell, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bash_completion_overrides_generated_function() {
        let bash = script(Shell::Bash);
        assert!(bash.contains("_pasmcli()"));
        assert!(bash.contains("setup-ssh-proxy"));
        assert!(bash.trim_end().ends_with("complete -F _pasmcli_override -o bashdefault -o default pasmcli"));
    }

    #[test]
    fn test_other_shells_are_plain() {
        let zsh = script(Shell::Zsh);
        assert!(zsh.contains("#compdef pasmcli"));
        assert!(!zsh.contains("_pasmcli_override"));
    }
}
