use anyhow::Result;
use mdcallout::MappingField;
use std::path::PathBuf;

/// A parsed `:` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write(Option<PathBuf>),
    Quit,
    ForceQuit,
    WriteQuit,
    Export(Option<PathBuf>),
    Help,
    Callout(CalloutCommand),
}

/// Edits to the callout settings. Indices are zero-based here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalloutCommand {
    List,
    Add,
    Set {
        index: usize,
        field: MappingField,
        value: String,
    },
    Delete(usize),
    Reset,
}

pub struct CommandProcessor;

impl CommandProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Parses a command line without the leading `:`.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub fn parse(&self, command: &str) -> Result<Option<Command>> {
        let cmd = command.trim();
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(None);
        }

        let command = match parts[0] {
            "w" | "write" => Command::Write(parts.get(1).map(PathBuf::from)),
            "q" | "quit" => Command::Quit,
            "q!" | "quit!" => Command::ForceQuit,
            "wq" | "x" => Command::WriteQuit,
            "export" => Command::Export(parts.get(1).map(PathBuf::from)),
            "help" | "h" => Command::Help,
            "callout" | "co" => Command::Callout(self.parse_callout(&parts[1..])?),
            other => {
                return Err(anyhow::anyhow!("Not an editor command: {}", other));
            }
        };
        Ok(Some(command))
    }

    fn parse_callout(&self, args: &[&str]) -> Result<CalloutCommand> {
        let Some(&sub) = args.first() else {
            return Ok(CalloutCommand::List);
        };

        match sub {
            "list" | "ls" => Ok(CalloutCommand::List),
            "add" => Ok(CalloutCommand::Add),
            "reset" => Ok(CalloutCommand::Reset),
            "delete" | "rm" => {
                let index = parse_index(args.get(1).copied())?;
                Ok(CalloutCommand::Delete(index))
            }
            "set" => {
                let index = parse_index(args.get(1).copied())?;
                let field_name = args
                    .get(2)
                    .ok_or_else(|| anyhow::anyhow!("Usage: callout set <n> <field> <value>"))?;
                let field = MappingField::parse(field_name).ok_or_else(|| {
                    let names: Vec<&str> = MappingField::ALL.iter().map(|f| f.name()).collect();
                    anyhow::anyhow!(
                        "Unknown field '{}', expected one of: {}",
                        field_name,
                        names.join(", ")
                    )
                })?;
                // Colors like `rgba(1, 2, 3, 0.1)` contain spaces
                let value = args.get(3..).map(|rest| rest.join(" ")).unwrap_or_default();
                Ok(CalloutCommand::Set {
                    index,
                    field,
                    value,
                })
            }
            other => Err(anyhow::anyhow!("Unknown callout command: {}", other)),
        }
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_index(arg: Option<&str>) -> Result<usize> {
    let arg = arg.ok_or_else(|| anyhow::anyhow!("Argument required: mapping number"))?;
    let number: usize = arg
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid mapping number: {}", arg))?;
    number
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Mapping numbers start at 1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Option<Command> {
        CommandProcessor::new().parse(input).unwrap()
    }

    #[test]
    fn test_blank_command() {
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn test_file_commands() {
        assert_eq!(parse("w"), Some(Command::Write(None)));
        assert_eq!(
            parse("w notes.md"),
            Some(Command::Write(Some(PathBuf::from("notes.md"))))
        );
        assert_eq!(parse("q"), Some(Command::Quit));
        assert_eq!(parse("q!"), Some(Command::ForceQuit));
        assert_eq!(parse("wq"), Some(Command::WriteQuit));
        assert_eq!(parse("export"), Some(Command::Export(None)));
    }

    #[test]
    fn test_callout_commands() {
        assert_eq!(parse("callout"), Some(Command::Callout(CalloutCommand::List)));
        assert_eq!(parse("callout add"), Some(Command::Callout(CalloutCommand::Add)));
        assert_eq!(
            parse("callout delete 2"),
            Some(Command::Callout(CalloutCommand::Delete(1)))
        );
        assert_eq!(
            parse("callout reset"),
            Some(Command::Callout(CalloutCommand::Reset))
        );
    }

    #[test]
    fn test_callout_set_keeps_spaces_in_value() {
        assert_eq!(
            parse("callout set 1 bg rgba(255, 0, 0, 0.2)"),
            Some(Command::Callout(CalloutCommand::Set {
                index: 0,
                field: MappingField::BackgroundColor,
                value: String::from("rgba(255, 0, 0, 0.2)"),
            }))
        );
    }

    #[test]
    fn test_invalid_commands() {
        let cp = CommandProcessor::new();
        assert!(cp.parse("frobnicate").is_err());
        assert!(cp.parse("callout delete").is_err());
        assert!(cp.parse("callout delete 0").is_err());
        assert!(cp.parse("callout set x label Foo").is_err());
        assert!(cp.parse("callout set 1 colour red").is_err());
    }
}
