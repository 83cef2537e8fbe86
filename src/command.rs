//! Command-stream grammar
//!
//! Parses one line of the command stream into a `Command`. This is the
//! ambient parsing layer the core transaction manager does not depend
//! on — `TransactionManager` only ever sees already-parsed arguments.

use crate::error::{Result, SimError};
use crate::variable::parse_variable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin { transaction_id: u64 },
    Read { transaction_id: u64, variable: u32 },
    Write { transaction_id: u64, variable: u32, value: i64 },
    End { transaction_id: u64 },
    Fail { site: u32 },
    Recover { site: u32 },
    Dump,
}

fn parse_transaction_id(token: &str) -> Result<u64> {
    token
        .strip_prefix('T')
        .and_then(|rest| rest.parse().ok())
        .ok_or_else(|| SimError::Parse(format!("invalid transaction reference '{token}'")))
}

fn parse_variable_token(token: &str) -> Result<u32> {
    parse_variable(token).ok_or_else(|| SimError::Parse(format!("invalid variable reference '{token}'")))
}

fn split_call(line: &str) -> Result<(&str, Vec<&str>)> {
    let open = line.find('(');
    let name = match open {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    };
    let args = match open {
        Some(idx) => {
            let close = line
                .rfind(')')
                .ok_or_else(|| SimError::Parse(format!("missing closing parenthesis: '{line}'")))?;
            if close < idx {
                return Err(SimError::Parse(format!("malformed command: '{line}'")));
            }
            let inner = line[idx + 1..close].trim();
            if inner.is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(str::trim).collect()
            }
        }
        None => Vec::new(),
    };
    Ok((name, args))
}

fn require_args<'a>(name: &str, args: &'a [&'a str], count: usize) -> Result<&'a [&'a str]> {
    if args.len() != count {
        return Err(SimError::Parse(format!(
            "{name} expects {count} argument(s), got {}",
            args.len()
        )));
    }
    Ok(args)
}

/// Parses one non-blank, already-trimmed command line.
pub fn parse_line(line: &str) -> Result<Command> {
    let (name, args) = split_call(line)?;

    match name {
        "begin" => {
            let args = require_args("begin", &args, 1)?;
            Ok(Command::Begin { transaction_id: parse_transaction_id(args[0])? })
        }
        "R" => {
            let args = require_args("R", &args, 2)?;
            Ok(Command::Read {
                transaction_id: parse_transaction_id(args[0])?,
                variable: parse_variable_token(args[1])?,
            })
        }
        "W" => {
            let args = require_args("W", &args, 3)?;
            let value: i64 = args[2]
                .parse()
                .map_err(|_| SimError::Parse(format!("invalid write value '{}'", args[2])))?;
            Ok(Command::Write {
                transaction_id: parse_transaction_id(args[0])?,
                variable: parse_variable_token(args[1])?,
                value,
            })
        }
        "end" => {
            let args = require_args("end", &args, 1)?;
            Ok(Command::End { transaction_id: parse_transaction_id(args[0])? })
        }
        "fail" => {
            let args = require_args("fail", &args, 1)?;
            let site: u32 = args[0].parse().map_err(|_| SimError::Parse(format!("invalid site '{}'", args[0])))?;
            Ok(Command::Fail { site })
        }
        "recover" => {
            let args = require_args("recover", &args, 1)?;
            let site: u32 = args[0].parse().map_err(|_| SimError::Parse(format!("invalid site '{}'", args[0])))?;
            Ok(Command::Recover { site })
        }
        "dump" => Ok(Command::Dump),
        other => Err(SimError::Parse(format!("unknown command: '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_begin() {
        assert_eq!(parse_line("begin(T1)").unwrap(), Command::Begin { transaction_id: 1 });
    }

    #[test]
    fn parses_read_with_whitespace() {
        assert_eq!(
            parse_line("R( T1 , x2 )").unwrap(),
            Command::Read { transaction_id: 1, variable: 2 }
        );
    }

    #[test]
    fn parses_write_with_negative_value() {
        assert_eq!(
            parse_line("W(T1,x2,-5)").unwrap(),
            Command::Write { transaction_id: 1, variable: 2, value: -5 }
        );
    }

    #[test]
    fn parses_end_fail_recover_dump() {
        assert_eq!(parse_line("end(T3)").unwrap(), Command::End { transaction_id: 3 });
        assert_eq!(parse_line("fail(4)").unwrap(), Command::Fail { site: 4 });
        assert_eq!(parse_line("recover(4)").unwrap(), Command::Recover { site: 4 });
        assert_eq!(parse_line("dump").unwrap(), Command::Dump);
        assert_eq!(parse_line("dump()").unwrap(), Command::Dump);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(matches!(parse_line("frobnicate(1)"), Err(SimError::Parse(_))));
    }

    #[test]
    fn rejects_wrong_argument_count() {
        assert!(matches!(parse_line("begin(T1, T2)"), Err(SimError::Parse(_))));
    }

    #[test]
    fn rejects_missing_parenthesis() {
        assert!(matches!(parse_line("begin(T1"), Err(SimError::Parse(_))));
    }
}
