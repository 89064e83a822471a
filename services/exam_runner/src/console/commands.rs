//! services/exam_runner/src/console/commands.rs
//!
//! Parses the learner's text commands read from stdin.

use exam_session_core::domain::{ChoiceIndex, ImageRef, QuestionId};

/// One learner action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Choose { question: QuestionId, choice: ChoiceIndex },
    Text { question: QuestionId, text: String },
    Attach { question: QuestionId, image: ImageRef },
    Detach { question: QuestionId, index: usize },
    Flag { question: QuestionId },
    Next,
    Previous,
    /// 1-based, as shown on the navigation strip.
    GoTo(usize),
    Status,
    /// Asks for confirmation; nothing is delivered until `Confirm`.
    Submit,
    Confirm,
    Cancel,
    Retry,
    Resume,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a number")]
    NotANumber(String),
}

pub const HELP: &str = "choose <q> <i> | text <q> <words...> | attach <q> <image> | \
detach <q> <i> | flag <q> | next | prev | goto <n> | status | submit | confirm | cancel | \
retry | resume | quit";

impl std::str::FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "choose" => {
                let usage = CommandError::Usage("choose <question> <option index>");
                let question = args.next().ok_or_else(|| usage.clone())?;
                let choice = number(args.next().ok_or(usage)?)?;
                Command::Choose {
                    question: question.into(),
                    choice: ChoiceIndex(choice),
                }
            }
            "text" => {
                // Everything after the question id is the answer text, spacing intact.
                let (question, text) = match rest.split_once(char::is_whitespace) {
                    Some((question, text)) => (question, text.trim_start()),
                    None if !rest.is_empty() => (rest, ""),
                    None => return Err(CommandError::Usage("text <question> <answer text>")),
                };
                Command::Text {
                    question: question.into(),
                    text: text.to_string(),
                }
            }
            "attach" => {
                let usage = CommandError::Usage("attach <question> <image uri>");
                let question = args.next().ok_or_else(|| usage.clone())?;
                let image = args.next().ok_or(usage)?;
                Command::Attach {
                    question: question.into(),
                    image: image.into(),
                }
            }
            "detach" => {
                let usage = CommandError::Usage("detach <question> <image index>");
                let question = args.next().ok_or_else(|| usage.clone())?;
                let index = number(args.next().ok_or(usage)?)?;
                Command::Detach {
                    question: question.into(),
                    index,
                }
            }
            "flag" => {
                let question = args.next().ok_or(CommandError::Usage("flag <question>"))?;
                Command::Flag {
                    question: question.into(),
                }
            }
            "next" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "goto" => {
                let n = number(args.next().ok_or(CommandError::Usage("goto <number>"))?)?;
                if n == 0 {
                    return Err(CommandError::Usage("goto <number>, counting from 1"));
                }
                Command::GoTo(n)
            }
            "status" => Command::Status,
            "submit" => Command::Submit,
            "confirm" | "yes" => Command::Confirm,
            "cancel" | "no" => Command::Cancel,
            "retry" => Command::Retry,
            "resume" => Command::Resume,
            "quit" | "exit" => Command::Quit,
            "help" | "?" => Command::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn number(arg: &str) -> Result<usize, CommandError> {
    arg.parse::<usize>()
        .map_err(|_| CommandError::NotANumber(arg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_commands() {
        assert_eq!(
            "choose q1 2".parse::<Command>(),
            Ok(Command::Choose {
                question: "q1".into(),
                choice: ChoiceIndex(2)
            })
        );
        assert_eq!(
            "text q3  the sum is   55".parse::<Command>(),
            Ok(Command::Text {
                question: "q3".into(),
                text: "the sum is   55".into()
            })
        );
        assert_eq!(
            "text q3".parse::<Command>(),
            Ok(Command::Text {
                question: "q3".into(),
                text: String::new()
            })
        );
        assert_eq!(
            "attach q4 file:///tmp/a.png".parse::<Command>(),
            Ok(Command::Attach {
                question: "q4".into(),
                image: "file:///tmp/a.png".into()
            })
        );
        assert_eq!(
            "detach q4 0".parse::<Command>(),
            Ok(Command::Detach {
                question: "q4".into(),
                index: 0
            })
        );
    }

    #[test]
    fn parses_navigation_and_lifecycle() {
        assert_eq!("NEXT".parse::<Command>(), Ok(Command::Next));
        assert_eq!("prev".parse::<Command>(), Ok(Command::Previous));
        assert_eq!("goto 3".parse::<Command>(), Ok(Command::GoTo(3)));
        assert_eq!(" submit ".parse::<Command>(), Ok(Command::Submit));
        assert_eq!("confirm".parse::<Command>(), Ok(Command::Confirm));
        assert_eq!("yes".parse::<Command>(), Ok(Command::Confirm));
        assert_eq!("cancel".parse::<Command>(), Ok(Command::Cancel));
        assert_eq!("exit".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "dance".parse::<Command>(),
            Err(CommandError::Unknown("dance".into()))
        );
        assert!(matches!("choose q1".parse::<Command>(), Err(CommandError::Usage(_))));
        assert_eq!(
            "choose q1 two".parse::<Command>(),
            Err(CommandError::NotANumber("two".into()))
        );
        assert!(matches!("goto 0".parse::<Command>(), Err(CommandError::Usage(_))));
        assert!(matches!("text".parse::<Command>(), Err(CommandError::Usage(_))));
    }
}
