use owo_colors::OwoColorize;

/// Asks the operator to confirm a step that may be skipped.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

/// Reads a `[y/N]` answer from the controlling terminal, so this works even
/// when stdin is redirected. No terminal means "no".
pub struct TtyPrompt;

impl Confirm for TtyPrompt {
    fn confirm(&self, question: &str) -> bool {
        eprint!("  {} {} [y/N] ", "?".bold().cyan(), question);
        let Ok(tty) = std::fs::File::open(tty_path()) else {
            eprintln!();
            return false;
        };
        let mut line = String::new();
        if std::io::BufRead::read_line(&mut std::io::BufReader::new(tty), &mut line).is_err() {
            return false;
        }
        is_yes(&line)
    }
}

#[cfg(windows)]
fn tty_path() -> &'static str {
    "CONIN$"
}

#[cfg(not(windows))]
fn tty_path() -> &'static str {
    "/dev/tty"
}

/// Answers every question the same way (`--yes`, or tests).
pub struct Fixed(pub bool);

impl Confirm for Fixed {
    fn confirm(&self, question: &str) -> bool {
        tracing::debug!(question, answer = self.0, "auto-answered");
        self.0
    }
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn fixed_answers() {
        assert!(Fixed(true).confirm("continue?"));
        assert!(!Fixed(false).confirm("continue?"));
    }
}
