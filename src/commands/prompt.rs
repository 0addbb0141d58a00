use packrat_core::conflict::{ConflictPrompt, Resolution};
use std::{
    io::{self, BufRead, Write},
    path::Path,
};

/// Asks on the terminal. End of input declines.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn ask_with(
        &self,
        existing: &Path,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Option<Resolution> {
        loop {
            write!(
                output,
                "{} already exists. [O]verwrite, [R]ename, [C]ancel? ",
                existing.display()
            )
            .ok()?;
            output.flush().ok()?;

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match line.trim().parse::<Resolution>() {
                Ok(resolution) => return Some(resolution),
                Err(err) => {
                    writeln!(output, "{err}").ok()?;
                }
            }
        }
    }
}

impl ConflictPrompt for TerminalPrompt {
    fn ask(&self, existing: &Path) -> Option<Resolution> {
        let stdin = io::stdin();
        let stderr = io::stderr();
        self.ask_with(existing, &mut stdin.lock(), &mut stderr.lock())
    }
}
