use dialoguer::Input;
use std::io::{self, BufRead, Write};

/// Where a session talks to the user.
pub trait Console {
    /// Print one informational message.
    fn show(&mut self, message: &str) -> io::Result<()>;

    /// Show `prompt` and block for one line of input. `None` means the input
    /// stream is finished.
    fn read_choice(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

impl<T: Console + ?Sized> Console for Box<T> {
    fn show(&mut self, message: &str) -> io::Result<()> {
        (**self).show(message)
    }

    fn read_choice(&mut self, prompt: &str) -> io::Result<Option<String>> {
        (**self).read_choice(prompt)
    }
}

/// Interactive terminal, prompts through dialoguer.
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn show(&mut self, message: &str) -> io::Result<()> {
        println!("{}", message);
        Ok(())
    }

    fn read_choice(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => Ok(Some(line)),
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(dialoguer::Error::IO(e)) => Err(e),
        }
    }
}

/// Line-oriented console over any reader and writer: piped stdin, or a
/// scripted `Cursor` in tests.
pub struct LineConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Console for LineConsole<R, W> {
    fn show(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }

    fn read_choice(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "\n{}: ", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
