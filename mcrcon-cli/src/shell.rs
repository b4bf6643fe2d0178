use crossterm::tty::IsTty;
use log::warn;
use rustyline_async::{Readline, ReadlineError, SharedWriter};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

pub struct ShellRead {
    prompt: String,
    inner: ShellReadInner,
}

pub struct ShellWrite {
    inner: ShellWriteInner,
}

enum ShellReadInner {
    Interactive(Readline, SharedWriter),
    Stream(Lines<Box<dyn AsyncBufRead + Unpin + Send>>),
}

enum ShellWriteInner {
    Interactive(SharedWriter, Box<dyn Write + Send>),
    Stream(Box<dyn Write + Send>, Box<dyn Write + Send>),
}

/// Line editor with history when stdout is a terminal, plain stdin lines otherwise.
pub fn new_shell(prompt: String) -> (ShellRead, ShellWrite) {
    if io::stdout().is_tty() {
        match Readline::new(prompt.clone()) {
            Ok((read_line, writer)) => {
                return (
                    ShellRead {
                        prompt,
                        inner: ShellReadInner::Interactive(read_line, writer.clone()),
                    },
                    ShellWrite {
                        inner: ShellWriteInner::Interactive(
                            writer.clone(),
                            error_writer(writer, io::stderr(), io::stderr().is_tty()),
                        ),
                    },
                );
            }
            Err(err) => warn!("Line editor unavailable, reading plain lines: {}", err),
        }
    }

    (
        ShellRead::from_reader(prompt, BufReader::new(tokio::io::stdin())),
        ShellWrite::from_writers(io::stdout(), io::stderr()),
    )
}

impl ShellRead {
    pub fn from_reader<R>(prompt: String, reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        ShellRead {
            prompt,
            inner: ShellReadInner::Stream(reader.lines()),
        }
    }

    /// Next input line, or `None` once the user is done (end of input, Ctrl-D or Ctrl-C).
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        match &mut self.inner {
            ShellReadInner::Interactive(read, writer) => {
                let line = match read.readline().await {
                    Ok(line) => line,
                    Err(ReadlineError::IO(err)) => return Err(err),
                    Err(ReadlineError::Eof | ReadlineError::Closed | ReadlineError::Interrupted) => {
                        return Ok(None)
                    }
                };

                read.add_history_entry(line.clone());

                // echo back the line
                writeln!(writer, "{}{}", self.prompt, line)?;

                Ok(Some(line))
            }
            ShellReadInner::Stream(lines) => lines.next_line().await,
        }
    }
}

impl ShellWrite {
    pub fn from_writers<O, E>(out: O, err: E) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        ShellWrite {
            inner: ShellWriteInner::Stream(Box::new(out), Box::new(err)),
        }
    }

    pub fn out(&mut self) -> &mut dyn Write {
        match &mut self.inner {
            ShellWriteInner::Interactive(writer, _) => writer,
            ShellWriteInner::Stream(out, _) => out,
        }
    }

    pub fn err(&mut self) -> &mut dyn Write {
        match &mut self.inner {
            ShellWriteInner::Interactive(_, err) => err,
            ShellWriteInner::Stream(_, err) => err,
        }
    }
}

/// Where errors go while the line editor owns the terminal.
///
/// If stderr is the same terminal, errors go through the editor so the prompt is redrawn below
/// them. If stderr is redirected, they go there and stay out of the response output.
fn error_writer<S, E>(shared: S, stderr: E, stderr_is_tty: bool) -> Box<dyn Write + Send>
where
    S: Write + Send + 'static,
    E: Write + Send + 'static,
{
    if stderr_is_tty {
        Box::new(shared)
    } else {
        Box::new(stderr)
    }
}
