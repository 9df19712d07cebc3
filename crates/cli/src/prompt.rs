use console::Term;
use nix::sys::termios::{SetArg, tcgetattr, tcsetattr};
use std::io::{self, BufRead, IsTerminal, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tollgate_core::{PromptError, Prompter};

/// Set while a prompt waits for input. Ctrl-C at any other time is left to
/// the runner's child process.
static PROMPTING: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
enum Event {
    Line(io::Result<String>),
    Interrupted,
}

/// Reads prompted values from stdin. Hidden input goes through the
/// controlling terminal when there is one.
#[derive(Debug)]
pub struct TerminalPrompter {
    events: Receiver<Event>,
    sender: Sender<Event>,
}

impl TerminalPrompter {
    /// Installs the process-wide Ctrl-C handler, so it succeeds once per
    /// process.
    pub fn new() -> Result<Self, ctrlc::Error> {
        let (sender, events) = mpsc::channel();
        let interrupts = sender.clone();
        ctrlc::set_handler(move || {
            if PROMPTING.load(Ordering::SeqCst) {
                let _ = interrupts.send(Event::Interrupted);
            }
        })?;
        Ok(Self { events, sender })
    }
}

fn trim_newline(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(trim_newline(line))
}

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, text: &str, no_echo: bool) -> Result<String, PromptError> {
        while self.events.try_recv().is_ok() {}

        let stdin = io::stdin();
        let hidden = no_echo && stdin.is_terminal();
        let saved = if hidden {
            tcgetattr(stdin.as_raw_fd()).ok()
        } else {
            None
        };

        PROMPTING.store(true, Ordering::SeqCst);
        let shown = if hidden {
            Term::stderr().write_str(text)
        } else {
            let mut stdout = io::stdout();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
        };
        if let Err(err) = shown {
            PROMPTING.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        let sender = self.sender.clone();
        thread::spawn(move || {
            let line = if hidden {
                Term::stderr().read_secure_line()
            } else {
                read_stdin_line()
            };
            let _ = sender.send(Event::Line(line));
        });
        let event = self.events.recv();
        PROMPTING.store(false, Ordering::SeqCst);

        match event {
            Ok(Event::Line(line)) => Ok(line?),
            Ok(Event::Interrupted) | Err(_) => {
                // The reader may have turned echo off; it never gets to turn it back on.
                if let Some(termios) = &saved {
                    let _ = tcsetattr(stdin.as_raw_fd(), SetArg::TCSANOW, termios);
                }
                let _ = writeln!(io::stderr());
                tracing::debug!("prompt interrupted");
                Err(PromptError::Cancelled)
            }
        }
    }
}
