//! Line-oriented console shell.
//!
//! # Responsibilities
//! - Show the loaded plugins and answer `plugins`, `health`, `help`, `quit`
//! - Close on `quit`, on end of input, or when cancellation is requested
//!
//! # Design Decisions
//! - Input is read on a dedicated thread so the loop can poll cancellation;
//!   a blocked stdin read never holds up shutdown

use std::io::{self, BufRead, BufReader, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::ui::{UiContext, UiError, UiShell};

const POLL: Duration = Duration::from_millis(100);

enum Flow {
    Continue,
    Quit,
}

/// Interactive shell over any line source.
pub struct ConsoleShell {
    input: Mutex<Option<Box<dyn BufRead + Send>>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleShell {
    pub fn new(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Mutex::new(Some(Box::new(input))),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// A shell on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }

    fn execute(&self, out: &mut dyn Write, line: &str, ctx: &UiContext) -> Result<Flow, UiError> {
        match line.trim() {
            "" => {}
            "help" => {
                writeln!(out, "commands: plugins, health, help, quit")?;
            }
            "plugins" => {
                if ctx.plugins.is_empty() {
                    writeln!(out, "  (no plugins loaded)")?;
                }
                for plugin in &ctx.plugins {
                    writeln!(out, "  {:<16} {}", plugin.name, plugin.description)?;
                }
            }
            "health" => {
                let report = ctx.runtime.block_on(ctx.health.check_all());
                writeln!(out, "overall: {}", report.status)?;
                for (name, check) in &report.checks {
                    writeln!(out, "  {:<10} {:<10} {}", name, check.status, check.detail)?;
                }
            }
            "quit" | "exit" => return Ok(Flow::Quit),
            other => {
                writeln!(out, "unknown command '{other}', type 'help'")?;
            }
        }
        Ok(Flow::Continue)
    }
}

impl UiShell for ConsoleShell {
    fn name(&self) -> &str {
        "console"
    }

    fn run(&self, ctx: UiContext) -> Result<(), UiError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| UiError::Failed("console input already consumed".into()))?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("headunit-console-input".into())
            .spawn(move || {
                for line in input.lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        let mut out = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "== {} ==", ctx.title)?;
        writeln!(out, "{} plugin(s) loaded; type 'help' for commands", ctx.plugins.len())?;
        write!(out, "> ")?;
        out.flush()?;

        loop {
            if ctx.cancel.is_cancelled() {
                writeln!(out)?;
                writeln!(out, "shutting down")?;
                break;
            }
            match rx.recv_timeout(POLL) {
                Ok(Ok(line)) => match self.execute(&mut **out, &line, &ctx)? {
                    Flow::Quit => break,
                    Flow::Continue => {
                        write!(out, "> ")?;
                        out.flush()?;
                    }
                },
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Console input closed");
                    break;
                }
            }
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthRegistry;
    use crate::plugins::PluginDescriptor;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn context(runtime: &tokio::runtime::Runtime, cancel: CancellationToken) -> UiContext {
        UiContext {
            title: "Head Unit".into(),
            plugins: vec![PluginDescriptor {
                name: "Clock".into(),
                description: "Dashboard clock".into(),
            }],
            cancel,
            health: Arc::new(HealthRegistry::new()),
            runtime: runtime.handle().clone(),
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_commands_then_quit() {
        let rt = runtime();
        let out = SharedBuf::default();
        let shell = ConsoleShell::new(io::Cursor::new("plugins\nhealth\nbogus\nquit\nplugins\n"), out.clone());

        shell.run(context(&rt, CancellationToken::new())).unwrap();

        let text = out.text();
        assert!(text.contains("== Head Unit =="));
        assert!(text.contains("Clock"));
        assert!(text.contains("overall: healthy"));
        assert!(text.contains("unknown command 'bogus'"));
        assert_eq!(text.matches("Dashboard clock").count(), 1);
    }

    #[test]
    fn test_end_of_input_closes() {
        let rt = runtime();
        let shell = ConsoleShell::new(io::Cursor::new(""), io::sink());
        assert!(shell.run(context(&rt, CancellationToken::new())).is_ok());
    }

    #[test]
    fn test_cancellation_closes() {
        let rt = runtime();
        let out = SharedBuf::default();
        // Reader that never yields a line.
        let (_keep, pipe) = blocking_reader();
        let shell = ConsoleShell::new(pipe, out.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        shell.run(context(&rt, cancel)).unwrap();
        assert!(out.text().contains("shutting down"));
    }

    #[test]
    fn test_second_run_fails() {
        let rt = runtime();
        let shell = ConsoleShell::new(io::Cursor::new(""), io::sink());
        shell.run(context(&rt, CancellationToken::new())).unwrap();
        assert!(matches!(
            shell.run(context(&rt, CancellationToken::new())),
            Err(UiError::Failed(_))
        ));
    }

    struct Blocking(mpsc::Receiver<()>);

    impl io::Read for Blocking {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    fn blocking_reader() -> (mpsc::Sender<()>, BufReader<Blocking>) {
        let (tx, rx) = mpsc::channel();
        (tx, BufReader::new(Blocking(rx)))
    }
}
