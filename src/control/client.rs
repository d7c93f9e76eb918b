//! Interactive control client

use crate::dataplane::Rule;
use crate::{Error, Result};
use std::io::{BufRead, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Talks to a running daemon through its control socket
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// One session: send `request`, close our side, read the reply to EOF
    fn exchange(&self, request: &str) -> Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path)?;
        stream.write_all(request.as_bytes())?;
        stream.shutdown(Shutdown::Write)?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply)?;
        Ok(reply)
    }

    /// Fetch the current rule listing
    pub fn list(&self) -> Result<String> {
        self.exchange("")
    }

    /// Send one command line and return the daemon's reply line
    pub fn send(&self, command: &str) -> Result<String> {
        let reply = self.exchange(&format!("{}\n", command.trim_end()))?;
        Ok(reply.trim_end().to_string())
    }

    pub fn add(&self, rule_line: &str) -> Result<String> {
        self.send(&format!("add {}", rule_line.trim()))
    }

    pub fn delete(&self, index: u32) -> Result<String> {
        self.send(&format!("del {}", index))
    }
}

const HELP: &str = "Example commands:
\texit
\tprint
\tadd tcp out block anyip anyip 0 anyip anyip 22 [block outgoing ssh packets]
\tdel 2
";

/// Split off the first whitespace-separated token
fn cut_token(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    }
}

/// Run one REPL command. Returns `false` when the session should end.
pub fn execute<W: Write>(client: &ControlClient, line: &str, out: &mut W) -> Result<bool> {
    let (cmd, rest) = cut_token(line);

    match cmd {
        "exit" => return Ok(false),
        "print" => match client.list() {
            Ok(listing) if listing.is_empty() => writeln!(out, "[no rules]")?,
            Ok(listing) => write!(out, "{}", listing)?,
            Err(e) => not_running(client, &e, out)?,
        },
        "add" => {
            if Rule::deserialize(rest).is_err() {
                writeln!(out, "Firewall rule misformatted: {}", rest)?;
            } else {
                report(client, client.add(rest), out)?;
            }
        }
        "del" => match rest.parse::<u32>() {
            Ok(index) => report(client, client.delete(index), out)?,
            Err(_) => writeln!(out, "Rule number misformatted: {}", rest)?,
        },
        _ => writeln!(out, "{}", HELP)?,
    }

    Ok(true)
}

fn report<W: Write>(client: &ControlClient, reply: Result<String>, out: &mut W) -> Result<()> {
    match reply {
        Ok(reply) if reply.starts_with("error") => writeln!(out, "{}", reply)?,
        Ok(_) => {}
        Err(e) => not_running(client, &e, out)?,
    }
    Ok(())
}

fn not_running<W: Write>(client: &ControlClient, err: &Error, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "firewall not running; cannot reach control socket {}: {}",
        client.socket_path().display(),
        err
    )?;
    Ok(())
}

/// Prompt-driven loop until `exit` or end of input
pub fn run_repl<R: BufRead, W: Write>(client: &ControlClient, input: R, mut out: W) -> Result<()> {
    writeln!(out, "Firewall client v0.1")?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if !execute(client, &line, &mut out)? {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> ControlClient {
        ControlClient::new(std::env::temp_dir().join(format!(
            "fwall-client-test-{}-missing.sock",
            std::process::id()
        )))
    }

    fn run(input: &str) -> String {
        let mut out = Vec::new();
        run_repl(&offline_client(), input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_cut_token() {
        assert_eq!(cut_token("add tcp out"), ("add", "tcp out"));
        assert_eq!(cut_token("  print  "), ("print", ""));
        assert_eq!(cut_token(""), ("", ""));
    }

    #[test]
    fn test_help_on_unknown_command() {
        let out = run("hello\nexit\n");
        assert!(out.starts_with("Firewall client v0.1\n> "));
        assert!(out.contains("Example commands:"));
        assert!(out.contains("add tcp out block anyip anyip 0 anyip anyip 22"));
    }

    #[test]
    fn test_add_validated_locally() {
        let out = run("add tcp out block\n");
        assert!(out.contains("Firewall rule misformatted: tcp out block"));
    }

    #[test]
    fn test_del_validated_locally() {
        let out = run("del two\n");
        assert!(out.contains("Rule number misformatted: two"));
    }

    #[test]
    fn test_daemon_not_running() {
        let out = run("print\n");
        assert!(out.contains("firewall not running"));
    }

    #[test]
    fn test_exit_stops_loop() {
        let out = run("exit\nhello\n");
        assert!(!out.contains("Example commands:"));
    }
}
