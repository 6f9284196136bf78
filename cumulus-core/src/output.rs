use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Child,
};

const MAX_STDERR_LINES: usize = 20;

/// Re-emits a child's captured output as log events, one per line. Stdout
/// goes to INFO, stderr to WARN. Returns the last lines of stderr so they can
/// be attached to an error.
pub(crate) async fn forward(child: &mut Child, source: &'static str) -> std::io::Result<String> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout = async {
        if let Some(stdout) = stdout {
            for_each_line(stdout, |line| tracing::info!(source = source, "{}", line)).await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let stderr = async {
        let mut tail = Vec::new();
        if let Some(stderr) = stderr {
            for_each_line(stderr, |line| {
                tracing::warn!(source = source, "{}", line);
                if tail.len() == MAX_STDERR_LINES {
                    tail.remove(0);
                }
                tail.push(line.to_owned());
            })
            .await?;
        }
        Ok::<_, std::io::Error>(tail.join("\n"))
    };

    let ((), stderr) = tokio::try_join!(stdout, stderr)?;
    Ok(stderr)
}

async fn for_each_line(
    reader: impl AsyncRead + Unpin,
    mut f: impl FnMut(&str),
) -> std::io::Result<()> {
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        f(&line);
    }
    Ok(())
}

/// Renders a command line for display, quoting arguments that a shell would
/// split or expand.
pub(crate) fn format_command(program: &str, args: &[impl AsRef<str>]) -> String {
    let mut line = program.to_owned();
    for arg in args {
        let arg = arg.as_ref();
        line.push(' ');
        if arg.is_empty() || arg.contains(|c: char| " \t\n\"'`$\\".contains(c)) {
            line.push('"');
            line.push_str(&arg.replace('"', "\\\""));
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}
