#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    #[cfg(unix)]
    SIGHUP,
    #[cfg(unix)]
    SIGINT,
    #[cfg(unix)]
    SIGTERM,

    #[cfg(windows)]
    CtrlBreak,
    #[cfg(windows)]
    CtrlC,
}

impl Signal {
    /// The shell convention for a process killed by this signal.
    pub fn exit_code(&self) -> i32 {
        let number = match self {
            #[cfg(unix)]
            Signal::SIGHUP => 1,
            #[cfg(unix)]
            Signal::SIGINT => 2,
            #[cfg(unix)]
            Signal::SIGTERM => 15,

            #[cfg(windows)]
            Signal::CtrlC => 2,
            #[cfg(windows)]
            Signal::CtrlBreak => 21,
        };
        128 + number
    }
}

#[cfg(unix)]
pub async fn shutdown_signal() -> eyre::Result<Signal> {
    use tokio::signal::unix::SignalKind;

    let mut hangup = tokio::signal::unix::signal(SignalKind::hangup())?;
    let mut interrupt = tokio::signal::unix::signal(SignalKind::interrupt())?;
    let mut terminate = tokio::signal::unix::signal(SignalKind::terminate())?;
    let signal = tokio::select! {
        _ = hangup.recv() => Signal::SIGHUP,
        _ = interrupt.recv() => Signal::SIGINT,
        _ = terminate.recv() => Signal::SIGTERM,
    };
    Ok(signal)
}

#[cfg(windows)]
pub async fn shutdown_signal() -> eyre::Result<Signal> {
    let mut ctrl_break = tokio::signal::windows::ctrl_break()?;
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    let signal = tokio::select! {
        _ = ctrl_break.recv() => Signal::CtrlBreak,
        _ = ctrl_c.recv() => Signal::CtrlC,
    };
    Ok(signal)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn should_follow_shell_exit_code_convention() {
        assert_eq!(Signal::SIGINT.exit_code(), 130);
        assert_eq!(Signal::SIGTERM.exit_code(), 143);
        assert_eq!(Signal::SIGHUP.exit_code(), 129);
    }
}
