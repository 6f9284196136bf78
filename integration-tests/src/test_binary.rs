//! Stand-in for restic. Appends its arguments to `invocations` next to the
//! executable, writes its environment to `env`, copies `stdout`/`stderr` if
//! present and exits with the status from `exit-status-<subcommand>` or
//! `exit-status`, defaulting to 0.

use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

fn append_invocation(workdir: &Path, args: &[String]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(workdir.join("invocations"))?;
    file.write_all(args.join("\t").as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

fn write_env(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::create(workdir.join("env"))?;
    for (key, value) in std::env::vars() {
        file.write_all(key.as_bytes())?;
        file.write_all(b"=")?;
        file.write_all(value.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn read_exit_status(path: &Path) -> Result<i32, Box<dyn Error>> {
    let exit_status = std::fs::read_to_string(path)?.trim().parse()?;
    Ok(exit_status)
}

fn get_exit_status(workdir: &Path, subcommand: Option<&str>) -> Option<i32> {
    subcommand
        .and_then(|cmd| read_exit_status(&workdir.join(format!("exit-status-{}", cmd))).ok())
        .or_else(|| read_exit_status(&workdir.join("exit-status")).ok())
}

fn copy_stdout(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::open(workdir.join("stdout"))?;
    std::io::copy(&mut file, &mut std::io::stdout())?;
    Ok(())
}

fn copy_stderr(workdir: &Path) -> std::io::Result<()> {
    let mut file = File::open(workdir.join("stderr"))?;
    std::io::copy(&mut file, &mut std::io::stderr())?;
    Ok(())
}

fn main() {
    let workdir = match std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_owned))
    {
        Some(workdir) => workdir,
        None => std::process::exit(127),
    };
    let args: Vec<String> = std::env::args().skip(1).collect();
    let _ = append_invocation(&workdir, &args);
    let _ = write_env(&workdir);
    let _ = copy_stdout(&workdir);
    let _ = copy_stderr(&workdir);

    let exit_status = get_exit_status(&workdir, args.first().map(String::as_str)).unwrap_or(0);
    std::process::exit(exit_status);
}
