use crate::new_workdir;
use cumulus_core::{
    context::RunContext,
    model::{job, repo, BackupJob, CopyJob, Hooks, Job, Repository},
    restic::Restic,
    shell::Shell,
};
use cumulus_jobs::{backup::JobRunner, healthchecks, Error};
use integration_tests::Workdir;
use std::sync::Arc;

fn repository(name: &str, path: &str) -> Arc<Repository> {
    Arc::new(Repository {
        name: repo::Name(name.to_owned()),
        path: path.to_owned(),
        password_command: "echo secret".to_owned(),
        ..Default::default()
    })
}

fn backup_job(name: &str, to: Arc<Repository>) -> Job {
    Job::Backup(BackupJob {
        name: job::Name(name.to_owned()),
        from: vec!["/home/test".to_owned()],
        to,
        ..Default::default()
    })
}

fn runner(workdir: &Workdir) -> JobRunner {
    JobRunner::new(
        Arc::new(Restic::new_with_path(workdir.test_binary())),
        Arc::new(Shell),
        Arc::new(healthchecks::Client::new().unwrap()),
    )
}

#[tokio::test]
async fn should_run_full_job_pipeline() {
    let workdir = new_workdir();

    runner(&workdir)
        .job_handler()
        .handle(
            RunContext::default(),
            backup_job("home", repository("local", "/srv/repo")),
        )
        .await
        .unwrap();

    assert_eq!(
        workdir.invocations().subcommands(),
        vec!["stats", "backup", "check", "forget"]
    );
}

#[tokio::test]
async fn should_pass_dry_run_to_writing_commands() {
    let workdir = new_workdir();

    runner(&workdir)
        .job_handler()
        .handle(
            RunContext::default().with_dry_run(true),
            backup_job("home", repository("local", "/srv/repo")),
        )
        .await
        .unwrap();

    let invocations = workdir.invocations();
    assert_eq!(
        invocations.subcommands(),
        vec!["stats", "backup", "check", "forget"]
    );
    assert!(invocations
        .find("backup")
        .unwrap()
        .contains(&"--dry-run".to_owned()));
    assert!(invocations
        .find("forget")
        .unwrap()
        .contains(&"--dry-run".to_owned()));
    assert!(!invocations
        .find("check")
        .unwrap()
        .contains(&"--dry-run".to_owned()));
}

#[tokio::test]
async fn should_initialize_missing_repository_before_backup() {
    let workdir = new_workdir().with_command_exit_status("stats", 10);

    runner(&workdir)
        .job_handler()
        .handle(
            RunContext::default(),
            backup_job("home", repository("local", "/srv/repo")),
        )
        .await
        .unwrap();

    assert_eq!(
        workdir.invocations().subcommands(),
        vec!["stats", "init", "backup", "check", "forget"]
    );
}

#[tokio::test]
async fn should_initialize_both_ends_of_copy() {
    let workdir = new_workdir();
    let job = Job::Copy(CopyJob {
        name: job::Name("mirror".to_owned()),
        from: repository("local", "/srv/repo"),
        to: repository("offsite", "/mnt/offsite"),
        ..Default::default()
    });

    runner(&workdir)
        .job_handler()
        .handle(RunContext::default(), job)
        .await
        .unwrap();

    let invocations = workdir.invocations();
    assert_eq!(
        invocations.subcommands(),
        vec!["stats", "stats", "copy", "check", "forget"]
    );
    assert_eq!(invocations.runs()[0][2], "/srv/repo");
    assert_eq!(invocations.runs()[1][2], "/mnt/offsite");
}

#[tokio::test]
async fn should_stop_job_when_backup_fails() {
    let workdir = new_workdir().with_command_exit_status("backup", 1);

    let result = runner(&workdir)
        .job_handler()
        .handle(
            RunContext::default(),
            backup_job("home", repository("local", "/srv/repo")),
        )
        .await;

    assert!(matches!(result, Err(Error::Operation(_))));
    assert_eq!(workdir.invocations().subcommands(), vec!["stats", "backup"]);
}

#[tokio::test]
async fn should_report_every_failed_job_of_a_batch() {
    let workdir = new_workdir().with_command_exit_status("check", 1);
    let jobs = vec![
        backup_job("home", repository("local", "/srv/repo")),
        backup_job("media", repository("local", "/srv/repo")),
    ];

    let result = runner(&workdir)
        .batch_handler()
        .handle(RunContext::default(), jobs)
        .await;

    match result {
        Err(Error::Jobs(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(
        workdir.invocations().subcommands(),
        vec!["stats", "backup", "check", "stats", "backup", "check"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn should_run_shell_hooks_with_job_environment() {
    let workdir = new_workdir();
    let out = workdir.path().join("hook-output");
    let job = Job::Backup(BackupJob {
        name: job::Name("home".to_owned()),
        from: vec!["/home/test".to_owned()],
        to: repository("local", "/srv/repo"),
        hooks: Hooks {
            before: vec![format!("echo \"before $CUMULUS_JOB_NAME\" >> {}", out.display())],
            success: vec![format!("echo \"success $CUMULUS_JOB_NAME\" >> {}", out.display())],
            failure: vec![format!("echo failure >> {}", out.display())],
        },
        ..Default::default()
    });

    runner(&workdir)
        .job_handler()
        .handle(RunContext::default(), job)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "before home\nsuccess home\n"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn should_pass_error_to_failure_hooks() {
    let workdir = new_workdir().with_command_exit_status("backup", 1);
    let out = workdir.path().join("hook-output");
    let job = Job::Backup(BackupJob {
        name: job::Name("home".to_owned()),
        from: vec!["/home/test".to_owned()],
        to: repository("local", "/srv/repo"),
        hooks: Hooks {
            failure: vec![format!(
                "test -n \"$CUMULUS_ERROR\" && echo failed >> {}",
                out.display()
            )],
            ..Default::default()
        },
        ..Default::default()
    });

    let result = runner(&workdir)
        .job_handler()
        .handle(RunContext::default(), job)
        .await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "failed\n");
}
