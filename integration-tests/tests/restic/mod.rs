use crate::new_workdir;
use cumulus_core::{
    context::RunContext,
    model::{job, repo, BackupJob, CopyJob, OptionValue, Options as ResticOptions, Repository},
    restic::{Error, Options, Restic},
};
use std::sync::Arc;

fn repository(name: &str, path: &str) -> Arc<Repository> {
    Arc::new(Repository {
        name: repo::Name(name.to_owned()),
        path: path.to_owned(),
        password_command: format!("pass show {}", name),
        ..Default::default()
    })
}

fn backup_job(to: Arc<Repository>) -> BackupJob {
    BackupJob {
        name: job::Name("home".to_owned()),
        from: vec!["/home/test".to_owned()],
        to,
        options: ResticOptions::default()
            .with("exclude", OptionValue::List(vec!["*.tmp".into(), ".cache".into()]))
            .with("one-file-system", true),
        ..Default::default()
    }
}

#[tokio::test]
async fn should_run_specified_restic_binary_with_explicit_arguments() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());
    let ctx = RunContext::default();

    restic
        .run(&ctx, &["arg1", "arg2", "arg3", "arg4"], &Options::default())
        .unwrap()
        .finish(&ctx)
        .await
        .unwrap();

    workdir
        .invocations()
        .assert_args(0, &["arg1", "arg2", "arg3", "arg4"]);
}

#[tokio::test]
async fn should_pass_run_context_environment() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());
    let ctx = RunContext::default().with_env([("EXTRA_ENV", "1")]);

    restic
        .run(&ctx, &["snapshots"], &Options::default())
        .unwrap()
        .finish(&ctx)
        .await
        .unwrap();

    workdir.env().assert_var("EXTRA_ENV", "1");
}

#[tokio::test]
async fn should_run_restic_backup() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());
    let job = backup_job(repository("local", "/srv/repo"));

    restic
        .backup(&RunContext::default(), &job)
        .await
        .unwrap();

    workdir.invocations().assert_args(
        0,
        &[
            "backup",
            "-r",
            "/srv/repo",
            "--password-command",
            "pass show local",
            "--exclude",
            "*.tmp",
            "--exclude",
            ".cache",
            "--one-file-system",
            "/home/test",
        ],
    );
}

#[tokio::test]
async fn should_add_dry_run_and_json_flags() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());
    let ctx = RunContext::default().with_dry_run(true).with_json(true);
    let job = BackupJob {
        options: ResticOptions::default(),
        ..backup_job(repository("local", "/srv/repo"))
    };

    restic.backup(&ctx, &job).await.unwrap();

    workdir.invocations().assert_args(
        0,
        &[
            "backup",
            "--json",
            "-r",
            "/srv/repo",
            "--password-command",
            "pass show local",
            "--dry-run",
            "/home/test",
        ],
    );
}

#[tokio::test]
async fn should_ignore_incomplete_backup_when_configured() {
    let workdir = new_workdir().with_exit_status(3);
    let restic = Restic::new_with_path(workdir.test_binary());
    let job = BackupJob {
        ignore_missing_xattrs: true,
        ..backup_job(repository("local", "/srv/repo"))
    };

    let result = restic.backup(&RunContext::default(), &job).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn should_fail_incomplete_backup_by_default() {
    let workdir = new_workdir().with_exit_status(3);
    let restic = Restic::new_with_path(workdir.test_binary());
    let job = backup_job(repository("local", "/srv/repo"));

    let result = restic.backup(&RunContext::default(), &job).await;

    assert_eq!(result.unwrap_err().exit_code(), Some(3));
}

#[tokio::test]
async fn should_report_stderr_in_command_failure() {
    let workdir = new_workdir()
        .with_exit_status(1)
        .with_stderr("Fatal: wrong password or no key found\n");
    let restic = Restic::new_with_path(workdir.test_binary());

    let result = restic
        .check(&RunContext::default(), &repository("local", "/srv/repo"))
        .await;

    assert_eq!(
        result.unwrap_err().to_string(),
        "repository local: restic check failed [exit code 1]: Fatal: wrong password or no key found"
    );
}

mod initialized {
    use super::*;

    #[tokio::test]
    async fn should_detect_initialized_repository() {
        let workdir = new_workdir();
        let restic = Restic::new_with_path(workdir.test_binary());

        let initialized = restic
            .is_initialized(&RunContext::default(), &repository("local", "/srv/repo"))
            .await
            .unwrap();

        assert!(initialized);
        assert_eq!(workdir.invocations().subcommands(), vec!["stats"]);
    }

    #[tokio::test]
    async fn should_detect_missing_repository() {
        let workdir = new_workdir().with_command_exit_status("stats", 10);
        let restic = Restic::new_with_path(workdir.test_binary());

        let initialized = restic
            .is_initialized(&RunContext::default(), &repository("local", "/srv/repo"))
            .await
            .unwrap();

        assert!(!initialized);
    }

    #[tokio::test]
    async fn should_fail_for_other_errors() {
        let workdir = new_workdir().with_command_exit_status("stats", 1);
        let restic = Restic::new_with_path(workdir.test_binary());

        let result = restic
            .is_initialized(&RunContext::default(), &repository("local", "/srv/repo"))
            .await;

        assert!(matches!(result, Err(Error::CommandFailed { .. })));
    }
}

mod copy {
    use super::*;

    fn copy_job() -> CopyJob {
        CopyJob {
            name: job::Name("mirror".to_owned()),
            from: repository("local", "/srv/repo"),
            to: repository("offsite", "sftp:host:/backup"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn should_copy_between_repositories() {
        let workdir = new_workdir();
        let restic = Restic::new_with_path(workdir.test_binary());

        restic
            .copy(&RunContext::default(), &copy_job())
            .await
            .unwrap();

        workdir.invocations().assert_args(
            0,
            &[
                "copy",
                "-r",
                "sftp:host:/backup",
                "--from-repo",
                "/srv/repo",
                "--password-command",
                "pass show offsite",
                "--from-password-command",
                "pass show local",
            ],
        );
    }

    #[tokio::test]
    async fn should_not_run_copy_in_dry_run() {
        let workdir = new_workdir();
        let restic = Restic::new_with_path(workdir.test_binary());

        restic
            .copy(&RunContext::default().with_dry_run(true), &copy_job())
            .await
            .unwrap();

        assert!(workdir.invocations().runs().is_empty());
    }
}

#[tokio::test]
async fn should_merge_extra_forget_options() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());
    let repo = Repository {
        forget_options: ResticOptions::default()
            .with("keep-daily", 7i64)
            .with("prune", false),
        ..(*repository("local", "/srv/repo")).clone()
    };

    restic
        .forget(
            &RunContext::default(),
            &repo,
            &ResticOptions::default().with("prune", true),
        )
        .await
        .unwrap();

    workdir.invocations().assert_args(
        0,
        &[
            "forget",
            "-r",
            "/srv/repo",
            "--password-command",
            "pass show local",
            "--keep-daily",
            "7",
            "--prune",
        ],
    );
}

#[tokio::test]
async fn should_restore_snapshot_into_target() {
    let workdir = new_workdir();
    let restic = Restic::new_with_path(workdir.test_binary());

    restic
        .restore(
            &RunContext::default(),
            &repository("local", "/srv/repo"),
            "/tmp/restore",
            "latest",
        )
        .await
        .unwrap();

    workdir.invocations().assert_args(
        0,
        &[
            "restore",
            "-r",
            "/srv/repo",
            "--password-command",
            "pass show local",
            "--target",
            "/tmp/restore",
            "latest",
        ],
    );
}

#[tokio::test]
async fn should_get_version_from_first_output_line() {
    let workdir =
        new_workdir().with_stdout("restic 0.16.4 compiled with go1.21.6 on linux/amd64\n");
    let restic = Restic::new_with_path(workdir.test_binary());

    let version = restic
        .version_string(&RunContext::default().with_json(true))
        .await
        .unwrap();

    assert_eq!(version, "restic 0.16.4 compiled with go1.21.6 on linux/amd64");
    workdir.invocations().assert_args(0, &["version"]);
}
