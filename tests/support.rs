//! Shared harness for driving the real `foreman` binary: config file
//! generation, a status-pipe-backed [`Master`] handle, and a small fluent
//! wrapper over `assert_cmd` for one-shot subcommands.

use assert_cmd::assert::Assert;
use assert_cmd::Command as AssertCommand;
use nix::sys::signal::Signal;
use nix::unistd::Pid as NixPid;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

/// fd number the child sees its inherited status pipe on. Arbitrary, just
/// needs to be outside the handful of fds a fresh process already has open.
const STATUS_CHILD_FD: i32 = 50;

#[allow(deprecated)] // the cargo_bin! macro needs nightly; this is the stable path
pub fn cli() -> Cli {
    Cli { cmd: AssertCommand::cargo_bin("foreman").expect("foreman binary must build") }
}

pub struct Cli {
    cmd: AssertCommand,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> Output {
        Output { assert: self.cmd.assert().success() }
    }

    pub fn fails(mut self) -> Output {
        Output { assert: self.cmd.assert().failure() }
    }

    pub fn code(mut self, code: i32) -> Output {
        Output { assert: self.cmd.assert().code(code) }
    }
}

pub struct Output {
    assert: Assert,
}

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        let out = String::from_utf8_lossy(&self.assert.get_output().stdout).into_owned();
        assert!(out.contains(needle), "stdout missing {needle:?}, got: {out}");
        self
    }
}

/// Write a `[[queue]]`-table config file. Each entry is
/// `(queue_key, worker_count, argv)`.
pub fn write_config(dir: &Path, name: &str, queues: &[(&str, u32, &[&str])]) -> PathBuf {
    let mut body = String::new();
    for (key, count, argv) in queues {
        body.push_str("[[queue]]\n");
        body.push_str(&format!("queue_key = {key:?}\n"));
        body.push_str(&format!("worker_count = {count}\n"));
        let quoted: Vec<String> = argv.iter().map(|a| format!("{a:?}")).collect();
        body.push_str(&format!("command = [{}]\n\n", quoted.join(", ")));
    }
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write config");
    path
}

/// Write a config file that fails to parse, for crash-loop scenarios: the
/// listener exits nonzero almost immediately after `exec`.
pub fn write_broken_config(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "this is not valid toml [[[").expect("write broken config");
    path
}

/// A running `foreman start` process, with its status-pipe output readable
/// from a separate file handle so polling doesn't race the child's writes.
pub struct Master {
    child: Child,
    status_path: PathBuf,
    pidfile_path: PathBuf,
}

impl Master {
    pub fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    pub fn pidfile_path(&self) -> &Path {
        &self.pidfile_path
    }

    pub fn status_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.status_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Poll `status_lines()` until `pred` holds or `timeout` elapses.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&[String]) -> bool) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let lines = self.status_lines();
            if pred(&lines) {
                return lines;
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for status condition; saw: {lines:?}");
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    pub fn signal(&self, sig: Signal) {
        nix::sys::signal::kill(NixPid::from_raw(self.pid()), sig).expect("send signal to master");
    }

    /// Whether the master process is still alive.
    pub fn is_alive(&self) -> bool {
        nix::sys::signal::kill(NixPid::from_raw(self.pid()), None::<Signal>).is_ok()
    }

    /// Poll until the master has exited or `timeout` elapses.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(Some(_)) = self.child.try_wait() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    /// Forcibly end the master and reap it, for test cleanup.
    pub fn kill(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        // Best-effort safety net if a test panics before explicit cleanup.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct MasterBuilder<'a> {
    config: &'a Path,
    pidfile: PathBuf,
    status_path: PathBuf,
    extra_args: Vec<&'a str>,
}

pub fn master(dir: &Path, config: &Path) -> MasterBuilder<'_> {
    let status_path = dir.join("status.log");
    File::create(&status_path).expect("create status file");
    MasterBuilder { config, pidfile: dir.join("foreman.pid"), status_path, extra_args: Vec::new() }
}

impl<'a> MasterBuilder<'a> {
    pub fn arg(mut self, arg: &'a str) -> Self {
        self.extra_args.push(arg);
        self
    }

    pub fn pidfile(&self) -> &Path {
        &self.pidfile
    }

    #[allow(deprecated)] // the cargo_bin! macro needs nightly; this is the stable path
    pub fn spawn(self) -> Master {
        // Opened read-write so the dup'd copy in the child can still write
        // after this handle closes; the status file itself outlives both.
        let status_src = File::options().write(true).open(&self.status_path).expect("open status file");
        let status_fd = status_src.as_raw_fd();

        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("foreman"));
        cmd.arg("start")
            .arg("--config")
            .arg(self.config)
            .arg("--pidfile")
            .arg(&self.pidfile)
            .arg("--status-pipe")
            .arg(STATUS_CHILD_FD.to_string())
            .args(&self.extra_args);

        // SAFETY: runs in the forked child before `exec`; only dup2s a
        // plain fd this process owns, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if libc::dup2(status_fd, STATUS_CHILD_FD) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().expect("spawn foreman start");
        drop(status_src);

        Master { child, status_path: self.status_path, pidfile_path: self.pidfile }
    }
}
