use orc::infra::layout::AGENT_OPTION;
use orc::infra::runner::CommandRunner;
use orc::infra::tmux::{TmuxAdapter, TmuxCli};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs tmux against a private server socket with no user config, so the
/// tests neither see nor disturb the caller's sessions.
struct PrivateServer {
    socket: PathBuf,
}

impl PrivateServer {
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("tmux");
        cmd.arg("-S")
            .arg(&self.socket)
            .arg("-f")
            .arg("/dev/null")
            .args(args)
            .env_remove("TMUX");
        cmd
    }
}

impl CommandRunner for PrivateServer {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, String> {
        assert_eq!(program, "tmux");
        let out = self
            .command(args)
            .output()
            .map_err(|e| format!("failed to execute tmux: {}", e))?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).to_string())
        } else {
            Err(String::from_utf8_lossy(&out.stderr).trim().to_string())
        }
    }
}

impl Drop for PrivateServer {
    fn drop(&mut self) {
        let _ = self.command(&["kill-server"]).output();
    }
}

fn tmux_available() -> bool {
    Command::new("tmux")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn server(dir: &Path) -> TmuxCli<PrivateServer> {
    TmuxCli::with_runner(PrivateServer {
        socket: dir.join("tmux.sock"),
    })
}

#[test]
fn setup_panes_builds_editor_agent_and_shell() {
    if !tmux_available() {
        eprintln!("skipping: tmux not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let tmux = server(dir.path());
    tmux.create_session("forge-WORK-001", dir.path(), "WORK-001")
        .unwrap();
    assert_eq!(
        tmux.find_session("WORK-001").as_deref(),
        Some("forge-WORK-001")
    );

    // `cat` and `tail` block on the pane's terminal, so both panes stay up.
    let index = tmux
        .create_window("forge-WORK-001", 3, "alpha", dir.path())
        .unwrap();
    assert_eq!(index, 3);
    let target = format!("forge-WORK-001:{}", index);
    tmux.setup_panes(&target, dir.path(), "cat", "tail").unwrap();

    let panes = tmux.list_panes(&target);
    assert_eq!(panes.len(), 3, "panes: {:?}", panes);
    assert_eq!(panes[0].start_command, "cat");
    assert_eq!(panes[1].start_command, "tail");
    assert_eq!(panes[2].start_command, "");

    tmux.set_window_option(&target, AGENT_OPTION, "IMP-alpha@BENCH-001")
        .unwrap();
    assert_eq!(
        tmux.window_option(&target, AGENT_OPTION).as_deref(),
        Some("IMP-alpha@BENCH-001")
    );
}

#[test]
fn create_window_reports_where_an_appended_window_landed() {
    if !tmux_available() {
        eprintln!("skipping: tmux not available");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let tmux = server(dir.path());
    tmux.create_session("forge-WORK-001", dir.path(), "WORK-001")
        .unwrap();
    let first = tmux.list_windows("forge-WORK-001");
    assert_eq!(first.len(), 1);
    let taken = first[0].index;

    let index = tmux
        .create_window("forge-WORK-001", taken, "alpha", dir.path())
        .unwrap();
    assert_ne!(index, taken);

    let windows = tmux.list_windows("forge-WORK-001");
    let alpha = windows.iter().find(|w| w.name == "alpha").unwrap();
    assert_eq!(alpha.index, index);

    tmux.setup_panes(&format!("forge-WORK-001:{}", index), dir.path(), "cat", "tail")
        .unwrap();
    assert_eq!(tmux.list_panes(&format!("forge-WORK-001:{}", index)).len(), 3);
    assert_eq!(tmux.list_panes(&format!("forge-WORK-001:{}", taken)).len(), 1);
}
