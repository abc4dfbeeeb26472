//! Shell-script stand-ins for ffmpeg and ffprobe used by process-level tests.

use crate::config::ToolsConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temp directory holding fake `ffmpeg`/`ffprobe` scripts.
pub struct FakeTools {
    pub dir: TempDir,
    pub config: ToolsConfig,
    calls_log: PathBuf,
}

impl FakeTools {
    pub fn builder() -> FakeToolsBuilder {
        FakeToolsBuilder::default()
    }

    /// Argument lists of every fake ffmpeg invocation, in call order
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls_log)
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

pub struct FakeToolsBuilder {
    frames: String,
    audio: bool,
    probe_exit: i32,
    stderr: String,
    exit_code: i32,
    fail_pattern: Option<String>,
    delay_secs: u32,
    killed: bool,
}

impl Default for FakeToolsBuilder {
    fn default() -> Self {
        Self {
            frames: "100".to_string(),
            audio: true,
            probe_exit: 0,
            stderr: "frame=   50 fps=25 q=28.0 size=     256kB time=00:00:02.00\n\
                     frame=  100 fps=25 q=28.0 size=     512kB time=00:00:04.00\n"
                .to_string(),
            exit_code: 0,
            fail_pattern: None,
            delay_secs: 0,
            killed: false,
        }
    }
}

impl FakeToolsBuilder {
    /// Raw output of the frame count query
    pub fn frames(mut self, frames: &str) -> Self {
        self.frames = frames.to_string();
        self
    }

    pub fn audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    pub fn probe_exit(mut self, code: i32) -> Self {
        self.probe_exit = code;
        self
    }

    /// Bytes the fake encoder writes to stderr
    pub fn stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Exit 1 when the destination argument contains `pattern`
    pub fn fail_when_destination_contains(mut self, pattern: &str) -> Self {
        self.fail_pattern = Some(pattern.to_string());
        self
    }

    pub fn delay_secs(mut self, secs: u32) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Make the fake encoder SIGKILL itself after writing its stderr
    pub fn killed_by_signal(mut self) -> Self {
        self.killed = true;
        self
    }

    pub fn build(self) -> FakeTools {
        let dir = TempDir::new().expect("create temp dir");
        let ffprobe = dir.path().join("ffprobe");
        let ffmpeg = dir.path().join("ffmpeg");
        let calls_log = dir.path().join("ffmpeg-calls.log");
        let stderr_file = dir.path().join("ffmpeg-stderr.txt");

        let audio_line = if self.audio { "echo 1" } else { ":" };
        write_script(
            &ffprobe,
            &format!(
                "#!/bin/sh\n\
                 case \"$*\" in\n\
                 *stream=nb_frames*) echo '{frames}' ;;\n\
                 *stream=index*) {audio} ;;\n\
                 esac\n\
                 exit {code}\n",
                frames = self.frames,
                audio = audio_line,
                code = self.probe_exit,
            ),
        );

        fs::write(&stderr_file, &self.stderr).expect("write stderr fixture");
        let fail_case = match &self.fail_pattern {
            Some(pattern) => format!(
                "case \"$last\" in\n*{}*) echo 'Conversion failed!' >&2; exit 1 ;;\nesac\n",
                pattern
            ),
            None => String::new(),
        };
        let mut delay = if self.delay_secs > 0 {
            format!("sleep {}\n", self.delay_secs)
        } else {
            String::new()
        };
        if self.killed {
            delay.push_str("kill -9 $$\n");
        }
        write_script(
            &ffmpeg,
            &format!(
                "#!/bin/sh\n\
                 for last; do :; done\n\
                 printf '%s\\n' \"$*\" >> '{log}'\n\
                 cat '{stderr}' >&2\n\
                 {delay}\
                 {fail_case}\
                 if [ {code} -eq 0 ]; then : > \"$last\"; fi\n\
                 exit {code}\n",
                log = calls_log.display(),
                stderr = stderr_file.display(),
                delay = delay,
                fail_case = fail_case,
                code = self.exit_code,
            ),
        );

        FakeTools {
            dir,
            config: ToolsConfig { ffmpeg, ffprobe },
            calls_log,
        }
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

/// Create an empty input file named `name` inside `dir`
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"").expect("create input file");
    path
}
