// src/liveness/system_tool.rs

use std::collections::HashMap;
use std::process::{Command, Stdio};

use regex::Regex;
use tracing::debug;

use super::{LivenessProbe, ProbeUnavailable, ProcessIdentity, executable_basename, executable_matches};

/// Linux truncates `comm` to 15 bytes.
const COMM_MAX_LEN: usize = 15;

/// Tier 2: ask the OS process listing tool (`ps` on Unix, `tasklist` on
/// Windows) for the image name behind each PID.
///
/// Start times are not available here, so an entry is alive when its PID is
/// listed and either the image name matches the recorded executable or no
/// executable was recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolProbe;

impl LivenessProbe for SystemToolProbe {
    fn name(&self) -> &'static str {
        "system-tool"
    }

    fn check(&self, batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable> {
        let images = list_images(batch)?;
        Ok(batch
            .iter()
            .map(|identity| match images.get(&identity.pid) {
                None => false,
                Some(image) => match identity.executable.as_deref() {
                    None => true,
                    Some(expected) => image_matches(expected, image),
                },
            })
            .collect())
    }
}

fn image_matches(expected: &str, image: &str) -> bool {
    if executable_matches(expected, &[image]) {
        return true;
    }
    // `comm` may be a truncated basename.
    let base = executable_basename(expected);
    image.len() == COMM_MAX_LEN && base.len() > COMM_MAX_LEN && base.starts_with(image)
}

#[cfg(unix)]
fn list_images(batch: &[ProcessIdentity]) -> Result<HashMap<u32, String>, ProbeUnavailable> {
    let pids: Vec<String> = batch
        .iter()
        .filter(|identity| identity.pid != 0)
        .map(|identity| identity.pid.to_string())
        .collect();
    if pids.is_empty() {
        return Ok(HashMap::new());
    }

    let output = Command::new("ps")
        .args(["-o", "pid=", "-o", "comm=", "-p", &pids.join(",")])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| ProbeUnavailable(format!("ps: {err}")))?;

    // `ps` exits non-zero when none of the PIDs exist; that is an answer.
    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(windows)]
fn list_images(_batch: &[ProcessIdentity]) -> Result<HashMap<u32, String>, ProbeUnavailable> {
    let output = Command::new("tasklist")
        .args(["/FO", "CSV", "/NH"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| ProbeUnavailable(format!("tasklist: {err}")))?;
    if !output.status.success() {
        return Err(ProbeUnavailable(format!(
            "tasklist exited with {}",
            output.status
        )));
    }
    Ok(parse_tasklist_output(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(not(any(unix, windows)))]
fn list_images(_batch: &[ProcessIdentity]) -> Result<HashMap<u32, String>, ProbeUnavailable> {
    Err(ProbeUnavailable("no process listing tool on this platform".into()))
}

/// Parse `ps -o pid= -o comm=` lines.
pub(crate) fn parse_ps_output(stdout: &str) -> HashMap<u32, String> {
    let Ok(line_re) = Regex::new(r"^\s*(\d+)\s+(.+?)\s*$") else {
        return HashMap::new();
    };
    let mut images = HashMap::new();
    for line in stdout.lines() {
        let Some(caps) = line_re.captures(line) else {
            debug!(line, "unparsable ps line");
            continue;
        };
        if let Ok(pid) = caps[1].parse::<u32>() {
            // macOS prints the full path in `comm`.
            images.insert(pid, caps[2].to_string());
        }
    }
    images
}

/// Parse `tasklist /FO CSV /NH` lines: `"image","pid","session",...`.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn parse_tasklist_output(stdout: &str) -> HashMap<u32, String> {
    let Ok(line_re) = Regex::new(r#"^"([^"]*)","(\d+)""#) else {
        return HashMap::new();
    };
    stdout
        .lines()
        .filter_map(|line| line_re.captures(line.trim()))
        .filter_map(|caps| Some((caps[2].parse::<u32>().ok()?, caps[1].to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ps_lines() {
        let out = "  101 bash\n 202 /Applications/Maya.app/Contents/MacOS/Maya\ngarbage\n";
        let images = parse_ps_output(out);
        assert_eq!(images.get(&101).map(String::as_str), Some("bash"));
        assert_eq!(
            images.get(&202).map(String::as_str),
            Some("/Applications/Maya.app/Contents/MacOS/Maya")
        );
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn parses_tasklist_csv() {
        let out = "\"maya.exe\",\"4242\",\"Console\",\"1\",\"1,024 K\"\r\n\"System\",\"4\",\"Services\",\"0\",\"8 K\"\r\n";
        let images = parse_tasklist_output(out);
        assert_eq!(images.get(&4242).map(String::as_str), Some("maya.exe"));
        assert_eq!(images.get(&4).map(String::as_str), Some("System"));
    }

    #[test]
    fn truncated_comm_still_matches() {
        assert!(image_matches(
            "/opt/foundry/NukeStudioLauncher",
            "NukeStudioLaunc"
        ));
        assert!(!image_matches("/opt/foundry/Nuke", "Maya"));
    }

    #[cfg(unix)]
    #[test]
    fn own_process_is_listed() {
        let batch = vec![ProcessIdentity::new(std::process::id())];
        let result = SystemToolProbe.check(&batch).unwrap();
        assert_eq!(result, vec![true]);
    }
}
