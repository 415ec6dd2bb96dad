// src/spawn/detach.rs

use std::process::Command;

#[cfg(windows)]
pub const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
#[cfg(windows)]
pub const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
#[cfg(windows)]
pub const DETACHED_PROCESS: u32 = 0x0000_0008;

/// Creation flags that give a child its own console.
///
/// Zero off Windows, where the flag has no meaning.
pub fn new_console_flags() -> u32 {
    #[cfg(windows)]
    {
        CREATE_NEW_CONSOLE
    }
    #[cfg(not(windows))]
    {
        0
    }
}

/// Make `cmd` outlive the launcher.
///
/// On Unix the child starts a new session (`setsid`). On Windows explicit
/// `creation_flags` win; otherwise a detached child gets its own process
/// group without a console.
pub fn configure(cmd: &mut Command, detach: bool, creation_flags: Option<u32>) {
    #[cfg(unix)]
    {
        let _ = creation_flags;
        if detach {
            use std::os::unix::process::CommandExt;
            // SAFETY: `setsid` is async-signal-safe and touches no memory
            // shared with the parent.
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(std::io::Error::from)
                });
            }
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        let flags = creation_flags.unwrap_or(if detach {
            CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS
        } else {
            0
        });
        if flags != 0 {
            cmd.creation_flags(flags);
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (cmd, detach, creation_flags);
    }
}
