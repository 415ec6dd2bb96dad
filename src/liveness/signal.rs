// src/liveness/signal.rs

use super::{LivenessProbe, ProbeUnavailable, ProcessIdentity};

/// Tier 3: existence check via signal 0.
///
/// A bare existence check cannot tell a recycled PID from the original
/// process, so an entry is only reported alive when the record carries no
/// identity beyond its PID.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl LivenessProbe for SignalProbe {
    fn name(&self) -> &'static str {
        "signal"
    }

    #[cfg(unix)]
    fn check(&self, batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable> {
        Ok(batch
            .iter()
            .map(|identity| identity.is_bare() && pid_exists(identity.pid))
            .collect())
    }

    #[cfg(not(unix))]
    fn check(&self, _batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable> {
        Err(ProbeUnavailable("signal probing is Unix only".into()))
    }
}

#[cfg(unix)]
pub(crate) fn pid_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // 0 and out-of-range values would address process groups.
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn bare_identity_of_own_process_is_alive() {
        let result = SignalProbe
            .check(&[ProcessIdentity::new(std::process::id())])
            .unwrap();
        assert_eq!(result, vec![true]);
    }

    #[test]
    fn identity_with_expectations_is_never_trusted() {
        let identity = ProcessIdentity::new(std::process::id()).with_executable("whatever");
        assert_eq!(SignalProbe.check(&[identity]).unwrap(), vec![false]);
    }

    #[test]
    fn pid_zero_does_not_exist() {
        assert!(!pid_exists(0));
    }
}
