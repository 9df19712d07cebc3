use nix::unistd::{Uid, User, execv, geteuid};
use std::ffi::{CString, OsString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use tollgate_core::{IdentityError, Privileges, SUDO_USER_VAR, validate_sudo_user};

const SUDO: &str = "/usr/bin/sudo";

/// Identity checks against the effective uid, elevation through `sudo`.
#[derive(Debug, Clone)]
pub struct SudoPrivileges {
    argv: Vec<OsString>,
}

impl SudoPrivileges {
    /// Capture the process arguments for a later re-exec.
    pub fn from_env() -> Self {
        Self {
            argv: std::env::args_os().collect(),
        }
    }

    fn uid_of(user: &str) -> Result<Uid, IdentityError> {
        match User::from_name(user) {
            Ok(Some(entry)) => Ok(entry.uid),
            Ok(None) => Err(IdentityError::UnknownUser(user.to_string())),
            Err(errno) => Err(IdentityError::Elevation {
                user: user.to_string(),
                reason: errno.to_string(),
            }),
        }
    }

    fn exec_as(&self, user: &str) -> Result<String, IdentityError> {
        let elevation = |reason: String| IdentityError::Elevation {
            user: user.to_string(),
            reason,
        };

        let program = resolve_program(std::env::current_exe(), self.argv.first())
            .ok_or_else(|| elevation("cannot locate the running executable".to_string()))?;

        let argv = sudo_argv(
            user,
            program.into_os_string(),
            self.argv.iter().skip(1).cloned(),
        )
        .map_err(elevation)?;
        let sudo = CString::new(SUDO).map_err(|err| elevation(err.to_string()))?;

        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        tracing::debug!(user, "re-executing through sudo");

        match execv(&sudo, &argv) {
            Ok(never) => match never {},
            Err(errno) => Err(elevation(errno.to_string())),
        }
    }
}

/// Path of the running executable, which must match the one allowed in the
/// sudoers entry. `argv[0]` is caller controlled and only used when the
/// kernel cannot report the executable.
fn resolve_program(current: io::Result<PathBuf>, argv0: Option<&OsString>) -> Option<PathBuf> {
    current.ok().or_else(|| {
        argv0
            .map(PathBuf::from)
            .and_then(|path| path.canonicalize().ok())
    })
}

/// `sudo -u <user> -n -- <program> <args...>`. `-n` makes sudo fail instead
/// of asking for a password.
fn sudo_argv(
    user: &str,
    program: OsString,
    args: impl IntoIterator<Item = OsString>,
) -> Result<Vec<CString>, String> {
    [SUDO, "-u", user, "-n", "--"]
        .into_iter()
        .map(OsString::from)
        .chain(std::iter::once(program))
        .chain(args)
        .map(|arg| CString::new(arg.into_vec()).map_err(|err| err.to_string()))
        .collect()
}

impl Privileges for SudoPrivileges {
    fn is_user(&self, user: &str) -> Result<bool, IdentityError> {
        Ok(geteuid() == Self::uid_of(user)?)
    }

    fn become_user(&self, user: &str) -> Result<String, IdentityError> {
        if geteuid() != Self::uid_of(user)? {
            return self.exec_as(user);
        }
        let invoker = std::env::var(SUDO_USER_VAR).ok();
        validate_sudo_user(invoker.as_deref())
    }
}
