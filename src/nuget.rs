use std::{
    env,
    ffi::OsStr,
    fs,
    io::Write,
    path::{self, Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use log::{debug, warn};

pub const PACKAGES_DIR_NAME: &str = "NuGet Packages";

pub trait PackagingTool {
    fn update_self(&self, out: &mut dyn Write) -> Result<()>;
    fn pack(&self, nuspec: &Path, out: &mut dyn Write) -> Result<()>;
}

/// Runs the NuGet command line inside a fixed packages directory.
#[derive(Debug)]
pub struct NuGet {
    executable: PathBuf,
    working_dir: PathBuf,
}

impl NuGet {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Creates the working directory on first use.
    fn run(&self, args: &[&OsStr], out: &mut dyn Write) -> Result<()> {
        fs::create_dir_all(&self.working_dir).with_context(|| format!("failed to create {:?}", self.working_dir))?;

        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!("running {:?} in {:?}", command, self.working_dir);
        let output = command
            .output()
            .with_context(|| format!("failed to run {:?}", self.executable))?;

        writeln!(out, "{}", String::from_utf8_lossy(&output.stdout))?;

        if !output.status.success() {
            warn!("{:?} exited with {}", self.executable, output.status);
        }

        Ok(())
    }
}

impl PackagingTool for NuGet {
    fn update_self(&self, out: &mut dyn Write) -> Result<()> {
        self.run(&[OsStr::new("update"), OsStr::new("-self")], out)
    }

    /// NuGet runs elsewhere, so a relative manifest path is resolved against ours first.
    fn pack(&self, nuspec: &Path, out: &mut dyn Write) -> Result<()> {
        let nuspec = path::absolute(nuspec).with_context(|| format!("failed to resolve {:?}", nuspec))?;
        self.run(&[OsStr::new("pack"), nuspec.as_os_str()], out)
    }
}

/// `NuGet Packages` next to the running executable.
pub fn default_packages_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("failed to locate the running executable")?;
    let dir = exe
        .parent()
        .with_context(|| format!("{:?} has no parent directory", exe))?;

    Ok(dir.join(PACKAGES_DIR_NAME))
}
