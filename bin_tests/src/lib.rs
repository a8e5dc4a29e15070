// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod test_types;

use std::{collections::HashMap, env, ops::DerefMut, path::PathBuf, process, sync::Mutex};

use once_cell::sync::OnceCell;

pub use test_types::CrashMode;

/// This crate implements an abstraction over compilation with cargo with the purpose
/// of testing full binaries, instead of just rust static libraries.
///
/// The main entrypoint is `fn build_artifacts` which takes a list of artifacts to build,
/// invokes cargo and return the path of the built artifact.
///
/// Builds are cached between invocations so that multiple tests can use the same artifact
/// without doing expensive work twice.
///
/// It is assumed that functions in this crate are invoked in the context of a cargo #[test]
/// item, or a `cargo run` command to be able to locate artifacts built by cargo from the position
/// of the current binary.

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BuildProfile {
    Debug,
    Release,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ArtifactsBuild {
    /// Name of a `[[bin]]` target of this workspace.
    pub name: String,
    pub build_profile: BuildProfile,
}

impl ArtifactsBuild {
    pub fn crashing_test_app(build_profile: BuildProfile) -> Self {
        Self {
            name: "crashing_test_app".to_owned(),
            build_profile,
        }
    }
}

fn inner_build_artifact(c: &ArtifactsBuild) -> anyhow::Result<PathBuf> {
    let mut build_cmd = process::Command::new(env!("CARGO"));
    build_cmd.arg("build");
    if let BuildProfile::Release = c.build_profile {
        build_cmd.arg("--release");
    }
    build_cmd.arg("--bin").arg(&c.name);

    let output = build_cmd.output()?;
    if !output.status.success() {
        anyhow::bail!(
            "Cargo build failed: status code {:?}\nstderr:\n {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// This static variable contains the path in which cargo puts it's build artifacts
    /// This relies on the assumption that the current binary is assumed to not have been moved from
    /// it's directory
    static ARTIFACT_DIR: OnceCell<PathBuf> = OnceCell::new();
    let artifact_dir = ARTIFACT_DIR.get_or_try_init(|| {
        let test_bin_location = env::current_exe()?;
        let mut location_components = test_bin_location.components().rev().peekable();
        loop {
            let Some(c) = location_components.peek() else {
                break;
            };
            if c.as_os_str() == "target" {
                break;
            }
            location_components.next();
        }
        anyhow::Ok(location_components.rev().collect::<PathBuf>())
    })?;

    let mut artifact_path = artifact_dir.clone();
    artifact_path.push(match c.build_profile {
        BuildProfile::Debug => "debug",
        BuildProfile::Release => "release",
    });
    artifact_path.push(&c.name);
    Ok(artifact_path)
}

/// Caches and returns the path of the artifacts built by cargo
/// This function should only be called from cargo tests
pub fn build_artifacts<'b>(
    crates: &[&'b ArtifactsBuild],
) -> anyhow::Result<HashMap<&'b ArtifactsBuild, PathBuf>> {
    static ARTIFACTS: OnceCell<Mutex<HashMap<ArtifactsBuild, PathBuf>>> = OnceCell::new();

    let mut res = HashMap::new();

    let artifacts = ARTIFACTS.get_or_init(|| Mutex::new(HashMap::new()));
    for &c in crates {
        let mut artifacts = artifacts
            .lock()
            .map_err(|_| anyhow::anyhow!("artifact cache poisoned"))?;
        let artifacts = artifacts.deref_mut();

        if let Some(path) = artifacts.get(c) {
            res.insert(c, path.clone());
        } else {
            let p = inner_build_artifact(c)?;
            res.insert(c, p.clone());
            artifacts.insert(c.clone(), p);
        }
    }

    Ok(res)
}

/// What a crashed run of `crashing_test_app` left behind.
#[derive(Debug)]
pub struct CrashOutput {
    pub status: process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CrashOutput {
    pub fn stderr_lines(&self) -> Vec<&str> {
        self.stderr.lines().collect()
    }
}

/// Builds `crashing_test_app` if needed and runs it in `mode`, capturing its output.
pub fn run_crashing_app(mode: CrashMode, build_profile: BuildProfile) -> anyhow::Result<CrashOutput> {
    let app = ArtifactsBuild::crashing_test_app(build_profile);
    let artifacts = build_artifacts(&[&app])?;
    let output = process::Command::new(&artifacts[&app])
        .arg(mode.as_str())
        .output()?;
    Ok(CrashOutput {
        status: output.status,
        stdout: String::from_utf8(output.stdout)?,
        stderr: String::from_utf8(output.stderr)?,
    })
}

#[macro_export]
macro_rules! timeit {
    ($op_name:literal, $op:block) => {{
        let start = std::time::Instant::now();
        let res = $op;
        let delta = start.elapsed();
        println!(
            concat!($op_name, " took {} ms"),
            delta.as_secs_f64() * 1000.0
        );
        res
    }};
}
