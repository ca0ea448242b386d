#![forbid(unsafe_code)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, TcoreError};
use crate::manifest::{TargetDescriptor, normalize_source};
use crate::shell::{CommandRunner, ShellCommand, quote};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BuildType {
    #[default]
    None,
    Debug,
    Release,
    #[value(name = "min_size")]
    MinSize,
}

impl BuildType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Debug => "debug",
            Self::Release => "release",
            Self::MinSize => "min_size",
        }
    }

    /// Value for `CMAKE_BUILD_TYPE`; `None` leaves it unset.
    pub fn cmake_build_type(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Debug => Some("Debug"),
            Self::Release => Some("Release"),
            Self::MinSize => Some("MinSizeRel"),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved inputs of one out-of-tree build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub source_dir: PathBuf,
    pub target_name: String,
    pub build_dir: PathBuf,
    pub build_type: BuildType,
    pub toolchain_file: Option<PathBuf>,
    pub config_file: PathBuf,
    pub clean: bool,
}

/// `<source>/build/<target>[-<build type>]`, unless overridden.
pub fn build_dir(
    source_dir: &Path,
    target_name: &str,
    build_type: BuildType,
    override_dir: Option<&Path>,
) -> PathBuf {
    if let Some(dir) = override_dir {
        return normalize_source(dir);
    }

    let dir_name = match build_type {
        BuildType::None => target_name.to_string(),
        other => format!("{target_name}-{other}"),
    };
    source_dir.join("build").join(dir_name)
}

pub fn plan(
    config: &Config,
    source_dir: &Path,
    target: &TargetDescriptor,
    override_dir: Option<&Path>,
    build_type: BuildType,
    clean: bool,
) -> Result<BuildPlan> {
    let build_dir = build_dir(source_dir, &target.name, build_type, override_dir);

    let toolchain_file = if target.is_host_build() {
        info!(target = %target.name, "host build, no toolchain required");
        None
    } else {
        Some(resolve_toolchain(config, source_dir, target)?)
    };

    let config_file = source_dir.join(&target.config);
    if !config_file.is_file() {
        return Err(TcoreError::ConfigFileNotFound { path: config_file });
    }

    Ok(BuildPlan {
        source_dir: source_dir.to_path_buf(),
        target_name: target.name.clone(),
        build_dir,
        build_type,
        toolchain_file,
        config_file,
        clean,
    })
}

/// Project-local toolchain files take precedence over the shared ones shipped
/// with theCore.
fn resolve_toolchain(
    config: &Config,
    source_dir: &Path,
    target: &TargetDescriptor,
) -> Result<PathBuf> {
    let Some(toolchain) = target.toolchain.as_deref() else {
        return Err(TcoreError::ToolchainNotFound {
            path: config.toolchain_dir.clone(),
        });
    };

    let local = source_dir.join(toolchain);
    if local.is_file() {
        info!(path = %local.display(), "using project toolchain");
        return Ok(local);
    }

    let shared = config.toolchain_dir.join(toolchain);
    if shared.is_file() {
        info!(path = %shared.display(), "using theCore toolchain");
        return Ok(shared);
    }

    Err(TcoreError::ToolchainNotFound { path: shared })
}

/// Argument vector of the CMake invocation, in invocation order.
pub fn generator_args(plan: &BuildPlan, config: &Config) -> Vec<String> {
    let mut args = vec![
        "cmake".to_string(),
        format!("-DCORE_DIR={}", config.core_src_dir.display()),
    ];
    if let Some(build_type) = plan.build_type.cmake_build_type() {
        args.push(format!("-DCMAKE_BUILD_TYPE={build_type}"));
    }
    if let Some(toolchain) = &plan.toolchain_file {
        args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()));
    }
    args.push(format!(
        "-DTHECORE_TARGET_CONFIG_FILE={}",
        plan.config_file.display()
    ));
    args.push(format!(
        "-DTHECORE_THIRDPARTY_DIR={}",
        config.thirdparty_dir.display()
    ));
    args.push(plan.source_dir.display().to_string());
    args
}

/// Generator then driver, both inside the Nix shell and the build directory.
pub fn commands(plan: &BuildPlan, config: &Config) -> Result<Vec<ShellCommand>> {
    let generator = generator_args(plan, config)
        .iter()
        .map(|arg| quote(arg))
        .collect::<Result<Vec<_>>>()?
        .join(" ");

    Ok(vec![
        ShellCommand::shell(generator).in_dir(&plan.build_dir),
        ShellCommand::shell("make").in_dir(&plan.build_dir),
    ])
}

pub fn execute(plan: &BuildPlan, config: &Config, runner: &dyn CommandRunner) -> Result<()> {
    let build_dir = &plan.build_dir;

    if plan.clean {
        info!(path = %build_dir.display(), "performing cleanup before build");
        if build_dir.is_dir() {
            fs::remove_dir_all(build_dir).map_err(|err| TcoreError::io(build_dir, err))?;
        } else {
            info!("nothing to clean");
        }
    }

    fs::create_dir_all(build_dir).map_err(|err| TcoreError::io(build_dir, err))?;

    for command in commands(plan, config)? {
        runner.run(&command)?;
    }

    info!(target = %plan.target_name, build_dir = %build_dir.display(), "build complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Activation, RecordingShell};
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _temp: TempDir,
        config: Config,
        source: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().expect("temp dir");
        let config = Config::with_install_dir(temp.path().join(".theCore"));
        let source = temp.path().join("project");
        fs::create_dir_all(&source).expect("create project");
        fs::write(source.join("cfg.json"), "{}").expect("write config");
        Fixture {
            _temp: temp,
            config,
            source,
        }
    }

    fn nucleo() -> TargetDescriptor {
        TargetDescriptor {
            name: "nucleo".to_string(),
            config: "cfg.json".to_string(),
            toolchain: Some("arm.cmake".to_string()),
            description: "STM32".to_string(),
            host: None,
        }
    }

    #[test]
    fn build_dir_suffix_follows_build_type() {
        let source = Path::new("/work/demo");
        assert_eq!(
            build_dir(source, "nucleo", BuildType::None, None),
            PathBuf::from("/work/demo/build/nucleo")
        );
        for (build_type, expected) in [
            (BuildType::Debug, "nucleo-debug"),
            (BuildType::Release, "nucleo-release"),
            (BuildType::MinSize, "nucleo-min_size"),
        ] {
            assert_eq!(
                build_dir(source, "nucleo", build_type, None),
                source.join("build").join(expected)
            );
        }
        assert_eq!(
            build_dir(source, "nucleo", BuildType::Debug, None),
            build_dir(source, "nucleo", BuildType::Debug, None)
        );
    }

    #[test]
    fn explicit_build_dir_wins() {
        assert_eq!(
            build_dir(
                Path::new("/work/demo"),
                "nucleo",
                BuildType::Release,
                Some(Path::new("/tmp/out"))
            ),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn project_toolchain_is_preferred() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write local toolchain");
        fs::create_dir_all(&fx.config.toolchain_dir).expect("create toolchain dir");
        fs::write(fx.config.toolchain_dir.join("arm.cmake"), "").expect("write shared toolchain");

        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::Debug, false)
            .expect("plan");

        assert_eq!(plan.build_dir, fx.source.join("build").join("nucleo-debug"));
        assert_eq!(plan.toolchain_file, Some(fx.source.join("arm.cmake")));
        assert_eq!(plan.config_file, fx.source.join("cfg.json"));

        let args = generator_args(&plan, &fx.config);
        assert_eq!(args[0], "cmake");
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
        assert!(args.contains(&format!(
            "-DCMAKE_TOOLCHAIN_FILE={}",
            fx.source.join("arm.cmake").display()
        )));
        assert_eq!(args.last(), Some(&fx.source.display().to_string()));
    }

    #[test]
    fn shared_toolchain_is_the_fallback() {
        let fx = fixture();
        fs::create_dir_all(&fx.config.toolchain_dir).expect("create toolchain dir");
        fs::write(fx.config.toolchain_dir.join("arm.cmake"), "").expect("write shared toolchain");

        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::None, false)
            .expect("plan");
        assert_eq!(
            plan.toolchain_file,
            Some(fx.config.toolchain_dir.join("arm.cmake"))
        );
        assert!(
            !generator_args(&plan, &fx.config)
                .iter()
                .any(|arg| arg.starts_with("-DCMAKE_BUILD_TYPE"))
        );
    }

    #[test]
    fn missing_toolchain_stops_planning() {
        let fx = fixture();
        let err = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::None, false)
            .expect_err("toolchain missing");
        assert!(matches!(err, TcoreError::ToolchainNotFound { .. }));
    }

    #[test]
    fn missing_config_stops_planning() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write toolchain");
        let mut target = nucleo();
        target.config = "absent.json".to_string();

        let err = plan(&fx.config, &fx.source, &target, None, BuildType::None, false)
            .expect_err("config missing");
        assert!(
            matches!(err, TcoreError::ConfigFileNotFound { ref path } if path.ends_with("absent.json"))
        );
    }

    #[test]
    fn host_build_skips_toolchain() {
        let fx = fixture();
        let mut target = nucleo();
        target.toolchain = None;
        target.host = Some(false);

        let plan = plan(&fx.config, &fx.source, &target, None, BuildType::Release, false)
            .expect("plan");
        assert_eq!(plan.toolchain_file, None);
        let args = generator_args(&plan, &fx.config);
        assert!(!args.iter().any(|arg| arg.starts_with("-DCMAKE_TOOLCHAIN_FILE")));
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
    }

    #[test]
    fn execute_runs_generator_then_driver_in_build_dir() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write toolchain");
        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::MinSize, false)
            .expect("plan");
        let runner = RecordingShell::new();

        execute(&plan, &fx.config, &runner).expect("execute");

        assert!(plan.build_dir.is_dir());
        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].script.starts_with("cmake "));
        assert!(commands[0].script.contains("-DCMAKE_BUILD_TYPE=MinSizeRel"));
        assert_eq!(commands[1].script, "make");
        for command in &commands {
            assert_eq!(command.activation, Activation::Shell);
            assert_eq!(command.cwd.as_deref(), Some(plan.build_dir.as_path()));
        }
    }

    #[test]
    fn clean_of_missing_build_dir_is_a_no_op() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write toolchain");
        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::None, true)
            .expect("plan");
        assert!(!plan.build_dir.exists());

        execute(&plan, &fx.config, &RecordingShell::new()).expect("execute");
        assert!(plan.build_dir.is_dir());
    }

    #[test]
    fn clean_removes_previous_artifacts() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write toolchain");
        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::None, true)
            .expect("plan");
        fs::create_dir_all(&plan.build_dir).expect("create build dir");
        let artifact = plan.build_dir.join("CMakeCache.txt");
        fs::write(&artifact, "cache").expect("write artifact");

        execute(&plan, &fx.config, &RecordingShell::new()).expect("execute");
        assert!(!artifact.exists());
    }

    #[test]
    fn generator_failure_skips_driver() {
        let fx = fixture();
        fs::write(fx.source.join("arm.cmake"), "").expect("write toolchain");
        let plan = plan(&fx.config, &fx.source, &nucleo(), None, BuildType::None, false)
            .expect("plan");
        let runner = RecordingShell::failing_on("cmake");

        let err = execute(&plan, &fx.config, &runner).expect_err("generator fails");
        assert!(matches!(err, TcoreError::ExecutionFailed { .. }));
        assert_eq!(runner.commands().len(), 1);
    }
}
