// TOML configuration with per-key defaults and validation

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub render: RenderConfig,
    pub parsing: ParsingConfig,
    pub syslog: SyslogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub title: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("endurance-report"),
            title: "Endurance report".into(),
        }
    }
}

/// Which terminal the generated render scripts select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Anti-aliased output through the cairo terminal.
    #[default]
    Cairo,
    /// Plain libgd terminal, for hosts where cairo is unstable.
    Gd,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of rendering workers, fixed for the run.
    pub workers: usize,
    pub backend: Backend,
    pub renderer: String,
    /// Arguments placed before the command file.
    pub renderer_args: Vec<String>,
    pub thumbnailer: String,
    /// Arguments placed before the source image.
    pub thumbnailer_args: Vec<String>,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub plot_height: u32,
    pub job_timeout_secs: u64,
    /// Keep `<key>.gp` files after rendering (debugging aid).
    pub keep_command_files: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            backend: Backend::default(),
            renderer: "gnuplot".into(),
            renderer_args: Vec::new(),
            thumbnailer: "convert".into(),
            thumbnailer_args: Vec::new(),
            thumbnail_width: 320,
            thumbnail_height: 250,
            plot_height: 600,
            job_timeout_secs: 120,
            keep_command_files: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Plot every process instead of only the interesting ones.
    pub show_all_processes: bool,
    pub max_processes_per_graph: usize,
    /// Helper used for `.lzo` files, run as `<helper> -dc <file>`.
    pub lzo_helper: String,
    /// Helper used for `.xz` files, run as `<helper> <file>`.
    pub xz_helper: String,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            show_all_processes: false,
            max_processes_per_graph: 12,
            lzo_helper: "lzop".into(),
            xz_helper: "xzcat".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyslogCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// Matched in order; the first category with a matching pattern counts the line.
    pub categories: Vec<SyslogCategory>,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        let category = |name: &str, description: &str, patterns: &[&str]| SyslogCategory {
            name: name.into(),
            description: description.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };
        Self {
            categories: vec![
                category(
                    "kernel/oops",
                    "Kernel oopses and BUGs",
                    &[r"Oops:", r"\bBUG:", r"kernel BUG at"],
                ),
                category(
                    "kernel/oom",
                    "Processes killed by the OOM killer",
                    &[r"Out of memory: [Kk]ill", r"invoked oom-killer"],
                ),
                category(
                    "process/crash",
                    "Crashed processes",
                    &[r"segfault at", r"terminated by signal", r"core dumped"],
                ),
                category(
                    "system/watchdog",
                    "Watchdog and restart events",
                    &[r"[Ww]atchdog", r"restarting"],
                ),
            ],
        }
    }
}

impl AppConfig {
    /// Load from `path`, else from the `CONFIG_FILE` env var, else use defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os("CONFIG_FILE").map(PathBuf::from),
        };
        match path {
            Some(p) => {
                let s = std::fs::read_to_string(&p)
                    .map_err(|e| anyhow::anyhow!("reading config {}: {}", p.display(), e))?;
                Self::load_from_str(&s)
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.output.directory.as_os_str().is_empty(),
            "output.directory must be non-empty"
        );
        anyhow::ensure!(
            self.render.workers > 0,
            "render.workers must be > 0, got {}",
            self.render.workers
        );
        anyhow::ensure!(
            !self.render.renderer.is_empty(),
            "render.renderer must be non-empty"
        );
        anyhow::ensure!(
            !self.render.thumbnailer.is_empty(),
            "render.thumbnailer must be non-empty"
        );
        anyhow::ensure!(
            self.render.thumbnail_width > 0,
            "render.thumbnail_width must be > 0, got {}",
            self.render.thumbnail_width
        );
        anyhow::ensure!(
            self.render.thumbnail_height > 0,
            "render.thumbnail_height must be > 0, got {}",
            self.render.thumbnail_height
        );
        anyhow::ensure!(
            self.render.plot_height > 0,
            "render.plot_height must be > 0, got {}",
            self.render.plot_height
        );
        anyhow::ensure!(
            self.render.job_timeout_secs > 0,
            "render.job_timeout_secs must be > 0, got {}",
            self.render.job_timeout_secs
        );
        anyhow::ensure!(
            self.parsing.max_processes_per_graph > 0,
            "parsing.max_processes_per_graph must be > 0, got {}",
            self.parsing.max_processes_per_graph
        );
        anyhow::ensure!(
            !self.parsing.lzo_helper.is_empty(),
            "parsing.lzo_helper must be non-empty"
        );
        anyhow::ensure!(
            !self.parsing.xz_helper.is_empty(),
            "parsing.xz_helper must be non-empty"
        );
        for (i, category) in self.syslog.categories.iter().enumerate() {
            anyhow::ensure!(
                !category.name.is_empty(),
                "syslog.categories[{}].name must be non-empty",
                i
            );
            anyhow::ensure!(
                self.syslog.categories[..i]
                    .iter()
                    .all(|c| c.name != category.name),
                "syslog.categories[{}].name '{}' is already defined",
                i,
                category.name
            );
            for pattern in &category.patterns {
                if let Err(e) = regex::Regex::new(pattern) {
                    anyhow::bail!(
                        "syslog.categories[{}].patterns has invalid regex '{}': {}",
                        i,
                        pattern,
                        e
                    );
                }
            }
        }
        Ok(())
    }
}
