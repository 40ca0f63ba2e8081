use std::fs;
use std::path::PathBuf;

use crate::capture::dependencies::ProcessProbe;
use crate::capture::types::CaptureTarget;
use crate::config::CaptureConfig;

/// Process capability checks driven by config lists and `/proc/<pid>/maps`.
pub struct ConfiguredProcessProbe {
    direct_copy_denied: Vec<String>,
    compositor_denied: Vec<String>,
    compositor_preferred: Vec<String>,
    incompatible_modules: Vec<String>,
    proc_root: PathBuf,
}

impl ConfiguredProcessProbe {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            direct_copy_denied: lowercase(&config.direct_copy_denied),
            compositor_denied: lowercase(&config.compositor_denied),
            compositor_preferred: lowercase(&config.compositor_preferred),
            incompatible_modules: config.incompatible_modules.clone(),
            proc_root: PathBuf::from("/proc"),
        }
    }

    #[cfg(test)]
    fn with_proc_root(mut self, root: PathBuf) -> Self {
        self.proc_root = root;
        self
    }

    fn listed(list: &[String], target: &CaptureTarget) -> bool {
        let name = target.process_name.to_lowercase();
        list.iter().any(|entry| *entry == name)
    }
}

fn lowercase(names: &[String]) -> Vec<String> {
    names.iter().map(|name| name.to_lowercase()).collect()
}

impl ProcessProbe for ConfiguredProcessProbe {
    fn direct_copy_permitted(&self, target: &CaptureTarget) -> bool {
        !Self::listed(&self.direct_copy_denied, target)
            && !Self::listed(&self.compositor_preferred, target)
    }

    fn compositor_permitted(&self, target: &CaptureTarget) -> bool {
        Self::listed(&self.compositor_preferred, target)
            || !Self::listed(&self.compositor_denied, target)
    }

    fn uses_incompatible_framework(&self, target: &CaptureTarget) -> bool {
        if target.pid == 0 || self.incompatible_modules.is_empty() {
            return false;
        }

        let maps_path = self.proc_root.join(target.pid.to_string()).join("maps");
        let maps = match fs::read_to_string(&maps_path) {
            Ok(maps) => maps,
            Err(e) => {
                log::debug!("Cannot inspect {}: {}", maps_path.display(), e);
                return false;
            }
        };

        let found = maps.lines().find_map(|line| {
            let library = line.split_whitespace().nth(5)?;
            self.incompatible_modules
                .iter()
                .find(|module| library.contains(module.as_str()))
        });

        if let Some(module) = found {
            log::debug!("{} has {} loaded", target, module);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::WindowHandle;
    use crate::util::Rect;
    use tempfile::TempDir;

    fn target(name: &str, pid: u32) -> CaptureTarget {
        CaptureTarget {
            handle: WindowHandle("0x1".into()),
            bounds: Rect::new(0, 0, 10, 10).unwrap(),
            pid,
            process_name: name.into(),
            title: String::new(),
            is_minimized: false,
            is_modern_app: false,
            is_top_level: true,
            is_browser: false,
        }
    }

    #[test]
    fn denied_and_compositor_preferred_processes_skip_direct_copy() {
        let config = CaptureConfig {
            direct_copy_denied: vec!["Keepass".into()],
            compositor_preferred: vec!["obs".into()],
            ..CaptureConfig::default()
        };
        let probe = ConfiguredProcessProbe::from_config(&config);

        assert!(!probe.direct_copy_permitted(&target("keepass", 1)));
        assert!(!probe.direct_copy_permitted(&target("obs", 1)));
        assert!(probe.direct_copy_permitted(&target("kitty", 1)));
    }

    #[test]
    fn compositor_denied_processes_are_kept_off_the_compositor() {
        let config = CaptureConfig {
            compositor_denied: vec!["Steam".into(), "obs".into()],
            compositor_preferred: vec!["obs".into()],
            ..CaptureConfig::default()
        };
        let probe = ConfiguredProcessProbe::from_config(&config);

        assert!(!probe.compositor_permitted(&target("steam", 1)));
        assert!(probe.compositor_permitted(&target("kitty", 1)));
        // Preferred wins over denied.
        assert!(probe.compositor_permitted(&target("obs", 1)));
    }

    #[test]
    fn compositor_lists_steer_the_auto_plan() {
        use crate::capture::selector::{PlatformFacts, plan_backends};
        use crate::capture::types::BackendKind;
        use crate::config::WindowCaptureMode;

        let config = CaptureConfig {
            compositor_denied: vec!["steam".into()],
            compositor_preferred: vec!["obs".into()],
            ..CaptureConfig::default()
        };
        let probe = ConfiguredProcessProbe::from_config(&config);
        let facts = |target: &CaptureTarget| PlatformFacts {
            compositing_enabled: true,
            direct_copy_permitted: probe.direct_copy_permitted(target),
            compositor_permitted: probe.compositor_permitted(target),
            incompatible_framework: false,
            compositor_available: true,
            direct_copy_available: true,
        };

        let steam = target("steam", 1);
        assert_eq!(
            plan_backends(WindowCaptureMode::Auto, &steam, &facts(&steam)),
            vec![BackendKind::DirectCopy, BackendKind::ScreenFallback]
        );

        let obs = target("obs", 1);
        assert_eq!(
            plan_backends(WindowCaptureMode::Auto, &obs, &facts(&obs)),
            vec![BackendKind::Compositor, BackendKind::ScreenFallback]
        );
    }

    #[test]
    fn detects_framework_from_maps() {
        let root = TempDir::new().unwrap();
        let proc_dir = root.path().join("77");
        fs::create_dir_all(&proc_dir).unwrap();
        fs::write(
            proc_dir.join("maps"),
            "7f00-7f10 r-xp 00000000 08:01 1234 /usr/lib/libc.so.6\n\
             7f20-7f30 r-xp 00000000 08:01 5678 /usr/lib/libQt6Quick.so.6\n",
        )
        .unwrap();

        let probe = ConfiguredProcessProbe::from_config(&CaptureConfig::default())
            .with_proc_root(root.path().to_path_buf());
        assert!(probe.uses_incompatible_framework(&target("app", 77)));
        assert!(!probe.uses_incompatible_framework(&target("app", 78)));
    }
}
