//! Environment probing for engine availability.
//!
//! The native engine needs a GPU context, which in turn needs a display (or
//! a headless EGL setup this workspace does not manage). Probing happens
//! once, when a renderer is constructed; the result is a mode switch for the
//! whole session, not a per-call check.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: &'static str,
    pub has_display: bool,
}

impl PlatformInfo {
    /// Inspects the current process environment.
    pub fn probe() -> Self {
        let os = env::consts::OS;
        let has_display = match os {
            // Wayland or X11 session, either is enough for a GL context.
            "linux" => env_set("WAYLAND_DISPLAY") || env_set("DISPLAY"),
            "macos" | "windows" => true,
            _ => false,
        };
        Self { os, has_display }
    }

    pub fn headless(&self) -> bool {
        !self.has_display
    }

    /// Classifies whether an engine could run here at all.
    pub fn engine_availability(&self) -> EngineAvailability {
        if self.has_display {
            EngineAvailability::Available
        } else {
            EngineAvailability::Unavailable {
                reason: format!("no display detected on {} (headless session)", self.os),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAvailability {
    Available,
    Unavailable { reason: String },
}

fn env_set(name: &str) -> bool {
    env::var_os(name).map_or(false, |value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_platforms_report_unavailable() {
        let info = PlatformInfo {
            os: "linux",
            has_display: false,
        };
        assert!(info.headless());
        assert!(matches!(
            info.engine_availability(),
            EngineAvailability::Unavailable { .. }
        ));
    }

    #[test]
    fn display_platforms_report_available() {
        let info = PlatformInfo {
            os: "macos",
            has_display: true,
        };
        assert_eq!(info.engine_availability(), EngineAvailability::Available);
    }
}
