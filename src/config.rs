//! Parses config file
use std::{
    env,
    fs::OpenOptions,
    io::Read,
    path::{Path, PathBuf},
};

use animation::ShapeInstance;
use eyre::eyre;
use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Camera distance used when picking a shape's detail level.
    pub detail_distance: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport_width: 800,
            viewport_height: 600,
            detail_distance: 20.,
        }
    }
}

impl Config {
    /// Selects the detail level `instance` shows at the configured distance and viewport.
    pub fn apply_detail(&self, instance: &mut ShapeInstance) -> Option<usize> {
        instance.select_detail(
            self.detail_distance,
            self.viewport_width,
            self.viewport_height,
        )
    }
}

pub static CONFIG_FILE_NAME: &str = "darkstar.toml";

/// Parse `darkstar.toml` in the same folder as the binary
pub fn parse_config() -> eyre::Result<Config> {
    let path = env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    parse_config_from_file(path.as_path())
}

pub fn parse_config_from_file(path: &Path) -> eyre::Result<Config> {
    let mut file = OpenOptions::new().read(true).open(path.as_os_str())?;
    let mut buffer = String::new();

    file.read_to_string(&mut buffer)?;

    debug!("read config from {}", path.display());

    parse_config_from_str(&buffer)
}

pub fn parse_config_from_str(s: &str) -> eyre::Result<Config> {
    let config: Config = toml::from_str(s)?;

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(eyre!(
            "Viewport {}x{} is empty",
            config.viewport_width,
            config.viewport_height
        ));
    }

    if !config.detail_distance.is_finite() {
        return Err(eyre!("Detail distance must be finite"));
    }

    Ok(config)
}

#[cfg(test)]
mod test {
    use glam::{Quat, Vec3};
    use shape::{Detail, Node, NodeHierarchy, Quat16, Shape, Transform};

    use super::*;

    fn two_detail_shape() -> Shape {
        let nodes = vec![Node {
            name: -1,
            parent: -1,
            num_subsequences: 0,
            first_subsequence: 0,
            default_transform: 0,
        }];
        let hierarchy = NodeHierarchy::build(&nodes).unwrap();

        Shape {
            version: 8,
            radius: 10.,
            center: Vec3::ZERO,
            bounds_min: Vec3::splat(-10.),
            bounds_max: Vec3::splat(10.),
            nodes,
            sequences: vec![],
            subsequences: vec![],
            keyframes: vec![],
            transforms: vec![Transform {
                rotation: Quat16::from_quat(Quat::IDENTITY),
                translation: Vec3::ZERO,
            }],
            names: vec![],
            objects: vec![],
            details: vec![
                Detail {
                    root_node: 0,
                    size: 0.,
                },
                Detail {
                    root_node: 0,
                    size: 100.,
                },
            ],
            transitions: vec![],
            frame_triggers: vec![],
            default_materials: 0,
            always_node: -1,
            meshes: vec![],
            materials: None,
            hierarchy,
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(parse_config_from_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial() {
        let config = parse_config_from_str("detail_distance = 5000.0").unwrap();

        assert_eq!(config.viewport_width, 800);
        assert_eq!(config.viewport_height, 600);
        assert_eq!(config.detail_distance, 5000.);
    }

    #[test]
    fn full() {
        let config = parse_config_from_str(
            "viewport_width = 1920\nviewport_height = 1080\ndetail_distance = 3.5\n",
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                viewport_width: 1920,
                viewport_height: 1080,
                detail_distance: 3.5,
            }
        );
    }

    #[test]
    fn empty_viewport() {
        assert!(parse_config_from_str("viewport_height = 0").is_err());
    }

    #[test]
    fn wrong_type() {
        assert!(parse_config_from_str("viewport_width = \"wide\"").is_err());
    }

    #[test]
    fn missing_file() {
        assert!(parse_config_from_file(Path::new("/nonexistent/darkstar.toml")).is_err());
    }

    #[test]
    fn detail_follows_distance() {
        let shape = two_detail_shape();
        let mut instance = ShapeInstance::new(&shape).unwrap();

        let near = Config::default();
        assert_eq!(near.apply_detail(&mut instance), Some(1));
        assert_eq!(instance.current_detail(), Some(1));

        let far = Config {
            detail_distance: 10000.,
            ..Config::default()
        };
        assert_eq!(far.apply_detail(&mut instance), Some(0));
    }
}
