//! Loading of external files.
//!
//! Every path is resolved relative to `./assets`. The build script copies that
//! directory next to the build output.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::data_structures::texture::{Texture, TextureOptions};

pub mod mesh;

pub use mesh::{ObjMesh, load_obj_mesh};

fn asset_path(file_name: impl AsRef<Path>) -> PathBuf {
    Path::new("./").join("assets").join(file_name)
}

pub fn load_string(file_name: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = asset_path(file_name);
    std::fs::read_to_string(&path).with_context(|| format!("Could not read {}", path.display()))
}

pub fn load_binary(file_name: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(file_name);
    std::fs::read(&path).with_context(|| format!("Could not read {}", path.display()))
}

/// Decodes an image file. The file extension, if any, selects the decoder.
pub fn load_texture(
    file_name: impl AsRef<Path>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    options: TextureOptions,
) -> anyhow::Result<Texture> {
    let file_name = file_name.as_ref();
    let data = load_binary(file_name)?;
    let label = file_name.to_string_lossy();
    let format = file_name.extension().and_then(|ext| ext.to_str());
    Texture::from_bytes(device, queue, &data, &label, format, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assets_are_resolved_below_the_asset_directory() {
        assert_eq!(
            asset_path("textures/brick.png"),
            Path::new("./assets/textures/brick.png")
        );
    }

    #[test]
    fn missing_files_report_their_path() {
        let err = load_binary("definitely/not/here.png").unwrap_err();
        assert!(format!("{err:#}").contains("definitely/not/here.png"));
    }
}
