//! Image visibility rules shared by the launch wizard.

use nimbus_types::Resource;

/// Container formats that hold kernel and ramdisk images, never launchable on their own.
const EXCLUDED_CONTAINER_FORMATS: [&str; 2] = ["aki", "ari"];

/// Whether the image is an instance snapshot rather than a base image.
pub fn is_instance_snapshot(image: &Resource) -> bool {
    image
        .attribute("properties")
        .and_then(|properties| properties.get("image_type"))
        .and_then(|value| value.as_str())
        .or_else(|| image.attribute_str("image_type"))
        == Some("snapshot")
}

/// Images a project may launch from: active, public or owned by the project,
/// and not a kernel or ramdisk image. Listing order is preserved.
pub fn available_images<'a>(images: &'a [Resource], project_id: Option<&str>) -> Vec<&'a Resource> {
    images
        .iter()
        .filter(|image| image.attribute_str("status") == Some("active"))
        .filter(|image| {
            let is_public = image.attribute_bool("is_public").unwrap_or(false);
            let is_owned = project_id.is_some_and(|project| image.attribute_str("owner") == Some(project));
            is_public || is_owned
        })
        .filter(|image| {
            image
                .attribute_str("container_format")
                .is_none_or(|format| !EXCLUDED_CONTAINER_FORMATS.contains(&format))
        })
        .collect()
}
