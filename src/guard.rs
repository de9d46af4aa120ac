use std::path::Path;

/// True when the output path already exists on disk.
///
/// The path is checked exactly as templated: the title placeholder is not
/// resolved first, so this only fires when a file literally named after the
/// template is present.
pub fn should_skip(output_template: &Path) -> bool {
    output_template.is_file()
}
