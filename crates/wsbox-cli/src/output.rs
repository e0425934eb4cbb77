//! Human-readable rendering of client results.

/// Render a listing as a one-level tree headed by `dir`. The root directory
/// is shown as `root/`.
pub fn render_tree(names: &[String], dir: &str) -> String {
    let heading = match dir {
        "" | "/" => "root",
        other => other,
    };
    let mut out = format!("{heading}/\n");
    for (idx, name) in names.iter().enumerate() {
        let branch = if idx + 1 == names.len() { "└─ " } else { "├─ " };
        out.push_str(branch);
        out.push_str(name);
        out.push('\n');
    }
    out
}
