//! Self-contained HTML snapshots.
//!
//! The page embeds the scene as JSON next to a small canvas viewer (drag to
//! orbit, wheel to zoom), so it opens in a browser without any install.

use std::path::Path;

use brainrender_core::{io::write_atomic, BrainrenderError, Result};
use serde::Serialize;

use crate::backend::SceneFrame;
use crate::camera::CameraParams;

#[derive(Debug, Serialize)]
struct ExportMesh<'a> {
    name: &'a str,
    color: [f32; 3],
    alpha: f32,
    line_width: f32,
    vertices: Vec<f32>,
    triangles: Vec<u32>,
    lines: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertex_colors: Option<Vec<f32>>,
    label: Option<&'a str>,
}

/// JSON payload embedded in an exported page.
#[derive(Debug, Serialize)]
pub struct ExportPayload<'a> {
    title: &'a str,
    background: [f32; 3],
    camera: Option<CameraParams>,
    meshes: Vec<ExportMesh<'a>>,
}

impl<'a> ExportPayload<'a> {
    /// Collects the visible meshes of `frame`.
    pub fn new(title: &'a str, frame: &SceneFrame<'a>, camera: Option<CameraParams>) -> Self {
        let meshes = frame
            .drawables
            .iter()
            .map(|d| ExportMesh {
                name: d.name,
                color: d.mesh.color().to_array(),
                alpha: d.mesh.alpha(),
                line_width: d.mesh.line_width(),
                vertices: d.mesh.points().iter().flat_map(|p| p.to_array()).collect(),
                triangles: d.mesh.faces().iter().flatten().copied().collect(),
                lines: d.mesh.lines().iter().flatten().copied().collect(),
                vertex_colors: d
                    .mesh
                    .vertex_colors()
                    .map(|colors| colors.iter().flat_map(|c| c.to_array()).collect()),
                label: d.label,
            })
            .collect();
        Self {
            title,
            background: frame.background.to_array(),
            camera,
            meshes,
        }
    }

    /// Number of meshes in the payload.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// True when nothing will be drawn.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Renders the complete HTML page.
    pub fn to_html(&self) -> Result<String> {
        // `</` must not appear inside the inline script
        let json = serde_json::to_string(self)?.replace("</", "<\\/");
        let title = html_escape(self.title);
        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
             <style>html,body{{margin:0;height:100%;overflow:hidden}}canvas{{display:block}}</style>\n\
             </head>\n<body>\n<canvas id=\"view\"></canvas>\n\
             <script id=\"scene-data\" type=\"application/json\">{json}</script>\n\
             <script>\n{VIEWER_JS}</script>\n</body>\n</html>\n"
        ))
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Writes an HTML snapshot of `frame` to `path`, which must end in `.html`.
pub fn export_html(
    path: &Path,
    title: &str,
    frame: &SceneFrame<'_>,
    camera: Option<CameraParams>,
) -> Result<()> {
    let is_html = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_html {
        return Err(BrainrenderError::invalid(format!(
            "export path must end in .html: {}",
            path.display()
        )));
    }
    let payload = ExportPayload::new(title, frame, camera);
    if payload.is_empty() {
        log::warn!("exporting an empty scene to {}", path.display());
    }
    write_atomic(path, payload.to_html()?.as_bytes())?;
    log::info!("exported {} meshes to {}", payload.len(), path.display());
    Ok(())
}

const VIEWER_JS: &str = r#"const data = JSON.parse(document.getElementById('scene-data').textContent);
const canvas = document.getElementById('view');
const ctx = canvas.getContext('2d');
const sub = (a, b) => [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
const dot = (a, b) => a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
const cross = (a, b) => [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]];
const norm = (a) => { const l = Math.hypot(a[0], a[1], a[2]) || 1; return [a[0] / l, a[1] / l, a[2] / l]; };
let lo = [Infinity, Infinity, Infinity], hi = [-Infinity, -Infinity, -Infinity];
for (const m of data.meshes) for (let i = 0; i < m.vertices.length; i += 3)
  for (let k = 0; k < 3; k++) { lo[k] = Math.min(lo[k], m.vertices[i + k]); hi[k] = Math.max(hi[k], m.vertices[i + k]); }
if (!isFinite(lo[0])) { lo = [-1, -1, -1]; hi = [1, 1, 1]; }
let focal = data.camera ? data.camera.focal : [(lo[0] + hi[0]) / 2, (lo[1] + hi[1]) / 2, (lo[2] + hi[2]) / 2];
let eye = data.camera ? data.camera.position : [focal[0], focal[1], focal[2] - 3 * Math.hypot(...sub(hi, lo))];
let up = data.camera ? data.camera.viewup : [0, -1, 0];
function rotate(v, axis, angle) {
  const k = norm(axis), c = Math.cos(angle), s = Math.sin(angle), kv = cross(k, v), kd = dot(k, v);
  return [0, 1, 2].map((i) => v[i] * c + kv[i] * s + k[i] * kd * (1 - c));
}
function draw() {
  canvas.width = window.innerWidth; canvas.height = window.innerHeight;
  const bg = data.background.map((c) => Math.round(c * 255));
  ctx.fillStyle = `rgb(${bg[0]},${bg[1]},${bg[2]})`;
  ctx.fillRect(0, 0, canvas.width, canvas.height);
  const f = norm(sub(focal, eye)), r = norm(cross(f, up)), u = cross(r, f);
  const scale = canvas.height / (2 * Math.tan(Math.PI / 12));
  const proj = (p) => { const d = sub(p, eye), z = dot(d, f);
    return [canvas.width / 2 + scale * dot(d, r) / z, canvas.height / 2 - scale * dot(d, u) / z, z]; };
  const items = [];
  for (const m of data.meshes) {
    if (m.alpha <= 0) continue;
    const pts = []; for (let i = 0; i < m.vertices.length; i += 3) pts.push(proj(m.vertices.slice(i, i + 3)));
    const world = (i) => m.vertices.slice(3 * i, 3 * i + 3);
    for (let t = 0; t < m.triangles.length; t += 3) {
      const [a, b, c] = [m.triangles[t], m.triangles[t + 1], m.triangles[t + 2]];
      if (pts[a][2] <= 0 || pts[b][2] <= 0 || pts[c][2] <= 0) continue;
      const n = norm(cross(sub(world(b), world(a)), sub(world(c), world(a))));
      const light = 0.55 + 0.45 * Math.abs(dot(n, f));
      items.push({ z: (pts[a][2] + pts[b][2] + pts[c][2]) / 3, poly: [pts[a], pts[b], pts[c]], m, light, vc: a });
    }
    for (let l = 0; l < m.lines.length; l += 2) {
      const [a, b] = [pts[m.lines[l]], pts[m.lines[l + 1]]];
      if (a[2] > 0 && b[2] > 0) items.push({ z: (a[2] + b[2]) / 2 - 1e-3, poly: [a, b], m, light: 1 });
    }
    if (m.label && pts.length) items.push({ z: 0, text: m.label, at: pts[0], m });
  }
  items.sort((p, q) => q.z - p.z);
  for (const it of items) {
    const base = it.m.vertex_colors && it.vc !== undefined ? it.m.vertex_colors.slice(3 * it.vc, 3 * it.vc + 3) : it.m.color;
    const c = base.map((v) => Math.round(255 * Math.min(1, v * (it.light || 1))));
    ctx.globalAlpha = it.m.alpha;
    ctx.fillStyle = ctx.strokeStyle = `rgb(${c[0]},${c[1]},${c[2]})`;
    if (it.text) { ctx.font = '14px sans-serif'; ctx.fillText(it.text, it.at[0], it.at[1]); continue; }
    ctx.beginPath(); ctx.moveTo(it.poly[0][0], it.poly[0][1]);
    for (const p of it.poly.slice(1)) ctx.lineTo(p[0], p[1]);
    if (it.poly.length === 2) { ctx.lineWidth = it.m.line_width; ctx.stroke(); } else { ctx.closePath(); ctx.fill(); }
  }
  ctx.globalAlpha = 1;
}
let drag = null;
canvas.addEventListener('mousedown', (e) => { drag = [e.clientX, e.clientY]; });
window.addEventListener('mouseup', () => { drag = null; });
window.addEventListener('mousemove', (e) => {
  if (!drag) return;
  const dx = e.clientX - drag[0], dy = e.clientY - drag[1]; drag = [e.clientX, e.clientY];
  const f = norm(sub(focal, eye)), r = norm(cross(f, up));
  let off = rotate(sub(eye, focal), up, -dx * 0.01);
  off = rotate(off, r, -dy * 0.01); up = rotate(up, r, -dy * 0.01);
  eye = [focal[0] + off[0], focal[1] + off[1], focal[2] + off[2]];
  draw();
});
canvas.addEventListener('wheel', (e) => {
  e.preventDefault(); const k = e.deltaY > 0 ? 1.1 : 1 / 1.1, off = sub(eye, focal);
  eye = [focal[0] + off[0] * k, focal[1] + off[1] * k, focal[2] + off[2] * k]; draw();
}, { passive: false });
window.addEventListener('resize', draw);
draw();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Drawable;
    use brainrender_core::{shapes, Vec3};

    #[test]
    fn test_payload_and_page() {
        let sphere = shapes::sphere(Vec3::ZERO, 1.0, 4);
        let frame = SceneFrame::new(vec![Drawable::named("root", &sphere)]);
        let payload = ExportPayload::new("<brain>", &frame, None);
        assert_eq!(payload.len(), 1);
        let html = payload.to_html().expect("html");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;brain&gt;"));
        assert!(html.contains("\"name\":\"root\""));
    }

    #[test]
    fn test_export_requires_html() {
        let dir = std::env::temp_dir().join(format!("brainrender-export-{}", std::process::id()));
        let frame = SceneFrame::new(Vec::new());
        assert!(matches!(
            export_html(&dir.join("scene.png"), "scene", &frame, None),
            Err(BrainrenderError::InvalidInput(_))
        ));
        let path = dir.join("empty.html");
        export_html(&path, "scene", &frame, None).expect("empty scene is still a valid page");
        let text = std::fs::read_to_string(&path).expect("read page");
        assert!(text.contains("\"meshes\":[]"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
